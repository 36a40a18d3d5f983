//! Literal-path request routing.

use std::collections::HashMap;

use http::StatusCode;
use tracing::debug;

use crate::connection::Request;

/// Something that can answer a request.
///
/// Implemented for every `Fn(Request)` closure, so routes are usually
/// registered as plain closures.
pub trait Handler {
    fn handle(&self, request: Request);
}

impl<F> Handler for F
where
    F: Fn(Request),
{
    fn handle(&self, request: Request) {
        self(request)
    }
}

/// Maps exact request-targets to handlers. No globs, no parameters.
#[derive(Default)]
pub struct Router {
    routes: HashMap<String, Box<dyn Handler>>,
}

impl Router {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers `handler` for `path`, replacing any previous handler for
    /// the same path.
    pub fn route(&mut self, path: impl Into<String>, handler: impl Handler + 'static) -> &mut Self {
        self.routes.insert(path.into(), Box::new(handler));
        self
    }

    /// Hands `request` to the matching handler, or answers 404 when no
    /// route matches.
    pub(crate) fn dispatch(&self, request: Request) {
        match self.routes.get(request.target()) {
            Some(handler) => handler.handle(request),
            None => {
                debug!(target = %request.target(), "no route matched");
                request.respond(StatusCode::NOT_FOUND, "404 Not Found");
            }
        }
    }
}
