//! A single-threaded, event-driven HTTP/1.1 server core.
//!
//! `co_http` multiplexes many connections on one thread: a readiness
//! reactor ([`runtime::Reactor`]) drives one-shot I/O continuations and
//! deadline timers, an async socket adapter ([`runtime::AsyncFd`]) turns
//! `read`/`write`/`accept`/`connect` into continuation-taking operations
//! with stop-token cancellation, and an incremental HTTP/1.1 codec feeds a
//! per-connection state machine with keep-alive semantics.
//!
//! # Example
//!
//! ```no_run
//! use co_http::{Reactor, Request, Router, Server};
//! use http::StatusCode;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let reactor = Reactor::new()?;
//!
//! let mut router = Router::new();
//! router.route("/echo", |request: Request| {
//!     let body = request.body().clone();
//!     request.respond(StatusCode::OK, body);
//! });
//!
//! Server::new(router).start("127.0.0.1", "8080")?;
//! reactor.run()?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod connection;
pub mod protocol;
pub mod runtime;
pub mod server;

pub use connection::Request;
pub use runtime::Reactor;
pub use server::{Handler, Router, Server, ServerConfig, ServerError, ServerHandle};

pub(crate) use help::ensure;

mod help {

    macro_rules! ensure {
        ($predicate:expr, $error:expr) => {
            if !$predicate {
                return Err($error);
            }
        };
    }
    pub(crate) use ensure;
}
