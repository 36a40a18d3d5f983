//! Request head handling.
//!
//! [`RequestHead`] wraps `http::Request<()>` so the rest of the crate gets
//! the standard method/uri/version/header accessors without committing to
//! a body representation; the connection driver attaches the materialized
//! body separately once framing completes.

use http::{HeaderMap, Method, Request, Uri, Version};

/// The parsed head of an HTTP request: request line plus headers.
#[derive(Debug)]
pub struct RequestHead {
    inner: Request<()>,
}

impl RequestHead {
    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    /// The request-target as it appeared on the request line (origin
    /// form: path plus optional query).
    pub fn target(&self) -> &str {
        self.inner
            .uri()
            .path_and_query()
            .map(|target| target.as_str())
            .unwrap_or_else(|| self.inner.uri().path())
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }
}

impl From<Request<()>> for RequestHead {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}
