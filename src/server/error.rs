use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Startup errors; all of them are fatal to the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The bind address did not resolve
    #[error("failed to resolve {host}:{port}: {source}")]
    Resolve { host: String, port: String, source: io::Error },

    /// No candidate address could be bound
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    /// Listener registration failed
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}
