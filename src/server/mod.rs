//! The listening server: router, configuration, and the accept loop.

mod error;
mod router;
mod server;

pub use error::ServerError;
pub use router::{Handler, Router};
pub use server::{Server, ServerConfig, ServerHandle};
