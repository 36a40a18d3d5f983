//! The listening socket and the accept loop.

use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;

use socket2::Socket;
use tracing::{info, trace, warn};

use crate::connection::HttpConnection;
use crate::runtime::{is_cancelled, listener, resolve, AsyncFd, Callback, StopSource};
use crate::server::{Router, ServerError};

/// Tunables for connection handling.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// How long a connection may sit idle in the reading state before the
    /// server closes it.
    pub read_idle_timeout: Duration,
    /// Scratch buffer size for inbound chunks.
    pub read_buffer_size: usize,
    /// Upper bound on an accumulated request body; connections exceeding
    /// it are closed.
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            read_idle_timeout: Duration::from_secs(10),
            read_buffer_size: 1024,
            max_body_size: 1024 * 1024,
        }
    }
}

/// An HTTP/1.1 server: a router plus an accept loop on the current
/// thread's reactor.
///
/// [`start`](Server::start) arms the accept loop and returns; the caller
/// then drives everything by running the reactor.
pub struct Server {
    router: Rc<Router>,
    config: Rc<ServerConfig>,
}

impl Server {
    pub fn new(router: Router) -> Self {
        Self::with_config(router, ServerConfig::default())
    }

    pub fn with_config(router: Router, config: ServerConfig) -> Self {
        Self { router: Rc::new(router), config: Rc::new(config) }
    }

    /// Resolves `host:port`, binds and listens, and arms the accept loop.
    ///
    /// Resolution and bind failures are fatal. Per-accept failures are
    /// logged and the loop re-arms.
    pub fn start(self, host: &str, port: &str) -> Result<ServerHandle, ServerError> {
        let addrs = resolve(host, port).map_err(|source| ServerError::Resolve {
            host: host.to_string(),
            port: port.to_string(),
            source,
        })?;
        let socket = bind_first(&addrs)?;

        let local_addr = socket
            .local_addr()?
            .as_socket()
            .ok_or_else(|| ServerError::Io {
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "listener has no inet address"),
            })?;
        let listening = AsyncFd::new(socket)?;
        info!(%local_addr, "server listening");

        let stop_accept = StopSource::new();
        Self::do_accept(listening, self.router, self.config, stop_accept.clone());
        Ok(ServerHandle { stop_accept, local_addr })
    }

    fn do_accept(listening: AsyncFd, router: Rc<Router>, config: Rc<ServerConfig>, stop: StopSource) {
        let rearm = listening.clone();
        let rearm_stop = stop.clone();
        listening.async_accept(
            Callback::new(move |result: std::io::Result<(Socket, socket2::SockAddr)>| {
                match result {
                    Ok((socket, peer)) => {
                        trace!(peer = ?peer.as_socket(), "accepted connection");
                        HttpConnection::spawn(socket, router.clone(), config.clone());
                    }
                    Err(error) if is_cancelled(&error) => {
                        info!("accept loop stopped");
                        return;
                    }
                    Err(error) => {
                        warn!(%error, "failed to accept");
                    }
                }
                Self::do_accept(rearm, router, config, rearm_stop);
            }),
            stop,
        );
    }
}

/// Handle to a started server.
pub struct ServerHandle {
    stop_accept: StopSource,
    local_addr: SocketAddr,
}

impl ServerHandle {
    /// The bound address; useful when listening on port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting new connections and releases the listening socket.
    /// In-flight connections drain on their own; once they do, the
    /// reactor's `run` returns.
    pub fn shutdown(&self) {
        self.stop_accept.request_stop();
    }
}

fn bind_first(addrs: &[SocketAddr]) -> Result<Socket, ServerError> {
    let mut last_error = None;
    for &addr in addrs {
        match listener(addr) {
            Ok(socket) => return Ok(socket),
            Err(source) => {
                warn!(%addr, error = %source, "bind candidate failed");
                last_error = Some(ServerError::Bind { addr, source });
            }
        }
    }
    Err(last_error.unwrap_or_else(|| ServerError::Io {
        source: std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no candidate addresses"),
    }))
}
