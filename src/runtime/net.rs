//! Address resolution and raw socket setup.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs};

use socket2::{Domain, Protocol, Socket, Type};

/// Resolves `host` and `port` to candidate endpoints, getaddrinfo-style.
pub fn resolve(host: &str, port: &str) -> io::Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = format!("{host}:{port}").to_socket_addrs()?.collect();
    if addrs.is_empty() {
        return Err(io::Error::new(io::ErrorKind::NotFound, "resolved to no endpoints"));
    }
    Ok(addrs)
}

/// Creates the listening socket for `addr`: `SO_REUSEADDR | SO_REUSEPORT`,
/// bound, listening with a `SOMAXCONN` backlog.
pub fn listener(addr: SocketAddr) -> io::Result<Socket> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_reuse_port(true)?;
    socket.bind(&addr.into())?;
    socket.listen(libc::SOMAXCONN)?;
    Ok(socket)
}

/// Creates an unconnected stream socket in `addr`'s family, suitable for
/// [`AsyncFd::async_connect`](crate::runtime::AsyncFd::async_connect).
pub fn stream(addr: SocketAddr) -> io::Result<Socket> {
    Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
}
