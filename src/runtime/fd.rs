//! Asynchronous socket operations as one-shot continuations.
//!
//! An [`AsyncFd`] wraps a non-blocking socket registered with the current
//! reactor. Every operation follows the optimistic protocol: check the
//! stop token, try the syscall, and only if the kernel reports would-block
//! arm a one-shot edge-triggered watch whose continuation re-invokes the
//! same operation. The drain-before-arm discipline is what makes the
//! edge-triggered mode correct.
//!
//! Cancellation: arming installs a stop callback that reclaims the parked
//! continuation from the event record, disarms the watch, and invokes the
//! continuation; the re-invocation observes the stop flag and completes
//! with [`cancelled`]. One stop request yields exactly one cancelled
//! completion, wherever the operation was when the request landed.
//!
//! Buffers travel through the continuation and come back with the result,
//! so no borrow outlives a suspension point.

use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;
use std::rc::Rc;

use bytes::{Bytes, BytesMut};
use socket2::{SockAddr, Socket};
use tracing::trace;

use crate::runtime::{Callback, Reactor, StopSource};

pub type ReadCallback = Callback<(BytesMut, io::Result<usize>)>;
pub type WriteCallback = Callback<io::Result<usize>>;
pub type AcceptCallback = Callback<io::Result<(Socket, SockAddr)>>;
pub type ConnectCallback = Callback<io::Result<()>>;

const READABLE: u32 = (libc::EPOLLIN | libc::EPOLLERR) as u32;
const WRITABLE: u32 = (libc::EPOLLOUT | libc::EPOLLERR) as u32;

/// The completion delivered when an operation is aborted via its stop
/// token. Errno-shaped, like every other outcome.
pub fn cancelled() -> io::Error {
    io::Error::from_raw_os_error(libc::ECANCELED)
}

/// Whether an operation finished through its stop token.
pub fn is_cancelled(error: &io::Error) -> bool {
    error.raw_os_error() == Some(libc::ECANCELED)
}

/// A non-blocking socket owned by the current reactor's thread.
///
/// Cloning is cheap and shares the underlying socket; the registration is
/// dropped and the socket closed when the last clone goes away.
#[derive(Clone)]
pub struct AsyncFd {
    inner: Rc<Inner>,
}

struct Inner {
    socket: Socket,
    reactor: Rc<Reactor>,
}

impl AsyncFd {
    /// Switches `socket` to non-blocking mode and registers it with the
    /// current reactor.
    pub fn new(socket: Socket) -> io::Result<Self> {
        socket.set_nonblocking(true)?;
        let reactor = Reactor::current();
        reactor.add(socket.as_raw_fd())?;
        Ok(Self { inner: Rc::new(Inner { socket, reactor }) })
    }

    fn arm(&self, interest: u32, resume: Callback, stop: &StopSource) {
        let data = self.inner.reactor.arm(self.inner.socket.as_raw_fd(), interest, resume);
        let this = self.clone();
        stop.set_stop_callback(Callback::new(move |_| {
            // Reclaim the parked continuation; re-invoking it observes the
            // stop flag and completes with `cancelled()`.
            let resume = unsafe { this.inner.reactor.reclaim(this.inner.socket.as_raw_fd(), data) };
            resume.invoke();
        }));
    }

    /// Reads into `buf` (up to its length) and hands the buffer back with
    /// the result. `Ok(0)` means the peer closed.
    pub fn async_read(&self, mut buf: BytesMut, call: ReadCallback, stop: StopSource) {
        if stop.stop_requested() {
            stop.clear_stop_callback();
            return call.call((buf, Err(cancelled())));
        }
        match retry_interrupted(|| (&self.inner.socket).read(&mut buf[..])) {
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                let this = self.clone();
                let retry = stop.clone();
                self.arm(READABLE, Callback::new(move |_| this.async_read(buf, call, retry)), &stop);
            }
            result => {
                stop.clear_stop_callback();
                call.call((buf, result));
            }
        }
    }

    /// Writes as much of `buf` as the kernel accepts, completing with the
    /// number of bytes taken. Callers re-issue with `buf.slice(n..)` on a
    /// short write.
    pub fn async_write(&self, buf: Bytes, call: WriteCallback, stop: StopSource) {
        if stop.stop_requested() {
            stop.clear_stop_callback();
            return call.call(Err(cancelled()));
        }
        match retry_interrupted(|| (&self.inner.socket).write(&buf[..])) {
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                let this = self.clone();
                let retry = stop.clone();
                self.arm(WRITABLE, Callback::new(move |_| this.async_write(buf, call, retry)), &stop);
            }
            result => {
                stop.clear_stop_callback();
                call.call(result);
            }
        }
    }

    /// Accepts one queued connection, completing with the raw socket and
    /// the peer address.
    pub fn async_accept(&self, call: AcceptCallback, stop: StopSource) {
        if stop.stop_requested() {
            stop.clear_stop_callback();
            return call.call(Err(cancelled()));
        }
        match retry_interrupted(|| self.inner.socket.accept()) {
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                let this = self.clone();
                let retry = stop.clone();
                self.arm(READABLE, Callback::new(move |_| this.async_accept(call, retry)), &stop);
            }
            result => {
                stop.clear_stop_callback();
                call.call(result);
            }
        }
    }

    /// Connects to `addr`. An in-progress connect waits for writability
    /// and resolves the final outcome through `SO_ERROR`.
    pub fn async_connect(&self, addr: SockAddr, call: ConnectCallback, stop: StopSource) {
        if stop.stop_requested() {
            stop.clear_stop_callback();
            return call.call(Err(cancelled()));
        }
        match self.inner.socket.connect(&addr) {
            Err(e) if e.raw_os_error() == Some(libc::EINPROGRESS) => {
                trace!("connect in progress, waiting for writability");
                let this = self.clone();
                let pending = stop.clone();
                self.arm(
                    WRITABLE,
                    Callback::new(move |_| {
                        if pending.stop_requested() {
                            pending.clear_stop_callback();
                            return call.call(Err(cancelled()));
                        }
                        let result = match this.inner.socket.take_error() {
                            Ok(Some(error)) => Err(error),
                            Ok(None) => Ok(()),
                            Err(error) => Err(error),
                        };
                        pending.clear_stop_callback();
                        call.call(result);
                    }),
                    &stop,
                );
            }
            result => {
                stop.clear_stop_callback();
                call.call(result);
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.reactor.remove(self.socket.as_raw_fd());
    }
}

fn retry_interrupted<T>(mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    loop {
        match op() {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}
