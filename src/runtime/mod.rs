//! The reactor core: readiness multiplexing, timers, and async sockets.
//!
//! Everything in this module is single-threaded and cooperative. A
//! [`Reactor`] is bound to the thread that constructs it; [`AsyncFd`]
//! operations locate it through a thread-local and park their
//! continuations inside the reactor's event records until the OS reports
//! readiness. Cancellation is explicit, via [`StopSource`].
//!
//! # Components
//!
//! - [`Callback`]: a one-shot, type-erased continuation
//! - [`StopSource`]: a shared cancellation signal with an at-most-once
//!   stop callback
//! - [`Reactor`]: the event loop, fusing an epoll instance with a
//!   deadline-ordered timer queue
//! - [`AsyncFd`]: a non-blocking socket whose `read`/`write`/`accept`/
//!   `connect` complete through continuations

mod callback;
mod fd;
mod net;
mod reactor;
mod stop;
mod timer;

pub use callback::Callback;
pub use fd::{cancelled, is_cancelled, AcceptCallback, AsyncFd, ConnectCallback, ReadCallback, WriteCallback};
pub use net::{listener, resolve, stream};
pub use reactor::Reactor;
pub use stop::StopSource;
