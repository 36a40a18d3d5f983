//! The event loop: OS readiness fused with deadline timers.
//!
//! A [`Reactor`] owns one epoll instance and one timer queue. Each
//! iteration of [`run`](Reactor::run) fires every expired timer, sleeps in
//! `epoll_wait` no longer than the next deadline, then dispatches one
//! parked continuation per readiness event. Registrations are one-shot:
//! an I/O operation arms a fresh `EPOLLONESHOT` watch with its
//! continuation leaked into the event record's user data, and dispatch
//! consumes it, so a continuation can never be entered twice.
//!
//! The reactor is affinitized to the thread that constructed it. Async
//! operations reach it through [`Reactor::current`]; one reactor per
//! thread, any number of threads.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::runtime::timer::TimerQueue;
use crate::runtime::{Callback, StopSource};

const MAX_EVENTS: usize = 128;

pub struct Reactor {
    epoll: OwnedFd,
    /// One-shot FD continuations awaiting readiness.
    pending: Cell<usize>,
    timers: RefCell<TimerQueue>,
    /// Addresses reclaimed through the stop path while the current event
    /// batch was already snapshotted; the batch may still carry them.
    reclaimed: RefCell<HashSet<u64>>,
    /// Self-reference handed to stop callbacks, so a cancelled timer can
    /// find its queue without keeping the reactor alive.
    weak: Weak<Reactor>,
}

thread_local! {
    static CURRENT: RefCell<Weak<Reactor>> = RefCell::new(Weak::new());
}

impl Reactor {
    /// Creates a reactor and installs it as this thread's current one.
    pub fn new() -> io::Result<Rc<Self>> {
        let raw = syscall(unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) })?;
        let epoll = unsafe { OwnedFd::from_raw_fd(raw) };
        let reactor = Rc::new_cyclic(|weak| Self {
            epoll,
            pending: Cell::new(0),
            timers: RefCell::new(TimerQueue::new()),
            reclaimed: RefCell::new(HashSet::new()),
            weak: weak.clone(),
        });
        CURRENT.with(|current| *current.borrow_mut() = Rc::downgrade(&reactor));
        Ok(reactor)
    }

    /// The reactor bound to the calling thread.
    ///
    /// # Panics
    ///
    /// Panics if no reactor is alive on this thread.
    pub fn current() -> Rc<Self> {
        Self::try_current().expect("no reactor running on this thread")
    }

    pub fn try_current() -> Option<Rc<Self>> {
        CURRENT.with(|current| current.borrow().upgrade())
    }

    /// True when no timer is armed and no FD continuation is pending.
    pub fn is_empty(&self) -> bool {
        self.timers.borrow().is_empty() && self.pending.get() == 0
    }

    pub fn pending_count(&self) -> usize {
        self.pending.get()
    }

    /// Arms `call` to fire once `dt` from now.
    ///
    /// Requesting stop on `stop` before expiry removes the entry and
    /// invokes `call` immediately; the callee tells the two apart with
    /// `stop.stop_requested()`.
    pub fn set_timeout(&self, dt: Duration, call: Callback, stop: StopSource) {
        let key = self.timers.borrow_mut().insert(Instant::now() + dt, call, stop.clone());
        let reactor = self.weak.clone();
        stop.set_stop_callback(Callback::new(move |_| {
            let Some(reactor) = reactor.upgrade() else { return };
            let entry = reactor.timers.borrow_mut().remove(&key);
            if let Some(entry) = entry {
                entry.call.invoke();
            }
        }));
    }

    /// Fires every expired timer, then reports how long the next wait may
    /// block; `None` means no timer is armed.
    ///
    /// Draining and measuring are one operation on purpose: an expired
    /// timer found while computing the sleep must run now, not after the
    /// next wait. The queue borrow is released before each continuation so
    /// callbacks may re-enter the queue.
    fn drain_expired(&self) -> Option<Duration> {
        loop {
            let now = Instant::now();
            let due = {
                let mut timers = self.timers.borrow_mut();
                match timers.next_deadline() {
                    None => return None,
                    Some(deadline) if deadline > now => return Some(deadline - now),
                    Some(_) => timers.pop_front(),
                }
            };
            if let Some(entry) = due {
                entry.stop.clear_stop_callback();
                entry.call.invoke();
            }
        }
    }

    /// Blocks until every timer has fired and every pending FD
    /// continuation has been dispatched.
    pub fn run(&self) -> io::Result<()> {
        let mut events = [libc::epoll_event { events: 0, u64: 0 }; MAX_EVENTS];
        while !self.is_empty() {
            let timeout = self.drain_expired();
            if self.is_empty() {
                break;
            }
            let timeout_ms = timeout.map_or(-1, |dt| dt.as_millis().saturating_add(1).min(i32::MAX as u128) as i32);
            // cancellations before this point fixed up the kernel-side
            // registration, so their addresses cannot reappear
            self.reclaimed.borrow_mut().clear();
            let ready = match syscall(unsafe {
                libc::epoll_wait(self.epoll.as_raw_fd(), events.as_mut_ptr(), MAX_EVENTS as i32, timeout_ms)
            }) {
                Ok(n) => n as usize,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            trace!(ready, pending = self.pending.get(), "dispatching readiness events");
            for event in &events[..ready] {
                let data = event.u64;
                // ERR/HUP are reported even for a quiescent registration,
                // which parks no continuation; the next armed operation
                // will observe the error from the syscall itself.
                if data == 0 {
                    continue;
                }
                // a stop callback run by an earlier event of this batch
                // may have reclaimed this continuation already
                if self.reclaimed.borrow_mut().remove(&data) {
                    continue;
                }
                let resume = unsafe { Callback::from_raw(data) };
                self.pending.set(self.pending.get() - 1);
                resume.invoke();
            }
        }
        Ok(())
    }

    /// Registers `fd` edge-triggered with no pending continuation.
    pub(crate) fn add(&self, fd: RawFd) -> io::Result<()> {
        let mut event = libc::epoll_event { events: libc::EPOLLET as u32, u64: 0 };
        syscall(unsafe { libc::epoll_ctl(self.epoll.as_raw_fd(), libc::EPOLL_CTL_ADD, fd, &mut event) })?;
        Ok(())
    }

    /// Parks `resume` in the event record of `fd` and arms a one-shot
    /// watch for `interest`. Returns the continuation's opaque address so
    /// the cancellation path can reclaim it.
    pub(crate) fn arm(&self, fd: RawFd, interest: u32, resume: Callback) -> u64 {
        let data = resume.into_raw();
        let mut event = libc::epoll_event {
            events: interest | (libc::EPOLLET | libc::EPOLLONESHOT) as u32,
            u64: data,
        };
        syscall(unsafe { libc::epoll_ctl(self.epoll.as_raw_fd(), libc::EPOLL_CTL_MOD, fd, &mut event) })
            .expect("EPOLL_CTL_MOD");
        self.pending.set(self.pending.get() + 1);
        data
    }

    /// Reclaims the continuation parked on `fd` for the cancellation path
    /// and returns the registration to its quiescent state, so the
    /// address can never be dispatched as well.
    ///
    /// # Safety
    ///
    /// `data` must be the address returned by the matching [`Reactor::arm`]
    /// and the continuation must still be parked.
    pub(crate) unsafe fn reclaim(&self, fd: RawFd, data: u64) -> Callback {
        let resume = Callback::from_raw(data);
        self.reclaimed.borrow_mut().insert(data);
        let mut event = libc::epoll_event { events: libc::EPOLLET as u32, u64: 0 };
        syscall(libc::epoll_ctl(self.epoll.as_raw_fd(), libc::EPOLL_CTL_MOD, fd, &mut event))
            .expect("EPOLL_CTL_MOD");
        self.pending.set(self.pending.get() - 1);
        resume
    }

    /// Deregisters `fd`. The fd may already be half torn down, so errors
    /// are ignored.
    pub(crate) fn remove(&self, fd: RawFd) {
        unsafe { libc::epoll_ctl(self.epoll.as_raw_fd(), libc::EPOLL_CTL_DEL, fd, std::ptr::null_mut()) };
    }
}

fn syscall(ret: i32) -> io::Result<i32> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}
