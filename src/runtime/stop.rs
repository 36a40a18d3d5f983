//! Shared cancellation signals.
//!
//! A [`StopSource`] is a cheaply cloneable handle to a shared control
//! block. Any holder may call [`request_stop`](StopSource::request_stop);
//! the first call flips the stop flag and synchronously fires the
//! registered stop callback, if any. Later calls are no-ops for the
//! callback that already fired, so an operation observes at most one
//! cancelled completion per token.
//!
//! Dropping every handle does *not* cancel anything; cancellation is
//! always an explicit `request_stop`.

use std::cell::RefCell;
use std::rc::Rc;

use crate::runtime::Callback;

/// A shared, cancellable signal carrying one optional stop callback.
#[derive(Clone, Default)]
pub struct StopSource {
    control: Option<Rc<RefCell<ControlBlock>>>,
}

#[derive(Default)]
struct ControlBlock {
    stopped: bool,
    on_stop: Option<Callback>,
}

impl StopSource {
    /// A source whose stop can actually be requested.
    pub fn new() -> Self {
        Self { control: Some(Rc::new(RefCell::new(ControlBlock::default()))) }
    }

    /// A source with no control block: `request_stop` and callback
    /// registration are no-ops. Useful as the "no cancellation" argument.
    pub fn inert() -> Self {
        Self { control: None }
    }

    pub fn stop_possible(&self) -> bool {
        self.control.is_some()
    }

    pub fn stop_requested(&self) -> bool {
        self.control.as_ref().map(|control| control.borrow().stopped).unwrap_or(false)
    }

    /// Flips the stop flag and fires the registered callback.
    ///
    /// Idempotent past the first call. The callback runs outside the
    /// control-block borrow, so it may freely re-enter this source.
    pub fn request_stop(&self) {
        let Some(control) = &self.control else { return };
        let fired = {
            let mut block = control.borrow_mut();
            block.stopped = true;
            block.on_stop.take()
        };
        if let Some(callback) = fired {
            callback.invoke();
        }
    }

    /// Registers `callback` to fire on the next `request_stop`, replacing
    /// any previous registration. If stop was already requested the
    /// callback fires immediately.
    pub fn set_stop_callback(&self, callback: Callback) {
        let Some(control) = &self.control else { return };
        let immediate = {
            let mut block = control.borrow_mut();
            if block.stopped {
                Some(callback)
            } else {
                block.on_stop = Some(callback);
                None
            }
        };
        if let Some(callback) = immediate {
            callback.invoke();
        }
    }

    /// Detaches the registered callback, if any.
    pub fn clear_stop_callback(&self) {
        if let Some(control) = &self.control {
            control.borrow_mut().on_stop = None;
        }
    }
}
