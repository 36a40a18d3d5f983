//! One-shot continuations.
//!
//! A [`Callback`] is the unit of scheduling in this crate: every async
//! operation hands the reactor a callback describing what to do when the
//! operation completes. Callbacks are movable, non-copyable, and invoked
//! at most once, by value.
//!
//! Unit callbacks (`Callback<()>`) additionally support an opaque-address
//! round-trip so the reactor can stash them inside the `u64` user-data
//! field of an OS event record and reconstruct them on dispatch without
//! any per-event allocation.

/// A type-erased continuation taking a single argument.
pub struct Callback<A = ()> {
    f: Box<dyn FnOnce(A)>,
}

impl<A> Callback<A> {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(A) + 'static,
    {
        Self { f: Box::new(f) }
    }

    /// Consumes the handle and runs the wrapped continuation.
    pub fn call(self, arg: A) {
        (self.f)(arg)
    }
}

impl Callback<()> {
    pub fn invoke(self) {
        self.call(())
    }

    /// Relinquishes ownership, returning an address fit for an event
    /// record's user data. The caller is now responsible for passing the
    /// value back through [`Callback::from_raw`] exactly once.
    pub fn into_raw(self) -> u64 {
        Box::into_raw(Box::new(self)) as u64
    }

    /// Reconstructs a callback previously leaked with [`Callback::into_raw`],
    /// regaining ownership and the duty to invoke it.
    ///
    /// # Safety
    ///
    /// `data` must have come from `into_raw` and must not be reclaimed more
    /// than once.
    pub unsafe fn from_raw(data: u64) -> Self {
        *Box::from_raw(data as *mut Callback<()>)
    }
}
