//! Repeating or one-shot timer that emits on a [`Signal`].
//!
//! Schedules on a background OS thread and, when it fires, emits on itself
//! and reschedules unless canceled or one-shot. A background thread is used
//! rather than an async task so `Timer` firings serialize against every
//! other emitter through the same global emit lock regardless of whether an
//! async runtime happens to be running.

use crate::signal::{Signal, Subscription};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Shared {
    canceled: AtomicBool,
}

/// A timer that emits `()` on its internal signal every `interval`, or
/// exactly once if constructed with `one_shot = true`.
pub struct Timer {
    signal: Signal<()>,
    shared: Arc<Shared>,
}

impl Timer {
    /// Create and immediately schedule a new timer. `interval` is the
    /// tick/delay period; `one_shot` fires once and stops instead of
    /// rescheduling.
    pub fn new(interval: Duration, one_shot: bool) -> Self {
        let signal = Signal::new();
        let shared = Arc::new(Shared {
            canceled: AtomicBool::new(false),
        });
        spawn_ticker(signal.clone(), shared.clone(), interval, one_shot);
        Timer { signal, shared }
    }

    /// Connect a subscriber to be called on every (or the single) firing.
    pub fn connect<F>(&self, callback: F) -> Subscription<()>
    where
        F: Fn(&()) -> Result<(), String> + Send + Sync + 'static,
    {
        self.signal.connect(callback)
    }

    /// Cancel the timer. Idempotent; a canceled timer never fires again,
    /// even if a firing is already in flight on the background thread (the
    /// thread checks the flag immediately before emitting).
    pub fn cancel(&self) {
        self.shared.canceled.store(true, Ordering::SeqCst);
    }

    /// True once [`Timer::cancel`] has been called.
    pub fn is_canceled(&self) -> bool {
        self.shared.canceled.load(Ordering::SeqCst)
    }
}

fn spawn_ticker(signal: Signal<()>, shared: Arc<Shared>, interval: Duration, one_shot: bool) {
    std::thread::spawn(move || loop {
        std::thread::sleep(interval);
        if shared.canceled.load(Ordering::SeqCst) {
            return;
        }
        signal.emit(());
        if one_shot || shared.canceled.load(Ordering::SeqCst) {
            return;
        }
    });
}
