//! Synchronous publish/subscribe primitive with application-wide
//! serialization.
//!
//! A generalized callback-listener bus: subscribers are held with
//! explicit, handle-based ownership rather than by weak reference.
//! `connect` returns a [`Subscription`] token, and dropping that token
//! deregisters the callback; there is no weak-map bookkeeping to maintain.

use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Single process-wide reentrant lock serializing every `Signal::emit`
/// call in the application. At most one thread is ever inside a subscriber
/// callback; the lock's reentrancy lets a subscriber emit further signals
/// synchronously without deadlocking against itself.
static GLOBAL_EMIT_LOCK: ReentrantMutex<RefCell<()>> = ReentrantMutex::new(RefCell::new(()));

type Callback<T> = Box<dyn Fn(&T) -> Result<(), String> + Send + Sync>;

struct Entry<T> {
    id: u64,
    callback: Callback<T>,
}

struct Inner<T> {
    subscribers: Mutex<Vec<Arc<Entry<T>>>>,
    next_id: AtomicU64,
}

/// An event bus. Cloning a `Signal` shares the same subscriber list (the
/// clone is cheap, an `Arc` bump) so every component that needs to emit on
/// (or connect to) the same logical signal can hold its own handle.
pub struct Signal<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Signal {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Signal<T> {
    /// Create a new, empty signal.
    pub fn new() -> Self {
        Signal {
            inner: Arc::new(Inner {
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Connect a callback to this signal. Returns a [`Subscription`] handle;
    /// the callback is removed when every clone of that handle has been
    /// dropped. A callback may itself call `emit` on this or any other
    /// signal; the global lock is reentrant.
    pub fn connect<F>(&self, callback: F) -> Subscription<T>
    where
        F: Fn(&T) -> Result<(), String> + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.lock().unwrap().push(Arc::new(Entry {
            id,
            callback: Box::new(callback),
        }));
        Subscription {
            id,
            signal: Arc::downgrade(&self.inner),
        }
    }

    /// Synchronously invoke every live subscriber with `payload`, in
    /// registration order. Returns `true` if at least one subscriber was
    /// invoked successfully. A subscriber returning `Err` does not stop the
    /// remaining subscribers from running; collected errors are republished
    /// on [`signal_error`] once the loop completes.
    pub fn emit(&self, payload: T) -> bool
    where
        T: Clone + Send + Sync + 'static,
    {
        let _guard = GLOBAL_EMIT_LOCK.lock();
        let mut sent = false;
        let mut errors = Vec::new();

        // Snapshot the subscriber list (an Arc bump per entry) and release
        // the mutex before invoking anything. A subscriber that disconnects
        // itself, or connects a new subscriber, for this same signal from
        // within its own callback must not re-lock a mutex this thread is
        // already holding.
        let snapshot = self.inner.subscribers.lock().unwrap().clone();
        for entry in snapshot.iter() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                (entry.callback)(&payload)
            }));
            match result {
                Ok(Ok(())) => sent = true,
                Ok(Err(message)) => errors.push(message),
                Err(panic) => errors.push(describe_panic(panic)),
            }
        }

        for error in errors {
            signal_error().emit(SignalError { message: error });
        }

        sent
    }

    /// Number of currently connected subscribers. Exposed for tests.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().unwrap().len()
    }
}

fn describe_panic(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "subscriber panicked with a non-string payload".to_string()
    }
}

/// An opaque handle returned by [`Signal::connect`]. Dropping every clone
/// of this handle deregisters the associated callback.
pub struct Subscription<T> {
    id: u64,
    signal: Weak<Inner<T>>,
}

impl<T> Subscription<T> {
    /// Explicitly disconnect now, instead of waiting for drop.
    pub fn disconnect(self) {
        // Drop does the work; this just gives callers an intention-revealing name.
        drop(self);
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.signal.upgrade() {
            let mut subscribers = inner.subscribers.lock().unwrap();
            subscribers.retain(|entry| entry.id != self.id);
        }
    }
}

/// Payload carried by the well-known global error signal.
#[derive(Debug, Clone)]
pub struct SignalError {
    /// Human-readable description of the subscriber failure (formatted
    /// panic payload, or the `Err` string a subscriber returned).
    pub message: String,
}

/// Emit `message` on `signal` if anything is listening; otherwise fall back
/// to `tracing::debug!`. A debug message is always logged locally in
/// addition to whatever signal re-emission happens to reach a subscriber,
/// so it is never silently lost just because nobody connected to the
/// signal.
pub fn emit_or_log(signal: &Signal<String>, message: impl Into<String>) {
    let message = message.into();
    if signal.subscriber_count() == 0 {
        tracing::debug!(%message);
    } else {
        signal.emit(message);
    }
}

/// The well-known, application-wide signal every `Signal::emit` reports
/// subscriber failures to. A subscriber error while emitting on
/// `signal_error` itself is written to the log instead of being
/// re-emitted, to avoid infinite recursion.
pub fn signal_error() -> &'static Signal<SignalError> {
    use std::sync::OnceLock;
    static SIGNAL_ERROR: OnceLock<Signal<SignalError>> = OnceLock::new();
    SIGNAL_ERROR.get_or_init(|| {
        let signal = Signal::new();
        let logging_handle = signal.connect(|err: &SignalError| {
            tracing::error!(message = %err.message, "subscriber error reported on signal_error");
            Ok(())
        });
        // Leak the subscription so the log sink lives for the process
        // lifetime; this mirrors the source's single static logging slot.
        std::mem::forget(logging_handle);
        signal
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn connect_and_emit_invokes_subscriber() {
        let signal: Signal<i32> = Signal::new();
        let received = Arc::new(AtomicUsize::new(0));
        let received_clone = received.clone();
        let _sub = signal.connect(move |payload: &i32| {
            received_clone.fetch_add(*payload as usize, Ordering::SeqCst);
            Ok(())
        });
        assert!(signal.emit(5));
        assert_eq!(received.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn dropping_subscription_deregisters() {
        let signal: Signal<i32> = Signal::new();
        let sub = signal.connect(|_: &i32| Ok(()));
        assert_eq!(signal.subscriber_count(), 1);
        drop(sub);
        assert_eq!(signal.subscriber_count(), 0);
        assert!(!signal.emit(1));
    }

    #[test]
    fn one_failing_subscriber_does_not_block_others() {
        let signal: Signal<i32> = Signal::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = ran.clone();
        let _failing = signal.connect(|_: &i32| Err("boom".to_string()));
        let _ok = signal.connect(move |_: &i32| {
            ran_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert!(signal.emit(0));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reentrant_emit_from_within_a_subscriber_does_not_deadlock() {
        let outer: Signal<i32> = Signal::new();
        let inner: Signal<i32> = Signal::new();
        let inner_clone = inner.clone();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let _inner_sub = inner.connect(move |_: &i32| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let _outer_sub = outer.connect(move |payload: &i32| {
            inner_clone.emit(*payload);
            Ok(())
        });
        outer.emit(1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscriber_disconnecting_itself_during_emit_does_not_deadlock() {
        let signal: Signal<i32> = Signal::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        let slot: Arc<Mutex<Option<Subscription<i32>>>> = Arc::new(Mutex::new(None));
        let slot_clone = slot.clone();
        let sub = signal.connect(move |_: &i32| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
            if let Some(sub) = slot_clone.lock().unwrap().take() {
                sub.disconnect();
            }
            Ok(())
        });
        *slot.lock().unwrap() = Some(sub);
        assert!(signal.emit(1));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(signal.subscriber_count(), 0);
        assert!(!signal.emit(2));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscriber_connecting_a_new_listener_during_emit_does_not_deadlock() {
        let signal: Signal<i32> = Signal::new();
        let outer_fired = Arc::new(AtomicUsize::new(0));
        let inner_fired = Arc::new(AtomicUsize::new(0));
        let outer_fired_clone = outer_fired.clone();
        let inner_fired_clone = inner_fired.clone();
        let held: Arc<Mutex<Vec<Subscription<i32>>>> = Arc::new(Mutex::new(Vec::new()));
        let held_clone = held.clone();
        let signal_clone = signal.clone();
        let _outer_sub = signal.connect(move |_: &i32| {
            outer_fired_clone.fetch_add(1, Ordering::SeqCst);
            let inner_fired_clone = inner_fired_clone.clone();
            let new_sub = signal_clone.connect(move |_: &i32| {
                inner_fired_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            held_clone.lock().unwrap().push(new_sub);
            Ok(())
        });
        assert!(signal.emit(1));
        assert_eq!(outer_fired.load(Ordering::SeqCst), 1);
        assert_eq!(inner_fired.load(Ordering::SeqCst), 0);
        assert!(signal.emit(2));
        assert_eq!(outer_fired.load(Ordering::SeqCst), 2);
        assert_eq!(inner_fired.load(Ordering::SeqCst), 1);
    }
}
