//! Callback registry shared by stores, projections and lifecycle signals.
//!
//! Notification is synchronous. Unsubscribing is synchronous too: once
//! `Subscription::unsubscribe` returns (or the guard drops), the callback
//! is never invoked again. A call already running on another thread is
//! waited for; a callback may unsubscribe itself without deadlocking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Held for the duration of each call; cancelling takes it too.
struct Gate {
    active: AtomicBool,
    running: ReentrantMutex<()>,
}

impl Gate {
    fn open() -> Self {
        Self {
            active: AtomicBool::new(true),
            running: ReentrantMutex::new(()),
        }
    }

    fn close(&self) {
        let _running = self.running.lock();
        self.active.store(false, Ordering::SeqCst);
    }
}

struct Listener<T> {
    id: u64,
    gate: Arc<Gate>,
    callback: Callback<T>,
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            gate: Arc::clone(&self.gate),
            callback: Arc::clone(&self.callback),
        }
    }
}

struct Registry<T> {
    next_id: u64,
    listeners: Vec<Listener<T>>,
}

/// A set of callbacks invoked with every notified value.
pub struct Subscribers<T> {
    registry: Arc<Mutex<Registry<T>>>,
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }
}

impl<T: 'static> Subscribers<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback. Dropping the returned guard unsubscribes.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let gate = Arc::new(Gate::open());
        let id = {
            let mut registry = self.registry.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.listeners.push(Listener {
                id,
                gate: Arc::clone(&gate),
                callback: Arc::new(callback),
            });
            id
        };

        let registry: Weak<Mutex<Registry<T>>> = Arc::downgrade(&self.registry);
        Subscription {
            cancel: Some(Box::new(move || {
                gate.close();
                if let Some(registry) = registry.upgrade() {
                    registry
                        .lock()
                        .listeners
                        .retain(|listener| listener.id != id);
                }
            })),
        }
    }

    /// Invoke every active callback with `value`, in subscription order.
    pub fn notify(&self, value: &T) {
        // Snapshot the list so callbacks may (un)subscribe without deadlocking.
        let listeners = self.registry.lock().listeners.clone();
        for listener in listeners {
            let _running = listener.gate.running.lock();
            if listener.gate.active.load(Ordering::SeqCst) {
                (listener.callback)(value);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.registry.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Guard for a registered callback.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Detach the callback now.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn notifies_every_subscriber() {
        let subscribers = Subscribers::<u32>::new();
        let total = Arc::new(AtomicUsize::new(0));

        let first_total = Arc::clone(&total);
        let _first = subscribers.subscribe(move |value| {
            first_total.fetch_add(*value as usize, Ordering::SeqCst);
        });
        let second_total = Arc::clone(&total);
        let _second = subscribers.subscribe(move |value| {
            second_total.fetch_add(*value as usize, Ordering::SeqCst);
        });

        subscribers.notify(&3);
        assert_eq!(total.load(Ordering::SeqCst), 6);
        assert_eq!(subscribers.len(), 2);
    }

    #[test]
    fn unsubscribe_detaches_synchronously() {
        let subscribers = Subscribers::<()>::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let subscription = subscribers.subscribe(move |()| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        subscribers.notify(&());
        subscription.unsubscribe();
        subscribers.notify(&());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(subscribers.is_empty());
    }

    #[test]
    fn dropping_guard_unsubscribes() {
        let subscribers = Subscribers::<()>::new();
        {
            let _guard = subscribers.subscribe(|()| {});
            assert_eq!(subscribers.len(), 1);
        }
        assert!(subscribers.is_empty());
    }

    #[test]
    fn unsubscribe_waits_for_a_call_running_on_another_thread() {
        use std::sync::mpsc;
        use std::time::Duration;

        let subscribers = Arc::new(Subscribers::<()>::new());
        let finished = Arc::new(AtomicBool::new(false));
        let (entered_tx, entered_rx) = mpsc::channel();
        let entered_tx = Mutex::new(entered_tx);
        let done = Arc::clone(&finished);
        let subscription = subscribers.subscribe(move |()| {
            let _ = entered_tx.lock().send(());
            std::thread::sleep(Duration::from_millis(50));
            done.store(true, Ordering::SeqCst);
        });

        let notifier = {
            let subscribers = Arc::clone(&subscribers);
            std::thread::spawn(move || subscribers.notify(&()))
        };
        entered_rx.recv().unwrap();
        subscription.unsubscribe();

        assert!(finished.load(Ordering::SeqCst));
        notifier.join().unwrap();
    }

    #[test]
    fn callback_may_unsubscribe_itself() {
        let subscribers = Subscribers::<()>::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let own_slot = Arc::clone(&slot);
        let counter = Arc::clone(&calls);
        *slot.lock() = Some(subscribers.subscribe(move |()| {
            counter.fetch_add(1, Ordering::SeqCst);
            own_slot.lock().take();
        }));

        subscribers.notify(&());
        subscribers.notify(&());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(subscribers.is_empty());
    }

    #[test]
    fn callback_may_unsubscribe_others_mid_notify() {
        let subscribers = Arc::new(Subscribers::<()>::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let slot_for_first = Arc::clone(&slot);
        let _first = subscribers.subscribe(move |()| {
            slot_for_first.lock().take();
        });
        let counter = Arc::clone(&calls);
        *slot.lock() = Some(subscribers.subscribe(move |()| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        subscribers.notify(&());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
