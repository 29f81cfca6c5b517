//! Notification primitives: signals, owned subscriptions, and the
//! control-thread event queue.
//!
//! A [`Signal`] is a list of callbacks invoked synchronously on `emit`.
//! Connecting returns an owned [`Subscription`]; dropping the handle
//! unsubscribes, so rebinding a logical connection is always
//! "drop old handle, acquire new one" and can never leave two live
//! handles for the same binding.
//!
//! Completions that arrive on other threads (cache workers reporting a
//! range as validated) must not touch clip state directly; they are
//! pushed through a [`ControlQueue`] and drained on the control thread.

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

type Slot<T> = Box<dyn Fn(&T) + Send + 'static>;

struct Slots<T> {
    next_id: u64,
    entries: Vec<(u64, Slot<T>)>,
}

/// A multicast notification source.
///
/// Callbacks run synchronously on the emitting thread while the slot
/// list is locked; a callback must not connect to or disconnect from
/// the signal it is being invoked by.
pub struct Signal<T> {
    slots: Arc<Mutex<Slots<T>>>,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Signal<T> {
    /// Create a signal with no subscribers.
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Invoke every connected callback with `value`.
    pub fn emit(&self, value: &T) {
        let slots = self.slots.lock();
        for (_, slot) in &slots.entries {
            slot(value);
        }
    }

    /// Number of live subscriptions (mainly for tests).
    pub fn subscriber_count(&self) -> usize {
        self.slots.lock().entries.len()
    }
}

impl<T: 'static> Signal<T> {
    /// Connect a callback. The returned handle unsubscribes on drop.
    #[must_use = "dropping the subscription immediately disconnects it"]
    pub fn connect<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + 'static,
    {
        let mut slots = self.slots.lock();
        let id = slots.next_id;
        slots.next_id += 1;
        slots.entries.push((id, Box::new(callback)));
        Subscription {
            id,
            detach: Box::new(SignalDetach {
                slots: Arc::downgrade(&self.slots),
            }),
        }
    }
}

trait Detach: Send {
    fn detach(&self, id: u64);
}

struct SignalDetach<T> {
    slots: Weak<Mutex<Slots<T>>>,
}

impl<T: 'static> Detach for SignalDetach<T> {
    fn detach(&self, id: u64) {
        if let Some(slots) = self.slots.upgrade() {
            slots.lock().entries.retain(|(slot_id, _)| *slot_id != id);
        }
    }
}

/// An owned subscription to one (source, notification-kind) pair.
/// Dropping it is a guaranteed unsubscribe.
pub struct Subscription {
    id: u64,
    detach: Box<dyn Detach>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach.detach(self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Queue marshaling events from worker threads back to the control
/// thread. Producers hold a cheap clonable [`ControlSender`]; the
/// control thread drains with [`ControlQueue::pump`].
pub struct ControlQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> Default for ControlQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ControlQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// A sender usable from any thread.
    pub fn sender(&self) -> ControlSender<T> {
        ControlSender {
            tx: self.tx.clone(),
        }
    }

    /// Drain all pending events without blocking, invoking `handler`
    /// for each. Returns the number of events handled.
    pub fn pump(&self, mut handler: impl FnMut(T)) -> usize {
        let mut handled = 0;
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    handler(event);
                    handled += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        handled
    }
}

/// Cloneable producer side of a [`ControlQueue`].
pub struct ControlSender<T> {
    tx: Sender<T>,
}

impl<T> Clone for ControlSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> ControlSender<T> {
    /// Enqueue an event. Never blocks; events to a dropped queue are
    /// discarded.
    pub fn send(&self, event: T) {
        let _ = self.tx.send(event);
    }
}
