//! Observer lists for component events.
//!
//! Each component owns its [`EventChannel`]s; listeners subscribe and
//! unsubscribe through the returned [`ListenerId`]. Emission is synchronous
//! and happens outside the channel lock, so a listener may subscribe,
//! unsubscribe, or call back into the emitting component.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Handle returned by [`EventChannel::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A named list of listeners receiving values of type `T`.
pub struct EventChannel<T> {
    name: &'static str,
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Listener<T>)>>,
}

impl<T> EventChannel<T> {
    /// `name` only shows up in log output.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            next_id: AtomicU64::new(0),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Number of currently subscribed listeners.
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call every listener with `value`, one after the other.
    ///
    /// A panicking listener is logged and skipped; the remaining listeners
    /// still run.
    pub fn emit(&self, value: &T) {
        let listeners: Vec<Listener<T>> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            if panic::catch_unwind(AssertUnwindSafe(|| listener(value))).is_err() {
                tracing::error!(event = self.name, "event listener panicked");
            }
        }
    }
}

impl<T> fmt::Debug for EventChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("name", &self.name)
            .field("listeners", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(&u32) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |v: &u32| sink.lock().push(*v))
    }

    #[test]
    fn emit_reaches_every_listener_in_order() {
        let channel = EventChannel::new("test");
        let (first, listener) = recorder();
        channel.subscribe(listener);
        let (second, listener) = recorder();
        channel.subscribe(listener);

        channel.emit(&7);
        channel.emit(&8);

        assert_eq!(*first.lock(), vec![7, 8]);
        assert_eq!(*second.lock(), vec![7, 8]);
    }

    #[test]
    fn unsubscribed_listener_stops_receiving() {
        let channel = EventChannel::new("test");
        let (seen, listener) = recorder();
        let id = channel.subscribe(listener);

        channel.emit(&1);
        assert!(channel.unsubscribe(id));
        assert!(!channel.unsubscribe(id));
        channel.emit(&2);

        assert_eq!(*seen.lock(), vec![1]);
        assert!(channel.is_empty());
    }

    #[test]
    fn panicking_listener_does_not_starve_the_others() {
        let channel = EventChannel::new("test");
        channel.subscribe(|_: &u32| panic!("listener failure"));
        let (seen, listener) = recorder();
        channel.subscribe(listener);

        channel.emit(&3);

        assert_eq!(*seen.lock(), vec![3]);
    }

    #[test]
    fn listener_may_unsubscribe_itself_while_emitting() {
        let channel = Arc::new(EventChannel::new("test"));
        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));

        let weak = Arc::downgrade(&channel);
        let own_id = Arc::clone(&slot);
        let id = channel.subscribe(move |_: &u32| {
            if let (Some(channel), Some(id)) = (weak.upgrade(), *own_id.lock()) {
                channel.unsubscribe(id);
            }
        });
        *slot.lock() = Some(id);

        channel.emit(&0);
        assert!(channel.is_empty());
    }
}
