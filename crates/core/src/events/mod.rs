//! Cache invalidation signals for the host
//!
//! The core keeps no resolved-permission cache of its own. After a mutation
//! commits, it fires [`Invalidation`] events so the host can drop whatever it
//! cached. Callbacks run synchronously on the thread that performed the
//! mutation.
//!
//! # Example
//!
//! ```ignore
//! let key = core.listeners().on_invalidate(|event| {
//!     tracing::info!("Invalidate: {}", event);
//! });
//!
//! // Or consume from a channel on another thread
//! let rx = core.listeners().subscribe();
//! while let Ok(event) = rx.recv() { /* ... */ }
//!
//! core.listeners().remove_listener(key);
//! ```

mod types;

use crossbeam_channel::{unbounded, Receiver};
use parking_lot::RwLock;
use slotmap::{new_key_type, SlotMap};

pub use types::{Invalidation, InvalidationCallback, RefreshCause};

new_key_type! {
    /// Key for registered listeners, used for removal
    pub struct ListenerKey;
}

/// Registry of invalidation callbacks
#[derive(Default)]
pub struct InvalidationListeners {
    callbacks: RwLock<SlotMap<ListenerKey, InvalidationCallback>>,
}

impl InvalidationListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked for every invalidation
    ///
    /// # Returns
    /// A key that can be used to unregister the callback via `remove_listener`.
    pub fn on_invalidate<F>(&self, callback: F) -> ListenerKey
    where
        F: Fn(&Invalidation) + Send + Sync + 'static,
    {
        self.callbacks.write().insert(Box::new(callback))
    }

    /// Receive invalidations through a channel
    ///
    /// The listener stays registered until removed; once the receiver is
    /// dropped, sends are silently discarded.
    pub fn subscribe(&self) -> Receiver<Invalidation> {
        let (sender, receiver) = unbounded();
        self.on_invalidate(move |event| {
            let _ = sender.send(event.clone());
        });
        receiver
    }

    /// Remove a listener by its key
    ///
    /// Returns `true` if the listener was found and removed.
    pub fn remove_listener(&self, key: ListenerKey) -> bool {
        self.callbacks.write().remove(key).is_some()
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }

    /// Deliver an event to every listener
    pub fn fire(&self, event: &Invalidation) {
        tracing::debug!("Firing invalidation: {}", event);
        let callbacks = self.callbacks.read();
        for (_, callback) in callbacks.iter() {
            callback(event);
        }
    }

    /// Deliver several events in order
    pub fn fire_all<I>(&self, events: I)
    where
        I: IntoIterator<Item = Invalidation>,
    {
        for event in events {
            self.fire(&event);
        }
    }
}
