use std::{
    fmt::Display,
    sync::{Arc, Mutex, PoisonError, Weak},
};

/// Name of the signal every [ChangeEvent] is published under.
pub const RECORD_UPDATED: &str = "record_updated";

/// Describes what happened to the record collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Appended { id: String },
    Deleted { id: String },
    Imported { count: usize },
    Cleared,
}

impl ChangeEvent {
    pub fn signal(&self) -> &'static str {
        RECORD_UPDATED
    }
}

impl Display for ChangeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeEvent::Appended { id } => write!(f, "{RECORD_UPDATED}: appended {id}"),
            ChangeEvent::Deleted { id } => write!(f, "{RECORD_UPDATED}: deleted {id}"),
            ChangeEvent::Imported { count } => write!(f, "{RECORD_UPDATED}: imported {count}"),
            ChangeEvent::Cleared => write!(f, "{RECORD_UPDATED}: cleared"),
        }
    }
}

type Callback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    callbacks: Vec<(u64, Callback)>,
}

/// Registry of change callbacks. Clones share the same listeners.
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    listeners: Arc<Mutex<Listeners>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback`. It stays registered for as long as the returned [Subscription] is
    /// alive.
    #[must_use = "dropping the subscription unregisters the callback"]
    pub fn subscribe(&self, callback: impl Fn(&ChangeEvent) + Send + Sync + 'static) -> Subscription {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.callbacks.push((id, Arc::new(callback)));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Calls every registered callback with `event`. Callbacks run outside of the lock, so they
    /// are free to subscribe or unsubscribe.
    pub fn notify(&self, event: &ChangeEvent) {
        let callbacks = {
            let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            listeners
                .callbacks
                .iter()
                .map(|(_, callback)| callback.clone())
                .collect::<Vec<_>>()
        };
        for callback in callbacks {
            callback(event);
        }
    }

    #[cfg(test)]
    fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .callbacks
            .len()
    }
}

/// Handle of a registered callback. Unregisters the callback when dropped.
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .callbacks
                .retain(|(id, _)| *id != self.id);
        }
    }
}
