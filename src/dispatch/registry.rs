//! Listener registry keyed by callback name.
//!
//! Listeners registered under the same name run in registration order. Each
//! registration gets a [`ListenerId`] that removes exactly that listener.
//!
//! # Example
//!
//! ```
//! use gbxremote_client::dispatch::ListenerRegistry;
//! use gbxremote_client::CallbackEnvelope;
//!
//! let mut registry = ListenerRegistry::new();
//! let id = registry.register("ManiaPlanet.PlayerConnect", |cb| {
//!     println!("{} joined", cb.args[0]);
//! });
//!
//! let invoked = registry.dispatch(&CallbackEnvelope::new("ManiaPlanet.PlayerConnect", vec!["abc".into()]));
//! assert_eq!(invoked, 1);
//! assert!(registry.remove(id));
//! ```

use std::collections::HashMap;

use crate::connection::CallbackEnvelope;

/// Identifies one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A callback listener.
pub type Listener = Box<dyn FnMut(&CallbackEnvelope) + Send>;

struct ListenerEntry {
    id: ListenerId,
    listener: Listener,
}

/// Registry mapping callback names to listeners.
pub struct ListenerRegistry {
    listeners: HashMap<String, Vec<ListenerEntry>>,
    next_id: u64,
}

impl ListenerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            listeners: HashMap::new(),
            next_id: 1,
        }
    }

    /// Register a listener for callbacks named exactly `name`.
    pub fn register<F>(&mut self, name: &str, listener: F) -> ListenerId
    where
        F: FnMut(&CallbackEnvelope) + Send + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;

        self.listeners
            .entry(name.to_string())
            .or_default()
            .push(ListenerEntry {
                id,
                listener: Box::new(listener),
            });
        id
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let mut emptied = None;
        let mut removed = false;

        for (name, entries) in self.listeners.iter_mut() {
            if let Some(pos) = entries.iter().position(|e| e.id == id) {
                entries.remove(pos);
                removed = true;
                if entries.is_empty() {
                    emptied = Some(name.clone());
                }
                break;
            }
        }

        if let Some(name) = emptied {
            self.listeners.remove(&name);
        }
        removed
    }

    /// Check if any listener is registered for `name`.
    pub fn has_listeners(&self, name: &str) -> bool {
        self.listeners.contains_key(name)
    }

    /// Number of listeners registered for `name`.
    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners.get(name).map_or(0, Vec::len)
    }

    /// Invoke every listener registered for the envelope's name.
    ///
    /// Returns the number of listeners invoked.
    pub fn dispatch(&mut self, envelope: &CallbackEnvelope) -> usize {
        let Some(entries) = self.listeners.get_mut(&envelope.name) else {
            return 0;
        };

        for entry in entries.iter_mut() {
            (entry.listener)(envelope);
        }
        entries.len()
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn envelope(name: &str) -> CallbackEnvelope {
        CallbackEnvelope::new(name, vec![])
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        let mut registry = ListenerRegistry::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let calls = calls.clone();
            registry.register("ManiaPlanet.BeginMap", move |_| {
                calls.lock().unwrap().push(tag);
            });
        }

        assert_eq!(registry.dispatch(&envelope("ManiaPlanet.BeginMap")), 3);
        assert_eq!(*calls.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_unknown_name_is_ignored() {
        let mut registry = ListenerRegistry::new();
        registry.register("ManiaPlanet.BeginMap", |_| {});

        assert_eq!(registry.dispatch(&envelope("ManiaPlanet.EndMap")), 0);
    }

    #[test]
    fn test_name_match_is_exact() {
        let mut registry = ListenerRegistry::new();
        registry.register("ManiaPlanet.PlayerChat", |_| {});

        assert_eq!(registry.dispatch(&envelope("maniaplanet.playerchat")), 0);
        assert_eq!(registry.dispatch(&envelope("ManiaPlanet.PlayerChat")), 1);
    }

    #[test]
    fn test_remove_listener() {
        let mut registry = ListenerRegistry::new();
        let a = registry.register("Timer.OneSecond", |_| {});
        let b = registry.register("Timer.OneSecond", |_| {});
        assert_ne!(a, b);
        assert_eq!(registry.listener_count("Timer.OneSecond"), 2);

        assert!(registry.remove(a));
        assert!(!registry.remove(a));
        assert_eq!(registry.listener_count("Timer.OneSecond"), 1);

        assert!(registry.remove(b));
        assert!(!registry.has_listeners("Timer.OneSecond"));
    }

    #[test]
    fn test_listener_keeps_state() {
        let mut registry = ListenerRegistry::new();
        let total = Arc::new(Mutex::new(0));
        let counter = total.clone();
        let mut seen = 0;
        registry.register("Timer.OneSecond", move |_| {
            seen += 1;
            *counter.lock().unwrap() = seen;
        });

        for _ in 0..3 {
            registry.dispatch(&envelope("Timer.OneSecond"));
        }
        assert_eq!(*total.lock().unwrap(), 3);
    }
}
