//! Action registries for connection and topology events
//!
//! Callbacks are always invoked after the registry lock is released, so an
//! action may register or remove other actions (including itself) while it
//! runs.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

type OnceAction = Box<dyn FnOnce() + Send>;
type DurableAction = Arc<dyn Fn() + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Callbacks for the next occurrence of one event
///
/// Each registered action runs exactly once, on the next `fire`, and is then
/// gone. Callers that want the following occurrence register again.
#[derive(Default)]
pub struct ActionRegistry {
    actions: Mutex<Vec<OnceAction>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        lock(&self.actions).push(Box::new(action));
    }

    /// Run and drop every pending action, in registration order
    ///
    /// Returns how many actions ran.
    pub fn fire(&self) -> usize {
        let pending = std::mem::take(&mut *lock(&self.actions));
        let count = pending.len();
        for action in pending {
            action();
        }
        count
    }

    /// Drop every pending action without running it
    pub fn clear(&self) {
        lock(&self.actions).clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.actions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

enum NamedAction {
    Durable(DurableAction),
    Once(OnceAction),
}

/// Callbacks keyed by name
///
/// A durable entry fires on every `fire` until it is removed by name. A
/// one-shot entry is taken out of the map in the same critical section that
/// decides to fire it, so it can never run twice.
#[derive(Default)]
pub struct NamedActions {
    actions: Mutex<BTreeMap<String, NamedAction>>,
}

impl NamedActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a durable action under `key`
    pub fn add<F>(&self, key: &str, action: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        lock(&self.actions).insert(key.to_string(), NamedAction::Durable(Arc::new(action)));
    }

    /// Register (or replace) an action under `key` that removes itself when it fires
    pub fn add_once<F>(&self, key: &str, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        lock(&self.actions).insert(key.to_string(), NamedAction::Once(Box::new(action)));
    }

    /// Remove the action under `key`; returns whether there was one
    pub fn remove(&self, key: &str) -> bool {
        lock(&self.actions).remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        lock(&self.actions).contains_key(key)
    }

    /// Drop every one-shot entry without running it
    ///
    /// Durable entries stay. Returns the keys that were dropped.
    pub fn drop_once(&self) -> Vec<String> {
        let mut dropped: Vec<(String, NamedAction)> = Vec::new();
        {
            let mut actions = lock(&self.actions);
            let keys: Vec<String> = actions
                .iter()
                .filter(|(_, action)| matches!(action, NamedAction::Once(_)))
                .map(|(key, _)| key.clone())
                .collect();
            for key in keys {
                if let Some(action) = actions.remove(&key) {
                    dropped.push((key, action));
                }
            }
        }
        dropped.into_iter().map(|(key, _)| key).collect()
    }

    /// Run every registered action
    ///
    /// Returns the keys that ran, in key order.
    pub fn fire(&self) -> Vec<String> {
        let mut durable: Vec<(String, DurableAction)> = Vec::new();
        let mut once: Vec<(String, OnceAction)> = Vec::new();
        {
            let mut actions = lock(&self.actions);
            let keys: Vec<String> = actions.keys().cloned().collect();
            for key in keys {
                match actions.get(&key) {
                    Some(NamedAction::Durable(action)) => durable.push((key, Arc::clone(action))),
                    Some(NamedAction::Once(_)) => {
                        if let Some(NamedAction::Once(action)) = actions.remove(&key) {
                            once.push((key, action));
                        }
                    }
                    None => {}
                }
            }
        }

        let mut fired = Vec::with_capacity(durable.len() + once.len());
        for (key, action) in durable {
            action();
            fired.push(key);
        }
        for (key, action) in once {
            action();
            fired.push(key);
        }
        fired.sort();
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_registry_fires_once_then_empties() {
        let registry = ActionRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        registry.add(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(registry.fire(), 1);
        assert_eq!(registry.fire(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_once_entry_is_removed_when_fired() {
        let actions = NamedActions::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        actions.add_once("initialized", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(actions.fire(), vec!["initialized".to_string()]);
        assert!(!actions.contains("initialized"));
        assert!(actions.fire().is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_once_keeps_durable_entries() {
        let actions = NamedActions::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        actions.add("refresh-view", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&hits);
        actions.add_once("initialized", move || {
            counter.fetch_add(10, Ordering::SeqCst);
        });

        assert_eq!(actions.drop_once(), vec!["initialized".to_string()]);
        assert!(actions.contains("refresh-view"));
        assert!(!actions.contains("initialized"));
        assert_eq!(actions.fire(), vec!["refresh-view".to_string()]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
