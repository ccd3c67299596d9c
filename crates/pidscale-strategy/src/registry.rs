//! Policy registry — owns controller state for every policy seen so far.
//!
//! The key → state map sits behind an `RwLock` that is only held for lookup
//! and insert. Each state has its own `Mutex`, so advancing one policy never
//! waits on another. States live until the registry is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::debug;

use crate::config::ControllerConfig;
use crate::error::ConfigError;
use crate::identity::PolicyKey;
use crate::pid::PolicyState;

/// Shared handle to one policy's state.
pub type SharedPolicy = Arc<Mutex<PolicyState>>;

/// Thread-safe map from policy key to controller state.
#[derive(Default)]
pub struct PolicyRegistry {
    states: RwLock<HashMap<PolicyKey, SharedPolicy>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the state for `key`, creating it with the config produced by
    /// `resolve` if this is the first time the key is seen.
    ///
    /// `resolve` runs at most once per key, and only for a key that is not
    /// yet registered. If it fails nothing is inserted.
    pub fn get_or_create<F>(&self, key: &PolicyKey, resolve: F) -> Result<SharedPolicy, ConfigError>
    where
        F: FnOnce() -> Result<ControllerConfig, ConfigError>,
    {
        if let Some(state) = self.get(key) {
            return Ok(state);
        }

        let mut states = self.states.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have inserted between the read and write locks.
        if let Some(state) = states.get(key) {
            return Ok(Arc::clone(state));
        }

        let config = resolve()?;
        debug!(%key, ?config, "creating new policy state");
        let state = Arc::new(Mutex::new(PolicyState::new(config)));
        states.insert(key.clone(), Arc::clone(&state));
        Ok(state)
    }

    /// Look up an existing policy.
    pub fn get(&self, key: &PolicyKey) -> Option<SharedPolicy> {
        let states = self.states.read().unwrap_or_else(PoisonError::into_inner);
        states.get(key).cloned()
    }

    /// Copy of a policy's current state.
    pub fn snapshot(&self, key: &PolicyKey) -> Option<PolicyState> {
        let state = self.get(key)?;
        let guard = lock_state(&state);
        Some(guard.clone())
    }

    pub fn len(&self) -> usize {
        self.states.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lock a policy's state.
///
/// State is written in one step after all computation is done, so a panic
/// while the lock was held cannot leave it half-updated.
pub fn lock_state(state: &Mutex<PolicyState>) -> MutexGuard<'_, PolicyState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(s: &str) -> PolicyKey {
        PolicyKey::from(s)
    }

    #[test]
    fn creates_on_first_sight() {
        let registry = PolicyRegistry::new();
        assert!(registry.is_empty());

        let state = registry
            .get_or_create(&key("a"), || Ok(ControllerConfig::default()))
            .unwrap();
        assert!(!lock_state(&state).has_baseline());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn existing_state_is_returned_without_resolving() {
        let registry = PolicyRegistry::new();
        let first = registry
            .get_or_create(&key("a"), || Ok(ControllerConfig::default()))
            .unwrap();

        let second = registry
            .get_or_create(&key("a"), || panic!("resolve must not run for a known key"))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn failed_resolve_inserts_nothing() {
        let registry = PolicyRegistry::new();
        let err = registry
            .get_or_create(&key("bad"), || {
                Err(ConfigError::NonPositive {
                    key: "time_divider_ns",
                    value: "0".to_string(),
                })
            })
            .unwrap_err();
        assert_eq!(err.key(), "time_divider_ns");
        assert!(registry.get(&key("bad")).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn keys_are_independent() {
        let registry = PolicyRegistry::new();
        let a = registry
            .get_or_create(&key("a"), || Ok(ControllerConfig::default()))
            .unwrap();
        let b = registry
            .get_or_create(&key("b"), || Ok(ControllerConfig::default()))
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
        assert!(Arc::ptr_eq(&registry.get(&key("a")).unwrap(), &a));
        assert!(Arc::ptr_eq(&registry.get(&key("b")).unwrap(), &b));
    }

    #[test]
    fn concurrent_get_or_create_yields_one_state() {
        let registry = PolicyRegistry::new();
        let resolved = AtomicUsize::new(0);

        let handles: Vec<SharedPolicy> = std::thread::scope(|s| {
            let workers: Vec<_> = (0..16)
                .map(|_| {
                    s.spawn(|| {
                        registry
                            .get_or_create(&key("shared"), || {
                                resolved.fetch_add(1, Ordering::SeqCst);
                                Ok(ControllerConfig::default())
                            })
                            .unwrap()
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert_eq!(resolved.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
        assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn snapshot_of_unknown_key_is_none() {
        let registry = PolicyRegistry::new();
        assert!(registry.snapshot(&key("missing")).is_none());
    }
}
