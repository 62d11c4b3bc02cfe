//! # Area Registry
//!
//! One lifecycle record per configured area, sharded by area key: one lock
//! per area so different areas evaluate without contention, while
//! transitions on the same area are serialized to keep history monotonic.
//! There is deliberately no global write lock across areas.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use super::errors::{LifecycleError, LifecycleResult};
use super::machine::AreaLifecycle;

/// Registry of per-area lifecycle records, fixed at startup.
#[derive(Debug)]
pub struct AreaRegistry {
    areas: RwLock<HashMap<String, Arc<Mutex<AreaLifecycle>>>>,
}

impl AreaRegistry {
    /// Build the registry for the configured area set.
    pub fn new(area_keys: &[String]) -> Self {
        let areas = area_keys
            .iter()
            .map(|key| {
                (
                    key.clone(),
                    Arc::new(Mutex::new(AreaLifecycle::new(key.clone()))),
                )
            })
            .collect();
        Self {
            areas: RwLock::new(areas),
        }
    }

    /// All configured area keys, sorted for deterministic iteration.
    pub fn area_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .areas
            .read()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Number of configured areas.
    pub fn len(&self) -> usize {
        self.areas.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an area key is configured.
    pub fn contains(&self, area_id: &str) -> bool {
        self.areas
            .read()
            .map(|m| m.contains_key(area_id))
            .unwrap_or(false)
    }

    /// Run a closure with exclusive access to one area's lifecycle.
    ///
    /// Only the one area is locked; other areas proceed concurrently.
    pub fn with_area<T>(
        &self,
        area_id: &str,
        f: impl FnOnce(&mut AreaLifecycle) -> T,
    ) -> LifecycleResult<T> {
        let handle = {
            let areas = self
                .areas
                .read()
                .map_err(|_| LifecycleError::Internal("lock poisoned".to_string()))?;
            areas
                .get(area_id)
                .cloned()
                .ok_or_else(|| LifecycleError::UnknownArea(area_id.to_string()))?
        };

        let mut lifecycle = handle
            .lock()
            .map_err(|_| LifecycleError::Internal("lock poisoned".to_string()))?;
        Ok(f(&mut lifecycle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::state::AreaState;
    use chrono::Utc;

    fn keys(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_registry_construction() {
        let registry = AreaRegistry::new(&keys(&["10115", "10117", "10119"]));
        assert_eq!(registry.len(), 3);
        assert!(registry.contains("10117"));
        assert!(!registry.contains("99999"));
        assert_eq!(registry.area_ids(), keys(&["10115", "10117", "10119"]));
    }

    #[test]
    fn test_with_area() {
        let registry = AreaRegistry::new(&keys(&["10115"]));
        let state = registry
            .with_area("10115", |lifecycle| lifecycle.current_state().clone())
            .unwrap();
        assert_eq!(state, AreaState::NoData);
    }

    #[test]
    fn test_unknown_area_is_error() {
        let registry = AreaRegistry::new(&keys(&["10115"]));
        let result = registry.with_area("99999", |_| ());
        assert_eq!(
            result,
            Err(LifecycleError::UnknownArea("99999".to_string()))
        );
    }

    #[test]
    fn test_mutations_persist_across_calls() {
        let registry = AreaRegistry::new(&keys(&["10115"]));
        let now = Utc::now();
        registry
            .with_area("10115", |lifecycle| {
                lifecycle.force_state(AreaState::ElevatedAttention, "incident", "op-1", now);
            })
            .unwrap();
        let state = registry
            .with_area("10115", |lifecycle| lifecycle.current_state().clone())
            .unwrap();
        assert_eq!(state, AreaState::ElevatedAttention);
    }

    #[test]
    fn test_same_area_serialized_across_threads() {
        let registry = Arc::new(AreaRegistry::new(&keys(&["10115"])));
        let now = Utc::now();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let state = if i % 2 == 0 {
                        AreaState::ElevatedAttention
                    } else {
                        AreaState::Quiet
                    };
                    registry
                        .with_area("10115", |lifecycle| {
                            lifecycle.force_state(state, "stress", "op-1", now);
                        })
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // History stays monotonic: every record's `from` chains to the
        // previous record's `to`.
        registry
            .with_area("10115", |lifecycle| {
                let history = lifecycle.history();
                for pair in history.windows(2) {
                    assert_eq!(pair[0].to, pair[1].from);
                }
            })
            .unwrap();
    }
}
