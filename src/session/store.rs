//! Shared metadata store used for cross-instance matchmaking discovery.
//!
//! The store is a plain key-value surface with TTLs and sets, never
//! gameplay truth: records are eventually-consistent hints. A store
//! failure is logged and treated as "nothing found", so matchmaking
//! degrades to in-process-only rather than failing a join.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// The key-value surface the session layer consumes. Implementations must
/// tolerate concurrent create/find/delete from many sessions and, when
/// scaled horizontally, many processes.
pub trait MetaStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError>;
    fn add_to_set(&self, set: &str, member: &str) -> Result<(), StoreError>;
    fn remove_from_set(&self, set: &str, member: &str) -> Result<(), StoreError>;
    fn set_members(&self, set: &str) -> Result<Vec<String>, StoreError>;
    /// Reclaim expired entries. Networked stores expire server-side and
    /// keep the default no-op.
    fn sweep(&self) {}
}

/// In-memory MetaStore. The production deployment points this trait at a
/// networked store; single-instance deployments and tests use this one.
#[derive(Default)]
pub struct MemoryStore {
    values: DashMap<String, (String, Instant)>,
    sets: DashMap<String, HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn tracked_values(&self) -> usize {
        self.values.len()
    }
}

impl MetaStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        // The read guard must drop before the expired-key removal below.
        let expired = {
            match self.values.get(key) {
                None => return Ok(None),
                Some(entry) => {
                    if entry.1 > Instant::now() {
                        return Ok(Some(entry.0.clone()));
                    }
                    true
                }
            }
        };
        if expired {
            self.values.remove(key);
        }
        Ok(None)
    }

    fn set_with_ttl(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        self.values
            .insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    fn add_to_set(&self, set: &str, member: &str) -> Result<(), StoreError> {
        self.sets
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    fn remove_from_set(&self, set: &str, member: &str) -> Result<(), StoreError> {
        if let Some(mut entry) = self.sets.get_mut(set) {
            entry.remove(member);
        }
        Ok(())
    }

    fn set_members(&self, set: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .sets
            .get(set)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Expiry is otherwise lazy on read; this drops records that are
    /// never fetched again.
    fn sweep(&self) {
        let now = Instant::now();
        self.values.retain(|_, value| value.1 > now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_expire_by_ttl() {
        let store = MemoryStore::new();
        store
            .set_with_ttl("k", "v".into(), Duration::from_secs(60))
            .unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v".to_string()));
        store
            .set_with_ttl("k", "v".into(), Duration::from_secs(0))
            .unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn set_membership_round_trip() {
        let store = MemoryStore::new();
        store.add_to_set("open", "a").unwrap();
        store.add_to_set("open", "b").unwrap();
        store.remove_from_set("open", "a").unwrap();
        assert_eq!(store.set_members("open").unwrap(), vec!["b".to_string()]);
    }

    #[test]
    fn sweep_purges_expired_values_without_a_read() {
        let store = MemoryStore::new();
        store
            .set_with_ttl("dead", "v".into(), Duration::from_secs(0))
            .unwrap();
        store
            .set_with_ttl("live", "v".into(), Duration::from_secs(60))
            .unwrap();
        store.sweep();
        assert_eq!(store.tracked_values(), 1);
        assert_eq!(store.get("live").unwrap(), Some("v".to_string()));
    }

    #[test]
    fn missing_set_is_empty() {
        let store = MemoryStore::new();
        assert!(store.set_members("nope").unwrap().is_empty());
    }
}
