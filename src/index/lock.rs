//! Per-alias advisory locks for reindexing

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Aliases with a reindex currently in flight
#[derive(Debug, Default)]
pub struct AliasLocks {
    held: DashMap<String, DateTime<Utc>>,
}

impl AliasLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for `alias`, or `None` if another holder has it
    pub fn try_acquire(&self, alias: &str) -> Option<AliasGuard<'_>> {
        match self.held.entry(alias.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(Utc::now());
                Some(AliasGuard {
                    locks: self,
                    alias: alias.to_string(),
                })
            }
        }
    }

    pub fn is_locked(&self, alias: &str) -> bool {
        self.held.contains_key(alias)
    }

    /// When the current holder took the lock
    pub fn held_since(&self, alias: &str) -> Option<DateTime<Utc>> {
        self.held.get(alias).map(|entry| *entry.value())
    }
}

/// Releases the alias on drop
#[derive(Debug)]
pub struct AliasGuard<'a> {
    locks: &'a AliasLocks,
    alias: String,
}

impl Drop for AliasGuard<'_> {
    fn drop(&mut self) {
        self.locks.held.remove(&self.alias);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let locks = AliasLocks::new();
        let guard = locks.try_acquire("tasks").unwrap();
        assert!(locks.try_acquire("tasks").is_none());
        assert!(locks.try_acquire("projects").is_some());
        assert!(locks.held_since("tasks").is_some());

        drop(guard);
        assert!(!locks.is_locked("tasks"));
        assert!(locks.try_acquire("tasks").is_some());
    }
}
