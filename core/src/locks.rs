//! Actor-scoped locks.
//!
//! RULE: Every mutation of a member's record runs under that member's lock.
//! Operations touching two members take both locks in `MemberKey` order,
//! so two crossing targeted attempts cannot deadlock.
//!
//! Entries nobody holds are dropped once the map passes `PRUNE_AT`. A lock
//! is only handed out under the map mutex, so an entry whose `Arc` has no
//! other owner cannot be in use.

use crate::types::MemberKey;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

const PRUNE_AT: usize = 1024;

#[derive(Default)]
pub struct ActorLocks {
    locks: Mutex<HashMap<MemberKey, Arc<Mutex<()>>>>,
}

impl ActorLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, key: MemberKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.len() >= PRUNE_AT && !locks.contains_key(&key) {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            log::debug!("pruned actor locks down to {}", locks.len());
        }
        locks.entry(key).or_default().clone()
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Run `f` holding `key`'s lock.
    pub fn with_lock<T>(&self, key: MemberKey, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(key);
        // A panic elsewhere leaves no partial state behind the unit mutex.
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Run `f` holding both locks, acquired in key order.
    pub fn with_pair<T>(&self, a: MemberKey, b: MemberKey, f: impl FnOnce() -> T) -> T {
        if a == b {
            return self.with_lock(a, f);
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        let first_lock = self.lock_for(first);
        let second_lock = self.lock_for(second);
        let _first = first_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let _second = second_lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_locks_are_pruned() {
        let locks = ActorLocks::new();
        for actor in 0..5_000 {
            locks.with_lock(MemberKey::new(1, actor), || ());
        }
        assert!(locks.tracked() <= PRUNE_AT, "{} locks kept", locks.tracked());
    }

    #[test]
    fn held_locks_survive_pruning() {
        let locks = ActorLocks::new();
        let held = MemberKey::new(1, 0);
        locks.with_lock(held, || {
            for actor in 1..3_000 {
                locks.with_lock(MemberKey::new(2, actor), || ());
            }
            let map = locks.locks.lock().unwrap();
            assert!(map.contains_key(&held));
            assert_eq!(Arc::strong_count(&map[&held]), 2);
        });
    }
}
