//! Non-blocking run lock serializing plan/apply per (repo, environment, pull).

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use runway_core::lock_unpoisoned;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Public struct `RunLockKey` used across Runway components.
pub struct RunLockKey {
    pub repo_full_name: String,
    pub environment: String,
    pub pull_num: u64,
}

impl RunLockKey {
    pub fn new(repo_full_name: &str, environment: &str, pull_num: u64) -> Self {
        Self {
            repo_full_name: repo_full_name.to_string(),
            environment: environment.to_string(),
            pull_num,
        }
    }
}

#[derive(Debug, Default)]
struct RunLockInner {
    held: Mutex<HashSet<RunLockKey>>,
}

/// Process-wide registry of held run locks.
///
/// Cloning shares the registry. Acquisition never waits: a caller that loses
/// the race is told immediately. Locks are not reentrant.
#[derive(Debug, Clone, Default)]
pub struct RunLocker {
    inner: Arc<RunLockInner>,
}

impl RunLocker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true iff the lock was newly acquired by this call.
    pub fn try_lock(&self, repo_full_name: &str, environment: &str, pull_num: u64) -> bool {
        lock_unpoisoned(&self.inner.held).insert(RunLockKey::new(
            repo_full_name,
            environment,
            pull_num,
        ))
    }

    /// Releases the lock. Releasing a key that is not held is a no-op.
    pub fn unlock(&self, repo_full_name: &str, environment: &str, pull_num: u64) {
        lock_unpoisoned(&self.inner.held).remove(&RunLockKey::new(
            repo_full_name,
            environment,
            pull_num,
        ));
    }

    pub fn is_locked(&self, repo_full_name: &str, environment: &str, pull_num: u64) -> bool {
        lock_unpoisoned(&self.inner.held).contains(&RunLockKey::new(
            repo_full_name,
            environment,
            pull_num,
        ))
    }

    pub fn held_count(&self) -> usize {
        lock_unpoisoned(&self.inner.held).len()
    }

    /// Acquires the lock and returns a guard that releases it when dropped.
    pub fn try_acquire(
        &self,
        repo_full_name: &str,
        environment: &str,
        pull_num: u64,
    ) -> Option<RunLockGuard> {
        let key = RunLockKey::new(repo_full_name, environment, pull_num);
        if !lock_unpoisoned(&self.inner.held).insert(key.clone()) {
            return None;
        }
        Some(RunLockGuard {
            locker: self.clone(),
            key,
        })
    }
}

/// Releases its run lock on drop, including while unwinding from a panic.
#[derive(Debug)]
pub struct RunLockGuard {
    locker: RunLocker,
    key: RunLockKey,
}

impl RunLockGuard {
    pub fn key(&self) -> &RunLockKey {
        &self.key
    }
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        lock_unpoisoned(&self.locker.inner.held).remove(&self.key);
    }
}
