//! Process-wide update state
//!
//! One `UpdateState` is constructed at startup and shared (via `Arc`) by
//! every coordinator, whatever repository it serves. The rebase lock is
//! keyed by nothing: at most one rebase is in flight for the
//! whole process.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Default time to wait after a failed rebase before retrying the same PR
pub const DEFAULT_FAILURE_COOLDOWN_MINUTES: i64 = 60;

/// Lock a registry mutex, recovering the data if a holder panicked
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Single-flight flag guarding rebase attempts
#[derive(Debug, Default)]
pub struct RebaseLock {
    locked: AtomicBool,
}

impl RebaseLock {
    /// Try to take the lock without waiting
    ///
    /// Returns `None` when another attempt already holds it.
    pub fn try_acquire(&self) -> Option<RebaseLockGuard<'_>> {
        self.locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RebaseLockGuard { lock: self })
    }

    /// Whether an attempt currently holds the lock
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }
}

/// Releases the rebase lock when dropped
#[derive(Debug)]
pub struct RebaseLockGuard<'a> {
    lock: &'a RebaseLock,
}

impl Drop for RebaseLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

/// Pull requests currently enrolled in a background update cycle
#[derive(Debug, Default)]
pub struct ActiveUpdates {
    entries: Mutex<HashSet<String>>,
}

impl ActiveUpdates {
    /// Enroll a PR
    pub fn mark_active(&self, locator: &str) {
        lock(&self.entries).insert(locator.to_string());
    }

    /// Enroll a PR only if no PR is enrolled, as one step
    ///
    /// Returns whether the PR was enrolled.
    pub fn try_enroll_exclusive(&self, locator: &str) -> bool {
        let mut entries = lock(&self.entries);
        if !entries.is_empty() {
            return false;
        }
        entries.insert(locator.to_string())
    }

    /// Remove a PR, reporting whether it was enrolled
    pub fn clear_active(&self, locator: &str) -> bool {
        lock(&self.entries).remove(locator)
    }

    /// Whether any PR is enrolled
    pub fn any_active(&self) -> bool {
        !lock(&self.entries).is_empty()
    }

    /// Whether a specific PR is enrolled
    pub fn is_active(&self, locator: &str) -> bool {
        lock(&self.entries).contains(locator)
    }
}

/// Last rebase failure per pull request number
#[derive(Debug)]
pub struct FailureRegistry {
    cooldown: Duration,
    failures: Mutex<HashMap<u64, DateTime<Utc>>>,
}

impl Default for FailureRegistry {
    fn default() -> Self {
        Self::with_cooldown(Duration::minutes(DEFAULT_FAILURE_COOLDOWN_MINUTES))
    }
}

impl FailureRegistry {
    /// Create a registry with a custom cooldown window
    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self {
            cooldown,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Cooldown window
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Record a failure now
    pub fn record_failure(&self, number: u64) {
        self.record_failure_at(number, Utc::now());
    }

    /// Record a failure at a given time
    pub fn record_failure_at(&self, number: u64, at: DateTime<Utc>) {
        lock(&self.failures).insert(number, at);
    }

    /// Forget the failure for a PR (after success or explicit removal)
    pub fn clear(&self, number: u64) {
        lock(&self.failures).remove(&number);
    }

    /// Time of the last recorded failure
    pub fn last_failure(&self, number: u64) -> Option<DateTime<Utc>> {
        lock(&self.failures).get(&number).copied()
    }

    /// Whether a rebase may be attempted now
    pub fn should_attempt(&self, number: u64) -> bool {
        self.should_attempt_at(number, Utc::now())
    }

    /// Whether a rebase may be attempted at `now`
    ///
    /// False strictly inside `[failure, failure + cooldown)`.
    pub fn should_attempt_at(&self, number: u64, now: DateTime<Utc>) -> bool {
        self.last_failure(number)
            .is_none_or(|failed_at| now - failed_at >= self.cooldown)
    }
}

/// Shared state of all update coordinators
#[derive(Debug, Default)]
pub struct UpdateState {
    /// Global single-flight lock
    pub lock: RebaseLock,
    /// Active-update registry
    pub active: ActiveUpdates,
    /// Failure/backoff registry
    pub failures: FailureRegistry,
}

impl UpdateState {
    /// Create state with a custom failure cooldown
    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self {
            lock: RebaseLock::default(),
            active: ActiveUpdates::default(),
            failures: FailureRegistry::with_cooldown(cooldown),
        }
    }
}
