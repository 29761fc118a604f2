//! In-process key locks.
//!
//! Every ledger operation locks the keys it touches for its whole
//! read-compute-commit cycle. Keys are acquired all at once, so an
//! operation spanning several keys never holds some while waiting on
//! others, and acquisition gives up after a timeout instead of blocking
//! forever.

use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{LedgerError, LedgerResult};
use crate::models::BalanceKey;

/// A lockable ledger resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockKey {
    /// One balance row.
    Balance(BalanceKey),
    /// All comp-off credits of an employee.
    CompOff(String),
    /// One leave request's consumption record.
    LeaveRequest(String),
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKey::Balance(key) => write!(f, "balance {key}"),
            LockKey::CompOff(employee_id) => write!(f, "comp-off credits of {employee_id}"),
            LockKey::LeaveRequest(id) => write!(f, "leave request {id}"),
        }
    }
}

/// A table of held keys.
#[derive(Debug, Default)]
pub struct KeyLocks {
    held: Mutex<HashSet<LockKey>>,
    released: Condvar,
}

impl KeyLocks {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires every key in `keys`, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Busy`] naming the first contended key if the
    /// keys could not all be acquired in time.
    pub fn acquire(&self, keys: Vec<LockKey>, timeout: Duration) -> LedgerResult<KeyGuard<'_>> {
        let mut keys = keys;
        keys.sort();
        keys.dedup();

        let deadline = Instant::now() + timeout;
        let mut held = self.held.lock();
        loop {
            match keys.iter().find(|key| held.contains(*key)) {
                None => {
                    held.extend(keys.iter().cloned());
                    return Ok(KeyGuard { locks: self, keys });
                }
                Some(contended) => {
                    if Instant::now() >= deadline {
                        return Err(LedgerError::Busy {
                            resource: contended.to_string(),
                            message: format!("lock not acquired within {}ms", timeout.as_millis()),
                        });
                    }
                }
            }
            self.released.wait_until(&mut held, deadline);
        }
    }

    /// Returns true if `key` is currently held.
    pub fn is_held(&self, key: &LockKey) -> bool {
        self.held.lock().contains(key)
    }
}

/// Releases its keys when dropped.
#[derive(Debug)]
pub struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    keys: Vec<LockKey>,
}

impl KeyGuard<'_> {
    /// The keys this guard holds, sorted.
    pub fn keys(&self) -> &[LockKey] {
        &self.keys
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        let mut held = self.locks.held.lock();
        for key in &self.keys {
            held.remove(key);
        }
        drop(held);
        self.locks.released.notify_all();
    }
}
