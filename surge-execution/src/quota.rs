//! Best-effort per-run batch-count ceiling
//!
//! Protects a capability token from being replayed past its declared
//! `max_batches`. The counter lives in process memory, so under
//! horizontal replication without shared state it is best-effort only;
//! the authoritative backstop is the short token TTL plus control-plane
//! budget accounting. The check-then-increment runs under one lock so
//! two concurrent calls cannot both pass the ceiling.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::warn;

use crate::error::ExecutionError;

struct QuotaEntry {
    used: u32,
    max: u32,
    expires_at: DateTime<Utc>,
}

/// In-memory batch counter keyed by run id, TTL matching token expiry
#[derive(Default)]
pub struct QuotaTracker {
    entries: Mutex<HashMap<String, QuotaEntry>>,
}

impl QuotaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept one batch call against the run's ceiling.
    ///
    /// Returns the batch ordinal on success. Once `max_batches` calls
    /// have been accepted, every further call for that run id is
    /// rejected until the entry expires.
    pub fn try_acquire(
        &self,
        run_id: &str,
        max_batches: u32,
        ttl: Duration,
    ) -> Result<u32, ExecutionError> {
        let mut entries = self.entries.lock();

        let now = Utc::now();
        entries.retain(|_, entry| entry.expires_at > now);

        let entry = entries.entry(run_id.to_string()).or_insert_with(|| QuotaEntry {
            used: 0,
            max: max_batches,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or_default(),
        });

        if entry.used >= entry.max {
            warn!(run_id, max_batches = entry.max, "batch quota exhausted");
            return Err(ExecutionError::QuotaExhausted {
                run_id: run_id.to_string(),
                max_batches: entry.max,
            });
        }

        entry.used += 1;
        Ok(entry.used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const TTL: Duration = Duration::from_secs(600);

    #[test]
    fn test_ceiling_enforced() {
        let tracker = QuotaTracker::new();

        assert_eq!(tracker.try_acquire("run-1", 3, TTL).unwrap(), 1);
        assert_eq!(tracker.try_acquire("run-1", 3, TTL).unwrap(), 2);
        assert_eq!(tracker.try_acquire("run-1", 3, TTL).unwrap(), 3);
        assert!(tracker.try_acquire("run-1", 3, TTL).is_err());
    }

    #[test]
    fn test_runs_tracked_independently() {
        let tracker = QuotaTracker::new();
        assert!(tracker.try_acquire("run-1", 1, TTL).is_ok());
        assert!(tracker.try_acquire("run-1", 1, TTL).is_err());
        assert!(tracker.try_acquire("run-2", 1, TTL).is_ok());
    }

    #[test]
    fn test_expired_entry_resets() {
        let tracker = QuotaTracker::new();
        assert!(tracker.try_acquire("run-1", 1, Duration::ZERO).is_ok());

        // Entry expired with the token; a replayed call starts a fresh
        // counter, which the token's own expiry makes moot.
        assert!(tracker.try_acquire("run-1", 1, TTL).is_ok());
    }

    #[test]
    fn test_concurrent_acquires_never_exceed_ceiling() {
        let tracker = Arc::new(QuotaTracker::new());
        let max = 50u32;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    let mut granted = 0u32;
                    for _ in 0..20 {
                        if tracker.try_acquire("run-1", max, TTL).is_ok() {
                            granted += 1;
                        }
                    }
                    granted
                })
            })
            .collect();

        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, max);
    }
}
