//! Cooperative cancellation keyed by run id
//!
//! Single-writer/multi-reader: the cancel endpoint sets a flag, pool
//! workers read it before every launch. In-flight requests are never
//! force-killed; they finish and are counted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;

/// Cheap shared cancellation flag for one run
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, uncancelled token (local runs and tests)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }
}

struct CancelEntry {
    token: CancelToken,
    expires_at: DateTime<Utc>,
}

/// Per-run cancellation flags with TTL matching token expiry
#[derive(Default)]
pub struct CancellationRegistry {
    entries: Mutex<HashMap<String, CancelEntry>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cancellation handle for a run, created on first use.
    pub fn handle(&self, run_id: &str, ttl: Duration) -> CancelToken {
        let mut entries = self.entries.lock();
        Self::purge_expired(&mut entries);

        entries
            .entry(run_id.to_string())
            .or_insert_with(|| CancelEntry {
                token: CancelToken::new(),
                expires_at: Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default(),
            })
            .token
            .clone()
    }

    /// Set the cancellation flag for a run. Idempotent: repeated calls
    /// have the same effect as one.
    pub fn cancel(&self, run_id: &str, ttl: Duration) {
        let token = self.handle(run_id, ttl);
        if !token.is_cancelled() {
            debug!(run_id, "cancellation flag set");
        }
        token.cancel();
    }

    fn purge_expired(entries: &mut HashMap<String, CancelEntry>) {
        let now = Utc::now();
        entries.retain(|_, entry| entry.expires_at > now);
    }
}
