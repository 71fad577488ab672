//! Per-uid memory of the last successfully reconciled generation
//!
//! The apiserver only bumps `metadata.generation` on spec changes, so an
//! event whose generation was already reconciled carries no new work for the
//! controller. The cache is in-memory and per-process: it is a deduplication
//! aid, not a source of truth. After a restart the cold cache costs at most
//! one redundant reconciliation per resource, which must be idempotent
//! anyway.

use ahash::AHashMap;
use parking_lot::RwLock;

/// Tracks the highest generation that completed reconciliation per uid
///
/// An entry exists only for uids that have had at least one reconciliation
/// return successfully.
#[derive(Debug, Default)]
pub struct GenerationCache {
    generation_aware: bool,
    processed: RwLock<AHashMap<String, i64>>,
}

impl GenerationCache {
    /// Create a cache; a non-generation-aware cache gates nothing
    #[must_use]
    pub fn new(generation_aware: bool) -> Self {
        Self {
            generation_aware,
            processed: RwLock::new(AHashMap::new()),
        }
    }

    /// Whether an event at this generation still needs to be reconciled
    ///
    /// True when no generation was recorded for the uid yet, or when the
    /// event's generation is strictly larger than the recorded one.
    #[must_use]
    pub fn should_process(&self, uid: &str, generation: i64) -> bool {
        if !self.generation_aware {
            return true;
        }
        match self.processed.read().get(uid) {
            None => true,
            Some(&last) => generation > last,
        }
    }

    /// Record a successful reconciliation at this generation
    ///
    /// Only called after the reconciler returned without error; a failed
    /// reconciliation leaves the cache untouched so a replay reprocesses the
    /// same generation.
    pub fn mark_processed(&self, uid: &str, generation: i64) {
        if !self.generation_aware {
            return;
        }
        self.processed.write().insert(uid.to_string(), generation);
    }
}
