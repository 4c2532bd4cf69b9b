//! Similarity-based grouping of archived files into open batches.
//!
//! # Design
//! - One mutex guards the per-owner batch lists; it is never held across an
//!   `.await`, so every mutation is atomic with respect to other tasks.
//! - Debounce is expressed as `last_activity_at`; the sweeper decides expiry.
//!   Extending a batch simply moves its deadline, so a stale expiry cannot fire.
//! - Removing a batch from the map (`take`, `take_expired`, `drain_all`) is the
//!   single-finalization point: whoever removes it owns it exclusively.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reelcast_core::{ArchivedFile, NormalizedTitle, OwnerId};
use reelcast_events::BatchId;
use tokio::time::Instant;

use crate::similarity::similarity;

/// A release batch still collecting files.
#[derive(Debug, Clone)]
pub struct OpenBatch {
    /// Process-unique identifier.
    pub id: BatchId,
    /// Owner whose files the batch groups.
    pub owner_id: OwnerId,
    /// Normalized title of the file that opened the batch.
    pub title: String,
    /// Year of the file that opened the batch.
    pub year: Option<String>,
    /// Archived files in arrival order.
    pub files: Vec<ArchivedFile>,
    /// When the batch was opened.
    pub opened_at: Instant,
    /// When the last file joined.
    pub last_activity_at: Instant,
}

impl OpenBatch {
    fn is_quiet(&self, now: Instant, quiet_window: Duration) -> bool {
        now.saturating_duration_since(self.last_activity_at) >= quiet_window
    }
}

/// Outcome of routing a file to the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// No open batch was similar enough; a new one was created.
    Opened {
        /// Identifier of the new batch.
        batch_id: BatchId,
    },
    /// The file joined an existing batch.
    Extended {
        /// Identifier of the matched batch.
        batch_id: BatchId,
        /// Similarity between the file and the batch title.
        score: f64,
        /// File count after the append.
        file_count: usize,
    },
}

impl Admission {
    /// Batch the file ended up in.
    #[must_use]
    pub const fn batch_id(&self) -> BatchId {
        match self {
            Self::Opened { batch_id } | Self::Extended { batch_id, .. } => *batch_id,
        }
    }
}

/// Read-only view of an open batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    /// Batch identifier.
    pub id: BatchId,
    /// Batch title.
    pub title: String,
    /// Batch year.
    pub year: Option<String>,
    /// Number of files collected so far.
    pub file_count: usize,
}

/// Owner of every open batch in the process.
#[derive(Debug)]
pub struct BatchAggregator {
    threshold: f64,
    quiet_window: Duration,
    next_id: AtomicU64,
    open: Mutex<HashMap<OwnerId, Vec<OpenBatch>>>,
}

impl BatchAggregator {
    /// Create an aggregator admitting files scoring at least `threshold`.
    #[must_use]
    pub fn new(threshold: f64, quiet_window: Duration) -> Self {
        Self {
            threshold,
            quiet_window,
            next_id: AtomicU64::new(1),
            open: Mutex::new(HashMap::new()),
        }
    }

    /// Quiet time after which a batch is considered complete.
    #[must_use]
    pub const fn quiet_window(&self) -> Duration {
        self.quiet_window
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<OwnerId, Vec<OpenBatch>>> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Route `file` to the best matching open batch for `owner`, or open a new one.
    pub fn assign(&self, owner: OwnerId, title: &NormalizedTitle, file: ArchivedFile) -> Admission {
        self.assign_at(owner, title, file, Instant::now())
    }

    /// [`assign`](Self::assign) with an explicit clock reading.
    pub fn assign_at(
        &self,
        owner: OwnerId,
        title: &NormalizedTitle,
        file: ArchivedFile,
        now: Instant,
    ) -> Admission {
        let mut open = self.lock();
        let batches = open.entry(owner).or_default();

        let mut best: Option<(usize, f64)> = None;
        for (index, batch) in batches.iter().enumerate() {
            let score = similarity(&title.base_title, &batch.title);
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((index, score));
            }
        }

        if let Some((index, score)) = best.filter(|(_, score)| *score >= self.threshold) {
            let batch = &mut batches[index];
            batch.files.push(file);
            batch.last_activity_at = now;
            return Admission::Extended {
                batch_id: batch.id,
                score,
                file_count: batch.files.len(),
            };
        }

        let batch_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        batches.push(OpenBatch {
            id: batch_id,
            owner_id: owner,
            title: title.base_title.clone(),
            year: title.year.clone(),
            files: vec![file],
            opened_at: now,
            last_activity_at: now,
        });
        Admission::Opened { batch_id }
    }

    /// Remove and return every batch that has been quiet for the full window.
    pub fn take_expired(&self, now: Instant) -> Vec<OpenBatch> {
        let mut open = self.lock();
        let mut expired = Vec::new();
        for batches in open.values_mut() {
            let (quiet, active): (Vec<_>, Vec<_>) = batches
                .drain(..)
                .partition(|batch| batch.is_quiet(now, self.quiet_window));
            *batches = active;
            expired.extend(quiet);
        }
        open.retain(|_, batches| !batches.is_empty());
        expired.sort_by_key(|batch| batch.id);
        expired
    }

    /// Remove a specific batch; `None` when it was already taken.
    pub fn take(&self, owner: OwnerId, batch_id: BatchId) -> Option<OpenBatch> {
        let mut open = self.lock();
        let batches = open.get_mut(&owner)?;
        let index = batches.iter().position(|batch| batch.id == batch_id)?;
        let batch = batches.remove(index);
        if batches.is_empty() {
            open.remove(&owner);
        }
        Some(batch)
    }

    /// Remove every open batch regardless of activity.
    pub fn drain_all(&self) -> Vec<OpenBatch> {
        let mut open = self.lock();
        let mut drained: Vec<OpenBatch> = open.drain().flat_map(|(_, batches)| batches).collect();
        drained.sort_by_key(|batch| batch.id);
        drained
    }

    /// Number of open batches across all owners.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    /// Number of owners with at least one open batch.
    #[must_use]
    pub fn owner_count(&self) -> usize {
        self.lock().len()
    }

    /// Open batches for `owner` in creation order.
    #[must_use]
    pub fn open_batches(&self, owner: OwnerId) -> Vec<BatchSummary> {
        self.lock()
            .get(&owner)
            .map(|batches| {
                batches
                    .iter()
                    .map(|batch| BatchSummary {
                        id: batch.id,
                        title: batch.title.clone(),
                        year: batch.year.clone(),
                        file_count: batch.files.len(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
