//! Result sink for one measurement window
//!
//! `BenchmarkStep` is shared by every worker of a run. Score increments are
//! lock-free; recorded failures go into a mutex-guarded list and per-kind
//! counters so a summary can be read without walking the list.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use metrics::counter;
use tracing::{debug, warn};

use crate::failure::{ErrorKind, Failure};

/// Points for a validated signup
pub const SCORE_SIGNUP: u64 = 1;
/// Points for a validated login (either branch)
pub const SCORE_LOGIN: u64 = 1;
/// Points for a validated schedule creation
pub const SCORE_CREATE_SCHEDULE: u64 = 1;

#[derive(Debug, Default)]
pub struct BenchmarkStep {
    score: AtomicU64,
    errors: Mutex<Vec<Failure>>,
    error_counts: DashMap<ErrorKind, u64>,
}

impl BenchmarkStep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_score(&self, points: u64) {
        self.score.fetch_add(points, Ordering::Relaxed);
        counter!("benchmarker_score_total").increment(points);
    }

    pub fn add_error(&self, failure: Failure) {
        if failure.is_critical() {
            warn!("Critical failure: {}", failure.message);
        } else {
            debug!("Recorded failure: {}", failure);
        }

        counter!("benchmarker_errors_total", "kind" => failure.kind.as_str()).increment(1);
        *self.error_counts.entry(failure.kind).or_insert(0) += 1;

        // A poisoned lock only means another worker panicked mid-push; the
        // list itself is still a valid Vec.
        let mut errors = self.errors.lock().unwrap_or_else(|e| e.into_inner());
        errors.push(failure);
    }

    pub fn score(&self) -> u64 {
        self.score.load(Ordering::Relaxed)
    }

    /// Snapshot of every failure recorded so far
    pub fn errors(&self) -> Vec<Failure> {
        self.errors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn error_count(&self, kind: ErrorKind) -> u64 {
        self.error_counts.get(&kind).map(|c| *c).unwrap_or(0)
    }

    pub fn total_errors(&self) -> u64 {
        self.error_counts.iter().map(|entry| *entry.value()).sum()
    }

    pub fn has_critical(&self) -> bool {
        self.error_count(ErrorKind::Critical) > 0
    }
}
