//! Drop outcome statistics
//!
//! Session-only counts; nothing is persisted and a new session starts at zero.

use serde::{Deserialize, Serialize};

use crate::sim::BucketIndex;

/// Result of one completed drop
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DropOutcome {
    pub target: BucketIndex,
    pub landed: BucketIndex,
    pub success: bool,
    /// Wall-clock time (ms) the ball reached the bucket
    pub timestamp_ms: f64,
}

impl DropOutcome {
    pub fn new(target: BucketIndex, landed: BucketIndex, timestamp_ms: f64) -> Self {
        Self {
            target,
            landed,
            success: target == landed,
            timestamp_ms,
        }
    }
}

/// Running totals over completed drops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropStats {
    pub total_drops: u64,
    pub successful_drops: u64,
}

impl DropStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: &DropOutcome) {
        self.total_drops += 1;
        if outcome.success {
            self.successful_drops += 1;
        }
    }

    /// Fraction of drops that hit their target (1.0 before the first drop)
    pub fn success_rate(&self) -> f32 {
        if self.total_drops == 0 {
            1.0
        } else {
            self.successful_drops as f32 / self.total_drops as f32
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_drops == 0
    }
}
