//! Error types for drop requests, trajectory construction and tuning

use thiserror::Error;

use crate::consts::BUCKET_COUNT;

/// Reasons a drop request is refused. Refusal never changes session state.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum DropError {
    #[error("target bucket {0} is outside 1..={max}", max = BUCKET_COUNT)]
    InvalidTarget(u32),
    #[error("a drop is already in flight")]
    DropInProgress,
}

/// Structural problems with a keyframe sequence
#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub enum TrajectoryError {
    #[error("trajectory has no keyframes")]
    Empty,
    #[error("first keyframe must be at time 0 (got {0} ms)")]
    NonZeroStart(f32),
    #[error("keyframe {index} at {time_ms} ms does not come after the previous one")]
    NonIncreasingTime { index: usize, time_ms: f32 },
}

/// Tuning values that break engine invariants
#[derive(Debug, Error)]
pub enum TuningError {
    #[error("{field} must be between {min} and {max} (got {value})")]
    Range {
        field: &'static str,
        min: f32,
        max: f32,
        value: f32,
    },
    #[error("{field}: minimum {min} exceeds maximum {max}")]
    MinExceedsMax {
        field: &'static str,
        min: f32,
        max: f32,
    },
    #[error(
        "fallback minimum duration {min_duration_ms} ms is too short for a keyframe speed ceiling of {ceiling} diagonals/s"
    )]
    FallbackTooFast { min_duration_ms: f32, ceiling: f32 },
    #[error("invalid tuning json: {0}")]
    Json(#[from] serde_json::Error),
}
