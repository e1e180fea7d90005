//! Time-parameterized ball paths
//!
//! A trajectory is decided in full before playback starts and never changes
//! afterwards. Construction checks the structural invariants (non-empty,
//! starts at t=0, strictly increasing time), so every `Trajectory` value in
//! the program satisfies them.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::board::{Board, BucketIndex};
use crate::error::TrajectoryError;

/// Ball position at a time offset from the start of the drop
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub pos: Vec2,
    pub time_ms: f32,
}

impl Keyframe {
    #[inline]
    pub fn new(pos: Vec2, time_ms: f32) -> Self {
        Self { pos, time_ms }
    }
}

/// How a trajectory was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrajectoryOrigin {
    /// Forward simulation accepted on the given (1-based) attempt
    Simulated { attempt: u32, peg_hits: u32 },
    /// Direct curve built after every attempt was rejected
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    keyframes: Vec<Keyframe>,
    target: BucketIndex,
    origin: TrajectoryOrigin,
}

impl Trajectory {
    pub fn new(
        keyframes: Vec<Keyframe>,
        target: BucketIndex,
        origin: TrajectoryOrigin,
    ) -> Result<Self, TrajectoryError> {
        let first = keyframes.first().ok_or(TrajectoryError::Empty)?;
        if first.time_ms != 0.0 {
            return Err(TrajectoryError::NonZeroStart(first.time_ms));
        }
        for (index, pair) in keyframes.windows(2).enumerate() {
            // Negated so NaN times are rejected as well
            if !(pair[1].time_ms > pair[0].time_ms) {
                return Err(TrajectoryError::NonIncreasingTime {
                    index: index + 1,
                    time_ms: pair[1].time_ms,
                });
            }
        }
        Ok(Self {
            keyframes,
            target,
            origin,
        })
    }

    /// Two keyframes, start to end, labelled as a fallback. Always valid.
    pub(crate) fn direct(start: Vec2, end: Vec2, duration_ms: f32, target: BucketIndex) -> Self {
        let duration_ms = if duration_ms.is_finite() {
            duration_ms.max(1.0)
        } else {
            1.0
        };
        Self {
            keyframes: vec![Keyframe::new(start, 0.0), Keyframe::new(end, duration_ms)],
            target,
            origin: TrajectoryOrigin::Fallback,
        }
    }

    #[inline]
    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    #[inline]
    pub fn target(&self) -> BucketIndex {
        self.target
    }

    #[inline]
    pub fn origin(&self) -> TrajectoryOrigin {
        self.origin
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == TrajectoryOrigin::Fallback
    }

    #[inline]
    pub fn first(&self) -> &Keyframe {
        &self.keyframes[0]
    }

    #[inline]
    pub fn last(&self) -> &Keyframe {
        &self.keyframes[self.keyframes.len() - 1]
    }

    /// Time of the last keyframe
    pub fn duration_ms(&self) -> f32 {
        self.last().time_ms
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Fastest implied speed between adjacent keyframes (pixels per ms)
    pub fn max_speed(&self) -> f32 {
        max_segment_speed(&self.keyframes)
    }

    /// Ends on the bucket line strictly inside the target's span minus the margin
    pub fn lands_in_target(&self, board: &Board, margin_ratio: f32) -> bool {
        let bucket = board.bucket(self.target);
        let end = self.last().pos;
        end.y == bucket.top_y && bucket.holds(end.x, margin_ratio)
    }

    /// Largest distance between keyframes at the same index (paths of
    /// different length are compared over their common prefix)
    pub fn divergence(&self, other: &Trajectory) -> f32 {
        self.keyframes
            .iter()
            .zip(&other.keyframes)
            .map(|(a, b)| a.pos.distance(b.pos))
            .fold(0.0, f32::max)
    }
}

/// Fastest implied speed between adjacent keyframes (pixels per ms)
pub fn max_segment_speed(keyframes: &[Keyframe]) -> f32 {
    keyframes
        .windows(2)
        .map(|pair| segment_speed(pair[0], pair[1]))
        .fold(0.0, f32::max)
}

#[inline]
fn segment_speed(a: Keyframe, b: Keyframe) -> f32 {
    let dt = b.time_ms - a.time_ms;
    if dt > 0.0 {
        a.pos.distance(b.pos) / dt
    } else {
        f32::INFINITY
    }
}

/// Keyframe speed ceiling for a board, in pixels per ms
pub fn speed_ceiling(board: &Board, diagonals_per_second: f32) -> f32 {
    board.diagonal() * diagonals_per_second / 1000.0
}
