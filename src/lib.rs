//! Plinko Drop - a ball that always lands where it was told to
//!
//! Core modules:
//! - `sim`: Seeded board layout, collision model, trajectory synthesis and playback
//! - `session`: Single-drop state machine driven once per rendered frame
//! - `stats`: Session-only drop statistics
//! - `tuning`: Data-driven engine constants
//!
//! A drop's whole path is decided before the ball moves: the synthesizer
//! simulates, validates and retries until the path ends inside the target
//! bucket, falling back to a direct curve when retries run out. Playback is
//! then pure interpolation over that fixed path.

pub mod error;
pub mod session;
pub mod sim;
pub mod stats;
pub mod tuning;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use error::{DropError, TrajectoryError, TuningError};
pub use session::{Diagnostics, Session, SessionEvent, SessionPhase};
pub use stats::{DropOutcome, DropStats};
pub use tuning::Tuning;

use glam::Vec2;

/// Engine-wide constants that are not tunable
pub mod consts {
    /// Number of buckets along the bottom of the board
    pub const BUCKET_COUNT: usize = 5;

    /// Canvas dimensions below this are clamped (transient zero-size layouts happen during page load)
    pub const MIN_CANVAS_DIMENSION: f32 = 1.0;
    /// Smallest horizontal peg spacing the layout will produce
    pub const MIN_PEG_SPACING: f32 = 2.0;
    /// Empty space kept between the last peg row and the buckets, in row spacings
    pub const BOTTOM_CLEARANCE_ROWS: f32 = 1.5;

    /// Vertical to horizontal spacing ratio of equilateral triangle packing
    pub const ROW_HEIGHT_RATIO: f32 = 0.866_025_4;
}

/// Point on a quadratic bezier at parameter `t` in [0, 1]
#[inline]
pub fn quadratic_bezier(p0: Vec2, p1: Vec2, p2: Vec2, t: f32) -> Vec2 {
    let u = 1.0 - t;
    p0 * (u * u) + p1 * (2.0 * u * t) + p2 * (t * t)
}
