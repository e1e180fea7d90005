//! Trajectory engine
//!
//! Everything that decides where the ball goes lives here. This module must
//! stay pure and reproducible:
//! - Randomness only through the `Rng` passed in
//! - Stable iteration order (pegs in row-major order)
//! - No rendering, timers or platform dependencies

pub mod board;
pub mod collision;
pub mod fallback;
pub mod playback;
pub mod synth;
pub mod trajectory;

pub use board::{Board, Bucket, BucketIndex, Peg};
pub use collision::{StepOutcome, Wall, resolve_step};
pub use fallback::fallback_path;
pub use playback::{PlaybackFrame, PlaybackState, position_at};
pub use synth::{Rejection, RejectionTally, Synthesis, SynthesisReport, synthesize};
pub use trajectory::{Keyframe, Trajectory, TrajectoryOrigin};
