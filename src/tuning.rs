//! Data-driven engine tuning
//!
//! Every constant the board, the physics and the synthesizer depend on lives
//! here as a named value. Lengths are ratios of the canvas height or of the
//! peg spacing, so one tuning fits every canvas size.
//!
//! Partial JSON is accepted: missing fields fall back to the defaults.

use serde::{Deserialize, Serialize};

use crate::error::TuningError;

/// Peg field and bucket geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardTuning {
    /// Number of peg rows
    pub peg_rows: u32,
    /// Pegs in the widest row
    pub max_row_pegs: u32,
    /// First peg row, as a fraction of canvas height
    pub top_margin: f32,
    /// Top of the buckets, as a fraction of canvas height
    pub bucket_margin_top: f32,
    /// Bucket depth, as a fraction of canvas height
    pub bucket_depth_ratio: f32,
    /// Peg radius, as a fraction of horizontal peg spacing
    pub peg_radius_ratio: f32,
    /// Ball radius, as a fraction of horizontal peg spacing
    pub ball_radius_ratio: f32,
}

impl Default for BoardTuning {
    fn default() -> Self {
        Self {
            peg_rows: 12,
            max_row_pegs: 12,
            top_margin: 0.08,
            bucket_margin_top: 0.84,
            bucket_depth_ratio: 0.12,
            peg_radius_ratio: 0.12,
            ball_radius_ratio: 0.14,
        }
    }
}

/// Forward simulation constants. Velocities are pixels per step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsTuning {
    /// Gravity per step², as a fraction of canvas height
    pub gravity_ratio: f32,
    /// Velocity multiplier applied every step
    pub damping: f32,
    /// Speed kept after a peg bounce
    pub restitution: f32,
    /// Horizontal speed kept after a wall bounce
    pub wall_damping: f32,
    /// Maximum random rotation of a bounce (radians)
    pub bounce_jitter: f32,
    /// Minimum downward speed after a bounce, as a fraction of peg spacing
    pub min_vertical_speed_ratio: f32,
    /// Largest upward speed a peg bounce may leave, as a fraction of peg spacing
    pub max_rebound_ratio: f32,
    /// Speed cap per step, as a fraction of the board diagonal
    pub max_step_speed_ratio: f32,
    /// Extra push-out distance after a peg overlap (pixels)
    pub separation_epsilon: f32,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        Self {
            gravity_ratio: 1.5e-3,
            damping: 0.985,
            restitution: 0.85,
            wall_damping: 0.6,
            bounce_jitter: 0.3,
            min_vertical_speed_ratio: 0.015,
            max_rebound_ratio: 0.06,
            max_step_speed_ratio: 0.01,
            separation_epsilon: 0.5,
        }
    }
}

/// Attempt loop and validation gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisTuning {
    /// Simulated attempts before the fallback takes over
    pub max_attempts: u32,
    /// Step budget per attempt; attempts still above the bucket line are rejected
    pub max_steps: u32,
    /// Total duration a landed path is spread over (randomized per attempt)
    pub min_duration_ms: f32,
    pub max_duration_ms: f32,
    /// Fraction of the start-to-target offset fed into the initial velocity
    pub bias_gain: f32,
    /// Random initial horizontal speed, as a fraction of peg spacing
    pub random_vx_ratio: f32,
    /// Random initial downward speed, as a fraction of peg spacing
    pub initial_vy_ratio: f32,
    /// Safety margin on each side of the target bucket, as a fraction of its width
    pub landing_margin_ratio: f32,
    /// Largest horizontal speed accepted at the bucket line, as a fraction of bucket width
    pub max_landing_vx_ratio: f32,
    /// Peg hits an edge-bucket landing needs to look natural
    pub edge_min_peg_hits: u32,
    /// Keyframe speed ceiling, in board diagonals per second
    pub max_keyframe_speed: f32,
}

impl Default for SynthesisTuning {
    fn default() -> Self {
        Self {
            max_attempts: 100,
            max_steps: 450,
            min_duration_ms: 2500.0,
            max_duration_ms: 3500.0,
            bias_gain: 0.9,
            random_vx_ratio: 0.06,
            initial_vy_ratio: 0.03,
            landing_margin_ratio: 0.1,
            max_landing_vx_ratio: 0.06,
            edge_min_peg_hits: 3,
            max_keyframe_speed: 3.0,
        }
    }
}

/// Direct bezier path used when every attempt is rejected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackTuning {
    pub min_duration_ms: f32,
    pub max_duration_ms: f32,
    /// Keyframes sampled along the curve
    pub samples: u32,
    /// Catch point spread, as a fraction of the bucket's usable half-width
    pub catch_spread: f32,
    /// Control point jitter, in peg spacings
    pub control_jitter: f32,
}

impl Default for FallbackTuning {
    fn default() -> Self {
        Self {
            min_duration_ms: 2200.0,
            max_duration_ms: 3000.0,
            samples: 90,
            catch_spread: 0.6,
            control_jitter: 1.5,
        }
    }
}

/// Drop lifecycle timing and start placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionTuning {
    /// Start height, as a fraction of canvas height
    pub start_height_ratio: f32,
    /// Horizontal start jitter, in peg spacings
    pub start_jitter: f32,
    /// How long the ball stays visible in its bucket after landing
    pub ball_linger_ms: f64,
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            start_height_ratio: 0.03,
            start_jitter: 0.25,
            ball_linger_ms: 1500.0,
        }
    }
}

/// Complete engine tuning
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub board: BoardTuning,
    pub physics: PhysicsTuning,
    pub synthesis: SynthesisTuning,
    pub fallback: FallbackTuning,
    pub session: SessionTuning,
}

fn check_range(field: &'static str, value: f32, min: f32, max: f32) -> Result<(), TuningError> {
    // Written so NaN fails too
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(TuningError::Range {
            field,
            min,
            max,
            value,
        })
    }
}

fn check_order(field: &'static str, min: f32, max: f32) -> Result<(), TuningError> {
    if min <= max {
        Ok(())
    } else {
        Err(TuningError::MinExceedsMax { field, min, max })
    }
}

impl Tuning {
    /// Parse a (possibly partial) JSON tuning document and validate it
    pub fn from_json(json: &str) -> Result<Self, TuningError> {
        let tuning: Tuning = serde_json::from_str(json)?;
        tuning.validate()?;
        Ok(tuning)
    }

    pub fn to_json(&self) -> Result<String, TuningError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every value the engine relies on for its landing guarantee
    pub fn validate(&self) -> Result<(), TuningError> {
        let b = &self.board;
        check_range("board.peg_rows", b.peg_rows as f32, 2.0, 64.0)?;
        check_range("board.max_row_pegs", b.max_row_pegs as f32, 1.0, 128.0)?;
        check_range("board.top_margin", b.top_margin, 0.0, 0.5)?;
        check_range("board.bucket_margin_top", b.bucket_margin_top, 0.2, 0.98)?;
        check_order("board.top_margin/bucket_margin_top", b.top_margin, b.bucket_margin_top)?;
        check_range("board.bucket_depth_ratio", b.bucket_depth_ratio, 0.01, 0.5)?;
        check_range("board.peg_radius_ratio", b.peg_radius_ratio, 0.01, 0.4)?;
        check_range("board.ball_radius_ratio", b.ball_radius_ratio, 0.01, 0.4)?;

        let p = &self.physics;
        check_range("physics.gravity_ratio", p.gravity_ratio, 1e-6, 0.05)?;
        check_range("physics.damping", p.damping, 0.5, 0.9999)?;
        check_range("physics.restitution", p.restitution, 0.05, 1.0)?;
        check_range("physics.wall_damping", p.wall_damping, 0.0, 1.0)?;
        check_range("physics.bounce_jitter", p.bounce_jitter, 0.0, 1.5)?;
        check_range("physics.min_vertical_speed_ratio", p.min_vertical_speed_ratio, 0.0, 0.5)?;
        check_range("physics.max_rebound_ratio", p.max_rebound_ratio, 0.0, 2.0)?;
        check_range("physics.max_step_speed_ratio", p.max_step_speed_ratio, 1e-4, 0.2)?;
        check_range("physics.separation_epsilon", p.separation_epsilon, 0.0, 10.0)?;

        let s = &self.synthesis;
        check_range("synthesis.max_attempts", s.max_attempts as f32, 1.0, 10_000.0)?;
        check_range("synthesis.max_steps", s.max_steps as f32, 2.0, 10_000.0)?;
        check_range("synthesis.min_duration_ms", s.min_duration_ms, 1.0, 60_000.0)?;
        check_range("synthesis.max_duration_ms", s.max_duration_ms, 1.0, 60_000.0)?;
        check_order("synthesis.duration_ms", s.min_duration_ms, s.max_duration_ms)?;
        check_range("synthesis.bias_gain", s.bias_gain, 0.0, 4.0)?;
        check_range("synthesis.random_vx_ratio", s.random_vx_ratio, 0.0, 1.0)?;
        check_range("synthesis.initial_vy_ratio", s.initial_vy_ratio, 0.0, 1.0)?;
        check_range("synthesis.landing_margin_ratio", s.landing_margin_ratio, 0.0, 0.45)?;
        check_range("synthesis.max_landing_vx_ratio", s.max_landing_vx_ratio, 0.0, 10.0)?;
        check_range("synthesis.max_keyframe_speed", s.max_keyframe_speed, 0.1, 100.0)?;

        let f = &self.fallback;
        check_range("fallback.min_duration_ms", f.min_duration_ms, 1.0, 60_000.0)?;
        check_range("fallback.max_duration_ms", f.max_duration_ms, 1.0, 60_000.0)?;
        check_order("fallback.duration_ms", f.min_duration_ms, f.max_duration_ms)?;
        check_range("fallback.samples", f.samples as f32, 2.0, 10_000.0)?;
        check_range("fallback.catch_spread", f.catch_spread, 0.0, 0.99)?;
        check_range("fallback.control_jitter", f.control_jitter, 0.0, 10.0)?;

        // A quadratic bezier whose control points sit inside the board moves
        // at most two diagonals per unit parameter.
        if f.min_duration_ms * s.max_keyframe_speed < 2000.0 {
            return Err(TuningError::FallbackTooFast {
                min_duration_ms: f.min_duration_ms,
                ceiling: s.max_keyframe_speed,
            });
        }

        let ses = &self.session;
        check_range("session.start_height_ratio", ses.start_height_ratio, 0.0, 0.5)?;
        check_range("session.start_jitter", ses.start_jitter, 0.0, 5.0)?;
        check_range("session.ball_linger_ms", ses.ball_linger_ms as f32, 0.0, 600_000.0)?;
        Ok(())
    }
}
