//! Guarantee fallback: a direct curve into the target bucket
//!
//! Used only after every simulated attempt was rejected. It has no loop and
//! no failure path, which is what lets the synthesizer promise a valid
//! trajectory for every request. Small random choices (catch point, control
//! point, duration) keep repeated fallbacks from looking identical.

use glam::Vec2;
use rand::Rng;

use super::board::{Board, BucketIndex};
use super::trajectory::{Keyframe, Trajectory, TrajectoryOrigin};
use crate::quadratic_bezier;
use crate::tuning::Tuning;

/// Build a monotonically falling quadratic bezier from `start` to a random
/// point well inside `target`, sampled into keyframes.
pub fn fallback_path(
    start: Vec2,
    target: BucketIndex,
    board: &Board,
    tuning: &Tuning,
    rng: &mut impl Rng,
) -> Trajectory {
    let cfg = &tuning.fallback;
    let start = board.clamp_start(start);
    let bucket = board.bucket(target);

    let (lo, hi) = bucket.inner_span(tuning.synthesis.landing_margin_ratio);
    let usable_half = (hi - lo) * 0.5;
    let catch_x = (lo + hi) * 0.5 + rng.random_range(-1.0..=1.0) * cfg.catch_spread * usable_half;
    let end = Vec2::new(catch_x, bucket.top_y);

    // Control point sits between start and end vertically, so y never decreases
    let along = rng.random_range(0.3..=0.7);
    let descent = rng.random_range(0.2..=0.5);
    let sway = rng.random_range(-1.0..=1.0) * cfg.control_jitter * board.spacing;
    let x_lo = board.ball_radius.min(board.width * 0.5);
    let x_hi = (board.width - board.ball_radius).max(board.width * 0.5);
    let control = Vec2::new(
        (start.x + (end.x - start.x) * along + sway).clamp(x_lo, x_hi),
        start.y + (end.y - start.y) * descent,
    );

    let duration_ms = rng.random_range(cfg.min_duration_ms..=cfg.max_duration_ms);
    let samples = cfg.samples.max(1);
    let keyframes: Vec<Keyframe> = (0..=samples)
        .map(|i| {
            let t = i as f32 / samples as f32;
            Keyframe::new(quadratic_bezier(start, control, end, t), duration_ms * t)
        })
        .collect();

    match Trajectory::new(keyframes, target, TrajectoryOrigin::Fallback) {
        Ok(trajectory) => trajectory,
        Err(err) => {
            log::error!("Fallback sampling produced invalid keyframes ({err}); using straight drop");
            Trajectory::direct(start, end, duration_ms, target)
        }
    }
}
