//! Trajectory synthesis: simulate, validate, retry, fall back
//!
//! Each attempt is a plain forward simulation (gravity, damping, noisy peg
//! bounces). Nothing steers the ball mid-air; the only influence toward the
//! target is a bias on the initial velocity. Attempts that miss the bucket,
//! arrive too fast, look implausible or move too quickly between keyframes
//! are thrown away and a fresh attempt is drawn from the RNG stream. When the
//! retry budget runs out, the direct fallback curve is used instead, so the
//! returned trajectory always ends inside the target bucket.

use glam::Vec2;
use rand::Rng;
use serde::Serialize;

use super::board::{Board, BucketIndex};
use super::collision::resolve_step;
use super::fallback::fallback_path;
use super::trajectory::{
    Keyframe, Trajectory, TrajectoryOrigin, max_segment_speed, speed_ceiling,
};
use crate::error::TrajectoryError;
use crate::tuning::Tuning;

/// Why an attempt was discarded
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// Ran out of steps before reaching the bucket line
    NeverLanded,
    /// Crossed the bucket line outside the target span (minus margin)
    OutsideTarget { x: f32 },
    /// Horizontal speed at the bucket line would carry the ball out
    LandingTooFast { vx: f32 },
    /// Edge bucket reached with too few peg bounces to look natural
    TooFewHits { hits: u32 },
    /// Some keyframe pair implies a jump above the speed ceiling
    Discontinuous { speed: f32 },
    /// Keyframes the trajectory constructor refused
    Malformed(TrajectoryError),
}

/// Rejected attempts by reason
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RejectionTally {
    pub never_landed: u32,
    pub outside_target: u32,
    pub landing_too_fast: u32,
    pub too_few_hits: u32,
    pub discontinuous: u32,
    pub malformed: u32,
}

impl RejectionTally {
    fn record(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::NeverLanded => self.never_landed += 1,
            Rejection::OutsideTarget { .. } => self.outside_target += 1,
            Rejection::LandingTooFast { .. } => self.landing_too_fast += 1,
            Rejection::TooFewHits { .. } => self.too_few_hits += 1,
            Rejection::Discontinuous { .. } => self.discontinuous += 1,
            Rejection::Malformed(_) => self.malformed += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.never_landed
            + self.outside_target
            + self.landing_too_fast
            + self.too_few_hits
            + self.discontinuous
            + self.malformed
    }
}

/// Quality signal for one synthesis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SynthesisReport {
    /// Simulated attempts run (the fallback is not counted)
    pub attempts: u32,
    pub used_fallback: bool,
    pub rejections: RejectionTally,
}

/// A trajectory and how hard it was to find
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub trajectory: Trajectory,
    pub report: SynthesisReport,
}

/// Smallest fraction of a step the final segment may span, so the landing
/// keyframe never shares a timestamp with the one before it
const LANDING_FRACTION_MIN: f32 = 1e-3;

/// Simulated path that reached the bucket line
struct Landing {
    keyframes: Vec<Keyframe>,
    velocity: Vec2,
    peg_hits: u32,
}

/// Produce a trajectory from `start` that ends strictly inside `target`.
///
/// The start is clamped inside the walls and above the bucket line. The
/// result is never empty and always lands in the target bucket.
pub fn synthesize(
    start: Vec2,
    target: BucketIndex,
    board: &Board,
    tuning: &Tuning,
    rng: &mut impl Rng,
) -> Synthesis {
    let start = board.clamp_start(start);
    let mut report = SynthesisReport::default();

    for attempt in 1..=tuning.synthesis.max_attempts.max(1) {
        report.attempts = attempt;
        let outcome = simulate_attempt(start, target, board, tuning, rng)
            .and_then(|landing| validate(&landing, target, board, tuning).map(|_| landing));

        match outcome {
            Ok(landing) => {
                let origin = TrajectoryOrigin::Simulated {
                    attempt,
                    peg_hits: landing.peg_hits,
                };
                match Trajectory::new(landing.keyframes, target, origin) {
                    Ok(trajectory) => {
                        log::debug!(
                            "Bucket {target}: accepted attempt {attempt} ({} pegs, {:.0} ms)",
                            landing.peg_hits,
                            trajectory.duration_ms()
                        );
                        return Synthesis { trajectory, report };
                    }
                    Err(err) => {
                        log::warn!("Bucket {target}: attempt {attempt} produced malformed keyframes: {err}");
                        report.rejections.record(Rejection::Malformed(err));
                    }
                }
            }
            Err(rejection) => {
                log::trace!("Bucket {target}: attempt {attempt} rejected: {rejection:?}");
                report.rejections.record(rejection);
            }
        }
    }

    log::warn!(
        "Bucket {target}: {} attempts rejected ({:?}), using fallback curve",
        report.attempts,
        report.rejections
    );
    report.used_fallback = true;
    Synthesis {
        trajectory: fallback_path(start, target, board, tuning, rng),
        report,
    }
}

/// Steps a ball dropped from rest at `start_y` needs to reach the bucket
/// line with no pegs in the way
fn free_fall_steps(start_y: f32, board: &Board, tuning: &Tuning) -> u32 {
    let physics = &tuning.physics;
    let gravity = board.height * physics.gravity_ratio;
    let max_speed = board.diagonal() * physics.max_step_speed_ratio;
    let top = board.bucket_top();

    let mut y = start_y;
    let mut vy = 0.0_f32;
    let mut steps = 0;
    while y < top && steps < tuning.synthesis.max_steps {
        vy = (vy + gravity).min(max_speed);
        y += vy;
        vy *= physics.damping;
        steps += 1;
    }
    steps
}

/// Initial velocity: a bias toward the target bucket plus a random term
/// whose own magnitude is drawn per attempt.
///
/// The bias is the horizontal speed that, decaying under damping, drifts
/// the ball across `bias_gain` of the offset during an unobstructed fall.
fn initial_velocity(
    start: Vec2,
    target: BucketIndex,
    board: &Board,
    tuning: &Tuning,
    rng: &mut impl Rng,
) -> Vec2 {
    let s = &tuning.synthesis;
    let damping = tuning.physics.damping;
    let fall = free_fall_steps(start.y, board, tuning);
    let drift_per_speed = ((1.0 - damping.powi(fall as i32)) / (1.0 - damping)).max(1.0);
    let offset = board.bucket(target).center_x() - start.x;
    let bias = offset / drift_per_speed * s.bias_gain;

    let spread = rng.random_range(0.2..=1.0) * s.random_vx_ratio * board.spacing;
    let vx = bias + rng.random_range(-1.0..=1.0) * spread;
    let vy = rng.random_range(0.0..=1.0) * s.initial_vy_ratio * board.spacing;
    Vec2::new(vx, vy)
}

/// Forward simulation until the ball crosses the bucket line or the step
/// budget runs out. One keyframe per step; the last one is interpolated
/// onto the bucket line. The steps actually taken are then spread evenly
/// over a randomized duration.
fn simulate_attempt(
    start: Vec2,
    target: BucketIndex,
    board: &Board,
    tuning: &Tuning,
    rng: &mut impl Rng,
) -> Result<Landing, Rejection> {
    let s = &tuning.synthesis;
    let physics = &tuning.physics;

    let duration_ms = rng.random_range(s.min_duration_ms..=s.max_duration_ms);
    let gravity = Vec2::new(0.0, board.height * physics.gravity_ratio);
    let max_speed = board.diagonal() * physics.max_step_speed_ratio;
    let top = board.bucket_top();

    let mut pos = start;
    let mut vel = initial_velocity(start, target, board, tuning, rng);
    let mut peg_hits = 0;
    // Positions with their time in steps, rescaled to milliseconds on landing
    let mut keyframes = vec![Keyframe::new(pos, 0.0)];

    for step in 1..=s.max_steps.max(1) {
        vel = (vel + gravity).clamp_length_max(max_speed);
        let out = resolve_step(pos, vel, board, physics, rng);
        if out.hit_peg.is_some() {
            peg_hits += 1;
        }
        let next = out.pos;
        vel = out.vel * physics.damping;

        if next.y >= top {
            // pos.y < top here, so the denominator is positive
            let frac = ((top - pos.y) / (next.y - pos.y)).clamp(LANDING_FRACTION_MIN, 1.0);
            let x = pos.x + (next.x - pos.x) * frac;
            let landed_at = (step - 1) as f32 + frac;
            keyframes.push(Keyframe::new(Vec2::new(x, top), landed_at));

            let step_ms = duration_ms / landed_at;
            for keyframe in &mut keyframes {
                keyframe.time_ms *= step_ms;
            }
            if let Some(last) = keyframes.last_mut() {
                last.time_ms = duration_ms;
            }
            return Ok(Landing {
                keyframes,
                velocity: vel,
                peg_hits,
            });
        }

        pos = next;
        keyframes.push(Keyframe::new(pos, step as f32));
    }

    Err(Rejection::NeverLanded)
}

/// The acceptance gate
fn validate(
    landing: &Landing,
    target: BucketIndex,
    board: &Board,
    tuning: &Tuning,
) -> Result<(), Rejection> {
    let s = &tuning.synthesis;
    let bucket = board.bucket(target);
    let Some(end) = landing.keyframes.last() else {
        return Err(Rejection::NeverLanded);
    };

    if !bucket.holds(end.pos.x, s.landing_margin_ratio) {
        return Err(Rejection::OutsideTarget { x: end.pos.x });
    }

    let vx = landing.velocity.x;
    if vx.abs() > bucket.width() * s.max_landing_vx_ratio {
        return Err(Rejection::LandingTooFast { vx });
    }

    if target.is_edge() && landing.peg_hits < s.edge_min_peg_hits {
        return Err(Rejection::TooFewHits {
            hits: landing.peg_hits,
        });
    }

    let speed = max_segment_speed(&landing.keyframes);
    if speed > speed_ceiling(board, s.max_keyframe_speed) {
        return Err(Rejection::Discontinuous { speed });
    }

    Ok(())
}
