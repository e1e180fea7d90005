//! Collision detection and response for one simulation step
//!
//! The ball is a circle moving against round pegs and two vertical walls.
//! Bounces are physically shaped (reflect, lose energy) but deliberately
//! noisy: a random rotation of the outgoing velocity makes identical
//! approaches diverge, which is what gives repeated drops distinct paths.

use glam::Vec2;
use rand::Rng;

use super::board::Board;
use crate::tuning::PhysicsTuning;

/// Which wall the ball touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wall {
    Left,
    Right,
}

/// Result of resolving one step
#[derive(Debug, Clone, Copy)]
pub struct StepOutcome {
    pub pos: Vec2,
    pub vel: Vec2,
    /// Index into `Board::pegs` of the peg that was hit
    pub hit_peg: Option<usize>,
    pub hit_wall: Option<Wall>,
}

/// Standard reflection: v' = v - 2(v·n)n
#[inline]
pub fn reflect_velocity(velocity: Vec2, normal: Vec2) -> Vec2 {
    velocity - 2.0 * velocity.dot(normal) * normal
}

/// Reflect, lose energy, then rotate by a random angle in `[-jitter, jitter]`
pub fn bounce_velocity(
    velocity: Vec2,
    normal: Vec2,
    restitution: f32,
    jitter: f32,
    rng: &mut impl Rng,
) -> Vec2 {
    // Only reflect when moving into the peg; a ball already leaving keeps its direction
    let outgoing = if velocity.dot(normal) < 0.0 {
        reflect_velocity(velocity, normal)
    } else {
        velocity
    };
    let bounced = outgoing * restitution;

    if jitter > 0.0 {
        let angle = rng.random_range(-jitter..=jitter);
        Vec2::from_angle(angle).rotate(bounced)
    } else {
        bounced
    }
}

/// Earliest fraction `t` in `[0, 1]` of the move `pos -> pos + vel` at which
/// a ball centre comes within `reach` of `center` (0 when already inside)
fn contact_time(pos: Vec2, vel: Vec2, center: Vec2, reach: f32) -> Option<f32> {
    let rel = pos - center;
    let c = rel.length_squared() - reach * reach;
    if c <= 0.0 {
        return Some(0.0);
    }
    let a = vel.length_squared();
    let b = 2.0 * rel.dot(vel);
    if a <= f32::EPSILON || b >= 0.0 {
        return None;
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let t = (-b - disc.sqrt()) / (2.0 * a);
    (t <= 1.0).then_some(t.max(0.0))
}

/// Move the ball by one step of `vel` and resolve at most one peg contact
/// plus the walls.
///
/// The move is swept: the peg touched earliest along the segment wins (ties
/// go to row-major order) and the rest of the step is spent on the bounce,
/// so fast steps cannot pass through a peg.
pub fn resolve_step(
    pos: Vec2,
    vel: Vec2,
    board: &Board,
    tuning: &PhysicsTuning,
    rng: &mut impl Rng,
) -> StepOutcome {
    let ball_radius = board.ball_radius;
    let mut next = pos + vel;
    let mut vel = vel;
    let mut hit_peg = None;

    let midpoint = pos + vel * 0.5;
    let mut contact: Option<(usize, f32)> = None;
    for (index, peg) in board.pegs_near(midpoint, vel.length() * 0.5 + ball_radius) {
        if let Some(t) = contact_time(pos, vel, peg.pos, peg.radius + ball_radius) {
            if contact.is_none_or(|(_, best)| t < best) {
                contact = Some((index, t));
            }
        }
    }

    if let Some((peg_index, t)) = contact {
        let peg = board.pegs[peg_index];
        let touch = pos + vel * t;
        let offset = touch - peg.pos;
        let dist = offset.length();
        let normal = if dist > 1e-4 {
            offset / dist
        } else {
            // Dead-center hit: kick up and to a random side
            let side = if rng.random_bool(0.5) { 1.0 } else { -1.0 };
            Vec2::new(side, -1.0).normalize()
        };

        next = peg.pos + normal * (peg.radius + ball_radius + tuning.separation_epsilon);
        vel = bounce_velocity(vel, normal, tuning.restitution, tuning.bounce_jitter, rng);

        // Small hops only, and keep the ball falling instead of skating over a peg
        let max_rebound = board.spacing * tuning.max_rebound_ratio;
        let min_vy = board.spacing * tuning.min_vertical_speed_ratio;
        vel.y = vel.y.max(-max_rebound);
        if vel.y.abs() < min_vy {
            vel.y = min_vy;
        }

        hit_peg = Some(peg_index);
    }

    let mut hit_wall = None;
    let min_x = ball_radius.min(board.width * 0.5);
    let max_x = (board.width - ball_radius).max(board.width * 0.5);
    if next.x < min_x {
        next.x = min_x;
        vel.x = vel.x.abs() * tuning.wall_damping;
        hit_wall = Some(Wall::Left);
    } else if next.x > max_x {
        next.x = max_x;
        vel.x = -vel.x.abs() * tuning.wall_damping;
        hit_wall = Some(Wall::Right);
    }

    StepOutcome {
        pos: next,
        vel,
        hit_peg,
        hit_wall,
    }
}
