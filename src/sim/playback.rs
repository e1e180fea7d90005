//! Playback: elapsed time to ball position
//!
//! No physics happens here. A fixed trajectory is sampled by linear
//! interpolation between the two keyframes around the requested time.

use glam::Vec2;

use super::trajectory::Trajectory;

/// Interpolated position at `elapsed_ms` after the drop started.
///
/// Times before the start clamp to the first keyframe, times at or after the
/// end clamp to the last one.
pub fn position_at(trajectory: &Trajectory, elapsed_ms: f32) -> Vec2 {
    let frames = trajectory.keyframes();
    let first = trajectory.first();
    let last = trajectory.last();

    // Also catches NaN
    if !(elapsed_ms > first.time_ms) || frames.len() == 1 {
        return first.pos;
    }
    if elapsed_ms >= last.time_ms {
        return last.pos;
    }

    // First keyframe strictly after `elapsed_ms`; 1 <= i < len here
    let i = frames.partition_point(|k| k.time_ms <= elapsed_ms);
    let (a, b) = (frames[i - 1], frames[i]);
    let t = (elapsed_ms - a.time_ms) / (b.time_ms - a.time_ms);
    a.pos.lerp(b.pos, t)
}

/// One frame of playback
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackFrame {
    pub pos: Vec2,
    /// True on the first frame at or past the end, false on every other
    pub just_landed: bool,
}

/// A trajectory pinned to the wall-clock time its drop started
#[derive(Debug, Clone)]
pub struct PlaybackState {
    trajectory: Trajectory,
    start_ms: f64,
    landed: bool,
}

impl PlaybackState {
    pub fn new(trajectory: Trajectory, start_ms: f64) -> Self {
        Self {
            trajectory,
            start_ms,
            landed: false,
        }
    }

    #[inline]
    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    #[inline]
    pub fn start_ms(&self) -> f64 {
        self.start_ms
    }

    pub fn elapsed_ms(&self, now_ms: f64) -> f32 {
        (now_ms - self.start_ms) as f32
    }

    /// Position at a wall-clock time. Pure: no state changes.
    pub fn position(&self, now_ms: f64) -> Vec2 {
        position_at(&self.trajectory, self.elapsed_ms(now_ms))
    }

    pub fn is_finished(&self, now_ms: f64) -> bool {
        self.elapsed_ms(now_ms) >= self.trajectory.duration_ms()
    }

    pub fn has_landed(&self) -> bool {
        self.landed
    }

    /// Sample the frame at `now_ms`; the landing is reported exactly once
    pub fn advance(&mut self, now_ms: f64) -> PlaybackFrame {
        let pos = self.position(now_ms);
        let just_landed = !self.landed && self.is_finished(now_ms);
        if just_landed {
            self.landed = true;
        }
        PlaybackFrame { pos, just_landed }
    }
}
