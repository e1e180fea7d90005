//! Single-ball drop session
//!
//! Owns the board, the RNG, the in-flight playback and the statistics.
//! The presentation layer calls `tick` once per rendered frame and reacts to
//! the drained events; everything else goes through the request methods.
//!
//! Lifecycle: `Ready -> Dropping -> Completed`. The trajectory is synthesized
//! inside `request_drop`, before the phase changes, so the outcome is fixed
//! before the ball visibly moves.
//!
//! Delayed work (removing the ball after it has rested in its bucket) is
//! keyed by a drop id. Every drop and every reset bumps the session
//! generation, and a pending cleanup only fires if its id still matches.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::error::{DropError, TuningError};
use crate::sim::{
    Board, BucketIndex, PlaybackState, RejectionTally, Synthesis, SynthesisReport, synthesize,
};
use crate::stats::{DropOutcome, DropStats};
use crate::tuning::Tuning;

/// Where the single drop is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    /// Waiting for a target and a drop command
    Ready,
    /// Trajectory fixed, ball moving
    Dropping,
    /// Ball reached its bucket, outcome recorded
    Completed,
}

/// Discrete notifications for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    DropStarted { drop_id: u64, target: BucketIndex },
    BallLanded {
        drop_id: u64,
        landed: BucketIndex,
        success: bool,
    },
    /// The landed ball has been taken off the board
    BallCleared { drop_id: u64 },
    Reset,
}

/// Queryable snapshot for debug overlays
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub phase: SessionPhase,
    pub drop_id: Option<u64>,
    pub current_target: Option<BucketIndex>,
    pub last_landed: Option<BucketIndex>,
    pub total_drops: u64,
    pub successful_drops: u64,
    pub success_rate: f32,
    /// Simulated attempts the last synthesis needed
    pub last_attempts: Option<u32>,
    pub last_used_fallback: bool,
    pub last_rejections: Option<RejectionTally>,
    /// Syntheses that exhausted their retries this session
    pub fallback_count: u64,
}

impl Diagnostics {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone)]
struct ActiveDrop {
    id: u64,
    playback: PlaybackState,
    /// Bucket the trajectory's end point falls in, decided at synthesis time
    landing: BucketIndex,
}

#[derive(Debug, Clone, Copy)]
struct PendingCleanup {
    drop_id: u64,
    due_ms: f64,
}

pub struct Session {
    tuning: Tuning,
    board: Board,
    rng: Pcg32,
    phase: SessionPhase,
    active: Option<ActiveDrop>,
    ball: Option<Vec2>,
    /// Bumped on every drop and every reset
    generation: u64,
    cleanups: Vec<PendingCleanup>,
    stats: DropStats,
    last_outcome: Option<DropOutcome>,
    last_report: Option<SynthesisReport>,
    fallback_count: u64,
    events: Vec<SessionEvent>,
}

impl Session {
    /// Default tuning, seeded from OS entropy
    pub fn new(width: f32, height: f32) -> Self {
        Self::build(width, height, Tuning::default(), Pcg32::from_rng(&mut rand::rng()))
    }

    /// Default tuning with a fixed seed (reproducible drops)
    pub fn with_seed(width: f32, height: f32, seed: u64) -> Self {
        Self::build(width, height, Tuning::default(), Pcg32::seed_from_u64(seed))
    }

    /// Custom tuning, validated up front. `None` seeds from OS entropy.
    pub fn with_tuning(
        width: f32,
        height: f32,
        tuning: Tuning,
        seed: Option<u64>,
    ) -> Result<Self, TuningError> {
        tuning.validate()?;
        let rng = match seed {
            Some(seed) => Pcg32::seed_from_u64(seed),
            None => Pcg32::from_rng(&mut rand::rng()),
        };
        Ok(Self::build(width, height, tuning, rng))
    }

    fn build(width: f32, height: f32, tuning: Tuning, rng: Pcg32) -> Self {
        let board = Board::layout(width, height, &tuning.board);
        Self {
            tuning,
            board,
            rng,
            phase: SessionPhase::Ready,
            active: None,
            ball: None,
            generation: 0,
            cleanups: Vec::new(),
            stats: DropStats::new(),
            last_outcome: None,
            last_report: None,
            fallback_count: 0,
            events: Vec::new(),
        }
    }

    #[inline]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[inline]
    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    #[inline]
    pub fn stats(&self) -> DropStats {
        self.stats
    }

    /// Ball position as of the last tick (`None` when no ball is shown)
    #[inline]
    pub fn ball_position(&self) -> Option<Vec2> {
        self.ball
    }

    pub fn playback(&self) -> Option<&PlaybackState> {
        self.active.as_ref().map(|active| &active.playback)
    }

    pub fn current_target(&self) -> Option<BucketIndex> {
        self.playback().map(|p| p.trajectory().target())
    }

    pub fn last_outcome(&self) -> Option<DropOutcome> {
        self.last_outcome
    }

    pub fn last_report(&self) -> Option<SynthesisReport> {
        self.last_report
    }

    /// Rebuild the board. An in-flight trajectory keeps playing in the
    /// coordinates it was synthesized for; the next drop uses the new board.
    pub fn canvas_resized(&mut self, width: f32, height: f32) {
        self.board = Board::layout(width, height, &self.tuning.board);
        log::debug!("Canvas resized to {}x{}", self.board.width, self.board.height);
    }

    /// Drop toward an explicit 1-based bucket index
    pub fn request_drop(&mut self, target: u32, now_ms: f64) -> Result<BucketIndex, DropError> {
        let target = BucketIndex::new(target)?;
        self.start_drop(target, now_ms)
    }

    /// Draw a uniform target, then drop exactly as `request_drop` would
    pub fn request_random_drop(&mut self, now_ms: f64) -> Result<BucketIndex, DropError> {
        if self.phase == SessionPhase::Dropping {
            return Err(DropError::DropInProgress);
        }
        let target = BucketIndex::random(&mut self.rng);
        self.start_drop(target, now_ms)
    }

    /// Discard the current drop and return to `Ready`
    pub fn request_reset(&mut self) {
        self.invalidate();
        self.events.push(SessionEvent::Reset);
        log::info!("Session reset");
    }

    fn invalidate(&mut self) {
        self.generation += 1;
        self.active = None;
        self.ball = None;
        self.phase = SessionPhase::Ready;
    }

    fn start_drop(&mut self, target: BucketIndex, now_ms: f64) -> Result<BucketIndex, DropError> {
        match self.phase {
            SessionPhase::Dropping => return Err(DropError::DropInProgress),
            SessionPhase::Completed => self.invalidate(),
            SessionPhase::Ready => {}
        }

        let start = self.start_position();
        let Synthesis { trajectory, report } =
            synthesize(start, target, &self.board, &self.tuning, &mut self.rng);
        if report.used_fallback {
            self.fallback_count += 1;
        }

        let landing = self.board.bucket_at(trajectory.last().pos.x);
        if landing != target {
            log::error!("Trajectory for bucket {target} ends in bucket {landing}");
        }
        debug_assert_eq!(landing, target, "synthesized trajectory missed its bucket");

        self.generation += 1;
        let drop_id = self.generation;
        self.ball = Some(trajectory.first().pos);
        self.active = Some(ActiveDrop {
            id: drop_id,
            playback: PlaybackState::new(trajectory, now_ms),
            landing,
        });
        self.last_report = Some(report);
        self.phase = SessionPhase::Dropping;
        self.events.push(SessionEvent::DropStarted { drop_id, target });
        log::info!(
            "Drop {drop_id} toward bucket {target} ({} attempts{})",
            report.attempts,
            if report.used_fallback { ", fallback" } else { "" }
        );
        Ok(target)
    }

    fn start_position(&mut self) -> Vec2 {
        let cfg = &self.tuning.session;
        let jitter = self.rng.random_range(-1.0..=1.0) * cfg.start_jitter * self.board.spacing;
        let start = Vec2::new(
            self.board.width * 0.5 + jitter,
            self.board.height * cfg.start_height_ratio,
        );
        self.board.clamp_start(start)
    }

    /// Advance to wall-clock `now_ms`; returns the ball position to draw
    pub fn tick(&mut self, now_ms: f64) -> Option<Vec2> {
        self.run_cleanups(now_ms);

        if self.phase == SessionPhase::Dropping {
            let landed = match self.active.as_mut() {
                Some(active) => {
                    let frame = active.playback.advance(now_ms);
                    self.ball = Some(frame.pos);
                    frame
                        .just_landed
                        .then(|| (active.id, active.playback.trajectory().target(), active.landing))
                }
                None => None,
            };
            if let Some((drop_id, target, bucket)) = landed {
                self.finish_drop(drop_id, target, bucket, now_ms);
            }
        }

        self.ball
    }

    fn finish_drop(&mut self, drop_id: u64, target: BucketIndex, landed: BucketIndex, now_ms: f64) {
        let outcome = DropOutcome::new(target, landed, now_ms);
        self.stats.record(&outcome);
        self.last_outcome = Some(outcome);
        self.phase = SessionPhase::Completed;
        self.cleanups.push(PendingCleanup {
            drop_id,
            due_ms: now_ms + self.tuning.session.ball_linger_ms,
        });
        self.events.push(SessionEvent::BallLanded {
            drop_id,
            landed,
            success: outcome.success,
        });
        log::info!(
            "Drop {drop_id} landed in bucket {landed} (target {target}), {}/{} on target",
            self.stats.successful_drops,
            self.stats.total_drops
        );
    }

    fn run_cleanups(&mut self, now_ms: f64) {
        let generation = self.generation;
        let mut cleared = None;
        self.cleanups.retain(|cleanup| {
            if now_ms < cleanup.due_ms {
                return true;
            }
            if cleanup.drop_id == generation {
                cleared = Some(cleanup.drop_id);
            } else {
                log::debug!("Dropping stale cleanup for drop {}", cleanup.drop_id);
            }
            false
        });
        if let Some(drop_id) = cleared {
            self.ball = None;
            self.events.push(SessionEvent::BallCleared { drop_id });
        }
    }

    /// Take every event produced since the last call
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            phase: self.phase,
            drop_id: self.active.as_ref().map(|active| active.id),
            current_target: self.current_target(),
            last_landed: self.last_outcome.map(|o| o.landed),
            total_drops: self.stats.total_drops,
            successful_drops: self.stats.successful_drops,
            success_rate: self.stats.success_rate(),
            last_attempts: self.last_report.map(|r| r.attempts),
            last_used_fallback: self.last_report.is_some_and(|r| r.used_fallback),
            last_rejections: self.last_report.map(|r| r.rejections),
            fallback_count: self.fallback_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::with_seed(800.0, 1040.0, 4242)
    }

    /// Tick until the drop lands; returns the landing time
    fn run_to_landing(session: &mut Session, start_ms: f64) -> f64 {
        let duration = session
            .playback()
            .map(|p| p.trajectory().duration_ms() as f64)
            .unwrap();
        let mut now = start_ms;
        while now < start_ms + duration {
            now += 16.0;
            session.tick(now);
        }
        now
    }

    #[test]
    fn test_starts_ready() {
        let session = session();
        assert_eq!(session.phase(), SessionPhase::Ready);
        assert!(session.ball_position().is_none());
        assert!(session.stats().is_empty());
    }

    #[test]
    fn test_full_lifecycle() {
        let mut session = session();
        let target = session.request_drop(2, 0.0).unwrap();
        assert_eq!(target.get(), 2);
        assert_eq!(session.phase(), SessionPhase::Dropping);
        assert_eq!(
            session.drain_events(),
            vec![SessionEvent::DropStarted { drop_id: 1, target }]
        );

        let landed_at = run_to_landing(&mut session, 0.0);
        assert_eq!(session.phase(), SessionPhase::Completed);
        assert_eq!(
            session.drain_events(),
            vec![SessionEvent::BallLanded {
                drop_id: 1,
                landed: target,
                success: true
            }]
        );
        assert_eq!(session.stats().total_drops, 1);
        assert_eq!(session.stats().successful_drops, 1);

        // Ball rests in the bucket, then is cleared
        assert!(session.tick(landed_at + 100.0).is_some());
        assert!(session.tick(landed_at + 1500.0).is_none());
        assert_eq!(
            session.drain_events(),
            vec![SessionEvent::BallCleared { drop_id: 1 }]
        );
    }

    #[test]
    fn test_invalid_target_changes_nothing() {
        let mut session = session();
        assert_eq!(session.request_drop(0, 0.0), Err(DropError::InvalidTarget(0)));
        assert_eq!(session.request_drop(6, 0.0), Err(DropError::InvalidTarget(6)));
        assert_eq!(session.phase(), SessionPhase::Ready);
        assert!(session.drain_events().is_empty());
        assert!(session.last_report().is_none());
    }

    #[test]
    fn test_landing_reported_once() {
        let mut session = session();
        session.request_drop(5, 0.0).unwrap();
        run_to_landing(&mut session, 0.0);
        session.tick(100_000.0);
        session.tick(100_016.0);
        let landings = session
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, SessionEvent::BallLanded { .. }))
            .count();
        assert_eq!(landings, 1);
        assert_eq!(session.stats().total_drops, 1);
    }

    #[test]
    fn test_drop_from_completed_resets_implicitly() {
        let mut session = session();
        session.request_drop(1, 0.0).unwrap();
        let landed_at = run_to_landing(&mut session, 0.0);
        session.drain_events();

        session.request_drop(3, landed_at + 10.0).unwrap();
        assert_eq!(session.phase(), SessionPhase::Dropping);
        // The first drop's cleanup is stale now and must not hide the new ball
        session.tick(landed_at + 1600.0);
        assert!(session.ball_position().is_some());
        assert!(
            !session
                .drain_events()
                .iter()
                .any(|e| matches!(e, SessionEvent::BallCleared { .. }))
        );
    }

    #[test]
    fn test_reset_discards_playback() {
        let mut session = session();
        session.request_drop(2, 0.0).unwrap();
        session.tick(100.0);
        session.request_reset();
        assert!(session.playback().is_none());

        // No playback left to report a landing
        session.tick(10_000.0);
        assert_eq!(session.phase(), SessionPhase::Ready);
        assert!(session.stats().is_empty());
        assert!(session.last_outcome().is_none());
    }

    #[test]
    fn test_diagnostics_snapshot() {
        let mut session = session();
        let diag = session.diagnostics();
        assert_eq!(diag.phase, SessionPhase::Ready);
        assert_eq!(diag.last_attempts, None);

        session.request_drop(4, 0.0).unwrap();
        run_to_landing(&mut session, 0.0);
        let diag = session.diagnostics();
        assert_eq!(diag.phase, SessionPhase::Completed);
        assert_eq!(diag.current_target.map(|b| b.get()), Some(4));
        assert_eq!(diag.last_landed.map(|b| b.get()), Some(4));
        assert_eq!(diag.total_drops, 1);
        assert_eq!(diag.success_rate, 1.0);
        assert!(diag.last_attempts.unwrap() >= 1);

        let json = diag.to_json().unwrap();
        assert!(json.contains("\"phase\":\"Completed\""));
        assert!(json.contains("\"current_target\":4"));
    }

    #[test]
    fn test_with_tuning_validates() {
        let mut tuning = Tuning::default();
        tuning.synthesis.max_attempts = 0;
        assert!(Session::with_tuning(800.0, 1040.0, tuning, Some(1)).is_err());
    }
}
