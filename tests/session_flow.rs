//! Drop lifecycle through the public `Session` API

use plinko_drop::{DropError, Session, SessionEvent, SessionPhase, Tuning};

const FRAME_MS: f64 = 16.0;

fn session(seed: u64) -> Session {
    Session::with_seed(800.0, 1040.0, seed)
}

fn duration(session: &Session) -> f64 {
    session
        .playback()
        .map(|p| p.trajectory().duration_ms() as f64)
        .expect("drop in flight")
}

/// Tick frames from `from` through `until` inclusive-ish; returns the last tick time
fn tick_until(session: &mut Session, from: f64, until: f64) -> f64 {
    let mut now = from;
    while now < until {
        now += FRAME_MS;
        session.tick(now);
    }
    now
}

#[test]
fn test_scenario_edge_and_center_targets() {
    for (target, lo, hi) in [(1, 16.0, 144.0), (3, 336.0, 464.0)] {
        for seed in 0..20 {
            let mut session = session(seed);
            session.request_drop(target, 0.0).unwrap();
            let dur = duration(&session);
            let end = tick_until(&mut session, 0.0, dur);
            let pos = session.ball_position().unwrap();
            assert!(
                pos.x >= lo - 1e-3 && pos.x <= hi + 1e-3,
                "seed {seed}: bucket {target} ended at x = {}",
                pos.x
            );
            assert_eq!(pos.y, session.board().bucket_top());
            assert_eq!(session.phase(), SessionPhase::Completed, "at {end} ms");
            assert_eq!(session.last_outcome().map(|o| o.success), Some(true));
        }
    }
}

#[test]
fn test_drop_while_dropping_is_rejected() {
    let mut session = session(1);
    session.request_drop(2, 0.0).unwrap();
    session.tick(500.0);
    let before = session.playback().unwrap().trajectory().clone();
    let events_before = session.drain_events();

    assert_eq!(session.request_drop(4, 600.0), Err(DropError::DropInProgress));
    assert_eq!(session.request_random_drop(600.0), Err(DropError::DropInProgress));

    assert_eq!(session.phase(), SessionPhase::Dropping);
    assert_eq!(session.playback().unwrap().trajectory(), &before);
    assert_eq!(session.playback().unwrap().start_ms(), 0.0);
    assert_eq!(session.current_target().map(|b| b.get()), Some(2));
    assert!(session.drain_events().is_empty());
    assert_eq!(events_before.len(), 1);
}

#[test]
fn test_invalid_targets_rejected() {
    let mut session = session(2);
    for target in [0, 6, 100, u32::MAX] {
        assert_eq!(
            session.request_drop(target, 0.0),
            Err(DropError::InvalidTarget(target))
        );
    }
    assert_eq!(session.phase(), SessionPhase::Ready);
    assert!(session.drain_events().is_empty());
    assert!(session.stats().is_empty());
}

#[test]
fn test_reset_during_drop_ignores_late_landing() {
    let mut session = session(3);
    session.request_drop(5, 0.0).unwrap();
    let duration = duration(&session);
    session.tick(duration * 0.5);

    session.request_reset();
    assert_eq!(session.phase(), SessionPhase::Ready);
    assert!(session.ball_position().is_none());

    // Well past when the old drop would have landed
    tick_until(&mut session, duration * 0.5, duration + 3000.0);
    assert_eq!(session.phase(), SessionPhase::Ready);
    assert!(session.ball_position().is_none());
    assert!(session.stats().is_empty());

    let events = session.drain_events();
    assert!(matches!(events.last(), Some(SessionEvent::Reset)));
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, SessionEvent::BallLanded { .. }))
    );
}

#[test]
fn test_reset_after_landing_cancels_cleanup() {
    let mut session = session(4);
    session.request_drop(1, 0.0).unwrap();
    let dur = duration(&session);
    let landed_at = tick_until(&mut session, 0.0, dur);
    assert_eq!(session.phase(), SessionPhase::Completed);

    session.request_reset();
    session.request_drop(2, landed_at + 10.0).unwrap();
    session.drain_events();

    // The first drop's cleanup comes due while the second ball is falling
    let linger = session.tuning().session.ball_linger_ms;
    session.tick(landed_at + linger + 1.0);
    assert!(session.ball_position().is_some());
    assert!(session.drain_events().is_empty());
    assert_eq!(session.phase(), SessionPhase::Dropping);
}

#[test]
fn test_ball_cleared_after_linger() {
    let mut session = session(5);
    session.request_drop(3, 0.0).unwrap();
    let dur = duration(&session);
    let landed_at = tick_until(&mut session, 0.0, dur);
    let linger = session.tuning().session.ball_linger_ms;

    assert!(session.tick(landed_at + linger - 1.0).is_some());
    assert!(session.tick(landed_at + linger).is_none());
    let events = session.drain_events();
    let drop_id = match events.first() {
        Some(SessionEvent::DropStarted { drop_id, .. }) => *drop_id,
        other => panic!("unexpected first event {other:?}"),
    };
    assert_eq!(events.last(), Some(&SessionEvent::BallCleared { drop_id }));
}

#[test]
fn test_stats_accumulate() {
    let mut session = session(6);
    let mut now = 0.0;
    for _ in 0..10 {
        session.request_random_drop(now).unwrap();
        let dur = duration(&session);
        now = tick_until(&mut session, now, now + dur);
    }
    let stats = session.stats();
    assert_eq!(stats.total_drops, 10);
    assert_eq!(stats.successful_drops, 10);
    assert_eq!(stats.success_rate(), 1.0);
}

#[test]
fn test_same_seed_same_session() {
    let run = |seed| {
        let mut session = session(seed);
        let mut now = 0.0;
        let mut ends = Vec::new();
        for target in [1, 5, 3] {
            session.request_drop(target, now).unwrap();
            let dur = duration(&session);
            now = tick_until(&mut session, now, now + dur);
            ends.push(session.ball_position().unwrap());
        }
        ends
    };
    assert_eq!(run(77), run(77));
}

#[test]
fn test_resize_keeps_flight_and_relayouts_next_drop() {
    let mut session = session(8);
    session.request_drop(4, 0.0).unwrap();
    let trajectory = session.playback().unwrap().trajectory().clone();

    session.canvas_resized(400.0, 520.0);
    assert_eq!(session.board().width, 400.0);
    assert_eq!(session.playback().unwrap().trajectory(), &trajectory);

    let landed_at = tick_until(&mut session, 0.0, trajectory.duration_ms() as f64);
    assert_eq!(session.ball_position(), Some(trajectory.last().pos));

    session.request_drop(4, landed_at).unwrap();
    let end = session.playback().unwrap().trajectory().last().pos;
    let bucket = &session.board().buckets[3];
    assert!(end.x > bucket.left && end.x < bucket.right);
}

#[test]
fn test_zero_canvas_still_drops() {
    let mut session = Session::with_tuning(0.0, 0.0, Tuning::default(), Some(9)).unwrap();
    assert_eq!(session.request_drop(2, 0.0).map(|b| b.get()), Ok(2));
    let d = duration(&session);
    tick_until(&mut session, 0.0, d);
    assert_eq!(session.phase(), SessionPhase::Completed);
}

#[test]
fn test_events_serialize_for_presentation() {
    let mut session = session(10);
    session.request_drop(2, 0.0).unwrap();
    let json = serde_json::to_string(&session.drain_events()).unwrap();
    assert_eq!(json, r#"[{"event":"drop_started","drop_id":1,"target":2}]"#);
}
