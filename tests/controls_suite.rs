use crossterm::event::{KeyCode, KeyModifiers};
use kaleido_viewer::config::{is_valid_segments, SEGMENT_CHOICES};
use kaleido_viewer::controls::{ControlAction, Controls};
use kaleido_viewer::scheduler::FrameScheduler;

fn armed_controls() -> Controls {
    let mut c = Controls::new(12, false).unwrap();
    assert!(c.request_start());
    c
}

// ── Segment selection ───────────────────────────────────────────────────────

#[test]
fn segment_set_is_fixed() {
    for &n in &SEGMENT_CHOICES {
        assert!(is_valid_segments(n));
        assert!(n >= 2, "mirror parity needs at least two wedges");
    }
    assert!(!is_valid_segments(7));
    assert!(!is_valid_segments(0));
}

#[test]
fn construction_rejects_invalid_segments() {
    assert!(Controls::new(13, false).is_err());
    assert!(Controls::new(12, false).is_ok());
}

#[test]
fn set_segments_validates_against_the_set() {
    let mut c = armed_controls();
    assert!(!c.set_segments(7));
    assert_eq!(c.segments(), 12);
    assert!(c.set_segments(24));
    assert_eq!(c.segments(), 24);
    assert!(!c.set_segments(24), "unchanged value reports no change");
}

#[test]
fn cycle_segments_wraps_both_ways() {
    let mut c = armed_controls();
    c.set_segments(32);
    c.cycle_segments(true);
    assert_eq!(c.segments(), 6);
    c.cycle_segments(false);
    assert_eq!(c.segments(), 32);
}

// ── Gesture gate ────────────────────────────────────────────────────────────

#[test]
fn request_start_fires_exactly_once() {
    let mut c = Controls::new(12, false).unwrap();
    assert!(!c.armed());
    assert!(c.request_start());
    assert!(c.armed());
    assert!(!c.request_start());
    assert!(!c.request_start());
}

#[test]
fn first_key_only_arms() {
    let mut c = Controls::new(12, false).unwrap();
    let action = c.handle_key(KeyCode::Char('m'), KeyModifiers::NONE);
    assert_eq!(action, ControlAction::Start);
    assert!(c.armed());
    assert!(!c.muted(), "the arming key must not also toggle mute");
}

#[test]
fn quit_works_before_the_gate_opens() {
    let mut c = Controls::new(12, false).unwrap();
    assert_eq!(
        c.handle_key(KeyCode::Char('q'), KeyModifiers::NONE),
        ControlAction::Close
    );
    assert!(!c.armed(), "quit is not a gesture");
    assert_eq!(
        c.handle_key(KeyCode::Char('c'), KeyModifiers::CONTROL),
        ControlAction::Close
    );
}

// ── Mute, busy, keys ────────────────────────────────────────────────────────

#[test]
fn mute_toggle_round_trips() {
    let mut c = armed_controls();
    assert_eq!(
        c.handle_key(KeyCode::Char('m'), KeyModifiers::NONE),
        ControlAction::MuteChanged(true)
    );
    assert_eq!(
        c.handle_key(KeyCode::Char('m'), KeyModifiers::NONE),
        ControlAction::MuteChanged(false)
    );
    assert!(!c.muted());
}

#[test]
fn busy_flag_blocks_reentrant_regenerate() {
    let mut c = armed_controls();
    assert_eq!(
        c.handle_key(KeyCode::Char('r'), KeyModifiers::NONE),
        ControlAction::Regenerate
    );
    assert!(c.busy());
    assert_eq!(
        c.handle_key(KeyCode::Char('r'), KeyModifiers::NONE),
        ControlAction::None,
        "regenerate must not re-enter while busy"
    );
    c.finish_regenerate();
    assert!(!c.busy());
    assert_eq!(
        c.handle_key(KeyCode::Char('r'), KeyModifiers::NONE),
        ControlAction::Regenerate
    );
}

#[test]
fn number_keys_select_segment_counts() {
    let mut c = armed_controls();
    for (i, &expected) in SEGMENT_CHOICES.iter().enumerate() {
        let key = KeyCode::Char((b'1' + i as u8) as char);
        c.handle_key(key, KeyModifiers::NONE);
        assert_eq!(c.segments(), expected);
    }
}

#[test]
fn arrow_keys_cycle_segments() {
    let mut c = armed_controls();
    c.handle_key(KeyCode::Right, KeyModifiers::NONE);
    assert_eq!(c.segments(), 18);
    c.handle_key(KeyCode::Left, KeyModifiers::NONE);
    c.handle_key(KeyCode::Left, KeyModifiers::NONE);
    assert_eq!(c.segments(), 6);
}

// ── Frame scheduler ─────────────────────────────────────────────────────────

#[test]
fn ticks_report_monotonic_elapsed_time() {
    let mut s = FrameScheduler::new(1000);
    let a = s.tick().expect("first tick");
    let b = s.tick().expect("second tick");
    assert!(a.t >= 0.0);
    assert!(b.t > a.t, "elapsed time must be monotonic");
    assert!(b.dt > 0.0);
}

#[test]
fn cancel_stops_the_loop() {
    let mut s = FrameScheduler::new(1000);
    s.tick().expect("tick before cancel");
    s.cancel();
    assert!(s.tick().is_none());
    assert!(s.tick().is_none(), "a canceled loop stays canceled");
}

#[test]
fn handle_cancel_stops_the_pending_frame() {
    let mut s = FrameScheduler::new(1000);
    let handle = s.handle();
    assert!(!handle.is_canceled());
    handle.cancel();
    assert!(s.tick().is_none());
}

#[test]
fn each_tick_retires_the_old_handle() {
    let mut s = FrameScheduler::new(1000);
    let stale = s.handle();
    s.tick().expect("tick");
    // The consumed frame's token no longer controls the loop.
    stale.cancel();
    assert!(s.tick().is_some(), "stale handle must not cancel newer frames");
}

#[test]
fn restart_keeps_the_time_origin() {
    let mut s = FrameScheduler::new(1000);
    let origin = s.origin();
    let before = s.tick().expect("tick").t;

    s.cancel();
    assert!(s.tick().is_none());

    s.restart();
    assert_eq!(s.origin(), origin, "regenerate must not reset the clock");
    let after = s.tick().expect("tick after restart").t;
    assert!(
        after >= before,
        "elapsed time keeps running across reference changes"
    );
}
