//! Integration tests for the session controller
//!
//! These tests validate the full session lifecycle across the public API,
//! including:
//! - Start/stop lifecycle and implicit restart
//! - Precondition fail-fast behavior
//! - Scheduling through the stub output (no audio device required)
//! - Carry-forward of slot contents across a stop/start boundary

use std::sync::Arc;
use std::time::{Duration, Instant};

use chord_trainer::chords::{ChordSelection, PLACEHOLDER_LABEL};
use chord_trainer::config::TrainerConfig;
use chord_trainer::engine::backend::{ClickOutput, StubClickOutput};
use chord_trainer::error::SessionError;
use chord_trainer::{TelemetryEventKind, TrainerHandle};

fn test_handle() -> (TrainerHandle, Arc<StubClickOutput>) {
    test_handle_with_config(TrainerConfig::default())
}

fn test_handle_with_config(config: TrainerConfig) -> (TrainerHandle, Arc<StubClickOutput>) {
    let output = Arc::new(StubClickOutput::new());
    let handle = TrainerHandle::with_output(Arc::clone(&output) as Arc<dyn ClickOutput>, config);
    (handle, output)
}

/// Poll until `predicate` holds or a generous deadline passes. The tick
/// task runs every 15ms, so anything it owes us arrives well within this.
fn wait_for(mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn test_session_lifecycle() {
    let (handle, _output) = test_handle();

    assert!(!handle.is_running());
    handle.start(120, 4).unwrap();
    assert!(handle.is_running());
    handle.stop().unwrap();
    assert!(!handle.is_running());

    assert_eq!(handle.stop(), Err(SessionError::NotRunning));
}

#[test]
fn test_beat_zero_scheduled_once() {
    let (handle, output) = test_handle();
    handle.start(120, 4).unwrap();

    assert!(wait_for(|| !output.recorded().is_empty()));
    let clicks = output.recorded();
    assert_eq!(clicks.len(), 1, "only beat 0 falls inside the horizon");
    assert_eq!(clicks[0].at, 0.0);

    // The stub clock is frozen, so further ticks must not re-emit beat 0.
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(output.recorded().len(), 1);

    handle.stop().unwrap();
}

#[test]
fn test_due_beats_emitted_after_clock_advance() {
    let (handle, output) = test_handle();
    handle.start(120, 4).unwrap();
    assert!(wait_for(|| output.recorded().len() == 1));

    // Two beats fall due when the playback clock jumps a second ahead.
    output.advance(1.0);
    assert!(wait_for(|| output.recorded().len() == 3));

    let clicks = output.recorded();
    let times: Vec<f64> = clicks.iter().map(|c| c.at).collect();
    assert_eq!(times, vec![0.0, 0.5, 1.0]);

    handle.stop().unwrap();
}

#[test]
fn test_implicit_restart_preserves_sequence() {
    let (handle, _output) = test_handle();

    handle.start(120, 4).unwrap();
    let before = handle.sequence_snapshot().unwrap().unwrap().labels;

    // Same slot count: a start while running restarts and keeps contents.
    handle.start(90, 4).unwrap();
    assert!(handle.is_running());
    let after = handle.sequence_snapshot().unwrap().unwrap().labels;
    assert_eq!(after, before);

    // Different slot count: full regeneration.
    handle.start(90, 3).unwrap();
    let rebuilt = handle.sequence_snapshot().unwrap().unwrap().labels;
    assert_eq!(rebuilt.len(), 3);

    handle.stop().unwrap();
}

#[test]
fn test_restart_resets_timeline() {
    let (handle, output) = test_handle();

    handle.start(120, 4).unwrap();
    assert!(wait_for(|| !output.recorded().is_empty()));

    // Stop mid-bar at an instant that is not on the old beat grid.
    output.advance(1.3);
    handle.stop().unwrap();
    output.take_recorded();

    // The new session's beat 0 lands at the new start instant, not on the
    // old session's grid.
    handle.start(120, 4).unwrap();
    assert!(wait_for(|| !output.recorded().is_empty()));
    let restart_time = output.current_time();
    let clicks = output.recorded();
    assert_eq!(clicks[0].at, restart_time);

    handle.stop().unwrap();
}

#[test]
fn test_flagged_slot_regenerates_at_boundary() {
    let (handle, output) = test_handle();

    // 60 BPM: one chord boundary every 4 seconds.
    handle.start(60, 2).unwrap();
    handle.toggle_regenerate(0, true).unwrap();
    // Empty the selection so the regenerated label is deterministically the
    // placeholder, distinguishable from whatever was generated at start.
    handle
        .set_selection(ChordSelection {
            roots: Vec::new(),
            qualities: Vec::new(),
            voicings: Vec::new(),
        })
        .unwrap();
    let before = handle.sequence_snapshot().unwrap().unwrap();
    assert_eq!(before.active_index, 0);
    assert_ne!(before.labels[0], PLACEHOLDER_LABEL);

    output.advance(4.0);
    assert!(wait_for(|| {
        handle
            .sequence_snapshot()
            .unwrap()
            .map(|s| s.active_index == 1)
            .unwrap_or(false)
    }));

    let after = handle.sequence_snapshot().unwrap().unwrap();
    assert_eq!(after.labels[0], PLACEHOLDER_LABEL);
    assert_eq!(after.labels[1], before.labels[1]);

    handle.stop().unwrap();
}

#[test]
fn test_display_event_published_on_start() {
    let (handle, _output) = test_handle();

    let mut display = handle.subscribe_display().expect("channel exists");
    handle.start(120, 4).unwrap();

    assert!(wait_for(|| match display.try_recv() {
        Ok(update) => {
            assert_eq!(update.labels.len(), 4);
            assert_eq!(update.active_index, 0);
            true
        }
        Err(_) => false,
    }));

    handle.stop().unwrap();
}

#[test]
fn test_telemetry_events() {
    let (handle, _output) = test_handle();
    let mut telemetry = handle.subscribe_telemetry();

    handle.start(120, 4).unwrap();
    handle.stop().unwrap();

    let first = telemetry.try_recv().unwrap();
    assert!(matches!(
        first.kind,
        TelemetryEventKind::SessionStarted { bpm: 120, slots: 4 }
    ));
    let second = telemetry.try_recv().unwrap();
    assert!(matches!(second.kind, TelemetryEventKind::SessionStopped));
}

#[test]
fn test_empty_selection_plays_placeholders() {
    let mut config = TrainerConfig::default();
    config.selection = ChordSelection {
        roots: Vec::new(),
        qualities: Vec::new(),
        voicings: Vec::new(),
    };
    let (handle, output) = test_handle_with_config(config);

    handle.start(120, 4).unwrap();
    let snapshot = handle.sequence_snapshot().unwrap().unwrap();
    assert!(snapshot.labels.iter().all(|l| l == PLACEHOLDER_LABEL));

    // Scheduling keeps running on placeholders.
    assert!(wait_for(|| !output.recorded().is_empty()));

    handle.stop().unwrap();
}

#[test]
fn test_settings_persisted_on_start() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trainer_settings.json");

    let output = Arc::new(StubClickOutput::new());
    let config = TrainerConfig::default();
    let handle = TrainerHandle::with_output(Arc::clone(&output) as Arc<dyn ClickOutput>, config);

    // with_output disables persistence; with_config would write to disk.
    // Cover the config layer end to end instead: save what the handle
    // reports and reload it.
    handle.start(96, 6).unwrap();
    let snapshot = handle.config_snapshot().unwrap();
    snapshot.save_to_file(&path).unwrap();
    handle.stop().unwrap();

    let loaded = TrainerConfig::load_from_file(&path);
    assert_eq!(loaded.session.bpm, 96);
    assert_eq!(loaded.session.slots, 6);
}
