use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;

use crate::audio::ClickKind;
use crate::error::AudioError;

use super::ClickOutput;

/// A click recorded by the stub output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecordedClick {
    pub kind: ClickKind,
    pub at: f64,
}

/// Deterministic output used for tests and the simulate harness.
///
/// Time advances only when the driver advances it, and scheduled clicks
/// are recorded instead of played, so scheduling behavior can be asserted
/// exactly.
pub struct StubClickOutput {
    running: AtomicBool,
    now_micros: AtomicU64,
    assets_loaded: bool,
    recorded: Mutex<Vec<RecordedClick>>,
}

impl StubClickOutput {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            now_micros: AtomicU64::new(0),
            assets_loaded: true,
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Stub behaving like an output whose click assets failed to load.
    pub fn without_assets() -> Self {
        Self {
            assets_loaded: false,
            ..Self::new()
        }
    }

    /// Advance the playback clock by `seconds`.
    pub fn advance(&self, seconds: f64) {
        let micros = (seconds * 1_000_000.0).round() as u64;
        self.now_micros.fetch_add(micros, Ordering::SeqCst);
    }

    /// Clicks recorded so far, in scheduling order.
    pub fn recorded(&self) -> Vec<RecordedClick> {
        self.recorded.lock().unwrap().clone()
    }

    /// Drain the recorded clicks.
    pub fn take_recorded(&self) -> Vec<RecordedClick> {
        std::mem::take(&mut self.recorded.lock().unwrap())
    }
}

impl Default for StubClickOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl ClickOutput for StubClickOutput {
    fn start(&self) -> Result<(), AudioError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(AudioError::AlreadyRunning);
        }
        Ok(())
    }

    fn stop(&self) -> Result<(), AudioError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(AudioError::NotRunning);
        }
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.now_micros.load(Ordering::SeqCst) as f64 / 1_000_000.0
    }

    fn schedule_click(&self, kind: ClickKind, at: f64) -> Result<(), AudioError> {
        if !self.assets_loaded {
            return Ok(());
        }
        if !self.running.load(Ordering::SeqCst) {
            return Err(AudioError::ScheduleRejected {
                reason: "output not running".to_string(),
            });
        }
        self.recorded
            .lock()
            .map_err(|_| AudioError::LockPoisoned {
                component: "stub_recorded".to_string(),
            })?
            .push(RecordedClick { kind, at });
        Ok(())
    }

    fn click_assets_loaded(&self) -> bool {
        self.assets_loaded
    }
}
