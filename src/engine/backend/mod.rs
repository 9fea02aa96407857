//! Backend abstractions for click playback.

use std::time::Instant;

use crate::audio::ClickKind;
use crate::error::AudioError;

/// Trait implemented by click playback outputs.
///
/// The scheduler keys every decision off `current_time`, which must be
/// monotonic and share a timeline with the instants handed to
/// `schedule_click`; that contract is what keeps click timing immune to
/// the driving tick's jitter.
pub trait ClickOutput: Send + Sync {
    /// Open the output. Fails when already running or the device is
    /// unavailable.
    fn start(&self) -> Result<(), AudioError>;

    /// Close the output. Clicks already committed may still sound.
    fn stop(&self) -> Result<(), AudioError>;

    /// Monotonic seconds on the playback timeline.
    fn current_time(&self) -> f64;

    /// Commit a click to play at `at`. Fire-and-forget and non-blocking;
    /// an instant already in the past plays immediately. A no-op when no
    /// click assets are loaded.
    fn schedule_click(&self, kind: ClickKind, at: f64) -> Result<(), AudioError>;

    /// Whether click assets are loaded. Session start is refused without
    /// them.
    fn click_assets_loaded(&self) -> bool;
}

/// Trait representing a monotonic time source used for telemetry timestamps.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// Default time source backed by `Instant::now`.
#[derive(Default)]
pub struct SystemTimeSource {
    _unit: (),
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

mod cpal;
pub use self::cpal::CpalClickOutput;

mod stub;
pub use stub::{RecordedClick, StubClickOutput};
