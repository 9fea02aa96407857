//! Persisted trainer settings
//!
//! Runtime configuration loaded from a JSON file: session defaults (tempo,
//! slot count), the enabled chord selection, per-slot regenerate flags,
//! and engine tuning knobs. Settings are saved on session start and on
//! settings change, so the next launch resumes where practice left off.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use crate::chords::ChordSelection;

/// Complete trainer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub session: SessionConfig,
    pub selection: ChordSelection,
    /// Per-slot regenerate flags, reapplied when a sequence of the same
    /// length is rebuilt.
    #[serde(default)]
    pub flags: Vec<bool>,
    pub engine: EngineConfig,
}

/// Session defaults used when the caller does not override them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Tempo in beats per minute
    pub bpm: u32,
    /// Number of chord slots
    pub slots: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { bpm: 120, slots: 4 }
    }
}

/// Scheduler and output tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Cadence of the driving tick in milliseconds
    pub tick_interval_ms: u64,
    /// Look-ahead horizon committed to the audio device, in milliseconds.
    /// Must comfortably exceed the tick cadence or beats could fall due in
    /// the gap between ticks.
    pub lookahead_ms: u64,
    /// Sample rate used when synthesizing clicks without a device rate
    pub sample_rate: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 15,
            lookahead_ms: 100,
            sample_rate: 48000,
        }
    }
}

impl Default for TrainerConfig {
    /// Default configuration values (fallback if the settings file is not found)
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            selection: ChordSelection::default(),
            flags: Vec::new(),
            engine: EngineConfig::default(),
        }
    }
}

impl TrainerConfig {
    /// Load configuration from a JSON file
    ///
    /// Falls back to defaults when the file is missing or malformed; a
    /// broken settings file should never keep the trainer from starting.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded settings from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read settings file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default settings path
    pub fn load() -> Self {
        Self::load_from_file(Self::default_path())
    }

    /// Default on-disk location of the settings file
    pub fn default_path() -> &'static str {
        "assets/trainer_settings.json"
    }

    /// Persist the configuration as pretty-printed JSON
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(path, json)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.engine.tick_interval_ms)
    }

    /// Look-ahead horizon in seconds
    pub fn lookahead_seconds(&self) -> f64 {
        self.engine.lookahead_ms as f64 / 1000.0
    }
}
