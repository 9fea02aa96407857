//! Click sound generation and loading
//!
//! Key features:
//! - Deterministic synthesis (sine burst with exponential decay)
//! - Distinct accent and plain voicings so the downbeat is audible
//! - Optional WAV loading via hound, with synthesis as the fallback
//! - Buffers are shared as `Arc<Vec<f32>>` so the audio callback clones
//!   handles, never sample data

use std::f32::consts::PI;
use std::path::Path;
use std::sync::Arc;

use log::warn;
use serde::Serialize;

use crate::error::AudioError;

/// Duration of a synthesized click in milliseconds
const CLICK_DURATION_MS: f32 = 20.0;

/// Accent click: higher and louder than the plain click
const ACCENT_FREQ_HZ: f32 = 1320.0;
const ACCENT_AMPLITUDE: f32 = 0.6;
const PLAIN_FREQ_HZ: f32 = 880.0;
const PLAIN_AMPLITUDE: f32 = 0.4;

/// Envelope decay constant; ~ -43 dB by the end of the burst
const ENVELOPE_DECAY: f32 = 5.0;

/// Which click sound to play on a beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClickKind {
    /// First beat of a bar
    Accent,
    /// Any other beat
    Plain,
}

/// Generates a click buffer: a sine burst shaped by an exponential decay
/// envelope.
///
/// Output is deterministic for a given argument triple and contains
/// exactly 20ms worth of samples in range [-1.0, 1.0].
///
/// # Arguments
/// * `sample_rate` - Sample rate in Hz (typically 48000)
/// * `frequency` - Sine frequency in Hz
/// * `amplitude` - Peak amplitude before the envelope is applied
pub fn generate_click_sample(sample_rate: u32, frequency: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (sample_rate as f32 * CLICK_DURATION_MS / 1000.0) as usize;
    let phase_increment = 2.0 * PI * frequency / sample_rate as f32;

    let mut samples = Vec::with_capacity(num_samples);
    for i in 0..num_samples {
        let envelope = (-ENVELOPE_DECAY * i as f32 / num_samples as f32).exp();
        samples.push((phase_increment * i as f32).sin() * amplitude * envelope);
    }

    samples
}

/// Pre-generated accent and plain click buffers sharing one sample rate.
#[derive(Debug, Clone)]
pub struct ClickAssets {
    accent: Arc<Vec<f32>>,
    plain: Arc<Vec<f32>>,
    sample_rate: u32,
}

impl ClickAssets {
    /// Synthesize both clicks at `sample_rate`.
    pub fn synthesize(sample_rate: u32) -> Self {
        Self {
            accent: Arc::new(generate_click_sample(
                sample_rate,
                ACCENT_FREQ_HZ,
                ACCENT_AMPLITUDE,
            )),
            plain: Arc::new(generate_click_sample(
                sample_rate,
                PLAIN_FREQ_HZ,
                PLAIN_AMPLITUDE,
            )),
            sample_rate,
        }
    }

    /// Load both clicks from WAV files.
    ///
    /// Mono or multi-channel files are accepted (only the first channel is
    /// kept). The two files must share a sample rate.
    pub fn load_wav<P: AsRef<Path>>(accent_path: P, plain_path: P) -> Result<Self, AudioError> {
        let (accent, accent_rate) = read_wav_mono(accent_path.as_ref())?;
        let (plain, plain_rate) = read_wav_mono(plain_path.as_ref())?;

        if accent_rate != plain_rate {
            return Err(AudioError::AssetLoadFailed {
                reason: format!(
                    "click sample rates differ ({} vs {})",
                    accent_rate, plain_rate
                ),
            });
        }

        Ok(Self {
            accent: Arc::new(accent),
            plain: Arc::new(plain),
            sample_rate: accent_rate,
        })
    }

    /// Load WAV clicks, falling back to synthesis at `sample_rate` with a
    /// warning when loading fails.
    pub fn load_wav_or_synthesize<P: AsRef<Path>>(
        accent_path: P,
        plain_path: P,
        sample_rate: u32,
    ) -> Self {
        match Self::load_wav(accent_path, plain_path) {
            Ok(assets) => assets,
            Err(err) => {
                warn!("[ClickAssets] {}; synthesizing clicks instead", err);
                Self::synthesize(sample_rate)
            }
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Shared handle to the buffer for `kind`.
    pub fn buffer(&self, kind: ClickKind) -> Arc<Vec<f32>> {
        match kind {
            ClickKind::Accent => Arc::clone(&self.accent),
            ClickKind::Plain => Arc::clone(&self.plain),
        }
    }
}

fn read_wav_mono(path: &Path) -> Result<(Vec<f32>, u32), AudioError> {
    let mut reader = hound::WavReader::open(path).map_err(|e| AudioError::AssetLoadFailed {
        reason: format!("{}: {}", path.display(), e),
    })?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let samples: Result<Vec<f32>, hound::Error> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect(),
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect()
        }
    };
    let samples = samples.map_err(|e| AudioError::AssetLoadFailed {
        reason: format!("{}: {}", path.display(), e),
    })?;

    let mono = samples.iter().step_by(channels).copied().collect();
    Ok((mono, spec.sample_rate))
}
