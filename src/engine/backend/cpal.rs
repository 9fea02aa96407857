//! CPAL-based click output for desktop platforms
//!
//! The output stream lives on a dedicated audio thread (cpal streams are
//! not `Send` on every host), which also resolves the device and its
//! configuration. Control code talks to the callback through a lock-free
//! SPSC queue of scheduled clicks; the callback advances an atomic frame
//! counter that defines the playback timeline (`frames / sample_rate`).
//!
//! Real-time safety in the callback: no allocations, no locks, no
//! blocking. Click buffers are pre-generated and shared as `Arc`s, and
//! in-flight clicks occupy a fixed-size voice table.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{error, warn};
use rtrb::{Consumer, Producer, RingBuffer};

use crate::audio::{ClickAssets, ClickKind};
use crate::error::AudioError;

use super::ClickOutput;

/// Capacity of the control-to-callback click queue. The look-ahead horizon
/// bounds in-flight clicks to a handful, so this never fills in practice.
const CLICK_QUEUE_CAPACITY: usize = 64;

/// Maximum clicks mixed simultaneously in the callback.
const MAX_VOICES: usize = 8;

/// A click committed to the audio timeline, in output frames.
#[derive(Debug, Clone, Copy)]
struct ScheduledClick {
    kind: ClickKind,
    start_frame: u64,
}

/// One in-flight click being mixed into the output.
struct Voice {
    samples: Arc<Vec<f32>>,
    start_frame: u64,
    position: usize,
}

/// Where the output gets its click buffers from.
enum AssetMode {
    /// No assets; `schedule_click` is a no-op and sessions refuse to start.
    Missing,
    /// Synthesize at the device sample rate once the stream opens.
    Synthesize,
    /// Use pre-loaded buffers (e.g. WAV clicks).
    Fixed(ClickAssets),
}

struct AudioThreadHandle {
    shutdown_tx: mpsc::Sender<()>,
    join: thread::JoinHandle<()>,
}

/// Click output backed by the default cpal output device.
pub struct CpalClickOutput {
    assets: AssetMode,
    frames_written: Arc<AtomicU64>,
    sample_rate: Arc<AtomicU32>,
    running: AtomicBool,
    producer: Mutex<Option<Producer<ScheduledClick>>>,
    audio_thread: Mutex<Option<AudioThreadHandle>>,
}

impl CpalClickOutput {
    /// Output with clicks synthesized at the device sample rate on start.
    pub fn new() -> Self {
        Self::with_mode(AssetMode::Synthesize)
    }

    /// Output playing pre-loaded click assets.
    pub fn with_assets(assets: ClickAssets) -> Self {
        Self::with_mode(AssetMode::Fixed(assets))
    }

    /// Output with no click assets at all; scheduling is a no-op and
    /// session start is refused up front.
    pub fn without_assets() -> Self {
        Self::with_mode(AssetMode::Missing)
    }

    fn with_mode(assets: AssetMode) -> Self {
        Self {
            assets,
            frames_written: Arc::new(AtomicU64::new(0)),
            sample_rate: Arc::new(AtomicU32::new(0)),
            running: AtomicBool::new(false),
            producer: Mutex::new(None),
            audio_thread: Mutex::new(None),
        }
    }

    fn lock_producer(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, Option<Producer<ScheduledClick>>>, AudioError> {
        self.producer.lock().map_err(|_| AudioError::LockPoisoned {
            component: "click_producer".to_string(),
        })
    }

    fn lock_audio_thread(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, Option<AudioThreadHandle>>, AudioError> {
        self.audio_thread
            .lock()
            .map_err(|_| AudioError::LockPoisoned {
                component: "audio_thread".to_string(),
            })
    }

    /// Resolve the default output device, build and run the stream, and
    /// report the device sample rate (or the failure) back through
    /// `ready_tx`. Runs until `shutdown_rx` signals; the stream is built
    /// and dropped on this thread.
    fn run_audio_thread(
        fixed_assets: Option<ClickAssets>,
        mut consumer: Consumer<ScheduledClick>,
        frames_written: Arc<AtomicU64>,
        ready_tx: mpsc::Sender<Result<u32, AudioError>>,
        shutdown_rx: mpsc::Receiver<()>,
    ) {
        let host = cpal::default_host();
        let device = match host.default_output_device() {
            Some(device) => device,
            None => {
                let _ = ready_tx.send(Err(AudioError::NoOutputDevice));
                return;
            }
        };
        let config = match device.default_output_config() {
            Ok(config) => config,
            Err(err) => {
                let _ = ready_tx.send(Err(AudioError::StreamOpenFailed {
                    reason: format!("Failed to get default output config: {:?}", err),
                }));
                return;
            }
        };
        if config.sample_format() != cpal::SampleFormat::F32 {
            let _ = ready_tx.send(Err(AudioError::StreamOpenFailed {
                reason: "Only F32 sample format is currently supported for output".to_string(),
            }));
            return;
        }

        let stream_config: cpal::StreamConfig = config.into();
        let sample_rate = stream_config.sample_rate.0;
        let channels = stream_config.channels as usize;

        let assets = fixed_assets.unwrap_or_else(|| ClickAssets::synthesize(sample_rate));
        let accent = assets.buffer(ClickKind::Accent);
        let plain = assets.buffer(ClickKind::Plain);

        // Pre-allocated voice table; the callback never allocates.
        let mut voices: Vec<Option<Voice>> = (0..MAX_VOICES).map(|_| None).collect();

        let err_fn = |err| error!("[CpalClickOutput] output stream error: {}", err);

        let stream = device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let frames = (data.len() / channels) as u64;
                let head = frames_written.load(Ordering::Relaxed);

                // Admit newly committed clicks. Instants already in the
                // past are clamped to the head of this buffer so they
                // play immediately. Table overflow drops the click; the
                // control side bounds in-flight clicks to the look-ahead
                // window, so that is unreachable short of a runaway
                // scheduler.
                while let Ok(click) = consumer.pop() {
                    let samples = match click.kind {
                        ClickKind::Accent => Arc::clone(&accent),
                        ClickKind::Plain => Arc::clone(&plain),
                    };
                    let start_frame = click.start_frame.max(head);
                    if let Some(slot) = voices.iter_mut().find(|slot| slot.is_none()) {
                        *slot = Some(Voice {
                            samples,
                            start_frame,
                            position: 0,
                        });
                    }
                }

                for frame in 0..frames {
                    let global = head + frame;
                    let mut mix = 0.0f32;
                    for slot in voices.iter_mut() {
                        if let Some(voice) = slot {
                            if global >= voice.start_frame
                                && voice.position < voice.samples.len()
                            {
                                mix += voice.samples[voice.position];
                                voice.position += 1;
                            }
                        }
                    }
                    let base = (frame as usize) * channels;
                    for sample in &mut data[base..base + channels] {
                        *sample = mix;
                    }
                }

                for slot in voices.iter_mut() {
                    if let Some(voice) = slot {
                        if voice.position >= voice.samples.len() {
                            *slot = None;
                        }
                    }
                }

                frames_written.fetch_add(frames, Ordering::Relaxed);
            },
            err_fn,
            None,
        );

        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                let _ = ready_tx.send(Err(AudioError::StreamOpenFailed {
                    reason: format!("{:?}", err),
                }));
                return;
            }
        };

        if let Err(err) = stream.play() {
            let _ = ready_tx.send(Err(AudioError::StreamOpenFailed {
                reason: format!("{:?}", err),
            }));
            return;
        }

        let _ = ready_tx.send(Ok(sample_rate));

        // Keep the stream alive until stop() signals (or the handle is
        // dropped); either way recv returns and the stream drops here, on
        // the thread that built it.
        let _ = shutdown_rx.recv();
    }
}

impl Default for CpalClickOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl ClickOutput for CpalClickOutput {
    fn start(&self) -> Result<(), AudioError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(AudioError::AlreadyRunning);
        }

        let fixed_assets = match &self.assets {
            AssetMode::Fixed(assets) => Some(assets.clone()),
            // Missing never reaches the callback (scheduling is a no-op),
            // so the synthesized fallback is fine for both arms.
            AssetMode::Synthesize | AssetMode::Missing => None,
        };

        // Fresh timeline for this run; sessions stamp their clock off
        // current_time() after start returns.
        self.frames_written.store(0, Ordering::SeqCst);

        let (producer, consumer) = RingBuffer::<ScheduledClick>::new(CLICK_QUEUE_CAPACITY);
        let (ready_tx, ready_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel();
        let frames_written = Arc::clone(&self.frames_written);

        let join = thread::spawn(move || {
            Self::run_audio_thread(fixed_assets, consumer, frames_written, ready_tx, shutdown_rx);
        });

        match ready_rx.recv() {
            Ok(Ok(rate)) => {
                self.sample_rate.store(rate, Ordering::SeqCst);
                *self.lock_producer()? = Some(producer);
                *self.lock_audio_thread()? = Some(AudioThreadHandle { shutdown_tx, join });
                Ok(())
            }
            Ok(Err(err)) => {
                let _ = join.join();
                self.running.store(false, Ordering::SeqCst);
                Err(err)
            }
            Err(_) => {
                let _ = join.join();
                self.running.store(false, Ordering::SeqCst);
                Err(AudioError::StreamOpenFailed {
                    reason: "audio thread exited before the stream opened".to_string(),
                })
            }
        }
    }

    fn stop(&self) -> Result<(), AudioError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(AudioError::NotRunning);
        }

        *self.lock_producer()? = None;
        if let Some(handle) = self.lock_audio_thread()?.take() {
            let _ = handle.shutdown_tx.send(());
            if handle.join.join().is_err() {
                warn!("[CpalClickOutput] audio thread panicked during shutdown");
            }
        }
        Ok(())
    }

    fn current_time(&self) -> f64 {
        let rate = self.sample_rate.load(Ordering::SeqCst);
        if rate == 0 {
            return 0.0;
        }
        self.frames_written.load(Ordering::Relaxed) as f64 / rate as f64
    }

    fn schedule_click(&self, kind: ClickKind, at: f64) -> Result<(), AudioError> {
        if matches!(self.assets, AssetMode::Missing) {
            return Ok(());
        }
        if !self.running.load(Ordering::SeqCst) {
            return Err(AudioError::ScheduleRejected {
                reason: "output not running".to_string(),
            });
        }
        let rate = self.sample_rate.load(Ordering::SeqCst);
        if rate == 0 {
            return Err(AudioError::ScheduleRejected {
                reason: "sample rate unknown".to_string(),
            });
        }

        let start_frame = (at.max(0.0) * rate as f64).round() as u64;
        let mut guard = self.lock_producer()?;
        let producer = guard.as_mut().ok_or_else(|| AudioError::ScheduleRejected {
            reason: "output not running".to_string(),
        })?;
        producer
            .push(ScheduledClick { kind, start_frame })
            .map_err(|_| AudioError::ScheduleRejected {
                reason: "click queue full".to_string(),
            })
    }

    fn click_assets_loaded(&self) -> bool {
        !matches!(self.assets, AssetMode::Missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Device-dependent paths (start/stop against real hardware) are
    // exercised via the CLI play subcommand; these tests pin the pure
    // parts.

    #[test]
    fn test_assets_loaded_reporting() {
        assert!(CpalClickOutput::new().click_assets_loaded());
        assert!(!CpalClickOutput::without_assets().click_assets_loaded());
        let assets = ClickAssets::synthesize(48000);
        assert!(CpalClickOutput::with_assets(assets).click_assets_loaded());
    }

    #[test]
    fn test_schedule_without_assets_is_noop() {
        let output = CpalClickOutput::without_assets();
        assert!(output.schedule_click(ClickKind::Plain, 0.0).is_ok());
    }

    #[test]
    fn test_schedule_rejected_when_stopped() {
        let output = CpalClickOutput::new();
        let result = output.schedule_click(ClickKind::Plain, 0.0);
        assert!(matches!(result, Err(AudioError::ScheduleRejected { .. })));
    }

    #[test]
    fn test_current_time_zero_before_start() {
        let output = CpalClickOutput::new();
        assert_eq!(output.current_time(), 0.0);
    }
}
