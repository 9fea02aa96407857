//! TrainerHandle: session orchestration layer.
//!
//! This struct is the explicit session object owning all scheduler state:
//! configuration, the click output, the current `ScheduledSession`, and
//! the broadcast channels. Every entry point (start, stop, flag toggles,
//! selection changes) goes through it, and the repeating tick task it
//! spawns is the only other toucher of the session, via the same mutex.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use log::warn;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::chords::{ChordSelection, RandomChordGenerator};
use crate::config::TrainerConfig;
use crate::engine::backend::{ClickOutput, CpalClickOutput, SystemTimeSource, TimeSource};
use crate::error::{log_session_error, SessionError};
use crate::managers::BroadcastChannelManager;
use crate::scheduler::{DisplayUpdate, ScheduledSession, SessionContext};
use crate::sequence::ChordSequence;

/// Telemetry event emitted by the session controller.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryEvent {
    pub timestamp_ms: u64,
    pub kind: TelemetryEventKind,
}

/// Types of telemetry events supported by the controller.
#[derive(Debug, Clone, Serialize)]
pub enum TelemetryEventKind {
    SessionStarted { bpm: u32, slots: usize },
    SessionStopped,
    /// The device rejected clicks during a tick; playback logic proceeded.
    ClicksDropped { count: u32 },
}

/// TrainerHandle orchestrates the scheduler, the click output, and the
/// shared channels.
pub struct TrainerHandle {
    config: Arc<RwLock<TrainerConfig>>,
    /// Where settings are persisted; `None` disables persistence.
    settings_path: Option<PathBuf>,
    output: Arc<dyn ClickOutput>,
    session: Arc<Mutex<Option<ScheduledSession>>>,
    /// Sequence carried across a stop/start boundary when the slot count
    /// is unchanged.
    retained: Mutex<Option<ChordSequence>>,
    pub(crate) broadcasts: BroadcastChannelManager,
    telemetry_tx: broadcast::Sender<TelemetryEvent>,
    running: Arc<AtomicBool>,
    tick_thread: Mutex<Option<thread::JoinHandle<()>>>,
    time_source: Arc<dyn TimeSource>,
    start_instant: Instant,
}

impl TrainerHandle {
    /// Create a handle with platform defaults: settings from the default
    /// path, clicks on the default cpal output device.
    pub fn new() -> Self {
        let config = TrainerConfig::load();
        Self::from_parts(
            config,
            Some(PathBuf::from(TrainerConfig::default_path())),
            Arc::new(CpalClickOutput::new()),
        )
    }

    /// Create a handle with an explicit configuration, playing through the
    /// default cpal output device.
    pub fn with_config(config: TrainerConfig, settings_path: Option<PathBuf>) -> Self {
        Self::from_parts(config, settings_path, Arc::new(CpalClickOutput::new()))
    }

    /// Create a handle over an arbitrary click output. Settings are not
    /// persisted. Used by tests and the simulate harness.
    pub fn with_output(output: Arc<dyn ClickOutput>, config: TrainerConfig) -> Self {
        Self::from_parts(config, None, output)
    }

    fn from_parts(
        config: TrainerConfig,
        settings_path: Option<PathBuf>,
        output: Arc<dyn ClickOutput>,
    ) -> Self {
        let broadcasts = BroadcastChannelManager::new();
        // Channel exists up front so subscribers never miss the initial
        // display event published during start().
        let _ = broadcasts.init_display();
        let (telemetry_tx, _) = broadcast::channel(128);

        Self {
            config: Arc::new(RwLock::new(config)),
            settings_path,
            output,
            session: Arc::new(Mutex::new(None)),
            retained: Mutex::new(None),
            broadcasts,
            telemetry_tx,
            running: Arc::new(AtomicBool::new(false)),
            tick_thread: Mutex::new(None),
            time_source: Arc::new(SystemTimeSource::default()),
            start_instant: Instant::now(),
        }
    }

    // ========================================================================
    // SESSION LIFECYCLE
    // ========================================================================

    /// Start a session at `bpm` with `slots` chord slots.
    ///
    /// Fails fast, before any state is mutated, on a zero tempo, a zero
    /// slot count, or missing click assets. A start while already running
    /// performs an implicit stop first, so restarting is idempotent. Slot
    /// contents are carried forward when the slot count is unchanged;
    /// otherwise a fresh sequence is generated and persisted flags are
    /// reapplied.
    pub fn start(&self, bpm: u32, slots: usize) -> Result<(), SessionError> {
        if bpm == 0 {
            let err = SessionError::BpmInvalid { bpm };
            log_session_error(&err, "start");
            return Err(err);
        }
        if slots == 0 {
            let err = SessionError::SlotCountInvalid { slots };
            log_session_error(&err, "start");
            return Err(err);
        }
        if !self.output.click_assets_loaded() {
            let err = SessionError::ClickAssetsMissing;
            log_session_error(&err, "start");
            return Err(err);
        }

        if self.running.load(Ordering::SeqCst) {
            self.stop()?;
        }

        self.output.start()?;
        if let Err(err) = self.activate_session(bpm, slots) {
            let _ = self.output.stop();
            self.running.store(false, Ordering::SeqCst);
            log_session_error(&err, "start");
            return Err(err);
        }

        {
            let mut config = self.lock_config_write()?;
            config.session.bpm = bpm;
            config.session.slots = slots;
        }
        self.save_settings();

        tracing::info!(bpm, slots, "session started");
        self.emit_event(TelemetryEventKind::SessionStarted { bpm, slots });
        Ok(())
    }

    /// Build the scheduler session and spawn the tick task. The output is
    /// already running when this is called.
    fn activate_session(&self, bpm: u32, slots: usize) -> Result<(), SessionError> {
        let (selection, lookahead, tick_interval, persisted_flags) = {
            let config = self.lock_config_read()?;
            (
                config.selection.clone(),
                config.lookahead_seconds(),
                config.tick_interval(),
                config.flags.clone(),
            )
        };

        let mut generator = Box::new(RandomChordGenerator::new());
        let sequence = match self.lock_retained()?.take() {
            Some(sequence) if sequence.len() == slots => sequence,
            _ => {
                let mut sequence = ChordSequence::generate(slots, generator.as_mut(), &selection);
                sequence.apply_flags(&persisted_flags);
                sequence
            }
        };

        let display_tx = self.broadcasts.init_display();
        let session = ScheduledSession::new(SessionContext {
            bpm,
            lookahead,
            sequence,
            generator,
            selection,
            output: Arc::clone(&self.output),
            display_tx,
        });
        *self.lock_session()? = Some(session);
        self.running.store(true, Ordering::SeqCst);

        self.spawn_tick_task(tick_interval)
    }

    fn spawn_tick_task(&self, tick_interval: Duration) -> Result<(), SessionError> {
        let running = Arc::clone(&self.running);
        let session = Arc::clone(&self.session);
        let output = Arc::clone(&self.output);
        let telemetry_tx = self.telemetry_tx.clone();
        let time_source = Arc::clone(&self.time_source);
        let start_instant = self.start_instant;

        // Spawn a dedicated thread with its own Tokio runtime so the
        // handle works no matter what async context (if any) it was
        // created from.
        let handle = thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("Failed to create Tokio runtime for tick task");

            rt.block_on(async move {
                let mut interval = tokio::time::interval(tick_interval);
                while running.load(Ordering::SeqCst) {
                    interval.tick().await;

                    let report = {
                        let mut guard = match session.lock() {
                            Ok(guard) => guard,
                            Err(_) => {
                                log::error!(
                                    "[TrainerHandle] session lock poisoned; tick task exiting"
                                );
                                break;
                            }
                        };
                        match guard.as_mut() {
                            Some(session) => session.tick(output.current_time()),
                            None => break,
                        }
                    };

                    if report.clicks_dropped > 0 {
                        Self::publish_event(
                            &telemetry_tx,
                            &time_source,
                            start_instant,
                            TelemetryEventKind::ClicksDropped {
                                count: report.clicks_dropped,
                            },
                        );
                    }
                }
            });
        });

        *self.lock_tick_thread()? = Some(handle);
        Ok(())
    }

    /// Stop the running session.
    ///
    /// Cancels the tick task, discards the schedule cursor, and closes the
    /// output. Slot contents are retained for the next start. Clicks
    /// already committed to the device are not retracted.
    pub fn stop(&self) -> Result<(), SessionError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(SessionError::NotRunning);
        }

        if let Some(handle) = self.lock_tick_thread()?.take() {
            if handle.join().is_err() {
                warn!("[TrainerHandle] tick task panicked; continuing shutdown");
            }
        }

        if let Some(session) = self.lock_session()?.take() {
            *self.lock_retained()? = Some(session.into_sequence());
        }

        let result = self.output.stop();
        tracing::info!("session stopped");
        self.emit_event(TelemetryEventKind::SessionStopped);
        result.map_err(Into::into)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // ========================================================================
    // USER INPUT ENTRY POINTS
    // ========================================================================

    /// Mark or unmark a slot for regeneration on its next revisit.
    ///
    /// Valid while running or stopped; the flag is read at the moment of
    /// the next boundary crossing, so the last write before the crossing
    /// wins. The flag is also persisted.
    pub fn toggle_regenerate(&self, index: usize, enabled: bool) -> Result<(), SessionError> {
        {
            let mut guard = self.lock_session()?;
            if let Some(session) = guard.as_mut() {
                session.set_flag(index, enabled)?;
            } else {
                drop(guard);
                let mut retained = self.lock_retained()?;
                match retained.as_mut() {
                    Some(sequence) => sequence.set_flag(index, enabled)?,
                    None => {
                        let slots = self.lock_config_read()?.session.slots;
                        if index >= slots {
                            return Err(SessionError::SlotIndexOutOfRange { index, len: slots });
                        }
                    }
                }
            }
        }

        {
            let mut config = self.lock_config_write()?;
            if config.flags.len() <= index {
                config.flags.resize(index + 1, false);
            }
            config.flags[index] = enabled;
        }
        self.save_settings();
        Ok(())
    }

    /// Replace the enabled roots/qualities/voicings.
    ///
    /// Takes effect at the next generation instant; labels already on
    /// screen are untouched.
    pub fn set_selection(&self, selection: ChordSelection) -> Result<(), SessionError> {
        if let Some(session) = self.lock_session()?.as_mut() {
            session.set_selection(selection.clone());
        }
        self.lock_config_write()?.selection = selection;
        self.save_settings();
        Ok(())
    }

    // ========================================================================
    // OBSERVATION
    // ========================================================================

    /// Subscribe to display updates (one per active-slot change, plus the
    /// initial snapshot on start).
    pub fn subscribe_display(&self) -> Option<broadcast::Receiver<DisplayUpdate>> {
        self.broadcasts.subscribe_display()
    }

    /// Display updates as an async stream.
    pub fn display_stream(&self) -> Option<BroadcastStream<DisplayUpdate>> {
        self.broadcasts.subscribe_display().map(BroadcastStream::new)
    }

    pub fn subscribe_telemetry(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.telemetry_tx.subscribe()
    }

    /// Current labels, flags, and active slot; `None` before the first
    /// session.
    pub fn sequence_snapshot(&self) -> Result<Option<DisplayUpdate>, SessionError> {
        if let Some(session) = self.lock_session()?.as_ref() {
            return Ok(Some(session.snapshot()));
        }
        Ok(self.lock_retained()?.as_ref().map(|sequence| DisplayUpdate {
            labels: sequence.labels(),
            flags: sequence.flags(),
            active_index: 0,
        }))
    }

    pub fn config_snapshot(&self) -> Result<TrainerConfig, SessionError> {
        Ok(self.lock_config_read()?.clone())
    }

    // ========================================================================
    // PRIVATE HELPERS
    // ========================================================================

    fn publish_event(
        tx: &broadcast::Sender<TelemetryEvent>,
        time_source: &Arc<dyn TimeSource>,
        start_instant: Instant,
        kind: TelemetryEventKind,
    ) {
        let timestamp_ms = time_source
            .now()
            .saturating_duration_since(start_instant)
            .as_millis() as u64;
        let _ = tx.send(TelemetryEvent { timestamp_ms, kind });
    }

    fn emit_event(&self, kind: TelemetryEventKind) {
        Self::publish_event(&self.telemetry_tx, &self.time_source, self.start_instant, kind);
    }

    fn save_settings(&self) {
        let Some(path) = &self.settings_path else {
            return;
        };
        match self.config.read() {
            Ok(config) => {
                if let Err(err) = config.save_to_file(path) {
                    warn!(
                        "[TrainerHandle] failed to save settings to {:?}: {}",
                        path, err
                    );
                }
            }
            Err(_) => warn!("[TrainerHandle] settings lock poisoned; skipping save"),
        }
    }

    fn lock_session(&self) -> Result<MutexGuard<'_, Option<ScheduledSession>>, SessionError> {
        self.session.lock().map_err(|_| SessionError::LockPoisoned {
            component: "session".to_string(),
        })
    }

    fn lock_retained(&self) -> Result<MutexGuard<'_, Option<ChordSequence>>, SessionError> {
        self.retained.lock().map_err(|_| SessionError::LockPoisoned {
            component: "retained_sequence".to_string(),
        })
    }

    fn lock_tick_thread(
        &self,
    ) -> Result<MutexGuard<'_, Option<thread::JoinHandle<()>>>, SessionError> {
        self.tick_thread
            .lock()
            .map_err(|_| SessionError::LockPoisoned {
                component: "tick_thread".to_string(),
            })
    }

    fn lock_config_read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, TrainerConfig>, SessionError> {
        self.config.read().map_err(|_| SessionError::LockPoisoned {
            component: "config".to_string(),
        })
    }

    fn lock_config_write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, TrainerConfig>, SessionError> {
        self.config.write().map_err(|_| SessionError::LockPoisoned {
            component: "config".to_string(),
        })
    }
}

impl Default for TrainerHandle {
    fn default() -> Self {
        Self::new()
    }
}
