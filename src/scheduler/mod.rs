//! Look-ahead beat scheduler
//!
//! This module is the timing heart of the trainer. The driving tick fires
//! at a coarse, jittery cadence; the audio device plays at precise
//! instants on its own clock. The scheduler reconciles the two by keying
//! every decision off elapsed time on the playback clock and committing
//! clicks a short horizon ahead of it:
//! - Beat instants are always derived from the immutable session start
//!   time and an integer beat index, never from accumulated additions, so
//!   a stalled tick (a backgrounded UI, a busy machine) resumes exactly on
//!   grid instead of drifting.
//! - Each tick commits every beat whose instant falls before `now + H`.
//!   A late tick therefore emits one click per beat that fell due, each
//!   timestamped at its own correct instant, rather than collapsing them.
//! - A chord slot's label may only change at the instant the cursor moves
//!   off it (mutate-on-exit), so the label on screen is stable for the
//!   whole time it is active.

use std::sync::Arc;

use log::warn;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::audio::ClickKind;
use crate::chords::{ChordGenerator, ChordSelection};
use crate::engine::backend::ClickOutput;
use crate::error::SessionError;
use crate::sequence::ChordSequence;

/// Beats per bar; the first beat of each bar is accented.
pub const BEATS_PER_BAR: u64 = 4;

/// Seconds between consecutive beats at `bpm`.
///
/// # Examples
/// ```
/// assert_eq!(chord_trainer::scheduler::seconds_per_beat(120), 0.5);
/// ```
#[inline]
pub fn seconds_per_beat(bpm: u32) -> f64 {
    60.0 / bpm as f64
}

/// Number of whole beats elapsed at `now` on a session started at
/// `start_time`.
///
/// Derived from absolute elapsed time, so the result is reproducible and
/// monotonically non-decreasing as `now` increases; instants before the
/// start clamp to beat 0.
#[inline]
pub fn beats_elapsed(now: f64, start_time: f64, bpm: u32) -> u64 {
    if now <= start_time {
        return 0;
    }
    ((now - start_time) / seconds_per_beat(bpm)).floor() as u64
}

/// Position of `beat` inside its bar.
#[inline]
pub fn beat_in_bar(beat: u64) -> u64 {
    beat % BEATS_PER_BAR
}

/// Whether `beat` gets the accented click.
#[inline]
pub fn is_accented(beat: u64) -> bool {
    beat_in_bar(beat) == 0
}

/// Chord slot index active during `beat`, for a sequence of `slots` slots.
///
/// One slot lasts one bar. Precondition: `slots >= 1` (enforced at session
/// start, before any scheduling runs).
#[inline]
pub fn chord_index(beat: u64, slots: usize) -> usize {
    debug_assert!(slots >= 1);
    ((beat / BEATS_PER_BAR) % slots as u64) as usize
}

/// Playback-clock instant of `beat`.
#[inline]
pub fn beat_time(beat: u64, start_time: f64, bpm: u32) -> f64 {
    start_time + beat as f64 * seconds_per_beat(bpm)
}

/// Immutable per-session clock. Beat 0 plays at `start_time`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionClock {
    pub start_time: f64,
    pub bpm: u32,
}

/// Transient scheduling position.
///
/// `next_beat` is the first beat not yet committed to the audio device;
/// `active_slot_index` persists across ticks as the last-known active slot
/// so that transitions are detected exactly once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleCursor {
    pub next_beat: u64,
    pub active_slot_index: usize,
}

/// Snapshot pushed to presentation adapters when the active slot changes.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayUpdate {
    pub labels: Vec<String>,
    pub flags: Vec<bool>,
    pub active_index: usize,
}

/// Outcome of one tick invocation, reported for telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    pub clicks_scheduled: u32,
    pub clicks_dropped: u32,
    pub boundaries_crossed: u32,
}

/// Collaborators bundled for a session, wired by the session controller.
pub struct SessionContext {
    pub bpm: u32,
    /// Look-ahead horizon in seconds.
    pub lookahead: f64,
    pub sequence: ChordSequence,
    pub generator: Box<dyn ChordGenerator + Send>,
    pub selection: ChordSelection,
    pub output: Arc<dyn ClickOutput>,
    pub display_tx: broadcast::Sender<DisplayUpdate>,
}

/// One session's scheduler state.
///
/// Owned by a single accessor (the controller's session mutex); the tick
/// task and user-input entry points never touch it concurrently.
/// Preconditions upheld by the controller before construction: `bpm > 0`,
/// a non-empty sequence, click assets loaded on the output.
pub struct ScheduledSession {
    clock: SessionClock,
    cursor: ScheduleCursor,
    lookahead: f64,
    sequence: ChordSequence,
    generator: Box<dyn ChordGenerator + Send>,
    selection: ChordSelection,
    output: Arc<dyn ClickOutput>,
    display_tx: broadcast::Sender<DisplayUpdate>,
}

impl ScheduledSession {
    /// Stamp a fresh session clock off the output's current time and
    /// publish the initial display state.
    pub fn new(ctx: SessionContext) -> Self {
        let start_time = ctx.output.current_time();
        let session = Self {
            clock: SessionClock {
                start_time,
                bpm: ctx.bpm,
            },
            cursor: ScheduleCursor {
                next_beat: 0,
                active_slot_index: 0,
            },
            lookahead: ctx.lookahead,
            sequence: ctx.sequence,
            generator: ctx.generator,
            selection: ctx.selection,
            output: ctx.output,
            display_tx: ctx.display_tx,
        };
        session.publish_display();
        session
    }

    /// Commit every beat due within the look-ahead horizon.
    ///
    /// Serially invoked by the repeating tick task with `now` read from
    /// the output clock. Boundary handling runs before the click is
    /// committed, matching the order in which a listener perceives the
    /// bar: the new chord is on screen when its downbeat sounds.
    pub fn tick(&mut self, now: f64) -> TickReport {
        let mut report = TickReport::default();

        while beat_time(self.cursor.next_beat, self.clock.start_time, self.clock.bpm)
            < now + self.lookahead
        {
            let beat = self.cursor.next_beat;
            let at = beat_time(beat, self.clock.start_time, self.clock.bpm);

            let idx = chord_index(beat, self.sequence.len());
            if idx != self.cursor.active_slot_index {
                self.sequence
                    .advance_to(idx, self.generator.as_mut(), &self.selection);
                self.cursor.active_slot_index = idx;
                report.boundaries_crossed += 1;
                self.publish_display();
            }

            let kind = if is_accented(beat) {
                ClickKind::Accent
            } else {
                ClickKind::Plain
            };
            match self.output.schedule_click(kind, at) {
                Ok(()) => report.clicks_scheduled += 1,
                Err(err) => {
                    report.clicks_dropped += 1;
                    warn!("[Scheduler] click for beat {} dropped: {}", beat, err);
                }
            }

            self.cursor.next_beat += 1;
        }

        report
    }

    /// User-triggered flag toggle; takes effect at the next crossing.
    pub fn set_flag(&mut self, index: usize, enabled: bool) -> Result<(), SessionError> {
        self.sequence.set_flag(index, enabled)?;
        self.publish_display();
        Ok(())
    }

    /// Replace the enabled selection; used from the next generation on.
    pub fn set_selection(&mut self, selection: ChordSelection) {
        self.selection = selection;
    }

    pub fn snapshot(&self) -> DisplayUpdate {
        DisplayUpdate {
            labels: self.sequence.labels(),
            flags: self.sequence.flags(),
            active_index: self.cursor.active_slot_index,
        }
    }

    pub fn cursor(&self) -> ScheduleCursor {
        self.cursor
    }

    /// Surrender the sequence so contents survive a stop/start boundary.
    pub fn into_sequence(self) -> ChordSequence {
        self.sequence
    }

    fn publish_display(&self) {
        // No subscribers is fine; rendering is optional.
        let _ = self.display_tx.send(self.snapshot());
    }
}
