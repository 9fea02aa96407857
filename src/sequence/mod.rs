//! Chord sequence store
//!
//! Holds the fixed-length row of chord slots the trainer cycles through
//! and applies regeneration requests. The store never decides indices:
//! which slot is active and when a boundary is crossed is the scheduler's
//! job; the store only applies the mutate-on-exit policy it is told about.

use crate::chords::{ChordGenerator, ChordSelection};
use crate::error::SessionError;

/// One position in the chord sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordSlot {
    /// Displayed chord label.
    pub label: String,
    /// When set, the label is replaced the next time the slot is left.
    pub regenerate_on_revisit: bool,
}

/// Ordered, fixed-length sequence of chord slots.
///
/// Length is chosen at session start and never changes while a session is
/// running; changing it requires a fresh sequence. Contents are carried
/// across a stop/start boundary when the length is unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordSequence {
    slots: Vec<ChordSlot>,
}

impl ChordSequence {
    /// Build a sequence of `n` freshly generated slots with cleared flags.
    pub fn generate(
        n: usize,
        generator: &mut dyn ChordGenerator,
        selection: &ChordSelection,
    ) -> Self {
        let slots = (0..n)
            .map(|_| ChordSlot {
                label: generator.generate(selection),
                regenerate_on_revisit: false,
            })
            .collect();
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, index: usize) -> Option<&ChordSlot> {
        self.slots.get(index)
    }

    /// Apply the mutate-on-exit policy for a boundary crossing into
    /// `entering`.
    ///
    /// The predecessor of `entering` is the slot being left; its label is
    /// replaced iff its flag is set at this instant. The flag itself is
    /// left untouched so the slot keeps regenerating on every revisit
    /// until the user clears it.
    ///
    /// Returns `true` when the left slot's label was replaced.
    pub fn advance_to(
        &mut self,
        entering: usize,
        generator: &mut dyn ChordGenerator,
        selection: &ChordSelection,
    ) -> bool {
        if self.slots.is_empty() {
            return false;
        }
        let leaving = (entering + self.slots.len() - 1) % self.slots.len();
        match self.slots.get_mut(leaving) {
            Some(slot) if slot.regenerate_on_revisit => {
                slot.label = generator.generate(selection);
                true
            }
            _ => false,
        }
    }

    /// User-triggered flag toggle, independent of scheduling.
    ///
    /// Races with a boundary crossing resolve to last-write-before-crossing
    /// because both paths go through the store's single owner.
    pub fn set_flag(&mut self, index: usize, enabled: bool) -> Result<(), SessionError> {
        let len = self.slots.len();
        match self.slots.get_mut(index) {
            Some(slot) => {
                slot.regenerate_on_revisit = enabled;
                Ok(())
            }
            None => Err(SessionError::SlotIndexOutOfRange { index, len }),
        }
    }

    /// Restore persisted per-slot flags. Extra entries are ignored.
    pub fn apply_flags(&mut self, flags: &[bool]) {
        for (slot, &flag) in self.slots.iter_mut().zip(flags) {
            slot.regenerate_on_revisit = flag;
        }
    }

    pub fn labels(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.label.clone()).collect()
    }

    pub fn flags(&self) -> Vec<bool> {
        self.slots.iter().map(|s| s.regenerate_on_revisit).collect()
    }
}
