//! Chord label vocabulary
//!
//! Root, quality, and voicing catalogs plus the user's enabled selection.
//! The catalogs are fixed; the selection is what the checkbox UI (or CLI
//! flags) narrows down, and it is persisted with the rest of the settings.

pub mod generator;

pub use generator::{ChordGenerator, RandomChordGenerator, PLACEHOLDER_LABEL};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// The 17 root spellings offered by the trainer, enharmonic sharps and
/// flats included so practice material matches how charts actually spell
/// them.
pub static ROOT_CATALOG: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "C", "C#", "Db", "D", "D#", "Eb", "E", "F", "F#", "Gb", "G", "G#", "Ab", "A", "A#", "Bb",
        "B",
    ]
});

/// Quality suffixes: major (empty), minor, dominant seventh,
/// half-diminished, minor seventh.
pub static QUALITY_CATALOG: Lazy<Vec<&'static str>> = Lazy::new(|| vec!["", "-", "7", "ø", "-7"]);

/// Voicing hints appended in parentheses when enabled. Disabled by default.
pub static VOICING_CATALOG: Lazy<Vec<&'static str>> =
    Lazy::new(|| vec!["root", "1st inv", "2nd inv", "drop 2"]);

/// The currently enabled subsets of the catalogs.
///
/// An empty `roots` or `qualities` set is a valid state: generation then
/// yields the placeholder label instead of failing. An empty `voicings`
/// set simply omits the voicing suffix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordSelection {
    pub roots: Vec<String>,
    pub qualities: Vec<String>,
    pub voicings: Vec<String>,
}

impl Default for ChordSelection {
    /// Everything enabled except voicings, matching a fresh set of checkboxes.
    fn default() -> Self {
        Self {
            roots: ROOT_CATALOG.iter().map(|r| r.to_string()).collect(),
            qualities: QUALITY_CATALOG.iter().map(|q| q.to_string()).collect(),
            voicings: Vec::new(),
        }
    }
}

impl ChordSelection {
    /// Whether a pitched chord label can be generated at all.
    pub fn has_pitches(&self) -> bool {
        !self.roots.is_empty() && !self.qualities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_sizes() {
        assert_eq!(ROOT_CATALOG.len(), 17);
        assert_eq!(QUALITY_CATALOG.len(), 5);
        assert!(!VOICING_CATALOG.is_empty());
    }

    #[test]
    fn test_default_selection_enables_all_pitches() {
        let selection = ChordSelection::default();
        assert_eq!(selection.roots.len(), ROOT_CATALOG.len());
        assert_eq!(selection.qualities.len(), QUALITY_CATALOG.len());
        assert!(selection.voicings.is_empty());
        assert!(selection.has_pitches());
    }

    #[test]
    fn test_has_pitches_requires_both_sets() {
        let mut selection = ChordSelection::default();
        selection.roots.clear();
        assert!(!selection.has_pitches());

        let mut selection = ChordSelection::default();
        selection.qualities.clear();
        assert!(!selection.has_pitches());
    }
}
