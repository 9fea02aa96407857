//! Random chord label generation
//!
//! Pure with respect to scheduler state: the generator only reads the
//! selection it is handed at the moment of the call. Randomness comes from
//! an owned `StdRng`, seedable for deterministic tests and simulations.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::ChordSelection;

/// Label displayed when no roots or no qualities are enabled.
///
/// This is a valid displayable state, not an error; playback continues
/// normally while the user fixes their selection.
pub const PLACEHOLDER_LABEL: &str = "∅";

/// Source of new chord labels for the sequence store.
pub trait ChordGenerator {
    /// Produce a label from the enabled selection, or the placeholder when
    /// the selection has no pitches.
    fn generate(&mut self, selection: &ChordSelection) -> String;
}

/// Uniform random generator over the enabled selection.
pub struct RandomChordGenerator {
    rng: StdRng,
}

impl RandomChordGenerator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic generator for tests and the simulate harness.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomChordGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ChordGenerator for RandomChordGenerator {
    fn generate(&mut self, selection: &ChordSelection) -> String {
        if !selection.has_pitches() {
            return PLACEHOLDER_LABEL.to_string();
        }

        let root = &selection.roots[self.rng.gen_range(0..selection.roots.len())];
        let quality = &selection.qualities[self.rng.gen_range(0..selection.qualities.len())];
        let mut label = format!("{}{}", root, quality);

        if !selection.voicings.is_empty() {
            let voicing = &selection.voicings[self.rng.gen_range(0..selection.voicings.len())];
            label.push_str(&format!(" ({})", voicing));
        }

        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_roots_yields_placeholder() {
        let mut generator = RandomChordGenerator::from_seed(1);
        let selection = ChordSelection {
            roots: Vec::new(),
            ..ChordSelection::default()
        };
        assert_eq!(generator.generate(&selection), PLACEHOLDER_LABEL);
    }

    #[test]
    fn test_empty_qualities_yields_placeholder() {
        let mut generator = RandomChordGenerator::from_seed(1);
        let selection = ChordSelection {
            qualities: Vec::new(),
            ..ChordSelection::default()
        };
        assert_eq!(generator.generate(&selection), PLACEHOLDER_LABEL);
    }

    #[test]
    fn test_label_drawn_from_selection() {
        let mut generator = RandomChordGenerator::from_seed(7);
        let selection = ChordSelection {
            roots: vec!["C".to_string()],
            qualities: vec!["7".to_string()],
            voicings: Vec::new(),
        };
        for _ in 0..10 {
            assert_eq!(generator.generate(&selection), "C7");
        }
    }

    #[test]
    fn test_voicing_suffix_applied_when_enabled() {
        let mut generator = RandomChordGenerator::from_seed(7);
        let selection = ChordSelection {
            roots: vec!["F".to_string()],
            qualities: vec!["-7".to_string()],
            voicings: vec!["drop 2".to_string()],
        };
        assert_eq!(generator.generate(&selection), "F-7 (drop 2)");
    }

    #[test]
    fn test_seeded_generation_deterministic() {
        let selection = ChordSelection::default();
        let mut a = RandomChordGenerator::from_seed(42);
        let mut b = RandomChordGenerator::from_seed(42);
        for _ in 0..20 {
            assert_eq!(a.generate(&selection), b.generate(&selection));
        }
    }
}
