//! Click playback assets
//!
//! Pre-generated accent and plain click buffers plus their synthesis and
//! WAV loading. The output backends only copy samples from these buffers;
//! nothing here runs on the audio callback path.

pub mod click;

pub use click::{generate_click_sample, ClickAssets, ClickKind};
