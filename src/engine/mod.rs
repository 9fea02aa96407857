//! Engine module housing the session core.
//!
//! This module exposes trait-based click outputs (`backend`) and the
//! `TrainerHandle` orchestration layer (`core`).

pub mod backend;
pub mod core;

pub use backend::{ClickOutput, CpalClickOutput, StubClickOutput, SystemTimeSource, TimeSource};
pub use core::{TelemetryEvent, TelemetryEventKind, TrainerHandle};
