//! keycut-core: the timeline model and shared types for keyframe-aware trimming.
//!
//! This crate is the foundational dependency for the other keycut crates,
//! providing the [`Timecode`] value type, the split-point and segment-plan
//! types, a unified error type, and the configuration schema. It never spawns
//! processes; everything that talks to the media engine lives in `keycut-av`.

pub mod config;
pub mod error;
pub mod media;
pub mod timecode;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use media::*;
pub use timecode::Timecode;
