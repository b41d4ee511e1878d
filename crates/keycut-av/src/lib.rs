//! # keycut-av
//!
//! Everything that talks to the media engine (`ffmpeg`/`ffprobe`) during a
//! keyframe-aware trim.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find `ffmpeg` and `ffprobe`
//!   and report their versions.
//! - **Command execution** ([`ToolCommand`], [`ToolProcess`]) -- async
//!   builder with timeout and cancellation support, run to completion or
//!   streamed line by line.
//! - **Workspace management** ([`Workspace`]) -- temporary directory
//!   lifecycle with safe finalization.
//! - **Pipeline stages** -- [`probe_source`], [`locate_split_point`],
//!   [`produce_segments`] and [`merge_segments`].
//! - **Orchestration** ([`Trimmer`]) -- runs the stages for a
//!   [`TrimRequest`] and cleans up on every exit path.

pub mod command;
pub mod engine;
pub mod merge;
pub mod probe;
pub mod segment;
pub mod split;
pub mod tools;
pub mod trim;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use command::{LineSource, ToolCommand, ToolOutput, ToolProcess};
pub use engine::Engine;
pub use tools::{ResolvedTool, ToolInfo, ToolRegistry};
pub use workspace::Workspace;

// Pipeline stages
pub use merge::merge_segments;
pub use probe::probe_source;
pub use segment::{produce_segments, Segments};
pub use split::{locate_split_point, scan_packets};
pub use trim::{TrimReport, TrimRequest, TrimStage, Trimmer};
