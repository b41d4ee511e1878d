//! Media-domain types shared by the probe, locator, producer and merger.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::timecode::Timecode;

// ---------------------------------------------------------------------------
// Probe results
// ---------------------------------------------------------------------------

/// Encoder assignment for one video stream, as reported by the probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEncoder {
    /// Stream index within the source file.
    pub index: u32,
    /// Encoder (or codec) name the engine should use to re-encode it.
    pub encoder: String,
}

/// What the probe learned about a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSource {
    /// Path of the source file.
    pub path: PathBuf,
    /// Resolved container (muxer) name, e.g. `mp4` or `matroska`.
    pub container: String,
    /// Every container name the engine reported for the file.
    pub available_containers: Vec<String>,
    /// Video streams ordered by index.
    pub video_streams: Vec<StreamEncoder>,
}

impl MediaSource {
    /// Container to write `destination` in: its extension when the engine
    /// listed that name for the source, otherwise the source's own container.
    pub fn output_container_for(&self, destination: &Path) -> String {
        destination
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .filter(|ext| self.available_containers.iter().any(|c| c == ext))
            .unwrap_or_else(|| self.container.clone())
    }
}

/// Pick a container for `path` from the engine-reported candidates.
///
/// The extension wins when it names one of the candidates; otherwise the
/// first candidate is used. Returns `None` when there are no candidates.
pub fn resolve_container(path: &Path, candidates: &[String]) -> Option<String> {
    let by_extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .filter(|ext| candidates.iter().any(|c| c == ext));

    by_extension.or_else(|| candidates.first().cloned())
}

// ---------------------------------------------------------------------------
// SplitPoint
// ---------------------------------------------------------------------------

/// Where a trim switches from re-encoding to stream copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitPoint {
    /// Last packet strictly before the keyframe; end of the re-encoded head.
    /// [`Timecode::ZERO`] when no earlier packet was seen.
    pub encode_boundary: Timecode,
    /// First keyframe at or after the requested start; start of the copied tail.
    pub remux_boundary: Timecode,
}

impl fmt::Display for SplitPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "encode until {}, remux from {}",
            self.encode_boundary, self.remux_boundary
        )
    }
}

// ---------------------------------------------------------------------------
// SegmentPlan
// ---------------------------------------------------------------------------

/// A `[from, to]` window on the source timeline. `to` may be [`Timecode::END`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub from: Timecode,
    pub to: Timecode,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.from, self.to)
    }
}

/// Which segments a trim produces and the source window each one covers.
///
/// The head is re-encoded, the tail is stream-copied. At least one of them is
/// always present because a plan is only built for `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPlan {
    /// The requested trim window.
    pub requested: Span,
    /// Re-encoded segment, absent when the start is already keyframe-aligned.
    pub head: Option<Span>,
    /// Stream-copied segment, absent when the end falls before the keyframe.
    pub tail: Option<Span>,
}

impl SegmentPlan {
    /// Plan the segments for `[start, end]` around `split`.
    ///
    /// The head is omitted only when `start` is the keyframe itself.
    /// Callers guarantee `start < end`.
    pub fn new(start: Timecode, end: Timecode, split: SplitPoint) -> Self {
        let tail = (end > split.remux_boundary).then_some(Span {
            from: split.remux_boundary,
            to: end,
        });

        // With no packet between the start and the keyframe, the head runs up
        // to the keyframe itself so the clip still begins at `start`.
        let head_end = match tail {
            None => end,
            Some(_) if split.encode_boundary > start => split.encode_boundary,
            Some(_) => split.remux_boundary,
        };
        let head = (head_end > start).then_some(Span {
            from: start,
            to: head_end,
        });

        Self {
            requested: Span { from: start, to: end },
            head,
            tail,
        }
    }
}
