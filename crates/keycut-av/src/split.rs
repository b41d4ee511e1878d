//! Split-point search.
//!
//! Asks ffprobe for video packet records starting at the requested time and
//! finds the first keyframe at or after it (where stream copy can begin) plus
//! the last packet before that keyframe (where the re-encoded head ends).
//!
//! The engine may flag a keyframe slightly out of presentation order, so the
//! packet before the keyframe is searched for in a window of `window` records
//! on both sides of it: the records leading up to the keyframe and the
//! records read right after it. This window is a tolerance, not a proof; a
//! source with wilder reordering can still yield a boundary that is not the
//! true predecessor.

use std::collections::VecDeque;
use std::path::Path;

use keycut_core::{Error, Result, SplitPoint, Timecode};

use crate::command::LineSource;
use crate::engine::Engine;

/// One `packet|<pts_time>|<flags>` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketRecord {
    pub timestamp: Timecode,
    pub keyframe: bool,
}

/// Parse one line of `-show_entries packet=pts_time,flags -of compact=nokey=1`.
///
/// Returns `Ok(None)` for lines that are not packet records and for packets
/// without a timestamp. Negative (pre-roll) timestamps saturate to zero.
pub fn parse_packet_record(line: &str) -> Result<Option<PacketRecord>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let mut fields = line.split('|');
    if fields.next() != Some("packet") {
        tracing::trace!("ignoring non-packet line {line:?}");
        return Ok(None);
    }

    let malformed = || Error::probe(format!("malformed packet record: {line}"));
    let pts = fields.next().ok_or_else(malformed)?.trim();
    let flags = fields.next().ok_or_else(malformed)?;

    if pts == "N/A" {
        return Ok(None);
    }

    let timestamp = if pts.starts_with('-') {
        Timecode::ZERO
    } else {
        Timecode::from_seconds_str(pts).map_err(|_| malformed())?
    };

    Ok(Some(PacketRecord {
        timestamp,
        keyframe: flags.contains('K'),
    }))
}

/// Scan packet records for the split point after `from`.
///
/// Returns `Ok(None)` if the stream ends without a keyframe at or after
/// `from`. At most `window` packet records are read past the keyframe, so
/// the source can be closed without draining it.
pub async fn scan_packets<S: LineSource>(
    source: &mut S,
    from: Timecode,
    window: usize,
) -> Result<Option<SplitPoint>> {
    let mut recent: VecDeque<Timecode> = VecDeque::with_capacity(window + 1);
    let mut keyframe = None;

    while let Some(line) = source.next_line().await? {
        let Some(packet) = parse_packet_record(&line)? else {
            continue;
        };
        tracing::trace!(
            "packet {} keyframe={}",
            packet.timestamp,
            packet.keyframe
        );

        recent.push_back(packet.timestamp);
        if recent.len() > window {
            recent.pop_front();
        }

        if packet.keyframe && packet.timestamp >= from {
            keyframe = Some(packet.timestamp);
            break;
        }
    }

    let Some(remux_boundary) = keyframe else {
        return Ok(None);
    };

    let mut before = recent.into_iter().filter(|t| *t < remux_boundary).max();

    let mut seen = 0;
    while seen < window {
        let Some(line) = source.next_line().await? else {
            break;
        };
        let Some(packet) = parse_packet_record(&line)? else {
            continue;
        };
        seen += 1;
        if packet.timestamp < remux_boundary {
            before = before.max(Some(packet.timestamp));
        }
    }

    Ok(Some(SplitPoint {
        encode_boundary: before.unwrap_or(Timecode::ZERO),
        remux_boundary,
    }))
}

/// Find the split point for a trim of `path` starting at `from`.
///
/// # Errors
///
/// - [`Error::Engine`] if ffprobe cannot run or exits non-zero.
/// - [`Error::NoSplitPoint`] if no keyframe at or after `from` is reported.
pub async fn locate_split_point(
    engine: &Engine,
    path: &Path,
    from: Timecode,
    window: usize,
) -> Result<SplitPoint> {
    let read_from = from.format()?;

    let mut cmd = engine.ffprobe()?;
    cmd.args(["-read_intervals", read_from.as_str()]);
    cmd.args([
        "-select_streams",
        "v",
        "-show_entries",
        "packet=pts_time,flags",
        "-of",
        "compact=nokey=1",
        "-i",
    ]);
    cmd.arg(path.to_string_lossy().as_ref());

    let mut process = cmd.spawn_lines()?;
    let scanned = scan_packets(&mut process, from, window).await?;

    // Check the exit status before judging an empty scan: a failed ffprobe
    // also produces no keyframe.
    process.finish().await?;

    let split = scanned.ok_or(Error::NoSplitPoint { from })?;
    tracing::info!("split point for {}: {split}", path.display());
    Ok(split)
}
