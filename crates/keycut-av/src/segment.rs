//! Producing the re-encoded head and the stream-copied tail.
//!
//! Both segments are video-only and written in the source's own container
//! into the trim's [`Workspace`]. The two engine jobs share nothing, so they
//! run concurrently and are joined fail-fast: when one fails the other is
//! dropped (which kills its engine process) and both outputs are discarded.

use std::path::{Path, PathBuf};

use keycut_core::{Error, MediaSource, Result, SegmentPlan, Span};

use crate::command::ToolCommand;
use crate::engine::Engine;
use crate::workspace::Workspace;

const HEAD_SEGMENT: &str = "head-segment";
const TAIL_SEGMENT: &str = "tail-segment";

/// Segment files produced for a plan, in splice order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segments {
    pub head: Option<PathBuf>,
    pub tail: Option<PathBuf>,
}

impl Segments {
    /// Present segment files, head first.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.head.iter().chain(self.tail.iter()).map(PathBuf::as_path)
    }

    /// Remove every segment file from `workspace`.
    pub fn discard(&self, workspace: &Workspace) {
        for path in self.paths() {
            workspace.discard(path);
        }
    }
}

/// `-ss <from> [-to <to>] -i <source>`; an open-ended span has no `-to`.
fn push_input_window(cmd: &mut ToolCommand, span: Span, source: &Path) -> Result<()> {
    cmd.args(["-ss", span.from.format()?.as_str()]);
    if !span.to.is_end() {
        cmd.args(["-to", span.to.format()?.as_str()]);
    }
    cmd.arg("-i");
    cmd.arg(source.to_string_lossy().as_ref());
    Ok(())
}

/// Re-encode `span` of the source's video with the encoders it was made with.
pub fn transcode_command(
    engine: &Engine,
    source: &MediaSource,
    span: Span,
    output: &Path,
) -> Result<ToolCommand> {
    let mut cmd = engine.ffmpeg()?;
    push_input_window(&mut cmd, span, &source.path)?;
    cmd.args(["-f", source.container.as_str()]);
    // Output specifiers count video streams, not input indices.
    for (ordinal, stream) in source.video_streams.iter().enumerate() {
        cmd.arg(format!("-c:v:{ordinal}"));
        cmd.arg(stream.encoder.as_str());
    }
    cmd.args(["-map", "0:v"]);
    cmd.arg(output.to_string_lossy().as_ref());
    Ok(cmd)
}

/// Stream-copy `span` of the source's video.
pub fn copy_command(
    engine: &Engine,
    source: &MediaSource,
    span: Span,
    output: &Path,
) -> Result<ToolCommand> {
    let mut cmd = engine.ffmpeg()?;
    push_input_window(&mut cmd, span, &source.path)?;
    cmd.args(["-f", source.container.as_str()]);
    cmd.args(["-c", "copy", "-map", "0:v"]);
    cmd.arg(output.to_string_lossy().as_ref());
    Ok(cmd)
}

/// Run the transcode and copy jobs the plan calls for.
///
/// # Errors
///
/// The first [`Error::Engine`] (or [`Error::Cancelled`]) raised by either
/// job. Neither segment file survives a failure.
pub async fn produce_segments(
    engine: &Engine,
    workspace: &Workspace,
    source: &MediaSource,
    plan: &SegmentPlan,
) -> Result<Segments> {
    let segments = Segments {
        head: plan.head.map(|_| workspace.temp_file(HEAD_SEGMENT)),
        tail: plan.tail.map(|_| workspace.temp_file(TAIL_SEGMENT)),
    };

    let transcode = async {
        if let (Some(span), Some(path)) = (plan.head, &segments.head) {
            tracing::info!("transcoding head {span}");
            transcode_command(engine, source, span, path)?.execute().await?;
        }
        Ok::<_, Error>(())
    };
    let copy = async {
        if let (Some(span), Some(path)) = (plan.tail, &segments.tail) {
            tracing::info!("copying tail {span}");
            copy_command(engine, source, span, path)?.execute().await?;
        }
        Ok::<_, Error>(())
    };

    if let Err(e) = tokio::try_join!(transcode, copy) {
        segments.discard(workspace);
        return Err(e);
    }

    Ok(segments)
}
