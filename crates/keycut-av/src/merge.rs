//! Splicing the segments and re-cutting against the source.
//!
//! Two sequential ffmpeg passes:
//!
//! 1. The concat demuxer joins the video-only segments listed in an
//!    `ffconcat` manifest into one intermediate track (stream copy).
//! 2. The intermediate video is muxed with the audio and subtitle streams of
//!    the *source*, cut to the requested window on the source's own timeline.
//!    Re-encoding the head shifts the spliced video's timestamps, so cutting
//!    the other streams from the source is what keeps them in sync.

use std::path::Path;

use keycut_core::{Error, MediaSource, Result, Span};

use crate::command::ToolCommand;
use crate::engine::Engine;
use crate::segment::Segments;
use crate::workspace::Workspace;

const MANIFEST: &str = "segments.ffconcat";
const INTERMEDIATE: &str = "spliced";

/// Quote a path for an ffconcat `file` directive.
fn quote(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', r"'\''"))
}

/// Build an ffconcat manifest listing `segments` in order.
pub fn manifest_contents<'a>(segments: impl IntoIterator<Item = &'a Path>) -> String {
    let mut manifest = String::from("ffconcat version 1.0\n");
    for path in segments {
        manifest.push_str("file ");
        manifest.push_str(&quote(path));
        manifest.push('\n');
    }
    manifest
}

/// Join the segments listed in `manifest` into `output` without re-encoding.
pub fn concat_command(
    engine: &Engine,
    manifest: &Path,
    container: &str,
    output: &Path,
) -> Result<ToolCommand> {
    let mut cmd = engine.ffmpeg()?;
    cmd.args(["-f", "concat", "-safe", "0", "-i"]);
    cmd.arg(manifest.to_string_lossy().as_ref());
    cmd.args(["-c", "copy", "-map", "0:v", "-f", container]);
    cmd.arg(output.to_string_lossy().as_ref());
    Ok(cmd)
}

/// Mux the spliced video with the source's audio and subtitles cut to `requested`.
pub fn retrim_command(
    engine: &Engine,
    intermediate: &Path,
    source: &Path,
    requested: Span,
    container: &str,
    output: &Path,
) -> Result<ToolCommand> {
    let mut cmd = engine.ffmpeg()?;
    cmd.arg("-i");
    cmd.arg(intermediate.to_string_lossy().as_ref());
    cmd.args(["-ss", requested.from.format()?.as_str()]);
    if !requested.to.is_end() {
        cmd.args(["-to", requested.to.format()?.as_str()]);
    }
    cmd.arg("-i");
    cmd.arg(source.to_string_lossy().as_ref());
    cmd.args(["-c", "copy", "-map", "0:v", "-map", "1:a?", "-map", "1:s?"]);
    cmd.args(["-f", container]);
    cmd.arg(output.to_string_lossy().as_ref());
    Ok(cmd)
}

/// Merge `segments` into the workspace's staged output.
///
/// The manifest and the intermediate file are removed whether or not the
/// merge succeeds; the segment files are left to the caller.
pub async fn merge_segments(
    engine: &Engine,
    workspace: &Workspace,
    source: &MediaSource,
    segments: &Segments,
    requested: Span,
) -> Result<()> {
    let manifest = workspace.temp_file(MANIFEST);
    let intermediate = workspace.temp_file(INTERMEDIATE);
    let output = workspace.output();
    let container = source.output_container_for(workspace.destination());

    let merged = async {
        tokio::fs::write(&manifest, manifest_contents(segments.paths())).await?;

        tracing::info!("splicing {} segment(s)", segments.paths().count());
        concat_command(engine, &manifest, &source.container, &intermediate)?
            .execute()
            .await?;

        tracing::info!("re-cutting {requested} against {}", source.path.display());
        retrim_command(
            engine,
            &intermediate,
            &source.path,
            requested,
            &container,
            &output,
        )?
        .execute()
        .await?;
        Ok::<_, Error>(())
    }
    .await;

    workspace.discard(&manifest);
    workspace.discard(&intermediate);
    merged
}
