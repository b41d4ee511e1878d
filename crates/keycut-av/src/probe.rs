//! Container and encoder discovery via `ffprobe`.
//!
//! Runs
//! `ffprobe -select_streams v -show_entries stream=index,codec_name:stream_tags=encoder:format=format_name -of compact`
//! and parses the keyed compact records it prints:
//!
//! ```text
//! stream|index=0|codec_name=h264|tag:encoder=Lavc60.3.100 libx264
//! format|format_name=mov,mp4,m4a,3gp,3g2,mj2
//! ```

use std::path::Path;

use keycut_core::{resolve_container, Error, MediaSource, Result, StreamEncoder};

use crate::engine::Engine;

/// Probe `path` for its container and per-stream video encoders.
///
/// # Errors
///
/// - [`Error::Probe`] if the file does not exist or the engine reports no
///   container.
/// - [`Error::Engine`] if ffprobe exits non-zero.
pub async fn probe_source(engine: &Engine, path: &Path) -> Result<MediaSource> {
    if !path.exists() {
        return Err(Error::probe(format!(
            "file does not exist: {}",
            path.display()
        )));
    }

    let mut cmd = engine.ffprobe()?;
    cmd.args([
        "-select_streams",
        "v",
        "-show_entries",
        "stream=index,codec_name:stream_tags=encoder:format=format_name",
        "-of",
        "compact",
        "-i",
    ]);
    cmd.arg(path.to_string_lossy().as_ref());

    let output = cmd.execute().await?;
    let source = parse_probe_report(path, &output.stdout)?;

    tracing::info!(
        "probed {}: container={} video_streams={}",
        path.display(),
        source.container,
        source.video_streams.len()
    );

    Ok(source)
}

/// Parse ffprobe's compact stream/format report for `path`.
pub fn parse_probe_report(path: &Path, report: &str) -> Result<MediaSource> {
    let mut video_streams = Vec::new();
    let mut available_containers: Vec<String> = Vec::new();

    for line in report.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let mut fields = line.split('|');
        let section = fields.next().unwrap_or_default();
        let entries: Vec<(&str, &str)> = fields.filter_map(|f| f.split_once('=')).collect();
        // Tags keep the case stored in the file: Matroska writes `ENCODER`.
        let get = |key: &str| {
            entries
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| *v)
                .filter(|v| !v.is_empty() && *v != "N/A")
        };

        match section {
            "stream" => {
                let index = get("index")
                    .and_then(|v| v.parse::<u32>().ok())
                    .ok_or_else(|| Error::probe(format!("malformed stream record: {line}")))?;

                let encoder = get("tag:encoder")
                    .and_then(encoder_from_tag)
                    .or_else(|| get("codec_name").map(str::to_string))
                    .ok_or_else(|| {
                        Error::probe(format!("stream {index} reports neither encoder nor codec"))
                    })?;

                video_streams.push(StreamEncoder { index, encoder });
            }
            "format" => {
                if let Some(names) = get("format_name") {
                    available_containers = names
                        .split(',')
                        .map(str::trim)
                        .filter(|n| !n.is_empty())
                        .map(str::to_string)
                        .collect();
                }
            }
            other => tracing::trace!("ignoring ffprobe section {other:?}"),
        }
    }

    let container = resolve_container(path, &available_containers).ok_or_else(|| {
        Error::probe(format!(
            "{} does not contain any container",
            path.display()
        ))
    })?;

    video_streams.sort_by_key(|s| s.index);

    Ok(MediaSource {
        path: path.to_path_buf(),
        container,
        available_containers,
        video_streams,
    })
}

/// Extract the encoder name from an ffmpeg-written `encoder` tag.
///
/// `"Lavc60.3.100 libx264"` yields `libx264`. Tags written by other software
/// name encoders the engine does not have, so they yield `None`.
fn encoder_from_tag(tag: &str) -> Option<String> {
    let (library, encoder) = tag.split_once(' ')?;
    let encoder = encoder.trim();
    (library.starts_with("Lavc") && !encoder.is_empty()).then(|| encoder.to_string())
}
