//! Pipeline integration tests
//!
//! Drives the full trim pipeline against stand-in `ffmpeg`/`ffprobe` shell
//! scripts. The scripts log every invocation and `ffmpeg` writes its own
//! argument list to its output file, so the final destination holds the
//! command line of the last pass.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use keycut_av::{ToolRegistry, TrimRequest, TrimStage, Trimmer};
use keycut_core::config::{ToolsConfig, TrimConfig};
use keycut_core::{Error, Timecode};
use serial_test::serial;
use tempfile::TempDir;

const MP4_REPORT: &str = "\
stream|index=0|codec_name=h264|tag:encoder=Lavc60.3.100 libx264
format|format_name=mov,mp4,m4a,3gp,3g2,mj2
";

/// A keyframe at 62s with a packet at 61s just before it.
const SCENARIO_ONE_PACKETS: &str = "\
packet|58.000000|K__
packet|59.000000|___
packet|60.000000|___
packet|61.000000|___
packet|62.000000|K__
packet|63.000000|___
packet|64.000000|___
";

const ALIGNED_PACKETS: &str = "\
packet|0.000000|K__
packet|0.040000|___
packet|0.080000|___
packet|2.000000|K__
";

/// One packet per second: nothing lies between 60.5s and the 61s keyframe.
const SPARSE_PACKETS: &str = "\
packet|59.000000|K__
packet|60.000000|___
packet|61.000000|K__
packet|62.000000|___
";

struct Fakes {
    packets: &'static str,
    probe_fails: bool,
    probe_sleep_secs: u32,
    tail_fails: bool,
}

impl Default for Fakes {
    fn default() -> Self {
        Self {
            packets: SCENARIO_ONE_PACKETS,
            probe_fails: false,
            probe_sleep_secs: 0,
            tail_fails: false,
        }
    }
}

struct Harness {
    dir: TempDir,
    tools: ToolsConfig,
}

impl Harness {
    fn new(fakes: Fakes) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("engine.log");
        fs::write(dir.path().join("src.mp4"), b"not really a video").unwrap();

        let probe_exit = if fakes.probe_fails {
            "echo 'moov atom not found' >&2\nexit 1"
        } else {
            "exit 0"
        };
        let ffprobe = format!(
            "#!/bin/sh\n\
             echo \"ffprobe $*\" >> '{log}'\n\
             sleep {sleep}\n\
             case \"$*\" in\n\
             *packet=pts_time,flags*)\n\
             cat <<'PACKETS'\n{packets}PACKETS\n\
             ;;\n\
             *)\n\
             cat <<'REPORT'\n{report}REPORT\n\
             ;;\n\
             esac\n\
             {probe_exit}\n",
            log = log.display(),
            sleep = fakes.probe_sleep_secs,
            packets = fakes.packets,
            report = MP4_REPORT,
        );

        let tail_step = if fakes.tail_fails {
            "echo 'copy exploded' >&2; exit 1"
        } else {
            ":"
        };
        let ffmpeg = format!(
            "#!/bin/sh\n\
             echo \"ffmpeg $*\" >> '{log}'\n\
             for last; do :; done\n\
             case \"$last\" in\n\
             *tail-segment) {tail_step} ;;\n\
             esac\n\
             echo \"$*\" > \"$last\"\n",
            log = log.display(),
        );

        let tools = ToolsConfig {
            ffmpeg_path: Some(install(dir.path(), "ffmpeg", &ffmpeg)),
            ffprobe_path: Some(install(dir.path(), "ffprobe", &ffprobe)),
            timeout_secs: None,
        };
        Self { dir, tools }
    }

    fn source(&self) -> PathBuf {
        self.dir.path().join("src.mp4")
    }

    fn dest(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn trimmer(&self) -> Trimmer {
        let config = TrimConfig {
            engine_loglevel: "error".into(),
            ..TrimConfig::default()
        };
        Trimmer::new(ToolRegistry::discover(&self.tools), &config)
    }

    /// Logged invocations of `tool`, one argument string per call.
    fn calls(&self, tool: &str) -> Vec<String> {
        let prefix = format!("{tool} ");
        fs::read_to_string(self.dir.path().join("engine.log"))
            .unwrap_or_default()
            .lines()
            .filter_map(|l| l.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }
}

fn install(dir: &Path, name: &str, script: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn tc(s: &str) -> Timecode {
    s.parse().unwrap()
}

#[tokio::test]
#[serial]
async fn open_ended_trim_transcodes_head_and_copies_tail() {
    let harness = Harness::new(Fakes::default());
    let dest = harness.dest("clip.mp4");
    let stages = Arc::new(Mutex::new(Vec::new()));
    let sink = stages.clone();
    let trimmer = harness
        .trimmer()
        .with_observer(move |stage| sink.lock().unwrap().push(stage));

    let request = TrimRequest::new(harness.source(), &dest).with_start(tc("00:01:00.5"));
    let report = trimmer.trim(&request).await.unwrap();

    assert_eq!(report.destination, dest);
    assert_eq!(report.split_point.encode_boundary, tc("00:01:01.0"));
    assert_eq!(report.split_point.remux_boundary, tc("00:01:02.0"));
    assert_eq!(
        *stages.lock().unwrap(),
        [
            TrimStage::Idle,
            TrimStage::Probing,
            TrimStage::Locating,
            TrimStage::Producing,
            TrimStage::Merging,
            TrimStage::Done,
        ]
    );

    let ffmpeg = harness.calls("ffmpeg");
    assert_eq!(ffmpeg.len(), 4, "{ffmpeg:#?}");
    let transcode = ffmpeg.iter().find(|c| c.contains("head-segment")).unwrap();
    assert!(transcode.contains("-ss 00:01:00.500000 -to 00:01:01.000000 -i"));
    assert!(transcode.contains("-f mp4 -c:v:0 libx264 -map 0:v"));
    let copy = ffmpeg
        .iter()
        .find(|c| c.ends_with("tail-segment"))
        .unwrap();
    assert!(copy.contains("-ss 00:01:02.000000 -i"));
    assert!(!copy.contains("-to"));
    assert!(ffmpeg.iter().any(|c| c.contains("-f concat -safe 0 -i")));

    // The destination holds the re-cut pass's arguments.
    let last_pass = fs::read_to_string(&dest).unwrap();
    assert!(last_pass.contains("-ss 00:01:00.500000 -i"));
    assert!(last_pass.contains("-map 0:v -map 1:a? -map 1:s? -f mp4"));
}

#[tokio::test]
#[serial]
async fn aligned_start_skips_the_transcode() {
    let harness = Harness::new(Fakes {
        packets: ALIGNED_PACKETS,
        ..Fakes::default()
    });
    let dest = harness.dest("clip.mp4");
    let request = TrimRequest::new(harness.source(), &dest)
        .with_start(tc("00:00:00"))
        .with_end(tc("00:00:10"));

    let report = harness.trimmer().trim(&request).await.unwrap();

    assert_eq!(report.split_point.remux_boundary, Timecode::ZERO);
    assert_eq!(report.plan.head, None);
    assert!(report.plan.tail.is_some());

    let ffmpeg = harness.calls("ffmpeg");
    assert_eq!(ffmpeg.len(), 3, "{ffmpeg:#?}");
    assert!(!ffmpeg.iter().any(|c| c.contains("-c:v:0")));
    assert!(ffmpeg
        .iter()
        .any(|c| c.contains("-ss 00:00:00.000000 -to 00:00:10.000000 -i")));
    assert!(dest.exists());
}

#[tokio::test]
#[serial]
async fn end_before_keyframe_only_transcodes() {
    let harness = Harness::new(Fakes::default());
    let dest = harness.dest("clip.mp4");
    let request = TrimRequest::new(harness.source(), &dest)
        .with_start(tc("1:00.5"))
        .with_end(tc("1:01.5"));

    let report = harness.trimmer().trim(&request).await.unwrap();

    assert_eq!(report.plan.tail, None);
    let ffmpeg = harness.calls("ffmpeg");
    assert!(!ffmpeg.iter().any(|c| c.contains("tail-segment")));
    let transcode = ffmpeg.iter().find(|c| c.contains("head-segment")).unwrap();
    assert!(transcode.contains("-ss 00:01:00.500000 -to 00:01:01.500000 -i"));
    assert!(dest.exists());
}

#[tokio::test]
#[serial]
async fn sparse_gop_transcodes_up_to_the_keyframe() {
    let harness = Harness::new(Fakes {
        packets: SPARSE_PACKETS,
        ..Fakes::default()
    });
    let dest = harness.dest("clip.mp4");
    let request = TrimRequest::new(harness.source(), &dest).with_start(tc("1:00.5"));

    let report = harness.trimmer().trim(&request).await.unwrap();

    assert_eq!(report.split_point.encode_boundary, tc("1:00"));
    assert_eq!(report.split_point.remux_boundary, tc("1:01"));
    let ffmpeg = harness.calls("ffmpeg");
    assert_eq!(ffmpeg.len(), 4, "{ffmpeg:#?}");
    let transcode = ffmpeg.iter().find(|c| c.contains("head-segment")).unwrap();
    assert!(transcode.contains("-ss 00:01:00.500000 -to 00:01:01.000000 -i"));
    assert!(ffmpeg
        .iter()
        .any(|c| c.ends_with("tail-segment") && c.contains("-ss 00:01:01.000000 -i")));
}

#[tokio::test]
#[serial]
async fn failing_probe_is_an_engine_error() {
    let harness = Harness::new(Fakes {
        probe_fails: true,
        ..Fakes::default()
    });
    let dest = harness.dest("clip.mp4");
    let request = TrimRequest::new(harness.source(), &dest).with_start(tc("1:00.5"));

    let err = harness.trimmer().trim(&request).await.unwrap_err();

    match err {
        Error::Engine { tool, message, .. } => {
            assert_eq!(tool, "ffprobe");
            assert!(message.contains("moov atom not found"), "{message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!dest.exists());
    assert!(harness.calls("ffmpeg").is_empty());
}

#[tokio::test]
#[serial]
async fn invalid_range_never_invokes_the_engine() {
    let harness = Harness::new(Fakes::default());
    let dest = harness.dest("clip.mp4");
    let request = TrimRequest::new(harness.source(), &dest)
        .with_start(tc("10"))
        .with_end(tc("10"));

    let err = harness.trimmer().trim(&request).await.unwrap_err();

    assert!(matches!(err, Error::InvalidRange { .. }));
    assert!(harness.calls("ffprobe").is_empty());
    assert!(harness.calls("ffmpeg").is_empty());
    assert!(!dest.exists());
}

#[tokio::test]
#[serial]
async fn failed_copy_leaves_no_output_behind() {
    let harness = Harness::new(Fakes {
        tail_fails: true,
        ..Fakes::default()
    });
    let dest = harness.dest("clip.mp4");
    let request = TrimRequest::new(harness.source(), &dest).with_start(tc("1:00.5"));

    let err = harness.trimmer().trim(&request).await.unwrap_err();

    assert!(err.to_string().contains("copy exploded"), "{err}");
    assert!(!dest.exists());

    let copy = harness
        .calls("ffmpeg")
        .into_iter()
        .find(|c| c.ends_with("tail-segment"))
        .unwrap();
    let segment = PathBuf::from(copy.rsplit(' ').next().unwrap());
    let workspace = segment.parent().unwrap();
    assert!(!workspace.exists(), "{} survived", workspace.display());
}

#[tokio::test]
#[serial]
async fn missing_keyframe_is_no_split_point() {
    let harness = Harness::new(Fakes::default());
    let request =
        TrimRequest::new(harness.source(), harness.dest("clip.mp4")).with_start(tc("1:05"));

    let err = harness.trimmer().trim(&request).await.unwrap_err();

    assert!(matches!(err, Error::NoSplitPoint { .. }), "{err:?}");
    assert!(harness.calls("ffmpeg").is_empty());
}

#[tokio::test]
#[serial]
async fn deadline_expiry_cancels_the_trim() {
    let harness = Harness::new(Fakes {
        probe_sleep_secs: 5,
        ..Fakes::default()
    });
    let dest = harness.dest("clip.mp4");
    let trimmer = harness
        .trimmer()
        .with_deadline(Some(Duration::from_millis(200)));
    let request = TrimRequest::new(harness.source(), &dest).with_start(tc("1:00.5"));

    let err = trimmer.trim(&request).await.unwrap_err();

    assert!(matches!(err, Error::Cancelled(_)), "{err:?}");
    assert!(!dest.exists());
}

#[tokio::test]
#[serial]
async fn destination_extension_picks_the_output_container() {
    let harness = Harness::new(Fakes::default());
    let dest = harness.dest("clip.mov");
    let request = TrimRequest::new(harness.source(), &dest).with_start(tc("1:00.5"));

    harness.trimmer().trim(&request).await.unwrap();

    let last_pass = fs::read_to_string(&dest).unwrap();
    assert!(last_pass.contains("-f mov"), "{last_pass}");
    // Segments stay in the source's container.
    assert!(harness
        .calls("ffmpeg")
        .iter()
        .any(|c| c.contains("-f mp4 -c copy -map 0:v")));
}
