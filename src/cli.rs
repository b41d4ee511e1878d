use clap::{Args, Parser, Subcommand};
use keycut_core::Timecode;
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "keycut")]
#[command(
    author,
    version,
    about = "Keyframe-aware video trimming: re-encode up to the next keyframe, copy the rest"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Trim a video (also the default: `keycut <SOURCE> <DEST>`)
    Trim(TrimArgs),

    /// Probe a media file and display its container and video encoders
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show where a trim starting at --from would switch to stream copy
    SplitPoint {
        /// File to inspect
        #[arg(required = true)]
        file: PathBuf,

        /// Requested start, [[HH:]MM:]SS[.ffffff]
        #[arg(long)]
        from: Timecode,
    },

    /// Check that ffmpeg and ffprobe are available
    CheckTools,
}

#[derive(Args, Debug)]
pub struct TrimArgs {
    /// Video to trim
    pub source: PathBuf,

    /// Where to write the trimmed clip
    pub destination: PathBuf,

    /// Start of the clip, [[HH:]MM:]SS[.ffffff] (alias: -ss). Defaults to the beginning.
    #[arg(long)]
    pub from: Option<Timecode>,

    /// End of the clip, [[HH:]MM:]SS[.ffffff] (alias: -to). Defaults to the end.
    #[arg(long)]
    pub to: Option<Timecode>,

    /// Give up after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

const SUBCOMMANDS: &[&str] = &["trim", "probe", "split-point", "check-tools", "help"];

/// Accept ffmpeg-style `-ss`/`-to` and a bare `keycut <SOURCE> <DEST>`.
///
/// Rewrites the single-dash flags to `--from`/`--to` and inserts `trim`
/// right after the program name when the first positional argument is not a
/// subcommand.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut args: Vec<OsString> = args
        .into_iter()
        .map(Into::into)
        .map(|arg| match arg.to_str() {
            Some("-ss") => OsString::from("--from"),
            Some("-to") => OsString::from("--to"),
            _ => arg,
        })
        .collect();

    let mut i = 1;
    while i < args.len() {
        match args[i].to_str() {
            Some("-c" | "--config" | "--from" | "--to" | "--timeout") => i += 2,
            Some(flag) if flag.starts_with('-') => i += 1,
            Some(name) if SUBCOMMANDS.contains(&name) => return args,
            _ => {
                args.insert(1, OsString::from("trim"));
                return args;
            }
        }
    }
    args
}
