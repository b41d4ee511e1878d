//! Configuration types.
//!
//! [`Config`] is deserialized from TOML. Every section defaults sensibly, so
//! an empty file is valid. Finding and reading the file is left to the binary.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;
use crate::Error;

/// Default size of the packet look-back / look-ahead window.
pub const DEFAULT_PACKET_WINDOW: usize = 10;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub trim: TrimConfig,
}

impl Config {
    /// Deserialize a `Config` from a TOML string and reject impossible values.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))?;
        config.check()?;
        Ok(config)
    }

    /// Hard validation: values the pipeline cannot run with.
    pub fn check(&self) -> Result<()> {
        if self.trim.packet_window == 0 {
            return Err(Error::Validation(
                "trim.packet_window must be at least 1".into(),
            ));
        }
        if self.trim.engine_loglevel.trim().is_empty() {
            return Err(Error::Validation(
                "trim.engine_loglevel must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (key, path) in [
            ("tools.ffmpeg_path", &self.tools.ffmpeg_path),
            ("tools.ffprobe_path", &self.tools.ffprobe_path),
        ] {
            if let Some(p) = path {
                if !p.exists() {
                    warnings.push(format!(
                        "{key} '{}' does not exist; falling back to PATH",
                        p.display()
                    ));
                }
            }
        }

        if self.trim.packet_window > 100 {
            warnings.push(format!(
                "trim.packet_window {} is unusually large",
                self.trim.packet_window
            ));
        }

        if self.tools.timeout_secs == Some(0) {
            warnings.push("tools.timeout_secs is 0; every engine call will time out".into());
        }

        warnings
    }
}

/// Paths and limits for the external engine binaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    /// Per-invocation timeout. Unset means engine calls run to completion.
    pub timeout_secs: Option<u64>,
}

impl ToolsConfig {
    /// The per-invocation timeout as a [`Duration`].
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Trimming behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimConfig {
    /// How many packets to remember before the keyframe and read after it
    /// when looking for the end of the re-encoded head. This is a tolerance
    /// for engines that flag keyframes slightly out of presentation order,
    /// not an exactness guarantee.
    pub packet_window: usize,
    /// Value for the engine's `-loglevel` option.
    pub engine_loglevel: String,
    /// Deadline for a whole trim. Unset means no deadline.
    pub deadline_secs: Option<u64>,
}

impl TrimConfig {
    /// The whole-operation deadline as a [`Duration`].
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            packet_window: DEFAULT_PACKET_WINDOW,
            engine_loglevel: "info".into(),
            deadline_secs: None,
        }
    }
}
