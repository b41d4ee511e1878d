//! Engine binary discovery.
//!
//! The [`ToolRegistry`] resolves the locations of `ffmpeg` and `ffprobe`
//! (config override first, then `PATH`) and hands out pre-configured
//! [`ToolCommand`]s for them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use keycut_core::config::ToolsConfig;
use keycut_core::{Error, Result};
use serde::Serialize;

use crate::command::ToolCommand;

/// The engine binaries a trim needs.
pub const KNOWN_TOOLS: &[&str] = &["ffmpeg", "ffprobe"];

/// An engine binary located during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTool {
    pub path: PathBuf,
    /// Applied to every command built for this tool.
    pub timeout: Option<Duration>,
}

/// One row of `keycut check-tools`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub available: bool,
    /// First line of `<tool> -version`.
    pub version: Option<String>,
    pub path: Option<PathBuf>,
}

/// Located engine binaries, keyed by tool name.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, ResolvedTool>,
}

impl ToolRegistry {
    /// Locate every tool in [`KNOWN_TOOLS`].
    ///
    /// A configured path wins when it exists. Otherwise the tool is looked
    /// up on `PATH`; tools found nowhere are left out and reported by
    /// [`ToolRegistry::require`] when first needed.
    pub fn discover(config: &ToolsConfig) -> Self {
        let overrides = [
            ("ffmpeg", config.ffmpeg_path.as_deref()),
            ("ffprobe", config.ffprobe_path.as_deref()),
        ];

        let tools = overrides
            .into_iter()
            .filter_map(|(name, configured)| {
                let path = locate(name, configured)?;
                tracing::debug!("using {name} at {}", path.display());
                Some((
                    name,
                    ResolvedTool {
                        path,
                        timeout: config.timeout(),
                    },
                ))
            })
            .collect();

        Self { tools }
    }

    /// The resolved tool, or [`Error::Engine`] if discovery did not find it.
    pub fn require(&self, name: &str) -> Result<&ResolvedTool> {
        self.tools.get(name).ok_or_else(|| {
            Error::engine(
                name,
                name,
                format!("{name} not found; is it installed and in PATH?"),
            )
        })
    }

    /// A fresh [`ToolCommand`] for `name` with its timeout applied.
    pub fn command(&self, name: &str) -> Result<ToolCommand> {
        let tool = self.require(name)?;
        let mut cmd = ToolCommand::new(tool.path.clone());
        if let Some(timeout) = tool.timeout {
            cmd.timeout(timeout);
        }
        Ok(cmd)
    }

    /// Availability and version of every known tool.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| {
                let tool = self.tools.get(name);
                ToolInfo {
                    name: name.to_string(),
                    available: tool.is_some(),
                    version: tool.and_then(|t| detect_version(&t.path)),
                    path: tool.map(|t| t.path.clone()),
                }
            })
            .collect()
    }
}

fn locate(name: &str, configured: Option<&Path>) -> Option<PathBuf> {
    match configured {
        Some(path) if path.exists() => return Some(path.to_path_buf()),
        Some(path) => tracing::warn!(
            "configured {name} path {} does not exist; searching PATH",
            path.display()
        ),
        None => {}
    }
    which::which(name).ok()
}

/// First line of `<tool> -version`, if the tool runs successfully.
fn detect_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path)
        .arg("-version")
        .output()
        .ok()?;

    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).lines().next().map(str::to_string))
        .flatten()
}
