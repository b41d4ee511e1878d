//! Handle on the media engine shared by every pipeline stage.

use keycut_core::Result;
use tokio_util::sync::CancellationToken;

use crate::command::ToolCommand;
use crate::tools::ToolRegistry;

/// The engine binaries plus the options every invocation shares.
#[derive(Debug, Clone)]
pub struct Engine {
    tools: ToolRegistry,
    loglevel: String,
    cancel: Option<CancellationToken>,
}

impl Engine {
    pub fn new(tools: ToolRegistry, loglevel: impl Into<String>) -> Self {
        Self {
            tools,
            loglevel: loglevel.into(),
            cancel: None,
        }
    }

    /// Make every command built from this engine stop when `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// `ffprobe -loglevel <level>`.
    pub fn ffprobe(&self) -> Result<ToolCommand> {
        let mut cmd = self.base("ffprobe")?;
        cmd.args(["-loglevel", self.loglevel.as_str()]);
        Ok(cmd)
    }

    /// `ffmpeg -nostdin -loglevel <level> -y`.
    pub fn ffmpeg(&self) -> Result<ToolCommand> {
        let mut cmd = self.base("ffmpeg")?;
        cmd.args(["-nostdin", "-loglevel", self.loglevel.as_str(), "-y"]);
        Ok(cmd)
    }

    fn base(&self, name: &str) -> Result<ToolCommand> {
        let mut cmd = self.tools.command(name)?;
        if let Some(token) = &self.cancel {
            cmd.cancel_on(token.clone());
        }
        Ok(cmd)
    }
}

/// Engines backed by placeholder binaries, for building command lines in tests.
#[cfg(test)]
pub(crate) fn fake_engine(dir: &std::path::Path) -> Engine {
    use keycut_core::config::ToolsConfig;

    let ffmpeg = dir.join("ffmpeg");
    let ffprobe = dir.join("ffprobe");
    std::fs::write(&ffmpeg, "").unwrap();
    std::fs::write(&ffprobe, "").unwrap();
    let tools = ToolRegistry::discover(&ToolsConfig {
        ffmpeg_path: Some(ffmpeg),
        ffprobe_path: Some(ffprobe),
        timeout_secs: None,
    });
    Engine::new(tools, "error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use keycut_core::config::ToolsConfig;

    #[test]
    fn ffmpeg_prelude() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = fake_engine(dir.path()).ffmpeg().unwrap();
        assert_eq!(cmd.get_args(), ["-nostdin", "-loglevel", "error", "-y"]);
    }

    #[test]
    fn ffprobe_prelude() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = fake_engine(dir.path()).ffprobe().unwrap();
        assert_eq!(cmd.get_args(), ["-loglevel", "error"]);
    }

    #[test]
    fn missing_binary_is_an_engine_error() {
        let tools = ToolRegistry::discover(&ToolsConfig {
            ffmpeg_path: Some("/nonexistent/ffmpeg".into()),
            ffprobe_path: Some("/nonexistent/ffprobe".into()),
            timeout_secs: None,
        });
        let engine = Engine::new(tools, "info");
        // PATH may still provide a real ffmpeg; only assert when it does not.
        if which::which("ffmpeg").is_err() {
            assert!(engine.ffmpeg().unwrap_err().is_engine());
        }
    }
}
