//! Temporary workspace for a single trim.
//!
//! A [`Workspace`] owns a private temporary directory that holds the segment
//! files, the concat manifest, the spliced intermediate and the staged final
//! output. The directory is created next to the destination, so
//! [`Workspace::finalize`] is a single rename on one filesystem and a failed
//! trim never leaves a partial file behind.

use std::path::{Path, PathBuf};

use keycut_core::{Error, Result};
use tempfile::TempDir;

/// Workspace for trim execution.
///
/// # Example
///
/// ```no_run
/// use keycut_av::Workspace;
///
/// let workspace = Workspace::new(std::path::Path::new("/videos/clip.mp4")).unwrap();
/// // ... engine writes the finished clip to workspace.output() ...
/// let dest = workspace.finalize().unwrap();
/// assert_eq!(dest, std::path::Path::new("/videos/clip.mp4"));
/// ```
pub struct Workspace {
    temp_dir: TempDir,
    destination: PathBuf,
}

impl Workspace {
    /// Create a new workspace beside `destination`.
    pub fn new(destination: &Path) -> Result<Self> {
        let parent = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let temp_dir = tempfile::Builder::new()
            .prefix(".keycut-")
            .tempdir_in(parent)
            .map_err(|e| {
                Error::workspace(format!(
                    "failed to create temp dir in {}: {e}",
                    parent.display()
                ))
            })?;

        Ok(Self {
            temp_dir,
            destination: destination.to_path_buf(),
        })
    }

    /// The final destination path.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Where the engine writes the finished clip before finalization.
    pub fn output(&self) -> PathBuf {
        let file_name = self
            .destination
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("output"));
        self.temp_dir.path().join(file_name)
    }

    /// Path to the temporary directory.
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a path for a named temporary file inside the workspace.
    pub fn temp_file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Best-effort removal of a temporary file. Missing files and removal
    /// errors are ignored, so calling this repeatedly is harmless.
    pub fn discard(&self, path: &Path) {
        match std::fs::remove_file(path) {
            Ok(()) => tracing::trace!("removed {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("failed to remove {}: {e}", path.display()),
        }
    }

    /// Rename the staged output onto the destination and drop the temp dir.
    ///
    /// An existing destination is replaced atomically. If the rename fails
    /// the destination is left as it was.
    pub fn finalize(self) -> Result<PathBuf> {
        let output = self.output();

        if !output.exists() {
            return Err(Error::workspace(format!(
                "output file does not exist: {}",
                output.display()
            )));
        }

        if let Err(e) = std::fs::rename(&output, &self.destination) {
            let message = format!(
                "failed to move output to {}: {e}",
                self.destination.display()
            );
            self.cleanup();
            return Err(Error::workspace(message));
        }

        let destination = self.destination.clone();
        self.cleanup();
        Ok(destination)
    }

    /// Delete the temp dir and everything in it, ignoring failures.
    pub fn cleanup(self) {
        let path = self.temp_dir.path().to_path_buf();
        if let Err(e) = self.temp_dir.close() {
            tracing::warn!("failed to remove workspace {}: {e}", path.display());
        }
    }
}
