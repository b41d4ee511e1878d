//! The trim pipeline.
//!
//! [`Trimmer::trim`] sequences the stages of a keyframe-aware trim:
//!
//! ```text
//! Idle -> Probing + Locating -> Producing -> Merging -> Done
//!              \___________________\____________\_____-> Failed
//! ```
//!
//! Probing and locating run concurrently, as do the two segment jobs; each
//! pair is joined fail-fast. All intermediate files live in a [`Workspace`]
//! that is removed on every exit path, and the destination is only written
//! once every engine invocation has succeeded.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use keycut_core::config::TrimConfig;
use keycut_core::{Error, MediaSource, Result, SegmentPlan, SplitPoint, Timecode};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::engine::Engine;
use crate::merge::merge_segments;
use crate::probe::probe_source;
use crate::segment::produce_segments;
use crate::split::locate_split_point;
use crate::tools::ToolRegistry;
use crate::workspace::Workspace;

/// Pipeline stage, reported to the observer on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrimStage {
    Idle,
    Probing,
    Locating,
    Producing,
    Merging,
    Done,
    Failed,
}

impl fmt::Display for TrimStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrimStage::Idle => "idle",
            TrimStage::Probing => "probing",
            TrimStage::Locating => "locating",
            TrimStage::Producing => "producing",
            TrimStage::Merging => "merging",
            TrimStage::Done => "done",
            TrimStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What to trim and where to put it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrimRequest {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Inclusive start. Defaults to [`Timecode::ZERO`].
    pub start: Timecode,
    /// End of the window; [`Timecode::END`] keeps everything to the end.
    pub end: Timecode,
}

impl TrimRequest {
    /// A request for the whole of `source`.
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            start: Timecode::ZERO,
            end: Timecode::END,
        }
    }

    pub fn with_start(mut self, start: Timecode) -> Self {
        self.start = start;
        self
    }

    pub fn with_end(mut self, end: Timecode) -> Self {
        self.end = end;
        self
    }

    /// Fail with [`Error::InvalidRange`] unless `start < end`.
    pub fn validate(&self) -> Result<()> {
        if self.start.is_end() || self.start >= self.end {
            return Err(Error::InvalidRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }
}

/// Outcome of a successful trim.
#[derive(Debug, Clone)]
pub struct TrimReport {
    pub destination: PathBuf,
    pub source: MediaSource,
    pub split_point: SplitPoint,
    pub plan: SegmentPlan,
}

type StageObserver = Arc<dyn Fn(TrimStage) + Send + Sync>;

/// Runs trims against one set of engine binaries.
///
/// # Example
///
/// ```no_run
/// use keycut_av::{ToolRegistry, TrimRequest, Trimmer};
/// use keycut_core::config::Config;
///
/// # async fn example() -> keycut_core::Result<()> {
/// let config = Config::default();
/// let trimmer = Trimmer::new(ToolRegistry::discover(&config.tools), &config.trim);
/// let request = TrimRequest::new("in.mp4", "out.mp4").with_start("1:00.5".parse()?);
/// let report = trimmer.trim(&request).await?;
/// println!("wrote {}", report.destination.display());
/// # Ok(())
/// # }
/// ```
pub struct Trimmer {
    engine: Engine,
    packet_window: usize,
    deadline: Option<Duration>,
    cancel: CancellationToken,
    observer: Option<StageObserver>,
}

impl Trimmer {
    pub fn new(tools: ToolRegistry, config: &TrimConfig) -> Self {
        let cancel = CancellationToken::new();
        Self {
            engine: Engine::new(tools, config.engine_loglevel.clone())
                .with_cancellation(cancel.clone()),
            packet_window: config.packet_window.max(1),
            deadline: config.deadline(),
            cancel,
            observer: None,
        }
    }

    /// Call `observer` on every stage transition.
    pub fn with_observer(mut self, observer: impl Fn(TrimStage) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Abort trims (and kill their engine processes) when `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.engine = self.engine.with_cancellation(token.clone());
        self.cancel = token;
        self
    }

    /// Fail trims that run longer than `deadline`.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// The token that cancels this trimmer's work.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn enter(&self, stage: TrimStage) {
        tracing::info!("trim stage: {stage}");
        if let Some(observer) = &self.observer {
            observer(stage);
        }
    }

    /// Trim `request.source` to `[start, end]` and write it to `request.destination`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRange`] before any engine work if `start >= end`.
    /// - [`Error::Probe`] if the source is missing or has no container or
    ///   video stream.
    /// - [`Error::NoSplitPoint`] if no keyframe follows `start`.
    /// - [`Error::Engine`] if any engine invocation fails.
    /// - [`Error::Cancelled`] on cancellation or when the deadline passes.
    ///
    /// On error the destination is untouched and no temporary files remain.
    pub async fn trim(&self, request: &TrimRequest) -> Result<TrimReport> {
        request.validate()?;
        self.enter(TrimStage::Idle);

        let run = async {
            match self.deadline {
                Some(limit) => tokio::time::timeout(limit, self.run(request))
                    .await
                    .unwrap_or_else(|_| {
                        Err(Error::Cancelled(format!(
                            "trim did not finish within {limit:?}"
                        )))
                    }),
                None => self.run(request).await,
            }
        };

        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled("trim was cancelled".into())),
            result = run => result,
        };

        match &result {
            Ok(report) => {
                self.enter(TrimStage::Done);
                tracing::info!(
                    "trimmed {} -> {}",
                    request.source.display(),
                    report.destination.display()
                );
            }
            Err(e) => {
                self.enter(TrimStage::Failed);
                tracing::debug!("trim of {} failed: {e}", request.source.display());
            }
        }
        result
    }

    async fn run(&self, request: &TrimRequest) -> Result<TrimReport> {
        self.enter(TrimStage::Probing);
        if !request.source.exists() {
            return Err(Error::probe(format!(
                "file does not exist: {}",
                request.source.display()
            )));
        }

        let workspace = Workspace::new(&request.destination)?;
        match self.run_in(&workspace, request).await {
            Ok((source, split_point, plan)) => {
                let destination = workspace.finalize()?;
                Ok(TrimReport {
                    destination,
                    source,
                    split_point,
                    plan,
                })
            }
            Err(e) => {
                workspace.cleanup();
                Err(e)
            }
        }
    }

    async fn run_in(
        &self,
        workspace: &Workspace,
        request: &TrimRequest,
    ) -> Result<(MediaSource, SplitPoint, SegmentPlan)> {
        self.enter(TrimStage::Locating);
        let (source, split_point) = tokio::try_join!(
            probe_source(&self.engine, &request.source),
            locate_split_point(
                &self.engine,
                &request.source,
                request.start,
                self.packet_window
            ),
        )?;

        if source.video_streams.is_empty() {
            return Err(Error::probe(format!(
                "{} has no video stream",
                request.source.display()
            )));
        }

        let plan = SegmentPlan::new(request.start, request.end, split_point);
        tracing::info!(
            "{split_point}; head={} tail={}",
            plan.head.map_or_else(|| "none".to_string(), |s| s.to_string()),
            plan.tail.map_or_else(|| "none".to_string(), |s| s.to_string()),
        );

        self.enter(TrimStage::Producing);
        let segments = produce_segments(&self.engine, workspace, &source, &plan).await?;

        self.enter(TrimStage::Merging);
        let merged = merge_segments(&self.engine, workspace, &source, &segments, plan.requested).await;
        segments.discard(workspace);
        merged?;

        Ok((source, split_point, plan))
    }
}
