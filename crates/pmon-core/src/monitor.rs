//! Monitoring session: capture → save → send → prune, on a fixed interval.
//!
//! - The first cycle runs as soon as the loop starts, then once per interval.
//! - Cycles never overlap. A tick that comes due while a cycle is still running
//!   is skipped, not queued.
//! - Failures of capture, save or delivery end the cycle and are reported to the
//!   destination as a best-effort text; nothing escapes a cycle.

use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, SystemTime},
};

use chrono::{DateTime, Local};
use tokio::time::{interval, Interval, MissedTickBehavior};

use crate::{
    archive::{format_timestamp, ArchiveStore, PruneReport},
    config::Config,
    ports::{CaptureSource, Notifier},
    Error,
};

const CAPTION_PREFIX: &str = "Print Status - ";
const FAILURE_PREFIX: &str = "Error capturing/sending image: ";

/// Caption sent with a capture taken at `at`.
pub fn photo_caption(at: DateTime<Local>) -> String {
    format!("{CAPTION_PREFIX}{}", format_timestamp(at))
}

/// Text sent to the destination when a cycle fails.
pub fn failure_message(error: &Error) -> String {
    format!("{FAILURE_PREFIX}{error}")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Running,
}

/// Step of a cycle that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleStage {
    Capture,
    Save,
    Deliver,
}

#[derive(Debug)]
pub enum CycleOutcome {
    Delivered {
        path: PathBuf,
        /// `None` when the archive could not be listed for pruning.
        prune: Option<PruneReport>,
    },
    Failed {
        stage: CycleStage,
        error: Error,
        /// Set when the capture reached disk before the failure; it is kept.
        saved: Option<PathBuf>,
        fallback_delivered: bool,
    },
}

impl CycleOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct MonitorSettings {
    pub interval: Duration,
    pub retention: Duration,
}

impl MonitorSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            interval: cfg.interval,
            retention: cfg.retention,
        }
    }
}

pub struct MonitorSession {
    settings: MonitorSettings,
    source: Arc<dyn CaptureSource>,
    archive: ArchiveStore,
    notifier: Arc<dyn Notifier>,
    state: MonitorState,
    timer: Option<Interval>,
}

impl MonitorSession {
    pub fn new(
        settings: MonitorSettings,
        source: Arc<dyn CaptureSource>,
        archive: ArchiveStore,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            settings,
            source,
            archive,
            notifier,
            state: MonitorState::Idle,
            timer: None,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn archive(&self) -> &ArchiveStore {
        &self.archive
    }

    /// Run cycles forever. The first one starts immediately.
    pub async fn run(&mut self) {
        tracing::debug!(
            interval_secs = self.settings.interval.as_secs(),
            retention_secs = self.settings.retention.as_secs(),
            archive = %self.archive.dir().display(),
            "monitor loop starting"
        );
        loop {
            self.tick().await;
        }
    }

    /// Run exactly `n` timer ticks and return their outcomes.
    ///
    /// The timer is kept across calls, so consecutive calls continue the same
    /// schedule.
    pub async fn run_cycles(&mut self, n: usize) -> Vec<CycleOutcome> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.tick().await);
        }
        out
    }

    async fn tick(&mut self) -> CycleOutcome {
        let period = self.settings.interval;
        self.timer
            .get_or_insert_with(|| {
                let mut t = interval(period);
                t.set_missed_tick_behavior(MissedTickBehavior::Skip);
                t
            })
            .tick()
            .await;
        self.run_cycle().await
    }

    /// Run one cycle now, outside the timer.
    ///
    /// The capture is named after the moment its frame was read, and pruning
    /// uses the wall clock after delivery.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.cycle(None).await
    }

    /// Run one cycle as if the wall clock read `now`, for both naming and pruning.
    pub async fn run_cycle_at(&mut self, now: DateTime<Local>) -> CycleOutcome {
        self.cycle(Some(now)).await
    }

    async fn cycle(&mut self, clock: Option<DateTime<Local>>) -> CycleOutcome {
        self.state = MonitorState::Running;

        let mut saved = None;
        let outcome = match self.capture_and_send(clock, &mut saved).await {
            Ok(path) => {
                tracing::info!(path = %path.display(), "capture delivered");
                let prune = self.prune(clock.unwrap_or_else(Local::now));
                CycleOutcome::Delivered { path, prune }
            }
            Err((stage, error)) => {
                let fallback_delivered = self.report_failure(&error).await;
                CycleOutcome::Failed {
                    stage,
                    error,
                    saved,
                    fallback_delivered,
                }
            }
        };

        self.state = MonitorState::Idle;
        outcome
    }

    async fn capture_and_send(
        &self,
        clock: Option<DateTime<Local>>,
        saved: &mut Option<PathBuf>,
    ) -> std::result::Result<PathBuf, (CycleStage, Error)> {
        let image = self
            .source
            .capture()
            .await
            .map_err(|e| (CycleStage::Capture, e))?;
        tracing::debug!(
            width = image.width,
            height = image.height,
            bytes = image.jpeg.len(),
            "frame captured"
        );
        let now = clock.unwrap_or(image.captured_at);

        let path = self
            .archive
            .save(&image, now)
            .await
            .map_err(|e| (CycleStage::Save, e))?;
        *saved = Some(path.clone());

        self.notifier
            .send_photo(&path, &photo_caption(now))
            .await
            .map_err(|e| (CycleStage::Deliver, e))?;

        Ok(path)
    }

    fn prune(&self, now: DateTime<Local>) -> Option<PruneReport> {
        match self
            .archive
            .prune_at(self.settings.retention, SystemTime::from(now))
        {
            Ok(report) => {
                if !report.removed.is_empty() {
                    tracing::info!(
                        removed = report.removed.len(),
                        retained = report.retained,
                        "pruned old captures"
                    );
                }
                if !report.is_clean() {
                    tracing::warn!(
                        failed = report.failed.len(),
                        "some old captures could not be deleted; retrying next cycle"
                    );
                }
                Some(report)
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not prune archive");
                None
            }
        }
    }

    /// Best-effort text to the destination. Never fails the caller.
    async fn report_failure(&self, error: &Error) -> bool {
        let msg = failure_message(error);
        tracing::error!("{msg}");

        match self.notifier.send_text(&msg).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "Could not send error message to destination");
                false
            }
        }
    }
}
