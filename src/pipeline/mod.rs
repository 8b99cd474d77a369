use std::fmt;
use std::time::Instant;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ErrorKind;

pub mod orchestrator;
pub mod session;
pub mod stage_model_fit;
pub mod stage_motion;
pub mod stage_timing;
pub mod summary;
mod workers;

pub use orchestrator::{Orchestrator, estimate_minutes, run};
pub use session::SessionCtx;
pub use summary::{FailureRecord, FitSummary, RunSummary, SessionSummary};

/// The three processing stages, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum StageKind {
    #[serde(rename = "timing_extraction")]
    Timing,
    #[serde(rename = "motion_extraction")]
    Motion,
    #[serde(rename = "model_fit")]
    ModelFit,
}

impl StageKind {
    pub const ORDER: [StageKind; 3] = [StageKind::Timing, StageKind::Motion, StageKind::ModelFit];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Timing => "timing_extraction",
            Self::Motion => "motion_extraction",
            Self::ModelFit => "model_fit",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    fn run(&self, ctx: &mut SessionCtx<'_>) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Success,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageResult {
    pub stage_name: &'static str,
    pub status: StageStatus,
    pub message: String,
}

/// A per-subject (or per-input-file) failure contained inside a stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedItem {
    /// Canonical id, or the raw file name when identity could not be resolved.
    pub subject: String,
    pub stage: StageKind,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum RunnerState {
    Pending,
    Running(StageKind),
    Done,
    Failed(StageKind),
}

#[derive(Debug, Clone)]
pub struct RunnerOutcome {
    pub state: RunnerState,
    pub stage_results: Vec<StageResult>,
    /// Set once every enabled stage succeeded; zero otherwise.
    pub successful_subjects: usize,
}

/// Runs the stage sequence for one session.
///
/// A stage runs only when it is enabled and nothing before it failed. The
/// first failure is recorded and ends the sequence; nothing is recorded
/// after it.
pub struct StageRunner {
    stages: Vec<Box<dyn Stage>>,
}

impl StageRunner {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(stage_timing::TimingStage::new()),
            Box::new(stage_motion::MotionStage::new()),
            Box::new(stage_model_fit::ModelFitStage::new()),
        ])
    }

    pub fn run(&self, ctx: &mut SessionCtx<'_>) -> RunnerOutcome {
        let mut state = RunnerState::Pending;
        let mut stage_results = Vec::with_capacity(self.stages.len());
        let mut any_ran = false;

        for stage in &self.stages {
            let kind = stage.kind();
            if !ctx.config.stage_enabled(kind) {
                info!(session = %ctx.session, stage = stage.name(), "stage disabled");
                stage_results.push(StageResult {
                    stage_name: stage.name(),
                    status: StageStatus::Skipped,
                    message: "disabled by configuration".to_string(),
                });
                continue;
            }
            if ctx.subjects.is_empty() {
                stage_results.push(StageResult {
                    stage_name: stage.name(),
                    status: StageStatus::Skipped,
                    message: "no eligible subjects".to_string(),
                });
                continue;
            }

            state = transition(state, RunnerState::Running(kind), &ctx.session);
            let start = Instant::now();
            info!(session = %ctx.session, stage = stage.name(), "stage started");
            let result = stage.run(ctx);
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match result {
                Ok(()) => {
                    let failed = ctx.failed_in(kind);
                    info!(
                        session = %ctx.session,
                        stage = stage.name(),
                        failed_items = failed,
                        elapsed_ms,
                        "stage finished"
                    );
                    ctx.log.record(stage.name(), &format!("ses-{}", ctx.session), "completed");
                    stage_results.push(StageResult {
                        stage_name: stage.name(),
                        status: StageStatus::Success,
                        message: format!(
                            "{} subjects, {} failed items",
                            ctx.subjects.len(),
                            failed
                        ),
                    });
                    any_ran = true;
                }
                Err(err) => {
                    warn!(
                        session = %ctx.session,
                        stage = stage.name(),
                        elapsed_ms,
                        error = %format!("{:#}", err),
                        "stage failed"
                    );
                    ctx.log.record(stage.name(), &format!("ses-{}", ctx.session), "failed");
                    stage_results.push(StageResult {
                        stage_name: stage.name(),
                        status: StageStatus::Failed,
                        message: format!("{:#}", err),
                    });
                    return RunnerOutcome {
                        state: transition(state, RunnerState::Failed(kind), &ctx.session),
                        stage_results,
                        successful_subjects: 0,
                    };
                }
            }
        }

        RunnerOutcome {
            state: transition(state, RunnerState::Done, &ctx.session),
            stage_results,
            successful_subjects: if any_ran { ctx.subjects.len() } else { 0 },
        }
    }
}

fn transition(from: RunnerState, to: RunnerState, session: &str) -> RunnerState {
    debug!(session, from = ?from, to = ?to, "runner transition");
    to
}
