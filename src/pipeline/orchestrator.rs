use std::time::Instant;

use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::exclusion;
use crate::glm::GlmBackend;
use crate::io::processing_log::ProcessingLog;
use crate::pipeline::{
    FailureRecord, FitSummary, RunSummary, RunnerState, SessionCtx, SessionSummary, StageKind,
    StageRunner,
};
use crate::qc::{self, HIGH_MOTION_THRESHOLD_MM, QC_REPORT_FILE, QcMetric};

/// Rough minutes per subject and session for each stage.
const STAGE_MINUTES: [(StageKind, f64); 3] = [
    (StageKind::Timing, 0.5),
    (StageKind::Motion, 1.0),
    (StageKind::ModelFit, 8.0),
];

/// Walks every configured session through the stage runner.
pub struct Orchestrator<'a> {
    config: &'a PipelineConfig,
    backend: &'a dyn GlmBackend,
    runner: StageRunner,
    log: ProcessingLog,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a PipelineConfig, backend: &'a dyn GlmBackend) -> Self {
        let log = if config.processing_log {
            ProcessingLog::new(config.processing_log_path())
        } else {
            ProcessingLog::disabled()
        };
        Self {
            config,
            backend,
            runner: StageRunner::standard(),
            log,
        }
    }

    pub fn with_runner(mut self, runner: StageRunner) -> Self {
        self.runner = runner;
        self
    }

    /// Fails only for preflight problems (an unavailable backend); every
    /// later error is contained in the returned summary.
    pub fn run(&self) -> Result<RunSummary> {
        if self.config.stages.model_fit {
            self.backend.check_available()?;
        }
        let start = Instant::now();
        info!(
            sessions = self.config.sessions_to_process.len(),
            subjects = self.config.subject_ids.len(),
            backend = self.backend.name(),
            threads = self.config.threads,
            "pipeline started"
        );
        self.log.record("pipeline", "all", "started");

        let mut summary = RunSummary::default();
        let mut qc_rows: Vec<QcMetric> = Vec::new();
        for session in &self.config.sessions_to_process {
            let (session_summary, rows) = self.run_session(session);
            qc_rows.extend(rows);
            summary.push_session(session_summary);
        }

        if !qc_rows.is_empty() {
            self.write_qc(&qc_rows, &mut summary);
        }

        info!(
            sessions = summary.sessions_processed.len(),
            total_subjects = summary.total_subjects,
            successful_subjects = summary.successful_subjects,
            fully_processed = summary.fully_processed_subjects,
            success_rate = summary.success_rate(),
            failures = summary.failures.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "pipeline finished"
        );
        self.log.record("pipeline", "all", "finished");
        Ok(summary)
    }

    fn run_session(&self, session: &str) -> (SessionSummary, Vec<QcMetric>) {
        let subjects = exclusion::resolve(
            &self.config.subject_ids,
            &self.config.excluded_subjects,
            session,
        );
        info!(session, subjects = subjects.len(), "session started");

        let mut ctx = SessionCtx::new(self.config, self.backend, &self.log, session, subjects);

        if let Err(err) = self.config.layout.materialize(session) {
            warn!(session, error = %err, "cannot create output directories");
            ctx.log.record("materialize", &format!("ses-{}", session), "failed");
            let summary = SessionSummary {
                session: session.to_string(),
                total_subjects: ctx.subjects.len(),
                successful_subjects: 0,
                state: RunnerState::Pending,
                error: Some(err.to_string()),
                stage_results: Vec::new(),
                failed_items: Vec::new(),
                fully_processed: Vec::new(),
                fits: Vec::new(),
            };
            return (summary, Vec::new());
        }

        let outcome = self.runner.run(&mut ctx);
        let fully_processed = match outcome.state {
            RunnerState::Done if outcome.successful_subjects > 0 => ctx.clean_subjects(),
            _ => Vec::new(),
        };
        info!(
            session,
            state = ?outcome.state,
            successful_subjects = outcome.successful_subjects,
            failed_items = ctx.failed.len(),
            "session finished"
        );

        let fits = ctx
            .fits
            .iter()
            .map(|(subject, fit)| FitSummary::new(subject.clone(), fit))
            .collect();
        let summary = SessionSummary {
            session: session.to_string(),
            total_subjects: ctx.subjects.len(),
            successful_subjects: outcome.successful_subjects,
            state: outcome.state,
            error: None,
            stage_results: outcome.stage_results,
            failed_items: ctx.failed,
            fully_processed,
            fits,
        };
        (summary, ctx.qc)
    }

    fn write_qc(&self, rows: &[QcMetric], summary: &mut RunSummary) {
        let path = self.config.layout.qc_dir.join(QC_REPORT_FILE);
        let written = std::fs::create_dir_all(&self.config.layout.qc_dir)
            .map_err(PipelineError::from)
            .and_then(|_| qc::write_qc_report(&path, rows));
        match written {
            Ok(()) => info!(path = %path.display(), rows = rows.len(), "qc report written"),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot write qc report");
                summary.push_failure(FailureRecord {
                    session: "all".to_string(),
                    stage: None,
                    subject: None,
                    kind: Some(err.kind()),
                    message: format!("qc report: {}", err),
                });
            }
        }
        summary.qc = qc::cohort_summary(rows, HIGH_MOTION_THRESHOLD_MM);
        if let Some(cohort) = &summary.qc {
            qc::log_cohort_summary(cohort);
        }
    }
}

/// Runs the whole configuration. See [`Orchestrator::run`].
pub fn run(config: &PipelineConfig, backend: &dyn GlmBackend) -> Result<RunSummary> {
    Orchestrator::new(config, backend).run()
}

/// Expected wall time in minutes for the enabled stages over every
/// effective subject/session pair.
pub fn estimate_minutes(config: &PipelineConfig) -> f64 {
    let per_subject: f64 = STAGE_MINUTES
        .iter()
        .filter(|(stage, _)| config.stage_enabled(*stage))
        .map(|(_, minutes)| minutes)
        .sum();
    let pairs: usize = config
        .sessions_to_process
        .iter()
        .map(|s| exclusion::resolve(&config.subject_ids, &config.excluded_subjects, s).len())
        .sum();
    pairs as f64 * per_subject
}
