use crate::config::{PipelineConfig, StageSettings};
use crate::error::PipelineError;
use crate::glm::{GlmBackend, GlmFit};
use crate::io::processing_log::ProcessingLog;
use crate::pipeline::{FailedItem, StageKind};
use crate::qc::QcMetric;
use crate::subject::SubjectId;

/// State shared by the stages of one session.
///
/// The configuration is borrowed read-only; stages only append to the
/// accumulators below.
pub struct SessionCtx<'a> {
    pub config: &'a PipelineConfig,
    pub backend: &'a dyn GlmBackend,
    pub log: &'a ProcessingLog,
    pub session: String,
    /// Effective subject list after exclusions, in configured order.
    pub subjects: Vec<SubjectId>,
    pub failed: Vec<FailedItem>,
    pub qc: Vec<QcMetric>,
    pub fits: Vec<(SubjectId, GlmFit)>,
}

impl<'a> SessionCtx<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        backend: &'a dyn GlmBackend,
        log: &'a ProcessingLog,
        session: &str,
        subjects: Vec<SubjectId>,
    ) -> Self {
        Self {
            config,
            backend,
            log,
            session: session.to_string(),
            subjects,
            failed: Vec::new(),
            qc: Vec::new(),
            fits: Vec::new(),
        }
    }

    pub fn settings(&self, stage: StageKind) -> StageSettings {
        StageSettings::builder(self.config, stage, &self.session).build()
    }

    pub fn record_failure(&mut self, stage: StageKind, subject: &str, err: &PipelineError) {
        self.log.record(stage.name(), subject, &format!("failed: {}", err));
        self.failed.push(FailedItem {
            subject: subject.to_string(),
            stage,
            kind: err.kind(),
            message: err.to_string(),
        });
    }

    pub fn failed_in(&self, stage: StageKind) -> usize {
        self.failed.iter().filter(|f| f.stage == stage).count()
    }

    /// Subjects of this session with no failed item in any stage.
    pub fn clean_subjects(&self) -> Vec<SubjectId> {
        self.subjects
            .iter()
            .filter(|s| !self.failed.iter().any(|f| f.subject == s.as_str()))
            .cloned()
            .collect()
    }
}
