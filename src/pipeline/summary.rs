use std::path::PathBuf;

use serde::Serialize;

use crate::error::ErrorKind;
use crate::glm::GlmFit;
use crate::pipeline::{FailedItem, RunnerState, StageKind, StageResult, StageStatus};
use crate::qc::CohortSummary;
use crate::subject::SubjectId;

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session: String,
    pub total_subjects: usize,
    /// Stage-level count: the whole session list once every enabled stage
    /// succeeded, zero otherwise.
    pub successful_subjects: usize,
    pub state: RunnerState,
    /// Session-level problem that kept the stages from running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub stage_results: Vec<StageResult>,
    pub failed_items: Vec<FailedItem>,
    /// Subjects with no failed item, counted only when the session reached
    /// `Done` with at least one stage run.
    pub fully_processed: Vec<SubjectId>,
    /// Backend outputs of the model-fit stage, in subject order.
    pub fits: Vec<FitSummary>,
}

impl SessionSummary {
    pub fn failed_stage(&self) -> Option<&StageResult> {
        self.stage_results
            .iter()
            .find(|r| r.status == StageStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitSummary {
    pub subject: SubjectId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub design_matrix: Option<PathBuf>,
    pub estimable_contrasts: usize,
    pub total_contrasts: usize,
}

impl FitSummary {
    pub fn new(subject: SubjectId, fit: &GlmFit) -> Self {
        Self {
            subject,
            design_matrix: fit.design_matrix.clone(),
            estimable_contrasts: fit.estimable_contrasts(),
            total_contrasts: fit.contrasts.len(),
        }
    }
}

/// One entry of the failure enumeration shown after a run. `stage` and
/// `subject` are absent for session-level problems.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureRecord {
    pub session: String,
    pub stage: Option<StageKind>,
    pub subject: Option<String>,
    pub kind: Option<ErrorKind>,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub sessions_processed: Vec<String>,
    pub total_subjects: usize,
    pub successful_subjects: usize,
    pub fully_processed_subjects: usize,
    pub sessions: Vec<SessionSummary>,
    pub failures: Vec<FailureRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qc: Option<CohortSummary>,
}

impl RunSummary {
    /// Appends a finished session and folds its counts into the totals.
    pub fn push_session(&mut self, summary: SessionSummary) {
        self.sessions_processed.push(summary.session.clone());
        self.total_subjects += summary.total_subjects;
        self.successful_subjects += summary.successful_subjects;
        self.fully_processed_subjects += summary.fully_processed.len();

        if let Some(error) = &summary.error {
            self.failures.push(FailureRecord {
                session: summary.session.clone(),
                stage: None,
                subject: None,
                kind: None,
                message: error.clone(),
            });
        }
        for result in &summary.stage_results {
            if result.status == StageStatus::Failed {
                self.failures.push(FailureRecord {
                    session: summary.session.clone(),
                    stage: stage_by_name(result.stage_name),
                    subject: None,
                    kind: None,
                    message: result.message.clone(),
                });
            }
        }
        for item in &summary.failed_items {
            self.failures.push(FailureRecord {
                session: summary.session.clone(),
                stage: Some(item.stage),
                subject: Some(item.subject.clone()),
                kind: Some(item.kind),
                message: item.message.clone(),
            });
        }
        self.sessions.push(summary);
    }

    pub fn push_failure(&mut self, record: FailureRecord) {
        self.failures.push(record);
    }

    /// `None` when no subject was scheduled at all.
    pub fn success_rate(&self) -> Option<f64> {
        if self.total_subjects == 0 {
            return None;
        }
        Some(self.successful_subjects as f64 / self.total_subjects as f64)
    }
}

fn stage_by_name(name: &str) -> Option<StageKind> {
    StageKind::ORDER.into_iter().find(|k| k.name() == name)
}
