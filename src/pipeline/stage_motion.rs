use std::fs;
use std::path::PathBuf;

use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::config::StageSettings;
use crate::error::PipelineError;
use crate::glm::func_dir;
use crate::motion::{
    self, confounds_file_name, read_confound_table, regressor_file_name, validate_regressors,
    write_regressors,
};
use crate::pipeline::workers::map_subjects;
use crate::pipeline::{SessionCtx, Stage, StageKind};
use crate::qc::QcMetric;
use crate::subject::SubjectId;

pub struct MotionStage;

impl MotionStage {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for MotionStage {
    fn kind(&self) -> StageKind {
        StageKind::Motion
    }

    fn run(&self, ctx: &mut SessionCtx<'_>) -> Result<()> {
        let settings = ctx.settings(StageKind::Motion);
        if !settings.input_dir.is_dir() {
            bail!(PipelineError::InputNotFound(format!(
                "fMRIPrep directory {}",
                settings.input_dir.display()
            )));
        }

        let outcomes = map_subjects(&ctx.subjects, settings.threads, |subject| {
            process_subject(&settings, subject)
        })?;

        let subjects = ctx.subjects.clone();
        let mut extracted = 0usize;
        for (subject, outcome) in subjects.iter().zip(outcomes) {
            match outcome {
                Ok((path, metric)) => {
                    extracted += 1;
                    info!(
                        session = %ctx.session,
                        subject = %subject,
                        volumes = metric.motion.volume_count,
                        max_translation_mm = metric.motion.max_translation_mm,
                        out = %path.display(),
                        "motion regressors written"
                    );
                    ctx.log.record(StageKind::Motion.name(), subject.as_str(), "success");
                    ctx.qc.push(metric);
                }
                Err(err) => {
                    warn!(
                        session = %ctx.session,
                        subject = %subject,
                        error = %err,
                        "motion extraction failed"
                    );
                    ctx.record_failure(StageKind::Motion, subject.as_str(), &err);
                }
            }
        }

        if extracted == 0 {
            bail!(PipelineError::StageFailed(format!(
                "no motion regressors could be extracted for session {}",
                ctx.session
            )));
        }
        Ok(())
    }
}

/// `<motion_regressor_dir>/ses-<s>/<sub>/<sub>_ses-<s>_task-<task>_Regressors.txt`
pub fn regressor_path(settings: &StageSettings, subject: &SubjectId) -> PathBuf {
    settings
        .output_dir
        .join(subject.as_str())
        .join(regressor_file_name(subject.as_str(), &settings.session, &settings.task))
}

pub fn confound_table_path(settings: &StageSettings, subject: &SubjectId) -> PathBuf {
    func_dir(&settings.input_dir, subject, &settings.session).join(confounds_file_name(
        subject.as_str(),
        &settings.session,
        &settings.task,
    ))
}

fn process_subject(
    settings: &StageSettings,
    subject: &SubjectId,
) -> crate::error::Result<(PathBuf, QcMetric)> {
    let table = read_confound_table(&confound_table_path(settings, subject))?;
    let extraction = motion::extract(
        &table,
        settings.acquisition.dummy_scan_count,
        &settings.motion_param_names,
    )?;
    if !extraction.missing_columns.is_empty() {
        warn!(
            subject = %subject,
            session = %settings.session,
            missing = %extraction.missing_columns.join(", "),
            "motion parameters not found in confounds"
        );
    }

    match validate_regressors(&extraction.matrix, settings.acquisition.analysis_volumes()) {
        Ok(warnings) => {
            for w in warnings {
                warn!(subject = %subject, session = %settings.session, "{}", w);
            }
        }
        Err(err) => {
            warn!(subject = %subject, session = %settings.session, error = %err, "regressor check")
        }
    }

    let path = regressor_path(settings, subject);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    write_regressors(&path, &extraction.matrix)?;

    let metric = QcMetric::new(subject.clone(), &settings.session, extraction.qc);
    Ok((path, metric))
}
