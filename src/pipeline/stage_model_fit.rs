use std::fs;

use anyhow::{Result, bail};
use tracing::{debug, info, warn};

use crate::config::StageSettings;
use crate::error::PipelineError;
use crate::events::{events_file_name, read_events_file};
use crate::glm::{Contrast, GlmBackend, GlmFit, GlmRequest, find_functional_file, func_dir};
use crate::motion::{
    self, ConfoundMatrix, read_confound_table, read_regressors, select_columns,
    validate_regressors,
};
use crate::pipeline::stage_motion::{confound_table_path, regressor_path};
use crate::pipeline::workers::map_subjects;
use crate::pipeline::{SessionCtx, Stage, StageKind};
use crate::subject::SubjectId;

pub struct ModelFitStage;

impl ModelFitStage {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for ModelFitStage {
    fn kind(&self) -> StageKind {
        StageKind::ModelFit
    }

    fn run(&self, ctx: &mut SessionCtx<'_>) -> Result<()> {
        let settings = ctx.settings(StageKind::ModelFit);
        let inputs = FitInputs {
            settings: &settings,
            timing: ctx.settings(StageKind::Timing),
            motion: ctx.settings(StageKind::Motion),
            contrasts: &ctx.config.contrasts,
            backend: ctx.backend,
        };
        if !settings.input_dir.is_dir() {
            bail!(PipelineError::InputNotFound(format!(
                "fMRIPrep directory {}",
                settings.input_dir.display()
            )));
        }

        let outcomes =
            map_subjects(&ctx.subjects, settings.threads, |subject| inputs.fit(subject))?;

        let subjects = ctx.subjects.clone();
        let mut fitted = 0usize;
        for (subject, outcome) in subjects.iter().zip(outcomes) {
            match outcome {
                Ok(fit) => {
                    fitted += 1;
                    info!(
                        session = %ctx.session,
                        subject = %subject,
                        backend = ctx.backend.name(),
                        estimable = fit.estimable_contrasts(),
                        contrasts = fit.contrasts.len(),
                        "model fit finished"
                    );
                    ctx.log.record(StageKind::ModelFit.name(), subject.as_str(), "success");
                    ctx.fits.push((subject.clone(), fit));
                }
                Err(err) => {
                    warn!(
                        session = %ctx.session,
                        subject = %subject,
                        error = %err,
                        "model fit failed"
                    );
                    ctx.record_failure(StageKind::ModelFit, subject.as_str(), &err);
                }
            }
        }

        if fitted == 0 {
            bail!(PipelineError::StageFailed(format!(
                "no subject could be fitted for session {}",
                ctx.session
            )));
        }
        Ok(())
    }
}

struct FitInputs<'a> {
    settings: &'a StageSettings,
    timing: StageSettings,
    motion: StageSettings,
    contrasts: &'a [Contrast],
    backend: &'a dyn GlmBackend,
}

impl FitInputs<'_> {
    fn fit(&self, subject: &SubjectId) -> crate::error::Result<GlmFit> {
        let settings = self.settings;
        let session = settings.session.as_str();
        let acquisition = settings.acquisition;

        let events_path = self
            .timing
            .output_dir
            .join(events_file_name(subject, session, &settings.task));
        let events = read_events_file(&events_path)?;

        let confounds = self.load_confounds(subject)?;
        let analysis_volumes = acquisition.analysis_volumes();
        for w in validate_regressors(&confounds, analysis_volumes)? {
            warn!(subject = %subject, session, "{}", w);
        }

        let functional_path = find_functional_file(
            &settings.input_dir,
            subject,
            session,
            &settings.task,
            acquisition.smoothing_kernel_size,
        )
        .ok_or_else(|| {
            PipelineError::InputNotFound(format!(
                "functional series for {} in {}",
                subject,
                func_dir(&settings.input_dir, subject, session).display()
            ))
        })?;

        let output_dir = settings.output_dir.join(subject.as_str());
        fs::create_dir_all(&output_dir)?;

        let request = GlmRequest {
            subject,
            session,
            task: &settings.task,
            functional_path: &functional_path,
            dummy_scans: acquisition.dummy_scan_count,
            analysis_volumes,
            repetition_time: acquisition.repetition_time,
            high_pass_cutoff_s: acquisition.high_pass_filter_cutoff,
            smoothing_fwhm: acquisition.smoothing_kernel_size,
            events: &events,
            confounds: &confounds,
            contrasts: self.contrasts,
            output_dir: &output_dir,
        };
        self.backend.fit(&request)
    }

    /// Regressor file from the motion stage, else the raw confound table.
    ///
    /// The regressor file has no header; its columns are the configured
    /// parameters present in the confound table, so they are recovered
    /// from that table's header.
    fn load_confounds(&self, subject: &SubjectId) -> crate::error::Result<ConfoundMatrix> {
        let params = &self.motion.motion_param_names;
        let table = read_confound_table(&confound_table_path(&self.motion, subject))?;
        let path = regressor_path(&self.motion, subject);
        if path.exists() {
            let selection = select_columns(&table, params);
            return read_regressors(&path, &selection.columns);
        }
        debug!(subject = %subject, missing = %path.display(), "using raw confound table");
        let extraction =
            motion::extract(&table, self.motion.acquisition.dummy_scan_count, params)?;
        Ok(extraction.matrix)
    }
}
