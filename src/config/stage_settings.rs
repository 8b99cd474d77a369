use std::path::PathBuf;

use crate::config::{Acquisition, OutputLayout, PipelineConfig};
use crate::events::TrialLayout;
use crate::exclusion::session_key;
use crate::pipeline::StageKind;

/// Settings one stage needs for one session, derived from the base
/// configuration at the stage boundary.
#[derive(Debug, Clone)]
pub struct StageSettings {
    pub stage: StageKind,
    pub session: String,
    pub task: String,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub acquisition: Acquisition,
    pub motion_param_names: Vec<String>,
    pub trial_layout: TrialLayout,
    pub threads: usize,
}

impl StageSettings {
    pub fn builder<'a>(
        config: &'a PipelineConfig,
        stage: StageKind,
        session: &str,
    ) -> StageSettingsBuilder<'a> {
        StageSettingsBuilder {
            config,
            stage,
            session: session_key(session).to_string(),
            output_dir: None,
            threads: None,
        }
    }

    /// Session label in BIDS form, e.g. `ses-1`.
    pub fn session_label(&self) -> String {
        format!("ses-{}", self.session)
    }
}

pub struct StageSettingsBuilder<'a> {
    config: &'a PipelineConfig,
    stage: StageKind,
    session: String,
    output_dir: Option<PathBuf>,
    threads: Option<usize>,
}

impl StageSettingsBuilder<'_> {
    pub fn output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = Some(dir);
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads.max(1));
        self
    }

    pub fn build(self) -> StageSettings {
        let config = self.config;
        let root = match self.stage {
            StageKind::Timing => &config.layout.timing_dir,
            StageKind::Motion => &config.layout.motion_regressor_dir,
            StageKind::ModelFit => &config.layout.first_level_dir,
        };
        let input_dir = match self.stage {
            StageKind::Timing => config.behavioral_dir.clone(),
            StageKind::Motion | StageKind::ModelFit => config.fmriprep_dir.clone(),
        };
        let output_dir = self
            .output_dir
            .unwrap_or_else(|| OutputLayout::session_dir(root, &self.session));
        StageSettings {
            stage: self.stage,
            session: self.session,
            task: config.task.clone(),
            input_dir,
            output_dir,
            acquisition: config.acquisition,
            motion_param_names: config.motion_param_names.clone(),
            trial_layout: config.trial_layout.clone(),
            threads: self.threads.unwrap_or(config.threads),
        }
    }
}
