//! Pipeline configuration.
//!
//! [`RawConfig`] mirrors the YAML/JSON file with optional fields.
//! [`PipelineConfig::from_raw`] applies defaults and validation once; the
//! result is never mutated during a run. Stages receive their own derived
//! [`StageSettings`].

mod layout;
mod stage_settings;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{PipelineError, Result};
use crate::events::TrialLayout;
use crate::exclusion::{ExclusionRule, Label, session_key};
use crate::glm::{Contrast, RawContrast, default_contrasts};
use crate::motion::DEFAULT_MOTION_PARAMS;
use crate::pipeline::StageKind;
use crate::subject::SubjectId;

pub use layout::OutputLayout;
pub use stage_settings::{StageSettings, StageSettingsBuilder};

const PLACEHOLDER_MARKERS: [&str; 3] = ["/path/to/", "CHANGE_THIS", "UPDATE_ME"];

pub const DEFAULT_REPETITION_TIME: f64 = 1.6;
pub const DEFAULT_VOLUME_COUNT: usize = 367;
pub const DEFAULT_DUMMY_SCANS: usize = 5;
pub const DEFAULT_SMOOTHING_FWHM: u32 = 6;
pub const DEFAULT_HIGH_PASS_S: f64 = 128.0;
pub const DEFAULT_TASK: &str = "MIDT";

/// Configuration file contents. Older key names are accepted as aliases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub base_dir: Option<PathBuf>,
    pub behavioral_dir: Option<PathBuf>,
    pub fmriprep_dir: Option<PathBuf>,
    #[serde(default, deserialize_with = "labels")]
    pub subject_ids: Option<Vec<String>>,
    #[serde(default, deserialize_with = "labels", skip_serializing_if = "Option::is_none")]
    pub sessions_to_process: Option<Vec<String>>,
    #[serde(default)]
    pub excluded_subjects: Vec<ExclusionRule>,

    #[serde(alias = "tr", skip_serializing_if = "Option::is_none")]
    pub repetition_time: Option<f64>,
    #[serde(alias = "n_volumes", skip_serializing_if = "Option::is_none")]
    pub volume_count: Option<usize>,
    #[serde(alias = "dummy_scans", skip_serializing_if = "Option::is_none")]
    pub dummy_scan_count: Option<usize>,
    #[serde(alias = "smooth_fwhm", skip_serializing_if = "Option::is_none")]
    pub smoothing_kernel_size: Option<u32>,
    #[serde(alias = "hpf", skip_serializing_if = "Option::is_none")]
    pub high_pass_filter_cutoff: Option<f64>,

    #[serde(alias = "run_timing_extraction", skip_serializing_if = "Option::is_none")]
    pub timing_stage: Option<bool>,
    #[serde(alias = "run_motion_extraction", skip_serializing_if = "Option::is_none")]
    pub motion_stage: Option<bool>,
    #[serde(alias = "run_first_level", skip_serializing_if = "Option::is_none")]
    pub model_fit_stage: Option<bool>,

    #[serde(alias = "motion_params", skip_serializing_if = "Option::is_none")]
    pub motion_param_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motion_regressor_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_level_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qc_dir: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_layout: Option<TrialLayout>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contrasts: Option<Vec<RawContrast>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glm_backend: Option<BackendKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glm_command: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_log: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    DesignOnly,
    Command,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    DesignOnly,
    Command { program: String, args: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Acquisition {
    /// Seconds.
    pub repetition_time: f64,
    /// Acquired volumes, dummy scans included.
    pub volume_count: usize,
    pub dummy_scan_count: usize,
    /// FWHM in mm of the smoothing already applied to the functional data.
    pub smoothing_kernel_size: u32,
    /// High-pass cutoff period in seconds.
    pub high_pass_filter_cutoff: f64,
}

impl Acquisition {
    /// Volumes left once dummy scans are discarded.
    pub fn analysis_volumes(&self) -> usize {
        self.volume_count - self.dummy_scan_count
    }

    pub fn dummy_offset_s(&self) -> f64 {
        self.dummy_scan_count as f64 * self.repetition_time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageToggles {
    pub timing: bool,
    pub motion: bool,
    pub model_fit: bool,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub base_dir: PathBuf,
    pub behavioral_dir: PathBuf,
    pub fmriprep_dir: PathBuf,
    pub subject_ids: Vec<SubjectId>,
    pub sessions_to_process: Vec<String>,
    pub excluded_subjects: Vec<ExclusionRule>,
    pub acquisition: Acquisition,
    pub stages: StageToggles,
    pub motion_param_names: Vec<String>,
    pub task: String,
    pub layout: OutputLayout,
    pub trial_layout: TrialLayout,
    pub contrasts: Vec<Contrast>,
    pub backend: BackendConfig,
    pub threads: usize,
    pub processing_log: bool,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_raw(load_raw(path)?)
    }

    pub fn from_raw(raw: RawConfig) -> Result<Self> {
        let base_dir = required_path(raw.base_dir, "base_dir")?;
        let behavioral_dir = required_path(raw.behavioral_dir, "behavioral_dir")?;
        let fmriprep_dir = required_path(raw.fmriprep_dir, "fmriprep_dir")?;
        for path in [&base_dir, &behavioral_dir, &fmriprep_dir] {
            let text = path.to_string_lossy();
            if PLACEHOLDER_MARKERS.iter().any(|m| text.contains(m)) {
                return Err(invalid(format!(
                    "placeholder path '{}'; update the configuration file",
                    text
                )));
            }
        }

        let subject_ids = raw
            .subject_ids
            .ok_or_else(|| invalid("missing required field 'subject_ids'"))?
            .iter()
            .map(|raw_id| {
                SubjectId::normalize(raw_id)
                    .map_err(|_| invalid(format!("subject id '{}' cannot be normalized", raw_id)))
            })
            .collect::<Result<Vec<_>>>()?;

        let sessions_to_process = raw
            .sessions_to_process
            .unwrap_or_else(|| vec!["1".to_string()])
            .iter()
            .map(|s| session_key(s).to_string())
            .collect::<Vec<_>>();
        if sessions_to_process.is_empty() || sessions_to_process.iter().any(|s| s.is_empty()) {
            return Err(invalid("sessions_to_process must list at least one non-empty session"));
        }

        let acquisition = Acquisition {
            repetition_time: raw.repetition_time.unwrap_or(DEFAULT_REPETITION_TIME),
            volume_count: raw.volume_count.unwrap_or(DEFAULT_VOLUME_COUNT),
            dummy_scan_count: raw.dummy_scan_count.unwrap_or(DEFAULT_DUMMY_SCANS),
            smoothing_kernel_size: raw.smoothing_kernel_size.unwrap_or(DEFAULT_SMOOTHING_FWHM),
            high_pass_filter_cutoff: raw.high_pass_filter_cutoff.unwrap_or(DEFAULT_HIGH_PASS_S),
        };
        if !(acquisition.repetition_time > 0.0) {
            return Err(invalid("repetition_time must be positive"));
        }
        if !(acquisition.high_pass_filter_cutoff > 0.0) {
            return Err(invalid("high_pass_filter_cutoff must be positive"));
        }
        if acquisition.dummy_scan_count >= acquisition.volume_count {
            return Err(invalid(format!(
                "dummy_scan_count ({}) must be smaller than volume_count ({})",
                acquisition.dummy_scan_count, acquisition.volume_count
            )));
        }

        let motion_param_names = raw
            .motion_param_names
            .unwrap_or_else(|| DEFAULT_MOTION_PARAMS.iter().map(|s| s.to_string()).collect());
        if motion_param_names.is_empty() {
            return Err(invalid("motion_param_names must not be empty"));
        }

        let contrasts = match raw.contrasts {
            Some(list) => list
                .into_iter()
                .map(Contrast::try_from)
                .collect::<Result<Vec<_>>>()?,
            None => default_contrasts(),
        };
        let mut names: Vec<&str> = contrasts.iter().map(|c| c.name.as_str()).collect();
        names.sort_unstable();
        if names.windows(2).any(|w| w[0] == w[1]) {
            return Err(invalid("contrast names must be unique"));
        }

        let backend = match raw.glm_backend.unwrap_or(BackendKind::DesignOnly) {
            BackendKind::DesignOnly => BackendConfig::DesignOnly,
            BackendKind::Command => {
                let mut argv = raw.glm_command.unwrap_or_default().into_iter();
                let program = argv
                    .next()
                    .filter(|p| !p.trim().is_empty())
                    .ok_or_else(|| invalid("glm_backend 'command' requires glm_command"))?;
                BackendConfig::Command {
                    program,
                    args: argv.collect(),
                }
            }
        };

        let layout = OutputLayout {
            timing_dir: raw.timing_dir.unwrap_or_else(|| base_dir.join("timing_files")),
            motion_regressor_dir: raw
                .motion_regressor_dir
                .unwrap_or_else(|| base_dir.join("motion_regressors")),
            first_level_dir: raw
                .first_level_dir
                .unwrap_or_else(|| base_dir.join("first_level_results")),
            qc_dir: raw.qc_dir.unwrap_or_else(|| base_dir.join("quality_control")),
        };

        Ok(Self {
            base_dir,
            behavioral_dir,
            fmriprep_dir,
            subject_ids,
            sessions_to_process,
            excluded_subjects: raw.excluded_subjects,
            acquisition,
            stages: StageToggles {
                timing: raw.timing_stage.unwrap_or(true),
                motion: raw.motion_stage.unwrap_or(true),
                model_fit: raw.model_fit_stage.unwrap_or(true),
            },
            motion_param_names,
            task: raw.task.unwrap_or_else(|| DEFAULT_TASK.to_string()),
            layout,
            trial_layout: raw.trial_layout.unwrap_or_default(),
            contrasts,
            backend,
            threads: raw.threads.unwrap_or(1).max(1),
            processing_log: raw.processing_log.unwrap_or(true),
        })
    }

    pub fn stage_enabled(&self, stage: StageKind) -> bool {
        match stage {
            StageKind::Timing => self.stages.timing,
            StageKind::Motion => self.stages.motion,
            StageKind::ModelFit => self.stages.model_fit,
        }
    }

    pub fn processing_log_path(&self) -> PathBuf {
        self.base_dir.join("processing.log")
    }
}

pub fn load_raw(path: &Path) -> Result<RawConfig> {
    if !path.exists() {
        return Err(invalid(format!("configuration file not found: {}", path.display())));
    }
    let content = std::fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    match ext.as_deref() {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
            .map_err(|e| invalid(format!("{}: {}", path.display(), e))),
        Some("json") => serde_json::from_str(&content)
            .map_err(|e| invalid(format!("{}: {}", path.display(), e))),
        _ => Err(invalid(format!(
            "unsupported configuration format: {}",
            path.display()
        ))),
    }
}

/// Template with placeholder paths; it will not validate until edited.
pub fn example_config() -> RawConfig {
    RawConfig {
        base_dir: Some(PathBuf::from("/path/to/your/analysis/directory")),
        behavioral_dir: Some(PathBuf::from("/path/to/behavioral/timing/files")),
        fmriprep_dir: Some(PathBuf::from("/path/to/fmriprep/derivatives")),
        subject_ids: Some(vec![
            "sub-001".to_string(),
            "sub-002".to_string(),
            "sub-003".to_string(),
        ]),
        sessions_to_process: Some(vec!["1".to_string()]),
        excluded_subjects: Vec::new(),
        repetition_time: Some(DEFAULT_REPETITION_TIME),
        volume_count: Some(DEFAULT_VOLUME_COUNT),
        dummy_scan_count: Some(DEFAULT_DUMMY_SCANS),
        smoothing_kernel_size: Some(DEFAULT_SMOOTHING_FWHM),
        high_pass_filter_cutoff: Some(DEFAULT_HIGH_PASS_S),
        timing_stage: Some(true),
        motion_stage: Some(true),
        model_fit_stage: Some(true),
        motion_param_names: Some(DEFAULT_MOTION_PARAMS.iter().map(|s| s.to_string()).collect()),
        task: Some(DEFAULT_TASK.to_string()),
        glm_backend: Some(BackendKind::DesignOnly),
        threads: Some(1),
        ..RawConfig::default()
    }
}

pub fn to_yaml(raw: &RawConfig) -> Result<String> {
    serde_yaml::to_string(raw).map_err(|e| invalid(e.to_string()))
}

fn labels<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Vec<String>>, D::Error> {
    let list = Option::<Vec<Label>>::deserialize(deserializer)?;
    Ok(list.map(|l| l.into_iter().map(|label| label.0).collect()))
}

fn required_path(value: Option<PathBuf>, field: &str) -> Result<PathBuf> {
    match value {
        Some(p) if !p.as_os_str().is_empty() => Ok(p),
        _ => Err(invalid(format!("missing required field '{}'", field))),
    }
}

fn invalid(msg: impl Into<String>) -> PipelineError {
    PipelineError::ConfigurationInvalid(msg.into())
}
