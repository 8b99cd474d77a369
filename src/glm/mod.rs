//! Boundary to the statistical model-fitting backend.
//!
//! The backend is opaque: it receives a fully assembled design request and
//! returns whatever statistical outputs it produced.

mod command;
mod contrasts;
mod design;
mod functional;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;
use crate::error::Result;
use crate::events::ConditionSet;
use crate::motion::ConfoundMatrix;
use crate::subject::SubjectId;

pub use command::CommandBackend;
pub use contrasts::{Contrast, RawContrast, default_contrasts};
pub use design::{DesignOnlyBackend, build_design_matrix, design_matrix_file_name};
pub use functional::{find_functional_file, func_dir, functional_candidates};

/// Everything needed to fit one subject/session.
#[derive(Debug, Clone, Serialize)]
pub struct GlmRequest<'a> {
    pub subject: &'a SubjectId,
    pub session: &'a str,
    pub task: &'a str,
    pub functional_path: &'a Path,
    /// Leading volumes of the functional series to discard.
    pub dummy_scans: usize,
    pub analysis_volumes: usize,
    pub repetition_time: f64,
    pub high_pass_cutoff_s: f64,
    pub smoothing_fwhm: u32,
    pub events: &'a ConditionSet,
    pub confounds: &'a ConfoundMatrix,
    pub contrasts: &'a [Contrast],
    pub output_dir: &'a Path,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContrastResult {
    pub name: String,
    pub estimable: bool,
    #[serde(default)]
    pub effect_map: Option<PathBuf>,
    #[serde(default)]
    pub stat_map: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlmFit {
    #[serde(default)]
    pub design_matrix: Option<PathBuf>,
    #[serde(default)]
    pub contrasts: Vec<ContrastResult>,
}

impl GlmFit {
    pub fn estimable_contrasts(&self) -> usize {
        self.contrasts.iter().filter(|c| c.estimable).count()
    }
}

pub trait GlmBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Called once before any session runs.
    fn check_available(&self) -> Result<()> {
        Ok(())
    }

    fn fit(&self, request: &GlmRequest<'_>) -> Result<GlmFit>;
}

pub fn build_backend(config: &BackendConfig) -> Box<dyn GlmBackend> {
    match config {
        BackendConfig::DesignOnly => Box::new(DesignOnlyBackend::new()),
        BackendConfig::Command { program, args } => {
            Box::new(CommandBackend::new(program.clone(), args.clone()))
        }
    }
}
