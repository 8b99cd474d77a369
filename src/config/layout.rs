use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

/// Output directory tree. Every stage directory gets one `ses-<label>`
/// subdirectory per processed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub timing_dir: PathBuf,
    pub motion_regressor_dir: PathBuf,
    pub first_level_dir: PathBuf,
    pub qc_dir: PathBuf,
}

impl OutputLayout {
    pub fn roots(&self) -> [&Path; 4] {
        [
            &self.timing_dir,
            &self.motion_regressor_dir,
            &self.first_level_dir,
            &self.qc_dir,
        ]
    }

    pub fn session_dir(root: &Path, session: &str) -> PathBuf {
        root.join(format!("ses-{}", session))
    }

    /// Creates the roots and the session subdirectories. Existing
    /// directories are left as they are.
    pub fn materialize(&self, session: &str) -> Result<()> {
        for root in self.roots() {
            let dir = Self::session_dir(root, session);
            fs::create_dir_all(&dir)?;
            debug!(dir = %dir.display(), "output_dir_ready");
        }
        Ok(())
    }
}
