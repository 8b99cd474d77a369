use std::path::{Path, PathBuf};

use crate::subject::SubjectId;

const SPACE: &str = "space-MNI152NLin2009cAsym";

/// `<fmriprep>/<sub>/ses-<s>/func`
pub fn func_dir(fmriprep_dir: &Path, subject: &SubjectId, session: &str) -> PathBuf {
    fmriprep_dir
        .join(subject.as_str())
        .join(format!("ses-{}", session))
        .join("func")
}

/// Candidate names for the preprocessed BOLD series, smoothed variants
/// first.
pub fn functional_candidates(
    subject: &SubjectId,
    session: &str,
    task: &str,
    fwhm: u32,
) -> Vec<String> {
    let stem = format!("{}_ses-{}_task-{}_{}", subject, session, task, SPACE);
    vec![
        format!("{}_res-2_desc-preproc_bold_{}mm_blur.nii", stem, fwhm),
        format!("{}_res-2_desc-preproc_bold_{}mm_blur.nii.gz", stem, fwhm),
        format!("{}_desc-preproc_bold.nii.gz", stem),
        format!("{}_desc-preproc_bold.nii", stem),
    ]
}

pub fn find_functional_file(
    fmriprep_dir: &Path,
    subject: &SubjectId,
    session: &str,
    task: &str,
    fwhm: u32,
) -> Option<PathBuf> {
    let dir = func_dir(fmriprep_dir, subject, session);
    functional_candidates(subject, session, task, fwhm)
        .into_iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}
