use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::motion::ConfoundMatrix;

const EXTREME_TRANSLATION_MM: f64 = 20.0;

/// Motion summary for one confound matrix. `None` means undefined: the
/// matrix had no column of that kind, or no finite values in it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MotionQc {
    pub volume_count: usize,
    pub max_translation_mm: Option<f64>,
    pub mean_translation_mm: Option<f64>,
    pub std_translation_mm: Option<f64>,
    pub max_rotation_deg: Option<f64>,
    pub mean_rotation_deg: Option<f64>,
}

pub fn compute_motion_qc(matrix: &ConfoundMatrix) -> MotionQc {
    let trans_idx = columns_containing(matrix, "trans");
    let rot_idx = columns_containing(matrix, "rot");

    let magnitudes: Vec<f64> = if trans_idx.is_empty() {
        Vec::new()
    } else {
        matrix
            .rows
            .iter()
            .map(|row| trans_idx.iter().map(|&i| row[i] * row[i]).sum::<f64>().sqrt())
            .filter(|m| m.is_finite())
            .collect()
    };

    let rotations_deg: Vec<f64> = matrix
        .rows
        .iter()
        .flat_map(|row| rot_idx.iter().map(move |&i| row[i].to_degrees().abs()))
        .filter(|v| v.is_finite())
        .collect();

    MotionQc {
        volume_count: matrix.n_volumes(),
        max_translation_mm: max(&magnitudes),
        mean_translation_mm: mean(&magnitudes),
        std_translation_mm: std_dev(&magnitudes),
        max_rotation_deg: max(&rotations_deg),
        mean_rotation_deg: mean(&rotations_deg),
    }
}

/// Checks the volume count and returns warnings for suspicious values.
pub fn validate_regressors(
    matrix: &ConfoundMatrix,
    expected_volumes: usize,
) -> Result<Vec<String>> {
    if matrix.n_volumes() != expected_volumes {
        return Err(PipelineError::MalformedInput(format!(
            "motion regressors have {} timepoints, expected {}",
            matrix.n_volumes(),
            expected_volumes
        )));
    }
    let mut warnings = Vec::new();
    if matrix.has_nan() {
        warnings.push("motion regressors contain NaN values".to_string());
    }
    let trans_idx = columns_containing(matrix, "trans");
    let max_abs = matrix
        .rows
        .iter()
        .flat_map(|row| trans_idx.iter().map(move |&i| row[i].abs()))
        .filter(|v| v.is_finite())
        .fold(0.0f64, f64::max);
    if max_abs > EXTREME_TRANSLATION_MM {
        warnings.push(format!(
            "extreme translation values detected: {:.2} mm",
            max_abs
        ));
    }
    Ok(warnings)
}

fn columns_containing(matrix: &ConfoundMatrix, needle: &str) -> Vec<usize> {
    matrix
        .columns
        .iter()
        .enumerate()
        .filter(|(_, name)| name.contains(needle))
        .map(|(i, _)| i)
        .collect()
}

fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

// Population standard deviation.
fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}
