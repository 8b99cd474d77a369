//! Motion confounds: regressor matrix extraction and motion QC.

mod qc;
mod regressors;

use std::path::Path;

use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::io::table::{TextTable, parse_number};

pub use qc::{MotionQc, compute_motion_qc, validate_regressors};
pub use regressors::{read_regressors, regressor_file_name, write_regressors};

pub const DEFAULT_MOTION_PARAMS: [&str; 6] =
    ["trans_x", "trans_y", "trans_z", "rot_x", "rot_y", "rot_z"];

pub fn confounds_file_name(subject: &str, session: &str, task: &str) -> String {
    format!(
        "{}_ses-{}_task-{}_desc-confounds_timeseries.tsv",
        subject, session, task
    )
}

/// Volumes × parameters, row-major.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfoundMatrix {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl ConfoundMatrix {
    pub fn n_volumes(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn has_nan(&self) -> bool {
        self.rows.iter().flatten().any(|v| v.is_nan())
    }
}

#[derive(Debug, Clone)]
pub struct ConfoundExtraction {
    pub matrix: ConfoundMatrix,
    pub qc: MotionQc,
    /// Requested parameters absent from the table.
    pub missing_columns: Vec<String>,
}

/// Requested parameters split by presence in a confound table header,
/// in requested order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnSelection {
    pub columns: Vec<String>,
    pub indices: Vec<usize>,
    pub missing: Vec<String>,
}

pub fn select_columns(table: &TextTable, motion_params: &[String]) -> ColumnSelection {
    let mut selection = ColumnSelection::default();
    for name in motion_params {
        match table.column_index(name) {
            Some(idx) => {
                selection.columns.push(name.clone());
                selection.indices.push(idx);
            }
            None => selection.missing.push(name.clone()),
        }
    }
    selection
}

pub fn read_confound_table(path: &Path) -> Result<TextTable> {
    if !path.exists() {
        return Err(PipelineError::InputNotFound(path.display().to_string()));
    }
    TextTable::read(path)
}

/// Selects `motion_params` from the confound table and drops the first
/// `dummy_scans` rows from every selected column.
///
/// Absent columns are left out of the matrix and listed in
/// `missing_columns`. Fails when no requested column exists, when
/// `dummy_scans` exceeds the row count, or when a selected cell is not
/// numeric.
pub fn extract(
    table: &TextTable,
    dummy_scans: usize,
    motion_params: &[String],
) -> Result<ConfoundExtraction> {
    if dummy_scans > table.len() {
        return Err(PipelineError::MalformedInput(format!(
            "{} dummy scans requested but confound table has {} rows",
            dummy_scans,
            table.len()
        )));
    }

    let ColumnSelection {
        columns,
        indices,
        missing,
    } = select_columns(table, motion_params);
    if columns.is_empty() {
        return Err(PipelineError::MalformedInput(
            "no motion parameters found in confound table".to_string(),
        ));
    }

    let mut rows = Vec::with_capacity(table.len() - dummy_scans);
    for (row_idx, row) in table.rows.iter().enumerate().skip(dummy_scans) {
        let mut values = Vec::with_capacity(indices.len());
        for (&col, name) in indices.iter().zip(&columns) {
            let cell = row.get(col).map(|s| s.as_str()).unwrap_or("");
            let value = parse_number(cell).ok_or_else(|| {
                PipelineError::MalformedInput(format!(
                    "row {} column '{}': '{}' is not numeric",
                    row_idx + 2,
                    name,
                    cell
                ))
            })?;
            values.push(value);
        }
        rows.push(values);
    }

    let matrix = ConfoundMatrix { columns, rows };
    let qc = compute_motion_qc(&matrix);
    Ok(ConfoundExtraction {
        matrix,
        qc,
        missing_columns: missing,
    })
}
