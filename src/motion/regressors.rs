use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::io::read_text;
use crate::motion::ConfoundMatrix;

pub fn regressor_file_name(subject: &str, session: &str, task: &str) -> String {
    format!("{}_ses-{}_task-{}_Regressors.txt", subject, session, task)
}

/// Plain numeric table: one line per volume, space separated.
pub fn write_regressors(path: &Path, matrix: &ConfoundMatrix) -> Result<()> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    for row in &matrix.rows {
        let line = row
            .iter()
            .map(|v| format!("{:.6}", v))
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(w, "{}", line)?;
    }
    w.flush()?;
    Ok(())
}

/// Loads a regressor file. The file carries no header, so `names` must
/// list the columns actually written, one per value.
pub fn read_regressors(path: &Path, names: &[String]) -> Result<ConfoundMatrix> {
    if !path.exists() {
        return Err(PipelineError::InputNotFound(path.display().to_string()));
    }
    let content = read_text(path)?;
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(|v| v.parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| {
                PipelineError::MalformedInput(format!("{}:{} {}", path.display(), idx + 1, e))
            })?;
        if let Some(first) = rows.first() {
            if first.len() != row.len() {
                return Err(PipelineError::MalformedInput(format!(
                    "{}:{} expected {} values, found {}",
                    path.display(),
                    idx + 1,
                    first.len(),
                    row.len()
                )));
            }
        }
        rows.push(row);
    }

    let width = rows.first().map(|r| r.len()).unwrap_or(0);
    if !rows.is_empty() && width != names.len() {
        return Err(PipelineError::MalformedInput(format!(
            "{} has {} columns but {} were expected ({})",
            path.display(),
            width,
            names.len(),
            names.join(", ")
        )));
    }
    Ok(ConfoundMatrix {
        columns: names.to_vec(),
        rows,
    })
}
