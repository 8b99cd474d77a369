use std::path::Path;

use crate::error::{PipelineError, Result};

/// Tab-separated text with a header line. Rows keep their own width;
/// ragged rows are left for the consumer to judge.
#[derive(Debug, Clone, Default)]
pub struct TextTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TextTable {
    pub fn read(path: &Path) -> Result<Self> {
        let content = super::read_text(path)?;
        Self::parse(&content, &path.display().to_string())
    }

    pub fn parse(content: &str, source: &str) -> Result<Self> {
        let mut lines = content
            .lines()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.trim().is_empty());
        let header = lines
            .next()
            .ok_or_else(|| PipelineError::MalformedInput(format!("{} is empty", source)))?
            .split('\t')
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>();
        let rows = lines
            .map(|l| l.split('\t').map(|v| v.trim().to_string()).collect())
            .collect();
        Ok(Self { header, rows })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Parses a numeric cell. `n/a`, `nan` and empty cells read as NaN.
pub fn parse_number(value: &str) -> Option<f64> {
    let v = value.trim();
    if v.is_empty() || v.eq_ignore_ascii_case("n/a") || v.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    v.parse::<f64>().ok()
}

/// Like [`parse_number`] but rejects missing values.
pub fn parse_finite(value: &str) -> Option<f64> {
    parse_number(value).filter(|v| v.is_finite())
}
