//! Cohort motion QC: the per-subject report table and its summary.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::motion::MotionQc;
use crate::subject::SubjectId;

pub const QC_REPORT_FILE: &str = "motion_qc_report.tsv";

/// Max translation above which a subject counts as high-motion, in mm.
pub const HIGH_MOTION_THRESHOLD_MM: f64 = 2.0;

const HEADER: [&str; 8] = [
    "subject",
    "session",
    "volume_count",
    "max_translation_mm",
    "mean_translation_mm",
    "std_translation_mm",
    "max_rotation_deg",
    "mean_rotation_deg",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QcMetric {
    pub subject: SubjectId,
    pub session: String,
    #[serde(flatten)]
    pub motion: MotionQc,
}

impl QcMetric {
    pub fn new(subject: SubjectId, session: &str, motion: MotionQc) -> Self {
        Self {
            subject,
            session: session.to_string(),
            motion,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortSummary {
    pub rows: usize,
    /// Rows with a defined max translation.
    pub measured: usize,
    pub min_max_translation_mm: f64,
    pub max_max_translation_mm: f64,
    pub mean_max_translation_mm: f64,
    pub std_max_translation_mm: f64,
    pub threshold_mm: f64,
    pub above_threshold: usize,
}

/// One row per subject/session; undefined metrics are written as `n/a`.
pub fn write_qc_report(path: &Path, rows: &[QcMetric]) -> Result<()> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    writeln!(w, "{}", HEADER.join("\t"))?;
    for row in rows {
        let m = &row.motion;
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            row.subject,
            row.session,
            m.volume_count,
            fmt_metric(m.max_translation_mm),
            fmt_metric(m.mean_translation_mm),
            fmt_metric(m.std_translation_mm),
            fmt_metric(m.max_rotation_deg),
            fmt_metric(m.mean_rotation_deg),
        )?;
    }
    w.flush()?;
    Ok(())
}

fn fmt_metric(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.4}", v),
        None => "n/a".to_string(),
    }
}

/// Summary of max translation across rows. `None` if no row has one.
pub fn cohort_summary(rows: &[QcMetric], threshold_mm: f64) -> Option<CohortSummary> {
    let values: Vec<f64> = rows
        .iter()
        .filter_map(|r| r.motion.max_translation_mm)
        .collect();
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    Some(CohortSummary {
        rows: rows.len(),
        measured: values.len(),
        min_max_translation_mm: values.iter().copied().fold(f64::INFINITY, f64::min),
        max_max_translation_mm: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        mean_max_translation_mm: mean,
        std_max_translation_mm: var.sqrt(),
        threshold_mm,
        above_threshold: values.iter().filter(|&&v| v > threshold_mm).count(),
    })
}

pub fn log_cohort_summary(summary: &CohortSummary) {
    info!(
        rows = summary.rows,
        measured = summary.measured,
        min_mm = summary.min_max_translation_mm,
        max_mm = summary.max_max_translation_mm,
        mean_mm = summary.mean_max_translation_mm,
        sd_mm = summary.std_max_translation_mm,
        "motion qc summary"
    );
    if summary.above_threshold > 0 {
        warn!(
            count = summary.above_threshold,
            threshold_mm = summary.threshold_mm,
            "subjects above motion threshold"
        );
    }
}
