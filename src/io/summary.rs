use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::io::write_json;
use crate::pipeline::RunSummary;

pub fn format_run_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "midt-pipeline v{}", env!("CARGO_PKG_VERSION"));
    let _ = writeln!(
        out,
        "Sessions: {}",
        if summary.sessions_processed.is_empty() {
            "none".to_string()
        } else {
            summary.sessions_processed.join(", ")
        }
    );
    let _ = writeln!(
        out,
        "Subjects: {} successful / {} total ({} fully processed)",
        summary.successful_subjects, summary.total_subjects, summary.fully_processed_subjects
    );
    match summary.success_rate() {
        Some(rate) => {
            let _ = writeln!(out, "Success rate: {:.1}%", rate * 100.0);
        }
        None => {
            let _ = writeln!(out, "Success rate: undefined (no subjects)");
        }
    }

    for session in &summary.sessions {
        let stages = session
            .stage_results
            .iter()
            .map(|r| format!("{}={:?}", r.stage_name, r.status))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(
            out,
            "  ses-{}: {}/{} {}",
            session.session, session.successful_subjects, session.total_subjects, stages
        );
    }

    if let Some(qc) = &summary.qc {
        let _ = writeln!(
            out,
            "Motion: max {:.2}-{:.2} mm, mean {:.2} ± {:.2} mm, {} above {:.1} mm",
            qc.min_max_translation_mm,
            qc.max_max_translation_mm,
            qc.mean_max_translation_mm,
            qc.std_max_translation_mm,
            qc.above_threshold,
            qc.threshold_mm
        );
    }

    if summary.failures.is_empty() {
        out.push_str("Failures: none\n");
    } else {
        let _ = writeln!(out, "Failures ({}):", summary.failures.len());
        for f in &summary.failures {
            let stage = f.stage.map(|s| s.name()).unwrap_or("session");
            let subject = f.subject.as_deref().unwrap_or("-");
            let _ = writeln!(out, "  ses-{} {} {}: {}", f.session, stage, subject, f.message);
        }
    }
    out
}

#[derive(Serialize)]
struct RunSummaryJson<'a> {
    #[serde(flatten)]
    summary: &'a RunSummary,
    success_rate: Option<f64>,
}

pub fn write_run_summary_json(path: &Path, summary: &RunSummary) -> Result<()> {
    write_json(
        path,
        &RunSummaryJson {
            summary,
            success_rate: summary.success_rate(),
        },
    )
}
