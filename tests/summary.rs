use std::path::PathBuf;

use midt_pipeline::error::ErrorKind;
use midt_pipeline::glm::{ContrastResult, GlmFit};
use midt_pipeline::io::summary::{format_run_summary, write_run_summary_json};
use midt_pipeline::pipeline::{
    FailedItem, FitSummary, RunSummary, RunnerState, SessionSummary, StageKind, StageResult,
    StageStatus,
};
use midt_pipeline::motion::MotionQc;
use midt_pipeline::qc::{QcMetric, cohort_summary};
use midt_pipeline::subject::SubjectId;
use tempfile::TempDir;

fn session(label: &str) -> SessionSummary {
    SessionSummary {
        session: label.to_string(),
        total_subjects: 2,
        successful_subjects: 2,
        state: RunnerState::Done,
        error: None,
        stage_results: vec![StageResult {
            stage_name: "timing_extraction",
            status: StageStatus::Success,
            message: "2 subjects, 1 failed items".to_string(),
        }],
        failed_items: vec![FailedItem {
            subject: "sub-002".to_string(),
            stage: StageKind::Timing,
            kind: ErrorKind::InputNotFound,
            message: "input not found: timing file".to_string(),
        }],
        fully_processed: vec![SubjectId::normalize("sub-001").unwrap()],
        fits: vec![FitSummary::new(SubjectId::normalize("sub-001").unwrap(), &fit())],
    }
}

fn fit() -> GlmFit {
    let contrast = |name: &str, estimable| ContrastResult {
        name: name.to_string(),
        estimable,
        effect_map: None,
        stat_map: None,
    };
    GlmFit {
        design_matrix: Some(PathBuf::from("sub-001_ses-1_task-MIDT_design-matrix.tsv")),
        contrasts: vec![
            contrast("anticip-reward", true),
            contrast("fb-reward", false),
        ],
    }
}

#[test]
fn fit_summary_counts_estimable_contrasts() {
    let summary = FitSummary::new(SubjectId::normalize("sub-001").unwrap(), &fit());
    assert_eq!(summary.estimable_contrasts, 1);
    assert_eq!(summary.total_contrasts, 2);
    assert_eq!(
        summary.design_matrix.as_deref(),
        Some(std::path::Path::new("sub-001_ses-1_task-MIDT_design-matrix.tsv"))
    );
}

#[test]
fn summary_format() {
    let mut summary = RunSummary::default();
    summary.push_session(session("1"));

    let s = format_run_summary(&summary);
    assert!(s.contains("midt-pipeline v"));
    assert!(s.contains("Sessions: 1"));
    assert!(s.contains("Subjects: 2 successful / 2 total (1 fully processed)"));
    assert!(s.contains("Success rate: 100.0%"));
    assert!(s.contains("ses-1: 2/2 timing_extraction=Success"));
    assert!(s.contains("Failures (1):"));
    assert!(s.contains("ses-1 timing_extraction sub-002: input not found"));
}

#[test]
fn session_errors_and_failed_stages_become_failure_records() {
    let mut summary = RunSummary::default();
    let mut broken = session("2");
    broken.failed_items.clear();
    broken.successful_subjects = 0;
    broken.state = RunnerState::Failed(StageKind::Motion);
    broken.stage_results.push(StageResult {
        stage_name: "motion_extraction",
        status: StageStatus::Failed,
        message: "input not found: fMRIPrep directory".to_string(),
    });
    summary.push_session(broken);

    let mut unreadable = session("3");
    unreadable.failed_items.clear();
    unreadable.stage_results.clear();
    unreadable.fully_processed.clear();
    unreadable.successful_subjects = 0;
    unreadable.state = RunnerState::Pending;
    unreadable.error = Some("permission denied".to_string());
    summary.push_session(unreadable);

    assert_eq!(summary.failures.len(), 2);
    assert_eq!(summary.failures[0].stage, Some(StageKind::Motion));
    assert_eq!(summary.failures[0].subject, None);
    assert_eq!(summary.failures[1].stage, None);
    assert_eq!(summary.failures[1].message, "permission denied");
    assert_eq!(summary.success_rate(), Some(0.0));
    assert_eq!(summary.sessions[0].failed_stage().map(|r| r.stage_name), Some("motion_extraction"));

    let s = format_run_summary(&summary);
    assert!(s.contains("ses-3 session -: permission denied"));
}

#[test]
fn zero_subjects_has_undefined_rate() {
    let summary = RunSummary::default();
    assert_eq!(summary.success_rate(), None);
    let s = format_run_summary(&summary);
    assert!(s.contains("Sessions: none"));
    assert!(s.contains("Success rate: undefined (no subjects)"));
    assert!(s.contains("Failures: none"));
}

#[test]
fn motion_line_and_json_output() {
    let tmp = TempDir::new().unwrap();
    let mut summary = RunSummary::default();
    summary.push_session(session("1"));
    let rows = vec![
        QcMetric::new(
            SubjectId::normalize("sub-001").unwrap(),
            "1",
            MotionQc {
                volume_count: 10,
                max_translation_mm: Some(1.0),
                mean_translation_mm: Some(0.5),
                std_translation_mm: Some(0.1),
                max_rotation_deg: Some(0.2),
                mean_rotation_deg: Some(0.1),
            },
        ),
        QcMetric::new(
            SubjectId::normalize("sub-002").unwrap(),
            "1",
            MotionQc {
                volume_count: 10,
                max_translation_mm: Some(3.0),
                mean_translation_mm: Some(1.5),
                std_translation_mm: Some(0.4),
                max_rotation_deg: Some(0.9),
                mean_rotation_deg: Some(0.3),
            },
        ),
    ];
    summary.qc = cohort_summary(&rows, 2.0);
    let s = format_run_summary(&summary);
    assert!(s.contains("Motion: max 1.00-3.00 mm, mean 2.00 ± 1.00 mm, 1 above 2.0 mm"));

    let path = tmp.path().join("summary.json");
    write_run_summary_json(&path, &summary).unwrap();
    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["success_rate"], 1.0);
    assert_eq!(value["qc"]["above_threshold"], 1);
    assert_eq!(value["failures"][0]["kind"], "input_not_found");
    assert_eq!(value["sessions"][0]["fully_processed"][0], "sub-001");
    assert_eq!(value["sessions"][0]["fits"][0]["subject"], "sub-001");
    assert_eq!(value["sessions"][0]["fits"][0]["estimable_contrasts"], 1);
    assert_eq!(value["sessions"][0]["fits"][0]["total_contrasts"], 2);
}
