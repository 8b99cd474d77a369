use std::fs;
use std::path::{Path, PathBuf};

use midt_pipeline::config::{
    self, BackendConfig, OutputLayout, PipelineConfig, RawConfig, StageSettings,
};
use midt_pipeline::error::PipelineError;
use midt_pipeline::exclusion::SessionScope;
use midt_pipeline::pipeline::StageKind;
use tempfile::TempDir;

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

fn minimal_raw(root: &Path) -> RawConfig {
    RawConfig {
        base_dir: Some(root.join("analysis")),
        behavioral_dir: Some(root.join("behavioral")),
        fmriprep_dir: Some(root.join("fmriprep")),
        subject_ids: Some(vec!["sub-001".to_string()]),
        ..RawConfig::default()
    }
}

fn assert_invalid(result: Result<PipelineConfig, PipelineError>) {
    match result {
        Err(PipelineError::ConfigurationInvalid(_)) => {}
        other => panic!("expected ConfigurationInvalid, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn defaults_are_applied_once() {
    let tmp = TempDir::new().unwrap();
    let path = write(
        tmp.path(),
        "config.yaml",
        "base_dir: /data/study\nbehavioral_dir: /data/behav\nfmriprep_dir: /data/fmriprep\nsubject_ids: [sub-001, ld2s1, 3]\n",
    );
    let cfg = PipelineConfig::load(&path).unwrap();

    let ids: Vec<&str> = cfg.subject_ids.iter().map(|s| s.as_str()).collect();
    assert_eq!(ids, ["sub-001", "sub-002", "sub-003"]);
    assert_eq!(cfg.sessions_to_process, vec!["1"]);
    assert_eq!(cfg.acquisition.repetition_time, 1.6);
    assert_eq!(cfg.acquisition.volume_count, 367);
    assert_eq!(cfg.acquisition.dummy_scan_count, 5);
    assert_eq!(cfg.acquisition.analysis_volumes(), 362);
    assert_eq!(cfg.acquisition.smoothing_kernel_size, 6);
    assert_eq!(cfg.acquisition.high_pass_filter_cutoff, 128.0);
    assert!(cfg.stages.timing && cfg.stages.motion && cfg.stages.model_fit);
    assert_eq!(cfg.motion_param_names.len(), 6);
    assert_eq!(cfg.task, "MIDT");
    assert_eq!(cfg.contrasts.len(), 12);
    assert_eq!(cfg.backend, BackendConfig::DesignOnly);
    assert_eq!(cfg.threads, 1);
    assert!(cfg.processing_log);
    assert_eq!(cfg.layout.timing_dir, PathBuf::from("/data/study/timing_files"));
    assert_eq!(cfg.layout.qc_dir, PathBuf::from("/data/study/quality_control"));
    assert_eq!(cfg.processing_log_path(), PathBuf::from("/data/study/processing.log"));
}

#[test]
fn legacy_aliases_and_exclusions_are_accepted() {
    let tmp = TempDir::new().unwrap();
    let body = r#"
base_dir: /data/study
behavioral_dir: /data/behav
fmriprep_dir: /data/fmriprep
subject_ids: [sub-001, sub-002]
sessions_to_process: [ses-1, 2]
tr: 2.0
n_volumes: 200
dummy_scans: 4
smooth_fwhm: 8
hpf: 100
run_first_level: false
motion_params: [trans_x, trans_y, trans_z]
excluded_subjects:
  - [sub-002, "excessive motion", "2"]
  - {subject: sub-001, reason: "pilot", sessions: all}
"#;
    let cfg = PipelineConfig::load(&write(tmp.path(), "config.yml", body)).unwrap();
    assert_eq!(cfg.sessions_to_process, vec!["1", "2"]);
    assert_eq!(cfg.acquisition.repetition_time, 2.0);
    assert_eq!(cfg.acquisition.analysis_volumes(), 196);
    assert_eq!(cfg.acquisition.dummy_offset_s(), 8.0);
    assert_eq!(cfg.acquisition.smoothing_kernel_size, 8);
    assert!(!cfg.stage_enabled(StageKind::ModelFit));
    assert!(cfg.stage_enabled(StageKind::Timing));
    assert_eq!(cfg.motion_param_names.len(), 3);
    assert_eq!(cfg.excluded_subjects.len(), 2);
    assert_eq!(cfg.excluded_subjects[1].scope, SessionScope::AllSessions);
}

#[test]
fn json_configs_load() {
    let tmp = TempDir::new().unwrap();
    let body = r#"{"base_dir": "/d", "behavioral_dir": "/b", "fmriprep_dir": "/f",
        "subject_ids": ["sub-010"], "threads": 4, "glm_backend": "command",
        "glm_command": ["fit-glm", "--quiet"]}"#;
    let cfg = PipelineConfig::load(&write(tmp.path(), "config.json", body)).unwrap();
    assert_eq!(cfg.threads, 4);
    assert_eq!(
        cfg.backend,
        BackendConfig::Command {
            program: "fit-glm".to_string(),
            args: vec!["--quiet".to_string()],
        }
    );
}

#[test]
fn invalid_configurations_are_rejected() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    let mut raw = minimal_raw(root);
    raw.subject_ids = None;
    assert_invalid(PipelineConfig::from_raw(raw));

    let mut raw = minimal_raw(root);
    raw.base_dir = Some(PathBuf::from("/path/to/your/analysis"));
    assert_invalid(PipelineConfig::from_raw(raw));

    let mut raw = minimal_raw(root);
    raw.volume_count = Some(5);
    raw.dummy_scan_count = Some(5);
    assert_invalid(PipelineConfig::from_raw(raw));

    let mut raw = minimal_raw(root);
    raw.repetition_time = Some(0.0);
    assert_invalid(PipelineConfig::from_raw(raw));

    let mut raw = minimal_raw(root);
    raw.sessions_to_process = Some(Vec::new());
    assert_invalid(PipelineConfig::from_raw(raw));

    let mut raw = minimal_raw(root);
    raw.motion_param_names = Some(Vec::new());
    assert_invalid(PipelineConfig::from_raw(raw));

    let mut raw = minimal_raw(root);
    raw.subject_ids = Some(vec!["--".to_string()]);
    assert_invalid(PipelineConfig::from_raw(raw));

    let mut raw = minimal_raw(root);
    raw.glm_backend = Some(config::BackendKind::Command);
    assert_invalid(PipelineConfig::from_raw(raw));
}

#[test]
fn bad_contrasts_are_rejected() {
    let tmp = TempDir::new().unwrap();
    let base = "base_dir: /d\nbehavioral_dir: /b\nfmriprep_dir: /f\nsubject_ids: [1]\n";

    let short = format!("{}contrasts:\n  - {{name: short, weights: [1, -1, 0]}}\n", base);
    assert_invalid(PipelineConfig::load(&write(tmp.path(), "short.yaml", &short)));

    let dup = format!(
        "{}contrasts:\n  - {{name: a, weights: [1, -1, 0, 0, 0, 0]}}\n  - {{name: a, weights: [0, 0, 1, -1, 0, 0]}}\n",
        base
    );
    assert_invalid(PipelineConfig::load(&write(tmp.path(), "dup.yaml", &dup)));

    let ok = format!("{}contrasts:\n  - {{name: reward, weights: [1, 0, 0, 0, 0, 0]}}\n", base);
    let cfg = PipelineConfig::load(&write(tmp.path(), "ok.yaml", &ok)).unwrap();
    assert_eq!(cfg.contrasts.len(), 1);
    assert_eq!(cfg.contrasts[0].weights, [1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
}

#[test]
fn unknown_format_and_fields_are_rejected() {
    let tmp = TempDir::new().unwrap();
    assert_invalid(PipelineConfig::load(&write(tmp.path(), "config.toml", "x = 1")));
    assert_invalid(PipelineConfig::load(&tmp.path().join("missing.yaml")));
    let typo =
        "base_dir: /d\nbehavioral_dir: /b\nfmriprep_dir: /f\nsubject_ids: [1]\nsesions: [1]\n";
    assert_invalid(PipelineConfig::load(&write(tmp.path(), "typo.yaml", typo)));
}

#[test]
fn missing_input_directories_are_not_config_errors() {
    let tmp = TempDir::new().unwrap();
    let cfg = PipelineConfig::from_raw(minimal_raw(tmp.path())).unwrap();
    assert!(!cfg.behavioral_dir.exists());
}

#[test]
fn stage_settings_are_derived_per_stage_and_session() {
    let tmp = TempDir::new().unwrap();
    let cfg = PipelineConfig::from_raw(minimal_raw(tmp.path())).unwrap();
    let analysis = tmp.path().join("analysis");

    let timing = StageSettings::builder(&cfg, StageKind::Timing, "ses-2").build();
    assert_eq!(timing.session, "2");
    assert_eq!(timing.session_label(), "ses-2");
    assert_eq!(timing.input_dir, cfg.behavioral_dir);
    assert_eq!(timing.output_dir, analysis.join("timing_files").join("ses-2"));

    let motion = StageSettings::builder(&cfg, StageKind::Motion, "1")
        .threads(0)
        .build();
    assert_eq!(motion.input_dir, cfg.fmriprep_dir);
    assert_eq!(motion.output_dir, analysis.join("motion_regressors").join("ses-1"));
    assert_eq!(motion.threads, 1);

    let custom = StageSettings::builder(&cfg, StageKind::ModelFit, "1")
        .output_dir(tmp.path().join("elsewhere"))
        .build();
    assert_eq!(custom.output_dir, tmp.path().join("elsewhere"));
    assert_eq!(cfg.layout.first_level_dir, analysis.join("first_level_results"));
}

#[test]
fn layout_materialize_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let cfg = PipelineConfig::from_raw(minimal_raw(tmp.path())).unwrap();
    cfg.layout.materialize("1").unwrap();
    cfg.layout.materialize("1").unwrap();
    for root in cfg.layout.roots() {
        assert!(OutputLayout::session_dir(root, "1").is_dir());
    }
}

#[test]
fn example_config_needs_editing() {
    let tmp = TempDir::new().unwrap();
    let yaml = config::to_yaml(&config::example_config()).unwrap();
    assert!(yaml.contains("repetition_time: 1.6"));
    let path = write(tmp.path(), "template.yaml", &yaml);
    let raw = config::load_raw(&path).unwrap();
    assert_eq!(raw.subject_ids.as_ref().map(|s| s.len()), Some(3));
    assert_invalid(PipelineConfig::from_raw(raw));
}
