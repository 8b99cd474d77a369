use std::fs;

use midt_pipeline::error::PipelineError;
use midt_pipeline::io::table::TextTable;
use midt_pipeline::motion::{
    ConfoundMatrix, DEFAULT_MOTION_PARAMS, compute_motion_qc, extract, read_confound_table,
    read_regressors, select_columns, validate_regressors, write_regressors,
};
use tempfile::TempDir;

fn params() -> Vec<String> {
    DEFAULT_MOTION_PARAMS.iter().map(|s| s.to_string()).collect()
}

/// `rows` volumes; trans_x = row index, everything else zero.
fn confounds(rows: usize) -> TextTable {
    let mut text = String::from("global_signal\ttrans_x\ttrans_y\ttrans_z\trot_x\trot_y\trot_z\n");
    for i in 0..rows {
        text.push_str(&format!("100\t{}\t0\t0\t0\t0\t0\n", i));
    }
    TextTable::parse(&text, "fixture").unwrap()
}

#[test]
fn dummy_scans_are_dropped_from_every_column() {
    let table = confounds(10);
    for dummy in [0, 3, 10] {
        let out = extract(&table, dummy, &params()).unwrap();
        assert_eq!(out.matrix.n_volumes(), 10 - dummy);
        assert_eq!(out.matrix.n_columns(), 6);
        if dummy < 10 {
            assert_eq!(out.matrix.rows[0][0], dummy as f64);
        }
    }
}

#[test]
fn too_many_dummy_scans_is_malformed() {
    let err = extract(&confounds(4), 5, &params()).unwrap_err();
    assert!(matches!(err, PipelineError::MalformedInput(_)));
}

#[test]
fn missing_columns_are_omitted() {
    let text = "trans_x\trot_z\n0.1\t0.01\n0.2\t0.02\n";
    let table = TextTable::parse(text, "fixture").unwrap();
    let out = extract(&table, 0, &params()).unwrap();
    assert_eq!(out.matrix.columns, vec!["trans_x", "rot_z"]);
    assert_eq!(out.missing_columns, vec!["trans_y", "trans_z", "rot_x", "rot_y"]);
}

#[test]
fn no_matching_columns_is_malformed() {
    let table = TextTable::parse("csf\twhite_matter\n1\t2\n", "fixture").unwrap();
    let err = extract(&table, 0, &params()).unwrap_err();
    assert!(matches!(err, PipelineError::MalformedInput(_)));
}

#[test]
fn na_cells_read_as_nan() {
    let table = TextTable::parse("trans_x\ttrans_y\nn/a\tn/a\n3\t4\n", "fixture").unwrap();
    let out = extract(&table, 0, &params()).unwrap();
    assert!(out.matrix.has_nan());
    assert_eq!(out.qc.max_translation_mm, Some(5.0));
    assert_eq!(out.qc.mean_translation_mm, Some(5.0));
}

#[test]
fn qc_uses_translation_magnitude() {
    let table = TextTable::parse(
        "trans_x\ttrans_y\ttrans_z\trot_x\n3\t4\t0\t0.0\n0\t0\t0\t0.1\n",
        "fixture",
    )
    .unwrap();
    let qc = extract(&table, 0, &params()).unwrap().qc;
    assert_eq!(qc.volume_count, 2);
    assert_eq!(qc.max_translation_mm, Some(5.0));
    assert_eq!(qc.mean_translation_mm, Some(2.5));
    assert_eq!(qc.std_translation_mm, Some(2.5));
    let rot = qc.max_rotation_deg.unwrap();
    assert!((rot - 0.1f64.to_degrees()).abs() < 1e-9);
}

#[test]
fn qc_is_undefined_without_translation_columns() {
    let matrix = ConfoundMatrix {
        columns: vec!["rot_x".to_string()],
        rows: vec![vec![0.0], vec![0.0]],
    };
    let qc = compute_motion_qc(&matrix);
    assert_eq!(qc.max_translation_mm, None);
    assert_eq!(qc.mean_translation_mm, None);
    assert_eq!(qc.std_translation_mm, None);
    assert_eq!(qc.max_rotation_deg, Some(0.0));
}

#[test]
fn validation_checks_rows_and_flags_extremes() {
    let matrix = ConfoundMatrix {
        columns: vec!["trans_x".to_string(), "rot_x".to_string()],
        rows: vec![vec![25.0, 0.0], vec![f64::NAN, 0.0]],
    };
    let err = validate_regressors(&matrix, 3).unwrap_err();
    assert!(matches!(err, PipelineError::MalformedInput(_)));

    let warnings = validate_regressors(&matrix, 2).unwrap();
    assert_eq!(warnings.len(), 2);
    assert!(warnings.iter().any(|w| w.contains("NaN")));
    assert!(warnings.iter().any(|w| w.contains("25.00")));
}

#[test]
fn regressor_file_round_trip() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("regressors.txt");
    let out = extract(&confounds(5), 2, &params()).unwrap();
    write_regressors(&path, &out.matrix).unwrap();

    let first = fs::read_to_string(&path).unwrap().lines().next().unwrap().to_string();
    assert_eq!(first, "2.000000 0.000000 0.000000 0.000000 0.000000 0.000000");

    let back = read_regressors(&path, &params()).unwrap();
    assert_eq!(back, out.matrix);
}

#[test]
fn regressor_columns_follow_the_confound_header() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("regressors.txt");
    let table = TextTable::parse(
        "trans_x\ttrans_z\trot_x\trot_y\trot_z\n0.1\t0.2\t30\t0\t0\n",
        "fixture",
    )
    .unwrap();
    let out = extract(&table, 0, &params()).unwrap();
    write_regressors(&path, &out.matrix).unwrap();

    let selection = select_columns(&table, &params());
    assert_eq!(selection.missing, vec!["trans_y"]);
    assert_eq!(selection.indices, vec![0, 1, 2, 3, 4]);
    let back = read_regressors(&path, &selection.columns).unwrap();
    assert_eq!(back.columns, vec!["trans_x", "trans_z", "rot_x", "rot_y", "rot_z"]);
    assert!(validate_regressors(&back, 1).unwrap().is_empty());

    let err = read_regressors(&path, &params()).unwrap_err();
    assert!(matches!(err, PipelineError::MalformedInput(_)));
}

#[test]
fn missing_confound_table_is_input_not_found() {
    let tmp = TempDir::new().unwrap();
    let err = read_confound_table(&tmp.path().join("absent.tsv")).unwrap_err();
    assert!(matches!(err, PipelineError::InputNotFound(_)));
}
