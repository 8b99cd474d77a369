use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::events::{Condition, ConditionSet};
use crate::glm::{ContrastResult, GlmBackend, GlmFit, GlmRequest};
use crate::motion::ConfoundMatrix;
use crate::subject::SubjectId;

pub fn design_matrix_file_name(subject: &SubjectId, session: &str, task: &str) -> String {
    format!("{}_ses-{}_task-{}_design-matrix.tsv", subject, session, task)
}

#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    pub columns: Vec<String>,
    pub frame_times: Vec<f64>,
    pub rows: Vec<Vec<f64>>,
}

/// Boxcar design sampled once per volume: the fraction of each TR covered
/// by a condition's events, then the nuisance columns, then a constant.
///
/// No haemodynamic convolution is applied; this is the design an
/// estimating backend would start from.
pub fn build_design_matrix(
    events: &ConditionSet,
    confounds: &ConfoundMatrix,
    n_volumes: usize,
    tr: f64,
) -> Result<DesignMatrix> {
    if confounds.n_volumes() != n_volumes {
        return Err(PipelineError::MalformedInput(format!(
            "confounds have {} rows, design needs {}",
            confounds.n_volumes(),
            n_volumes
        )));
    }

    let mut columns: Vec<String> = Condition::ALL.iter().map(|c| c.label().to_string()).collect();
    columns.extend(confounds.columns.iter().cloned());
    columns.push("constant".to_string());

    let mut frame_times = Vec::with_capacity(n_volumes);
    let mut rows = Vec::with_capacity(n_volumes);
    for vol in 0..n_volumes {
        let start = vol as f64 * tr;
        let end = start + tr;
        frame_times.push(start);

        let mut row = Vec::with_capacity(columns.len());
        for (_, cond_events) in events.iter() {
            let covered: f64 = cond_events
                .iter()
                .map(|(onset, duration)| {
                    if duration <= 0.0 {
                        if onset >= start && onset < end { tr } else { 0.0 }
                    } else {
                        (end.min(onset + duration) - start.max(onset)).max(0.0)
                    }
                })
                .sum();
            row.push((covered / tr).min(1.0));
        }
        row.extend(confounds.rows[vol].iter().copied());
        row.push(1.0);
        rows.push(row);
    }

    Ok(DesignMatrix {
        columns,
        frame_times,
        rows,
    })
}

fn write_design_matrix(path: &Path, design: &DesignMatrix) -> Result<()> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    writeln!(w, "frame_time\t{}", design.columns.join("\t"))?;
    for (t, row) in design.frame_times.iter().zip(&design.rows) {
        let values = row
            .iter()
            .map(|v| format!("{:.6}", v))
            .collect::<Vec<_>>()
            .join("\t");
        writeln!(w, "{:.3}\t{}", t, values)?;
    }
    w.flush()?;
    Ok(())
}

/// Assembles and writes the design matrix and reports which contrasts the
/// design supports. Estimation is left to a real backend.
#[derive(Debug, Default)]
pub struct DesignOnlyBackend;

impl DesignOnlyBackend {
    pub fn new() -> Self {
        Self
    }
}

impl GlmBackend for DesignOnlyBackend {
    fn name(&self) -> &'static str {
        "design-only"
    }

    fn fit(&self, request: &GlmRequest<'_>) -> Result<GlmFit> {
        let design = build_design_matrix(
            request.events,
            request.confounds,
            request.analysis_volumes,
            request.repetition_time,
        )?;
        let path = request.output_dir.join(design_matrix_file_name(
            request.subject,
            request.session,
            request.task,
        ));
        write_design_matrix(&path, &design)?;

        let contrasts = request
            .contrasts
            .iter()
            .map(|c| {
                let estimable = c.is_estimable(request.events);
                if !estimable {
                    debug!(
                        contrast = %c.name,
                        subject = %request.subject,
                        "contrast not estimable"
                    );
                }
                ContrastResult {
                    name: c.name.clone(),
                    estimable,
                    effect_map: None,
                    stat_map: None,
                }
            })
            .collect::<Vec<_>>();

        info!(
            subject = %request.subject,
            session = request.session,
            columns = design.columns.len(),
            volumes = design.rows.len(),
            "design_matrix_written"
        );
        Ok(GlmFit {
            design_matrix: Some(path),
            contrasts,
        })
    }
}
