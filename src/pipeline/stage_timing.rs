use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::config::StageSettings;
use crate::error::PipelineError;
use crate::events::{self, Condition, ConditionSet, events_file_name, write_events_file};
use crate::io::read_text;
use crate::io::table::TextTable;
use crate::pipeline::{SessionCtx, Stage, StageKind};
use crate::subject::SubjectId;

type NameFilter = fn(&str) -> bool;

/// Timing-file name filters, tried in order until one matches anything.
const DISCOVERY: &[(&str, NameFilter)] = &[
    ("*task*.txt", is_task_file),
    ("Reward_task*.txt", is_reward_task_file),
    ("*.txt", is_text),
];

fn is_text(name: &str) -> bool {
    name.ends_with(".txt") || name.ends_with(".txt.gz")
}

fn is_task_file(name: &str) -> bool {
    name.contains("task") && is_text(name)
}

fn is_reward_task_file(name: &str) -> bool {
    name.starts_with("Reward_task") && is_text(name)
}

pub struct TimingStage;

impl TimingStage {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for TimingStage {
    fn kind(&self) -> StageKind {
        StageKind::Timing
    }

    fn run(&self, ctx: &mut SessionCtx<'_>) -> Result<()> {
        let settings = ctx.settings(StageKind::Timing);
        if !settings.input_dir.is_dir() {
            bail!(PipelineError::InputNotFound(format!(
                "behavioral directory {}",
                settings.input_dir.display()
            )));
        }

        let files = discover_timing_files(&settings.input_dir)?;
        if files.is_empty() {
            bail!(PipelineError::InputNotFound(format!(
                "no timing files in {}",
                settings.input_dir.display()
            )));
        }
        info!(session = %ctx.session, files = files.len(), "timing files found");

        let mut by_subject: BTreeMap<SubjectId, PathBuf> = BTreeMap::new();
        for path in files {
            let name = file_name(&path);
            match SubjectId::normalize(&name) {
                Ok(subject) => {
                    if !ctx.subjects.contains(&subject) {
                        debug!(
                            file = %name,
                            subject = %subject,
                            "timing file for subject not in session"
                        );
                        continue;
                    }
                    if let Some(previous) = by_subject.get(&subject) {
                        warn!(
                            subject = %subject,
                            kept = %previous.display(),
                            ignored = %path.display(),
                            "duplicate timing file"
                        );
                        continue;
                    }
                    by_subject.insert(subject, path);
                }
                Err(err) => {
                    warn!(file = %name, "cannot resolve subject from timing file name");
                    ctx.record_failure(StageKind::Timing, &name, &err);
                }
            }
        }

        let mut extracted = 0usize;
        for subject in ctx.subjects.clone() {
            let Some(path) = by_subject.get(&subject) else {
                warn!(session = %ctx.session, subject = %subject, "timing file missing");
                let err = PipelineError::InputNotFound(format!(
                    "timing file for {} in {}",
                    subject,
                    settings.input_dir.display()
                ));
                ctx.record_failure(StageKind::Timing, subject.as_str(), &err);
                continue;
            };
            match process_subject(&settings, &subject, path) {
                Ok((out_path, set)) => {
                    extracted += 1;
                    info!(
                        session = %ctx.session,
                        subject = %subject,
                        events = set.total_events(),
                        out = %out_path.display(),
                        "timing extracted"
                    );
                    let empty: Vec<&str> = Condition::ALL
                        .into_iter()
                        .filter(|&c| set.count(c) == 0)
                        .map(|c| c.label())
                        .collect();
                    if !empty.is_empty() {
                        warn!(
                            session = %ctx.session,
                            subject = %subject,
                            conditions = %empty.join(", "),
                            "conditions without events; dependent contrasts are not estimable"
                        );
                    }
                    ctx.log.record(StageKind::Timing.name(), subject.as_str(), "success");
                }
                Err(err) => {
                    warn!(
                        session = %ctx.session,
                        subject = %subject,
                        error = %err,
                        "timing extraction failed"
                    );
                    ctx.record_failure(StageKind::Timing, subject.as_str(), &err);
                }
            }
        }

        if extracted == 0 {
            bail!(PipelineError::StageFailed(format!(
                "no timing files could be extracted for session {}",
                ctx.session
            )));
        }
        Ok(())
    }
}

/// Lists candidate timing files, sorted by name, using the first filter
/// that matches anything.
pub fn discover_timing_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.path());
        }
    }
    names.sort();

    for (pattern, filter) in DISCOVERY {
        let found: Vec<PathBuf> = names
            .iter()
            .filter(|p| filter(&file_name(p)))
            .cloned()
            .collect();
        if !found.is_empty() {
            debug!(pattern, count = found.len(), "timing file pattern matched");
            return Ok(found);
        }
    }
    Ok(Vec::new())
}

fn process_subject(
    settings: &StageSettings,
    subject: &SubjectId,
    path: &Path,
) -> crate::error::Result<(PathBuf, ConditionSet)> {
    let content = read_text(path)?;
    let table = TextTable::parse(&content, &path.display().to_string())?;
    let set = events::extract(&table, &settings.trial_layout);
    if set.total_events() == 0 {
        return Err(PipelineError::MalformedInput(format!(
            "{}: no classifiable trials",
            path.display()
        )));
    }
    let aligned = set.shifted(settings.acquisition.dummy_offset_s());
    let out_path = settings
        .output_dir
        .join(events_file_name(subject, &settings.session, &settings.task));
    write_events_file(&out_path, &aligned)?;
    Ok((out_path, aligned))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
