use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::warn;

use crate::error::{PipelineError, Result};
use crate::events::{Condition, ConditionSet};
use crate::io::table::{TextTable, parse_finite};
use crate::subject::SubjectId;

const HEADER: &str = "onset\tduration\ttrial_type";

pub fn events_file_name(subject: &SubjectId, session: &str, task: &str) -> String {
    format!("{}_ses-{}_task-{}_events.tsv", subject, session, task)
}

/// Writes a BIDS-style events table ordered by onset.
pub fn write_events_file(path: &Path, set: &ConditionSet) -> Result<()> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    writeln!(w, "{}", HEADER)?;
    for (onset, duration, condition) in set.rows_by_onset() {
        writeln!(w, "{:.3}\t{:.3}\t{}", onset, duration, condition.label())?;
    }
    w.flush()?;
    Ok(())
}

pub fn read_events_file(path: &Path) -> Result<ConditionSet> {
    if !path.exists() {
        return Err(PipelineError::InputNotFound(path.display().to_string()));
    }
    let table = TextTable::read(path)?;
    let source = path.display().to_string();
    let column = |name: &str| {
        table.column_index(name).ok_or_else(|| {
            PipelineError::MalformedInput(format!("{}: missing column '{}'", source, name))
        })
    };
    let onset_col = column("onset")?;
    let duration_col = column("duration")?;
    let type_col = column("trial_type")?;

    let mut set = ConditionSet::new();
    for (i, row) in table.rows.iter().enumerate() {
        let line = i + 2;
        let fields = (
            row.get(onset_col).and_then(|v| parse_finite(v)),
            row.get(duration_col).and_then(|v| parse_finite(v)),
            row.get(type_col),
        );
        let (Some(onset), Some(duration), Some(trial_type)) = fields else {
            return Err(PipelineError::MalformedInput(format!(
                "{}:{} incomplete event row",
                source, line
            )));
        };
        match trial_type.parse::<Condition>() {
            Ok(condition) => set.push(condition, onset, duration),
            Err(err) => warn!(file = %source, line, "{}", err),
        }
    }
    Ok(set)
}
