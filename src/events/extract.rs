use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::events::{Condition, ConditionSet};
use crate::io::table::{TextTable, parse_finite, parse_number};

/// Fixed duration assigned to every feedback event, in seconds.
pub const FEEDBACK_DURATION_S: f64 = 2.0;

const MS_PER_S: f64 = 1000.0;

/// Where the real trials and their fields sit in a timing export.
///
/// Rows are 1-based data rows (the header is not counted); columns are
/// 0-based positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialLayout {
    pub first_trial_row: usize,
    pub last_trial_row: usize,
    pub cue_type_column: usize,
    pub accuracy_column: usize,
    pub cue_onset_column: usize,
    pub cue_offset_column: usize,
    pub feedback_onset_column: usize,
}

impl Default for TrialLayout {
    fn default() -> Self {
        Self {
            first_trial_row: 21,
            last_trial_row: 80,
            cue_type_column: 2,
            accuracy_column: 3,
            cue_onset_column: 9,
            cue_offset_column: 10,
            feedback_onset_column: 11,
        }
    }
}

impl TrialLayout {
    fn required_width(&self) -> usize {
        [
            self.cue_type_column,
            self.accuracy_column,
            self.cue_onset_column,
            self.cue_offset_column,
            self.feedback_onset_column,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
            + 1
    }

    /// 0-based row indices of the analysis window, clipped to `n_rows`.
    fn window(&self, n_rows: usize) -> std::ops::Range<usize> {
        let start = self.first_trial_row.saturating_sub(1);
        let end = self.last_trial_row.min(n_rows);
        start..end.max(start)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CueCategory {
    Reward,
    Neutral,
}

impl CueCategory {
    fn anticipation(&self) -> Condition {
        match self {
            Self::Reward => Condition::AnticipReward,
            Self::Neutral => Condition::AnticipNeutral,
        }
    }

    fn feedback(&self, hit: bool) -> Condition {
        match (self, hit) {
            (Self::Reward, true) => Condition::FbReward,
            (Self::Reward, false) => Condition::FbMissReward,
            (Self::Neutral, true) => Condition::FbCorrNeutral,
            (Self::Neutral, false) => Condition::FbIncorrNeutral,
        }
    }
}

/// Reward cues show a smiley; neutral cues are labelled as such.
pub fn classify_cue(cue_type: &str) -> Option<CueCategory> {
    let cue = cue_type.to_ascii_lowercase();
    if cue.contains("smile") {
        Some(CueCategory::Reward)
    } else if cue.contains("neutral") {
        Some(CueCategory::Neutral)
    } else {
        None
    }
}

/// Builds the six condition event lists from a raw trial table.
///
/// Only rows inside the layout's analysis window count. Rows that are too
/// short or carry unreadable timestamps are skipped with a warning; rows
/// with an unknown cue type are skipped silently.
pub fn extract(table: &TextTable, layout: &TrialLayout) -> ConditionSet {
    let mut set = ConditionSet::new();
    let width = layout.required_width();

    for row_idx in layout.window(table.len()) {
        let Some(row) = table.rows.get(row_idx) else {
            continue;
        };
        if row.len() < width {
            warn!(
                row = row_idx + 1,
                columns = row.len(),
                required = width,
                "trial row too short, skipped"
            );
            continue;
        }

        let Some(category) = classify_cue(&row[layout.cue_type_column]) else {
            debug!(row = row_idx + 1, cue = %row[layout.cue_type_column], "unrecognised cue type");
            continue;
        };

        let timestamps = (
            parse_finite(&row[layout.cue_onset_column]),
            parse_finite(&row[layout.cue_offset_column]),
            parse_finite(&row[layout.feedback_onset_column]),
        );
        let (Some(cue_on), Some(cue_off), Some(feedback_on)) = timestamps else {
            warn!(row = row_idx + 1, "trial timestamps unreadable, skipped");
            continue;
        };
        let cue_on = cue_on / MS_PER_S;
        let cue_off = cue_off / MS_PER_S;
        let feedback_on = feedback_on / MS_PER_S;

        set.push(category.anticipation(), cue_on, cue_off - cue_on);

        let accuracy = parse_number(&row[layout.accuracy_column]).unwrap_or(f64::NAN);
        if accuracy == 1.0 {
            set.push(category.feedback(true), feedback_on, FEEDBACK_DURATION_S);
        } else if accuracy == 0.0 {
            set.push(category.feedback(false), feedback_on, FEEDBACK_DURATION_S);
        }
    }

    set
}
