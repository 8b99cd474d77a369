//! Experimental conditions and their event timings.

mod events_file;
mod extract;

use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

pub use events_file::{events_file_name, read_events_file, write_events_file};
pub use extract::{CueCategory, FEEDBACK_DURATION_S, TrialLayout, classify_cue, extract};

/// The six task conditions, in design-matrix order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Condition {
    #[serde(rename = "anticip-reward")]
    AnticipReward,
    #[serde(rename = "anticip-neutral")]
    AnticipNeutral,
    #[serde(rename = "fb-reward")]
    FbReward,
    #[serde(rename = "fb-miss-reward")]
    FbMissReward,
    #[serde(rename = "fb-corr-neutral")]
    FbCorrNeutral,
    #[serde(rename = "fb-incorr-neutral")]
    FbIncorrNeutral,
}

impl Condition {
    pub const ALL: [Condition; 6] = [
        Condition::AnticipReward,
        Condition::AnticipNeutral,
        Condition::FbReward,
        Condition::FbMissReward,
        Condition::FbCorrNeutral,
        Condition::FbIncorrNeutral,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::AnticipReward => "anticip-reward",
            Self::AnticipNeutral => "anticip-neutral",
            Self::FbReward => "fb-reward",
            Self::FbMissReward => "fb-miss-reward",
            Self::FbCorrNeutral => "fb-corr-neutral",
            Self::FbIncorrNeutral => "fb-incorr-neutral",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Condition::ALL
            .iter()
            .find(|c| c.label() == s)
            .copied()
            .ok_or_else(|| format!("unknown condition '{}'", s))
    }
}

/// Parallel onset/duration sequences, in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionEvents {
    pub onsets: Vec<f64>,
    pub durations: Vec<f64>,
}

impl ConditionEvents {
    pub fn push(&mut self, onset: f64, duration: f64) {
        self.onsets.push(onset);
        self.durations.push(duration);
    }

    pub fn len(&self) -> usize {
        self.onsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.onsets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.onsets.iter().copied().zip(self.durations.iter().copied())
    }
}

/// Events for every condition. All six keys always exist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionSet {
    events: [ConditionEvents; 6],
}

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, condition: Condition) -> &ConditionEvents {
        &self.events[condition.index()]
    }

    pub fn push(&mut self, condition: Condition, onset: f64, duration: f64) {
        self.events[condition.index()].push(onset, duration);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Condition, &ConditionEvents)> {
        Condition::ALL.into_iter().map(move |c| (c, self.get(c)))
    }

    pub fn total_events(&self) -> usize {
        self.events.iter().map(|e| e.len()).sum()
    }

    pub fn count(&self, condition: Condition) -> usize {
        self.get(condition).len()
    }

    /// Moves every onset `offset_s` earlier and drops events that would
    /// start before zero. Used to align onsets with a series whose leading
    /// volumes were discarded.
    pub fn shifted(&self, offset_s: f64) -> ConditionSet {
        let mut out = ConditionSet::new();
        for (condition, events) in self.iter() {
            for (onset, duration) in events.iter() {
                let shifted = onset - offset_s;
                if shifted >= 0.0 {
                    out.push(condition, shifted, duration);
                }
            }
        }
        out
    }

    /// Flat `(onset, duration, condition)` rows ordered by onset.
    pub fn rows_by_onset(&self) -> Vec<(f64, f64, Condition)> {
        let mut rows: Vec<(f64, f64, Condition)> = self
            .iter()
            .flat_map(|(c, events)| events.iter().map(move |(o, d)| (o, d, c)))
            .collect();
        rows.sort_by(|a, b| a.0.total_cmp(&b.0));
        rows
    }
}

// Serialised as `{condition label: {onsets, durations}}`.
impl Serialize for ConditionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Condition::ALL.len()))?;
        for (condition, events) in self.iter() {
            map.serialize_entry(condition.label(), events)?;
        }
        map.end()
    }
}
