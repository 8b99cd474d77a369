//! Canonical subject identifiers.
//!
//! Raw tokens (usually timing-file names) go through two ordered cascades:
//! fragment extraction, then conversion of the fragment to `sub-NNN`.
//! In both cascades the first matching rule wins.

use std::fmt;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

const CANONICAL_PREFIX: &str = "sub-";
const PAD_WIDTH: usize = 3;

static EXTRACTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"Reward_task_([^_]+)_reward",
        r"task_([^_]+)_",
        r"^([^_]+)_",
        r"([a-zA-Z]*\d+[a-zA-Z]*\d*)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static extraction pattern"))
    .collect()
});

static SESSION_CODED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z]+(\d+)s\d*$").expect("static pattern"));
static SUB_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^sub(\d+)$").expect("static pattern"));
static DIGITS_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)$").expect("static pattern"));
static CANONICAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^sub-\d{3}$").expect("static pattern"));
static CANONICAL_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^sub-[A-Za-z0-9]+$").expect("static pattern"));
static ANY_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)").expect("static pattern"));

type Conversion = fn(&str) -> Option<String>;

/// Conversion rules, tried in order against the extracted fragment.
const CONVERSIONS: &[(&str, Conversion)] = &[
    ("session_coded", session_coded),
    ("sub_digits", sub_digits),
    ("digits_only", digits_only),
    ("canonical", canonical),
    ("embedded_digits", embedded_digits),
    ("canonical_label", canonical_label),
    ("sanitized", sanitize),
];

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    /// Maps a raw token (file name, path, or bare id) to its canonical form.
    pub fn normalize(raw: &str) -> Result<Self> {
        let fragment = extract_fragment(raw)
            .ok_or_else(|| PipelineError::IdentityResolutionFailed(raw.to_string()))?;
        convert_fragment(&fragment)
            .map(SubjectId)
            .ok_or_else(|| PipelineError::IdentityResolutionFailed(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SubjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Returns the first non-empty fragment found by the extraction cascade.
///
/// Priority: task-prefixed names, leading token, any digit run, and finally
/// the whole file stem when it carries alphanumeric text.
pub fn extract_fragment(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let name = Path::new(raw)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(raw);

    for pattern in EXTRACTION_PATTERNS.iter() {
        if let Some(m) = pattern.captures(name).and_then(|c| c.get(1)) {
            if !m.as_str().is_empty() {
                return Some(m.as_str().to_string());
            }
        }
    }

    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    if stem.chars().any(|c| c.is_ascii_alphanumeric()) {
        return Some(stem.to_string());
    }
    None
}

/// Converts an extracted fragment to the canonical `sub-` form.
pub fn convert_fragment(fragment: &str) -> Option<String> {
    CONVERSIONS.iter().find_map(|(_, rule)| rule(fragment))
}

fn session_coded(fragment: &str) -> Option<String> {
    first_group(&SESSION_CODED, fragment).map(pad)
}

fn sub_digits(fragment: &str) -> Option<String> {
    first_group(&SUB_DIGITS, fragment).map(pad)
}

fn digits_only(fragment: &str) -> Option<String> {
    first_group(&DIGITS_ONLY, fragment).map(pad)
}

fn canonical(fragment: &str) -> Option<String> {
    CANONICAL
        .is_match(fragment)
        .then(|| fragment.to_string())
}

// Already-sanitized text labels such as `sub-pilot`.
fn canonical_label(fragment: &str) -> Option<String> {
    CANONICAL_LABEL
        .is_match(fragment)
        .then(|| fragment.to_string())
}

fn embedded_digits(fragment: &str) -> Option<String> {
    first_group(&ANY_DIGITS, fragment).map(pad)
}

fn first_group(re: &Regex, s: &str) -> Option<String> {
    re.captures(s)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn pad(digits: String) -> String {
    // Leading zeros are dropped first so `0042` and `42` agree.
    let trimmed = digits.trim_start_matches('0');
    let number = if trimmed.is_empty() { "0" } else { trimmed };
    format!("{}{:0>width$}", CANONICAL_PREFIX, number, width = PAD_WIDTH)
}

fn sanitize(fragment: &str) -> Option<String> {
    let clean: String = fragment
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    if clean.is_empty() {
        None
    } else {
        Some(format!("{}{}", CANONICAL_PREFIX, clean))
    }
}
