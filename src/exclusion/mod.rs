//! Exclusion rules and per-session subject list resolution.

use serde::ser::SerializeTuple;
use serde::{Deserialize, Serialize, Serializer};
use tracing::info;

use crate::subject::SubjectId;

const ALL_SESSIONS_TOKEN: &str = "all";

/// Which sessions an exclusion rule covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionScope {
    AllSessions,
    Session(String),
    Sessions(Vec<String>),
}

impl SessionScope {
    pub fn covers(&self, session: &str) -> bool {
        let session = session_key(session);
        match self {
            Self::AllSessions => true,
            Self::Session(label) => session_key(label) == session,
            Self::Sessions(labels) => labels.iter().any(|l| session_key(l) == session),
        }
    }
}

/// Session labels compare without the BIDS `ses-` prefix, so `1` and
/// `ses-1` name the same session.
pub fn session_key(label: &str) -> &str {
    let label = label.trim();
    label.strip_prefix("ses-").unwrap_or(label)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionRule {
    pub subject: String,
    pub reason: String,
    pub scope: SessionScope,
}

impl ExclusionRule {
    pub fn new(subject: impl Into<String>, reason: impl Into<String>, scope: SessionScope) -> Self {
        Self {
            subject: subject.into(),
            reason: reason.into(),
            scope,
        }
    }

    pub fn applies_to(&self, session: &str) -> bool {
        self.scope.covers(session)
    }

    /// Rule subjects are matched in canonical form when they normalize,
    /// otherwise verbatim.
    fn matches(&self, subject: &SubjectId) -> bool {
        match SubjectId::normalize(&self.subject) {
            Ok(id) => &id == subject,
            Err(_) => self.subject == subject.as_str(),
        }
    }
}

impl Serialize for SessionScope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::AllSessions => serializer.serialize_str(ALL_SESSIONS_TOKEN),
            Self::Session(label) => serializer.serialize_str(label),
            Self::Sessions(labels) => labels.serialize(serializer),
        }
    }
}

// Written back in the compact `[subject, reason, scope]` form.
impl Serialize for ExclusionRule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tup = serializer.serialize_tuple(3)?;
        tup.serialize_element(&self.subject)?;
        tup.serialize_element(&self.reason)?;
        tup.serialize_element(&self.scope)?;
        tup.end()
    }
}

/// A subject or session label; YAML often carries these as bare numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Label(pub(crate) String);

impl<'de> Deserialize<'de> for Label {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(i64),
        }
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(s) => Label(s),
            Repr::Number(n) => Label(n.to_string()),
        })
    }
}

/// Scope as written in a config file: `all`, one label, or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawScope {
    One(Label),
    Many(Vec<Label>),
}

impl From<RawScope> for SessionScope {
    fn from(raw: RawScope) -> Self {
        match raw {
            RawScope::One(Label(s)) if s.trim().eq_ignore_ascii_case(ALL_SESSIONS_TOKEN) => {
                SessionScope::AllSessions
            }
            RawScope::One(Label(s)) => SessionScope::Session(s),
            RawScope::Many(list) => SessionScope::Sessions(list.into_iter().map(|l| l.0).collect()),
        }
    }
}

fn default_scope() -> RawScope {
    RawScope::One(Label(ALL_SESSIONS_TOKEN.to_string()))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawRule {
    Triple(Label, String, RawScope),
    Record {
        subject: Label,
        #[serde(default)]
        reason: String,
        #[serde(default = "default_scope", alias = "scope")]
        sessions: RawScope,
    },
}

impl<'de> Deserialize<'de> for ExclusionRule {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let rule = match RawRule::deserialize(deserializer)? {
            RawRule::Triple(subject, reason, scope) => {
                ExclusionRule::new(subject.0, reason, scope.into())
            }
            RawRule::Record {
                subject,
                reason,
                sessions,
            } => ExclusionRule::new(subject.0, reason, sessions.into()),
        };
        Ok(rule)
    }
}

/// Effective subject list for `session`: the master list minus every
/// subject hit by a rule whose scope covers the session. Order of
/// `master` is kept; rules naming unknown subjects are ignored.
pub fn resolve(master: &[SubjectId], rules: &[ExclusionRule], session: &str) -> Vec<SubjectId> {
    let applicable: Vec<&ExclusionRule> = rules.iter().filter(|r| r.applies_to(session)).collect();
    master
        .iter()
        .filter(|subject| {
            match applicable.iter().find(|rule| rule.matches(subject)) {
                Some(rule) => {
                    info!(
                        subject = %subject,
                        session = session,
                        reason = %rule.reason,
                        "subject excluded"
                    );
                    false
                }
                None => true,
            }
        })
        .cloned()
        .collect()
}
