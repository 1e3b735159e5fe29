//! Student profile decoding and change detection.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Move `u64` as the REST API renders it: a decimal string. Plain numbers are
/// accepted too.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawU64", into = "String")]
pub struct MoveU64(pub u64);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawU64 {
    Num(u64),
    Str(String),
}

impl TryFrom<RawU64> for MoveU64 {
    type Error = String;

    fn try_from(raw: RawU64) -> Result<Self, Self::Error> {
        match raw {
            RawU64::Num(n) => Ok(Self(n)),
            RawU64::Str(s) => s.trim().parse().map(Self).map_err(|_| format!("not a u64: {s:?}")),
        }
    }
}

impl From<MoveU64> for String {
    fn from(v: MoveU64) -> Self {
        v.0.to_string()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleMapEntry {
    pub key: MoveU64,
    pub value: MoveU64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleMap {
    pub data: Vec<SimpleMapEntry>,
}

/// `<package>::verifier::UserProfile`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub level: MoveU64,
    pub answered_right: Vec<MoveU64>,
    pub wrong_attempts: SimpleMap,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfileSnapshot {
    answered_right: BTreeSet<u64>,
    wrong_attempts: BTreeMap<u64, u64>,
}

impl From<&UserProfile> for ProfileSnapshot {
    fn from(p: &UserProfile) -> Self {
        Self {
            answered_right: p.answered_right.iter().map(|q| q.0).collect(),
            wrong_attempts: p.wrong_attempts.data.iter().map(|e| (e.key.0, e.value.0)).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProfileEvent {
    AnsweredRight(u64),
    WrongAttempt { quest: u64, count: u64 },
}

impl ProfileEvent {
    pub fn quest(&self) -> u64 {
        match self {
            ProfileEvent::AnsweredRight(q) => *q,
            ProfileEvent::WrongAttempt { quest, .. } => *quest,
        }
    }
}

impl fmt::Display for ProfileEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileEvent::AnsweredRight(q) => write!(f, "quest {q}: correct"),
            ProfileEvent::WrongAttempt { quest, count } => write!(f, "quest {quest}: wrong ({count} so far)"),
        }
    }
}

/// Diffs successive profile reads. The first read only sets the baseline.
#[derive(Debug, Default)]
pub struct ProfileWatch {
    last: Option<ProfileSnapshot>,
}

impl ProfileWatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` is a profile that does not exist yet and reads as empty.
    pub fn observe(&mut self, profile: Option<&UserProfile>) -> Vec<ProfileEvent> {
        let now = profile.map(ProfileSnapshot::from).unwrap_or_default();
        let Some(prev) = self.last.replace(now.clone()) else {
            return Vec::new();
        };

        let mut events: Vec<ProfileEvent> = now
            .answered_right
            .difference(&prev.answered_right)
            .map(|q| ProfileEvent::AnsweredRight(*q))
            .collect();
        events.extend(
            now.wrong_attempts
                .iter()
                .filter(|(quest, count)| prev.wrong_attempts.get(quest) != Some(count))
                .map(|(quest, count)| ProfileEvent::WrongAttempt {
                    quest: *quest,
                    count: *count,
                }),
        );
        events
    }
}

/// First quest index in `0..quest_count` not yet answered correctly.
pub fn next_unanswered(answered_right: &[MoveU64], quest_count: usize) -> Option<usize> {
    let done: BTreeSet<u64> = answered_right.iter().map(|q| q.0).collect();
    (0..quest_count).find(|i| !done.contains(&(*i as u64)))
}
