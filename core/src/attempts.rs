//! Answers-table rows: normalization and strict decoding.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::curve::{CurveError, CurvePoint};
use crate::field::{padded_address, FieldError};
use crate::types::AttemptRecord;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("row has no decoded value")]
    MissingValue,
    #[error("answer row does not match schema: {0}")]
    Schema(String),
    #[error("quest index {0:?} is not an integer")]
    QuestIndex(String),
    #[error("quest {quest} out of range ({count} quests)")]
    QuestOutOfRange { quest: usize, count: usize },
    #[error("student address: {0}")]
    Address(#[from] FieldError),
    #[error("blinded answer point: {0}")]
    Point(#[from] CurveError),
}

/// One indexer row of a ledger table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub decoded_key: Value,
    pub decoded_value: Option<Value>,
    #[serde(rename = "transaction_version")]
    pub version: u64,
}

fn key_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Key ascending, version descending, one row per key (the newest), rows
/// without a value dropped.
pub fn latest_rows(mut rows: Vec<TableRow>) -> Vec<TableRow> {
    rows.sort_by(|a, b| {
        key_text(&a.decoded_key)
            .cmp(&key_text(&b.decoded_key))
            .then(b.version.cmp(&a.version))
    });
    rows.dedup_by(|later, first| later.decoded_key == first.decoded_key);
    rows.retain(|r| matches!(&r.decoded_value, Some(v) if !v.is_null()));
    rows
}

/// Answers-table value as written by `student_answer_question`.
#[derive(Debug, Deserialize)]
struct AnswerRow {
    student_address: String,
    #[serde(rename = "student_aH_x")]
    student_ah_x: String,
    #[serde(rename = "student_aH_y")]
    student_ah_y: String,
    quest: Value,
}

fn quest_index(v: &Value) -> Result<usize, DecodeError> {
    let parsed = match v {
        Value::String(s) => s.trim().parse::<usize>().ok(),
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        _ => None,
    };
    parsed.ok_or_else(|| DecodeError::QuestIndex(key_text(v)))
}

/// Decodes an answers-table row. `Ok(None)` for rows with an empty student
/// address, which carry nothing to score.
pub fn decode_attempt(row: &TableRow, quest_count: usize) -> Result<Option<AttemptRecord>, DecodeError> {
    let value = row.decoded_value.as_ref().ok_or(DecodeError::MissingValue)?;
    let answer: AnswerRow =
        serde_json::from_value(value.clone()).map_err(|e| DecodeError::Schema(e.to_string()))?;
    if answer.student_address.trim().is_empty() {
        return Ok(None);
    }
    let quest = quest_index(&answer.quest)?;
    if quest >= quest_count {
        return Err(DecodeError::QuestOutOfRange {
            quest,
            count: quest_count,
        });
    }
    Ok(Some(AttemptRecord {
        student: padded_address(&answer.student_address)?,
        quest,
        blinded: CurvePoint::from_le_hex(&answer.student_ah_x, &answer.student_ah_y)?,
    }))
}
