use serde::{Deserialize, Serialize};

use crate::curve::{CurveError, CurvePoint, SecretScalar};
use crate::encode::{EncodeError, PointEncoder};

// ── Quests ──────────────────────────────────────────────────

/// One entry of the oracle's quest file. Holds the plaintext answer and the
/// secret key, so the file never leaves the oracle host.
#[derive(Clone, Serialize, Deserialize)]
pub struct QuestSpec {
    pub question: String,
    pub answer: String,
    /// Decimal scalar below the subgroup order.
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuestError {
    #[error("quest {index}: bad key: {source}")]
    Key { index: usize, source: CurveError },
    #[error("quest {index}: {source}")]
    Encode { index: usize, source: EncodeError },
}

/// A quest as held by the oracle: immutable once uploaded.
#[derive(Clone, Debug)]
pub struct Quest {
    pub index: usize,
    pub question: String,
    pub reference: CurvePoint,
    pub key: SecretScalar,
}

impl Quest {
    pub fn from_spec<E: PointEncoder + ?Sized>(
        index: usize,
        spec: &QuestSpec,
        encoder: &E,
    ) -> Result<Self, QuestError> {
        let key = SecretScalar::from_decimal(&spec.key).map_err(|source| QuestError::Key { index, source })?;
        let reference = encoder
            .encode(&spec.answer)
            .map_err(|source| QuestError::Encode { index, source })?;
        Ok(Self {
            index,
            question: spec.question.clone(),
            reference,
            key,
        })
    }

    /// `key·reference`, the point published at upload time.
    pub fn committed_point(&self) -> CurvePoint {
        self.reference.mul(&self.key)
    }
}

pub fn load_quests<E: PointEncoder + ?Sized>(
    specs: &[QuestSpec],
    encoder: &E,
) -> Result<Vec<Quest>, QuestError> {
    specs
        .iter()
        .enumerate()
        .map(|(i, s)| Quest::from_spec(i, s, encoder))
        .collect()
}

// ── Game ────────────────────────────────────────────────────

/// Identifiers of a created game. `number` is the 1-based position in the
/// registry; entry functions take the 0-based index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameIds {
    pub number: u64,
    pub profiles_handle: String,
    pub answers_handle: String,
}

impl GameIds {
    pub fn index(&self) -> u64 {
        self.number.saturating_sub(1)
    }
}

// ── Attempts ────────────────────────────────────────────────

/// A pending answer, decoded from the answers table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttemptRecord {
    /// `0x` + 64 hex digits.
    pub student: String,
    pub quest: usize,
    pub blinded: CurvePoint,
}
