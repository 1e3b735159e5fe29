//! The on-chain `verifier` module: entry functions, resources, events.

use blindquiz_core::profile::MoveU64;
use blindquiz_core::{CommitArgs, CurveError, CurvePoint, DecodeError, GameIds, UnlockArgs, UserProfile};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LedgerError, OracleError};
use crate::ledger::{EntryCall, Ledger, MoveArg, TxnOutcome};

pub const MODULE: &str = "verifier";

/// Quest metadata the contract stores but never interprets.
pub const QUEST_LEVEL: u64 = 1;
pub const QUEST_IMAGE: &str = "data: image blob placeholder for now";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verifier {
    package: String,
}

impl Verifier {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    fn qualified(&self, name: &str) -> String {
        format!("{}::{MODULE}::{name}", self.package)
    }

    pub fn registry_type(&self) -> String {
        self.qualified("GameRegistry")
    }

    pub fn profile_type(&self) -> String {
        self.qualified("UserProfile")
    }

    pub fn game_created_event(&self) -> String {
        self.qualified("GameCreatedEvent")
    }

    pub fn create_game(&self) -> EntryCall {
        EntryCall {
            function: self.qualified("professor_create_game"),
            args: Vec::new(),
        }
    }

    pub fn create_quest(&self, game_index: u64, question: &str, commit: &CommitArgs) -> EntryCall {
        EntryCall {
            function: self.qualified("professor_create_quest"),
            args: vec![
                MoveArg::U64(game_index),
                MoveArg::U64(QUEST_LEVEL),
                MoveArg::Str(QUEST_IMAGE.to_string()),
                MoveArg::Str(question.to_string()),
                MoveArg::Bytes(commit.proof.a.clone()),
                MoveArg::Bytes(commit.proof.b.clone()),
                MoveArg::Bytes(commit.proof.c.clone()),
                MoveArg::Bytes(commit.key_hash.clone()),
                MoveArg::Bytes(commit.x.clone()),
                MoveArg::Bytes(commit.y.clone()),
            ],
        }
    }

    pub fn score_answer(&self, quest: usize, game_index: u64, student: &str, unlock: &UnlockArgs) -> EntryCall {
        EntryCall {
            function: self.qualified("professor_score_answer"),
            args: vec![
                MoveArg::U64(quest as u64),
                MoveArg::U64(game_index),
                MoveArg::Address(student.to_string()),
                MoveArg::Bytes(unlock.proof.a.clone()),
                MoveArg::Bytes(unlock.proof.b.clone()),
                MoveArg::Bytes(unlock.proof.c.clone()),
                MoveArg::Bytes(unlock.x.clone()),
                MoveArg::Bytes(unlock.y.clone()),
            ],
        }
    }

    pub fn answer_question(
        &self,
        registry: &str,
        game_index: u64,
        quest: usize,
        commit: &CommitArgs,
        unlock: &UnlockArgs,
    ) -> EntryCall {
        EntryCall {
            function: self.qualified("student_answer_question"),
            args: vec![
                MoveArg::Address(registry.to_string()),
                MoveArg::U64(game_index),
                MoveArg::U64(quest as u64),
                MoveArg::Bytes(commit.proof.a.clone()),
                MoveArg::Bytes(commit.proof.b.clone()),
                MoveArg::Bytes(commit.proof.c.clone()),
                MoveArg::Bytes(commit.key_hash.clone()),
                MoveArg::Bytes(commit.x.clone()),
                MoveArg::Bytes(commit.y.clone()),
                MoveArg::Bytes(unlock.proof.a.clone()),
                MoveArg::Bytes(unlock.proof.b.clone()),
                MoveArg::Bytes(unlock.proof.c.clone()),
                MoveArg::Bytes(unlock.x.clone()),
                MoveArg::Bytes(unlock.y.clone()),
            ],
        }
    }

    /// 1-based game number from a `professor_create_game` transaction.
    pub fn created_game_number(&self, outcome: &TxnOutcome) -> Result<u64, LedgerError> {
        let event = outcome
            .event(&self.game_created_event())
            .ok_or_else(|| LedgerError::Response(format!("no GameCreatedEvent in {}", outcome.hash)))?;
        let number: MoveU64 = serde_json::from_value(event.data["game_number_in_registry"].clone())
            .map_err(|e| LedgerError::Response(format!("game_number_in_registry: {e}")))?;
        if number.0 == 0 {
            return Err(LedgerError::Response("game number 0".to_string()));
        }
        Ok(number.0)
    }

    pub async fn registry<L: Ledger>(
        &self,
        ledger: &L,
        owner: &str,
        at_version: Option<u64>,
    ) -> Result<GameRegistry, OracleError> {
        let data = ledger
            .resource(owner, &self.registry_type(), at_version)
            .await
            .map_err(OracleError::Read)?;
        serde_json::from_value(data)
            .map_err(|e| OracleError::Decode(DecodeError::Schema(format!("GameRegistry: {e}"))))
    }

    /// `None` until the student's first scored answer creates the profile.
    pub async fn profile<L: Ledger>(
        &self,
        ledger: &L,
        profiles_handle: &str,
        student: &str,
    ) -> Result<Option<UserProfile>, OracleError> {
        let item = ledger
            .table_item(
                profiles_handle,
                "address",
                &self.profile_type(),
                &Value::String(student.to_string()),
            )
            .await
            .map_err(OracleError::Read)?;
        item.map(|v| {
            serde_json::from_value::<UserProfile>(v)
                .map_err(|e| OracleError::Decode(DecodeError::Schema(format!("UserProfile: {e}"))))
        })
        .transpose()
    }
}

// ── Resources ───────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub handle: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionEntry {
    pub question: String,
    #[serde(rename = "professor_kP_x")]
    pub kp_x: String,
    #[serde(rename = "professor_kP_y")]
    pub kp_y: String,
}

impl QuestionEntry {
    pub fn committed_point(&self) -> Result<CurvePoint, CurveError> {
        CurvePoint::from_le_hex(&self.kp_x, &self.kp_y)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEntry {
    pub answers: TableRef,
    pub profiles: TableRef,
    #[serde(default)]
    pub questions: Vec<QuestionEntry>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRegistry {
    pub games: Vec<GameEntry>,
}

impl GameRegistry {
    /// Game by 1-based number.
    pub fn game(&self, number: u64) -> Option<&GameEntry> {
        let index = usize::try_from(number.checked_sub(1)?).ok()?;
        self.games.get(index)
    }

    pub fn game_ids(&self, number: u64) -> Option<GameIds> {
        self.game(number).map(|g| GameIds {
            number,
            profiles_handle: g.profiles.handle.clone(),
            answers_handle: g.answers.handle.clone(),
        })
    }
}
