//! Oracle engine: bootstrap state machine and the scoring loop.
//!
//! ```text
//! uninitialized --create game--> game_created --upload quests--> quests_uploaded --> polling
//! ```
//!
//! Each stage is recorded in the checkpoint only after its last transaction
//! committed, so a failed stage is simply re-run from the start.

use std::time::Duration;

use blindquiz_core::{decode_attempt, latest_rows, protocol, AttemptRecord, GameIds, Quest};
use tokio::sync::watch;

use crate::checkpoint::{CheckpointStore, Stage};
use crate::context::Context;
use crate::error::OracleError;
use crate::ledger::{Indexer, Ledger, TxnOutcome};

#[derive(Clone, Debug)]
pub struct OracleSettings {
    pub upload_delay: Duration,
    pub poll_interval: Duration,
    pub auto_advance: bool,
    pub max_iterations: Option<u64>,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            upload_delay: Duration::from_secs(1),
            poll_interval: Duration::from_secs(1),
            auto_advance: false,
            max_iterations: None,
        }
    }
}

/// What a call to [`Oracle::bootstrap`] left behind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Bootstrap {
    /// A stage was completed; the process should exit and be restarted.
    Advanced(Stage),
    /// Every stage is done; polling can start.
    Ready(GameIds),
}

pub struct Oracle<'a, L, I> {
    ctx: &'a Context<L, I>,
    quests: Vec<Quest>,
    store: CheckpointStore,
    settings: OracleSettings,
}

impl<'a, L: Ledger, I: Indexer> Oracle<'a, L, I> {
    pub fn new(ctx: &'a Context<L, I>, quests: Vec<Quest>, store: CheckpointStore, settings: OracleSettings) -> Self {
        Self {
            ctx,
            quests,
            store,
            settings,
        }
    }

    // ── Bootstrap ───────────────────────────────────────────

    /// Runs the first incomplete stage, or all of them with `auto_advance`.
    pub async fn bootstrap(&self) -> Result<Bootstrap, OracleError> {
        loop {
            let stage = self.store.load()?;
            let next = match stage {
                Stage::Uninitialized => {
                    let game = self
                        .create_game()
                        .await
                        .map_err(|e| OracleError::bootstrap("create_game", e))?;
                    Stage::GameCreated { game }
                }
                Stage::GameCreated { game } => {
                    self.upload_quests(&game)
                        .await
                        .map_err(|e| OracleError::bootstrap("upload_quests", e))?;
                    Stage::QuestsUploaded { game }
                }
                Stage::QuestsUploaded { game } => return Ok(Bootstrap::Ready(game)),
            };
            self.store.advance(&next)?;
            if !self.settings.auto_advance {
                return Ok(Bootstrap::Advanced(next));
            }
        }
    }

    #[tracing::instrument(skip_all)]
    async fn create_game(&self) -> Result<GameIds, OracleError> {
        let v = &self.ctx.verifier;
        let outcome = self
            .ctx
            .ledger
            .submit(&v.create_game())
            .await
            .map_err(OracleError::Submission)?;
        let number = v.created_game_number(&outcome).map_err(OracleError::Submission)?;
        let registry = v
            .registry(&self.ctx.ledger, self.ctx.ledger.address(), Some(outcome.version))
            .await?;
        let game = registry
            .game_ids(number)
            .ok_or_else(|| OracleError::Config(format!("game {number} missing from registry")))?;
        tracing::info!(number, answers = %game.answers_handle, profiles = %game.profiles_handle, "game created");
        Ok(game)
    }

    #[tracing::instrument(skip_all, fields(game = game.number))]
    async fn upload_quests(&self, game: &GameIds) -> Result<(), OracleError> {
        let backend = self.ctx.backend.as_ref();
        for (i, quest) in self.quests.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.settings.upload_delay).await;
            }
            let commit = protocol::commit(backend, &self.ctx.address_field, &quest.key, &quest.reference)?;
            commit.verify(backend)?;
            let call = self
                .ctx
                .verifier
                .create_quest(game.index(), &quest.question, &commit.ledger_args()?);
            let outcome = self.ctx.ledger.submit(&call).await.map_err(OracleError::Submission)?;
            tracing::info!(quest = quest.index, hash = %outcome.hash, "quest uploaded");
        }
        Ok(())
    }

    // ── Polling ─────────────────────────────────────────────

    /// One pass: score the first pending attempt, if any.
    pub async fn poll_once(&self, game: &GameIds) -> Result<Option<AttemptRecord>, OracleError> {
        let rows = self
            .ctx
            .indexer
            .table_rows(&game.answers_handle)
            .await
            .map_err(OracleError::Indexer)?;
        let rows = latest_rows(rows);
        tracing::debug!(pending = rows.len(), "answers table read");

        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let Some(attempt) = decode_attempt(row, self.quests.len())? else {
            tracing::warn!(key = %row.decoded_key, "first answer row has no student; later rows wait behind it");
            return Ok(None);
        };
        self.score(game, &attempt).await?;
        Ok(Some(attempt))
    }

    #[tracing::instrument(skip_all, fields(student = %attempt.student, quest = attempt.quest))]
    async fn score(&self, game: &GameIds, attempt: &AttemptRecord) -> Result<TxnOutcome, OracleError> {
        let backend = self.ctx.backend.as_ref();
        let quest = self
            .quests
            .get(attempt.quest)
            .ok_or_else(|| OracleError::Config(format!("quest {} not loaded", attempt.quest)))?;
        let address = &self.ctx.address_field;

        // same key and point as at upload, so the same key hash
        let commit = protocol::commit(backend, address, &quest.key, &quest.reference)?;
        let unlock = protocol::unlock(backend, address, &quest.key, &commit.key_hash, &attempt.blinded)?;
        unlock.verify(backend)?;

        let call = self
            .ctx
            .verifier
            .score_answer(attempt.quest, game.index(), &attempt.student, &unlock.ledger_args()?);
        let outcome = self.ctx.ledger.submit(&call).await.map_err(OracleError::Submission)?;
        tracing::info!(hash = %outcome.hash, "answer scored");
        Ok(outcome)
    }

    /// Polls until `cancel` flips to `true` (or its sender is dropped) or
    /// `max_iterations` is reached. Each pass is followed by a full
    /// `poll_interval` of sleep. Returns the number of passes made.
    pub async fn run(&self, game: &GameIds, mut cancel: watch::Receiver<bool>) -> u64 {
        let mut iterations = 0u64;

        tracing::info!(game = game.number, quests = self.quests.len(), "polling for answers");
        loop {
            if *cancel.borrow() {
                break;
            }

            match self.poll_once(game).await {
                Ok(Some(attempt)) => tracing::debug!(student = %attempt.student, "attempt processed"),
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "poll iteration failed, retrying next cycle"),
            }
            iterations += 1;
            if self.settings.max_iterations.is_some_and(|max| iterations >= max) {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!(iterations, "polling stopped");
        iterations
    }
}
