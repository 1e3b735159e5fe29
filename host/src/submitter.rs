//! Answer submitter: one blinded answer per call, then a profile watch for the verdict.

use std::time::Duration;

use blindquiz_core::{protocol, CommitProof, PointEncoder, ProfileEvent, ProfileWatch, SecretScalar, UnlockProof};
use rand::{CryptoRng, RngCore};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::context::Context;
use crate::error::OracleError;
use crate::ledger::{Ledger, TxnOutcome};
use crate::verifier::GameRegistry;

#[derive(Clone, Debug)]
pub struct AnswerRequest {
    /// 1-based game number.
    pub game: u64,
    pub quest: usize,
    pub answer: String,
    /// Owner of the game registry.
    pub registry: String,
}

pub struct Submission {
    pub outcome: TxnOutcome,
    pub commit: CommitProof,
    pub unlock: UnlockProof,
    pub profiles_handle: String,
}

/// Blinds `req.answer` under a fresh scalar and submits both proofs. The
/// scalar is dropped on return.
#[tracing::instrument(skip_all, fields(game = req.game, quest = req.quest))]
pub async fn submit_answer<L: Ledger, I, R: RngCore + CryptoRng>(
    ctx: &Context<L, I>,
    req: &AnswerRequest,
    rng: &mut R,
) -> Result<Submission, OracleError> {
    let backend = ctx.backend.as_ref();
    let registry: GameRegistry = ctx.verifier.registry(&ctx.ledger, &req.registry, None).await?;
    let game = registry
        .game(req.game)
        .ok_or_else(|| OracleError::Config(format!("game {} does not exist", req.game)))?;
    let quest = game
        .questions
        .get(req.quest)
        .ok_or_else(|| OracleError::Config(format!("game {} has no quest {}", req.game, req.quest)))?;
    let committed = quest
        .committed_point()
        .map_err(|e| OracleError::Decode(e.into()))?;

    let scalar = SecretScalar::random(rng);
    let point = ctx
        .encoder
        .encode(&req.answer)
        .map_err(|e| OracleError::Config(e.to_string()))?;
    let commit = protocol::commit(backend, &ctx.address_field, &scalar, &point)?;
    let unlock = protocol::unlock(backend, &ctx.address_field, &scalar, &commit.key_hash, &committed)?;
    drop(scalar);
    commit.verify(backend)?;
    unlock.verify(backend)?;

    let call = ctx.verifier.answer_question(
        &req.registry,
        req.game.saturating_sub(1),
        req.quest,
        &commit.ledger_args()?,
        &unlock.ledger_args()?,
    );
    let outcome = ctx.ledger.submit(&call).await.map_err(OracleError::Submission)?;
    tracing::info!(hash = %outcome.hash, "answer submitted");
    Ok(Submission {
        outcome,
        commit,
        unlock,
        profiles_handle: game.profiles.handle.clone(),
    })
}

/// Reads the profile once to set the baseline for [`watch_verdict`].
pub async fn profile_baseline<L: Ledger, I>(
    ctx: &Context<L, I>,
    profiles_handle: &str,
) -> Result<ProfileWatch, OracleError> {
    let mut watch = ProfileWatch::new();
    let profile = ctx
        .verifier
        .profile(&ctx.ledger, profiles_handle, ctx.ledger.address())
        .await?;
    watch.observe(profile.as_ref());
    Ok(watch)
}

#[derive(Clone, Debug)]
pub struct WatchSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

/// Re-reads the signer's profile every `interval` until an event for `quest`
/// arrives. `None` on timeout or cancellation. Read errors are logged and retried.
pub async fn watch_verdict<L: Ledger, I>(
    ctx: &Context<L, I>,
    profiles_handle: &str,
    quest: usize,
    mut profile_watch: ProfileWatch,
    settings: &WatchSettings,
    mut cancel: watch::Receiver<bool>,
) -> Option<ProfileEvent> {
    let mut interval = tokio::time::interval(settings.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let deadline = tokio::time::sleep(settings.timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut deadline => {
                tracing::warn!("no verdict before timeout");
                return None;
            }
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    return None;
                }
                continue;
            }
        }

        let profile = match ctx.verifier.profile(&ctx.ledger, profiles_handle, ctx.ledger.address()).await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "profile read failed");
                continue;
            }
        };
        let mut verdict = None;
        for event in profile_watch.observe(profile.as_ref()) {
            match &event {
                ProfileEvent::AnsweredRight(q) => tracing::info!(quest = q, "answered right"),
                ProfileEvent::WrongAttempt { quest: q, count } => tracing::info!(quest = q, count, "wrong answer"),
            }
            if event.quest() == quest as u64 {
                verdict = Some(event);
            }
        }
        if verdict.is_some() {
            return verdict;
        }
    }
}
