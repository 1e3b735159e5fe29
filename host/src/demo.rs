//! Full round trip on an in-memory ledger with the transparent backend.

use std::path::Path;

use blindquiz_core::{load_quests, ProfileEvent, QuestSpec, SecretScalar, TransparentBackend, TryAndIncrement};

use crate::checkpoint::CheckpointStore;
use crate::context::Context;
use crate::error::OracleError;
use crate::ledger::{Ledger, MemoryLedger};
use crate::oracle::{Bootstrap, Oracle, OracleSettings};
use crate::submitter::{profile_baseline, submit_answer, AnswerRequest};
use crate::verifier::Verifier;

pub const DEMO_PACKAGE: &str = "0xcafe";

pub fn demo_quests() -> Vec<QuestSpec> {
    let mut rng = rand::thread_rng();
    [
        ("In which language are Aptos smart contracts written? A) Solidity, B) Rust, C) Move, D) Python", "C"),
        ("Aptos mainnet launched in which year? A) 2020, B) 2021, C) 2022, D) 2023", "C"),
    ]
    .into_iter()
    .map(|(question, answer)| QuestSpec {
        question: question.to_string(),
        answer: answer.to_string(),
        key: SecretScalar::random(&mut rng).to_decimal(),
    })
    .collect()
}

/// Each answer comes from its own student and targets quest 0.
pub async fn run(answers: &[String], state_dir: &Path) -> Result<Vec<(String, Option<ProfileEvent>)>, OracleError> {
    let ledger = MemoryLedger::new(DEMO_PACKAGE, DEMO_PACKAGE);
    let oracle_ctx = Context::new(
        ledger.clone(),
        ledger.clone(),
        Box::new(TransparentBackend),
        Verifier::new(DEMO_PACKAGE),
    )?;
    let quests =
        load_quests(&demo_quests(), &TryAndIncrement).map_err(|e| OracleError::Config(e.to_string()))?;
    let store = CheckpointStore::for_network(state_dir, "demo");
    let settings = OracleSettings {
        auto_advance: true,
        upload_delay: std::time::Duration::ZERO,
        ..OracleSettings::default()
    };
    let oracle = Oracle::new(&oracle_ctx, quests, store, settings);
    let Bootstrap::Ready(game) = oracle.bootstrap().await? else {
        return Err(OracleError::Config("bootstrap did not finish".to_string()));
    };

    let mut rng = rand::thread_rng();
    let mut verdicts = Vec::new();
    for (i, answer) in answers.iter().enumerate() {
        let student = ledger.signer(&format!("0x{:x}", 0xb000 + i));
        let ctx = Context::new(
            student.clone(),
            student,
            Box::new(TransparentBackend),
            Verifier::new(DEMO_PACKAGE),
        )?;
        let mut watch = profile_baseline(&ctx, &game.profiles_handle).await?;
        let req = AnswerRequest {
            game: game.number,
            quest: 0,
            answer: answer.clone(),
            registry: DEMO_PACKAGE.to_string(),
        };
        submit_answer(&ctx, &req, &mut rng).await?;
        oracle.poll_once(&game).await?;

        let profile = ctx
            .verifier
            .profile(&ctx.ledger, &game.profiles_handle, ctx.ledger.address())
            .await?;
        let verdict = watch.observe(profile.as_ref()).into_iter().find(|e| e.quest() == 0);
        match &verdict {
            Some(ProfileEvent::AnsweredRight(_)) => tracing::info!(answer = %answer, "correct"),
            Some(ProfileEvent::WrongAttempt { count, .. }) => tracing::info!(answer = %answer, count, "wrong"),
            None => tracing::warn!(answer = %answer, "no verdict"),
        }
        verdicts.push((answer.clone(), verdict));
    }
    Ok(verdicts)
}
