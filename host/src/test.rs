#![cfg(test)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use blindquiz_core::{
    load_quests, Circuit, ProfileEvent, ProofBackend, ProofError, ProofOutput, TableRow, TransparentBackend,
    TryAndIncrement, Witness,
};
use tokio::sync::watch;

use crate::checkpoint::{CheckpointStore, Stage};
use crate::context::Context;
use crate::demo::{self, demo_quests};
use crate::error::{LedgerError, OracleError};
use crate::ledger::{Indexer, Ledger, MemoryLedger};
use crate::oracle::{Bootstrap, Oracle, OracleSettings};
use crate::submitter::{self, AnswerRequest, WatchSettings};
use crate::verifier::Verifier;

const PKG: &str = "0xcafe";

fn state_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("blindquiz-host-{tag}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn context(ledger: &MemoryLedger) -> Context<MemoryLedger, MemoryLedger> {
    Context::new(ledger.clone(), ledger.clone(), Box::new(TransparentBackend), Verifier::new(PKG)).unwrap()
}

fn settings(auto_advance: bool) -> OracleSettings {
    OracleSettings {
        upload_delay: Duration::ZERO,
        poll_interval: Duration::from_millis(5),
        auto_advance,
        max_iterations: None,
    }
}

fn oracle<'a, I: Indexer>(
    ctx: &'a Context<MemoryLedger, I>,
    store: &CheckpointStore,
    s: OracleSettings,
) -> Oracle<'a, MemoryLedger, I> {
    let quests = load_quests(&demo_quests(), &TryAndIncrement).unwrap();
    Oracle::new(ctx, quests, store.clone(), s)
}

fn answer(game: u64, quest: usize, text: &str) -> AnswerRequest {
    AnswerRequest {
        game,
        quest,
        answer: text.to_string(),
        registry: PKG.to_string(),
    }
}

async fn verdict(student: &Context<MemoryLedger, MemoryLedger>, handle: &str) -> Vec<ProfileEvent> {
    let profile = student
        .verifier
        .profile(&student.ledger, handle, student.ledger.address())
        .await
        .unwrap();
    let mut watch = blindquiz_core::ProfileWatch::new();
    watch.observe(None);
    watch.observe(profile.as_ref())
}

/// Reads through to the memory ledger after `delay`, failing the first
/// `failures` reads, and records when each read started and finished.
struct ScriptedIndexer {
    inner: MemoryLedger,
    delay: Duration,
    failures: AtomicUsize,
    reads: Mutex<Vec<(Instant, Instant)>>,
}

impl ScriptedIndexer {
    fn new(inner: &MemoryLedger, delay: Duration, failures: usize) -> Self {
        Self {
            inner: inner.clone(),
            delay,
            failures: AtomicUsize::new(failures),
            reads: Mutex::new(Vec::new()),
        }
    }

    fn reads(&self) -> Vec<(Instant, Instant)> {
        self.reads.lock().unwrap().clone()
    }
}

impl Indexer for ScriptedIndexer {
    async fn table_rows(&self, handle: &str) -> Result<Vec<TableRow>, LedgerError> {
        let start = Instant::now();
        tokio::time::sleep(self.delay).await;
        let result = if self.failures.load(Ordering::SeqCst) > 0 {
            self.failures.fetch_sub(1, Ordering::SeqCst);
            Err(LedgerError::Response("indexer unavailable".to_string()))
        } else {
            self.inner.table_rows(handle).await
        };
        self.reads.lock().unwrap().push((start, Instant::now()));
        result
    }
}

/// Transparent backend whose unlock proofs fail while `unlock_failures` is non-zero.
struct FlakyBackend {
    unlock_failures: Arc<AtomicUsize>,
}

impl ProofBackend for FlakyBackend {
    fn full_prove(&self, witness: &Witness) -> Result<ProofOutput, ProofError> {
        if witness.circuit() == Circuit::Unlock && self.unlock_failures.load(Ordering::SeqCst) > 0 {
            self.unlock_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(ProofError::Backend("prover exited with status 1".to_string()));
        }
        TransparentBackend.full_prove(witness)
    }

    fn verify(&self, circuit: Circuit, output: &ProofOutput) -> Result<bool, ProofError> {
        TransparentBackend.verify(circuit, output)
    }
}

#[tokio::test]
async fn test_demo_correct_then_wrong() {
    let dir = state_dir("demo");
    let verdicts = demo::run(&["C".to_string(), "B".to_string()], &dir).await.unwrap();
    assert_eq!(verdicts.len(), 2);
    assert_eq!(verdicts[0].1, Some(ProfileEvent::AnsweredRight(0)));
    assert_eq!(verdicts[1].1, Some(ProfileEvent::WrongAttempt { quest: 0, count: 1 }));
}

#[tokio::test]
async fn test_bootstrap_one_stage_per_run() {
    let ledger = MemoryLedger::new(PKG, PKG);
    let ctx = context(&ledger);
    let store = CheckpointStore::for_network(&state_dir("stages"), "local");
    let oracle = oracle(&ctx, &store, settings(false));

    let Bootstrap::Advanced(Stage::GameCreated { game }) = oracle.bootstrap().await.unwrap() else {
        panic!("expected game_created");
    };
    assert_eq!(game.number, 1);
    assert_eq!(ledger.writes(), 1);

    let Bootstrap::Advanced(Stage::QuestsUploaded { game: uploaded }) = oracle.bootstrap().await.unwrap() else {
        panic!("expected quests_uploaded");
    };
    assert_eq!(uploaded, game);
    assert_eq!(ledger.writes(), 1 + demo_quests().len() as u64);
    assert_eq!(ledger.registry_snapshot().games[0].questions.len(), demo_quests().len());

    assert_eq!(oracle.bootstrap().await.unwrap(), Bootstrap::Ready(game));
}

#[tokio::test]
async fn test_completed_bootstrap_writes_nothing() {
    let ledger = MemoryLedger::new(PKG, PKG);
    let ctx = context(&ledger);
    let store = CheckpointStore::for_network(&state_dir("idem"), "local");

    let Bootstrap::Ready(game) = oracle(&ctx, &store, settings(true)).bootstrap().await.unwrap() else {
        panic!("auto-advance must finish");
    };
    let writes = ledger.writes();

    // a restarted process with the same checkpoint
    let again = oracle(&ctx, &store, settings(true)).bootstrap().await.unwrap();
    assert_eq!(again, Bootstrap::Ready(game));
    assert_eq!(ledger.writes(), writes);
}

#[tokio::test]
async fn test_failed_stage_keeps_checkpoint() {
    let ledger = MemoryLedger::new(PKG, PKG);
    let ctx = context(&ledger);
    let store = CheckpointStore::for_network(&state_dir("fail"), "local");
    let oracle = oracle(&ctx, &store, settings(false));

    ledger.fail_next_submit("OUT_OF_GAS");
    let err = oracle.bootstrap().await.unwrap_err();
    assert!(matches!(err, OracleError::Bootstrap { stage: "create_game", .. }));
    assert_eq!(store.load().unwrap(), Stage::Uninitialized);

    let Bootstrap::Advanced(created @ Stage::GameCreated { .. }) = oracle.bootstrap().await.unwrap() else {
        panic!("expected game_created");
    };

    ledger.fail_next_submit("OUT_OF_GAS");
    let err = oracle.bootstrap().await.unwrap_err();
    assert!(matches!(err, OracleError::Bootstrap { stage: "upload_quests", .. }));
    assert_eq!(store.load().unwrap(), created);

    assert!(matches!(
        oracle.bootstrap().await.unwrap(),
        Bootstrap::Advanced(Stage::QuestsUploaded { .. })
    ));
}

#[tokio::test]
async fn test_empty_answers_table() {
    let ledger = MemoryLedger::new(PKG, PKG);
    let ctx = context(&ledger);
    let store = CheckpointStore::for_network(&state_dir("empty"), "local");
    let oracle = oracle(&ctx, &store, settings(true));
    let Bootstrap::Ready(game) = oracle.bootstrap().await.unwrap() else {
        panic!("auto-advance must finish");
    };
    let writes = ledger.writes();
    assert_eq!(oracle.poll_once(&game).await.unwrap(), None);
    assert_eq!(ledger.writes(), writes);
}

#[tokio::test]
async fn test_one_attempt_per_pass() {
    let ledger = MemoryLedger::new(PKG, PKG);
    let ctx = context(&ledger);
    let store = CheckpointStore::for_network(&state_dir("order"), "local");
    let oracle = oracle(&ctx, &store, settings(true));
    let Bootstrap::Ready(game) = oracle.bootstrap().await.unwrap() else {
        panic!("auto-advance must finish");
    };

    let mut rng = rand::thread_rng();
    let alice = context(&ledger.signer("0xa1"));
    let bob = context(&ledger.signer("0xb2"));
    submitter::submit_answer(&alice, &answer(game.number, 0, "C"), &mut rng).await.unwrap();
    submitter::submit_answer(&bob, &answer(game.number, 1, "A"), &mut rng).await.unwrap();

    let first = oracle.poll_once(&game).await.unwrap().unwrap();
    assert_eq!(first.student, alice.ledger.address());
    assert_eq!(first.quest, 0);
    let second = oracle.poll_once(&game).await.unwrap().unwrap();
    assert_eq!(second.student, bob.ledger.address());
    assert_eq!(second.quest, 1);
    assert_eq!(oracle.poll_once(&game).await.unwrap(), None);

    assert_eq!(verdict(&alice, &game.profiles_handle).await, vec![ProfileEvent::AnsweredRight(0)]);
    assert_eq!(
        verdict(&bob, &game.profiles_handle).await,
        vec![ProfileEvent::WrongAttempt { quest: 1, count: 1 }]
    );
}

#[tokio::test]
async fn test_loop_survives_rejected_score() {
    let ledger = MemoryLedger::new(PKG, PKG);
    let ctx = context(&ledger);
    let store = CheckpointStore::for_network(&state_dir("retry"), "local");
    let oracle = oracle(
        &ctx,
        &store,
        OracleSettings {
            max_iterations: Some(3),
            ..settings(true)
        },
    );
    let Bootstrap::Ready(game) = oracle.bootstrap().await.unwrap() else {
        panic!("auto-advance must finish");
    };

    let student = context(&ledger.signer("0x5"));
    submitter::submit_answer(&student, &answer(game.number, 0, "C"), &mut rand::thread_rng())
        .await
        .unwrap();

    ledger.fail_next_submit("OUT_OF_GAS");
    let err = oracle.poll_once(&game).await.unwrap_err();
    assert!(matches!(err, OracleError::Submission(LedgerError::Rejected { .. })));

    ledger.fail_next_submit("OUT_OF_GAS");
    let (_tx, rx) = watch::channel(false);
    assert_eq!(oracle.run(&game, rx).await, 3);
    assert_eq!(verdict(&student, &game.profiles_handle).await, vec![ProfileEvent::AnsweredRight(0)]);
}

#[tokio::test]
async fn test_cancel_stops_loop() {
    let ledger = MemoryLedger::new(PKG, PKG);
    let ctx = context(&ledger);
    let store = CheckpointStore::for_network(&state_dir("cancel"), "local");
    let oracle = oracle(&ctx, &store, settings(true));
    let Bootstrap::Ready(game) = oracle.bootstrap().await.unwrap() else {
        panic!("auto-advance must finish");
    };

    let (tx, rx) = watch::channel(true);
    assert_eq!(oracle.run(&game, rx).await, 0);
    drop(tx);

    let (tx, rx) = watch::channel(false);
    let stop = async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();
    };
    let (passes, ()) = tokio::time::timeout(Duration::from_secs(5), async { tokio::join!(oracle.run(&game, rx), stop) })
        .await
        .unwrap();
    assert!(passes >= 1);

    // a dropped sender also stops the loop
    let (tx, rx) = watch::channel(false);
    drop(tx);
    tokio::time::timeout(Duration::from_secs(5), oracle.run(&game, rx))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_watch_reports_verdict() {
    let ledger = MemoryLedger::new(PKG, PKG);
    let ctx = context(&ledger);
    let store = CheckpointStore::for_network(&state_dir("watch"), "local");
    let oracle = oracle(&ctx, &store, settings(true));
    let Bootstrap::Ready(game) = oracle.bootstrap().await.unwrap() else {
        panic!("auto-advance must finish");
    };

    let student = context(&ledger.signer("0x77"));
    let watch_settings = WatchSettings {
        interval: Duration::from_millis(5),
        timeout: Duration::from_secs(5),
    };
    let mut rng = rand::thread_rng();

    for (text, expected) in [
        ("B", ProfileEvent::WrongAttempt { quest: 0, count: 1 }),
        ("D", ProfileEvent::WrongAttempt { quest: 0, count: 2 }),
        ("C", ProfileEvent::AnsweredRight(0)),
    ] {
        let baseline = submitter::profile_baseline(&student, &game.profiles_handle).await.unwrap();
        let submission = submitter::submit_answer(&student, &answer(game.number, 0, text), &mut rng)
            .await
            .unwrap();
        assert_eq!(submission.profiles_handle, game.profiles_handle);
        oracle.poll_once(&game).await.unwrap();

        let (_tx, rx) = watch::channel(false);
        let got = submitter::watch_verdict(&student, &game.profiles_handle, 0, baseline, &watch_settings, rx).await;
        assert_eq!(got, Some(expected));
    }
}

#[tokio::test]
async fn test_watch_times_out_without_scoring() {
    let ledger = MemoryLedger::new(PKG, PKG);
    let ctx = context(&ledger);
    let store = CheckpointStore::for_network(&state_dir("timeout"), "local");
    let Bootstrap::Ready(game) = oracle(&ctx, &store, settings(true)).bootstrap().await.unwrap() else {
        panic!("auto-advance must finish");
    };

    let student = context(&ledger.signer("0x78"));
    let baseline = submitter::profile_baseline(&student, &game.profiles_handle).await.unwrap();
    submitter::submit_answer(&student, &answer(game.number, 0, "C"), &mut rand::thread_rng())
        .await
        .unwrap();

    let (_tx, rx) = watch::channel(false);
    let watch_settings = WatchSettings {
        interval: Duration::from_millis(5),
        timeout: Duration::from_millis(50),
    };
    let got = submitter::watch_verdict(&student, &game.profiles_handle, 0, baseline, &watch_settings, rx).await;
    assert_eq!(got, None);
}

#[tokio::test]
async fn test_answer_to_missing_quest() {
    let ledger = MemoryLedger::new(PKG, PKG);
    let ctx = context(&ledger);
    let store = CheckpointStore::for_network(&state_dir("missing"), "local");
    let Bootstrap::Ready(game) = oracle(&ctx, &store, settings(true)).bootstrap().await.unwrap() else {
        panic!("auto-advance must finish");
    };
    let writes = ledger.writes();

    let student = context(&ledger.signer("0x79"));
    let mut rng = rand::thread_rng();
    let err = submitter::submit_answer(&student, &answer(game.number, 9, "C"), &mut rng)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, OracleError::Config(_)));
    let err = submitter::submit_answer(&student, &answer(game.number + 1, 0, "C"), &mut rng)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, OracleError::Config(_)));
    assert_eq!(ledger.writes(), writes);
}

#[tokio::test]
async fn test_full_sleep_after_slow_pass() {
    let ledger = MemoryLedger::new(PKG, PKG);
    let indexer = ScriptedIndexer::new(&ledger, Duration::from_millis(80), 0);
    let ctx = Context::new(ledger.clone(), indexer, Box::new(TransparentBackend), Verifier::new(PKG)).unwrap();
    let store = CheckpointStore::for_network(&state_dir("sleep"), "local");
    let poll_interval = Duration::from_millis(50);
    let oracle = oracle(
        &ctx,
        &store,
        OracleSettings {
            poll_interval,
            max_iterations: Some(4),
            ..settings(true)
        },
    );
    let Bootstrap::Ready(game) = oracle.bootstrap().await.unwrap() else {
        panic!("auto-advance must finish");
    };

    let (_tx, rx) = watch::channel(false);
    assert_eq!(oracle.run(&game, rx).await, 4);

    // empty table: each pass ends when its read ends
    let reads = ctx.indexer.reads();
    assert_eq!(reads.len(), 4);
    for pair in reads.windows(2) {
        let gap = pair[1].0.duration_since(pair[0].1);
        assert!(gap >= poll_interval, "next pass started {gap:?} after the previous one ended");
    }
}

#[tokio::test]
async fn test_loop_survives_indexer_errors() {
    let ledger = MemoryLedger::new(PKG, PKG);
    let indexer = ScriptedIndexer::new(&ledger, Duration::ZERO, 2);
    let ctx = Context::new(ledger.clone(), indexer, Box::new(TransparentBackend), Verifier::new(PKG)).unwrap();
    let store = CheckpointStore::for_network(&state_dir("indexer"), "local");
    let oracle = oracle(
        &ctx,
        &store,
        OracleSettings {
            max_iterations: Some(4),
            ..settings(true)
        },
    );
    let Bootstrap::Ready(game) = oracle.bootstrap().await.unwrap() else {
        panic!("auto-advance must finish");
    };

    let student = context(&ledger.signer("0x6"));
    submitter::submit_answer(&student, &answer(game.number, 0, "C"), &mut rand::thread_rng())
        .await
        .unwrap();

    let (_tx, rx) = watch::channel(false);
    assert_eq!(oracle.run(&game, rx).await, 4);
    assert_eq!(ctx.indexer.reads().len(), 4);
    assert_eq!(verdict(&student, &game.profiles_handle).await, vec![ProfileEvent::AnsweredRight(0)]);
}

#[tokio::test]
async fn test_loop_survives_proof_failure() {
    let ledger = MemoryLedger::new(PKG, PKG);
    let unlock_failures = Arc::new(AtomicUsize::new(0));
    let backend = FlakyBackend {
        unlock_failures: Arc::clone(&unlock_failures),
    };
    let ctx = Context::new(ledger.clone(), ledger.clone(), Box::new(backend), Verifier::new(PKG)).unwrap();
    let store = CheckpointStore::for_network(&state_dir("prover"), "local");
    let oracle = oracle(
        &ctx,
        &store,
        OracleSettings {
            max_iterations: Some(3),
            ..settings(true)
        },
    );
    let Bootstrap::Ready(game) = oracle.bootstrap().await.unwrap() else {
        panic!("auto-advance must finish");
    };

    let student = context(&ledger.signer("0x7"));
    submitter::submit_answer(&student, &answer(game.number, 0, "B"), &mut rand::thread_rng())
        .await
        .unwrap();
    let writes = ledger.writes();

    unlock_failures.store(2, Ordering::SeqCst);
    let err = oracle.poll_once(&game).await.unwrap_err();
    assert!(matches!(err, OracleError::ProofGeneration(_)));
    assert_eq!(ledger.writes(), writes);

    // one more failed pass, then the unchanged row is scored
    let (_tx, rx) = watch::channel(false);
    assert_eq!(oracle.run(&game, rx).await, 3);
    assert_eq!(unlock_failures.load(Ordering::SeqCst), 0);
    assert_eq!(ledger.writes(), writes + 1);
    assert_eq!(
        verdict(&student, &game.profiles_handle).await,
        vec![ProfileEvent::WrongAttempt { quest: 0, count: 1 }]
    );
}
