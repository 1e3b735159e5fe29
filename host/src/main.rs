mod checkpoint;
mod config;
mod context;
mod demo;
mod error;
mod ledger;
mod oracle;
mod snarkjs;
mod submitter;
mod verifier;

#[cfg(test)]
mod test;

use std::time::Duration;

use anyhow::Context as _;
use blindquiz_core::{load_quests, next_unanswered, serialize_vkey, QuestSpec, SnarkjsVkey, TryAndIncrement};
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::checkpoint::CheckpointStore;
use crate::config::{AnswerArgs, Cli, Command, CommonArgs, DemoArgs, OracleArgs, SerializeVkeyArgs};
use crate::ledger::Ledger;
use crate::oracle::{Bootstrap, Oracle, OracleSettings};
use crate::submitter::{AnswerRequest, WatchSettings};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Flips to `true` on ctrl-c.
fn ctrl_c_channel() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping");
            let _ = tx.send(true);
        }
        // keep the sender alive until then so the receivers do not see a close
        std::future::pending::<()>().await;
    });
    rx
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    match &cli.command {
        Command::Oracle(args) => run_oracle(&cli.common, args).await,
        Command::Answer(args) => run_answer(&cli.common, args).await,
        Command::SerializeVkey(args) => run_serialize_vkey(args),
        Command::Demo(args) => run_demo(args).await,
    }
}

async fn run_oracle(common: &CommonArgs, args: &OracleArgs) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.quests)
        .with_context(|| format!("reading quests from {}", args.quests.display()))?;
    let specs: Vec<QuestSpec> =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", args.quests.display()))?;
    let quests = load_quests(&specs, &TryAndIncrement)?;

    let ctx = context::live(common)?;
    let store = CheckpointStore::for_network(&common.state_dir, common.network.name());
    let settings = OracleSettings {
        upload_delay: Duration::from_millis(args.upload_delay_ms),
        poll_interval: Duration::from_millis(args.poll_interval_ms),
        auto_advance: args.auto_advance,
        max_iterations: args.max_iterations,
    };
    let oracle = Oracle::new(&ctx, quests, store, settings);

    let game = match oracle.bootstrap().await? {
        Bootstrap::Advanced(stage) => {
            tracing::info!(stage = stage.name(), "stage complete, run again to continue");
            return Ok(());
        }
        Bootstrap::Ready(game) => game,
    };
    oracle.run(&game, ctrl_c_channel()).await;
    Ok(())
}

async fn run_answer(common: &CommonArgs, args: &AnswerArgs) -> anyhow::Result<()> {
    let ctx = context::live(common)?;
    let req = AnswerRequest {
        game: args.game,
        quest: args.quest,
        answer: args.answer.clone(),
        registry: match &args.registry {
            Some(r) => r.clone(),
            None => common.package()?,
        },
    };

    let registry = ctx.verifier.registry(&ctx.ledger, &req.registry, None).await?;
    let ids = registry
        .game_ids(req.game)
        .with_context(|| format!("game {} does not exist", req.game))?;
    let baseline = submitter::profile_baseline(&ctx, &ids.profiles_handle).await?;

    let mut rng = rand::thread_rng();
    let submission = submitter::submit_answer(&ctx, &req, &mut rng).await?;
    println!("{}", submission.outcome.hash);
    if args.watch_secs == 0 {
        return Ok(());
    }

    let settings = WatchSettings {
        interval: Duration::from_millis(args.watch_interval_ms),
        timeout: Duration::from_secs(args.watch_secs),
    };
    let verdict = submitter::watch_verdict(
        &ctx,
        &submission.profiles_handle,
        req.quest,
        baseline,
        &settings,
        ctrl_c_channel(),
    )
    .await;
    match verdict {
        Some(event) => println!("{event}"),
        None => println!("no verdict"),
    }

    let profile = ctx
        .verifier
        .profile(&ctx.ledger, &submission.profiles_handle, ctx.ledger.address())
        .await?;
    let answered = profile.map(|p| p.answered_right).unwrap_or_default();
    let quests = registry.game(req.game).map_or(0, |g| g.questions.len());
    match next_unanswered(&answered, quests) {
        Some(next) => tracing::info!(next, "next unanswered quest"),
        None => tracing::info!("every quest answered"),
    }
    Ok(())
}

fn run_serialize_vkey(args: &SerializeVkeyArgs) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.vkey)
        .with_context(|| format!("reading {}", args.vkey.display()))?;
    let vk: SnarkjsVkey = serde_json::from_str(&text).with_context(|| format!("parsing {}", args.vkey.display()))?;
    let parts = serialize_vkey(&vk)?;
    println!("{}", serde_json::to_string_pretty(&parts)?);
    Ok(())
}

async fn run_demo(args: &DemoArgs) -> anyhow::Result<()> {
    let dir = std::env::temp_dir().join(format!("blindquiz-demo-{}", std::process::id()));
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    let result = demo::run(&args.answers, &dir).await;
    if let Err(e) = std::fs::remove_dir_all(&dir) {
        tracing::debug!(path = %dir.display(), error = %e, "demo state dir not removed");
    }
    for (answer, verdict) in result? {
        match verdict {
            Some(event) => println!("{answer}: {event}"),
            None => println!("{answer}: no verdict"),
        }
    }
    Ok(())
}
