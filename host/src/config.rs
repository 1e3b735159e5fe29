use std::fmt;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use url::Url;

use crate::error::OracleError;

pub const PACKAGE_ID_FILE: &str = "package.id";

#[derive(Parser, Debug)]
#[command(name = "blindquiz", version, about = "Blind-match quiz oracle and answer client")]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    #[arg(long, env = "BLINDQUIZ_NETWORK", value_enum, default_value_t = Network::Testnet, global = true)]
    pub network: Network,
    /// Fullnode REST endpoint, overriding the network preset.
    #[arg(long, global = true)]
    pub node_url: Option<Url>,
    /// GraphQL indexer endpoint, overriding the network preset.
    #[arg(long, global = true)]
    pub indexer_url: Option<Url>,
    /// Address the verifier package is published at. Falls back to `package.id`.
    #[arg(long, env = "BLINDQUIZ_PACKAGE", global = true)]
    pub package: Option<String>,
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true, hide = true, global = true)]
    pub private_key: Option<String>,
    #[arg(long, default_value = "compiled_circuits", global = true)]
    pub circuits_dir: PathBuf,
    #[arg(long, default_value = "snarkjs", global = true)]
    pub snarkjs: String,
    #[arg(long, value_enum, default_value_t = BackendKind::Snarkjs, global = true)]
    pub backend: BackendKind,
    /// Directory holding the oracle checkpoint.
    #[arg(long, default_value = ".", global = true)]
    pub state_dir: PathBuf,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Bootstrap the game and score submitted answers.
    Oracle(OracleArgs),
    /// Submit one answer and watch for the verdict.
    Answer(AnswerArgs),
    /// Print a snarkjs verifying key as compressed parts for contract deployment.
    SerializeVkey(SerializeVkeyArgs),
    /// Run oracle and students against an in-memory ledger.
    Demo(DemoArgs),
}

#[derive(Args, Debug, Clone)]
pub struct OracleArgs {
    /// Quest file: `[{"question", "answer", "key"}]`.
    #[arg(long, default_value = "quests.json")]
    pub quests: PathBuf,
    /// Continue to the next bootstrap stage instead of exiting.
    #[arg(long)]
    pub auto_advance: bool,
    #[arg(long, default_value_t = 1000)]
    pub poll_interval_ms: u64,
    #[arg(long, default_value_t = 1000)]
    pub upload_delay_ms: u64,
    /// Stop polling after this many iterations.
    #[arg(long)]
    pub max_iterations: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct AnswerArgs {
    /// 1-based game number.
    #[arg(long)]
    pub game: u64,
    #[arg(long)]
    pub quest: usize,
    #[arg(long)]
    pub answer: String,
    /// Registry owner; defaults to the package address.
    #[arg(long)]
    pub registry: Option<String>,
    /// Give up waiting for the verdict after this long. 0 skips watching.
    #[arg(long, default_value_t = 120)]
    pub watch_secs: u64,
    #[arg(long, default_value_t = 2000)]
    pub watch_interval_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct SerializeVkeyArgs {
    /// snarkjs verification key JSON.
    pub vkey: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct DemoArgs {
    /// One student per answer, all on quest 0.
    #[arg(default_values_t = ["C".to_string(), "B".to_string()])]
    pub answers: Vec<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Network {
    Testnet,
    Mainnet,
    Devnet,
    Local,
}

impl Network {
    pub fn name(&self) -> &'static str {
        match self {
            Network::Testnet => "testnet",
            Network::Mainnet => "mainnet",
            Network::Devnet => "devnet",
            Network::Local => "local",
        }
    }

    fn default_node(&self) -> String {
        match self {
            Network::Local => "http://127.0.0.1:8080/v1".to_string(),
            net => format!("https://api.{}.aptoslabs.com/v1", net.name()),
        }
    }

    fn default_indexer(&self) -> String {
        match self {
            Network::Local => "http://127.0.0.1:8090/v1/graphql".to_string(),
            net => format!("https://api.{}.aptoslabs.com/v1/graphql", net.name()),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    Snarkjs,
    /// Native evaluation without zero knowledge; never accepted on-chain.
    Transparent,
}

fn parse_url(s: &str) -> Result<Url, OracleError> {
    Url::parse(s).map_err(|e| OracleError::Config(format!("{s}: {e}")))
}

impl CommonArgs {
    pub fn node_url(&self) -> Result<Url, OracleError> {
        match &self.node_url {
            Some(u) => Ok(u.clone()),
            None => parse_url(&self.network.default_node()),
        }
    }

    pub fn indexer_url(&self) -> Result<Url, OracleError> {
        match &self.indexer_url {
            Some(u) => Ok(u.clone()),
            None => parse_url(&self.network.default_indexer()),
        }
    }

    /// `--package`, else the first line of `package.id` in the working directory.
    pub fn package(&self) -> Result<String, OracleError> {
        self.package_from(Path::new(PACKAGE_ID_FILE))
    }

    fn package_from(&self, file: &Path) -> Result<String, OracleError> {
        if let Some(p) = &self.package {
            return Ok(p.trim().to_string());
        }
        let text = std::fs::read_to_string(file).map_err(|e| {
            OracleError::Config(format!("no --package and cannot read {}: {e}", file.display()))
        })?;
        let package = text.trim();
        if package.is_empty() {
            return Err(OracleError::Config(format!("{} is empty", file.display())));
        }
        Ok(package.to_string())
    }

    pub fn private_key(&self) -> Result<&str, OracleError> {
        self.private_key
            .as_deref()
            .ok_or_else(|| OracleError::Config("PRIVATE_KEY is not set".to_string()))
    }
}
