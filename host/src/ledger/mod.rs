//! Ledger and indexer surfaces.

pub mod aptos;
pub mod indexer;
pub mod memory;

use blindquiz_core::TableRow;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::LedgerError;

pub use aptos::AptosClient;
pub use indexer::GraphqlIndexer;
pub use memory::MemoryLedger;

// ── Entry-function calls ────────────────────────────────────

/// Entry-function argument, encoded the way the REST API's JSON payload wants it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MoveArg {
    U64(u64),
    Address(String),
    /// `vector<u8>` as hex, with or without `0x`.
    Bytes(String),
    Str(String),
}

impl MoveArg {
    pub fn to_json(&self) -> Value {
        match self {
            MoveArg::U64(n) => Value::String(n.to_string()),
            MoveArg::Address(a) => Value::String(a.clone()),
            MoveArg::Bytes(h) => Value::String(format!("0x{}", h.strip_prefix("0x").unwrap_or(h))),
            MoveArg::Str(s) => Value::String(s.clone()),
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            MoveArg::U64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MoveArg::Address(s) | MoveArg::Bytes(s) | MoveArg::Str(s) => Some(s),
            MoveArg::U64(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryCall {
    /// `<package>::<module>::<function>`
    pub function: String,
    pub args: Vec<MoveArg>,
}

impl EntryCall {
    pub fn name(&self) -> &str {
        self.function.rsplit("::").next().unwrap_or(&self.function)
    }

    pub fn payload(&self) -> Value {
        json!({
            "type": "entry_function_payload",
            "function": self.function,
            "type_arguments": [],
            "arguments": self.args.iter().map(MoveArg::to_json).collect::<Vec<_>>(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub type_tag: String,
    pub data: Value,
}

/// A committed, successful transaction.
#[derive(Clone, Debug, PartialEq)]
pub struct TxnOutcome {
    pub hash: String,
    pub version: u64,
    pub events: Vec<Event>,
}

impl TxnOutcome {
    pub fn event(&self, type_tag: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.type_tag == type_tag)
    }
}

// ── Traits ──────────────────────────────────────────────────

#[allow(async_fn_in_trait)]
pub trait Ledger {
    /// Signer address, `0x` + 64 hex digits.
    fn address(&self) -> &str;

    /// Builds, signs and submits `call`, then waits for it to commit.
    /// A transaction that executes but aborts is `LedgerError::Rejected`.
    async fn submit(&self, call: &EntryCall) -> Result<TxnOutcome, LedgerError>;

    /// Resource `data` of `resource_type` under `owner`.
    async fn resource(&self, owner: &str, resource_type: &str, at_version: Option<u64>) -> Result<Value, LedgerError>;

    /// `None` if the table has no entry for `key`.
    async fn table_item(
        &self,
        handle: &str,
        key_type: &str,
        value_type: &str,
        key: &Value,
    ) -> Result<Option<Value>, LedgerError>;
}

#[allow(async_fn_in_trait)]
pub trait Indexer {
    /// Rows of a table, newest version first within each key. Callers still
    /// run [`blindquiz_core::latest_rows`] over the result.
    async fn table_rows(&self, handle: &str) -> Result<Vec<TableRow>, LedgerError>;
}
