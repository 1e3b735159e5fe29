use blindquiz_core::{DecodeError, FieldError, ProtocolError};
use reqwest::StatusCode;

use crate::checkpoint::CheckpointError;

/// Transport and ledger-side failures.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("API error {status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error("transaction {hash} failed: {vm_status}")]
    Rejected { hash: String, vm_status: String },
    #[error("transaction {0} was not confirmed in time")]
    Timeout(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("unexpected response: {0}")]
    Response(String),
    #[error("invalid signing key: {0}")]
    Signer(String),
}

/// Failures of the oracle engine and the answer submitter.
///
/// Everything but `Bootstrap` is recoverable inside the polling loop.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("bootstrap stage `{stage}` failed: {source}")]
    Bootstrap {
        stage: &'static str,
        #[source]
        source: Box<OracleError>,
    },
    #[error("proof generation failed: {0}")]
    ProofGeneration(#[from] ProtocolError),
    #[error("transaction submission failed: {0}")]
    Submission(#[source] LedgerError),
    #[error("ledger read failed: {0}")]
    Read(#[source] LedgerError),
    #[error("indexer query failed: {0}")]
    Indexer(#[source] LedgerError),
    #[error("bad ledger data: {0}")]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error("configuration: {0}")]
    Config(String),
}

impl OracleError {
    pub fn bootstrap(stage: &'static str, source: OracleError) -> Self {
        OracleError::Bootstrap {
            stage,
            source: Box::new(source),
        }
    }
}

impl From<FieldError> for OracleError {
    fn from(e: FieldError) -> Self {
        OracleError::Config(e.to_string())
    }
}
