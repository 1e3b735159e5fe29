//! Per-process handles, built once in `main` and passed to every operation.

use blindquiz_core::{address_to_field, Fq, ProofBackend, TransparentBackend, TryAndIncrement};

use crate::config::{BackendKind, CommonArgs};
use crate::error::OracleError;
use crate::ledger::{AptosClient, GraphqlIndexer, Ledger};
use crate::snarkjs::SnarkjsBackend;
use crate::verifier::Verifier;

pub struct Context<L, I> {
    pub ledger: L,
    pub indexer: I,
    pub backend: Box<dyn ProofBackend>,
    pub encoder: TryAndIncrement,
    pub verifier: Verifier,
    /// Signer address as a circuit input.
    pub address_field: Fq,
}

impl<L: Ledger, I> Context<L, I> {
    pub fn new(ledger: L, indexer: I, backend: Box<dyn ProofBackend>, verifier: Verifier) -> Result<Self, OracleError> {
        let address_field = address_to_field(ledger.address())?;
        Ok(Self {
            ledger,
            indexer,
            backend,
            encoder: TryAndIncrement,
            verifier,
            address_field,
        })
    }
}

pub fn backend(common: &CommonArgs) -> Result<Box<dyn ProofBackend>, OracleError> {
    Ok(match common.backend {
        BackendKind::Snarkjs => Box::new(
            SnarkjsBackend::new(common.snarkjs.clone(), common.circuits_dir.clone())
                .map_err(|e| OracleError::Config(e.to_string()))?,
        ),
        BackendKind::Transparent => {
            tracing::warn!("transparent backend: proofs are not zero-knowledge and will not verify on-chain");
            Box::new(TransparentBackend)
        }
    })
}

/// Live network context from the command line.
pub fn live(common: &CommonArgs) -> Result<Context<AptosClient, GraphqlIndexer>, OracleError> {
    let key = crate::ledger::aptos::parse_private_key(common.private_key()?)
        .map_err(|e| OracleError::Config(e.to_string()))?;
    let ledger = AptosClient::new(&common.node_url()?, key);
    let indexer = GraphqlIndexer::new(common.indexer_url()?);
    let verifier = Verifier::new(common.package()?);
    tracing::info!(
        network = %common.network,
        address = ledger.address(),
        package = verifier.package(),
        "ledger context ready"
    );
    Context::new(ledger, indexer, backend(common)?, verifier)
}
