//! Blind-match protocol.
//!
//! Each party blinds its own answer point with a private scalar and publishes
//! only the blinded point and a hash of the scalar (commit). Re-applying the
//! same scalar to the other party's blinded point (unlock) yields `a·k·H` on
//! both sides exactly when both answers encode to the same `H`.

use ark_babyjubjub::Fq;

use crate::backend::{Circuit, ProofBackend, ProofError, ProofOutput, Witness};
use crate::constants::{COMMIT_SIGNALS, UNLOCK_MIN_SIGNALS};
use crate::curve::{CurveError, CurvePoint, SecretScalar};
use crate::field::{field_from_decimal, field_to_le_hex, FieldError};
use crate::serialize::{serialize_proof, ProofParts, SerializeError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Proof(#[from] ProofError),
    #[error("{circuit} proof has {got} public signals, expected at least {want}")]
    SignalCount { circuit: Circuit, got: usize, want: usize },
    #[error("{0} public signals disagree with the native computation")]
    SignalMismatch(Circuit),
    #[error("{0} proof failed local verification")]
    Rejected(Circuit),
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error(transparent)]
    Curve(#[from] CurveError),
    #[error(transparent)]
    Serialize(#[from] SerializeError),
}

/// Commit proof plus the values it publishes.
#[derive(Clone, Debug)]
pub struct CommitProof {
    pub output: ProofOutput,
    pub key_hash: Fq,
    pub blinded: CurvePoint,
}

/// Unlock proof plus the re-blinded point.
#[derive(Clone, Debug)]
pub struct UnlockProof {
    pub output: ProofOutput,
    pub reblinded: CurvePoint,
}

/// Ledger arguments of a commit: proof parts, then the key hash and the
/// blinded point as 32-byte little-endian hex.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitArgs {
    pub proof: ProofParts,
    pub key_hash: String,
    pub x: String,
    pub y: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnlockArgs {
    pub proof: ProofParts,
    pub x: String,
    pub y: String,
}

fn check_count(circuit: Circuit, output: &ProofOutput, want: usize) -> Result<(), ProtocolError> {
    let got = output.public_signals.len();
    if got < want {
        return Err(ProtocolError::SignalCount { circuit, got, want });
    }
    Ok(())
}

fn point_from_signals(signals: &[String]) -> Result<CurvePoint, ProtocolError> {
    Ok(CurvePoint::from_decimal(&signals[0], &signals[1])?)
}

/// Proves knowledge of `scalar` with `scalar·point = blinded`, bound to `address`.
#[tracing::instrument(level = "debug", skip_all, fields(circuit = "commit"))]
pub fn commit<B: ProofBackend + ?Sized>(
    backend: &B,
    address: &Fq,
    scalar: &SecretScalar,
    point: &CurvePoint,
) -> Result<CommitProof, ProtocolError> {
    let output = backend.full_prove(&Witness::commit(address, scalar, point))?;
    check_count(Circuit::Commit, &output, COMMIT_SIGNALS)?;

    let key_hash = field_from_decimal(&output.public_signals[0])?;
    let blinded = point_from_signals(&output.public_signals[1..3])?;
    if blinded != point.mul(scalar) {
        return Err(ProtocolError::SignalMismatch(Circuit::Commit));
    }
    Ok(CommitProof {
        output,
        key_hash,
        blinded,
    })
}

/// Re-applies the scalar committed as `key_hash` to `external`.
#[tracing::instrument(level = "debug", skip_all, fields(circuit = "unlock"))]
pub fn unlock<B: ProofBackend + ?Sized>(
    backend: &B,
    address: &Fq,
    scalar: &SecretScalar,
    key_hash: &Fq,
    external: &CurvePoint,
) -> Result<UnlockProof, ProtocolError> {
    let output = backend.full_prove(&Witness::unlock(address, scalar, key_hash, external))?;
    check_count(Circuit::Unlock, &output, UNLOCK_MIN_SIGNALS)?;

    let reblinded = point_from_signals(&output.public_signals[0..2])?;
    if reblinded != external.mul(scalar) {
        return Err(ProtocolError::SignalMismatch(Circuit::Unlock));
    }
    Ok(UnlockProof { output, reblinded })
}

/// The ledger's verdict: the student is correct iff both re-blinded points agree.
pub fn answers_match(student: &UnlockProof, oracle: &UnlockProof) -> bool {
    student.reblinded == oracle.reblinded
}

fn verified<B: ProofBackend + ?Sized>(
    backend: &B,
    circuit: Circuit,
    output: &ProofOutput,
) -> Result<(), ProtocolError> {
    if backend.verify(circuit, output)? {
        Ok(())
    } else {
        Err(ProtocolError::Rejected(circuit))
    }
}

impl CommitProof {
    pub fn verify<B: ProofBackend + ?Sized>(&self, backend: &B) -> Result<(), ProtocolError> {
        verified(backend, Circuit::Commit, &self.output)
    }

    pub fn ledger_args(&self) -> Result<CommitArgs, ProtocolError> {
        Ok(CommitArgs {
            proof: serialize_proof(&self.output.proof)?,
            key_hash: field_to_le_hex(&self.key_hash),
            x: field_to_le_hex(&self.blinded.x()),
            y: field_to_le_hex(&self.blinded.y()),
        })
    }
}

impl UnlockProof {
    pub fn verify<B: ProofBackend + ?Sized>(&self, backend: &B) -> Result<(), ProtocolError> {
        verified(backend, Circuit::Unlock, &self.output)
    }

    pub fn ledger_args(&self) -> Result<UnlockArgs, ProtocolError> {
        Ok(UnlockArgs {
            proof: serialize_proof(&self.output.proof)?,
            x: field_to_le_hex(&self.reblinded.x()),
            y: field_to_le_hex(&self.reblinded.y()),
        })
    }
}
