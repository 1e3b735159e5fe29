//! Proof backend seam: two fixed circuits, a witness in, a proof plus ordered
//! public signals out.

use std::fmt;

use ark_babyjubjub::Fq;
use ark_bn254::{Fr as BnFr, G1Affine, G2Affine};
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::{One, PrimeField};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::{COMMIT_CIRCUIT, UNLOCK_CIRCUIT};
use crate::curve::{CurvePoint, SecretScalar};
use crate::field::{field_from_decimal, field_to_decimal};
use crate::serialize::{g1_to_snarkjs, g2_to_snarkjs, SerializeError, SnarkjsProof};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProofError {
    #[error("witness does not satisfy the {0} circuit: {1}")]
    Unsatisfiable(Circuit, String),
    #[error("proving backend failed: {0}")]
    Backend(String),
    #[error("malformed proof artifact: {0}")]
    Artifact(String),
    #[error("verification error: {0}")]
    Verify(String),
    #[error(transparent)]
    Serialize(#[from] SerializeError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Circuit {
    Commit,
    Unlock,
}

impl Circuit {
    /// File stem of the compiled artifacts.
    pub fn stem(&self) -> &'static str {
        match self {
            Circuit::Commit => COMMIT_CIRCUIT,
            Circuit::Unlock => UNLOCK_CIRCUIT,
        }
    }
}

impl fmt::Display for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Circuit::Commit => "commit",
            Circuit::Unlock => "unlock",
        })
    }
}

// ── Witnesses ───────────────────────────────────────────────

/// Input record of the commit circuit. Field names are the circuit's signal names.
#[derive(Clone, Serialize)]
pub struct CommitWitness {
    pub address: String,
    pub a: String,
    #[serde(rename = "P_x")]
    pub p_x: String,
    #[serde(rename = "P_y")]
    pub p_y: String,
}

/// Input record of the unlock circuit.
#[derive(Clone, Serialize)]
pub struct UnlockWitness {
    pub address: String,
    pub k: String,
    pub hash_k: String,
    #[serde(rename = "aH_x")]
    pub ah_x: String,
    #[serde(rename = "aH_y")]
    pub ah_y: String,
}

#[derive(Clone)]
pub enum Witness {
    Commit(CommitWitness),
    Unlock(UnlockWitness),
}

impl Witness {
    pub fn commit(address: &Fq, scalar: &SecretScalar, point: &CurvePoint) -> Self {
        Witness::Commit(CommitWitness {
            address: field_to_decimal(address),
            a: scalar.to_decimal(),
            p_x: point.x_decimal(),
            p_y: point.y_decimal(),
        })
    }

    pub fn unlock(address: &Fq, scalar: &SecretScalar, key_hash: &Fq, external: &CurvePoint) -> Self {
        Witness::Unlock(UnlockWitness {
            address: field_to_decimal(address),
            k: scalar.to_decimal(),
            hash_k: field_to_decimal(key_hash),
            ah_x: external.x_decimal(),
            ah_y: external.y_decimal(),
        })
    }

    pub fn circuit(&self) -> Circuit {
        match self {
            Witness::Commit(_) => Circuit::Commit,
            Witness::Unlock(_) => Circuit::Unlock,
        }
    }

    /// snarkjs input file contents. Contains the secret scalar.
    pub fn to_input_json(&self) -> serde_json::Value {
        let value = match self {
            Witness::Commit(w) => serde_json::to_value(w),
            Witness::Unlock(w) => serde_json::to_value(w),
        };
        // plain string fields always serialize
        value.unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Debug for Witness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Witness::Commit(w) => f
                .debug_struct("CommitWitness")
                .field("address", &w.address)
                .field("a", &"<redacted>")
                .finish_non_exhaustive(),
            Witness::Unlock(w) => f
                .debug_struct("UnlockWitness")
                .field("address", &w.address)
                .field("k", &"<redacted>")
                .field("hash_k", &w.hash_k)
                .finish_non_exhaustive(),
        }
    }
}

// ── Backend ─────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOutput {
    pub proof: SnarkjsProof,
    #[serde(rename = "publicSignals")]
    pub public_signals: Vec<String>,
}

pub trait ProofBackend {
    fn full_prove(&self, witness: &Witness) -> Result<ProofOutput, ProofError>;

    fn verify(&self, circuit: Circuit, output: &ProofOutput) -> Result<bool, ProofError>;
}

impl<B: ProofBackend + ?Sized> ProofBackend for Box<B> {
    fn full_prove(&self, witness: &Witness) -> Result<ProofOutput, ProofError> {
        (**self).full_prove(witness)
    }

    fn verify(&self, circuit: Circuit, output: &ProofOutput) -> Result<bool, ProofError> {
        (**self).verify(circuit, output)
    }
}

// ── Transparent backend ─────────────────────────────────────

/// Evaluates both relations natively and emits a proof-shaped binding of the
/// public signals. Neither zero-knowledge nor sound; for tests and dry runs.
///
/// The key hash here is SHA-256 based, not the circuit's hash, so its outputs
/// are never accepted by the on-chain verifier.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransparentBackend;

/// Commitment to a scalar as computed by [`TransparentBackend`].
pub fn transparent_key_hash(k: &SecretScalar) -> Fq {
    let mut hasher = Sha256::new();
    hasher.update(b"blindquiz/key-hash/v1");
    hasher.update(k.to_decimal().as_bytes());
    Fq::from_le_bytes_mod_order(&hasher.finalize())
}

impl TransparentBackend {
    fn binding(circuit: Circuit, signals: &[String]) -> SnarkjsProof {
        let mut hasher = Sha256::new();
        hasher.update(circuit.stem().as_bytes());
        for s in signals {
            hasher.update((s.len() as u64).to_le_bytes());
            hasher.update(s.as_bytes());
        }
        let s = BnFr::from_le_bytes_mod_order(&hasher.finalize());
        let a = (G1Affine::generator() * s).into_affine();
        let b = (G2Affine::generator() * s).into_affine();
        let c = (G1Affine::generator() * (s + BnFr::one())).into_affine();
        SnarkjsProof {
            pi_a: g1_to_snarkjs(&a),
            pi_b: g2_to_snarkjs(&b),
            pi_c: g1_to_snarkjs(&c),
            protocol: "transparent".to_string(),
            curve: "bn128".to_string(),
        }
    }

    fn prove_commit(w: &CommitWitness) -> Result<Vec<String>, ProofError> {
        let bad = |e: String| ProofError::Unsatisfiable(Circuit::Commit, e);
        let address = field_from_decimal(&w.address).map_err(|e| bad(e.to_string()))?;
        let k = SecretScalar::from_decimal(&w.a).map_err(|e| bad(e.to_string()))?;
        let p = CurvePoint::from_decimal(&w.p_x, &w.p_y).map_err(|e| bad(e.to_string()))?;
        let blinded = p.mul(&k);
        Ok(vec![
            field_to_decimal(&transparent_key_hash(&k)),
            blinded.x_decimal(),
            blinded.y_decimal(),
            field_to_decimal(&address),
        ])
    }

    fn prove_unlock(w: &UnlockWitness) -> Result<Vec<String>, ProofError> {
        let bad = |e: String| ProofError::Unsatisfiable(Circuit::Unlock, e);
        let address = field_from_decimal(&w.address).map_err(|e| bad(e.to_string()))?;
        let k = SecretScalar::from_decimal(&w.k).map_err(|e| bad(e.to_string()))?;
        let hash_k = field_from_decimal(&w.hash_k).map_err(|e| bad(e.to_string()))?;
        if transparent_key_hash(&k) != hash_k {
            return Err(bad("scalar does not match committed key hash".to_string()));
        }
        let external = CurvePoint::from_decimal(&w.ah_x, &w.ah_y).map_err(|e| bad(e.to_string()))?;
        let out = external.mul(&k);
        Ok(vec![
            out.x_decimal(),
            out.y_decimal(),
            field_to_decimal(&address),
            field_to_decimal(&hash_k),
            external.x_decimal(),
            external.y_decimal(),
        ])
    }
}

impl ProofBackend for TransparentBackend {
    fn full_prove(&self, witness: &Witness) -> Result<ProofOutput, ProofError> {
        let public_signals = match witness {
            Witness::Commit(w) => Self::prove_commit(w)?,
            Witness::Unlock(w) => Self::prove_unlock(w)?,
        };
        Ok(ProofOutput {
            proof: Self::binding(witness.circuit(), &public_signals),
            public_signals,
        })
    }

    fn verify(&self, circuit: Circuit, output: &ProofOutput) -> Result<bool, ProofError> {
        Ok(Self::binding(circuit, &output.public_signals) == output.proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::generator;

    fn scalar(s: &str) -> SecretScalar {
        SecretScalar::from_decimal(s).unwrap()
    }

    #[test]
    fn witness_json_uses_circuit_signal_names() {
        let w = Witness::commit(&Fq::from(7u64), &scalar("5"), &generator());
        let json = w.to_input_json();
        assert_eq!(json["address"], "7");
        assert_eq!(json["a"], "5");
        assert!(json.get("P_x").is_some() && json.get("P_y").is_some());

        let w = Witness::unlock(&Fq::from(7u64), &scalar("5"), &Fq::from(9u64), &generator());
        let json = w.to_input_json();
        assert_eq!(json["hash_k"], "9");
        assert!(json.get("aH_x").is_some() && json.get("aH_y").is_some());
    }

    #[test]
    fn debug_redacts_scalar() {
        let w = Witness::commit(&Fq::from(7u64), &scalar("123456789"), &generator());
        assert!(!format!("{w:?}").contains("123456789"));
    }

    #[test]
    fn transparent_commit_signals() {
        let k = scalar("11");
        let out = TransparentBackend
            .full_prove(&Witness::commit(&Fq::from(3u64), &k, &generator()))
            .unwrap();
        let blinded = generator().mul(&k);
        assert_eq!(out.public_signals[0], field_to_decimal(&transparent_key_hash(&k)));
        assert_eq!(out.public_signals[1], blinded.x_decimal());
        assert_eq!(out.public_signals[2], blinded.y_decimal());
        assert_eq!(out.public_signals[3], "3");
        assert!(TransparentBackend.verify(Circuit::Commit, &out).unwrap());
        assert!(!TransparentBackend.verify(Circuit::Unlock, &out).unwrap());
    }

    #[test]
    fn transparent_unlock_requires_committed_scalar() {
        let k = scalar("11");
        let wrong_hash = transparent_key_hash(&scalar("12"));
        let err = TransparentBackend
            .full_prove(&Witness::unlock(&Fq::from(3u64), &k, &wrong_hash, &generator()))
            .unwrap_err();
        assert!(matches!(err, ProofError::Unsatisfiable(Circuit::Unlock, _)));
    }

    #[test]
    fn tampered_signal_fails_verification() {
        let k = scalar("11");
        let mut out = TransparentBackend
            .full_prove(&Witness::commit(&Fq::from(3u64), &k, &generator()))
            .unwrap();
        out.public_signals[0] = "1".to_string();
        assert!(!TransparentBackend.verify(Circuit::Commit, &out).unwrap());
    }

    #[test]
    fn proof_output_uses_snarkjs_field_name() {
        let out = TransparentBackend
            .full_prove(&Witness::commit(&Fq::from(3u64), &scalar("2"), &generator()))
            .unwrap();
        let json = serde_json::to_value(&out).unwrap();
        assert!(json.get("publicSignals").is_some());
    }
}
