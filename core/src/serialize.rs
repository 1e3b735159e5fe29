//! snarkjs artifacts → arkworks points → canonical hex for ledger arguments.
//!
//! The on-chain verifier deserializes arkworks *compressed* encodings, so every
//! proof part, verifying-key part and public signal goes through
//! `CanonicalSerialize::serialize_compressed` on BN254.

use std::str::FromStr;

use ark_bn254::{Fq, Fq2, Fr, G1Affine, G2Affine};
use ark_ec::AffineRepr;
use ark_ff::{BigInteger, PrimeField};
use ark_serialize::CanonicalSerialize;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::field::bytes_to_hex;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SerializeError {
    #[error("malformed {0} coordinates")]
    Shape(&'static str),
    #[error("invalid field element {0:?}")]
    Coordinate(String),
    #[error("{0} is not a valid curve point")]
    Point(&'static str),
    #[error("arkworks serialization failed: {0}")]
    Ark(String),
}

// ── snarkjs JSON ────────────────────────────────────────────

/// Groth16 proof as written by `snarkjs groth16 fullprove` (projective, decimal).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnarkjsProof {
    pub pi_a: Vec<String>,
    pub pi_b: Vec<Vec<String>>,
    pub pi_c: Vec<String>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default = "default_curve")]
    pub curve: String,
}

/// Verification key as written by `snarkjs zkey export verificationkey`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnarkjsVkey {
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default = "default_curve")]
    pub curve: String,
    #[serde(rename = "nPublic")]
    pub n_public: usize,
    pub vk_alpha_1: Vec<String>,
    pub vk_beta_2: Vec<Vec<String>>,
    pub vk_gamma_2: Vec<Vec<String>>,
    pub vk_delta_2: Vec<Vec<String>>,
    #[serde(rename = "IC")]
    pub ic: Vec<Vec<String>>,
}

fn default_protocol() -> String {
    "groth16".to_string()
}

fn default_curve() -> String {
    "bn128".to_string()
}

// ── Serialized forms ────────────────────────────────────────

/// Compressed proof points, hex without prefix.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofParts {
    pub a: String,
    pub b: String,
    pub c: String,
}

/// Compressed verifying-key points, hex without prefix.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VkeyParts {
    pub alpha_g1: String,
    pub beta_g2: String,
    pub gamma_g2: String,
    pub delta_g2: String,
    pub gamma_abc_g1: Vec<String>,
}

// ── Point parsing ───────────────────────────────────────────

fn base(s: &str) -> Result<Fq, SerializeError> {
    Fq::from_str(s).map_err(|_| SerializeError::Coordinate(s.to_string()))
}

fn is_infinity(z: Option<&String>) -> bool {
    z.map(|z| z == "0").unwrap_or(false)
}

pub(crate) fn g1(coords: &[String], what: &'static str) -> Result<G1Affine, SerializeError> {
    if coords.len() < 2 {
        return Err(SerializeError::Shape(what));
    }
    if is_infinity(coords.get(2)) {
        return Ok(G1Affine::zero());
    }
    let p = G1Affine::new_unchecked(base(&coords[0])?, base(&coords[1])?);
    if !p.is_on_curve() || !p.is_in_correct_subgroup_assuming_on_curve() {
        return Err(SerializeError::Point(what));
    }
    Ok(p)
}

pub(crate) fn g2(coords: &[Vec<String>], what: &'static str) -> Result<G2Affine, SerializeError> {
    if coords.len() < 2 || coords[0].len() < 2 || coords[1].len() < 2 {
        return Err(SerializeError::Shape(what));
    }
    if coords.get(2).map(|z| z.iter().all(|c| c == "0")).unwrap_or(false) {
        return Ok(G2Affine::zero());
    }
    let x = Fq2::new(base(&coords[0][0])?, base(&coords[0][1])?);
    let y = Fq2::new(base(&coords[1][0])?, base(&coords[1][1])?);
    let p = G2Affine::new_unchecked(x, y);
    if !p.is_on_curve() || !p.is_in_correct_subgroup_assuming_on_curve() {
        return Err(SerializeError::Point(what));
    }
    Ok(p)
}

fn decimal<F: PrimeField>(f: &F) -> String {
    BigUint::from_bytes_le(&f.into_bigint().to_bytes_le()).to_string()
}

pub(crate) fn g1_to_snarkjs(p: &G1Affine) -> Vec<String> {
    if p.infinity {
        return vec!["0".to_string(), "1".to_string(), "0".to_string()];
    }
    vec![decimal(&p.x), decimal(&p.y), "1".to_string()]
}

pub(crate) fn g2_to_snarkjs(p: &G2Affine) -> Vec<Vec<String>> {
    if p.infinity {
        return vec![
            vec!["0".to_string(), "0".to_string()],
            vec!["1".to_string(), "0".to_string()],
            vec!["0".to_string(), "0".to_string()],
        ];
    }
    vec![
        vec![decimal(&p.x.c0), decimal(&p.x.c1)],
        vec![decimal(&p.y.c0), decimal(&p.y.c1)],
        vec!["1".to_string(), "0".to_string()],
    ]
}

fn compressed<T: CanonicalSerialize>(value: &T) -> Result<String, SerializeError> {
    let mut bytes = Vec::new();
    value
        .serialize_compressed(&mut bytes)
        .map_err(|e| SerializeError::Ark(e.to_string()))?;
    Ok(bytes_to_hex(&bytes))
}

// ── Public API ──────────────────────────────────────────────

pub fn serialize_proof(proof: &SnarkjsProof) -> Result<ProofParts, SerializeError> {
    Ok(ProofParts {
        a: compressed(&g1(&proof.pi_a, "pi_a")?)?,
        b: compressed(&g2(&proof.pi_b, "pi_b")?)?,
        c: compressed(&g1(&proof.pi_c, "pi_c")?)?,
    })
}

/// Decimal signal → 32-byte little-endian hex (64 digits, zero padded).
pub fn serialize_public_signal(signal: &str) -> Result<String, SerializeError> {
    let f = Fr::from_str(signal.trim()).map_err(|_| SerializeError::Coordinate(signal.to_string()))?;
    compressed(&f)
}

pub fn serialize_vkey(vk: &SnarkjsVkey) -> Result<VkeyParts, SerializeError> {
    Ok(VkeyParts {
        alpha_g1: compressed(&g1(&vk.vk_alpha_1, "vk_alpha_1")?)?,
        beta_g2: compressed(&g2(&vk.vk_beta_2, "vk_beta_2")?)?,
        gamma_g2: compressed(&g2(&vk.vk_gamma_2, "vk_gamma_2")?)?,
        delta_g2: compressed(&g2(&vk.vk_delta_2, "vk_delta_2")?)?,
        gamma_abc_g1: vk
            .ic
            .iter()
            .map(|p| g1(p, "IC").and_then(|p| compressed(&p)))
            .collect::<Result<_, _>>()?,
    })
}
