//! Deterministic string → curve point encoding.

use ark_babyjubjub::{EdwardsAffine, Fq};
use ark_ec::AffineRepr;
use ark_ff::{Field, One, PrimeField};
use sha2::{Digest, Sha256};

use crate::constants::{EDWARDS_A, EDWARDS_D, ENCODER_DOMAIN, ENCODER_MAX_TRIES};
use crate::curve::CurvePoint;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("no curve point found for message after {0} attempts")]
    Exhausted(u16),
}

/// Maps answer strings to points. Both parties must use the same encoder or
/// equal answers will simply fail to match.
pub trait PointEncoder {
    fn encode(&self, message: &str) -> Result<CurvePoint, EncodeError>;
}

/// Try-and-increment: hash `(domain, message, counter)` to an x coordinate
/// until the curve equation has a solution, then clear the cofactor.
#[derive(Clone, Copy, Debug, Default)]
pub struct TryAndIncrement;

impl TryAndIncrement {
    fn candidate_x(message: &str, counter: u16) -> Fq {
        let mut hasher = Sha256::new();
        hasher.update(ENCODER_DOMAIN);
        hasher.update((message.len() as u64).to_le_bytes());
        hasher.update(message.as_bytes());
        hasher.update(counter.to_le_bytes());
        Fq::from_le_bytes_mod_order(&hasher.finalize())
    }

    /// y² = (1 − a·x²) / (1 − d·x²)
    fn solve_y(x: Fq) -> Option<Fq> {
        let x2 = x.square();
        let num = Fq::one() - Fq::from(EDWARDS_A) * x2;
        let den = Fq::one() - Fq::from(EDWARDS_D) * x2;
        (num * den.inverse()?).sqrt()
    }
}

impl PointEncoder for TryAndIncrement {
    fn encode(&self, message: &str) -> Result<CurvePoint, EncodeError> {
        for counter in 0..ENCODER_MAX_TRIES {
            let x = Self::candidate_x(message, counter);
            let Some(y) = Self::solve_y(x) else {
                continue;
            };
            let p = EdwardsAffine::new_unchecked(x, y);
            if !p.is_on_curve() {
                continue;
            }
            if let Ok(point) = CurvePoint::from_affine(p.mul_by_cofactor()) {
                return Ok(point);
            }
        }
        Err(EncodeError::Exhausted(ENCODER_MAX_TRIES))
    }
}
