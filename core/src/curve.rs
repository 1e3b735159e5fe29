//! Baby Jubjub points and secret scalars.
//!
//! Points are kept in circom coordinates so they can be fed to the circuits
//! and compared with public signals without any conversion.

use std::fmt;

use ark_babyjubjub::{EdwardsAffine, Fq, Fr};
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::{PrimeField, Zero};
use ark_std::UniformRand;
use num_bigint::BigUint;
use rand::Rng;

use crate::field::{self, FieldError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CurveError {
    #[error("point is not on the curve")]
    NotOnCurve,
    #[error("point is not in the prime-order subgroup")]
    NotInSubgroup,
    #[error("point is the identity")]
    Identity,
    #[error("secret scalar must be non-zero")]
    ZeroScalar,
    #[error("secret scalar is not below the subgroup order")]
    ScalarOutOfRange,
    #[error(transparent)]
    Field(#[from] FieldError),
}

/// A validated point of the prime-order subgroup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurvePoint {
    x: Fq,
    y: Fq,
}

impl CurvePoint {
    pub fn new(x: Fq, y: Fq) -> Result<Self, CurveError> {
        Self::from_affine(EdwardsAffine::new_unchecked(x, y))
    }

    pub(crate) fn from_affine(p: EdwardsAffine) -> Result<Self, CurveError> {
        if !p.is_on_curve() {
            return Err(CurveError::NotOnCurve);
        }
        if !p.is_in_correct_subgroup_assuming_on_curve() {
            return Err(CurveError::NotInSubgroup);
        }
        if p.is_zero() {
            return Err(CurveError::Identity);
        }
        Ok(Self { x: p.x, y: p.y })
    }

    pub fn from_decimal(x: &str, y: &str) -> Result<Self, CurveError> {
        Self::new(field::field_from_decimal(x)?, field::field_from_decimal(y)?)
    }

    /// Decodes a point stored on the ledger as two little-endian byte strings.
    pub fn from_le_hex(x: &str, y: &str) -> Result<Self, CurveError> {
        Self::new(field::hex_le_to_field(x)?, field::hex_le_to_field(y)?)
    }

    pub fn x(&self) -> Fq {
        self.x
    }

    pub fn y(&self) -> Fq {
        self.y
    }

    pub fn x_decimal(&self) -> String {
        field::field_to_decimal(&self.x)
    }

    pub fn y_decimal(&self) -> String {
        field::field_to_decimal(&self.y)
    }

    pub(crate) fn to_affine(self) -> EdwardsAffine {
        EdwardsAffine::new_unchecked(self.x, self.y)
    }

    /// `k·self`. Non-zero scalars keep the result inside the subgroup and away
    /// from the identity.
    pub fn mul(&self, k: &SecretScalar) -> CurvePoint {
        let p = (self.to_affine() * k.0).into_affine();
        CurvePoint { x: p.x, y: p.y }
    }
}

/// Secret multiplier, strictly below the subgroup order and never zero.
///
/// Deliberately not `Serialize`; `Debug` does not print the value.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretScalar(Fr);

impl SecretScalar {
    /// Fresh scalar for a single answer attempt.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        loop {
            let k = Fr::rand(rng);
            if !k.is_zero() {
                return Self(k);
            }
        }
    }

    pub fn from_decimal(s: &str) -> Result<Self, CurveError> {
        let n = BigUint::parse_bytes(s.trim().as_bytes(), 10)
            .ok_or_else(|| FieldError::InvalidDecimal(s.to_string()))?;
        let order: BigUint = Fr::MODULUS.into();
        if n >= order {
            return Err(CurveError::ScalarOutOfRange);
        }
        let k = Fr::from_le_bytes_mod_order(&n.to_bytes_le());
        if k.is_zero() {
            return Err(CurveError::ZeroScalar);
        }
        Ok(Self(k))
    }

    /// For witnesses and key files only; never log the result.
    pub fn to_decimal(&self) -> String {
        BigUint::from(self.0.into_bigint()).to_string()
    }
}

impl fmt::Debug for SecretScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretScalar(<redacted>)")
    }
}

/// Prime-order subgroup generator.
pub fn generator() -> CurvePoint {
    let g = EdwardsAffine::generator();
    CurvePoint { x: g.x, y: g.y }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SUBGROUP_ORDER;

    #[test]
    fn generator_is_valid() {
        let g = generator();
        assert_eq!(CurvePoint::new(g.x(), g.y()), Ok(g));
    }

    #[test]
    fn scalar_multiplication_commutes() {
        let mut rng = rand::thread_rng();
        let h = generator().mul(&SecretScalar::random(&mut rng));
        for _ in 0..20 {
            let k = SecretScalar::random(&mut rng);
            let a = SecretScalar::random(&mut rng);
            assert_eq!(h.mul(&k).mul(&a), h.mul(&a).mul(&k));
        }
    }

    #[test]
    fn products_stay_valid() {
        let mut rng = rand::thread_rng();
        let p = generator().mul(&SecretScalar::random(&mut rng));
        assert!(CurvePoint::new(p.x(), p.y()).is_ok());
        assert!(CurvePoint::from_decimal(&p.x_decimal(), &p.y_decimal()).is_ok());
    }

    #[test]
    fn scalar_range_enforced() {
        assert_eq!(
            SecretScalar::from_decimal(SUBGROUP_ORDER).unwrap_err(),
            CurveError::ScalarOutOfRange
        );
        assert_eq!(SecretScalar::from_decimal("0").unwrap_err(), CurveError::ZeroScalar);
        assert!(SecretScalar::from_decimal("1584561490597234433444721371246996260316395925710778034972022929403589928560").is_ok());
    }

    #[test]
    fn off_curve_rejected() {
        let g = generator();
        assert_eq!(
            CurvePoint::new(g.x(), g.y() + Fq::from(1u64)),
            Err(CurveError::NotOnCurve)
        );
    }

    #[test]
    fn debug_hides_scalar() {
        let k = SecretScalar::from_decimal("42").unwrap();
        assert_eq!(format!("{k:?}"), "SecretScalar(<redacted>)");
        assert_eq!(k.to_decimal(), "42");
    }
}
