//! Native Groth16 verification of snarkjs artifacts on BN254.

use std::str::FromStr;

use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof, VerifyingKey};
use ark_snark::SNARK;

use crate::backend::{ProofError, ProofOutput};
use crate::serialize::{g1, g2, SnarkjsProof, SnarkjsVkey};

pub(crate) fn proof_to_ark(proof: &SnarkjsProof) -> Result<Proof<Bn254>, ProofError> {
    Ok(Proof {
        a: g1(&proof.pi_a, "pi_a")?,
        b: g2(&proof.pi_b, "pi_b")?,
        c: g1(&proof.pi_c, "pi_c")?,
    })
}

pub(crate) fn vkey_to_ark(vk: &SnarkjsVkey) -> Result<VerifyingKey<Bn254>, ProofError> {
    Ok(VerifyingKey {
        alpha_g1: g1(&vk.vk_alpha_1, "vk_alpha_1")?,
        beta_g2: g2(&vk.vk_beta_2, "vk_beta_2")?,
        gamma_g2: g2(&vk.vk_gamma_2, "vk_gamma_2")?,
        delta_g2: g2(&vk.vk_delta_2, "vk_delta_2")?,
        gamma_abc_g1: vk
            .ic
            .iter()
            .map(|p| g1(p, "IC"))
            .collect::<Result<_, _>>()?,
    })
}

pub(crate) fn signals_to_ark(signals: &[String]) -> Result<Vec<Fr>, ProofError> {
    signals
        .iter()
        .map(|s| Fr::from_str(s).map_err(|_| ProofError::Artifact(format!("bad public signal {s:?}"))))
        .collect()
}

/// Prepared verifying key for one circuit.
pub struct Groth16Verifier {
    pvk: PreparedVerifyingKey<Bn254>,
    n_public: usize,
}

impl Groth16Verifier {
    pub fn from_snarkjs(vk: &SnarkjsVkey) -> Result<Self, ProofError> {
        if vk.ic.len() != vk.n_public + 1 {
            return Err(ProofError::Artifact(format!(
                "verifying key has {} IC points for {} public inputs",
                vk.ic.len(),
                vk.n_public
            )));
        }
        let vk_ark = vkey_to_ark(vk)?;
        let pvk = Groth16::<Bn254>::process_vk(&vk_ark).map_err(|e| ProofError::Verify(e.to_string()))?;
        Ok(Self {
            pvk,
            n_public: vk.n_public,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, ProofError> {
        let vk: SnarkjsVkey =
            serde_json::from_str(json).map_err(|e| ProofError::Artifact(format!("verifying key: {e}")))?;
        Self::from_snarkjs(&vk)
    }

    pub fn n_public(&self) -> usize {
        self.n_public
    }

    pub fn verify(&self, output: &ProofOutput) -> Result<bool, ProofError> {
        if output.public_signals.len() != self.n_public {
            return Err(ProofError::Artifact(format!(
                "expected {} public signals, got {}",
                self.n_public,
                output.public_signals.len()
            )));
        }
        let proof = proof_to_ark(&output.proof)?;
        let inputs = signals_to_ark(&output.public_signals)?;
        Groth16::<Bn254>::verify_with_processed_vk(&self.pvk, &inputs, &proof)
            .map_err(|e| ProofError::Verify(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::{g1_to_snarkjs, g2_to_snarkjs};
    use ark_relations::lc;
    use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

    /// Knowledge of `a, b` with `a·b = c`, `c` public.
    #[derive(Clone)]
    struct Product {
        a: Fr,
        b: Fr,
    }

    impl ConstraintSynthesizer<Fr> for Product {
        fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
            let a = cs.new_witness_variable(|| Ok(self.a))?;
            let b = cs.new_witness_variable(|| Ok(self.b))?;
            let c = cs.new_input_variable(|| Ok(self.a * self.b))?;
            cs.enforce_constraint(lc!() + a, lc!() + b, lc!() + c)?;
            Ok(())
        }
    }

    fn setup() -> (Groth16Verifier, ProofOutput) {
        // Same deterministic stream as `ark_std::test_rng()`, but typed so it satisfies `CryptoRng`.
        let mut rng = {
            use ark_std::rand::SeedableRng;
            ark_std::rand::rngs::StdRng::from_seed([
                1, 0, 0, 0, 23, 0, 0, 0, 200, 1, 0, 0, 210, 30, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
                0, 0, 0, 0, 0, 0,
            ])
        };
        let circuit = Product {
            a: Fr::from(6u64),
            b: Fr::from(7u64),
        };
        let (pk, vk) = Groth16::<Bn254>::circuit_specific_setup(circuit.clone(), &mut rng).unwrap();
        let proof = Groth16::<Bn254>::prove(&pk, circuit, &mut rng).unwrap();

        let vk_json = SnarkjsVkey {
            protocol: "groth16".into(),
            curve: "bn128".into(),
            n_public: 1,
            vk_alpha_1: g1_to_snarkjs(&vk.alpha_g1),
            vk_beta_2: g2_to_snarkjs(&vk.beta_g2),
            vk_gamma_2: g2_to_snarkjs(&vk.gamma_g2),
            vk_delta_2: g2_to_snarkjs(&vk.delta_g2),
            ic: vk.gamma_abc_g1.iter().map(g1_to_snarkjs).collect(),
        };
        let output = ProofOutput {
            proof: SnarkjsProof {
                pi_a: g1_to_snarkjs(&proof.a),
                pi_b: g2_to_snarkjs(&proof.b),
                pi_c: g1_to_snarkjs(&proof.c),
                protocol: "groth16".into(),
                curve: "bn128".into(),
            },
            public_signals: vec!["42".to_string()],
        };
        (Groth16Verifier::from_snarkjs(&vk_json).unwrap(), output)
    }

    #[test]
    fn accepts_valid_proof() {
        let (verifier, output) = setup();
        assert!(verifier.verify(&output).unwrap());
    }

    #[test]
    fn rejects_wrong_signal() {
        let (verifier, mut output) = setup();
        output.public_signals[0] = "43".to_string();
        assert!(!verifier.verify(&output).unwrap());
    }

    #[test]
    fn signal_count_checked() {
        let (verifier, mut output) = setup();
        output.public_signals.push("1".to_string());
        assert!(matches!(verifier.verify(&output), Err(ProofError::Artifact(_))));
    }
}
