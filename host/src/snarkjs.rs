//! Proof backend that shells out to `snarkjs groth16 fullprove`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

use blindquiz_core::{Circuit, Groth16Verifier, ProofBackend, ProofError, ProofOutput, SnarkjsProof, Witness};

static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct SnarkjsBackend {
    bin: String,
    circuits_dir: PathBuf,
    verifiers: HashMap<Circuit, Groth16Verifier>,
}

/// `<dir>/<stem>.<suffix>`
pub fn artifact(dir: &Path, circuit: Circuit, suffix: &str) -> PathBuf {
    dir.join(format!("{}.{suffix}", circuit.stem()))
}

fn read(path: &Path) -> Result<String, ProofError> {
    fs::read_to_string(path).map_err(|e| ProofError::Artifact(format!("{}: {e}", path.display())))
}

/// Removes the scratch directory on drop; it holds the secret witness.
struct Scratch(PathBuf);

impl Scratch {
    fn new() -> Result<Self, ProofError> {
        let n = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!("blindquiz-prove-{}-{n}", std::process::id()));
        fs::create_dir_all(&dir).map_err(|e| ProofError::Backend(format!("scratch dir: {e}")))?;
        Ok(Self(dir))
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

impl SnarkjsBackend {
    /// Loads both verifying keys up front so a missing artifact fails at start-up.
    pub fn new(bin: impl Into<String>, circuits_dir: impl Into<PathBuf>) -> Result<Self, ProofError> {
        let circuits_dir = circuits_dir.into();
        let mut verifiers = HashMap::new();
        for circuit in [Circuit::Commit, Circuit::Unlock] {
            let vkey = read(&artifact(&circuits_dir, circuit, "groth16.vkey.json"))?;
            verifiers.insert(circuit, Groth16Verifier::from_json(&vkey)?);
        }
        Ok(Self {
            bin: bin.into(),
            circuits_dir,
            verifiers,
        })
    }
}

impl ProofBackend for SnarkjsBackend {
    #[tracing::instrument(skip_all, fields(circuit = %witness.circuit()))]
    fn full_prove(&self, witness: &Witness) -> Result<ProofOutput, ProofError> {
        let circuit = witness.circuit();
        let scratch = Scratch::new()?;
        let input = scratch.0.join("input.json");
        let proof_path = scratch.0.join("proof.json");
        let public_path = scratch.0.join("public.json");

        fs::write(&input, witness.to_input_json().to_string())
            .map_err(|e| ProofError::Backend(format!("writing witness: {e}")))?;

        let started = std::time::Instant::now();
        let output = Command::new(&self.bin)
            .args(["groth16", "fullprove"])
            .arg(&input)
            .arg(artifact(&self.circuits_dir, circuit, "wasm"))
            .arg(artifact(&self.circuits_dir, circuit, "groth16.zkey"))
            .arg(&proof_path)
            .arg(&public_path)
            .output()
            .map_err(|e| ProofError::Backend(format!("running {}: {e}", self.bin)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            // witness generation failures are assertion errors in the circuit
            if stderr.contains("Assert Failed") || stdout.contains("Assert Failed") {
                return Err(ProofError::Unsatisfiable(circuit, stderr.trim().to_string()));
            }
            return Err(ProofError::Backend(format!("{} exited with {}: {}", self.bin, output.status, stderr.trim())));
        }
        tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "fullprove finished");

        let proof: SnarkjsProof = serde_json::from_str(&read(&proof_path)?)
            .map_err(|e| ProofError::Artifact(format!("proof.json: {e}")))?;
        let public_signals: Vec<String> = serde_json::from_str(&read(&public_path)?)
            .map_err(|e| ProofError::Artifact(format!("public.json: {e}")))?;
        Ok(ProofOutput { proof, public_signals })
    }

    fn verify(&self, circuit: Circuit, output: &ProofOutput) -> Result<bool, ProofError> {
        let verifier = self
            .verifiers
            .get(&circuit)
            .ok_or_else(|| ProofError::Artifact(format!("no verifying key for {circuit}")))?;
        verifier.verify(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_paths() {
        let dir = Path::new("compiled_circuits");
        assert_eq!(
            artifact(dir, Circuit::Commit, "groth16.zkey"),
            Path::new("compiled_circuits/commit_main.groth16.zkey")
        );
        assert_eq!(
            artifact(dir, Circuit::Unlock, "wasm"),
            Path::new("compiled_circuits/unlock_main.wasm")
        );
    }

    #[test]
    fn missing_verifying_key_fails_at_construction() {
        let dir = std::env::temp_dir().join(format!("blindquiz-no-circuits-{}", std::process::id()));
        let err = SnarkjsBackend::new("snarkjs", &dir).err().unwrap();
        assert!(matches!(err, ProofError::Artifact(_)));
    }

    #[test]
    fn scratch_is_removed() {
        let path = {
            let s = Scratch::new().unwrap();
            assert!(s.0.exists());
            s.0.clone()
        };
        assert!(!path.exists());
    }
}
