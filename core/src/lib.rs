pub mod attempts;
pub mod backend;
pub mod constants;
pub mod curve;
pub mod encode;
pub mod field;
pub mod groth16;
pub mod profile;
pub mod protocol;
pub mod serialize;
pub mod types;

pub use ark_babyjubjub::Fq;
pub use attempts::{decode_attempt, latest_rows, DecodeError, TableRow};
pub use backend::{Circuit, ProofBackend, ProofError, ProofOutput, TransparentBackend, Witness};
pub use constants::*;
pub use curve::{generator, CurveError, CurvePoint, SecretScalar};
pub use encode::{EncodeError, PointEncoder, TryAndIncrement};
pub use field::*;
pub use groth16::Groth16Verifier;
pub use profile::{next_unanswered, ProfileEvent, ProfileWatch, UserProfile};
pub use protocol::{answers_match, commit, unlock, CommitArgs, CommitProof, ProtocolError, UnlockArgs, UnlockProof};
pub use serialize::{serialize_proof, serialize_public_signal, serialize_vkey, ProofParts, SerializeError, SnarkjsProof, SnarkjsVkey, VkeyParts};
pub use types::*;
