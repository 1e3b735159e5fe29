// ── Curve ───────────────────────────────────────────────────

/// Baby Jubjub twisted Edwards coefficient `a` (circom coordinates).
pub const EDWARDS_A: u64 = 168700;
/// Baby Jubjub twisted Edwards coefficient `d` (circom coordinates).
pub const EDWARDS_D: u64 = 168696;

/// Order of the prime-order subgroup. Every secret scalar is strictly below it.
pub const SUBGROUP_ORDER: &str =
    "2736030358979909402780800718157159386076813972158567259200215660948447373041";

/// BN254 scalar field modulus, the base field of the curve and the field of
/// every public signal.
pub const FIELD_MODULUS: &str =
    "21888242871839275222246405745257275088548364400416034343698204186575808495617";

// ── Encoding ────────────────────────────────────────────────

/// Ledger account addresses are 32 bytes.
pub const ADDRESS_BYTES: usize = 32;

/// Serialized field elements are 32 bytes little-endian (64 hex digits).
pub const FIELD_BYTES: usize = 32;

/// Domain separator for the string→point encoder.
pub const ENCODER_DOMAIN: &[u8] = b"blindquiz/answer-point/v1";

/// Maximum try-and-increment attempts before giving up.
pub const ENCODER_MAX_TRIES: u16 = 256;

// ── Circuits ────────────────────────────────────────────────

/// Artifact stem of the commit circuit (`<stem>.wasm`, `<stem>.groth16.zkey`, ...).
pub const COMMIT_CIRCUIT: &str = "commit_main";
/// Artifact stem of the unlock circuit.
pub const UNLOCK_CIRCUIT: &str = "unlock_main";

/// Commit public signals: `[keyHash, blinded.x, blinded.y, address]`.
pub const COMMIT_SIGNALS: usize = 4;
/// Unlock public signals start with `[reblinded.x, reblinded.y]`.
pub const UNLOCK_MIN_SIGNALS: usize = 2;
