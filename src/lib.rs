//! Frogfold is a proof pipeline letting a holder of signed "frog" credential
//! records prove, in zero knowledge, that they own at least N of them.
//!
//! The pipeline turns an unordered set of heterogeneous signed records into a
//! canonical ordered sequence, folds the sequence one record at a time into a
//! running accumulator (IVC-style), and wraps the final state in a succinct
//! decider proof. A verifier holding the matching artifact set checks the
//! proof and learns exactly one thing: the number of validly-signed,
//! owner-bound records that were folded.
//!
//! The stages are:
//! - [record]: normalize a raw signed credential into a [record::CanonicalRecord]
//! - [order]: fingerprint and sort records into the sequence both sides agree on
//! - [assemble]: map the ordered records to positional circuit step inputs
//! - [prover]: drive one fold per step and emit a serialized proof artifact
//! - [verifier]: check the artifact and return the folded step count

pub mod artifacts;
pub mod assemble;
pub mod badge;
pub mod cli;
pub mod encoding;
pub mod eddsa;
pub mod env;
pub mod folding;
pub mod order;
pub mod poseidon;
pub mod prover;
pub mod record;
pub mod verifier;

/// The proving field. Frog credentials, fingerprints and circuit inputs all
/// live in the scalar field of BN254, which is also the base field of the
/// embedded Baby Jubjub curve the signatures are over.
pub type ScalarField = ark_bn254::Fr;

/// The commitment curve used by the folding engine.
pub type Curve = ark_bn254::G1Affine;
pub type ProjectiveCurve = ark_bn254::G1Projective;

/// The embedded signature curve (Baby Jubjub) and its scalar field.
pub type EmbeddedCurve = ark_ed_on_bn254::EdwardsAffine;
pub type EmbeddedProjectiveCurve = ark_ed_on_bn254::EdwardsProjective;
pub type EmbeddedScalarField = ark_ed_on_bn254::Fr;

/// Number of field elements fed to the circuit at each folding step.
pub const STEP_INPUT_WIDTH: usize = 22;

/// Number of fields hashed into a record fingerprint. This tuple is also the
/// signed message of the credential, so the fingerprint doubles as the
/// signature message hash.
pub const FINGERPRINT_WIDTH: usize = 13;

/// Width of the running folded state. Matches the step circuit's state
/// registers: z_0 is all zeroes and each fold absorbs the step input.
pub const STATE_WIDTH: usize = 3;

/// Label hashed into the protocol-wide external nullifier. The derived value
/// is identical across every record and every proof session.
pub const EXTERNAL_NULLIFIER_LABEL: &str = "hard-coded-zk-eddsa-frog-pcd-nullifier";

/// Per-proof owner-binding watermark constant.
pub const DEFAULT_WATERMARK: u64 = 2718;

/// Version tag carried by artifact sets and proof envelopes. Prover and
/// verifier artifacts must agree on it or verification fails deterministically.
pub const ARTIFACT_FORMAT_VERSION: u16 = 1;
