//! Proof verification. The artifact digest comparison runs first: a proof
//! built against a different artifact set is reported as a mismatch, not as
//! a bad proof, and no curve arithmetic is spent on it.

use thiserror::Error;
use tracing::{info, instrument};

use crate::{
    artifacts::VerifyingArtifactSet,
    folding::{self, FoldingError},
    prover::{Proof, ProofCodecError},
    ARTIFACT_FORMAT_VERSION,
};

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Codec(#[from] ProofCodecError),
    #[error("proof has format version {found}, this build expects {expected}")]
    UnsupportedVersion { found: u16, expected: u16 },
    #[error("proof was built against a different artifact set (expected {expected}, got {got})")]
    ArtifactMismatch { expected: String, got: String },
    #[error("proof claims {claimed} steps but carries {commitments} step commitments")]
    StepCountMismatch { claimed: u64, commitments: usize },
    #[error("proof rejected: {0}")]
    Rejected(#[from] FoldingError),
}

/// Verify a proof envelope against a loaded artifact set. Returns the number
/// of folded steps on success.
#[instrument(skip_all, fields(steps = proof.steps))]
pub fn verify(artifacts: &VerifyingArtifactSet, proof: &Proof) -> Result<u64, VerifyError> {
    if proof.format_version != ARTIFACT_FORMAT_VERSION {
        return Err(VerifyError::UnsupportedVersion {
            found: proof.format_version,
            expected: ARTIFACT_FORMAT_VERSION,
        });
    }
    if proof.artifact_digest != artifacts.set_digest {
        return Err(VerifyError::ArtifactMismatch {
            expected: hex::encode(artifacts.set_digest),
            got: hex::encode(proof.artifact_digest),
        });
    }
    if proof.steps as usize != proof.step_commitments.len() {
        return Err(VerifyError::StepCountMismatch {
            claimed: proof.steps,
            commitments: proof.step_commitments.len(),
        });
    }

    let challenges = folding::derive_challenges(&proof.step_commitments);
    let folded = folding::combine_commitments(&proof.step_commitments, &challenges)?;
    let context = folding::DeciderContext {
        artifact_digest: &proof.artifact_digest,
        steps: proof.steps,
        initial_state: &proof.initial_state,
        final_state: &proof.final_state,
    };
    folding::decider_verify(&artifacts.decider_key.basis, &folded, &proof.decider, &context)?;
    info!(steps = proof.steps, "proof verified");
    Ok(proof.steps)
}

/// Parse a serialized proof envelope and verify it.
pub fn verify_bytes(artifacts: &VerifyingArtifactSet, bytes: &[u8]) -> Result<u64, VerifyError> {
    let proof = Proof::from_bytes(bytes)?;
    verify(artifacts, &proof)
}
