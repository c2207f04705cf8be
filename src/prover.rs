//! The proving driver. Walks the ordered sequence step by step: check the
//! step witness (signature and owner binding), commit the input vector, fold
//! it into the accumulator, then produce the decider proof over the final
//! accumulator. The resulting proof envelope is constant size in everything
//! except the per-step commitment list.

use std::sync::atomic::{AtomicBool, Ordering};

use ark_ff::UniformRand;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::rand::Rng;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::{
    artifacts::{ArtifactError, ProvingArtifactSet},
    assemble::{self, AssembleError, SessionConstants},
    eddsa::{self, SignatureError},
    folding::{self, Accumulator, DeciderContext, DeciderProof},
    order::OrderedRecordSequence,
    record::OwnerIdentity,
    Curve, ScalarField, ARTIFACT_FORMAT_VERSION, STATE_WIDTH,
};

const PROOF_MAGIC: [u8; 4] = *b"FGPF";

#[derive(Debug, Error)]
pub enum ProveError {
    #[error(transparent)]
    Artifacts(#[from] ArtifactError),
    #[error(transparent)]
    Assemble(#[from] AssembleError),
    #[error("no records to prove")]
    EmptySequence,
    #[error("step {step}: signature check failed: {source}")]
    WitnessGeneration {
        step: u64,
        source: SignatureError,
    },
    #[error("step {step}: record owner does not match the proving identity")]
    OwnerBinding { step: u64 },
    #[error("proving was cancelled")]
    Cancelled,
}

/// Where a proving session currently is. Reported through the progress
/// callback so a caller can surface it without polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProverStage {
    LoadingArtifacts,
    Folding { step: u64, total: u64 },
    Deciding,
    Done,
}

/// The self-contained proof envelope. Everything a verifier needs beyond its
/// own artifact set is in here.
#[derive(Debug, Clone, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct Proof {
    pub format_version: u16,
    pub artifact_digest: [u8; 32],
    pub steps: u64,
    pub initial_state: [ScalarField; STATE_WIDTH],
    pub final_state: [ScalarField; STATE_WIDTH],
    pub step_commitments: Vec<Curve>,
    pub decider: DeciderProof,
}

#[derive(Debug, Error)]
pub enum ProofCodecError {
    #[error("not a proof envelope")]
    BadMagic,
    #[error("proof envelope is malformed: {0}")]
    Malformed(String),
}

impl Proof {
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProofCodecError> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&PROOF_MAGIC);
        self.serialize_compressed(&mut bytes)
            .map_err(|e| ProofCodecError::Malformed(e.to_string()))?;
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProofCodecError> {
        if bytes.len() < 4 || bytes[..4] != PROOF_MAGIC {
            return Err(ProofCodecError::BadMagic);
        }
        Self::deserialize_compressed(&bytes[4..])
            .map_err(|e| ProofCodecError::Malformed(e.to_string()))
    }
}

/// Run a full proving session over an ordered sequence.
///
/// `cancel` is checked between steps; a session over many records stops
/// within one step of the flag being raised.
#[instrument(skip_all, fields(steps = sequence.len()))]
pub fn prove<R: Rng>(
    artifacts: &ProvingArtifactSet,
    sequence: &OrderedRecordSequence,
    identity: &OwnerIdentity,
    constants: &SessionConstants,
    cancel: &AtomicBool,
    rng: &mut R,
    mut progress: impl FnMut(ProverStage),
) -> Result<Proof, ProveError> {
    if sequence.is_empty() {
        return Err(ProveError::EmptySequence);
    }
    let total = sequence.len() as u64;
    let inputs = assemble::assemble(sequence, identity, constants)?;
    let owner_commitment = identity.commitment();

    let initial_state = folding::initial_state();
    let mut state = initial_state;
    let mut accumulator = Accumulator::default();
    let mut step_commitments = Vec::with_capacity(sequence.len());
    let mut step_data = Vec::with_capacity(sequence.len());

    // First pass: witness checks and commitments. Challenges depend on the
    // full commitment list, so folding happens in a second pass.
    for (index, record) in sequence.iter() {
        if cancel.load(Ordering::Relaxed) {
            return Err(ProveError::Cancelled);
        }
        progress(ProverStage::Folding { step: index, total });

        eddsa::verify(&record.signature, &record.signer_public_key, record.message_hash())
            .map_err(|source| ProveError::WitnessGeneration { step: index, source })?;
        if owner_commitment != record.owner_semaphore_id {
            return Err(ProveError::OwnerBinding { step: index });
        }

        let v = inputs.steps[&index].to_field_vector()?;
        let r = ScalarField::rand(rng);
        let commitment = artifacts.params.commit(&v, r);
        debug!(step = index, "committed step input");
        step_commitments.push(commitment);
        step_data.push((v, r));
    }

    let challenges = folding::derive_challenges(&step_commitments);
    for ((commitment, (v, r)), rho) in step_commitments.iter().zip(&step_data).zip(&challenges) {
        if cancel.load(Ordering::Relaxed) {
            return Err(ProveError::Cancelled);
        }
        state = folding::fold_state(&state, v);
        accumulator.fold(commitment, v, *r, *rho);
    }
    info!(steps = total, "folded all steps");

    progress(ProverStage::Deciding);
    let context = DeciderContext {
        artifact_digest: &artifacts.set_digest,
        steps: total,
        initial_state: &initial_state,
        final_state: &state,
    };
    let decider = folding::decider_prove(&artifacts.decider_key.basis, &accumulator, &context, rng);
    progress(ProverStage::Done);

    Ok(Proof {
        format_version: ARTIFACT_FORMAT_VERSION,
        artifact_digest: artifacts.set_digest,
        steps: total,
        initial_state,
        final_state: state,
        step_commitments,
        decider,
    })
}
