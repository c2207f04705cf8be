//! The folding engine: commit to each step's input vector, derive a
//! transcript challenge per commitment, and maintain a running accumulator
//! whose size does not grow with the number of steps.
//!
//! Folding state update: `z_{i+1} = sponge(z_i, v_i)` where `v_i` is the
//! step's 22-element input vector. Each step also commits
//! `C_i = <v_i, G> + r_i * H` and the accumulator absorbs it scaled by the
//! transcript challenge `rho_i`. The prover keeps the accumulated opening
//! alongside; the verifier folds commitments only and checks the final
//! decider proof, a Schnorr argument of knowledge of the accumulated
//! opening bound to the session context.

use ark_crypto_primitives::sponge::poseidon::PoseidonSponge;
use ark_crypto_primitives::sponge::{CryptographicSponge, FieldBasedCryptographicSponge};
use ark_ec::{AffineRepr, CurveGroup, VariableBaseMSM};
use ark_ff::{BigInteger, Field, PrimeField, UniformRand};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::rand::Rng;
use thiserror::Error;

use crate::{
    poseidon, Curve, ProjectiveCurve, ScalarField, STATE_WIDTH, STEP_INPUT_WIDTH,
};

const TRANSCRIPT_TAG: &[u8] = b"frogfold.transcript.v1";
const DECIDER_TAG: &[u8] = b"frogfold.decider.v1";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FoldingError {
    #[error("decider proof rejected")]
    Rejected,
    #[error("expected {expected} step commitments, got {got}")]
    CommitmentCount { expected: usize, got: usize },
}

/// Pedersen commitment basis for 22-element step vectors, plus a separate
/// blinding generator. Sampled once at setup; both sides must hold the same
/// basis or nothing verifies.
#[derive(Debug, Clone, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct FoldingParams {
    pub generators: Vec<Curve>,
    pub blinding_base: Curve,
}

impl FoldingParams {
    pub fn setup<R: Rng>(rng: &mut R) -> Self {
        let generators = (0..STEP_INPUT_WIDTH)
            .map(|_| ProjectiveCurve::rand(rng).into_affine())
            .collect();
        FoldingParams {
            generators,
            blinding_base: ProjectiveCurve::rand(rng).into_affine(),
        }
    }

    /// `<v, G> + r * H`
    pub fn commit(&self, v: &[ScalarField; STEP_INPUT_WIDTH], r: ScalarField) -> Curve {
        let scalars: Vec<_> = v.iter().map(|s| s.into_bigint()).collect();
        let msm = ProjectiveCurve::msm_bigint(&self.generators, &scalars);
        (msm + self.blinding_base * r).into_affine()
    }
}

/// `z_{i+1} = sponge(z_i, v_i)`
pub fn fold_state(
    z: &[ScalarField; STATE_WIDTH],
    v: &[ScalarField; STEP_INPUT_WIDTH],
) -> [ScalarField; STATE_WIDTH] {
    let mut sponge = poseidon::sponge();
    sponge.absorb(&z.to_vec());
    sponge.absorb(&v.to_vec());
    let out = sponge.squeeze_native_field_elements(STATE_WIDTH);
    [out[0], out[1], out[2]]
}

pub fn initial_state() -> [ScalarField; STATE_WIDTH] {
    [ScalarField::ZERO; STATE_WIDTH]
}

fn absorb_bytes(sponge: &mut PoseidonSponge<ScalarField>, bytes: &[u8]) {
    // 16-byte limbs always fit the field
    let limbs: Vec<ScalarField> = bytes
        .chunks(16)
        .map(ScalarField::from_le_bytes_mod_order)
        .collect();
    sponge.absorb(&limbs);
}

fn absorb_point(sponge: &mut PoseidonSponge<ScalarField>, point: &Curve) {
    match point.xy() {
        Some((x, y)) => {
            let coords = vec![
                ScalarField::from_le_bytes_mod_order(&x.into_bigint().to_bytes_le()),
                ScalarField::from_le_bytes_mod_order(&y.into_bigint().to_bytes_le()),
                ScalarField::ONE,
            ];
            sponge.absorb(&coords);
        }
        None => sponge.absorb(&vec![ScalarField::ZERO; 3]),
    }
}

/// One challenge per step commitment, in step order. Prover and verifier run
/// the identical transcript, so reordering or replacing a commitment changes
/// every challenge from that point on.
pub fn derive_challenges(commitments: &[Curve]) -> Vec<ScalarField> {
    let mut sponge = poseidon::sponge();
    absorb_bytes(&mut sponge, TRANSCRIPT_TAG);
    let mut challenges = Vec::with_capacity(commitments.len());
    for commitment in commitments {
        absorb_point(&mut sponge, commitment);
        challenges.push(sponge.squeeze_native_field_elements(1)[0]);
    }
    challenges
}

/// `W = sum_i rho_i * C_i`, the verifier's view of the accumulator.
pub fn combine_commitments(
    commitments: &[Curve],
    challenges: &[ScalarField],
) -> Result<ProjectiveCurve, FoldingError> {
    if commitments.len() != challenges.len() {
        return Err(FoldingError::CommitmentCount {
            expected: challenges.len(),
            got: commitments.len(),
        });
    }
    let scalars: Vec<_> = challenges.iter().map(|s| s.into_bigint()).collect();
    Ok(ProjectiveCurve::msm_bigint(commitments, &scalars))
}

/// The prover-side accumulator: the folded commitment together with its
/// opening. The opening stays 22 elements wide no matter how many steps fold
/// into it.
#[derive(Debug, Clone)]
pub struct Accumulator {
    pub commitment: ProjectiveCurve,
    pub opening: [ScalarField; STEP_INPUT_WIDTH],
    pub blinding: ScalarField,
}

impl Default for Accumulator {
    fn default() -> Self {
        Accumulator {
            commitment: ProjectiveCurve::default(),
            opening: [ScalarField::ZERO; STEP_INPUT_WIDTH],
            blinding: ScalarField::ZERO,
        }
    }
}

impl Accumulator {
    pub fn fold(
        &mut self,
        commitment: &Curve,
        v: &[ScalarField; STEP_INPUT_WIDTH],
        r: ScalarField,
        rho: ScalarField,
    ) {
        self.commitment += *commitment * rho;
        for (acc, value) in self.opening.iter_mut().zip(v) {
            *acc += rho * value;
        }
        self.blinding += rho * r;
    }
}

/// The session context the decider challenge is bound to. Changing any piece
/// of it (other artifacts, a different step count, a different final state)
/// produces a different challenge and the proof fails.
#[derive(Debug, Clone, Copy)]
pub struct DeciderContext<'a> {
    pub artifact_digest: &'a [u8; 32],
    pub steps: u64,
    pub initial_state: &'a [ScalarField; STATE_WIDTH],
    pub final_state: &'a [ScalarField; STATE_WIDTH],
}

/// Schnorr argument of knowledge of the accumulator's opening.
#[derive(Debug, Clone, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct DeciderProof {
    pub nonce_commitment: Curve,
    pub responses: Vec<ScalarField>,
    pub blinding_response: ScalarField,
}

fn decider_challenge(
    context: &DeciderContext<'_>,
    folded: &Curve,
    nonce_commitment: &Curve,
) -> ScalarField {
    let mut sponge = poseidon::sponge();
    absorb_bytes(&mut sponge, DECIDER_TAG);
    absorb_bytes(&mut sponge, context.artifact_digest);
    sponge.absorb(&vec![ScalarField::from(context.steps)]);
    sponge.absorb(&context.initial_state.to_vec());
    sponge.absorb(&context.final_state.to_vec());
    absorb_point(&mut sponge, folded);
    absorb_point(&mut sponge, nonce_commitment);
    sponge.squeeze_native_field_elements(1)[0]
}

pub fn decider_prove<R: Rng>(
    params: &FoldingParams,
    accumulator: &Accumulator,
    context: &DeciderContext<'_>,
    rng: &mut R,
) -> DeciderProof {
    let mut nonces = [ScalarField::ZERO; STEP_INPUT_WIDTH];
    for nonce in nonces.iter_mut() {
        *nonce = ScalarField::rand(rng);
    }
    let blinding_nonce = ScalarField::rand(rng);
    let nonce_commitment = params.commit(&nonces, blinding_nonce);

    let folded = accumulator.commitment.into_affine();
    let c = decider_challenge(context, &folded, &nonce_commitment);

    let responses = nonces
        .iter()
        .zip(&accumulator.opening)
        .map(|(t, v)| *t + c * v)
        .collect();
    DeciderProof {
        nonce_commitment,
        responses,
        blinding_response: blinding_nonce + c * accumulator.blinding,
    }
}

pub fn decider_verify(
    params: &FoldingParams,
    folded: &ProjectiveCurve,
    proof: &DeciderProof,
    context: &DeciderContext<'_>,
) -> Result<(), FoldingError> {
    if proof.responses.len() != STEP_INPUT_WIDTH {
        return Err(FoldingError::Rejected);
    }
    let folded_affine = folded.into_affine();
    let c = decider_challenge(context, &folded_affine, &proof.nonce_commitment);

    let scalars: Vec<_> = proof.responses.iter().map(|s| s.into_bigint()).collect();
    let lhs = ProjectiveCurve::msm_bigint(&params.generators, &scalars)
        + params.blinding_base * proof.blinding_response;
    let rhs = ProjectiveCurve::from(proof.nonce_commitment) + *folded * c;
    if lhs == rhs {
        Ok(())
    } else {
        Err(FoldingError::Rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> rand::rngs::StdRng {
        rand::rngs::StdRng::seed_from_u64(11)
    }

    fn sample_vector(seed: u64) -> [ScalarField; STEP_INPUT_WIDTH] {
        let mut v = [ScalarField::ZERO; STEP_INPUT_WIDTH];
        for (j, slot) in v.iter_mut().enumerate() {
            *slot = ScalarField::from(seed * 1000 + j as u64);
        }
        v
    }

    #[test]
    fn state_fold_is_deterministic() {
        let z = initial_state();
        let v = sample_vector(1);
        assert_eq!(fold_state(&z, &v), fold_state(&z, &v));
        assert_ne!(fold_state(&z, &v), fold_state(&z, &sample_vector(2)));
    }

    #[test]
    fn challenges_depend_on_commitment_order() {
        let mut rng = rng();
        let params = FoldingParams::setup(&mut rng);
        let c1 = params.commit(&sample_vector(1), ScalarField::from(7u64));
        let c2 = params.commit(&sample_vector(2), ScalarField::from(9u64));
        let forward = derive_challenges(&[c1, c2]);
        let reversed = derive_challenges(&[c2, c1]);
        assert_ne!(forward, reversed);
    }

    #[test]
    fn decider_round_trip() {
        let mut rng = rng();
        let params = FoldingParams::setup(&mut rng);
        let digest = [7u8; 32];
        let z0 = initial_state();
        let mut z = z0;
        let mut acc = Accumulator::default();
        let mut commitments = Vec::new();
        let vectors: Vec<_> = (1..=3).map(sample_vector).collect();
        let blinds: Vec<_> = (0..3).map(|_| ScalarField::rand(&mut rng)).collect();
        for (v, r) in vectors.iter().zip(&blinds) {
            commitments.push(params.commit(v, *r));
            z = fold_state(&z, v);
        }
        let challenges = derive_challenges(&commitments);
        for ((v, r), rho) in vectors.iter().zip(&blinds).zip(&challenges) {
            acc.fold(&params.commit(v, *r), v, *r, *rho);
        }
        let context = DeciderContext {
            artifact_digest: &digest,
            steps: 3,
            initial_state: &z0,
            final_state: &z,
        };
        let proof = decider_prove(&params, &acc, &context, &mut rng);

        let folded = combine_commitments(&commitments, &challenges).unwrap();
        assert_eq!(folded, acc.commitment);
        decider_verify(&params, &folded, &proof, &context).unwrap();
    }

    #[test]
    fn decider_rejects_wrong_context() {
        let mut rng = rng();
        let params = FoldingParams::setup(&mut rng);
        let digest = [7u8; 32];
        let z0 = initial_state();
        let v = sample_vector(1);
        let r = ScalarField::rand(&mut rng);
        let commitment = params.commit(&v, r);
        let z1 = fold_state(&z0, &v);
        let challenges = derive_challenges(&[commitment]);
        let mut acc = Accumulator::default();
        acc.fold(&commitment, &v, r, challenges[0]);
        let context = DeciderContext {
            artifact_digest: &digest,
            steps: 1,
            initial_state: &z0,
            final_state: &z1,
        };
        let proof = decider_prove(&params, &acc, &context, &mut rng);

        let other_digest = [8u8; 32];
        let wrong = DeciderContext {
            artifact_digest: &other_digest,
            ..context
        };
        assert_eq!(
            decider_verify(&params, &acc.commitment, &proof, &wrong),
            Err(FoldingError::Rejected)
        );
    }

    #[test]
    fn decider_rejects_tampered_response() {
        let mut rng = rng();
        let params = FoldingParams::setup(&mut rng);
        let digest = [1u8; 32];
        let z0 = initial_state();
        let v = sample_vector(4);
        let r = ScalarField::rand(&mut rng);
        let commitment = params.commit(&v, r);
        let z1 = fold_state(&z0, &v);
        let rho = derive_challenges(&[commitment])[0];
        let mut acc = Accumulator::default();
        acc.fold(&commitment, &v, r, rho);
        let context = DeciderContext {
            artifact_digest: &digest,
            steps: 1,
            initial_state: &z0,
            final_state: &z1,
        };
        let mut proof = decider_prove(&params, &acc, &context, &mut rng);
        proof.responses[3] += ScalarField::ONE;
        assert_eq!(
            decider_verify(&params, &acc.commitment, &proof, &context),
            Err(FoldingError::Rejected)
        );
    }

    // absorb/squeeze interleaving must be stateful or challenges would repeat
    #[test]
    fn transcript_challenges_are_distinct() {
        let mut rng = rng();
        let params = FoldingParams::setup(&mut rng);
        let c = params.commit(&sample_vector(5), ScalarField::from(2u64));
        let challenges = derive_challenges(&[c, c, c]);
        assert_ne!(challenges[0], challenges[1]);
        assert_ne!(challenges[1], challenges[2]);
    }
}
