//! Poseidon sponge over the proving field.
//!
//! One fixed parameterization is used everywhere a fixed arithmetic hash is
//! needed: record fingerprints, signature message hashes, owner-identity
//! commitments, and the folding transcript. The parameters are derived with
//! the grain LFSR generator for a 120-bit security target (rate 4, 8 full and
//! 60 partial rounds, S-box x^5), so prover and verifier reconstruct them
//! bit-for-bit from code alone.

use ark_crypto_primitives::sponge::{
    poseidon::{find_poseidon_ark_and_mds, PoseidonConfig, PoseidonSponge},
    CryptographicSponge, FieldBasedCryptographicSponge,
};
use ark_ff::PrimeField;
use once_cell::sync::Lazy;

use crate::ScalarField;

pub fn poseidon_canonical_config<F: PrimeField>() -> PoseidonConfig<F> {
    let full_rounds = 8;
    let partial_rounds = 60;
    let alpha = 5;
    let rate = 4;

    let (ark, mds) = find_poseidon_ark_and_mds::<F>(
        F::MODULUS_BIT_SIZE as u64,
        rate,
        full_rounds,
        partial_rounds,
        0,
    );

    PoseidonConfig::new(
        full_rounds as usize,
        partial_rounds as usize,
        alpha,
        mds,
        ark,
        rate,
        1,
    )
}

static CONFIG: Lazy<PoseidonConfig<ScalarField>> = Lazy::new(poseidon_canonical_config);

pub fn sponge() -> PoseidonSponge<ScalarField> {
    PoseidonSponge::new(&CONFIG)
}

/// Hash a fixed-order tuple of field elements down to one element. The input
/// order is part of the protocol: permuting it changes the digest.
pub fn hash(inputs: &[ScalarField]) -> ScalarField {
    let mut sponge = sponge();
    sponge.absorb(&inputs.to_vec());
    sponge.squeeze_native_field_elements(1)[0]
}
