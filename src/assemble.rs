//! Circuit input assembly: from the ordered record sequence to the positional
//! step inputs the folding circuit consumes.
//!
//! The proving boundary does not accept native big-integer types, only
//! strings: every field crosses it as a base-10 non-negative integer string.
//! Two protocol-wide constants are injected into every step: the external
//! nullifier (a domain-separation hash of a fixed label, computed once per
//! process) and the owner-binding watermark.
//!
//! Any value outside the proving field's range fails fast. Silent modular
//! reduction would let an attacker craft a record whose true value differs
//! from its in-circuit value.

use std::collections::BTreeMap;

use ark_ff::PrimeField;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::{
    encoding::{self, EncodingError},
    order::OrderedRecordSequence,
    record::{CanonicalRecord, OwnerIdentity},
    ScalarField, DEFAULT_WATERMARK, EXTERNAL_NULLIFIER_LABEL, STEP_INPUT_WIDTH,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssembleError {
    #[error("step input field {field:?} is out of range: {source}")]
    OutOfRange {
        field: &'static str,
        source: EncodingError,
    },
}

/// Domain-separation hash of a constant label: SHA-256 interpreted big-endian
/// and shifted right 8 bits so the result always fits the field.
pub fn derive_external_nullifier(label: &str) -> ScalarField {
    let digest = Sha256::digest(label.as_bytes());
    let n = BigUint::from_bytes_be(&digest) >> 8u32;
    // 248 bits, always below the 254-bit modulus
    ScalarField::from_le_bytes_mod_order(&n.to_bytes_le())
}

/// The constants shared by every record and every step of one proof session.
/// Computed once at process start and threaded through explicitly.
#[derive(Debug, Clone, Copy)]
pub struct SessionConstants {
    pub external_nullifier: ScalarField,
    pub watermark: ScalarField,
}

impl Default for SessionConstants {
    fn default() -> Self {
        Self {
            external_nullifier: derive_external_nullifier(EXTERNAL_NULLIFIER_LABEL),
            watermark: ScalarField::from(DEFAULT_WATERMARK),
        }
    }
}

/// One folding step's input record: every field a base-10 integer string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepInput {
    pub frog_id: String,
    pub biome: String,
    pub rarity: String,
    pub temperament: String,
    pub jump: String,
    pub speed: String,
    pub intelligence: String,
    pub beauty: String,
    pub timestamp_signed: String,
    pub owner_semaphore_id: String,
    pub frog_signer_pubkey_ax: String,
    pub frog_signer_pubkey_ay: String,
    pub semaphore_identity_trapdoor: String,
    pub semaphore_identity_nullifier: String,
    pub watermark: String,
    pub frog_signature_r8x: String,
    pub frog_signature_r8y: String,
    pub frog_signature_s: String,
    pub external_nullifier: String,
    pub reserved_field1: String,
    pub reserved_field2: String,
    pub reserved_field3: String,
}

impl StepInput {
    fn from_record(
        record: &CanonicalRecord,
        identity: &OwnerIdentity,
        constants: &SessionConstants,
    ) -> Self {
        let dec = encoding::field_to_decimal::<ScalarField>;
        StepInput {
            frog_id: record.frog_id.to_string(),
            biome: record.biome.to_string(),
            rarity: record.rarity.to_string(),
            temperament: record.temperament.to_string(),
            jump: record.jump.to_string(),
            speed: record.speed.to_string(),
            intelligence: record.intelligence.to_string(),
            beauty: record.beauty.to_string(),
            timestamp_signed: record.timestamp_signed.to_string(),
            owner_semaphore_id: dec(&record.owner_semaphore_id),
            frog_signer_pubkey_ax: dec(&record.signer_public_key.x),
            frog_signer_pubkey_ay: dec(&record.signer_public_key.y),
            semaphore_identity_trapdoor: dec(&identity.trapdoor),
            semaphore_identity_nullifier: dec(&identity.nullifier),
            watermark: dec(&constants.watermark),
            frog_signature_r8x: dec(&record.signature.r8.x),
            frog_signature_r8y: dec(&record.signature.r8.y),
            frog_signature_s: encoding::field_to_decimal(&record.signature.s),
            external_nullifier: dec(&constants.external_nullifier),
            reserved_field1: dec(&record.reserved[0]),
            reserved_field2: dec(&record.reserved[1]),
            reserved_field3: dec(&record.reserved[2]),
        }
    }

    /// The 22 input fields in the circuit's positional order. This order is
    /// part of the protocol and must match the witness-generator program.
    pub fn to_field_vector(&self) -> Result<[ScalarField; STEP_INPUT_WIDTH], AssembleError> {
        let fields: [(&'static str, &String); STEP_INPUT_WIDTH] = [
            ("frogId", &self.frog_id),
            ("timestampSigned", &self.timestamp_signed),
            ("ownerSemaphoreId", &self.owner_semaphore_id),
            ("frogSignerPubkeyAx", &self.frog_signer_pubkey_ax),
            ("frogSignerPubkeyAy", &self.frog_signer_pubkey_ay),
            ("semaphoreIdentityTrapdoor", &self.semaphore_identity_trapdoor),
            ("semaphoreIdentityNullifier", &self.semaphore_identity_nullifier),
            ("watermark", &self.watermark),
            ("frogSignatureR8x", &self.frog_signature_r8x),
            ("frogSignatureR8y", &self.frog_signature_r8y),
            ("frogSignatureS", &self.frog_signature_s),
            ("externalNullifier", &self.external_nullifier),
            ("biome", &self.biome),
            ("rarity", &self.rarity),
            ("temperament", &self.temperament),
            ("jump", &self.jump),
            ("speed", &self.speed),
            ("intelligence", &self.intelligence),
            ("beauty", &self.beauty),
            ("reservedField1", &self.reserved_field1),
            ("reservedField2", &self.reserved_field2),
            ("reservedField3", &self.reserved_field3),
        ];
        let mut out = [ScalarField::from(0u64); STEP_INPUT_WIDTH];
        for (slot, (name, value)) in out.iter_mut().zip(fields) {
            *slot = encoding::field_from_decimal(value)
                .map_err(|source| AssembleError::OutOfRange { field: name, source })?;
        }
        Ok(out)
    }
}

/// The positional input structure for one proof session, keyed by the
/// orderer's 1-based step indices.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CircuitInputSet {
    pub steps: BTreeMap<u64, StepInput>,
}

impl CircuitInputSet {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Map the ordered records into the circuit input set. The orderer's index
/// assignment is preserved exactly; nothing is re-sorted or renumbered here.
pub fn assemble(
    sequence: &OrderedRecordSequence,
    identity: &OwnerIdentity,
    constants: &SessionConstants,
) -> Result<CircuitInputSet, AssembleError> {
    let mut steps = BTreeMap::new();
    for (index, record) in sequence.iter() {
        let input = StepInput::from_record(record, identity, constants);
        // fail fast, before any proving starts
        input.to_field_vector()?;
        steps.insert(index, input);
    }
    Ok(CircuitInputSet { steps })
}
