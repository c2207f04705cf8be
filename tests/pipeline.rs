//! End-to-end pipeline tests: JSON credentials in, verified proof out.

use std::sync::atomic::AtomicBool;

use frogfold::{
    artifacts::{self, FsStore, ProvingArtifactSet, VerifyingArtifactSet},
    assemble::{self, SessionConstants},
    badge::{BadgeError, BadgeIssuer, GateOutcome, ThresholdGate},
    eddsa::SigningKey,
    encoding,
    order::{self, DuplicatePolicy},
    poseidon, prover,
    record::{self, OwnerIdentity, ParserConfig, RawCredential},
    verifier::{self, VerifyError},
    ScalarField,
};
use rand::SeedableRng;
use serde_json::json;
use tempfile::TempDir;

fn dec(x: &ScalarField) -> String {
    encoding::field_to_decimal(x)
}

/// A flat-shape credential with a genuine signature over the protocol's
/// 13-field message tuple.
fn flat_credential(frog_id: u64, key: &SigningKey, owner: &OwnerIdentity) -> serde_json::Value {
    let owner_id = owner.commitment();
    let timestamp = 1_700_000_000 + frog_id;
    let attrs = [frog_id, 1, 2, 3, 4, 5, 6, 7];
    let message = poseidon::hash(&[
        ScalarField::from(attrs[0]),
        ScalarField::from(attrs[1]),
        ScalarField::from(attrs[2]),
        ScalarField::from(attrs[3]),
        ScalarField::from(attrs[4]),
        ScalarField::from(attrs[5]),
        ScalarField::from(attrs[6]),
        ScalarField::from(attrs[7]),
        ScalarField::from(timestamp),
        owner_id,
        ScalarField::from(0u64),
        ScalarField::from(0u64),
        ScalarField::from(0u64),
    ]);
    let signature = key.sign(message);
    let public = key.public();
    json!({
        "frogId": attrs[0].to_string(),
        "biome": attrs[1].to_string(),
        "rarity": attrs[2].to_string(),
        "temperament": attrs[3].to_string(),
        "jump": attrs[4].to_string(),
        "speed": attrs[5].to_string(),
        "intelligence": attrs[6].to_string(),
        "beauty": attrs[7].to_string(),
        "timestampSigned": timestamp.to_string(),
        "ownerSemaphoreId": dec(&owner_id),
        "frogSignerPubkeyAx": dec(&public.x),
        "frogSignerPubkeyAy": dec(&public.y),
        "frogSignatureR8x": dec(&signature.r8.x),
        "frogSignatureR8y": dec(&signature.r8.y),
        "frogSignatureS": encoding::field_to_decimal(&signature.s),
    })
}

struct Session {
    _dir: TempDir,
    proving: ProvingArtifactSet,
    verifying: VerifyingArtifactSet,
    identity: OwnerIdentity,
    sequence: order::OrderedRecordSequence,
}

fn session(count: u64, seed: u64) -> Session {
    let dir = TempDir::new().unwrap();
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    artifacts::setup(dir.path(), &mut rng).unwrap();
    let store = FsStore::new(dir.path());
    let proving = ProvingArtifactSet::load(&store).unwrap();
    let verifying = VerifyingArtifactSet::load(&store).unwrap();

    let key = SigningKey::random(&mut rng);
    let identity = OwnerIdentity {
        trapdoor: ScalarField::from(1001u64),
        nullifier: ScalarField::from(1002u64),
    };
    let config = ParserConfig {
        allowed_signers: vec![key.public()],
    };
    let records = (1..=count)
        .map(|i| {
            let value = flat_credential(i, &key, &identity);
            let raw = RawCredential::from_json(&value.to_string()).unwrap();
            record::parse(&raw, &config).unwrap()
        })
        .collect();
    let sequence = order::order(records, DuplicatePolicy::Reject).unwrap();
    Session {
        _dir: dir,
        proving,
        verifying,
        identity,
        sequence,
    }
}

fn prove(session: &Session, seed: u64) -> prover::Proof {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let cancel = AtomicBool::new(false);
    prover::prove(
        &session.proving,
        &session.sequence,
        &session.identity,
        &SessionConstants::default(),
        &cancel,
        &mut rng,
        |_| {},
    )
    .unwrap()
}

#[test]
fn proves_and_verifies_three_credentials() {
    let session = session(3, 51);
    let proof = prove(&session, 52);
    let bytes = proof.to_bytes().unwrap();
    assert_eq!(verifier::verify_bytes(&session.verifying, &bytes).unwrap(), 3);
}

#[test]
fn assembled_inputs_carry_session_constants() {
    let session = session(2, 53);
    let inputs = assemble::assemble(
        &session.sequence,
        &session.identity,
        &SessionConstants::default(),
    )
    .unwrap();
    assert_eq!(inputs.len(), 2);
    for step in inputs.steps.values() {
        assert_eq!(step.watermark, "2718");
        assert_eq!(
            step.external_nullifier,
            "10661416524110617647338817740993999665252234336167220367090184441007783393"
        );
    }
}

#[test]
fn proof_is_bound_to_its_artifact_set() {
    let session_a = session(2, 54);
    let proof = prove(&session_a, 55);

    let other_dir = TempDir::new().unwrap();
    let mut rng = rand::rngs::StdRng::seed_from_u64(56);
    artifacts::setup(other_dir.path(), &mut rng).unwrap();
    let other = VerifyingArtifactSet::load(&FsStore::new(other_dir.path())).unwrap();

    assert!(matches!(
        verifier::verify(&other, &proof),
        Err(VerifyError::ArtifactMismatch { .. })
    ));
}

#[test]
fn tampered_proof_bytes_fail() {
    let session = session(2, 57);
    let proof = prove(&session, 58);
    let reference = proof.to_bytes().unwrap();
    // flip one bit somewhere in the cryptographic payload
    let mut bytes = reference.clone();
    let target = bytes.len() - 10;
    bytes[target] ^= 1;
    assert!(verifier::verify_bytes(&session.verifying, &bytes).is_err());
    assert_eq!(
        verifier::verify_bytes(&session.verifying, &reference).unwrap(),
        2
    );
}

#[derive(Default)]
struct Recorder(Vec<u64>);

impl BadgeIssuer for Recorder {
    fn issue(&mut self, _owner: ScalarField, steps: u64) -> Result<(), BadgeError> {
        self.0.push(steps);
        Ok(())
    }
}

#[test]
fn badge_gate_fires_once_at_threshold() {
    let session = session(3, 59);
    let proof = prove(&session, 60);
    let steps = verifier::verify(&session.verifying, &proof).unwrap();

    let mut gate = ThresholdGate::new(3);
    let mut issuer = Recorder::default();
    let owner = session.identity.commitment();
    assert_eq!(
        gate.observe(owner, steps, &mut issuer).unwrap(),
        GateOutcome::Issued
    );
    assert_eq!(
        gate.observe(owner, steps, &mut issuer).unwrap(),
        GateOutcome::AlreadyIssued
    );
    assert_eq!(issuer.0, vec![3]);
}

#[test]
fn badge_gate_holds_below_threshold() {
    let session = session(2, 61);
    let proof = prove(&session, 62);
    let steps = verifier::verify(&session.verifying, &proof).unwrap();

    let mut gate = ThresholdGate::new(3);
    let mut issuer = Recorder::default();
    assert_eq!(
        gate.observe(session.identity.commitment(), steps, &mut issuer)
            .unwrap(),
        GateOutcome::BelowThreshold
    );
    assert!(issuer.0.is_empty());
}

#[test]
fn arrival_order_does_not_change_the_proof_statement() {
    let dir = TempDir::new().unwrap();
    let mut rng = rand::rngs::StdRng::seed_from_u64(63);
    artifacts::setup(dir.path(), &mut rng).unwrap();
    let store = FsStore::new(dir.path());
    let proving = ProvingArtifactSet::load(&store).unwrap();

    let key = SigningKey::random(&mut rng);
    let identity = OwnerIdentity {
        trapdoor: ScalarField::from(7001u64),
        nullifier: ScalarField::from(7002u64),
    };
    let config = ParserConfig {
        allowed_signers: vec![key.public()],
    };
    let parse = |value: serde_json::Value| {
        let raw = RawCredential::from_json(&value.to_string()).unwrap();
        record::parse(&raw, &config).unwrap()
    };
    let a = parse(flat_credential(1, &key, &identity));
    let b = parse(flat_credential(2, &key, &identity));
    let c = parse(flat_credential(3, &key, &identity));

    let forward = order::order(vec![a.clone(), b.clone(), c.clone()], DuplicatePolicy::Reject)
        .unwrap();
    let backward = order::order(vec![c, b, a], DuplicatePolicy::Reject).unwrap();

    let cancel = AtomicBool::new(false);
    let mut prove_with = |sequence| {
        let mut rng = rand::rngs::StdRng::seed_from_u64(64);
        prover::prove(
            &proving,
            sequence,
            &identity,
            &SessionConstants::default(),
            &cancel,
            &mut rng,
            |_| {},
        )
        .unwrap()
    };
    let proof_forward = prove_with(&forward);
    let proof_backward = prove_with(&backward);
    assert_eq!(proof_forward.final_state, proof_backward.final_state);
}
