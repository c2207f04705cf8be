//! Credential parsing: from raw signed wire blobs to [CanonicalRecord]s.
//!
//! Two wire shapes are recognized, each with an explicit discriminant:
//! - the Zupass PCD envelope (`eddsa-frog-pcd` wrapping an `eddsa-pcd`), a
//!   nested structure of JSON-escaped JSON strings carrying a packed
//!   signature and a hex public key;
//! - the flat shape, a map of base-10 strings as produced by older input
//!   dumps, with the signature already unpacked.
//!
//! Both branches produce the same [CanonicalRecord]. Presentation-only fields
//! (name, description, image reference) are stripped: they are not part of
//! the cryptographic claim and must not reach the circuit input. No
//! cryptographically meaningful field is ever defaulted; the three reserved
//! fields are the sole sanctioned default, always zero.

use ark_ff::Zero;
use once_cell::sync::Lazy;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    eddsa::{self, Signature, SignatureError},
    encoding::{self, EncodingError},
    poseidon, EmbeddedCurve, ScalarField, FINGERPRINT_WIDTH,
};

/// The production frog signer. Records signed by any key outside the
/// configured allow-list are rejected at parse time.
pub static FROGCRYPTO_SIGNER: Lazy<EmbeddedCurve> = Lazy::new(|| {
    let x = encoding::field_from_hex_be(
        "0f183dcba06341a4549d78c3f8ca0060a9d6aca795103cb6957d1e2973b5fdeb",
    )
    .expect("frogcrypto signer x is a field element");
    let y = encoding::field_from_hex_be(
        "2a2eb70efeebb5facca2f3668ca5642513be542bab285055ccdcbc18cc125fd5",
    )
    .expect("frogcrypto signer y is a field element");
    EmbeddedCurve::new_unchecked(x, y)
});

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed credential JSON: {0}")]
    MalformedJson(String),
    #[error("unexpected credential type: expected {expected:?}, got {got:?}")]
    UnexpectedType {
        expected: &'static str,
        got: String,
    },
    #[error("credential is missing required field {0:?}")]
    MissingField(&'static str),
    #[error("field {0:?} is not a valid non-negative integer")]
    InvalidNumeric(&'static str),
    #[error("invalid signature: {0}")]
    Signature(#[from] SignatureError),
    #[error("invalid field encoding: {0}")]
    Encoding(#[from] EncodingError),
    #[error("signer public key is not in the issuer allow-list")]
    DisallowedSigner,
}

/// A raw signed credential, tagged by wire shape.
#[derive(Debug, Clone)]
pub enum RawCredential {
    /// Zupass PCD envelope, kept as the raw JSON text of the outer object.
    FrogPcd(String),
    /// Already-flat decimal map.
    Flat(FlatRecord),
}

impl RawCredential {
    /// Classify a JSON blob into one of the known wire shapes.
    pub fn from_json(raw: &str) -> Result<Self, ParseError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| ParseError::MalformedJson(e.to_string()))?;
        match value.get("type").and_then(|t| t.as_str()) {
            Some(FROG_PCD_TYPE) => Ok(RawCredential::FrogPcd(raw.to_string())),
            Some(other) => Err(ParseError::UnexpectedType {
                expected: FROG_PCD_TYPE,
                got: other.to_string(),
            }),
            None if value.get("frogSignatureR8x").is_some() => {
                let flat: FlatRecord = serde_json::from_value(value)
                    .map_err(|e| ParseError::MalformedJson(e.to_string()))?;
                Ok(RawCredential::Flat(flat))
            }
            None => Err(ParseError::MissingField("type")),
        }
    }
}

/// The flat wire shape. All values are base-10 strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatRecord {
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
    pub frog_signature_r8x: String,
    pub frog_signature_r8y: String,
    pub frog_signature_s: String,
    #[serde(default)]
    pub reserved_field1: Option<String>,
    #[serde(default)]
    pub reserved_field2: Option<String>,
    #[serde(default)]
    pub reserved_field3: Option<String>,
}

const FROG_PCD_TYPE: &str = "eddsa-frog-pcd";
const EDDSA_PCD_TYPE: &str = "eddsa-pcd";

#[derive(Deserialize)]
struct OuterEnvelope {
    #[serde(rename = "type")]
    kind: String,
    pcd: String,
}

#[derive(Deserialize)]
struct FrogBody {
    #[serde(rename = "eddsaPCD")]
    eddsa_pcd: InnerEnvelope,
    data: FrogData,
}

#[derive(Deserialize)]
struct InnerEnvelope {
    pcd: String,
}

#[derive(Deserialize)]
struct EddsaBody {
    #[serde(rename = "type")]
    kind: String,
    claim: EddsaClaim,
    proof: EddsaProof,
}

#[derive(Deserialize)]
struct EddsaClaim {
    #[serde(rename = "publicKey")]
    public_key: [String; 2],
}

#[derive(Deserialize)]
struct EddsaProof {
    signature: String,
}

/// The signed payload. Presentation fields are accepted and dropped.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FrogData {
    frog_id: u64,
    biome: u64,
    rarity: u64,
    temperament: u64,
    jump: u64,
    speed: u64,
    intelligence: u64,
    beauty: u64,
    timestamp_signed: u64,
    owner_semaphore_id: String,
}

/// The parsed, validated form of a credential. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRecord {
    pub frog_id: u64,
    pub biome: u64,
    pub rarity: u64,
    pub temperament: u64,
    pub jump: u64,
    pub speed: u64,
    pub intelligence: u64,
    pub beauty: u64,
    pub timestamp_signed: u64,
    /// Identity commitment of the owner this record is bound to.
    pub owner_semaphore_id: ScalarField,
    pub signer_public_key: EmbeddedCurve,
    pub signature: Signature,
    /// Forward-compatibility slots; zero unless the wire shape carries them.
    pub reserved: [ScalarField; 3],
}

impl CanonicalRecord {
    /// The signed message tuple, in the exact order the protocol hashes it.
    /// This order is part of the protocol: any reimplementation must
    /// reproduce it bit-for-bit or its proofs are unverifiable.
    pub fn message_fields(&self) -> [ScalarField; FINGERPRINT_WIDTH] {
        [
            ScalarField::from(self.frog_id),
            ScalarField::from(self.biome),
            ScalarField::from(self.rarity),
            ScalarField::from(self.temperament),
            ScalarField::from(self.jump),
            ScalarField::from(self.speed),
            ScalarField::from(self.intelligence),
            ScalarField::from(self.beauty),
            ScalarField::from(self.timestamp_signed),
            self.owner_semaphore_id,
            self.reserved[0],
            self.reserved[1],
            self.reserved[2],
        ]
    }

    /// Hash of the signed message tuple; also the record's ordering
    /// fingerprint.
    pub fn message_hash(&self) -> ScalarField {
        poseidon::hash(&self.message_fields())
    }
}

/// Issuer keys the parser accepts. Defaults to the production frog signer.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    pub allowed_signers: Vec<EmbeddedCurve>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            allowed_signers: vec![*FROGCRYPTO_SIGNER],
        }
    }
}

pub fn parse(raw: &RawCredential, config: &ParserConfig) -> Result<CanonicalRecord, ParseError> {
    let record = match raw {
        RawCredential::FrogPcd(json) => parse_frog_pcd(json)?,
        RawCredential::Flat(flat) => parse_flat(flat)?,
    };
    if !config.allowed_signers.contains(&record.signer_public_key) {
        return Err(ParseError::DisallowedSigner);
    }
    Ok(record)
}

fn parse_frog_pcd(json: &str) -> Result<CanonicalRecord, ParseError> {
    let outer: OuterEnvelope =
        serde_json::from_str(json).map_err(|e| ParseError::MalformedJson(e.to_string()))?;
    if outer.kind != FROG_PCD_TYPE {
        return Err(ParseError::UnexpectedType {
            expected: FROG_PCD_TYPE,
            got: outer.kind,
        });
    }

    let body: FrogBody =
        serde_json::from_str(&outer.pcd).map_err(|e| ParseError::MalformedJson(e.to_string()))?;
    let eddsa_body: EddsaBody = serde_json::from_str(&body.eddsa_pcd.pcd)
        .map_err(|e| ParseError::MalformedJson(e.to_string()))?;
    if eddsa_body.kind != EDDSA_PCD_TYPE {
        return Err(ParseError::UnexpectedType {
            expected: EDDSA_PCD_TYPE,
            got: eddsa_body.kind,
        });
    }

    // The wire format stores one packed hex blob; the circuit needs the three
    // unpacked components as separate field elements.
    let signature_bytes = hex::decode(&eddsa_body.proof.signature)
        .map_err(|_| ParseError::MalformedJson("signature is not hex".to_string()))?;
    let signature = eddsa::unpack_signature(&signature_bytes)?;

    let signer_public_key = {
        let x = encoding::field_from_hex_be(&eddsa_body.claim.public_key[0])?;
        let y = encoding::field_from_hex_be(&eddsa_body.claim.public_key[1])?;
        let point = EmbeddedCurve::new_unchecked(x, y);
        eddsa::validate_point(&point)?;
        point
    };

    let data = body.data;
    Ok(CanonicalRecord {
        frog_id: data.frog_id,
        biome: data.biome,
        rarity: data.rarity,
        temperament: data.temperament,
        jump: data.jump,
        speed: data.speed,
        intelligence: data.intelligence,
        beauty: data.beauty,
        timestamp_signed: data.timestamp_signed,
        owner_semaphore_id: encoding::field_from_decimal(&data.owner_semaphore_id)?,
        signer_public_key,
        signature,
        reserved: [ScalarField::zero(); 3],
    })
}

fn parse_flat(flat: &FlatRecord) -> Result<CanonicalRecord, ParseError> {
    fn numeric(value: &str, name: &'static str) -> Result<u64, ParseError> {
        value.parse::<u64>().map_err(|_| ParseError::InvalidNumeric(name))
    }
    fn reserved(value: &Option<String>) -> Result<ScalarField, ParseError> {
        match value {
            Some(s) => Ok(encoding::field_from_decimal(s)?),
            None => Ok(ScalarField::zero()),
        }
    }

    let signature = {
        let r8 = EmbeddedCurve::new_unchecked(
            encoding::field_from_decimal(&flat.frog_signature_r8x)?,
            encoding::field_from_decimal(&flat.frog_signature_r8y)?,
        );
        eddsa::validate_point(&r8)?;
        Signature {
            r8,
            s: encoding::field_from_decimal(&flat.frog_signature_s)?,
        }
    };
    let signer_public_key = {
        let point = EmbeddedCurve::new_unchecked(
            encoding::field_from_decimal(&flat.frog_signer_pubkey_ax)?,
            encoding::field_from_decimal(&flat.frog_signer_pubkey_ay)?,
        );
        eddsa::validate_point(&point)?;
        point
    };

    Ok(CanonicalRecord {
        frog_id: numeric(&flat.frog_id, "frogId")?,
        biome: numeric(&flat.biome, "biome")?,
        rarity: numeric(&flat.rarity, "rarity")?,
        temperament: numeric(&flat.temperament, "temperament")?,
        jump: numeric(&flat.jump, "jump")?,
        speed: numeric(&flat.speed, "speed")?,
        intelligence: numeric(&flat.intelligence, "intelligence")?,
        beauty: numeric(&flat.beauty, "beauty")?,
        timestamp_signed: numeric(&flat.timestamp_signed, "timestampSigned")?,
        owner_semaphore_id: encoding::field_from_decimal(&flat.owner_semaphore_id)?,
        signer_public_key,
        signature,
        reserved: [
            reserved(&flat.reserved_field1)?,
            reserved(&flat.reserved_field2)?,
            reserved(&flat.reserved_field3)?,
        ],
    })
}

/// The owner's identity secrets, supplied by the identity collaborator once
/// per proof session. The commitment is what records are bound to.
#[derive(Debug, Clone, Copy)]
pub struct OwnerIdentity {
    pub trapdoor: ScalarField,
    pub nullifier: ScalarField,
}

impl OwnerIdentity {
    /// Semaphore-style identity commitment: H(H(trapdoor, nullifier)).
    pub fn commitment(&self) -> ScalarField {
        let secret = poseidon::hash(&[self.trapdoor, self.nullifier]);
        poseidon::hash(&[secret])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A production frog credential (inner body); tests wrap it in the outer
    // envelope the credential store hands out.
    const FROG_BODY: &str = r#"{"id":"40e306a4-c2bf-4c2f-bad1-186475118041","eddsaPCD":{"type":"eddsa-pcd","pcd":"{\"type\":\"eddsa-pcd\",\"id\":\"9ad36f33-ae49-42e4-85d2-fa4f1675a81c\",\"claim\":{\"message\":[\"1a\",\"3\",\"1\",\"a\",\"6\",\"4\",\"6\",\"6\",\"1912ea446b1\",\"3000477e9507331b8e73fb6d3b3b705e22b02021ff40c19965c5b9dc82a8ca89\",\"0\",\"0\",\"0\"],\"publicKey\":[\"0f183dcba06341a4549d78c3f8ca0060a9d6aca795103cb6957d1e2973b5fdeb\",\"2a2eb70efeebb5facca2f3668ca5642513be542bab285055ccdcbc18cc125fd5\"]},\"proof\":{\"signature\":\"8995c19660f59f320dfcdb4584736081aa3a89da9499bec5854e431937d0540930e1d1cb61db826e1a1a9b1a938ab016543ba6809f9a08b1dd4a56b71701ca04\"}}"},"data":{"name":"Paedophryne Amauensis","description":"The world's smallest vertebrate.","imageUrl":"https://api.zupass.org/frogcrypto/images/fab1ba2d-f81d-4591-8d54-0b4e38dd5285","frogId":26,"biome":3,"rarity":1,"temperament":10,"jump":6,"speed":4,"intelligence":6,"beauty":6,"timestampSigned":1723064403633,"ownerSemaphoreId":"21711510168635182051334357427785411794318044815986410056285364391413272857225"}}"#;

    fn envelope() -> String {
        serde_json::json!({ "type": "eddsa-frog-pcd", "pcd": FROG_BODY }).to_string()
    }

    #[test]
    fn parses_production_credential() {
        let raw = RawCredential::from_json(&envelope()).unwrap();
        let record = parse(&raw, &ParserConfig::default()).unwrap();
        assert_eq!(record.frog_id, 26);
        assert_eq!(record.biome, 3);
        assert_eq!(record.temperament, 10);
        assert_eq!(record.timestamp_signed, 1723064403633);
        assert_eq!(record.signer_public_key, *FROGCRYPTO_SIGNER);
        assert_eq!(record.reserved, [ScalarField::zero(); 3]);
    }

    // The packed signature must unpack to these exact decimal strings: the
    // circuit consumes them as separate inputs.
    #[test]
    fn signature_components_are_unpacked() {
        let raw = RawCredential::from_json(&envelope()).unwrap();
        let record = parse(&raw, &ParserConfig::default()).unwrap();
        assert_eq!(
            encoding::field_to_decimal(&record.signature.r8.x),
            "3905193423010470989125634343912498114238974029402349774171177533113727872021"
        );
        assert_eq!(
            encoding::field_to_decimal(&record.signature.r8.y),
            "4220667839388476583517614235006410826454621394498244403361240346004021155209"
        );
        assert_eq!(
            encoding::field_to_decimal(&record.signature.s),
            "2166162042551067351421606700226595766359806346872972800506681888202929856816"
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        let raw = serde_json::json!({ "type": "semaphore-group-pcd", "pcd": "{}" }).to_string();
        assert!(matches!(
            RawCredential::from_json(&raw),
            Err(ParseError::UnexpectedType { .. })
        ));
    }

    #[test]
    fn disallowed_signer_is_rejected() {
        let raw = RawCredential::from_json(&envelope()).unwrap();
        let config = ParserConfig {
            allowed_signers: vec![],
        };
        assert!(matches!(
            parse(&raw, &config),
            Err(ParseError::DisallowedSigner)
        ));
    }

    #[test]
    fn truncated_envelope_is_rejected() {
        let err = RawCredential::from_json("{\"type\":").unwrap_err();
        assert!(matches!(err, ParseError::MalformedJson(_)));
    }

    #[test]
    fn identity_commitment_is_stable() {
        let identity = OwnerIdentity {
            trapdoor: ScalarField::from(11u64),
            nullifier: ScalarField::from(12u64),
        };
        assert_eq!(identity.commitment(), identity.commitment());
        let other = OwnerIdentity {
            trapdoor: ScalarField::from(12u64),
            nullifier: ScalarField::from(11u64),
        };
        assert_ne!(identity.commitment(), other.commitment());
    }
}
