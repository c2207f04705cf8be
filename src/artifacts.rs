//! Proving artifact management.
//!
//! A proof session depends on six artifact files produced at setup time: the
//! step constraint descriptor, the witness layout, the folding prover and
//! verifier parameters, and the decider proving and verifying keys. Every
//! artifact file carries a magic tag, a format version and a kind byte, and
//! the set as a whole has a SHA-256 digest that proofs embed. Verifying a
//! proof against a different artifact set fails on the digest comparison
//! before any curve arithmetic runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

use crate::{folding::FoldingParams, ARTIFACT_FORMAT_VERSION, STATE_WIDTH, STEP_INPUT_WIDTH};

const MAGIC: [u8; 4] = *b"FGLD";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Positional field names of the step input vector, in circuit order. The
/// witness layout artifact pins a digest of this list so prover and verifier
/// agree on the meaning of every slot.
pub const STEP_FIELD_NAMES: [&str; STEP_INPUT_WIDTH] = [
    "frogId",
    "timestampSigned",
    "ownerSemaphoreId",
    "frogSignerPubkeyAx",
    "frogSignerPubkeyAy",
    "semaphoreIdentityTrapdoor",
    "semaphoreIdentityNullifier",
    "watermark",
    "frogSignatureR8x",
    "frogSignatureR8y",
    "frogSignatureS",
    "externalNullifier",
    "biome",
    "rarity",
    "temperament",
    "jump",
    "speed",
    "intelligence",
    "beauty",
    "reservedField1",
    "reservedField2",
    "reservedField3",
];

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact io: {0}")]
    Io(#[from] std::io::Error),
    #[error("artifact {0:?} not found in store")]
    Missing(String),
    #[error("artifact {0:?} is not a recognized artifact file")]
    BadMagic(String),
    #[error("artifact {name:?} has format version {found}, this build expects {expected}")]
    UnsupportedVersion {
        name: String,
        found: u16,
        expected: u16,
    },
    #[error("artifact {name:?} contains a {found:?} payload, expected {expected:?}")]
    WrongKind {
        name: String,
        found: ArtifactKind,
        expected: ArtifactKind,
    },
    #[error("artifact {name:?} payload is malformed: {reason}")]
    Malformed { name: String, reason: String },
    #[error("manifest is malformed: {0}")]
    BadManifest(String),
    #[error("artifact {name:?} does not match its manifest digest")]
    DigestMismatch { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    StepConstraints,
    WitnessLayout,
    FoldingProverParams,
    FoldingVerifierParams,
    DeciderProvingKey,
    DeciderVerifyingKey,
}

impl ArtifactKind {
    pub fn file_name(self) -> &'static str {
        match self {
            ArtifactKind::StepConstraints => "step_constraints.bin",
            ArtifactKind::WitnessLayout => "witness_layout.bin",
            ArtifactKind::FoldingProverParams => "folding_pp.bin",
            ArtifactKind::FoldingVerifierParams => "folding_vp.bin",
            ArtifactKind::DeciderProvingKey => "decider_pk.bin",
            ArtifactKind::DeciderVerifyingKey => "decider_vk.bin",
        }
    }

    fn tag(self) -> u8 {
        match self {
            ArtifactKind::StepConstraints => 1,
            ArtifactKind::WitnessLayout => 2,
            ArtifactKind::FoldingProverParams => 3,
            ArtifactKind::FoldingVerifierParams => 4,
            ArtifactKind::DeciderProvingKey => 5,
            ArtifactKind::DeciderVerifyingKey => 6,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(ArtifactKind::StepConstraints),
            2 => Some(ArtifactKind::WitnessLayout),
            3 => Some(ArtifactKind::FoldingProverParams),
            4 => Some(ArtifactKind::FoldingVerifierParams),
            5 => Some(ArtifactKind::DeciderProvingKey),
            6 => Some(ArtifactKind::DeciderVerifyingKey),
            _ => None,
        }
    }

    pub fn all() -> [ArtifactKind; 6] {
        [
            ArtifactKind::StepConstraints,
            ArtifactKind::WitnessLayout,
            ArtifactKind::FoldingProverParams,
            ArtifactKind::FoldingVerifierParams,
            ArtifactKind::DeciderProvingKey,
            ArtifactKind::DeciderVerifyingKey,
        ]
    }
}

/// Shape of the per-step relation. Widths are protocol constants; storing
/// them lets a verifier reject artifacts built for a different circuit.
#[derive(Debug, Clone, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct StepConstraints {
    pub state_width: u32,
    pub input_width: u32,
    pub poseidon_rate: u32,
    pub poseidon_full_rounds: u32,
    pub poseidon_partial_rounds: u32,
    pub poseidon_alpha: u64,
}

impl StepConstraints {
    pub fn current() -> Self {
        StepConstraints {
            state_width: STATE_WIDTH as u32,
            input_width: STEP_INPUT_WIDTH as u32,
            poseidon_rate: 4,
            poseidon_full_rounds: 8,
            poseidon_partial_rounds: 60,
            poseidon_alpha: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct WitnessLayout {
    pub input_width: u32,
    pub field_name_digest: [u8; 32],
}

impl WitnessLayout {
    pub fn current() -> Self {
        let mut hasher = Sha256::new();
        for name in STEP_FIELD_NAMES {
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
        }
        WitnessLayout {
            input_width: STEP_INPUT_WIDTH as u32,
            field_name_digest: hasher.finalize().into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct DeciderProvingKey {
    pub basis: FoldingParams,
}

#[derive(Debug, Clone, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct DeciderVerifyingKey {
    pub basis: FoldingParams,
}

fn encode<T: CanonicalSerialize>(
    kind: ArtifactKind,
    payload: &T,
) -> Result<Vec<u8>, ArtifactError> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&MAGIC);
    bytes.extend_from_slice(&ARTIFACT_FORMAT_VERSION.to_le_bytes());
    bytes.push(kind.tag());
    payload
        .serialize_compressed(&mut bytes)
        .map_err(|e| ArtifactError::Malformed {
            name: kind.file_name().to_string(),
            reason: e.to_string(),
        })?;
    Ok(bytes)
}

fn decode<T: CanonicalDeserialize>(
    name: &str,
    expected: ArtifactKind,
    bytes: &[u8],
) -> Result<T, ArtifactError> {
    if bytes.len() < 7 || bytes[..4] != MAGIC {
        return Err(ArtifactError::BadMagic(name.to_string()));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != ARTIFACT_FORMAT_VERSION {
        return Err(ArtifactError::UnsupportedVersion {
            name: name.to_string(),
            found: version,
            expected: ARTIFACT_FORMAT_VERSION,
        });
    }
    let found = ArtifactKind::from_tag(bytes[6]).ok_or_else(|| ArtifactError::Malformed {
        name: name.to_string(),
        reason: format!("unknown kind tag {}", bytes[6]),
    })?;
    if found != expected {
        return Err(ArtifactError::WrongKind {
            name: name.to_string(),
            found,
            expected,
        });
    }
    T::deserialize_compressed(&bytes[7..]).map_err(|e| ArtifactError::Malformed {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// Per-file digests for an artifact set. Written at setup, checked on every
/// load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u16,
    pub files: BTreeMap<String, String>,
}

impl Manifest {
    /// The digest that binds proofs to this artifact set: SHA-256 over the
    /// sorted (name, digest) pairs.
    pub fn set_digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        for (name, digest) in &self.files {
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
            hasher.update(digest.as_bytes());
            hasher.update([0u8]);
        }
        hasher.finalize().into()
    }
}

/// Fetches artifact files by name. The filesystem store is the only
/// implementation here; tests swap in directories built with different setup
/// runs.
pub trait ArtifactStore {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, ArtifactError>;
}

#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactStore for FsStore {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, ArtifactError> {
        let path = self.root.join(name);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ArtifactError::Missing(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Generate a fresh artifact set and write all six files plus the manifest.
pub fn setup<R: Rng>(dir: &Path, rng: &mut R) -> Result<Manifest, ArtifactError> {
    fs::create_dir_all(dir)?;
    let basis = FoldingParams::setup(rng);

    let mut files = BTreeMap::new();
    let mut write = |kind: ArtifactKind, bytes: Vec<u8>| -> Result<(), ArtifactError> {
        files.insert(kind.file_name().to_string(), hex_digest(&bytes));
        fs::write(dir.join(kind.file_name()), bytes)?;
        Ok(())
    };

    write(
        ArtifactKind::StepConstraints,
        encode(ArtifactKind::StepConstraints, &StepConstraints::current())?,
    )?;
    write(
        ArtifactKind::WitnessLayout,
        encode(ArtifactKind::WitnessLayout, &WitnessLayout::current())?,
    )?;
    write(
        ArtifactKind::FoldingProverParams,
        encode(ArtifactKind::FoldingProverParams, &basis)?,
    )?;
    write(
        ArtifactKind::FoldingVerifierParams,
        encode(ArtifactKind::FoldingVerifierParams, &basis)?,
    )?;
    write(
        ArtifactKind::DeciderProvingKey,
        encode(
            ArtifactKind::DeciderProvingKey,
            &DeciderProvingKey {
                basis: basis.clone(),
            },
        )?,
    )?;
    write(
        ArtifactKind::DeciderVerifyingKey,
        encode(
            ArtifactKind::DeciderVerifyingKey,
            &DeciderVerifyingKey { basis },
        )?,
    )?;

    let manifest = Manifest {
        format_version: ARTIFACT_FORMAT_VERSION,
        files,
    };
    let json =
        serde_json::to_vec_pretty(&manifest).map_err(|e| ArtifactError::BadManifest(e.to_string()))?;
    fs::write(dir.join(MANIFEST_FILE), json)?;
    info!(dir = %dir.display(), "wrote artifact set");
    Ok(manifest)
}

fn load_manifest(store: &impl ArtifactStore) -> Result<Manifest, ArtifactError> {
    let bytes = store.fetch(MANIFEST_FILE)?;
    let manifest: Manifest =
        serde_json::from_slice(&bytes).map_err(|e| ArtifactError::BadManifest(e.to_string()))?;
    if manifest.format_version != ARTIFACT_FORMAT_VERSION {
        return Err(ArtifactError::UnsupportedVersion {
            name: MANIFEST_FILE.to_string(),
            found: manifest.format_version,
            expected: ARTIFACT_FORMAT_VERSION,
        });
    }
    Ok(manifest)
}

fn fetch_checked(
    store: &impl ArtifactStore,
    manifest: &Manifest,
    kind: ArtifactKind,
) -> Result<Vec<u8>, ArtifactError> {
    let name = kind.file_name();
    let expected = manifest
        .files
        .get(name)
        .ok_or_else(|| ArtifactError::Missing(name.to_string()))?;
    let bytes = store.fetch(name)?;
    if hex_digest(&bytes) != *expected {
        return Err(ArtifactError::DigestMismatch {
            name: name.to_string(),
        });
    }
    Ok(bytes)
}

/// Everything the prover needs, loaded and digest-checked.
#[derive(Debug, Clone)]
pub struct ProvingArtifactSet {
    pub constraints: StepConstraints,
    pub layout: WitnessLayout,
    pub params: FoldingParams,
    pub decider_key: DeciderProvingKey,
    pub set_digest: [u8; 32],
}

impl ProvingArtifactSet {
    pub fn load(store: &impl ArtifactStore) -> Result<Self, ArtifactError> {
        let manifest = load_manifest(store)?;
        let constraints = decode(
            ArtifactKind::StepConstraints.file_name(),
            ArtifactKind::StepConstraints,
            &fetch_checked(store, &manifest, ArtifactKind::StepConstraints)?,
        )?;
        let layout = decode(
            ArtifactKind::WitnessLayout.file_name(),
            ArtifactKind::WitnessLayout,
            &fetch_checked(store, &manifest, ArtifactKind::WitnessLayout)?,
        )?;
        let params = decode(
            ArtifactKind::FoldingProverParams.file_name(),
            ArtifactKind::FoldingProverParams,
            &fetch_checked(store, &manifest, ArtifactKind::FoldingProverParams)?,
        )?;
        let decider_key = decode(
            ArtifactKind::DeciderProvingKey.file_name(),
            ArtifactKind::DeciderProvingKey,
            &fetch_checked(store, &manifest, ArtifactKind::DeciderProvingKey)?,
        )?;
        Ok(ProvingArtifactSet {
            constraints,
            layout,
            params,
            decider_key,
            set_digest: manifest.set_digest(),
        })
    }
}

/// Everything the verifier needs. Deliberately excludes the prover-side
/// parameter files so a verifier deployment can ship a smaller set.
#[derive(Debug, Clone)]
pub struct VerifyingArtifactSet {
    pub constraints: StepConstraints,
    pub params: FoldingParams,
    pub decider_key: DeciderVerifyingKey,
    pub set_digest: [u8; 32],
}

impl VerifyingArtifactSet {
    pub fn load(store: &impl ArtifactStore) -> Result<Self, ArtifactError> {
        let manifest = load_manifest(store)?;
        let constraints = decode(
            ArtifactKind::StepConstraints.file_name(),
            ArtifactKind::StepConstraints,
            &fetch_checked(store, &manifest, ArtifactKind::StepConstraints)?,
        )?;
        let params = decode(
            ArtifactKind::FoldingVerifierParams.file_name(),
            ArtifactKind::FoldingVerifierParams,
            &fetch_checked(store, &manifest, ArtifactKind::FoldingVerifierParams)?,
        )?;
        let decider_key = decode(
            ArtifactKind::DeciderVerifyingKey.file_name(),
            ArtifactKind::DeciderVerifyingKey,
            &fetch_checked(store, &manifest, ArtifactKind::DeciderVerifyingKey)?,
        )?;
        Ok(VerifyingArtifactSet {
            constraints,
            params,
            decider_key,
            set_digest: manifest.set_digest(),
        })
    }
}
