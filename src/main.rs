use anyhow::{anyhow, Context, Result};
use clap::Parser;
use frogfold::{
    artifacts::{self, FsStore, ProvingArtifactSet, VerifyingArtifactSet},
    assemble::{self, SessionConstants},
    badge::{BadgeError, BadgeIssuer, GateOutcome, ThresholdGate},
    cli, eddsa, encoding, env,
    order::{self, DuplicatePolicy, OrderedRecordSequence},
    poseidon,
    prover,
    record::{self, CanonicalRecord, OwnerIdentity, ParserConfig, RawCredential},
    verifier, ScalarField,
};
use std::{fs, path::Path, sync::atomic::AtomicBool};
use tracing::debug;

fn parser_config(extra_signers: &[cli::HexString]) -> Result<ParserConfig> {
    let mut config = ParserConfig::default();
    for packed in extra_signers {
        let bytes: [u8; 32] = packed
            .0
            .as_slice()
            .try_into()
            .map_err(|_| anyhow!("packed issuer key must be 32 bytes, got {}", packed.0.len()))?;
        config.allowed_signers.push(eddsa::unpack_point(bytes)?);
    }
    Ok(config)
}

fn load_records(path: &str, config: &ParserConfig) -> Result<Vec<CanonicalRecord>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let values: Vec<serde_json::Value> =
        serde_json::from_str(&text).context("input must be a JSON array of credentials")?;
    debug!(count = values.len(), input_file = path, "parsing credentials");
    values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            let raw = RawCredential::from_json(&value.to_string())
                .with_context(|| format!("credential {i}"))?;
            record::parse(&raw, config).with_context(|| format!("credential {i}"))
        })
        .collect()
}

fn identity(trapdoor: &str, nullifier: &str) -> Result<OwnerIdentity> {
    Ok(OwnerIdentity {
        trapdoor: encoding::field_from_decimal(trapdoor).context("trapdoor")?,
        nullifier: encoding::field_from_decimal(nullifier).context("nullifier")?,
    })
}

fn constants(watermark: Option<u64>) -> SessionConstants {
    let mut constants = SessionConstants::default();
    if let Some(watermark) = watermark {
        constants.watermark = ScalarField::from(watermark);
    }
    constants
}

fn policy(allow_duplicates: bool) -> DuplicatePolicy {
    if allow_duplicates {
        DuplicatePolicy::Allow
    } else {
        DuplicatePolicy::Reject
    }
}

fn ordered_sequence(
    input: &str,
    config: &ParserConfig,
    policy: DuplicatePolicy,
) -> Result<OrderedRecordSequence> {
    let records = load_records(input, config)?;
    Ok(order::order(records, policy)?)
}

fn setup(args: cli::SetupArgs) -> Result<()> {
    let manifest = artifacts::setup(Path::new(&args.artifacts), &mut rand::thread_rng())?;
    println!("{}", hex::encode(manifest.set_digest()));
    Ok(())
}

fn keygen(args: cli::KeygenArgs) -> Result<()> {
    let key = eddsa::SigningKey::random(&mut rand::thread_rng());
    fs::write(&args.output, encoding::field_to_decimal(&key.secret()))
        .with_context(|| format!("writing {}", args.output))?;
    println!("{}", hex::encode(eddsa::pack_point(&key.public())));
    Ok(())
}

fn issue(args: cli::IssueArgs) -> Result<()> {
    let secret = fs::read_to_string(&args.key).with_context(|| format!("reading {}", args.key))?;
    let key = eddsa::SigningKey::from_secret(
        encoding::field_from_decimal(secret.trim()).context("issuer secret key")?,
    );
    let owner: ScalarField = encoding::field_from_decimal(&args.owner).context("owner")?;
    let timestamp = match args.timestamp {
        Some(t) => t,
        None => std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .context("system clock is before the epoch")?
            .as_millis() as u64,
    };

    let message = poseidon::hash(&[
        ScalarField::from(args.frog_id),
        ScalarField::from(args.biome),
        ScalarField::from(args.rarity),
        ScalarField::from(args.temperament),
        ScalarField::from(args.jump),
        ScalarField::from(args.speed),
        ScalarField::from(args.intelligence),
        ScalarField::from(args.beauty),
        ScalarField::from(timestamp),
        owner,
        ScalarField::from(0u64),
        ScalarField::from(0u64),
        ScalarField::from(0u64),
    ]);
    let signature = key.sign(message);
    let public = key.public();
    let credential = serde_json::json!({
        "frogId": args.frog_id.to_string(),
        "biome": args.biome.to_string(),
        "rarity": args.rarity.to_string(),
        "temperament": args.temperament.to_string(),
        "jump": args.jump.to_string(),
        "speed": args.speed.to_string(),
        "intelligence": args.intelligence.to_string(),
        "beauty": args.beauty.to_string(),
        "timestampSigned": timestamp.to_string(),
        "ownerSemaphoreId": encoding::field_to_decimal(&owner),
        "frogSignerPubkeyAx": encoding::field_to_decimal(&public.x),
        "frogSignerPubkeyAy": encoding::field_to_decimal(&public.y),
        "frogSignatureR8x": encoding::field_to_decimal(&signature.r8.x),
        "frogSignatureR8y": encoding::field_to_decimal(&signature.r8.y),
        "frogSignatureS": encoding::field_to_decimal(&signature.s),
    });
    fs::write(&args.output, serde_json::to_string_pretty(&credential)?)
        .with_context(|| format!("writing {}", args.output))?;
    Ok(())
}

fn inputs(args: cli::InputsArgs) -> Result<()> {
    let config = parser_config(&args.allow_signers)?;
    let sequence = ordered_sequence(&args.input, &config, policy(args.allow_duplicates))?;
    let identity = identity(&args.trapdoor, &args.nullifier)?;
    let inputs = assemble::assemble(&sequence, &identity, &constants(args.watermark))?;
    let json = serde_json::to_string_pretty(&inputs)?;
    fs::write(&args.output, json).with_context(|| format!("writing {}", args.output))?;
    println!("{} steps", inputs.len());
    Ok(())
}

fn prove(args: cli::ProveArgs) -> Result<()> {
    let set = ProvingArtifactSet::load(&FsStore::new(&args.artifacts))?;
    let config = parser_config(&args.allow_signers)?;
    let sequence = ordered_sequence(&args.input, &config, policy(args.allow_duplicates))?;
    let identity = identity(&args.trapdoor, &args.nullifier)?;
    let cancel = AtomicBool::new(false);
    let proof = prover::prove(
        &set,
        &sequence,
        &identity,
        &constants(args.watermark),
        &cancel,
        &mut rand::thread_rng(),
        |stage| debug!(?stage, "prover progress"),
    )?;
    fs::write(&args.output, proof.to_bytes()?)
        .with_context(|| format!("writing {}", args.output))?;
    println!("{} steps folded", proof.steps);
    Ok(())
}

struct StdoutIssuer;

impl BadgeIssuer for StdoutIssuer {
    fn issue(&mut self, owner: ScalarField, steps: u64) -> Result<(), BadgeError> {
        println!(
            "badge issued to {} for {} records",
            encoding::field_to_decimal(&owner),
            steps
        );
        Ok(())
    }
}

fn verify(args: cli::VerifyArgs) -> Result<()> {
    let set = VerifyingArtifactSet::load(&FsStore::new(&args.artifacts))?;
    let bytes = fs::read(&args.proof).with_context(|| format!("reading {}", args.proof))?;
    let steps = verifier::verify_bytes(&set, &bytes)?;
    println!("ok: {} records folded", steps);

    if let Some(threshold) = args.badge_threshold {
        let owner = match &args.owner {
            Some(owner) => encoding::field_from_decimal(owner).context("owner")?,
            None => ScalarField::from(0u64),
        };
        let mut gate = ThresholdGate::new(threshold);
        match gate.observe(owner, steps, &mut StdoutIssuer)? {
            GateOutcome::Issued => {}
            GateOutcome::AlreadyIssued => {}
            GateOutcome::BelowThreshold => {
                println!("below badge threshold ({} < {})", steps, threshold)
            }
        }
    }
    Ok(())
}

pub fn main() -> Result<()> {
    env::init_console_subscriber();
    let args = cli::Commands::parse();
    match args {
        cli::Commands::Setup(args) => setup(args),
        cli::Commands::Keygen(args) => keygen(args),
        cli::Commands::Issue(args) => issue(args),
        cli::Commands::Inputs(args) => inputs(args),
        cli::Commands::Prove(args) => prove(args),
        cli::Commands::Verify(args) => verify(args),
    }
}
