use clap::Parser;
use std::{fmt::Display, str::FromStr};

#[derive(Debug, Clone)]
pub struct HexString(pub Vec<u8>);

impl FromStr for HexString {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        Ok(HexString(hex::decode(stripped)?))
    }
}

impl Display for HexString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

#[derive(Parser)]
pub struct SetupArgs {
    #[arg(
        long,
        short = 'd',
        value_name = "DIR",
        help = "directory to write the artifact set into"
    )]
    pub artifacts: String,
}

#[derive(Parser)]
pub struct InputsArgs {
    #[arg(
        long,
        short = 'i',
        value_name = "FILE",
        help = "input file (JSON array of credentials)"
    )]
    pub input: String,

    #[arg(
        long,
        short = 'o',
        value_name = "FILE",
        help = "output file (circuit inputs, JSON keyed by step index)"
    )]
    pub output: String,

    #[arg(long, value_name = "DECIMAL", help = "identity trapdoor")]
    pub trapdoor: String,

    #[arg(long, value_name = "DECIMAL", help = "identity nullifier")]
    pub nullifier: String,

    #[arg(long, value_name = "INTEGER", help = "session watermark")]
    pub watermark: Option<u64>,

    #[arg(long, help = "keep duplicate credentials instead of rejecting them")]
    pub allow_duplicates: bool,

    #[arg(
        long = "allow-signer",
        value_name = "PACKED_KEY",
        help = "additional issuer key to accept (hex, packed point)"
    )]
    pub allow_signers: Vec<HexString>,
}

#[derive(Parser)]
pub struct ProveArgs {
    #[arg(long, short = 'd', value_name = "DIR", help = "artifact set directory")]
    pub artifacts: String,

    #[arg(
        long,
        short = 'i',
        value_name = "FILE",
        help = "input file (JSON array of credentials)"
    )]
    pub input: String,

    #[arg(long, short = 'o', value_name = "FILE", help = "output file (proof)")]
    pub output: String,

    #[arg(long, value_name = "DECIMAL", help = "identity trapdoor")]
    pub trapdoor: String,

    #[arg(long, value_name = "DECIMAL", help = "identity nullifier")]
    pub nullifier: String,

    #[arg(long, value_name = "INTEGER", help = "session watermark")]
    pub watermark: Option<u64>,

    #[arg(long, help = "keep duplicate credentials instead of rejecting them")]
    pub allow_duplicates: bool,

    #[arg(
        long = "allow-signer",
        value_name = "PACKED_KEY",
        help = "additional issuer key to accept (hex, packed point)"
    )]
    pub allow_signers: Vec<HexString>,
}

#[derive(Parser)]
pub struct KeygenArgs {
    #[arg(
        long,
        short = 'o',
        value_name = "FILE",
        help = "output file (issuer secret key, decimal)"
    )]
    pub output: String,
}

#[derive(Parser)]
pub struct IssueArgs {
    #[arg(long, short = 'k', value_name = "FILE", help = "issuer secret key file")]
    pub key: String,

    #[arg(long, short = 'o', value_name = "FILE", help = "output file (flat credential JSON)")]
    pub output: String,

    #[arg(long, value_name = "DECIMAL", help = "owner semaphore id to bind the credential to")]
    pub owner: String,

    #[arg(long = "frog-id", value_name = "INTEGER")]
    pub frog_id: u64,

    #[arg(long, value_name = "INTEGER", default_value_t = 0)]
    pub biome: u64,

    #[arg(long, value_name = "INTEGER", default_value_t = 0)]
    pub rarity: u64,

    #[arg(long, value_name = "INTEGER", default_value_t = 0)]
    pub temperament: u64,

    #[arg(long, value_name = "INTEGER", default_value_t = 0)]
    pub jump: u64,

    #[arg(long, value_name = "INTEGER", default_value_t = 0)]
    pub speed: u64,

    #[arg(long, value_name = "INTEGER", default_value_t = 0)]
    pub intelligence: u64,

    #[arg(long, value_name = "INTEGER", default_value_t = 0)]
    pub beauty: u64,

    #[arg(
        long,
        value_name = "UNIX_MS",
        help = "signing timestamp; defaults to the current time"
    )]
    pub timestamp: Option<u64>,
}

#[derive(Parser)]
pub struct VerifyArgs {
    #[arg(long, short = 'd', value_name = "DIR", help = "artifact set directory")]
    pub artifacts: String,

    #[arg(long, short = 'p', value_name = "FILE", help = "proof file")]
    pub proof: String,

    #[arg(
        long = "badge-threshold",
        value_name = "COUNT",
        help = "issue a badge when at least this many records were folded"
    )]
    pub badge_threshold: Option<u64>,

    #[arg(
        long,
        value_name = "DECIMAL",
        help = "owner semaphore id the badge is issued to"
    )]
    pub owner: Option<String>,
}

#[derive(Parser)]
#[command(
    name = "frogfold",
    version = "0.1",
    about = "frogfold - folding proofs over signed frog credentials"
)]
pub enum Commands {
    #[command(name = "setup")]
    Setup(SetupArgs),
    #[command(name = "keygen")]
    Keygen(KeygenArgs),
    #[command(name = "issue")]
    Issue(IssueArgs),
    #[command(name = "inputs")]
    Inputs(InputsArgs),
    #[command(name = "prove")]
    Prove(ProveArgs),
    #[command(name = "verify")]
    Verify(VerifyArgs),
}
