use std::{fs, path::PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use mtp_pow::{
    FillScheduler, Job, Memory, Proof, ProofOfWorkDriver, SearchOutcome, Target,
    ThreadedBackend, config::Config, hash::PrehashInputs,
};
use rand::RngCore;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a plain Argon2d tag
    Hash {
        /// Hex-encoded password
        #[arg(long)]
        password: String,

        /// Hex-encoded salt
        #[arg(long)]
        salt: String,

        #[command(flatten)]
        config: Config,
    },

    /// Search for a proof of work
    Search {
        /// Hex-encoded block header; random 80 bytes if absent
        #[arg(long)]
        header: Option<String>,

        /// Hex-encoded 32-byte big-endian target; derived from --difficulty-bits if absent
        #[arg(long)]
        target: Option<String>,

        /// First nonce to try
        #[arg(long, default_value_t = 0)]
        start: u32,

        /// Number of nonces to try; the batch stops short of nonce 4294967295
        #[arg(long, default_value_t = u32::MAX)]
        count: u32,

        #[command(flatten)]
        config: Config,
    },

    /// Verify a JSON proof
    Verify {
        /// File holding the proof
        #[arg(long)]
        proof: PathBuf,

        /// Hex-encoded block header the proof was produced for
        #[arg(long)]
        header: String,

        /// Hex-encoded 32-byte big-endian target; derived from --difficulty-bits if absent
        #[arg(long)]
        target: Option<String>,

        #[command(flatten)]
        config: Config,
    },
}

fn decode_hex(name: &str, value: &str) -> anyhow::Result<Vec<u8>> {
    hex::decode(value).with_context(|| format!("invalid hex string for --{name}"))
}

fn build_random_header() -> Vec<u8> {
    let mut header = vec![0u8; 80];
    rand::thread_rng().fill_bytes(&mut header);
    header
}

fn resolve_target(target: Option<&str>, config: &Config) -> anyhow::Result<Target> {
    let target = match target {
        Some(encoded) => Target::from_hex(encoded)?,
        None => Target::from_difficulty_bits(config.difficulty_bits)?,
    };
    Ok(target)
}

fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("mtp_pow=info".parse()?);
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Hash {
            password,
            salt,
            config,
        } => {
            let password = decode_hex("password", &password)?;
            let salt = decode_hex("salt", &salt)?;
            let inputs = PrehashInputs {
                password: &password,
                salt: &salt,
                ..PrehashInputs::default()
            };

            let mut memory = Memory::new(&config, None)?;
            FillScheduler::new(config, &ThreadedBackend::new(config.jobs))
                .run(&mut memory, &inputs)
                .context("memory fill failed")?;
            println!("{}", hex::encode(memory.finalize(config.tag_length as usize)));
        }

        Commands::Search {
            header,
            target,
            start,
            count,
            config,
        } => {
            let header = match header {
                Some(encoded) => decode_hex("header", &encoded)?,
                None => build_random_header(),
            };
            let target = resolve_target(target.as_deref(), &config)?;
            info!(header = %hex::encode(&header), %target, "starting search");

            let mut driver = ProofOfWorkDriver::new(config)?;
            driver.load_job(Job {
                id: hex::encode(&header),
                header,
                target,
            });

            let nonces = start..start.saturating_add(count);
            match driver.search(nonces.clone())? {
                SearchOutcome::Found(proof) => {
                    eprintln!("{proof}");
                    println!("{}", serde_json::to_string_pretty(&proof)?);
                }
                SearchOutcome::Exhausted => bail!("no proof in nonces {nonces:?}"),
            }
        }

        Commands::Verify {
            proof,
            header,
            target,
            config,
        } => {
            let header = decode_hex("header", &header)?;
            let target = resolve_target(target.as_deref(), &config)?;
            let contents = fs::read_to_string(&proof)
                .with_context(|| format!("could not read {}", proof.display()))?;
            let proof: Proof = serde_json::from_str(&contents).context("malformed proof")?;

            proof
                .verify(&config, &header, &target)
                .context("proof rejected")?;
            println!("valid (nonce {})", proof.nonce);
        }
    }

    Ok(())
}
