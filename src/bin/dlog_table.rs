//! Command-line front end for building and querying residue tables.
//!
//! Running `dlog-table` with no arguments builds the canonical table for
//! `g = 2`, `p = 2^32` into `computed_values.json`.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use dlog_table::config::{DEFAULT_BASE, DEFAULT_MODULUS};
use dlog_table::{
    file_digest, read_table, verify_against_rebuild, verify_table, CancelFlag, CollisionPolicy,
    ResidueRing, StorageMode, TableBuilder, TableConfig, TableError,
};
use log::{info, warn};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "dlog-table",
    version,
    about = "Precompute residue -> exponent tables for g^x mod p"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Enumerate g^i mod p for i in 0..=p-2 and persist the table (default).
    Build(BuildArgs),
    /// Print the stored exponent for each residue.
    Lookup(LookupArgs),
    /// Re-check every entry of a persisted table.
    Verify(VerifyArgs),
}

#[derive(Args, Default)]
struct BuildArgs {
    /// JSON file with any subset of the build settings; flags override it.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Base g.
    #[arg(long)]
    base: Option<u64>,
    /// Modulus p, between 2 and 2^32.
    #[arg(long)]
    modulus: Option<u64>,
    /// Output path.
    #[arg(long, short)]
    output: Option<PathBuf>,
    /// In-memory representation.
    #[arg(long, value_enum)]
    storage: Option<StorageMode>,
    /// Exponent kept when several produce the same residue.
    #[arg(long, value_enum)]
    keep: Option<CollisionPolicy>,
    /// Worker threads (0 = one per core, 1 = sequential).
    #[arg(long)]
    threads: Option<usize>,
    /// Exponents per worker chunk.
    #[arg(long)]
    chunk_size: Option<u64>,
    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,
    /// Abandon the build after this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl BuildArgs {
    fn to_config(&self) -> Result<TableConfig> {
        let mut config = match &self.config {
            Some(path) => TableConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => TableConfig::default(),
        };
        if let Some(base) = self.base {
            config.base = base;
        }
        if let Some(modulus) = self.modulus {
            config.modulus = modulus;
        }
        if let Some(output) = &self.output {
            config.output = output.clone();
        }
        if let Some(storage) = self.storage {
            config.storage = storage;
        }
        if let Some(keep) = self.keep {
            config.collision = keep;
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if self.pretty {
            config.pretty = true;
        }
        Ok(config)
    }
}

#[derive(Args)]
struct LookupArgs {
    /// Persisted table to query.
    #[arg(long, default_value = dlog_table::config::DEFAULT_OUTPUT)]
    table: PathBuf,
    /// Modulus the table was built for.
    #[arg(long, default_value_t = DEFAULT_MODULUS)]
    modulus: u64,
    /// Residues to look up.
    #[arg(required = true)]
    residues: Vec<u64>,
}

#[derive(Args)]
struct VerifyArgs {
    /// Persisted table to check.
    #[arg(long, default_value = dlog_table::config::DEFAULT_OUTPUT)]
    table: PathBuf,
    /// Base g the table was built for.
    #[arg(long, default_value_t = DEFAULT_BASE)]
    base: u64,
    /// Modulus p the table was built for.
    #[arg(long, default_value_t = DEFAULT_MODULUS)]
    modulus: u64,
    /// Also rebuild the table and require an exact match.
    #[arg(long)]
    full: bool,
    /// Collision policy assumed by --full.
    #[arg(long, value_enum, default_value_t = CollisionPolicy::LastWins)]
    keep: CollisionPolicy,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match cli
        .command
        .unwrap_or_else(|| Command::Build(BuildArgs::default()))
    {
        Command::Build(args) => cmd_build(&args),
        Command::Lookup(args) => cmd_lookup(&args),
        Command::Verify(args) => cmd_verify(&args),
    }
}

fn cmd_build(args: &BuildArgs) -> Result<()> {
    let builder = TableBuilder::new(args.to_config()?).context("invalid build configuration")?;

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("interrupt received, cancelling build");
        on_interrupt.cancel();
    })
    .context("installing interrupt handler")?;
    if let Some(secs) = args.timeout_secs {
        let on_deadline = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(secs));
            warn!("timeout of {secs}s reached, cancelling build");
            on_deadline.cancel();
        });
    }

    let (table, stats) = match builder.build_with_cancel(&cancel) {
        Ok(done) => done,
        Err(TableError::Cancelled) => bail!("build cancelled; no table written"),
        Err(err) => return Err(err).context("building table"),
    };
    info!(
        "{} chunks on {} thread(s), {:.0} exponents/s",
        stats.chunks,
        stats.threads,
        stats.exponents as f64 / stats.elapsed.as_secs_f64().max(f64::EPSILON)
    );
    let config = builder.config();
    let written = dlog_table::write_table(&config.output, &table, config.pretty)
        .with_context(|| format!("writing {}", config.output.display()))?;
    println!("{}  {}", written.digest_hex(), written.path.display());
    Ok(())
}

fn cmd_lookup(args: &LookupArgs) -> Result<()> {
    let ring = ResidueRing::new(args.modulus)?;
    let table = read_table(&args.table, &ring, StorageMode::Auto)
        .with_context(|| format!("loading {}", args.table.display()))?;
    for &residue in &args.residues {
        match table.lookup(residue) {
            Some(exponent) => println!("{residue} {exponent}"),
            None => println!("{residue} none"),
        }
    }
    Ok(())
}

fn cmd_verify(args: &VerifyArgs) -> Result<()> {
    let ring = ResidueRing::new(args.modulus)?;
    let table = read_table(&args.table, &ring, StorageMode::Auto)
        .with_context(|| format!("loading {}", args.table.display()))?;
    let digest = file_digest(&args.table)?;
    info!("{} blake2b-256 {}", args.table.display(), hex::encode(digest));

    let report = verify_table(&table, args.base)?;
    for m in &report.mismatches {
        println!(
            "mismatch: residue {} stored exponent {} evaluates to {}",
            m.residue, m.exponent, m.actual
        );
    }
    if !report.is_ok() {
        bail!(
            "{} of {} entries failed verification",
            report.mismatches.len(),
            report.checked
        );
    }
    if args.full {
        let config = TableConfig {
            collision: args.keep,
            ..TableConfig::new(args.base, args.modulus)
        };
        if !verify_against_rebuild(&table, &config)? {
            bail!("table does not match a fresh build");
        }
    }
    println!("ok: {} entries", report.checked);
    Ok(())
}
