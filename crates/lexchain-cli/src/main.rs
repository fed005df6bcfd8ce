//! lexchain - run and inspect legal-reasoning evaluation chains
//!
//! ## Commands
//!
//! - `run`: Execute a configured chain over a JSONL file of instances
//! - `summarize`: Print summary statistics of a results file
//! - `coverage`: Print coverage tier counts of an instances file
//! - `canonicalize`: Print canonical forms of citations
//! - `verify`: Extract and verify the citations in a piece of text

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lexchain_core::{
    canonicalize_cite, report, ChainConfig, CitationCheck, CoverageReport, ReferenceSets,
};

#[derive(Parser)]
#[command(name = "lexchain")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Chained legal-reasoning evaluation runner", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a chain over a set of instances
    Run {
        /// Chain config (YAML)
        #[arg(short, long)]
        config: PathBuf,

        /// Instances file (JSONL, one chain instance per line)
        #[arg(short, long)]
        instances: PathBuf,

        /// Only run the first N instances
        #[arg(short, long)]
        limit: Option<usize>,

        /// Results file (JSONL)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fabricated citations, one per line (overrides the config)
        #[arg(long, requires = "known")]
        fake: Option<PathBuf>,

        /// Known-real citations, one per line (overrides the config)
        #[arg(long, requires = "fake")]
        known: Option<PathBuf>,
    },

    /// Print summary statistics of a results file
    Summarize {
        /// Results file (JSONL)
        results: PathBuf,
    },

    /// Print coverage tier counts of an instances file
    Coverage {
        /// Instances file (JSONL)
        #[arg(short, long)]
        instances: PathBuf,
    },

    /// Print canonical forms of citations
    Canonicalize {
        /// Citations, e.g. "347 U. S. 483"
        #[arg(required = true)]
        cites: Vec<String>,
    },

    /// Extract and verify the citations in a piece of text
    Verify {
        /// Fabricated citations, one per line
        #[arg(long)]
        fake: PathBuf,

        /// Known-real citations, one per line
        #[arg(long)]
        known: PathBuf,

        /// Text to scan for citations
        text: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            config,
            instances,
            limit,
            output,
            fake,
            known,
        } => cmd_run(
            &config,
            &instances,
            limit,
            output.as_deref(),
            fake.as_deref().zip(known.as_deref()),
        ),
        Commands::Summarize { results } => cmd_summarize(&results, cli.json),
        Commands::Coverage { instances } => cmd_coverage(&instances, cli.json),
        Commands::Canonicalize { cites } => cmd_canonicalize(&cites),
        Commands::Verify { fake, known, text } => cmd_verify(&fake, &known, &text),
    }
}

/// Install the global subscriber. `RUST_LOG` overrides `level`.
fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}

fn load_references(fake: &Path, known: &Path) -> Result<ReferenceSets> {
    let fake_cites = report::read_reference_file(fake)
        .with_context(|| format!("Failed to read fake citations: {:?}", fake))?;
    let known_cites = report::read_reference_file(known)
        .with_context(|| format!("Failed to read known citations: {:?}", known))?;

    info!(
        fake = fake_cites.len(),
        known = known_cites.len(),
        "Loaded reference citations"
    );
    Ok(ReferenceSets::from_raw(&fake_cites, &known_cites))
}

fn cmd_run(
    config_path: &Path,
    instances_path: &Path,
    limit: Option<usize>,
    output: Option<&Path>,
    references: Option<(&Path, &Path)>,
) -> Result<()> {
    let config = ChainConfig::from_yaml_file(config_path)
        .with_context(|| format!("Failed to load chain config: {:?}", config_path))?;

    let references = references
        .map(|(fake, known)| load_references(fake, known))
        .transpose()?;

    let executor = config
        .build_executor(config.build_backend(), references.as_ref())
        .context("Failed to build executor")?;

    let mut instances = report::read_instances(instances_path)
        .with_context(|| format!("Failed to read instances: {:?}", instances_path))?;
    if let Some(limit) = limit {
        instances.truncate(limit);
    }

    info!(
        chain = %config.name,
        instances = instances.len(),
        steps = executor.steps().len(),
        "Running chain"
    );

    let results = executor.execute_all(&instances);

    if let Some(path) = output {
        let count = report::write_results(&results, path)
            .with_context(|| format!("Failed to write results: {:?}", path))?;
        println!("Wrote {} results to {}", count, path.display());
    }

    print!("{}", report::summarize_results(&results));
    Ok(())
}

fn cmd_summarize(path: &Path, json: bool) -> Result<()> {
    let results = report::read_results(path)
        .with_context(|| format!("Failed to read results: {:?}", path))?;
    let summary = report::summarize_results(&results);

    if json {
        print_json(&summary)
    } else {
        print!("{}", summary);
        Ok(())
    }
}

fn cmd_coverage(path: &Path, json: bool) -> Result<()> {
    let instances = report::read_instances(path)
        .with_context(|| format!("Failed to read instances: {:?}", path))?;
    let coverage = CoverageReport::from_instances(&instances);

    if json {
        print_json(&coverage)
    } else {
        println!("{}", coverage);
        Ok(())
    }
}

fn cmd_canonicalize(cites: &[String]) -> Result<()> {
    for cite in cites {
        println!("{}\t{}", cite, canonicalize_cite(cite));
    }
    Ok(())
}

#[derive(Serialize)]
struct VerifyOutput {
    citations: Vec<CitationCheck>,
    all_valid: bool,
}

fn cmd_verify(fake: &Path, known: &Path, text: &str) -> Result<()> {
    let references = load_references(fake, known)?;
    let (citations, all_valid) = references.verify_text(text);

    print_json(&VerifyOutput {
        citations,
        all_valid,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
