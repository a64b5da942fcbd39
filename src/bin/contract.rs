//! waymark-contract: edge-expanded graph artifacts -> contraction hierarchy

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use waymark::contractor::{contract, ContractorConfig};
use waymark::ebg::EegNodeStore;
use waymark::formats::{self, artifact_path, suffix};
use waymark::query::QueryGraph;
use waymark::validate::validate_hierarchy;
use waymark::ContractError;

#[derive(Parser)]
#[command(name = "waymark-contract")]
#[command(about = "Build the contraction hierarchy over extracted artifacts")]
struct Cli {
    /// Artifact base path (as passed to waymark-extract)
    base: PathBuf,

    /// Worker threads (default: all physical cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Fraction of nodes to contract; below 1.0 leaves an uncontracted core
    #[arg(long, default_value_t = 1.0)]
    core_factor: f64,

    /// Compare this many random pairs against a plain search afterwards
    #[arg(long, default_value_t = 0)]
    self_check: usize,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    if let Some(threads) = cli.threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
        {
            error!("thread pool: {e}");
            return ExitCode::from(1);
        }
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ (ContractError::Io(_) | ContractError::Artifact(_))) => {
            error!("{e}");
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{e}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: &Cli) -> Result<(), ContractError> {
    let ebg_path = artifact_path(&cli.base, suffix::EBG);
    let records = formats::ebg::read(&ebg_path)?;
    let (segments, forward) = formats::ebg_nodes::read(&artifact_path(&cli.base, suffix::EBG_NODES))?;
    let (weights, durations) = formats::enw::read(&artifact_path(&cli.base, suffix::ENW))?;
    let n_nodes = segments.len();
    info!(nodes = n_nodes, edges = records.len(), "edge-expanded graph loaded");

    let config = ContractorConfig {
        core_factor: cli.core_factor,
        ..Default::default()
    };
    let contraction = contract(n_nodes, &records, &config)?;

    let (checksum, identity) = formats::ebg_checksum(&ebg_path)?;
    let hsgr = contraction.into_hsgr(checksum);
    formats::hsgr::write(&artifact_path(&cli.base, suffix::HSGR), &hsgr)?;
    // Node costs travel with the hierarchy for the query tier
    formats::enw::write(&artifact_path(&cli.base, suffix::ENW), &weights, &durations)?;
    info!(
        identity = %identity,
        "hierarchy written to {}",
        artifact_path(&cli.base, suffix::HSGR).display()
    );

    if cli.self_check > 0 {
        let graph = QueryGraph::from_hsgr(hsgr);
        let store = EegNodeStore {
            segments,
            forward,
            weights,
            durations,
        };
        let report = validate_hierarchy(&graph, &store, &records, cli.self_check, 0xb10c5eed);
        info!(
            sampled = report.sampled,
            mismatches = report.mismatches,
            "self-check finished"
        );
        if !report.passed() {
            return Err(ContractError::Artifact(
                waymark::ArtifactError::Corrupt {
                    path: artifact_path(&cli.base, suffix::HSGR),
                    detail: format!(
                        "{} of {} sampled pairs disagree with plain search",
                        report.mismatches, report.sampled
                    ),
                },
            ));
        }
    }

    Ok(())
}

