//! Ownership resolution CLI
//!
//! Runs the engine against a JSON fixture registry and prints JSON.
//!
//! ```bash
//! ownership-resolve tree   --fixture registry.json --target 00445790
//! ownership-resolve screen --fixture registry.json --target 00445790 --max-depth 4
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ownership_resolution::{
    Collaborators, FixtureRegistry, ForeignEntityClassifier, OwnershipTreeBuilder, RegistryId,
    ResolverConfig, ScreeningConsolidator,
};

#[derive(Parser)]
#[command(name = "ownership-resolve")]
#[command(version)]
#[command(about = "Resolve company ownership trees and screening lists")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Fixture registry (JSON)
    #[arg(long, short, global = true, env = "OWNERSHIP_FIXTURE")]
    fixture: Option<PathBuf>,

    /// Resolver config (JSON); defaults apply when omitted
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Override max_depth
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    /// Override fuzzy_threshold
    #[arg(long, global = true)]
    threshold: Option<f64>,

    /// Compact JSON instead of pretty
    #[arg(long, global = true)]
    compact: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the ownership tree for a target
    Tree {
        /// Registry id of the target company
        #[arg(long, short)]
        target: String,
    },

    /// Build the tree and flatten it into a screening list
    Screen {
        /// Registry id of the target company
        #[arg(long, short)]
        target: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ResolverConfig::from_file(path)?,
        None => ResolverConfig::default(),
    };
    if let Some(depth) = cli.max_depth {
        config.max_depth = depth;
    }
    if let Some(threshold) = cli.threshold {
        config.fuzzy_threshold = threshold;
    }
    config.validate().context("Invalid resolver configuration")?;

    let fixture = cli
        .fixture
        .as_ref()
        .context("A fixture registry is required (--fixture or OWNERSHIP_FIXTURE)")?;
    let registry = Arc::new(FixtureRegistry::from_json_file(fixture)?);
    info!(companies = registry.company_count(), "fixture registry loaded");

    let mut builder = OwnershipTreeBuilder::new(Collaborators::from_registry(registry.clone()), config.clone());
    if let Some(rules) = &config.suffix_rules_path {
        let classifier = ForeignEntityClassifier::with_rules_from_file(rules)?;
        builder = builder.with_classifier(Arc::new(classifier));
    }

    let output = match &cli.command {
        Commands::Tree { target } => {
            let report = builder.build_report(&RegistryId::new(target.as_str())).await;
            info!(fingerprint = %report.fingerprint(), nodes = report.stats.total_nodes, "tree built");
            to_json(&report, cli.compact)?
        }
        Commands::Screen { target } => {
            let report = builder.build_report(&RegistryId::new(target.as_str())).await;
            let list = ScreeningConsolidator::new(registry, &config)
                .consolidate(&report.root)
                .await;
            info!(entries = list.len(), "screening list built");
            to_json(&list, cli.compact)?
        }
    };

    println!("{}", output);
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T, compact: bool) -> Result<String> {
    let json = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    json.context("Failed to serialize output")
}
