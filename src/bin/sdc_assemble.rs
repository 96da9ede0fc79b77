//! # sdc-assemble
//!
//! Assemble a modular Questionnaire from the command line.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use octofhir_sdc_assembler::{
    AssembleConfig, Assembler, FhirServerConfig, MatchPolicy, ProgressSink,
    questionnaire_from_parameters,
};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sdc-assemble")]
#[command(about = "Inline sub-questionnaires into a modular FHIR Questionnaire")]
#[command(version)]
struct Cli {
    /// Root Questionnaire (or $assemble Parameters) JSON file
    root: PathBuf,

    /// Directory of module Questionnaire JSON files (repeatable)
    #[arg(short, long = "modules", value_name = "DIR")]
    modules: Vec<PathBuf>,

    /// FHIR server base URL to search for modules
    #[arg(short, long)]
    server: Option<String>,

    /// Bearer token for --server
    #[arg(long, requires = "server")]
    token: Option<String>,

    /// How to pick among several versions of an unversioned canonical
    #[arg(short, long, value_name = "unique|latest|first")]
    policy: Option<MatchPolicy>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the assembled Questionnaire here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Config file settings, extended by command-line flags.
    async fn config(&self) -> Result<AssembleConfig> {
        let mut config = match &self.config {
            Some(path) => AssembleConfig::from_file(path)
                .await
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => AssembleConfig::default(),
        };

        config.module_dirs.extend(self.modules.iter().cloned());
        if let Some(url) = &self.server {
            let mut server = FhirServerConfig::new(url);
            if let Some(token) = &self.token {
                server = server.with_bearer_token(token);
            }
            config.servers.push(server);
        }
        if let Some(policy) = self.policy {
            config.match_policy = policy;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config().await?;
    info!(
        "Resolving modules from {} director(ies) and {} server(s)",
        config.module_dirs.len(),
        config.servers.len()
    );
    let resolver = config.build_resolver().await?;
    let assembler = Assembler::new(resolver);

    let content = tokio::fs::read_to_string(&cli.root)
        .await
        .with_context(|| format!("Failed to read {}", cli.root.display()))?;
    let input: Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", cli.root.display()))?;
    let root = questionnaire_from_parameters(&input)?;

    let progress = |message: &str| eprintln!("{message}");
    let assembled = assembler
        .assemble(&root, Some(&progress as &dyn ProgressSink))
        .await?;

    let rendered = serde_json::to_string_pretty(&assembled)?;
    match &cli.output {
        Some(path) => {
            tokio::fs::write(path, rendered)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => println!("{rendered}"),
    }

    Ok(())
}
