//! Ragdoc CLI
//!
//! Ingest documents, search them, and chat over them with any configured
//! language-model and embedding backend.

use anyhow::Result;
use clap::Parser;
use ragdoc_core::error::exit_codes;
use ragdoc_core::{ProviderManager, RagError, Settings};

mod app;
mod commands;
mod output;
mod progress;

use app::{Cli, Commands};
use commands::Context;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<RagError>()
            .map(RagError::exit_code)
            .unwrap_or(exit_codes::GENERAL_ERROR);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(Settings::default_path);
    let mut settings = Settings::load_from(&config_path)?;
    if let Some(db) = cli.db {
        settings.database_path = db;
    }

    let ctx = Context {
        settings,
        config_path,
        format: cli.format,
        manager: ProviderManager::default(),
    };

    match cli.command {
        Commands::Ingest(args) => commands::ingest::run(args, &ctx).await,
        Commands::Search(args) => commands::search::run(args, &ctx).await,
        Commands::Chat(args) => commands::chat::run(args, &ctx).await,
        Commands::Reindex(args) => commands::reindex::run(args, &ctx).await,
        Commands::Documents => commands::documents::run(&ctx).await,
        Commands::Delete { id } => commands::documents::delete(id, &ctx).await,
        Commands::Providers(args) => commands::providers::run(args, &ctx).await,
        Commands::Health => commands::health::run(&ctx).await,
        Commands::Config(args) => commands::config::run(args, &ctx).await,
    }
}
