// src/main.rs

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::Settings;

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings {
        config: cli.config,
        cache_dir: cli.cache_dir,
        platform: cli.platform,
    };

    match cli.command {
        Commands::Resolve { requirements } => commands::cmd_resolve(&settings, &requirements),
        Commands::Install {
            requirements,
            timeout,
        } => commands::cmd_install(&settings, &requirements, timeout),
        Commands::Cache { provider } => commands::cmd_cache(&settings, provider.as_deref()),
        Commands::Template { template, provider } => commands::cmd_template(&template, &provider),
    }
}
