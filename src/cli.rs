// src/cli.rs
//! CLI definitions for provider-core
//!
//! The command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "provider-core")]
#[command(version)]
#[command(about = "Resolve, install and inspect infrastructure providers", long_about = None)]
pub struct Cli {
    /// Installation configuration file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the provider cache directory
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Override the target platform (os_arch)
    #[arg(long, global = true)]
    pub platform: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Select a version for every required provider without installing
    Resolve {
        /// Requirements file
        requirements: PathBuf,
    },

    /// Resolve and install every required provider into the cache
    Install {
        /// Requirements file
        requirements: PathBuf,

        /// Abort unfinished work after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// List providers in the cache
    Cache {
        /// Only show this provider
        provider: Option<String>,
    },

    /// Evaluate a mirror template for a provider
    Template {
        /// Template text, e.g. "https://mirror/${namespace}/${type}/"
        template: String,

        /// Provider address
        provider: String,
    },
}
