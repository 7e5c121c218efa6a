// src/config/mod.rs

//! Configuration files
//!
//! Two TOML files drive the core: the installation configuration, which says
//! where providers come from and where they are cached, and a requirements
//! file listing the providers a configuration needs.
//!
//! # Example installation configuration
//!
//! ```toml
//! [provider_installation]
//! policy = "first_match"
//! cache_dir = "~/.tofu.d/plugins"
//!
//! # Checked in order
//! [[provider_installation.source]]
//! kind = "local_dir"
//!
//! [[provider_installation.source]]
//! kind = "filesystem_mirror"
//! path = "/usr/share/tofu/providers"
//! include = ["example.com/*/*"]
//!
//! [[provider_installation.source]]
//! kind = "network_mirror"
//! url = "https://mirror.example.com/providers/"
//! exclude = ["example.com/*/*"]
//! ```
//!
//! # Example requirements file
//!
//! ```toml
//! [[requirement]]
//! provider = "example.com/acme/widget"
//! constraints = ">= 1.0, < 2.0"
//! source = "main.tf"
//! ```

mod installation;
mod requirements;

pub use installation::{
    DEFAULT_CACHE_SUBDIR, InstallationConfig, SourceConfig, SourceKind,
    load_installation_config, parse_installation_config,
};
pub use requirements::{RequirementEntry, load_requirements, parse_requirements};

use std::path::PathBuf;
use thiserror::Error;

/// Errors in configuration files
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid provider pattern {0}")]
    InvalidPattern(String),

    #[error("Invalid mirror URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Invalid requirement for '{provider}': {message}")]
    InvalidRequirement { provider: String, message: String },
}
