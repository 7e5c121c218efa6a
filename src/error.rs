// src/error.rs

//! Crate-wide error type
//!
//! Errors fall into a few families: load-time errors (versions, constraints,
//! templates, configuration), per-query errors that the source chain absorbs,
//! resolution errors reported per provider, and install/cache errors.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::resolver::ResolveError;
use crate::template::TemplateError;

/// Errors produced by the provider core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed version '{0}': {1}")]
    MalformedVersion(String, String),

    #[error("Malformed version constraint '{0}': {1}")]
    MalformedConstraint(String, String),

    #[error("Invalid provider address '{0}': {1}")]
    InvalidIdentity(String, String),

    #[error("Invalid target platform '{0}'")]
    InvalidPlatform(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Download error: {0}")]
    DownloadError(String),

    #[error("Mirror protocol error: {0}")]
    ProtocolError(String),

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Unsupported package location: {0}")]
    UnsupportedLocation(String),

    #[error("No executable for {provider} found in {}", dir.display())]
    ExecutableNotFound { provider: String, dir: PathBuf },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Operation cancelled")]
    Cancelled,
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err.to_string())
    }
}

/// Result type for provider core operations
pub type Result<T> = std::result::Result<T, Error>;
