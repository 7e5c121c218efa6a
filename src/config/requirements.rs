// src/config/requirements.rs

//! Requirements files: which providers are needed, at which versions

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use super::ConfigError;
use crate::addrs::PluginIdentity;
use crate::error::Result;
use crate::resolver::Requirements;
use crate::version::ConstraintSet;

#[derive(Debug, Default, Deserialize)]
struct RequirementsFile {
    #[serde(default, rename = "requirement")]
    requirements: Vec<RequirementEntry>,
}

/// One declared provider requirement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementEntry {
    /// Provider address, `[hostname/]namespace/type` or a bare type
    pub provider: String,

    /// Version constraints; empty means any version
    #[serde(default)]
    pub constraints: String,

    /// Where the requirement was declared, for diagnostics
    #[serde(default)]
    pub source: Option<String>,
}

/// Load a requirements file
pub fn load_requirements(path: &Path) -> Result<Requirements> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    parse_requirements(&content)
}

/// Parse requirements, combining the constraints of repeated providers
pub fn parse_requirements(content: &str) -> Result<Requirements> {
    let file: RequirementsFile = toml::from_str(content).map_err(ConfigError::from)?;

    let mut requirements = Requirements::new();
    for entry in &file.requirements {
        let invalid = |e: crate::error::Error| ConfigError::InvalidRequirement {
            provider: entry.provider.clone(),
            message: e.to_string(),
        };
        let identity = PluginIdentity::parse(&entry.provider).map_err(invalid)?;
        let constraints = ConstraintSet::parse(&entry.constraints).map_err(invalid)?;
        debug!(
            "{} requires {} {}",
            entry.source.as_deref().unwrap_or("configuration"),
            identity,
            constraints
        );
        requirements.add(identity, &constraints);
    }
    Ok(requirements)
}
