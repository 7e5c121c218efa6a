// src/config/installation.rs

//! The `[provider_installation]` configuration block

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::ConfigError;
use crate::error::Result;
use crate::platform::TargetPlatform;
use crate::providercache::Dir;
use crate::source::{
    ChainEntry, ChainPolicy, Fetcher, FilesystemMirrorSource, LocalDirSource,
    NetworkMirrorSource, Source, SourceChain, SourceFilter, TemplatedMirrorSource,
};
use crate::template::MirrorTemplate;

/// Cache location under the home directory when none is configured
pub const DEFAULT_CACHE_SUBDIR: &str = ".tofu.d/plugins";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    provider_installation: InstallationConfig,
}

/// How providers are installed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallationConfig {
    /// How answers from several sources are combined
    #[serde(default)]
    pub policy: ChainPolicy,

    /// Provider cache directory; `~/` is expanded
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Target platform, defaulting to the host
    #[serde(default)]
    pub platform: Option<TargetPlatform>,

    /// Installation sources, checked in order
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
}

/// One installation source with its provider patterns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(flatten)]
    pub kind: SourceKind,

    /// Providers this source may answer for; empty means all
    #[serde(default)]
    pub include: Vec<String>,

    /// Providers this source never answers for
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    /// Unpacked packages in a cache directory, the configured cache by default
    LocalDir {
        #[serde(default)]
        path: Option<PathBuf>,
    },
    FilesystemMirror { path: PathBuf },
    TemplatedMirror { template: String },
    NetworkMirror { url: String },
}

/// A source with everything parsed, ready to become a chain entry
enum Compiled {
    LocalDir(Option<PathBuf>),
    FilesystemMirror(PathBuf),
    TemplatedMirror(MirrorTemplate),
    NetworkMirror(Url),
}

impl InstallationConfig {
    /// Cache directory after defaults and `~/` expansion
    pub fn cache_dir(&self) -> PathBuf {
        match &self.cache_dir {
            Some(dir) => expand_home(dir),
            None => dirs::home_dir()
                .unwrap_or_default()
                .join(DEFAULT_CACHE_SUBDIR),
        }
    }

    pub fn platform(&self) -> TargetPlatform {
        self.platform.clone().unwrap_or_else(TargetPlatform::current)
    }

    /// Check every source, failing on the first bad template, URL or pattern
    pub fn validate(&self) -> Result<()> {
        self.compile().map(|_| ())
    }

    fn compile(&self) -> Result<Vec<(Compiled, SourceFilter)>> {
        self.sources
            .iter()
            .map(|source| -> Result<(Compiled, SourceFilter)> {
                let compiled = match &source.kind {
                    SourceKind::LocalDir { path } => {
                        Compiled::LocalDir(path.as_deref().map(expand_home))
                    }
                    SourceKind::FilesystemMirror { path } => {
                        Compiled::FilesystemMirror(expand_home(path))
                    }
                    SourceKind::TemplatedMirror { template } => {
                        Compiled::TemplatedMirror(MirrorTemplate::parse(template)?)
                    }
                    SourceKind::NetworkMirror { url } => {
                        let parsed = Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
                            url: url.clone(),
                            message: e.to_string(),
                        })?;
                        if !matches!(parsed.scheme(), "http" | "https") {
                            return Err(ConfigError::InvalidUrl {
                                url: url.clone(),
                                message: "network mirrors must use http or https".to_string(),
                            }
                            .into());
                        }
                        Compiled::NetworkMirror(parsed)
                    }
                };
                Ok((compiled, SourceFilter::new(&source.include, &source.exclude)?))
            })
            .collect()
    }

    /// Build the source chain
    ///
    /// `cache` backs `local_dir` sources without a path of their own. With no
    /// sources configured, the chain consists of the cache alone.
    pub fn build_chain(&self, cache: Arc<Dir>, fetcher: Arc<dyn Fetcher>) -> Result<SourceChain> {
        let mut chain = SourceChain::new(self.policy);

        if self.sources.is_empty() {
            debug!("No installation sources configured, using the cache only");
            chain.push(LocalDirSource::new(cache));
            return Ok(chain);
        }

        for (compiled, filter) in self.compile()? {
            let source: Box<dyn Source> = match compiled {
                Compiled::LocalDir(None) => Box::new(LocalDirSource::new(cache.clone())),
                Compiled::LocalDir(Some(path)) => Box::new(LocalDirSource::new(Arc::new(
                    Dir::new(path, cache.platform().clone()),
                ))),
                Compiled::FilesystemMirror(path) => Box::new(FilesystemMirrorSource::new(path)),
                Compiled::TemplatedMirror(template) => {
                    Box::new(TemplatedMirrorSource::new(template, fetcher.clone()))
                }
                Compiled::NetworkMirror(url) => {
                    Box::new(NetworkMirrorSource::new(url, fetcher.clone()))
                }
            };
            debug!("Adding installation source: {}", source.describe());
            chain.push_entry(ChainEntry::new(source, filter));
        }

        Ok(chain)
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

/// Load an installation configuration file
pub fn load_installation_config(path: &Path) -> Result<InstallationConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    parse_installation_config(&content)
}

/// Parse and validate an installation configuration
///
/// Template syntax errors and malformed URLs or patterns are reported here,
/// before any provider is looked up.
pub fn parse_installation_config(content: &str) -> Result<InstallationConfig> {
    let file: ConfigFile = toml::from_str(content).map_err(ConfigError::from)?;
    file.provider_installation.validate()?;
    Ok(file.provider_installation)
}
