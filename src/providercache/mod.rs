// src/providercache/mod.rs

//! On-disk provider cache
//!
//! A cache directory holds unpacked provider packages in the layout
//! `<base>/<hostname>/<namespace>/<type>/<version>/<os>_<arch>/`. [`Dir`]
//! indexes one such directory for one target platform, scanning it lazily and
//! at most once, and installs new packages into it atomically.

mod dir;
mod install;

pub use dir::{CacheIndex, Dir};

use std::fs;
use std::path::{Path, PathBuf};

use crate::addrs::PluginIdentity;
use crate::error::{Error, Result};
use crate::version::Version;

/// Executable name prefixes inside a package directory
const EXECUTABLE_PREFIXES: [&str; 2] = ["tofu-provider-", "terraform-provider-"];

/// A provider package unpacked on disk and ready to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedProvider {
    pub identity: PluginIdentity,
    pub version: Version,
    /// Package directory, always with forward slashes
    pub package_dir: String,
}

impl CachedProvider {
    pub fn new(identity: PluginIdentity, version: Version, package_dir: &Path) -> Self {
        Self {
            identity,
            version,
            package_dir: slash_path(package_dir),
        }
    }

    pub fn package_dir_path(&self) -> PathBuf {
        PathBuf::from(&self.package_dir)
    }

    /// Locate the provider executable inside the package directory
    ///
    /// Picks the first file, by name, called `tofu-provider-<type>*` or
    /// `terraform-provider-<type>*`.
    pub fn executable_file(&self) -> Result<PathBuf> {
        let dir = self.package_dir_path();
        let not_found = || Error::ExecutableNotFound {
            provider: self.identity.to_string(),
            dir: dir.clone(),
        };

        let mut names: Vec<String> = fs::read_dir(&dir)
            .map_err(|_| not_found())?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();

        names
            .into_iter()
            .find(|name| {
                EXECUTABLE_PREFIXES.iter().any(|prefix| {
                    name.strip_prefix(prefix)
                        .is_some_and(|rest| rest.starts_with(&self.identity.type_name))
                })
            })
            .map(|name| dir.join(name))
            .ok_or_else(not_found)
    }
}

/// Clean a path and render it with forward slashes regardless of host
pub(crate) fn slash_path(path: &Path) -> String {
    let cleaned: PathBuf = path.components().collect();
    let rendered = cleaned.to_string_lossy().into_owned();
    if std::path::MAIN_SEPARATOR == '/' {
        rendered
    } else {
        rendered.replace(std::path::MAIN_SEPARATOR, "/")
    }
}
