// src/source/local_dir.rs

//! Directory scanning in the provider cache layout
//!
//! ```text
//! <base>/<hostname>/<namespace>/<type>/<version>/<os>_<arch>/           unpacked
//! <base>/<hostname>/<namespace>/<type>/tofu-provider-<type>_<version>_<os>_<arch>.tar.gz
//! ```
//!
//! The `terraform-provider-` archive prefix is accepted as well. Anything that
//! does not fit the layout is skipped with a trace message.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing::{trace, warn};
use walkdir::WalkDir;

use super::{CandidateQuery, PackageLocation, PackageMeta, Source};
use crate::addrs::PluginIdentity;
use crate::error::{Error, Result};
use crate::platform::TargetPlatform;
use crate::providercache::Dir;
use crate::version::Version;

/// File name prefixes of packed provider archives
const ARCHIVE_PREFIXES: [&str; 2] = ["tofu-provider-", "terraform-provider-"];

/// File name suffix of packed provider archives
pub(crate) const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Split a packed archive file name into type, version and platform
pub fn parse_archive_name(file_name: &str) -> Option<(String, Version, TargetPlatform)> {
    let stem = file_name.strip_suffix(ARCHIVE_SUFFIX)?;
    let stem = ARCHIVE_PREFIXES
        .iter()
        .find_map(|prefix| stem.strip_prefix(prefix))?;

    let mut parts = stem.rsplitn(3, '_');
    let arch = parts.next()?;
    let os = parts.next()?;
    let (type_name, version) = parts.next()?.rsplit_once('_')?;

    let version = Version::parse(version).ok()?;
    let platform = TargetPlatform::parse(&format!("{}_{}", os, arch)).ok()?;
    Some((type_name.to_string(), version, platform))
}

/// Find all packages for one provider inside its `<type>` directory
///
/// A missing directory yields an empty result.
pub fn search_package_dir(dir: &Path, identity: &PluginIdentity) -> Result<Vec<PackageMeta>> {
    if !dir.is_dir() {
        trace!("No package directory at {}", dir.display());
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(2)
        .follow_links(true)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(Error::IoError(format!(
                    "Failed to read {}: {}",
                    dir.display(),
                    e
                )));
            }
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", dir.display(), e);
                continue;
            }
        };

        let name = entry.file_name().to_string_lossy();
        let is_dir = entry.file_type().is_dir();

        match (entry.depth(), is_dir) {
            (1, false) => match parse_archive_name(&name) {
                Some((type_name, version, platform)) if type_name == identity.type_name => {
                    found.push(PackageMeta {
                        identity: identity.clone(),
                        version,
                        platform,
                        location: PackageLocation::LocalArchive(entry.path().to_path_buf()),
                    });
                }
                Some((type_name, ..)) => {
                    trace!(
                        "Ignoring archive {} for type {} under {}",
                        name,
                        type_name,
                        identity
                    );
                }
                None => trace!("Ignoring {}: not a provider archive", entry.path().display()),
            },
            (2, true) => {
                let version_name = entry
                    .path()
                    .parent()
                    .and_then(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let (Ok(version), Ok(platform)) =
                    (Version::parse(&version_name), TargetPlatform::parse(&name))
                else {
                    trace!("Ignoring {}: not <version>/<os>_<arch>", entry.path().display());
                    continue;
                };
                found.push(PackageMeta {
                    identity: identity.clone(),
                    version,
                    platform,
                    location: PackageLocation::LocalDir(entry.path().to_path_buf()),
                });
            }
            _ => {}
        }
    }

    Ok(found)
}

/// Find every package under a base directory, grouped by provider
///
/// Packages for each provider keep discovery order, which is sorted by file
/// name at every level. A missing base directory yields an empty map; any
/// other failure to read it is an error.
pub fn search_local_directory(base: &Path) -> Result<BTreeMap<PluginIdentity, Vec<PackageMeta>>> {
    let mut all = BTreeMap::new();

    match std::fs::metadata(base) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(Error::IoError(format!(
                "{} is not a directory",
                base.display()
            )));
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(all),
        Err(e) => {
            return Err(Error::IoError(format!(
                "Failed to read {}: {}",
                base.display(),
                e
            )));
        }
    }

    // Dot directories hold in-progress installs
    let walker = WalkDir::new(base)
        .min_depth(3)
        .max_depth(3)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(Error::IoError(format!(
                    "Failed to read {}: {}",
                    base.display(),
                    e
                )));
            }
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", base.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }

        let Ok(rel) = entry.path().strip_prefix(base) else {
            continue;
        };
        let components: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let identity = match PluginIdentity::parse(&components.join("/")) {
            Ok(identity) => identity,
            Err(e) => {
                trace!("Ignoring {}: {}", entry.path().display(), e);
                continue;
            }
        };

        let packages = search_package_dir(entry.path(), &identity)?;
        if !packages.is_empty() {
            all.entry(identity)
                .or_insert_with(Vec::new)
                .extend(packages);
        }
    }

    Ok(all)
}

/// Offers the unpacked, platform-matching packages of a provider cache
pub struct LocalDirSource {
    dir: Arc<Dir>,
}

impl LocalDirSource {
    pub fn new(dir: Arc<Dir>) -> Self {
        Self { dir }
    }
}

impl Source for LocalDirSource {
    fn describe(&self) -> String {
        format!("local directory {}", self.dir.base_dir().display())
    }

    fn list_candidates(&self, query: &CandidateQuery<'_>) -> Result<Vec<PackageMeta>> {
        if self.dir.platform() != query.platform {
            return Ok(Vec::new());
        }
        Ok(self
            .dir
            .lookup(query.identity)
            .into_iter()
            .map(|cached| PackageMeta {
                identity: cached.identity.clone(),
                version: cached.version.clone(),
                platform: self.dir.platform().clone(),
                location: PackageLocation::LocalDir(cached.package_dir_path()),
            })
            .collect())
    }
}
