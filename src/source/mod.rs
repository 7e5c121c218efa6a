// src/source/mod.rs

//! Installation sources
//!
//! An installation source answers one question: which packages can it offer
//! for a provider? Sources are arranged in a [`SourceChain`] whose policy
//! decides whether the first source with candidates wins or all answers are
//! combined.
//!
//! Built-in sources:
//! - [`LocalDirSource`] - packages already unpacked in a provider cache
//! - [`FilesystemMirrorSource`] - a directory laid out like the cache, with
//!   unpacked directories and/or archives
//! - [`TemplatedMirrorSource`] - per-provider location computed from a
//!   [`MirrorTemplate`](crate::template::MirrorTemplate)
//! - [`NetworkMirrorSource`] - the JSON mirror protocol over HTTP

mod chain;
mod filesystem_mirror;
mod http;
mod local_dir;
mod network_mirror;
mod templated_mirror;

pub use chain::{ChainEntry, ChainPolicy, SourceChain, SourceFilter};
pub use filesystem_mirror::FilesystemMirrorSource;
pub use http::{Fetcher, HttpFetcher};
pub use local_dir::{LocalDirSource, parse_archive_name, search_local_directory, search_package_dir};
pub use network_mirror::NetworkMirrorSource;
pub use templated_mirror::TemplatedMirrorSource;

use crate::addrs::PluginIdentity;
use crate::cancel::Cancellation;
use crate::error::Result;
use crate::hash::PackageHash;
use crate::platform::TargetPlatform;
use crate::version::{ConstraintSet, Version};
use std::fmt;
use std::path::PathBuf;

/// Where a provider package can be obtained
///
/// Only [`PackageLocation::LocalDir`] is directly executable; every other
/// kind is materialized into the cache first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageLocation {
    /// An unpacked package directory
    LocalDir(PathBuf),
    /// A `.tar.gz` package archive on the local filesystem
    LocalArchive(PathBuf),
    /// A `.tar.gz` package archive behind a URL, with its expected checksum
    RemoteArchive { url: String, hash: PackageHash },
    /// A `.tar.gz` package stored as an OCI blob
    OciBlob {
        registry: String,
        repository: String,
        digest: PackageHash,
    },
}

impl PackageLocation {
    pub fn is_unpacked(&self) -> bool {
        matches!(self, PackageLocation::LocalDir(_))
    }
}

impl fmt::Display for PackageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageLocation::LocalDir(p) | PackageLocation::LocalArchive(p) => {
                write!(f, "{}", p.display())
            }
            PackageLocation::RemoteArchive { url, .. } => write!(f, "{}", url),
            PackageLocation::OciBlob {
                registry,
                repository,
                digest,
            } => write!(f, "oci://{}/{}@{}", registry, repository, digest),
        }
    }
}

/// One candidate package reported by a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMeta {
    pub identity: PluginIdentity,
    pub version: Version,
    pub platform: TargetPlatform,
    pub location: PackageLocation,
}

/// What a source is asked for
///
/// The constraints are a hint: a source may use them to avoid fetching
/// metadata for versions that cannot be selected, but the resolver filters
/// again regardless. Sources that do network work check `cancel` before each
/// request and pass it on to the [`Fetcher`].
#[derive(Debug, Clone, Copy)]
pub struct CandidateQuery<'a> {
    pub identity: &'a PluginIdentity,
    pub constraints: &'a ConstraintSet,
    pub platform: &'a TargetPlatform,
    pub cancel: &'a Cancellation,
}

/// A strategy for locating provider packages
pub trait Source: Send + Sync {
    /// Human-readable description used in logs
    fn describe(&self) -> String;

    /// List candidate packages, possibly none
    ///
    /// Errors are scoped to this source and this provider; the chain logs them
    /// and carries on. `Err(Cancelled)` stops the whole query.
    fn list_candidates(&self, query: &CandidateQuery<'_>) -> Result<Vec<PackageMeta>>;
}
