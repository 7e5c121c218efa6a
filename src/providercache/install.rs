// src/providercache/install.rs

//! Materializing packages into the cache
//!
//! Every location kind ends up as an unpacked directory at
//! `<base>/<hostname>/<namespace>/<type>/<version>/<os>_<arch>/`. Work happens
//! in a dot-prefixed staging directory under the base directory (ignored by
//! scans) and is moved into place with a single rename, so an interrupted
//! install leaves either the complete package or nothing.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::{debug, info};
use url::Url;
use walkdir::WalkDir;

use super::{CachedProvider, Dir};
use crate::cancel::Cancellation;
use crate::error::{Error, Result};
use crate::hash::{self, PackageHash};
use crate::source::{Fetcher, PackageLocation, PackageMeta};

impl Dir {
    /// Directory a package for this cache's platform is installed to
    pub fn package_dir_for(&self, meta: &PackageMeta) -> PathBuf {
        self.base_dir()
            .join(meta.identity.layout_path())
            .join(meta.version.to_string())
            .join(meta.platform.to_string())
    }

    /// Install a package and add it to the index
    ///
    /// Installing a package that is already present reuses it, so a retry
    /// after a failure is safe.
    pub fn install(
        &self,
        meta: &PackageMeta,
        fetcher: &dyn Fetcher,
        cancel: &Cancellation,
    ) -> Result<CachedProvider> {
        if meta.platform != *self.platform() {
            return Err(Error::UnsupportedLocation(format!(
                "{} {} is built for {}, but this cache holds {} packages",
                meta.identity,
                meta.version,
                meta.platform,
                self.platform()
            )));
        }

        let target = self.package_dir_for(meta);
        let entry = CachedProvider::new(meta.identity.clone(), meta.version.clone(), &target);

        if target.is_dir() {
            debug!("{} {} already present at {}", meta.identity, meta.version, target.display());
            self.insert(entry.clone());
            return Ok(entry);
        }

        cancel.check()?;
        fs::create_dir_all(self.base_dir())?;
        let staging = tempfile::Builder::new()
            .prefix(".install-")
            .tempdir_in(self.base_dir())?;
        let unpacked = staging.path().join("package");

        match &meta.location {
            PackageLocation::LocalDir(src) => copy_tree(src, &unpacked)?,
            PackageLocation::LocalArchive(archive) => unpack_archive(archive, &unpacked)?,
            PackageLocation::RemoteArchive { url, hash } => {
                let url = Url::parse(url)
                    .map_err(|e| Error::DownloadError(format!("Invalid URL {:?}: {}", url, e)))?;
                let archive = staging.path().join("package.tar.gz");
                fetch_verified(fetcher, &url, &archive, hash, cancel)?;
                unpack_archive(&archive, &unpacked)?;
            }
            PackageLocation::OciBlob {
                registry,
                repository,
                digest,
            } => {
                let url = Url::parse(&format!(
                    "https://{}/v2/{}/blobs/{}",
                    registry, repository, digest
                ))
                .map_err(|e| Error::DownloadError(format!("Invalid OCI reference: {}", e)))?;
                let archive = staging.path().join("package.tar.gz");
                fetch_verified(fetcher, &url, &archive, digest, cancel)?;
                unpack_archive(&archive, &unpacked)?;
            }
        }

        cancel.check()?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        if let Err(e) = fs::rename(&unpacked, &target) {
            // Another installer may have landed the same package first
            if !target.is_dir() {
                return Err(Error::IoError(format!(
                    "Failed to move package into {}: {}",
                    target.display(),
                    e
                )));
            }
            debug!("{} was installed concurrently", target.display());
        }

        info!("Installed {} {} to {}", meta.identity, meta.version, target.display());
        self.insert(entry.clone());
        Ok(entry)
    }
}

fn fetch_verified(
    fetcher: &dyn Fetcher,
    url: &Url,
    dest: &Path,
    expected: &PackageHash,
    cancel: &Cancellation,
) -> Result<()> {
    fetcher.download(url, dest, cancel)?;
    hash::verify_file(dest, expected)?;
    debug!("Checksum verified for {}: {}", url, expected);
    Ok(())
}

fn unpack_archive(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive)
        .map_err(|e| Error::IoError(format!("Failed to open {}: {}", archive.display(), e)))?;
    fs::create_dir_all(dest)?;
    Archive::new(GzDecoder::new(file))
        .unpack(dest)
        .map_err(|e| Error::IoError(format!("Failed to unpack {}: {}", archive.display(), e)))
}

fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry.map_err(|e| Error::IoError(format!("Failed to read {}: {}", src.display(), e)))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::IoError(e.to_string()))?;
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e: io::Error| {
                Error::IoError(format!("Failed to copy {}: {}", entry.path().display(), e))
            })?;
        }
    }
    Ok(())
}
