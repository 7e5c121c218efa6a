// src/providercache/dir.rs

//! Memoized index over a provider cache directory

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{trace, warn};

use super::CachedProvider;
use crate::addrs::PluginIdentity;
use crate::platform::TargetPlatform;
use crate::source::{PackageLocation, search_local_directory};

/// Provider → packages, each list in decreasing version precedence
pub type CacheIndex = BTreeMap<PluginIdentity, Vec<CachedProvider>>;

/// Scan state of a cache directory
///
/// There is no partially populated state: either the directory has not been
/// (successfully) scanned, or the whole index is present, possibly empty.
#[derive(Debug)]
enum ScanState {
    NotScanned,
    Scanned(Arc<CacheIndex>),
}

/// A provider cache directory for one target platform
///
/// Scan, lookup and insert all go through one lock, so concurrent callers
/// share a single scan and see inserts in order.
#[derive(Debug)]
pub struct Dir {
    base_dir: PathBuf,
    platform: TargetPlatform,
    state: Mutex<ScanState>,
}

impl Dir {
    pub fn new(base_dir: impl Into<PathBuf>, platform: TargetPlatform) -> Self {
        Self {
            base_dir: base_dir.into(),
            platform,
            state: Mutex::new(ScanState::NotScanned),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn platform(&self) -> &TargetPlatform {
        &self.platform
    }

    /// Whether a completed scan is memoized
    pub fn is_scanned(&self) -> bool {
        matches!(*self.state.lock(), ScanState::Scanned(_))
    }

    /// The memoized index, without triggering a scan
    ///
    /// `None` means the directory has not been scanned; `Some` with an empty
    /// map means it was scanned and holds nothing usable.
    pub fn index(&self) -> Option<Arc<CacheIndex>> {
        match &*self.state.lock() {
            ScanState::NotScanned => None,
            ScanState::Scanned(index) => Some(index.clone()),
        }
    }

    /// Return the index, scanning the directory on first use
    ///
    /// Later calls return the same index without touching the filesystem
    /// until [`Dir::invalidate`]. A failed scan logs a warning and yields an
    /// empty index without memoizing it, so the next call tries again.
    pub fn scan(&self) -> Arc<CacheIndex> {
        let mut state = self.state.lock();
        self.scan_locked(&mut state)
    }

    fn scan_locked(&self, state: &mut ScanState) -> Arc<CacheIndex> {
        if let ScanState::Scanned(index) = state {
            trace!("Using cached result from previous scan of {}", self.base_dir.display());
            return index.clone();
        }

        trace!("Scanning directory {}", self.base_dir.display());
        let found = match search_local_directory(&self.base_dir) {
            Ok(found) => found,
            Err(e) => {
                warn!(
                    "Failed to scan provider cache directory {}: {}",
                    self.base_dir.display(),
                    e
                );
                return Arc::new(CacheIndex::new());
            }
        };

        let mut index = CacheIndex::new();
        for (identity, metas) in found {
            for meta in metas {
                if meta.platform != self.platform {
                    trace!(
                        "Ignoring {} because it is for {}, not {}",
                        meta.location,
                        meta.platform,
                        self.platform
                    );
                    continue;
                }
                let PackageLocation::LocalDir(ref package_dir) = meta.location else {
                    trace!("Ignoring {} because it is not an unpacked directory", meta.location);
                    continue;
                };

                trace!(
                    "Including {} as a candidate package for {} {}",
                    meta.location,
                    identity,
                    meta.version
                );
                index
                    .entry(identity.clone())
                    .or_insert_with(Vec::new)
                    .push(CachedProvider::new(identity.clone(), meta.version.clone(), package_dir));
            }
        }

        // Stable, so build-metadata-only ties keep discovery order
        for entries in index.values_mut() {
            sort_entries(entries);
        }

        let index = Arc::new(index);
        *state = ScanState::Scanned(index.clone());
        index
    }

    /// Packages for one provider, newest first; empty when there are none
    pub fn lookup(&self, identity: &PluginIdentity) -> Vec<CachedProvider> {
        self.scan().get(identity).cloned().unwrap_or_default()
    }

    /// Highest-precedence package for a provider
    pub fn latest(&self, identity: &PluginIdentity) -> Option<CachedProvider> {
        self.lookup(identity).into_iter().next()
    }

    /// Add a package that now exists on disk
    ///
    /// Scans first if needed so the index stays complete. An entry with the
    /// same version and directory is replaced rather than duplicated.
    /// Snapshots handed out earlier are not modified.
    pub fn insert(&self, entry: CachedProvider) {
        let mut state = self.state.lock();
        self.scan_locked(&mut state);

        let ScanState::Scanned(index) = &mut *state else {
            warn!(
                "Not indexing {} {}: {} could not be scanned",
                entry.identity,
                entry.version,
                self.base_dir.display()
            );
            return;
        };

        let entries = Arc::make_mut(index)
            .entry(entry.identity.clone())
            .or_default();
        entries.retain(|e| !(e.version == entry.version && e.package_dir == entry.package_dir));
        trace!("Adding {} {} at {}", entry.identity, entry.version, entry.package_dir);
        entries.push(entry);
        sort_entries(entries);
    }

    /// Forget the memoized index; the next access rescans
    pub fn invalidate(&self) {
        *self.state.lock() = ScanState::NotScanned;
    }
}

fn sort_entries(entries: &mut [CachedProvider]) {
    entries.sort_by(|a, b| b.version.cmp_precedence(&a.version));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;
    use std::fs;

    fn linux() -> TargetPlatform {
        TargetPlatform::new("linux", "amd64")
    }

    fn id() -> PluginIdentity {
        PluginIdentity::new("example.com", "ns", "typ")
    }

    fn entry(version: &str, dir: &str) -> CachedProvider {
        CachedProvider::new(id(), Version::parse(version).unwrap(), Path::new(dir))
    }

    #[test]
    fn test_never_scanned_vs_empty() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Dir::new(temp.path(), linux());

        assert!(dir.index().is_none());
        assert!(!dir.is_scanned());

        assert!(dir.lookup(&id()).is_empty());
        let index = dir.index().unwrap();
        assert!(index.is_empty());
        assert!(dir.is_scanned());
    }

    #[test]
    fn test_scan_filters_platform_and_archives() {
        let temp = tempfile::tempdir().unwrap();
        let base = temp.path();
        fs::create_dir_all(base.join("example.com/ns/typ/1.0.0/linux_amd64")).unwrap();
        fs::create_dir_all(base.join("example.com/ns/typ/2.0.0/darwin_arm64")).unwrap();
        fs::write(
            base.join("example.com/ns/typ/tofu-provider-typ_3.0.0_linux_amd64.tar.gz"),
            b"",
        )
        .unwrap();

        let dir = Dir::new(base, linux());
        let found = dir.lookup(&id());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].version.to_string(), "1.0.0");
        assert!(found[0].package_dir.ends_with("example.com/ns/typ/1.0.0/linux_amd64"));
    }

    #[test]
    fn test_scan_is_memoized() {
        let temp = tempfile::tempdir().unwrap();
        let base = temp.path().join("cache");
        fs::create_dir_all(base.join("example.com/ns/typ/1.0.0/linux_amd64")).unwrap();

        let dir = Dir::new(&base, linux());
        let first = dir.scan();

        fs::remove_dir_all(&base).unwrap();
        fs::write(&base, b"not a directory").unwrap();

        let second = dir.scan();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(dir.lookup(&id()).len(), 1);
    }

    #[test]
    fn test_invalidate_rescans() {
        let temp = tempfile::tempdir().unwrap();
        let base = temp.path();
        let dir = Dir::new(base, linux());
        assert!(dir.lookup(&id()).is_empty());

        fs::create_dir_all(base.join("example.com/ns/typ/1.0.0/linux_amd64")).unwrap();
        assert!(dir.lookup(&id()).is_empty());

        dir.invalidate();
        assert!(dir.index().is_none());
        assert_eq!(dir.lookup(&id()).len(), 1);
    }

    #[test]
    fn test_failed_scan_is_not_memoized() {
        let temp = tempfile::tempdir().unwrap();
        let base = temp.path().join("cache");
        fs::write(&base, b"not a directory").unwrap();

        let dir = Dir::new(&base, linux());
        assert!(dir.scan().is_empty());
        assert!(!dir.is_scanned());
    }

    #[test]
    fn test_insert_after_failed_scan_waits_for_rescan() {
        let temp = tempfile::tempdir().unwrap();
        let base = temp.path().join("cache");
        fs::write(&base, b"not a directory").unwrap();

        let dir = Dir::new(&base, linux());
        dir.insert(entry("1.0.0", "/c/1"));
        assert!(!dir.is_scanned());
        assert!(dir.lookup(&id()).is_empty());

        // The next successful scan reports what is on disk
        fs::remove_file(&base).unwrap();
        fs::create_dir_all(base.join("example.com/ns/typ/1.0.0/linux_amd64")).unwrap();
        let found = dir.lookup(&id());
        assert_eq!(found.len(), 1);
        assert!(found[0].package_dir.ends_with("example.com/ns/typ/1.0.0/linux_amd64"));
        assert!(dir.is_scanned());
    }

    #[test]
    fn test_insert_keeps_order() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Dir::new(temp.path(), linux());

        dir.insert(entry("2.0.0", "/c/2"));
        dir.insert(entry("1.0.0", "/c/1"));
        dir.insert(entry("3.0.0", "/c/3"));
        dir.insert(entry("1.0.0", "/c/1"));

        let versions: Vec<String> = dir
            .lookup(&id())
            .iter()
            .map(|e| e.version.to_string())
            .collect();
        assert_eq!(versions, vec!["3.0.0", "2.0.0", "1.0.0"]);
        assert_eq!(dir.latest(&id()).unwrap().version.to_string(), "3.0.0");
    }

    #[test]
    fn test_insert_does_not_touch_snapshots() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Dir::new(temp.path(), linux());
        let before = dir.scan();

        dir.insert(entry("1.0.0", "/c/1"));
        assert!(before.is_empty());
        assert_eq!(dir.scan().len(), 1);
    }

    #[test]
    fn test_build_metadata_ties_are_deterministic() {
        let temp = tempfile::tempdir().unwrap();
        let base = temp.path();
        fs::create_dir_all(base.join("example.com/ns/typ/1.0.0+a/linux_amd64")).unwrap();
        fs::create_dir_all(base.join("example.com/ns/typ/1.0.0+b/linux_amd64")).unwrap();

        let first: Vec<String> = Dir::new(base, linux())
            .lookup(&id())
            .into_iter()
            .map(|e| e.package_dir)
            .collect();
        let second: Vec<String> = Dir::new(base, linux())
            .lookup(&id())
            .into_iter()
            .map(|e| e.package_dir)
            .collect();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }
}
