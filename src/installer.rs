// src/installer.rs

//! Resolve requirements and make sure the selected packages are cached
//!
//! Each provider is resolved and then materialized into the cache on its own
//! rayon task. A provider that fails is reported in the result map and does
//! not prevent the others from installing.

use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::addrs::PluginIdentity;
use crate::cancel::Cancellation;
use crate::error::{Error, Result};
use crate::providercache::{CachedProvider, Dir};
use crate::resolver::{Requirements, Resolution, Resolver};
use crate::source::{Fetcher, SourceChain};

/// Outcome per provider of an install pass
#[derive(Debug, Default)]
pub struct InstallReport {
    pub results: BTreeMap<PluginIdentity, Result<CachedProvider>>,
}

impl InstallReport {
    pub fn is_complete(&self) -> bool {
        self.results.values().all(|r| r.is_ok())
    }

    pub fn installed(&self) -> impl Iterator<Item = &CachedProvider> {
        self.results.values().filter_map(|r| r.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&PluginIdentity, &Error)> {
        self.results
            .iter()
            .filter_map(|(id, r)| r.as_ref().err().map(|e| (id, e)))
    }
}

/// Connects a source chain to a provider cache
pub struct Installer {
    chain: SourceChain,
    cache: Arc<Dir>,
    fetcher: Arc<dyn Fetcher>,
    cancel: Cancellation,
}

impl Installer {
    pub fn new(chain: SourceChain, cache: Arc<Dir>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            chain,
            cache,
            fetcher,
            cancel: Cancellation::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cache(&self) -> &Arc<Dir> {
        &self.cache
    }

    /// Select versions without installing anything
    pub fn resolve(&self, requirements: &Requirements) -> Resolution {
        Resolver::new(&self.chain, self.cache.platform().clone())
            .with_cancellation(self.cancel.clone())
            .resolve_all(requirements)
    }

    /// Resolve every requirement and install what is not cached yet
    pub fn ensure_providers(&self, requirements: &Requirements) -> InstallReport {
        info!("Resolving {} provider(s)", requirements.len());
        let resolution = self.resolve(requirements);

        let results: BTreeMap<PluginIdentity, Result<CachedProvider>> = resolution
            .results
            .into_par_iter()
            .map(|(identity, selected)| {
                let installed = selected
                    .map_err(Error::from)
                    .and_then(|meta| self.cache.install(&meta, self.fetcher.as_ref(), &self.cancel));
                if let Err(e) = &installed {
                    warn!("Failed to install {}: {}", identity, e);
                }
                (identity, installed)
            })
            .collect();

        let report = InstallReport { results };
        info!(
            "{} of {} provider(s) ready in {}",
            report.installed().count(),
            report.results.len(),
            self.cache.base_dir().display()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::TargetPlatform;
    use crate::resolver::ResolveError;
    use crate::source::{ChainPolicy, FilesystemMirrorSource, LocalDirSource};
    use crate::version::ConstraintSet;
    use std::fs;
    use url::Url;

    struct Offline;

    impl Fetcher for Offline {
        fn get(&self, url: &Url, _cancel: &Cancellation) -> Result<Option<Vec<u8>>> {
            Err(Error::DownloadError(format!("offline: {}", url)))
        }
    }

    #[test]
    fn test_ensure_providers_from_mirror() {
        let temp = tempfile::tempdir().unwrap();
        let mirror = temp.path().join("mirror");
        let pkg = mirror.join("example.com/ns/typ/1.2.0/linux_amd64");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("tofu-provider-typ_v1.2.0"), b"bin").unwrap();

        let cache = Arc::new(Dir::new(temp.path().join("cache"), TargetPlatform::new("linux", "amd64")));
        let mut chain = SourceChain::new(ChainPolicy::FirstMatch);
        chain.push(LocalDirSource::new(cache.clone()));
        chain.push(FilesystemMirrorSource::new(&mirror));
        let installer = Installer::new(chain, cache.clone(), Arc::new(Offline));

        let typ = PluginIdentity::new("example.com", "ns", "typ");
        let missing = PluginIdentity::new("example.com", "ns", "missing");
        let mut reqs = Requirements::new();
        reqs.add(typ.clone(), &ConstraintSet::parse("~> 1.0").unwrap());
        reqs.add(missing.clone(), &ConstraintSet::any());

        let report = installer.ensure_providers(&reqs);
        let installed = report.results[&typ].as_ref().unwrap();
        assert_eq!(installed.version.to_string(), "1.2.0");
        assert!(installed.executable_file().is_ok());
        assert!(matches!(
            report.results[&missing],
            Err(Error::Resolve(ResolveError::NoSatisfyingVersion { .. }))
        ));
        assert!(!report.is_complete());
        assert_eq!(report.failures().count(), 1);

        // The cache now answers first
        let again = installer.ensure_providers(&reqs);
        assert_eq!(again.results[&typ].as_ref().unwrap(), installed);
        assert_eq!(cache.lookup(&typ).len(), 1);
    }
}
