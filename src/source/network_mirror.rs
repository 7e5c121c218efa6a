// src/source/network_mirror.rs

//! Network mirror protocol
//!
//! For each provider the mirror serves, relative to the provider's root URL
//! (`<base>/<hostname>/<namespace>/<type>/`):
//!
//! - `index.json`: `{"versions": {"1.2.0": {}, "1.3.0": {}}}`
//! - `<version>.json`:
//!   `{"archives": {"linux_amd64": {"url": "...", "hashes": ["sha256:..."]}}}`
//!
//! Archive URLs may be relative to the version document. A URL of the form
//! `oci://<registry>/<repository>@sha256:<hex>` names an OCI blob instead.
//! A 404 for `index.json` means the mirror has nothing for the provider.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, trace, warn};
use url::Url;

use super::http::Fetcher;
use super::{CandidateQuery, PackageLocation, PackageMeta, Source};
use crate::error::{Error, Result};
use crate::hash::PackageHash;
use crate::platform::TargetPlatform;
use crate::version::Version;

#[derive(Debug, Deserialize)]
struct VersionIndex {
    versions: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct VersionDocument {
    archives: BTreeMap<String, ArchiveEntry>,
}

#[derive(Debug, Deserialize)]
struct ArchiveEntry {
    url: String,
    #[serde(default)]
    hashes: Vec<String>,
}

/// Mirror or registry reached over HTTP
pub struct NetworkMirrorSource {
    base: Url,
    fetcher: Arc<dyn Fetcher>,
}

impl NetworkMirrorSource {
    pub fn new(base: Url, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            base: with_trailing_slash(base),
            fetcher,
        }
    }
}

impl Source for NetworkMirrorSource {
    fn describe(&self) -> String {
        format!("network mirror {}", self.base)
    }

    fn list_candidates(&self, query: &CandidateQuery<'_>) -> Result<Vec<PackageMeta>> {
        let root = self
            .base
            .join(&format!("{}/", query.identity.layout_path()))
            .map_err(|e| Error::ProtocolError(format!("Invalid mirror URL: {}", e)))?;
        list_from_root(self.fetcher.as_ref(), &root, query)
    }
}

pub(crate) fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn parse_json<T: for<'de> Deserialize<'de>>(url: &Url, body: &[u8]) -> Result<T> {
    serde_json::from_slice(body)
        .map_err(|e| Error::ProtocolError(format!("Invalid document at {}: {}", url, e)))
}

/// List candidates from a provider's root URL
///
/// Versions are visited newest first, skipping those the constraints rule
/// out. Listing stops after the first version that has a package for the
/// requested platform; versions visited before it are still reported so the
/// resolver can name them when nothing fits.
///
/// The query's cancellation token is checked before every request.
pub(crate) fn list_from_root(
    fetcher: &dyn Fetcher,
    root: &Url,
    query: &CandidateQuery<'_>,
) -> Result<Vec<PackageMeta>> {
    let index_url = root
        .join("index.json")
        .map_err(|e| Error::ProtocolError(e.to_string()))?;
    query.cancel.check()?;
    let Some(body) = fetcher.get(&index_url, query.cancel)? else {
        debug!("{} has no index for {}", root, query.identity);
        return Ok(Vec::new());
    };
    let index: VersionIndex = parse_json(&index_url, &body)?;

    let mut versions: Vec<Version> = Vec::new();
    for raw in index.versions.keys() {
        match Version::parse(raw) {
            Ok(v) => versions.push(v),
            Err(e) => warn!("Ignoring version listed at {}: {}", index_url, e),
        }
    }
    versions.sort_by(|a, b| b.cmp_precedence(a));

    let mut found = Vec::new();
    for version in versions {
        if !query.constraints.satisfies(&version) {
            trace!("Skipping {} {}: excluded by constraints", query.identity, version);
            continue;
        }

        let doc_url = root
            .join(&format!("{}.json", version))
            .map_err(|e| Error::ProtocolError(e.to_string()))?;
        query.cancel.check()?;
        let Some(body) = fetcher.get(&doc_url, query.cancel)? else {
            warn!("{} is listed but {} is missing", version, doc_url);
            continue;
        };
        let doc: VersionDocument = parse_json(&doc_url, &body)?;

        let mut has_target = false;
        for (platform_str, archive) in &doc.archives {
            let Ok(platform) = TargetPlatform::parse(platform_str) else {
                warn!("Ignoring unknown platform {:?} at {}", platform_str, doc_url);
                continue;
            };
            let location = match archive_location(&doc_url, archive) {
                Ok(location) => location,
                Err(e) => {
                    warn!("Ignoring {} archive at {}: {}", platform, doc_url, e);
                    continue;
                }
            };
            has_target |= platform == *query.platform;
            found.push(PackageMeta {
                identity: query.identity.clone(),
                version: version.clone(),
                platform,
                location,
            });
        }

        if has_target {
            break;
        }
    }

    Ok(found)
}

fn archive_location(doc_url: &Url, archive: &ArchiveEntry) -> Result<PackageLocation> {
    if let Some(reference) = archive.url.strip_prefix("oci://") {
        return parse_oci_reference(reference);
    }

    let url = doc_url
        .join(&archive.url)
        .map_err(|e| Error::ProtocolError(format!("Invalid archive URL {:?}: {}", archive.url, e)))?;
    let hash = archive
        .hashes
        .iter()
        .find_map(|h| PackageHash::parse_prefixed(h))
        .ok_or_else(|| Error::ProtocolError("no sha256 checksum listed".to_string()))?;

    Ok(PackageLocation::RemoteArchive {
        url: url.to_string(),
        hash,
    })
}

/// Parse `<registry>/<repository>@sha256:<hex>`
fn parse_oci_reference(reference: &str) -> Result<PackageLocation> {
    let invalid = || Error::ProtocolError(format!("Invalid OCI reference {:?}", reference));
    let (name, digest) = reference.split_once('@').ok_or_else(invalid)?;
    let (registry, repository) = name.split_once('/').ok_or_else(invalid)?;
    if registry.is_empty() || repository.is_empty() {
        return Err(invalid());
    }
    let digest = PackageHash::parse_prefixed(digest).ok_or_else(invalid)?;
    Ok(PackageLocation::OciBlob {
        registry: registry.to_string(),
        repository: repository.to_string(),
        digest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addrs::PluginIdentity;
    use crate::cancel::Cancellation;
    use crate::version::ConstraintSet;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    const HASH: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    /// Serves fixed documents; cancels `cancel_on_request` on its first request
    #[derive(Default)]
    struct CannedFetcher {
        docs: HashMap<String, String>,
        requests: Mutex<Vec<String>>,
        cancel_on_request: Option<Cancellation>,
    }

    impl Fetcher for CannedFetcher {
        fn get(&self, url: &Url, _cancel: &Cancellation) -> Result<Option<Vec<u8>>> {
            self.requests.lock().push(url.to_string());
            if let Some(token) = &self.cancel_on_request {
                token.cancel();
            }
            Ok(self.docs.get(url.as_str()).map(|d| d.as_bytes().to_vec()))
        }
    }

    fn version_doc(platforms: &[&str]) -> String {
        let archives: Vec<String> = platforms
            .iter()
            .map(|p| {
                format!(
                    r#""{p}": {{"url": "pkg_{p}.tar.gz", "hashes": ["h1:zzz", "sha256:{HASH}"]}}"#
                )
            })
            .collect();
        format!(r#"{{"archives": {{{}}}}}"#, archives.join(","))
    }

    fn query_list(
        fetcher: CannedFetcher,
        constraints: &str,
    ) -> (Vec<PackageMeta>, Vec<String>) {
        let (found, requests) = query_with(fetcher, constraints, &Cancellation::new());
        (found.unwrap(), requests)
    }

    fn query_with(
        fetcher: CannedFetcher,
        constraints: &str,
        cancel: &Cancellation,
    ) -> (Result<Vec<PackageMeta>>, Vec<String>) {
        let fetcher = Arc::new(fetcher);
        let source = NetworkMirrorSource::new(
            Url::parse("https://mirror.example/providers").unwrap(),
            fetcher.clone(),
        );
        let identity = PluginIdentity::new("example.com", "ns", "typ");
        let constraints = ConstraintSet::parse(constraints).unwrap();
        let platform = TargetPlatform::new("linux", "amd64");
        let found = source.list_candidates(&CandidateQuery {
            identity: &identity,
            constraints: &constraints,
            platform: &platform,
            cancel,
        });
        let requests = fetcher.requests.lock().clone();
        (found, requests)
    }

    fn root() -> &'static str {
        "https://mirror.example/providers/example.com/ns/typ/"
    }

    #[test]
    fn test_stops_at_first_version_for_platform() {
        let mut fetcher = CannedFetcher::default();
        fetcher.docs.insert(
            format!("{}index.json", root()),
            r#"{"versions": {"1.0.0": {}, "2.0.0": {}, "3.0.0": {}}}"#.to_string(),
        );
        fetcher
            .docs
            .insert(format!("{}3.0.0.json", root()), version_doc(&["darwin_arm64"]));
        fetcher.docs.insert(
            format!("{}2.0.0.json", root()),
            version_doc(&["darwin_arm64", "linux_amd64"]),
        );

        let (found, requests) = query_list(fetcher, "");
        let rendered: Vec<String> = found
            .iter()
            .map(|m| format!("{} {}", m.version, m.platform))
            .collect();
        assert_eq!(
            rendered,
            vec!["3.0.0 darwin_arm64", "2.0.0 darwin_arm64", "2.0.0 linux_amd64"]
        );
        assert!(!requests.iter().any(|r| r.ends_with("1.0.0.json")));

        match &found[2].location {
            PackageLocation::RemoteArchive { url, hash } => {
                assert_eq!(url, &format!("{}pkg_linux_amd64.tar.gz", root()));
                assert_eq!(hash.as_hex(), HASH);
            }
            other => panic!("unexpected location {:?}", other),
        }
    }

    #[test]
    fn test_constraints_skip_version_documents() {
        let mut fetcher = CannedFetcher::default();
        fetcher.docs.insert(
            format!("{}index.json", root()),
            r#"{"versions": {"1.0.0": {}, "2.0.0": {}}}"#.to_string(),
        );
        fetcher
            .docs
            .insert(format!("{}1.0.0.json", root()), version_doc(&["linux_amd64"]));

        let (found, requests) = query_list(fetcher, "< 2.0.0");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].version.to_string(), "1.0.0");
        assert!(!requests.iter().any(|r| r.ends_with("2.0.0.json")));
    }

    #[test]
    fn test_cancelled_mid_listing_stops_fetching() {
        let cancel = Cancellation::new();
        let mut fetcher = CannedFetcher {
            cancel_on_request: Some(cancel.clone()),
            ..Default::default()
        };
        fetcher.docs.insert(
            format!("{}index.json", root()),
            r#"{"versions": {"1.0.0": {}, "1.1.0": {}, "1.2.0": {}, "1.3.0": {}, "1.4.0": {}}}"#
                .to_string(),
        );
        for minor in 0..5 {
            fetcher.docs.insert(
                format!("{}1.{}.0.json", root(), minor),
                version_doc(&["darwin_arm64"]),
            );
        }

        let (found, requests) = query_with(fetcher, "", &cancel);
        assert!(matches!(found, Err(Error::Cancelled)));
        assert_eq!(requests, vec![format!("{}index.json", root())]);
    }

    #[test]
    fn test_missing_index_is_empty() {
        let (found, _) = query_list(CannedFetcher::default(), "");
        assert!(found.is_empty());
    }

    #[test]
    fn test_oci_reference() {
        let location =
            parse_oci_reference(&format!("ghcr.io/acme/providers/typ@sha256:{}", HASH)).unwrap();
        assert_eq!(
            location,
            PackageLocation::OciBlob {
                registry: "ghcr.io".to_string(),
                repository: "acme/providers/typ".to_string(),
                digest: PackageHash::from_hex(HASH),
            }
        );
        assert!(parse_oci_reference("ghcr.io/acme").is_err());
        assert!(parse_oci_reference("ghcr.io@sha256:abc").is_err());
    }
}
