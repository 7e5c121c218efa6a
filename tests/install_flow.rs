// tests/install_flow.rs

//! End-to-end tests: configuration, source chain, resolution and cache.

mod common;

use common::{MapFetcher, write_archive, write_unpacked};
use provider_core::config::{parse_installation_config, parse_requirements};
use provider_core::{
    Cancellation, Dir, Error, Fetcher, Installer, PluginIdentity, ResolveError, Result,
    TargetPlatform,
};
use std::sync::Arc;
use url::Url;

const MIRROR: &str = "https://mirror.example/providers/";

fn linux() -> TargetPlatform {
    TargetPlatform::new("linux", "amd64")
}

#[test]
fn test_install_from_network_mirror() {
    let temp = tempfile::tempdir().unwrap();
    let widget = PluginIdentity::new("example.com", "acme", "widget");

    let mut fetcher = MapFetcher::new();
    fetcher.serve_provider(MIRROR, &widget, &["1.0.0", "1.4.2", "2.0.0"]);
    let fetcher = Arc::new(fetcher);

    let config = parse_installation_config(&format!(
        r#"
[provider_installation]
platform = "linux_amd64"

[[provider_installation.source]]
kind = "local_dir"

[[provider_installation.source]]
kind = "network_mirror"
url = "{}"
"#,
        MIRROR
    ))
    .unwrap();
    let cache = Arc::new(Dir::new(temp.path().join("cache"), config.platform()));
    let chain = config
        .build_chain(cache.clone(), fetcher.clone() as Arc<dyn Fetcher>)
        .unwrap();
    let installer = Installer::new(chain, cache.clone(), fetcher.clone());

    let requirements = parse_requirements(
        r#"
[[requirement]]
provider = "example.com/acme/widget"
constraints = "~> 1.0"
"#,
    )
    .unwrap();

    let report = installer.ensure_providers(&requirements);
    assert!(report.is_complete());
    let installed = report.results[&widget].as_ref().unwrap();
    assert_eq!(installed.version.to_string(), "1.4.2");
    assert!(installed.executable_file().is_ok());

    // 2.0.0 is ruled out by the constraint, so its document is never fetched
    let requests = fetcher.requests();
    assert!(!requests.iter().any(|r| r.ends_with("2.0.0.json")));

    // A second pass is served by the cache alone
    let before = fetcher.requests().len();
    let again = installer.ensure_providers(&requirements);
    assert_eq!(again.results[&widget].as_ref().unwrap(), installed);
    assert_eq!(fetcher.requests().len(), before);

    // A fresh cache over the same directory sees the package
    let fresh = Dir::new(temp.path().join("cache"), linux());
    assert_eq!(fresh.latest(&widget).as_ref(), Some(installed));
}

#[test]
fn test_templated_mirror_failure_is_isolated() {
    let temp = tempfile::tempdir().unwrap();
    let mirror = temp.path().join("mirror");
    let good = PluginIdentity::new("example.com", "ns", "typ");
    let other = PluginIdentity::new("other.com", "ns", "typ");
    // Laid out as <mirror>/okay/ns/typ/<version>/<platform>
    write_unpacked(&mirror, &PluginIdentity::new("okay", "ns", "typ"), "1.0.0", "linux_amd64");
    write_archive(&temp.path().join("fallback"), &other, "0.3.0", "linux_amd64");

    let config = parse_installation_config(&format!(
        r#"
[provider_installation]
platform = "linux_amd64"

[[provider_installation.source]]
kind = "templated_mirror"
template = '{}/${{ {{"example.com":"okay"}}[hostname] }}/${{namespace}}/${{type}}'

[[provider_installation.source]]
kind = "filesystem_mirror"
path = '{}'
"#,
        mirror.display(),
        temp.path().join("fallback").display()
    ))
    .unwrap();

    let cache = Arc::new(Dir::new(temp.path().join("cache"), linux()));
    let fetcher = Arc::new(MapFetcher::new());
    let chain = config
        .build_chain(cache.clone(), fetcher.clone() as Arc<dyn Fetcher>)
        .unwrap();
    let installer = Installer::new(chain, cache.clone(), fetcher);

    let requirements = parse_requirements(
        r#"
[[requirement]]
provider = "example.com/ns/typ"

[[requirement]]
provider = "other.com/ns/typ"
"#,
    )
    .unwrap();

    let resolution = installer.resolve(&requirements);
    assert_eq!(resolution.results[&good].as_ref().unwrap().version.to_string(), "1.0.0");
    // The template cannot be evaluated for other.com; the next source answers
    assert_eq!(resolution.results[&other].as_ref().unwrap().version.to_string(), "0.3.0");

    let report = installer.ensure_providers(&requirements);
    assert!(report.is_complete());
    assert_eq!(cache.lookup(&good).len(), 1);
    assert!(cache.lookup(&other)[0].executable_file().is_ok());
}

#[test]
fn test_unsatisfiable_requirements_reported_per_provider() {
    let temp = tempfile::tempdir().unwrap();
    let mirror = temp.path().join("mirror");
    let ok = PluginIdentity::new("example.com", "ns", "ok");
    let old = PluginIdentity::new("example.com", "ns", "old");
    let clash = PluginIdentity::new("example.com", "ns", "clash");
    write_unpacked(&mirror, &ok, "3.1.0", "linux_amd64");
    write_unpacked(&mirror, &old, "0.9.0", "linux_amd64");
    write_unpacked(&mirror, &old, "1.2.0", "darwin_arm64");

    let config = parse_installation_config(&format!(
        r#"
[[provider_installation.source]]
kind = "filesystem_mirror"
path = '{}'
"#,
        mirror.display()
    ))
    .unwrap();
    let cache = Arc::new(Dir::new(temp.path().join("cache"), linux()));
    let fetcher = Arc::new(MapFetcher::new());
    let chain = config
        .build_chain(cache.clone(), fetcher.clone() as Arc<dyn Fetcher>)
        .unwrap();
    let installer = Installer::new(chain, cache, fetcher);

    let requirements = parse_requirements(
        r#"
[[requirement]]
provider = "example.com/ns/ok"
constraints = ">= 3.0"

[[requirement]]
provider = "example.com/ns/old"
constraints = ">= 1.0"

[[requirement]]
provider = "example.com/ns/clash"
constraints = ">= 2.0"

[[requirement]]
provider = "example.com/ns/clash"
constraints = "< 1.0"
"#,
    )
    .unwrap();

    let report = installer.ensure_providers(&requirements);
    assert!(report.results[&ok].is_ok());

    match &report.results[&old] {
        Err(Error::Resolve(ResolveError::NoSatisfyingVersion { nearest, .. })) => {
            let rendered: Vec<String> = nearest.iter().map(|n| n.to_string()).collect();
            assert_eq!(rendered, vec!["0.9.0 (linux_amd64)", "1.2.0 (darwin_arm64)"]);
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert!(matches!(
        report.results[&clash],
        Err(Error::Resolve(ResolveError::IncompatibleConstraints { .. }))
    ));
    assert_eq!(report.failures().count(), 2);
}

/// Cancels the pass as soon as its first request has been answered
struct CancelAfterFirstRequest {
    inner: MapFetcher,
    cancel: Cancellation,
}

impl Fetcher for CancelAfterFirstRequest {
    fn get(&self, url: &Url, cancel: &Cancellation) -> Result<Option<Vec<u8>>> {
        let body = self.inner.get(url, cancel);
        self.cancel.cancel();
        body
    }
}

#[test]
fn test_cancelled_while_fetching_reports_cancelled() {
    let temp = tempfile::tempdir().unwrap();
    let widget = PluginIdentity::new("example.com", "acme", "widget");
    let root = format!("{}{}/", MIRROR, widget.layout_path());

    let versions = ["1.0.0", "1.1.0", "1.2.0", "1.3.0", "1.4.0"];
    let mut inner = MapFetcher::new();
    let listed: Vec<String> = versions.iter().map(|v| format!("\"{}\": {{}}", v)).collect();
    inner.serve(
        &format!("{}index.json", root),
        format!("{{\"versions\": {{{}}}}}", listed.join(", ")),
    );
    for version in versions {
        inner.serve(
            &format!("{}{}.json", root, version),
            format!(
                "{{\"archives\": {{\"darwin_arm64\": {{\"url\": \"widget_{}.tar.gz\", \"hashes\": [\"sha256:{}\"]}}}}}}",
                version,
                "0".repeat(64)
            ),
        );
    }

    let cancel = Cancellation::new();
    let fetcher = Arc::new(CancelAfterFirstRequest {
        inner,
        cancel: cancel.clone(),
    });

    let config = parse_installation_config(&format!(
        r#"
[provider_installation]
platform = "linux_amd64"

[[provider_installation.source]]
kind = "network_mirror"
url = "{}"
"#,
        MIRROR
    ))
    .unwrap();
    let cache = Arc::new(Dir::new(temp.path().join("cache"), config.platform()));
    let chain = config
        .build_chain(cache.clone(), fetcher.clone() as Arc<dyn Fetcher>)
        .unwrap();
    let installer =
        Installer::new(chain, cache, fetcher.clone()).with_cancellation(cancel.clone());

    let requirements = parse_requirements(
        r#"
[[requirement]]
provider = "example.com/acme/widget"
"#,
    )
    .unwrap();

    let report = installer.ensure_providers(&requirements);
    assert!(cancel.is_cancelled());
    assert!(matches!(
        &report.results[&widget],
        Err(Error::Resolve(ResolveError::Cancelled(id))) if *id == widget
    ));
    // Nothing past the index was requested once the pass was cancelled
    assert_eq!(fetcher.inner.requests(), vec![format!("{}index.json", root)]);
}
