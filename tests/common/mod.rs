// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::GzEncoder;
use parking_lot::Mutex;
use provider_core::{Cancellation, Fetcher, PluginIdentity, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

/// Create an unpacked package with an executable in the cache layout.
pub fn write_unpacked(base: &Path, identity: &PluginIdentity, version: &str, platform: &str) -> PathBuf {
    let dir = base
        .join(identity.layout_path())
        .join(version)
        .join(platform);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join(format!("tofu-provider-{}_v{}", identity.type_name, version)),
        b"#!/bin/sh\n",
    )
    .unwrap();
    dir
}

/// Build a gzipped tarball holding a provider executable.
pub fn archive_bytes(type_name: &str, version: &str) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    let content = b"#!/bin/sh\necho provider\n";
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o755);
    header.set_cksum();
    builder
        .append_data(
            &mut header,
            format!("tofu-provider-{}_v{}", type_name, version),
            &content[..],
        )
        .unwrap();
    builder.into_inner().unwrap().finish().unwrap()
}

/// Write a packed archive next to the version directories of a provider.
pub fn write_archive(base: &Path, identity: &PluginIdentity, version: &str, platform: &str) -> PathBuf {
    let dir = base.join(identity.layout_path());
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!(
        "tofu-provider-{}_{}_{}.tar.gz",
        identity.type_name, version, platform
    ));
    fs::write(&path, archive_bytes(&identity.type_name, version)).unwrap();
    path
}

/// In-memory HTTP server keyed by full URL.
#[derive(Default)]
pub struct MapFetcher {
    responses: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl MapFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&mut self, url: &str, body: impl Into<Vec<u8>>) {
        self.responses.insert(url.to_string(), body.into());
    }

    /// Serve a provider through the network mirror protocol.
    ///
    /// Every version gets a `linux_amd64` archive with a relative URL.
    pub fn serve_provider(&mut self, base: &str, identity: &PluginIdentity, versions: &[&str]) {
        let root = format!("{}{}/", base, identity.layout_path());
        let listed: Vec<String> = versions.iter().map(|v| format!("\"{}\": {{}}", v)).collect();
        self.serve(
            &format!("{}index.json", root),
            format!("{{\"versions\": {{{}}}}}", listed.join(", ")),
        );

        for version in versions {
            let bytes = archive_bytes(&identity.type_name, version);
            let file = format!("{}_{}_linux_amd64.tar.gz", identity.type_name, version);
            self.serve(
                &format!("{}{}.json", root, version),
                format!(
                    "{{\"archives\": {{\"linux_amd64\": {{\"url\": \"{}\", \"hashes\": [\"sha256:{}\"]}}}}}}",
                    file,
                    provider_core::hash::sha256(&bytes)
                ),
            );
            self.serve(&format!("{}{}", root, file), bytes);
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

impl Fetcher for MapFetcher {
    fn get(&self, url: &Url, cancel: &Cancellation) -> Result<Option<Vec<u8>>> {
        cancel.check()?;
        self.requests.lock().push(url.to_string());
        Ok(self.responses.get(url.as_str()).cloned())
    }
}
