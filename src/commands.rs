// src/commands.rs
//! Command handlers for the provider-core CLI

use anyhow::{Context, Result};
use provider_core::{
    Cancellation, Dir, Fetcher, HttpFetcher, InstallationConfig, Installer, MirrorTemplate,
    PluginIdentity, TargetPlatform, load_installation_config, load_requirements,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Settings shared by every command
pub struct Settings {
    pub config: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub platform: Option<String>,
}

impl Settings {
    fn load(&self) -> Result<InstallationConfig> {
        let mut config = match &self.config {
            Some(path) => load_installation_config(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => InstallationConfig::default(),
        };
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = Some(dir.clone());
        }
        if let Some(platform) = &self.platform {
            config.platform = Some(TargetPlatform::parse(platform)?);
        }
        Ok(config)
    }

    fn installer(&self, cancel: Cancellation) -> Result<Installer> {
        let config = self.load()?;
        let cache = Arc::new(Dir::new(config.cache_dir(), config.platform()));
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new()?);
        let chain = config.build_chain(cache.clone(), fetcher.clone())?;
        info!(
            "Using {} installation source(s), cache {} for {}",
            chain.len(),
            cache.base_dir().display(),
            cache.platform()
        );
        Ok(Installer::new(chain, cache, fetcher).with_cancellation(cancel))
    }
}

/// Print the version selected for each requirement
pub fn cmd_resolve(settings: &Settings, requirements: &Path) -> Result<()> {
    let requirements = load_requirements(requirements)?;
    let installer = settings.installer(Cancellation::new())?;
    let resolution = installer.resolve(&requirements);

    for (identity, result) in &resolution.results {
        match result {
            Ok(meta) => println!("{} {} ({})", identity, meta.version, meta.location),
            Err(e) => println!("{}: {}", identity, e),
        }
    }

    if !resolution.is_complete() {
        anyhow::bail!(
            "{} provider(s) could not be resolved",
            resolution.failures().count()
        );
    }
    Ok(())
}

/// Install every requirement and print the package directories
pub fn cmd_install(settings: &Settings, requirements: &Path, timeout: Option<u64>) -> Result<()> {
    let requirements = load_requirements(requirements)?;
    let cancel = match timeout {
        Some(secs) => Cancellation::with_deadline(Instant::now() + Duration::from_secs(secs)),
        None => Cancellation::new(),
    };
    let installer = settings.installer(cancel)?;
    let report = installer.ensure_providers(&requirements);

    for provider in report.installed() {
        println!("{} {} {}", provider.identity, provider.version, provider.package_dir);
    }
    for (identity, e) in report.failures() {
        eprintln!("{}: {}", identity, e);
    }

    if !report.is_complete() {
        anyhow::bail!("{} provider(s) failed to install", report.failures().count());
    }
    Ok(())
}

/// List the contents of the provider cache
pub fn cmd_cache(settings: &Settings, provider: Option<&str>) -> Result<()> {
    let config = settings.load()?;
    let cache = Dir::new(config.cache_dir(), config.platform());
    let index = cache.scan();

    let filter = provider.map(PluginIdentity::parse).transpose()?;
    let mut shown = 0;
    for (identity, entries) in index.iter() {
        if filter.as_ref().is_some_and(|f| f != identity) {
            continue;
        }
        for entry in entries {
            println!("{} {} {}", identity, entry.version, entry.package_dir);
            shown += 1;
        }
    }

    if shown == 0 {
        println!(
            "No providers for {} in {}",
            cache.platform(),
            cache.base_dir().display()
        );
    }
    Ok(())
}

/// Evaluate a mirror template for one provider
pub fn cmd_template(template: &str, provider: &str) -> Result<()> {
    let template = MirrorTemplate::parse(template)?;
    let identity = PluginIdentity::parse(provider)?;
    println!("{}", template.evaluate(&identity)?);
    Ok(())
}
