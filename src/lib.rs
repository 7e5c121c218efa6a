// src/lib.rs

//! Provider Core
//!
//! Resolution, installation and caching of infrastructure providers
//! (plugins) for a provisioning engine.
//!
//! # Architecture
//!
//! - Versions and constraints: semantic versions with build-metadata-blind
//!   precedence and the `~>` family of constraint operators
//! - Source chain: ordered installation sources (cache, filesystem mirror,
//!   templated mirror, network mirror) combined by a chain policy
//! - Resolver: independent per-provider selection, run in parallel
//! - Provider cache: lazily scanned, memoized on-disk index with atomic
//!   installs
//! - Composer: explicit and interactive provider configuration merged
//!   before a provider is configured

pub mod addrs;
pub mod cancel;
pub mod composer;
pub mod config;
mod error;
pub mod hash;
pub mod installer;
pub mod platform;
pub mod providercache;
pub mod resolver;
pub mod source;
pub mod template;
pub mod version;

pub use addrs::{PluginIdentity, ProviderInstanceAddr};
pub use cancel::Cancellation;
pub use composer::{
    ConfigBody, ExecutionContext, ProviderError, ProviderHandle, ProviderSchema,
    build_provider_config, get_provider,
};
pub use config::{ConfigError, InstallationConfig, load_installation_config, load_requirements};
pub use error::{Error, Result};
pub use installer::{InstallReport, Installer};
pub use platform::TargetPlatform;
pub use providercache::{CacheIndex, CachedProvider, Dir};
pub use resolver::{Requirements, Resolution, ResolveError, Resolver};
pub use source::{
    ChainPolicy, Fetcher, HttpFetcher, PackageLocation, PackageMeta, Source, SourceChain,
};
pub use template::{MirrorTemplate, TemplateError};
pub use version::{ConstraintSet, Version};
