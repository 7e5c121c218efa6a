// src/composer/mod.rs

//! Provider configuration composition
//!
//! Before a provider is configured, the explicit configuration body written
//! by the user is combined with values supplied interactively. The execution
//! engine is consumed through [`ExecutionContext`]; this module never starts
//! or talks to provider processes itself.

mod body;

pub use body::{ConfigBlock, ConfigBody};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

use crate::addrs::ProviderInstanceAddr;
use crate::providercache::CachedProvider;

/// Label of the body synthesized from interactive input
pub const INPUT_BODY_LABEL: &str = "<input-prompt>";

/// Boxed error from the execution engine
pub type ContextError = Box<dyn std::error::Error + Send + Sync>;

/// A started provider as the execution engine tracks it
pub trait ProviderHandle: Send + Sync {
    /// Package the provider was started from
    fn package(&self) -> &CachedProvider;
}

/// Schema of a provider's configuration block
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProviderSchema {
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeSchema>,
    #[serde(default)]
    pub block_types: BTreeMap<String, ProviderSchema>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AttributeSchema {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default)]
    pub description: Option<String>,
}

/// What the composer needs from the execution engine
pub trait ExecutionContext {
    /// The started provider for an address, if any
    fn provider(&self, addr: &ProviderInstanceAddr) -> Option<Arc<dyn ProviderHandle>>;

    fn provider_schema(&self, addr: &ProviderInstanceAddr) -> Result<ProviderSchema, ContextError>;

    /// Values entered interactively for an address; empty when none
    fn provider_input(&self, addr: &ProviderInstanceAddr) -> BTreeMap<String, Value>;
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider {0} not initialized")]
    NotInitialized(ProviderInstanceAddr),

    #[error("Failed to read schema for provider {addr}: {source}")]
    SchemaRead {
        addr: ProviderInstanceAddr,
        #[source]
        source: ContextError,
    },
}

/// Build the configuration body a provider is configured with
///
/// Explicit attributes take precedence over interactive input, and input-only
/// attributes are kept. With neither, the result is an empty body labelled
/// `"<addr> with no configuration"`.
pub fn build_provider_config(
    ctx: &dyn ExecutionContext,
    addr: &ProviderInstanceAddr,
    config: Option<&ConfigBody>,
) -> ConfigBody {
    let input = ctx.provider_input(addr);
    let input_body = (!input.is_empty()).then(|| ConfigBody::synthetic(INPUT_BODY_LABEL, input));

    match (config, input_body) {
        (Some(config), Some(input)) => {
            trace!("build_provider_config for {}: merging explicit config and input", addr);
            config.merged_over(&input)
        }
        (Some(config), None) => {
            trace!("build_provider_config for {}: using explicit config only", addr);
            config.clone()
        }
        (None, Some(input)) => {
            trace!("build_provider_config for {}: using input only", addr);
            input
        }
        (None, None) => {
            trace!("build_provider_config for {}: no configuration at all", addr);
            ConfigBody::new(format!("{} with no configuration", addr))
        }
    }
}

/// Look up a started provider and its schema
///
/// # Panics
///
/// Panics if the address has no provider type; such an address can only come
/// from an uninitialized configuration.
pub fn get_provider(
    ctx: &dyn ExecutionContext,
    addr: &ProviderInstanceAddr,
) -> Result<(Arc<dyn ProviderHandle>, ProviderSchema), ProviderError> {
    if addr.provider.type_name.is_empty() {
        panic!("get_provider used with uninitialized provider configuration address");
    }
    let provider = ctx
        .provider(addr)
        .ok_or_else(|| ProviderError::NotInitialized(addr.clone()))?;
    let schema = ctx
        .provider_schema(addr)
        .map_err(|source| ProviderError::SchemaRead {
            addr: addr.clone(),
            source,
        })?;
    Ok((provider, schema))
}
