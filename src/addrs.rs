// src/addrs.rs

//! Provider addresses
//!
//! A provider is identified by where it comes from, not by its version:
//! `hostname/namespace/type`, e.g. `registry.opentofu.org/hashicorp/aws`.
//!
//! Shorter forms are accepted when parsing:
//! - `hashicorp/aws` - default registry hostname
//! - `aws` - default registry hostname and the legacy `hashicorp` namespace
//!
//! A provider *instance* additionally carries the module path it was declared
//! in and an optional alias; that is what the execution engine hands us when it
//! asks for a configured provider.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Hostname used when an address omits one
pub const DEFAULT_REGISTRY_HOST: &str = "registry.opentofu.org";

/// Namespace used when an address names only a type
pub const LEGACY_NAMESPACE: &str = "hashicorp";

/// Identity of a provider: `(hostname, namespace, type)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PluginIdentity {
    pub hostname: String,
    pub namespace: String,
    pub type_name: String,
}

impl PluginIdentity {
    /// Create an identity without validation
    pub fn new(
        hostname: impl Into<String>,
        namespace: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            namespace: namespace.into(),
            type_name: type_name.into(),
        }
    }

    /// Parse a provider source address
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        let (hostname, namespace, type_name) = match parts.as_slice() {
            [t] => (DEFAULT_REGISTRY_HOST, LEGACY_NAMESPACE, *t),
            [ns, t] => (DEFAULT_REGISTRY_HOST, *ns, *t),
            [h, ns, t] => (*h, *ns, *t),
            _ => {
                return Err(Error::InvalidIdentity(
                    s.to_string(),
                    "expected hostname/namespace/type".to_string(),
                ));
            }
        };

        if !is_valid_hostname(hostname) {
            return Err(Error::InvalidIdentity(
                s.to_string(),
                format!("invalid hostname '{}'", hostname),
            ));
        }
        for (what, part) in [("namespace", namespace), ("type", type_name)] {
            if !is_valid_part(part) {
                return Err(Error::InvalidIdentity(
                    s.to_string(),
                    format!("invalid {} '{}'", what, part),
                ));
            }
        }

        Ok(Self {
            hostname: hostname.to_lowercase(),
            namespace: namespace.to_lowercase(),
            type_name: type_name.to_lowercase(),
        })
    }

    /// Path fragment used in on-disk and mirror layouts
    pub fn layout_path(&self) -> String {
        format!("{}/{}/{}", self.hostname, self.namespace, self.type_name)
    }
}

fn is_valid_hostname(s: &str) -> bool {
    let (host, port) = match s.split_once(':') {
        Some((h, p)) => (h, Some(p)),
        None => (s, None),
    };
    if host.is_empty() || !host.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-') {
        return false;
    }
    match port {
        Some(p) => !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()),
        None => true,
    }
}

fn is_valid_part(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl fmt::Display for PluginIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.hostname, self.namespace, self.type_name)
    }
}

impl FromStr for PluginIdentity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for PluginIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PluginIdentity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A configured provider instance: module path, provider and optional alias
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderInstanceAddr {
    /// Module call names from the root, empty for the root module
    pub module: Vec<String>,
    pub provider: PluginIdentity,
    pub alias: Option<String>,
}

impl ProviderInstanceAddr {
    /// Default (unaliased) instance in the root module
    pub fn root(provider: PluginIdentity) -> Self {
        Self {
            module: Vec::new(),
            provider,
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn in_module(mut self, name: impl Into<String>) -> Self {
        self.module.push(name.into());
        self
    }
}

impl fmt::Display for ProviderInstanceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for name in &self.module {
            write!(f, "module.{}.", name)?;
        }
        write!(f, "provider[\"{}\"]", self.provider)?;
        if let Some(ref alias) = self.alias {
            write!(f, ".{}", alias)?;
        }
        Ok(())
    }
}
