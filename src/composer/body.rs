// src/composer/body.rs

//! Configuration bodies and their merge rules

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// A provider configuration body: attributes plus nested blocks
///
/// Bodies are values. Merging produces a new body and leaves its inputs
/// untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfigBody {
    /// Where the body came from, for diagnostics
    pub label: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    #[serde(default)]
    pub blocks: Vec<ConfigBlock>,
}

/// A nested block such as `assume_role { ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigBlock {
    pub block_type: String,
    pub body: ConfigBody,
}

impl ConfigBody {
    /// An empty body
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    /// A body made only of attributes
    pub fn synthetic(label: impl Into<String>, attributes: BTreeMap<String, Value>) -> Self {
        Self {
            label: label.into(),
            attributes,
            blocks: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_block(mut self, block_type: impl Into<String>, body: ConfigBody) -> Self {
        self.blocks.push(ConfigBlock {
            block_type: block_type.into(),
            body,
        });
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn blocks_of_type<'a>(&'a self, block_type: &'a str) -> impl Iterator<Item = &'a ConfigBody> {
        self.blocks
            .iter()
            .filter(move |b| b.block_type == block_type)
            .map(|b| &b.body)
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.blocks.is_empty()
    }

    /// Layer this body over `base`
    ///
    /// Attributes set here win; attributes only in `base` are kept. Blocks
    /// merge by type: any block type present here replaces all of `base`'s
    /// blocks of that type, and block types only in `base` come first.
    pub fn merged_over(&self, base: &ConfigBody) -> ConfigBody {
        let mut attributes = base.attributes.clone();
        attributes.extend(self.attributes.iter().map(|(k, v)| (k.clone(), v.clone())));

        let overridden: BTreeSet<&str> = self.blocks.iter().map(|b| b.block_type.as_str()).collect();
        let mut blocks: Vec<ConfigBlock> = base
            .blocks
            .iter()
            .filter(|b| !overridden.contains(b.block_type.as_str()))
            .cloned()
            .collect();
        blocks.extend(self.blocks.iter().cloned());

        ConfigBody {
            label: self.label.clone(),
            attributes,
            blocks,
        }
    }
}
