// src/resolver/mod.rs

//! Version selection for provider requirements
//!
//! Each provider is resolved on its own: its constraints from every
//! declaration are combined, the source chain is asked for candidates, and the
//! highest-precedence candidate for the target platform that satisfies all of
//! them wins. There is no backtracking across providers, so providers resolve
//! in parallel and one provider's failure never blocks another.

use std::collections::BTreeMap;
use std::fmt;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use crate::addrs::PluginIdentity;
use crate::cancel::Cancellation;
use crate::error::Error;
use crate::platform::TargetPlatform;
use crate::source::{CandidateQuery, PackageMeta, SourceChain};
use crate::version::{ConstraintSet, Version};

/// Maximum number of near misses reported in an error
const MAX_NEAR_MISSES: usize = 5;

/// A version that was available but not selectable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NearMiss {
    pub version: Version,
    pub platform: TargetPlatform,
}

impl fmt::Display for NearMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.version, self.platform)
    }
}

fn describe_near_misses(near: &[NearMiss]) -> String {
    if near.is_empty() {
        "; no versions are available".to_string()
    } else {
        let listed: Vec<String> = near.iter().map(|n| n.to_string()).collect();
        format!("; available: {}", listed.join(", "))
    }
}

/// Why a provider could not be resolved
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error(
        "No available version of {identity} matches {constraints} for {platform}{}",
        describe_near_misses(.nearest)
    )]
    NoSatisfyingVersion {
        identity: PluginIdentity,
        constraints: ConstraintSet,
        platform: TargetPlatform,
        nearest: Vec<NearMiss>,
    },

    #[error("Version constraints for {identity} can never be satisfied together: {constraints}")]
    IncompatibleConstraints {
        identity: PluginIdentity,
        constraints: ConstraintSet,
    },

    #[error("Resolution of {0} was cancelled")]
    Cancelled(PluginIdentity),
}

/// Combined version constraints per provider
#[derive(Debug, Clone, Default)]
pub struct Requirements {
    by_provider: BTreeMap<PluginIdentity, ConstraintSet>,
}

impl Requirements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one declaration; constraints for the same provider accumulate
    pub fn add(&mut self, identity: PluginIdentity, constraints: &ConstraintSet) {
        self.by_provider
            .entry(identity)
            .or_default()
            .extend(constraints);
    }

    pub fn constraints(&self, identity: &PluginIdentity) -> Option<&ConstraintSet> {
        self.by_provider.get(identity)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PluginIdentity, &ConstraintSet)> {
        self.by_provider.iter()
    }

    pub fn len(&self) -> usize {
        self.by_provider.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_provider.is_empty()
    }
}

/// Outcome of resolving a set of requirements
#[derive(Debug, Default)]
pub struct Resolution {
    pub results: BTreeMap<PluginIdentity, Result<PackageMeta, ResolveError>>,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.results.values().all(|r| r.is_ok())
    }

    pub fn selected(&self) -> impl Iterator<Item = &PackageMeta> {
        self.results.values().filter_map(|r| r.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ResolveError> {
        self.results.values().filter_map(|r| r.as_ref().err())
    }
}

/// Selects provider versions using a source chain
pub struct Resolver<'a> {
    chain: &'a SourceChain,
    platform: TargetPlatform,
    cancel: Cancellation,
}

impl<'a> Resolver<'a> {
    pub fn new(chain: &'a SourceChain, platform: TargetPlatform) -> Self {
        Self {
            chain,
            platform,
            cancel: Cancellation::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn platform(&self) -> &TargetPlatform {
        &self.platform
    }

    /// Resolve every provider in parallel
    pub fn resolve_all(&self, requirements: &Requirements) -> Resolution {
        let results = requirements
            .by_provider
            .par_iter()
            .map(|(identity, constraints)| {
                (identity.clone(), self.resolve_one(identity, constraints))
            })
            .collect();
        Resolution { results }
    }

    /// Resolve a single provider
    pub fn resolve_one(
        &self,
        identity: &PluginIdentity,
        constraints: &ConstraintSet,
    ) -> Result<PackageMeta, ResolveError> {
        if constraints.is_contradictory() {
            return Err(ResolveError::IncompatibleConstraints {
                identity: identity.clone(),
                constraints: constraints.clone(),
            });
        }

        let query = CandidateQuery {
            identity,
            constraints,
            platform: &self.platform,
            cancel: &self.cancel,
        };
        let candidates = match self.chain.list_candidates(&query) {
            Ok(candidates) => candidates,
            Err(Error::Cancelled) => return Err(ResolveError::Cancelled(identity.clone())),
            Err(e) => {
                // The chain absorbs source errors; treat anything else as empty
                debug!("Source chain failed for {}: {}", identity, e);
                Vec::new()
            }
        };

        let mut best: Option<&PackageMeta> = None;
        for candidate in &candidates {
            if candidate.platform != self.platform || !constraints.satisfies(&candidate.version) {
                continue;
            }
            // Strictly greater: ties keep the first candidate in chain order
            if best.is_none_or(|b| candidate.version.greater_than(&b.version)) {
                best = Some(candidate);
            }
        }

        match best {
            Some(selected) => {
                info!(
                    "Selected {} {} from {}",
                    identity, selected.version, selected.location
                );
                Ok(selected.clone())
            }
            // A pass cut short may have missed the version that fits
            None if self.cancel.is_cancelled() => Err(ResolveError::Cancelled(identity.clone())),
            None => Err(ResolveError::NoSatisfyingVersion {
                identity: identity.clone(),
                constraints: constraints.clone(),
                platform: self.platform.clone(),
                nearest: self.near_misses(&candidates),
            }),
        }
    }

    /// Available versions, target platform first, newest first within each group
    fn near_misses(&self, candidates: &[PackageMeta]) -> Vec<NearMiss> {
        let mut near: Vec<NearMiss> = Vec::new();
        for candidate in candidates {
            let miss = NearMiss {
                version: candidate.version.clone(),
                platform: candidate.platform.clone(),
            };
            if !near.contains(&miss) {
                near.push(miss);
            }
        }
        near.sort_by(|a, b| {
            let a_other = a.platform != self.platform;
            let b_other = b.platform != self.platform;
            a_other
                .cmp(&b_other)
                .then_with(|| b.version.cmp_precedence(&a.version))
        });
        near.truncate(MAX_NEAR_MISSES);
        near
    }
}
