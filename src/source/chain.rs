// src/source/chain.rs

//! Ordered chain of installation sources
//!
//! The chain owns the error policy: a source failing for one provider is
//! logged and counts as "no candidates from this source"; other sources and
//! other providers are unaffected. Only cancellation stops a query.

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::{CandidateQuery, PackageMeta, Source};
use crate::addrs::PluginIdentity;
use crate::config::ConfigError;
use crate::error::{Error, Result};

/// How answers from several sources are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainPolicy {
    /// The first source returning any candidate is the only one used
    #[default]
    FirstMatch,
    /// Every source is asked; candidates are concatenated in chain order
    Union,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Include/exclude patterns over `hostname/namespace/type`
#[derive(Debug, Clone, Default)]
pub struct SourceFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl SourceFilter {
    /// Build a filter; an empty include list matches every provider
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let compile = |patterns: &[String]| -> Result<Vec<Pattern>> {
            patterns
                .iter()
                .map(|p| {
                    Pattern::new(p).map_err(|e| {
                        Error::Config(ConfigError::InvalidPattern(format!("{:?}: {}", p, e)))
                    })
                })
                .collect()
        };
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    pub fn matches(&self, identity: &PluginIdentity) -> bool {
        let addr = identity.to_string();
        let included = self.include.is_empty()
            || self
                .include
                .iter()
                .any(|p| p.matches_with(&addr, MATCH_OPTIONS));
        included
            && !self
                .exclude
                .iter()
                .any(|p| p.matches_with(&addr, MATCH_OPTIONS))
    }
}

/// A source together with the providers it may answer for
pub struct ChainEntry {
    source: Box<dyn Source>,
    filter: SourceFilter,
}

impl ChainEntry {
    pub fn new(source: Box<dyn Source>, filter: SourceFilter) -> Self {
        Self { source, filter }
    }
}

/// Sources in priority order plus the combination policy
pub struct SourceChain {
    entries: Vec<ChainEntry>,
    policy: ChainPolicy,
}

impl SourceChain {
    pub fn new(policy: ChainPolicy) -> Self {
        Self {
            entries: Vec::new(),
            policy,
        }
    }

    /// Append a source that answers for every provider
    pub fn push(&mut self, source: impl Source + 'static) {
        self.push_entry(ChainEntry::new(Box::new(source), SourceFilter::default()));
    }

    pub fn push_entry(&mut self, entry: ChainEntry) {
        self.entries.push(entry);
    }

    pub fn policy(&self) -> ChainPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ask the sources for candidates, in order
    ///
    /// Returns `Err(Cancelled)` only, whether the query's token fired between
    /// sources or inside one; every other failure is absorbed here.
    pub fn list_candidates(&self, query: &CandidateQuery<'_>) -> Result<Vec<PackageMeta>> {
        let mut all = Vec::new();

        for entry in &self.entries {
            if !entry.filter.matches(query.identity) {
                trace!(
                    "Skipping {} for {}: excluded by source patterns",
                    entry.source.describe(),
                    query.identity
                );
                continue;
            }
            query.cancel.check()?;

            match entry.source.list_candidates(query) {
                Ok(found) => {
                    debug!(
                        "{} offers {} package(s) for {}",
                        entry.source.describe(),
                        found.len(),
                        query.identity
                    );
                    let stop = !found.is_empty() && self.policy == ChainPolicy::FirstMatch;
                    all.extend(found);
                    if stop {
                        break;
                    }
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!(
                        "Ignoring {} for {}: {}",
                        entry.source.describe(),
                        query.identity,
                        e
                    );
                }
            }
        }

        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::Cancellation;
    use crate::platform::TargetPlatform;
    use crate::source::PackageLocation;
    use crate::version::{ConstraintSet, Version};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        versions: Vec<&'static str>,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    impl Source for Fixed {
        fn describe(&self) -> String {
            "fixed".to_string()
        }

        fn list_candidates(&self, query: &CandidateQuery<'_>) -> Result<Vec<PackageMeta>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::IoError("boom".to_string()));
            }
            Ok(self
                .versions
                .iter()
                .map(|v| PackageMeta {
                    identity: query.identity.clone(),
                    version: Version::parse(v).unwrap(),
                    platform: query.platform.clone(),
                    location: PackageLocation::LocalDir(format!("/{}", v).into()),
                })
                .collect())
        }
    }

    fn fixed(versions: Vec<&'static str>, fail: bool) -> (Fixed, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Fixed {
                versions,
                fail,
                calls: calls.clone(),
            },
            calls,
        )
    }

    fn run(chain: &SourceChain) -> Vec<String> {
        let identity = PluginIdentity::new("example.com", "ns", "typ");
        let constraints = ConstraintSet::any();
        let platform = TargetPlatform::new("linux", "amd64");
        chain
            .list_candidates(&CandidateQuery {
                identity: &identity,
                constraints: &constraints,
                platform: &platform,
                cancel: &Cancellation::new(),
            })
            .unwrap()
            .into_iter()
            .map(|m| m.version.to_string())
            .collect()
    }

    #[test]
    fn test_first_match_stops_at_first_non_empty() {
        let mut chain = SourceChain::new(ChainPolicy::FirstMatch);
        let (empty, _) = fixed(vec![], false);
        let (first, _) = fixed(vec!["1.0.0"], false);
        let (second, second_calls) = fixed(vec!["2.0.0"], false);
        chain.push(empty);
        chain.push(first);
        chain.push(second);

        assert_eq!(run(&chain), vec!["1.0.0"]);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_union_collects_in_order() {
        let mut chain = SourceChain::new(ChainPolicy::Union);
        let (first, _) = fixed(vec!["1.0.0"], false);
        let (second, _) = fixed(vec!["2.0.0", "1.5.0"], false);
        chain.push(first);
        chain.push(second);

        assert_eq!(run(&chain), vec!["1.0.0", "2.0.0", "1.5.0"]);
    }

    #[test]
    fn test_failing_source_is_skipped() {
        let mut chain = SourceChain::new(ChainPolicy::FirstMatch);
        let (broken, broken_calls) = fixed(vec![], true);
        let (good, _) = fixed(vec!["3.0.0"], false);
        chain.push(broken);
        chain.push(good);

        assert_eq!(run(&chain), vec!["3.0.0"]);
        assert_eq!(broken_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_filter_patterns() {
        let filter = SourceFilter::new(
            &["example.com/*/*".to_string()],
            &["example.com/internal/*".to_string()],
        )
        .unwrap();
        assert!(filter.matches(&PluginIdentity::new("example.com", "ns", "typ")));
        assert!(!filter.matches(&PluginIdentity::new("example.com", "internal", "typ")));
        assert!(!filter.matches(&PluginIdentity::new("other.com", "ns", "typ")));
        assert!(SourceFilter::default().matches(&PluginIdentity::new("a", "b", "c")));
        assert!(SourceFilter::new(&["[".to_string()], &[]).is_err());
    }

    #[test]
    fn test_filtered_source_not_queried() {
        let mut chain = SourceChain::new(ChainPolicy::Union);
        let (source, calls) = fixed(vec!["1.0.0"], false);
        chain.push_entry(ChainEntry::new(
            Box::new(source),
            SourceFilter::new(&["other.com/*/*".to_string()], &[]).unwrap(),
        ));

        assert!(run(&chain).is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancelled_chain() {
        let mut chain = SourceChain::new(ChainPolicy::Union);
        let (source, calls) = fixed(vec!["1.0.0"], false);
        chain.push(source);

        let cancel = Cancellation::new();
        cancel.cancel();
        let identity = PluginIdentity::new("example.com", "ns", "typ");
        let constraints = ConstraintSet::any();
        let platform = TargetPlatform::new("linux", "amd64");
        let result = chain.list_candidates(&CandidateQuery {
            identity: &identity,
            constraints: &constraints,
            platform: &platform,
            cancel: &cancel,
        });
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
