// src/version/mod.rs

//! Version handling and constraint satisfaction for provider requirements
//!
//! Provider versions are semantic versions. Ordering follows semver
//! precedence, which ignores build metadata: `1.0.0+a` and `1.0.0+b` compare
//! equal. Callers that need a deterministic winner among such versions must
//! rely on a stable sort over discovery order.
//!
//! Constraints use the operator list syntax of provider requirement blocks:
//! `">= 1.0, < 2.0"`, `"~> 1.2"`, `"!= 1.5.1"`, or a bare version for an exact
//! match. Every clause must hold.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A provider version
///
/// Equality, hashing and ordering all use semver precedence, so versions that
/// differ only in build metadata are interchangeable here. The original text,
/// including metadata, is kept for display.
#[derive(Debug, Clone)]
pub struct Version(semver::Version);

impl Version {
    /// Parse a full `major.minor.patch[-pre][+build]` version
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        semver::Version::parse(trimmed)
            .map(Version)
            .map_err(|e| Error::MalformedVersion(s.to_string(), e.to_string()))
    }

    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version(semver::Version::new(major, minor, patch))
    }

    /// Compare two versions by precedence, ignoring build metadata
    pub fn cmp_precedence(&self, other: &Version) -> Ordering {
        let a = &self.0;
        let b = &other.0;
        (a.major, a.minor, a.patch)
            .cmp(&(b.major, b.minor, b.patch))
            .then_with(|| a.pre.cmp(&b.pre))
    }

    pub fn greater_than(&self, other: &Version) -> bool {
        self.cmp_precedence(other) == Ordering::Greater
    }

    pub fn is_prerelease(&self) -> bool {
        !self.0.pre.is_empty()
    }

    /// The underlying semver value, build metadata included
    pub fn as_semver(&self) -> &semver::Version {
        &self.0
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_precedence(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.major.hash(state);
        self.0.minor.hash(state);
        self.0.patch.hash(state);
        self.0.pre.as_str().hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_precedence(other)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Comparison operator of one constraint clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    /// `~>`: allow only the rightmost given segment to increase
    Pessimistic,
}

impl Operator {
    fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::GreaterThan => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::LessThan => "<",
            Operator::LessOrEqual => "<=",
            Operator::Pessimistic => "~>",
        }
    }
}

/// One clause of a constraint, e.g. `>= 1.2`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub operator: Operator,
    pub version: Version,
    /// Number of numeric segments written (1 to 3); only `~>` depends on it
    pub segments: usize,
}

impl Constraint {
    /// Parse a single clause
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (operator, rest) = if let Some(rest) = s.strip_prefix("~>") {
            (Operator::Pessimistic, rest)
        } else if let Some(rest) = s.strip_prefix(">=") {
            (Operator::GreaterOrEqual, rest)
        } else if let Some(rest) = s.strip_prefix("<=") {
            (Operator::LessOrEqual, rest)
        } else if let Some(rest) = s.strip_prefix("!=") {
            (Operator::NotEqual, rest)
        } else if let Some(rest) = s.strip_prefix('>') {
            (Operator::GreaterThan, rest)
        } else if let Some(rest) = s.strip_prefix('<') {
            (Operator::LessThan, rest)
        } else if let Some(rest) = s.strip_prefix('=') {
            (Operator::Equal, rest)
        } else {
            (Operator::Equal, s)
        };

        let (version, segments) = parse_partial(rest.trim())
            .map_err(|msg| Error::MalformedConstraint(s.to_string(), msg))?;

        Ok(Self {
            operator,
            version,
            segments,
        })
    }

    /// Check the clause alone, without the pre-release rule
    fn matches(&self, v: &Version) -> bool {
        let ord = v.cmp_precedence(&self.version);
        match self.operator {
            Operator::Equal => ord == Ordering::Equal,
            Operator::NotEqual => ord != Ordering::Equal,
            Operator::GreaterThan => ord == Ordering::Greater,
            Operator::GreaterOrEqual => ord != Ordering::Less,
            Operator::LessThan => ord == Ordering::Less,
            Operator::LessOrEqual => ord != Ordering::Greater,
            Operator::Pessimistic => {
                ord != Ordering::Less
                    && match self.pessimistic_ceiling() {
                        Some(ceiling) => v.cmp_precedence(&ceiling) == Ordering::Less,
                        None => true,
                    }
            }
        }
    }

    /// Exclusive upper bound implied by `~>`
    fn pessimistic_ceiling(&self) -> Option<Version> {
        let v = self.version.as_semver();
        match self.segments {
            0 | 1 => None,
            2 => Some(Version::new(v.major + 1, 0, 0)),
            _ => Some(Version::new(v.major, v.minor + 1, 0)),
        }
    }

    /// Lower and upper bounds this clause contributes to an interval
    fn bounds(&self) -> (Option<Bound>, Option<Bound>) {
        let v = self.version.clone();
        match self.operator {
            Operator::GreaterThan => (Some(Bound::exclusive(v)), None),
            Operator::GreaterOrEqual => (Some(Bound::inclusive(v)), None),
            Operator::LessThan => (None, Some(Bound::exclusive(v))),
            Operator::LessOrEqual => (None, Some(Bound::inclusive(v))),
            Operator::Pessimistic => (
                Some(Bound::inclusive(v)),
                self.pessimistic_ceiling().map(Bound::exclusive),
            ),
            Operator::Equal => (Some(Bound::inclusive(v.clone())), Some(Bound::inclusive(v))),
            Operator::NotEqual => (None, None),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.version.as_semver();
        let core = match self.segments {
            1 => format!("{}", v.major),
            2 => format!("{}.{}", v.major, v.minor),
            _ => format!("{}.{}.{}", v.major, v.minor, v.patch),
        };
        write!(f, "{} {}", self.operator.as_str(), core)?;
        if !v.pre.is_empty() {
            write!(f, "-{}", v.pre)?;
        }
        Ok(())
    }
}

/// Parse a possibly partial version (`1`, `1.2`, `1.2.3-beta`), padding zeros
fn parse_partial(s: &str) -> std::result::Result<(Version, usize), String> {
    if s.is_empty() {
        return Err("missing version".to_string());
    }
    let split_at = s.find(['-', '+']).unwrap_or(s.len());
    let (core, suffix) = s.split_at(split_at);

    let parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 3 {
        return Err(format!("too many version segments in '{}'", s));
    }
    let mut numbers = [0u64; 3];
    for (i, part) in parts.iter().enumerate() {
        numbers[i] = part
            .parse::<u64>()
            .map_err(|_| format!("invalid version segment '{}'", part))?;
    }

    let full = format!("{}.{}.{}{}", numbers[0], numbers[1], numbers[2], suffix);
    let version = semver::Version::parse(&full).map_err(|e| e.to_string())?;
    Ok((Version(version), parts.len()))
}

/// Interval endpoint used for contradiction checks
#[derive(Debug, Clone)]
struct Bound {
    version: Version,
    inclusive: bool,
}

impl Bound {
    fn inclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: true,
        }
    }

    fn exclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: false,
        }
    }
}

/// A conjunction of constraint clauses, possibly gathered from several
/// requirement declarations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintSet {
    clauses: Vec<Constraint>,
}

impl ConstraintSet {
    /// Matches every version
    pub fn any() -> Self {
        Self::default()
    }

    /// Parse a comma separated clause list; empty or `*` means any version
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s == "*" {
            return Ok(Self::any());
        }
        let clauses = s
            .split(',')
            .map(Constraint::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { clauses })
    }

    pub fn clauses(&self) -> &[Constraint] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Add all clauses of another set; both must then hold
    pub fn extend(&mut self, other: &ConstraintSet) {
        for clause in &other.clauses {
            if !self.clauses.contains(clause) {
                self.clauses.push(clause.clone());
            }
        }
    }

    /// Whether `version` satisfies every clause
    ///
    /// A pre-release version is only acceptable when some `=` clause names it.
    pub fn satisfies(&self, version: &Version) -> bool {
        if version.is_prerelease() {
            let named = self
                .clauses
                .iter()
                .any(|c| c.operator == Operator::Equal && c.version == *version);
            if !named {
                return false;
            }
        }
        self.clauses.iter().all(|c| c.matches(version))
    }

    /// Whether no version at all could satisfy the set
    ///
    /// Checked from the clauses alone: crossing interval bounds, two different
    /// exact versions, or an exact version (given by `=` or by inclusive bounds
    /// on the same version) outside the bounds or excluded.
    pub fn is_contradictory(&self) -> bool {
        let mut lower: Option<Bound> = None;
        let mut upper: Option<Bound> = None;
        let mut exact: Option<&Version> = None;

        for clause in &self.clauses {
            if clause.operator == Operator::Equal {
                match exact {
                    Some(v) if *v != clause.version => return true,
                    _ => exact = Some(&clause.version),
                }
            }

            let (lo, hi) = clause.bounds();
            if let Some(lo) = lo {
                lower = Some(match lower {
                    Some(cur) => tighter_lower(cur, lo),
                    None => lo,
                });
            }
            if let Some(hi) = hi {
                upper = Some(match upper {
                    Some(cur) => tighter_upper(cur, hi),
                    None => hi,
                });
            }
        }

        // Inclusive bounds meeting at one version pin it like `=`
        let mut pinned = exact.cloned();
        if let (Some(lo), Some(hi)) = (&lower, &upper) {
            match lo.version.cmp_precedence(&hi.version) {
                Ordering::Greater => return true,
                Ordering::Equal if !(lo.inclusive && hi.inclusive) => return true,
                Ordering::Equal if pinned.is_none() => pinned = Some(lo.version.clone()),
                _ => {}
            }
        }

        match pinned {
            Some(v) => self
                .clauses
                .iter()
                .any(|c| c.operator == Operator::NotEqual && !c.matches(&v)),
            None => false,
        }
    }
}

fn tighter_lower(a: Bound, b: Bound) -> Bound {
    match a.version.cmp_precedence(&b.version) {
        Ordering::Greater => a,
        Ordering::Less => b,
        Ordering::Equal => {
            if a.inclusive {
                b
            } else {
                a
            }
        }
    }
}

fn tighter_upper(a: Bound, b: Bound) -> Bound {
    match a.version.cmp_precedence(&b.version) {
        Ordering::Less => a,
        Ordering::Greater => b,
        Ordering::Equal => {
            if a.inclusive {
                b
            } else {
                a
            }
        }
    }
}

impl fmt::Display for ConstraintSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return write!(f, "any version");
        }
        let parts: Vec<String> = self.clauses.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join(", "))
    }
}

impl FromStr for ConstraintSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
