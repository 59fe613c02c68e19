//! Rule data model.
//!
//! # Responsibilities
//! - Represent parsed rules as one tagged type (`Rule` + `RuleKind`)
//! - Hold the immutable `RuleSet` snapshot handed to decisions
//! - Address pattern matching (exact or trailing-`*` prefix)
//!
//! # Design Decisions
//! - `RuleSet` is never mutated after construction; reloads build a new one
//! - Ordered maps so iteration (and therefore every decision) is deterministic
//! - Prefix matching only, no general glob syntax

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The four recognised rule types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Debug,
    Test,
    Ab,
    Gray,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Debug => "debug",
            RuleKind::Test => "test",
            RuleKind::Ab => "ab",
            RuleKind::Gray => "gray",
        }
    }

    /// Debug and test rules are keyed by host IP and apply to every client.
    pub fn is_host_scoped(&self) -> bool {
        matches!(self, RuleKind::Debug | RuleKind::Test)
    }
}

impl FromStr for RuleKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(RuleKind::Debug),
            "test" => Ok(RuleKind::Test),
            "ab" => Ok(RuleKind::Ab),
            "gray" => Ok(RuleKind::Gray),
            _ => Err(()),
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `(type, typeInfo)`: a host IP for debug/test, a publish version for ab/gray.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RuleKey {
    pub kind: RuleKind,
    pub info: String,
}

impl RuleKey {
    pub fn new(kind: RuleKind, info: impl Into<String>) -> Self {
        Self {
            kind,
            info: info.into(),
        }
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.info)
    }
}

/// A literal address or a prefix terminated by `*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AddressPattern {
    Exact(String),
    Prefix(String),
}

impl AddressPattern {
    /// Build a pattern from its textual form. Returns `None` when a `*`
    /// appears anywhere but the last position.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.find('*') {
            None => Some(AddressPattern::Exact(raw.to_string())),
            Some(idx) if idx == raw.len() - 1 => {
                Some(AddressPattern::Prefix(raw[..idx].to_string()))
            }
            Some(_) => None,
        }
    }

    /// Exact string equality, or `starts_with` for prefixes.
    pub fn matches(&self, address: &str) -> bool {
        match self {
            AddressPattern::Exact(expected) => address == expected,
            AddressPattern::Prefix(prefix) => address.starts_with(prefix.as_str()),
        }
    }
}

impl fmt::Display for AddressPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressPattern::Exact(addr) => f.write_str(addr),
            AddressPattern::Prefix(prefix) => write!(f, "{prefix}*"),
        }
    }
}

impl Serialize for AddressPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// `serviceId:addressPattern`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceTarget {
    pub service_id: String,
    pub address: AddressPattern,
}

/// Which client population a selector picks out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ClientSelector {
    /// Equality against the client user id.
    User(String),
    /// Literal or prefix match against the client IP.
    Ip(AddressPattern),
}

/// One routing rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub key: RuleKey,
    /// Never empty.
    pub targets: Vec<ServiceTarget>,
    /// Empty means "all clients" for debug/test and "no client" for ab/gray.
    pub selectors: Vec<ClientSelector>,
}

impl Rule {
    /// Address patterns this rule declares for `service_id`, in order.
    pub fn targets_for<'a>(
        &'a self,
        service_id: &'a str,
    ) -> impl Iterator<Item = &'a AddressPattern> + 'a {
        self.targets
            .iter()
            .filter(move |t| t.service_id == service_id)
            .map(|t| &t.address)
    }

    pub fn covers_service(&self, service_id: &str) -> bool {
        self.targets.iter().any(|t| t.service_id == service_id)
    }

    /// True if `host` is one of this rule's target addresses for `service_id`.
    pub fn targets_host(&self, service_id: &str, host: &str) -> bool {
        self.targets_for(service_id).any(|p| p.matches(host))
    }
}

/// Active side of an ab experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AbSide {
    A,
    B,
}

impl FromStr for AbSide {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("a") {
            Ok(AbSide::A)
        } else if s.eq_ignore_ascii_case("b") {
            Ok(AbSide::B)
        } else {
            Err(())
        }
    }
}

/// Immutable snapshot of all rules and ab switch states.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: BTreeMap<RuleKey, Rule>,
    switches: BTreeMap<String, AbSide>,
}

impl RuleSet {
    /// The safe default: nothing overrides the fallback balancer.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_parts(rules: BTreeMap<RuleKey, Rule>, switches: BTreeMap<String, AbSide>) -> Self {
        Self { rules, switches }
    }

    pub fn get(&self, kind: RuleKind, info: &str) -> Option<&Rule> {
        self.rules.get(&RuleKey::new(kind, info))
    }

    /// Rules of one kind, ordered by type info.
    pub fn rules_of(&self, kind: RuleKind) -> impl DoubleEndedIterator<Item = &Rule> {
        self.rules
            .iter()
            .filter(move |(k, _)| k.kind == kind)
            .map(|(_, r)| r)
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }

    /// Switch state for an ab version. `None` means the ab rule is inactive.
    pub fn switch(&self, version: &str) -> Option<AbSide> {
        self.switches.get(version).copied()
    }

    pub fn switches(&self) -> &BTreeMap<String, AbSide> {
        &self.switches
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.switches.is_empty()
    }
}

impl Serialize for RuleSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("RuleSet", 2)?;
        state.serialize_field("rules", &self.rules().collect::<Vec<_>>())?;
        state.serialize_field("switches", &self.switches)?;
        state.end()
    }
}
