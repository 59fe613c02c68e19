//! Rule text parsing.
//!
//! # Grammar
//! ```text
//! switch.ab.<version> = a | b
//! <type>.<typeInfo>   = <serviceId>:<address>(,<serviceId>:<address>)*
//!                       [<= (user|ip):<value>(,(user|ip):<value>)*]
//! ```
//!
//! # Design Decisions
//! - Properties-style lines: `#`/`!` comments, trailing `\` continuation
//! - Partial success: a malformed entry is skipped and recorded as a warning
//! - Only undecodable bytes fail the whole parse
//! - Unknown types are ignored so new keys can ship before clients understand them

use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::rules::error::{EntryError, RuleError};
use crate::rules::model::{
    AbSide, AddressPattern, ClientSelector, Rule, RuleKey, RuleKind, RuleSet, ServiceTarget,
};

/// Separates the target list from the client list.
const CLIENT_SEPARATOR: &str = "<=";
const DUPLICATE_KEY: &str = "duplicate key, later entry wins";

/// A skipped (or partially honoured) entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    /// 1-based line on which the entry starts.
    pub line: usize,
    pub key: String,
    pub message: String,
}

impl ParseWarning {
    fn new(line: usize, key: &str, message: impl Into<String>) -> Self {
        Self {
            line,
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Result of a successful parse.
#[derive(Debug, Clone, Default)]
pub struct ParsedRules {
    pub rule_set: RuleSet,
    pub warnings: Vec<ParseWarning>,
    /// Entries with an unrecognised type, kept for diagnostics.
    pub ignored: Vec<String>,
}

/// Parse a raw snapshot into a `RuleSet`.
pub fn parse(raw: &[u8]) -> Result<ParsedRules, RuleError> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| RuleError::StructurallyInvalid(format!("not valid UTF-8: {e}")))?;
    Ok(parse_str(text))
}

/// Parse already-decoded rule text. Never fails.
pub fn parse_str(text: &str) -> ParsedRules {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut rules: BTreeMap<RuleKey, Rule> = BTreeMap::new();
    let mut switches: BTreeMap<String, AbSide> = BTreeMap::new();
    let mut warnings = Vec::new();
    let mut ignored = Vec::new();

    for (line, entry) in logical_lines(text) {
        let Some((key, value)) = entry.split_once('=') else {
            let message = EntryError::MissingSeparator.to_string();
            warnings.push(ParseWarning::new(line, entry.trim(), message));
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        let Some((type_name, type_info)) = key.split_once('.') else {
            ignored.push(key.to_string());
            continue;
        };

        if type_name == "switch" {
            match parse_switch(type_info, value) {
                Ok(Some((version, side))) => {
                    if switches.insert(version.to_string(), side).is_some() {
                        warnings.push(ParseWarning::new(line, key, DUPLICATE_KEY));
                    }
                }
                Ok(None) => ignored.push(key.to_string()),
                Err(e) => warnings.push(ParseWarning::new(line, key, e.to_string())),
            }
            continue;
        }

        let Ok(kind) = RuleKind::from_str(type_name) else {
            tracing::debug!(key = %key, "Ignoring entry with unknown rule type");
            ignored.push(key.to_string());
            continue;
        };

        let type_info = type_info.trim();
        if type_info.is_empty() {
            let message = EntryError::MissingTypeInfo(type_name.to_string()).to_string();
            warnings.push(ParseWarning::new(line, key, message));
            continue;
        }

        let rule_key = RuleKey::new(kind, type_info);
        let (targets_part, clients_part) = match value.split_once(CLIENT_SEPARATOR) {
            Some((t, c)) => (t, Some(c)),
            None => (value, None),
        };

        let targets = match parse_targets(targets_part) {
            Ok(t) => t,
            Err(e) => {
                warnings.push(ParseWarning::new(line, key, e.to_string()));
                continue;
            }
        };

        let mut selectors = match clients_part.map(parse_selectors).transpose() {
            Ok(s) => s.unwrap_or_default(),
            Err(e) => {
                warnings.push(ParseWarning::new(line, key, e.to_string()));
                continue;
            }
        };

        if kind.is_host_scoped() && !selectors.is_empty() {
            let message = "client list ignored, host rules apply to all clients";
            warnings.push(ParseWarning::new(line, key, message));
            selectors.clear();
        } else if !kind.is_host_scoped() && selectors.is_empty() {
            let message = "no client selectors, rule matches no client";
            warnings.push(ParseWarning::new(line, key, message));
        }

        let rule = Rule {
            key: rule_key.clone(),
            targets,
            selectors,
        };
        match rules.entry(rule_key) {
            Entry::Occupied(mut slot) => {
                warnings.push(ParseWarning::new(line, key, DUPLICATE_KEY));
                slot.insert(rule);
            }
            Entry::Vacant(slot) => {
                slot.insert(rule);
            }
        }
    }

    ParsedRules {
        rule_set: RuleSet::from_parts(rules, switches),
        warnings,
        ignored,
    }
}

/// `ab.<version>` → `Some((version, side))`; other switch families → `None`.
fn parse_switch<'a>(
    rest: &'a str,
    value: &str,
) -> Result<Option<(&'a str, AbSide)>, EntryError> {
    let Some((family, version)) = rest.split_once('.') else {
        return Ok(None);
    };
    if family != "ab" {
        return Ok(None);
    }
    let version = version.trim();
    if version.is_empty() {
        return Err(EntryError::MissingTypeInfo("switch.ab".to_string()));
    }
    let side =
        AbSide::from_str(value).map_err(|_| EntryError::InvalidSwitch(value.to_string()))?;
    Ok(Some((version, side)))
}

fn parse_targets(raw: &str) -> Result<Vec<ServiceTarget>, EntryError> {
    if raw.trim().is_empty() {
        return Err(EntryError::EmptyTargets);
    }
    raw.split(',').map(parse_target).collect()
}

fn parse_target(raw: &str) -> Result<ServiceTarget, EntryError> {
    let raw = raw.trim();
    let (service_id, address) = raw
        .split_once(':')
        .map(|(s, a)| (s.trim(), a.trim()))
        .filter(|(s, a)| !s.is_empty() && !a.is_empty())
        .ok_or_else(|| EntryError::MalformedTarget(raw.to_string()))?;
    let address = AddressPattern::parse(address)
        .ok_or_else(|| EntryError::MisplacedWildcard(address.to_string()))?;
    Ok(ServiceTarget {
        service_id: service_id.to_string(),
        address,
    })
}

fn parse_selectors(raw: &str) -> Result<Vec<ClientSelector>, EntryError> {
    if raw.trim().is_empty() {
        return Err(EntryError::EmptyClients);
    }
    let mut selectors: Vec<ClientSelector> = Vec::new();
    for piece in raw.split(',') {
        let selector = parse_selector(piece)?;
        if !selectors.contains(&selector) {
            selectors.push(selector);
        }
    }
    Ok(selectors)
}

fn parse_selector(raw: &str) -> Result<ClientSelector, EntryError> {
    let raw = raw.trim();
    let malformed = || EntryError::MalformedSelector(raw.to_string());
    let (kind, value) = raw.split_once(':').ok_or_else(malformed)?;
    let value = value.trim();
    if value.is_empty() {
        return Err(malformed());
    }
    match kind.trim() {
        "user" => Ok(ClientSelector::User(value.to_string())),
        "ip" => AddressPattern::parse(value)
            .map(ClientSelector::Ip)
            .ok_or_else(|| EntryError::MisplacedWildcard(value.to_string())),
        _ => Err(malformed()),
    }
}

/// Join continuation lines and drop comments and blanks.
///
/// Yields `(first_line_number, logical_line)`.
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (idx, physical) in text.lines().enumerate() {
        let trimmed = physical.trim_start();
        let continues = ends_with_continuation(trimmed);
        let body = if continues { &trimmed[..trimmed.len() - 1] } else { trimmed };

        match pending.as_mut() {
            Some((_, buf)) => buf.push_str(body),
            None => {
                if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                    continue;
                }
                pending = Some((idx + 1, body.to_string()));
            }
        }

        if !continues {
            if let Some(done) = pending.take() {
                out.push(done);
            }
        }
    }
    out.extend(pending);
    out
}

/// An odd number of trailing backslashes continues the line.
fn ends_with_continuation(line: &str) -> bool {
    line.bytes().rev().take_while(|b| *b == b'\\').count() % 2 == 1
}
