//! Rule engine error types.

use thiserror::Error;

/// Failure of a whole parse or reload cycle.
///
/// None of these ever reach a routing decision: the reload pipeline logs
/// them and keeps the previously installed snapshot.
#[derive(Debug, Error)]
pub enum RuleError {
    /// The blob cannot be interpreted as rule text at all.
    #[error("structurally invalid rule config: {0}")]
    StructurallyInvalid(String),

    /// The rule source could not deliver a snapshot.
    #[error("rule source unavailable: {0}")]
    Source(#[from] SourceError),
}

/// Failure to fetch the latest bytes from a rule source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// Why a single entry was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryError {
    #[error("missing '=' separator")]
    MissingSeparator,

    #[error("key has no type info after '{0}.'")]
    MissingTypeInfo(String),

    #[error("empty target list")]
    EmptyTargets,

    #[error("malformed target '{0}', expected <serviceId>:<address>")]
    MalformedTarget(String),

    #[error("malformed client selector '{0}', expected user:<id> or ip:<address>")]
    MalformedSelector(String),

    #[error("empty client list after '<='")]
    EmptyClients,

    #[error("wildcard '*' is only allowed at the end of '{0}'")]
    MisplacedWildcard(String),

    #[error("invalid switch value '{0}', expected 'a' or 'b'")]
    InvalidSwitch(String),
}
