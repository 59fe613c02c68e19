//! Rule subsystem.
//!
//! # Data Flow
//! ```text
//! RuleSource bytes (properties text)
//!     → parser.rs (entries → Rule / switch state, warnings for bad entries)
//!     → model.rs (immutable RuleSet)
//!     → store.rs (atomic swap)
//!     ⇄ routing (one snapshot per decision)
//!
//! Change signal:
//!     → reload.rs (coalesce, fetch, parse, install)
//! ```
//!
//! # Design Decisions
//! - Every reload builds a complete new RuleSet; no merging
//! - Bad entries are skipped, bad blobs are rejected, readers never see either

pub mod error;
pub mod model;
pub mod parser;
pub mod reload;
pub mod source;
pub mod store;

pub use error::{EntryError, RuleError, SourceError};
pub use model::{
    AbSide, AddressPattern, ClientSelector, Rule, RuleKey, RuleKind, RuleSet, ServiceTarget,
};
pub use parser::{parse, ParsedRules, ParseWarning};
pub use reload::{ReloadState, Reloader};
pub use source::{FileSource, RuleSource};
pub use store::{RuleStore, SharedRuleStore};
