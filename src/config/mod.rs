//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! engine config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → EngineConfig (validated, immutable)
//!
//! Rule file (properties text):
//!     watcher.rs detects change
//!     → change signal (no payload)
//!     → rules::reload fetches, parses, swaps the RuleSet
//! ```
//!
//! # Design Decisions
//! - Engine config is loaded once; only rules hot-reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::EngineConfig;
pub use schema::IdentityConfig;
pub use schema::ObservabilityConfig;
pub use schema::RulesConfig;
