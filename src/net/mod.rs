//! Network identity subsystem.
//!
//! # Data Flow
//! ```text
//! Startup
//!     → identity.rs (interface addresses + outbound probe + configured extras)
//!     → LocalIdentity (immutable)
//!     → DecisionEngine (local-debug stage, debug/test rule lookup)
//! ```
//!
//! # Design Decisions
//! - Computed once; no re-resolution while running
//! - Resolution failure degrades routing, never blocks startup

pub mod identity;

pub use identity::{IdentityError, LocalIdentity};
