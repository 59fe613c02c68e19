//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call (service id, client, debug override, candidates)
//!     → router.rs (capture current RuleSet snapshot)
//!     → engine.rs (ordered stages over the snapshot)
//!     → matcher.rs (client selector evaluation)
//!     → Return: Override | Restrict(pool) | Delegate
//!     → load_balancer (fallback pick when not overridden)
//! ```
//!
//! # Design Decisions
//! - Rules compiled at reload time, immutable at decision time
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same snapshot and context always give the same decision
//! - First stage hit wins

pub mod context;
pub mod engine;
pub mod matcher;
pub mod router;

pub use context::{RequestContext, Server};
pub use engine::{Decision, DecisionEngine, Stage};
pub use router::SmartRouter;
