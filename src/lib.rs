//! Client-side smart routing.
//!
//! Layers operator-controlled overrides (per-call debug host, local debug,
//! host-scoped debug/test rules, ab experiments, gray releases) on top of a
//! default load balancer. Rules arrive as properties text and are hot-swapped
//! without blocking concurrent decisions.

pub mod config;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod routing;
pub mod rules;

pub use config::schema::EngineConfig;
pub use routing::{Decision, RequestContext, Server, SmartRouter};
pub use rules::{RuleSet, RuleStore};
