//! Fallback load balancing.
//!
//! # Data Flow
//! ```text
//! DecisionEngine → Decision
//!     Override(server)     → used as is
//!     Restrict(pool)       → LoadBalancer picks within pool
//!     Delegate             → LoadBalancer picks within all candidates
//! ```
//!
//! # Design Decisions
//! - The production balancer (zone-aware weighting) lives outside this crate;
//!   `LoadBalancer` is the seam it plugs into
//! - round_robin.rs and random.rs are stand-ins for tests and the CLI
//! - Balancers never see rules, only the candidate slice

pub mod random;
pub mod round_robin;

use crate::routing::context::Server;

pub use random::Random;
pub use round_robin::RoundRobin;

/// Picks one server from a candidate list.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// `None` only when `servers` is empty.
    fn next_server(&self, servers: &[Server]) -> Option<Server>;
}

/// Build the configured stand-in balancer.
pub fn from_strategy(strategy: crate::config::schema::FallbackStrategy) -> Box<dyn LoadBalancer> {
    use crate::config::schema::FallbackStrategy;
    match strategy {
        FallbackStrategy::RoundRobin => Box::new(RoundRobin::new()),
        FallbackStrategy::Random => Box::new(Random::new()),
    }
}
