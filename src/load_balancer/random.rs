//! Uniform random fallback strategy.

use crate::load_balancer::LoadBalancer;
use crate::routing::context::Server;

/// Picks uniformly at random on every call.
#[derive(Debug, Default)]
pub struct Random;

impl Random {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for Random {
    fn next_server(&self, servers: &[Server]) -> Option<Server> {
        if servers.is_empty() {
            return None;
        }
        servers.get(fastrand::usize(..servers.len())).cloned()
    }
}
