//! Round-robin fallback strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use crate::load_balancer::LoadBalancer;
use crate::routing::context::Server;

/// Round-robin selector.
/// Stores an internal counter to rotate through servers.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, servers: &[Server]) -> Option<Server> {
        if servers.is_empty() {
            return None;
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % servers.len();
        servers.get(index).cloned()
    }
}
