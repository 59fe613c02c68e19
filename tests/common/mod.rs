//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use smart_route::load_balancer::RoundRobin;
use smart_route::net::LocalIdentity;
use smart_route::routing::{DecisionEngine, Server, SmartRouter};
use smart_route::rules::{parser, RuleSource, RuleStore, SourceError};

/// Candidates on port 8080 for each host.
pub fn servers(hosts: &[&str]) -> Vec<Server> {
    hosts.iter().map(|h| Server::new(*h, 8080)).collect()
}

/// A router over `rules` for a process owning `own_ips`.
pub fn router(rules: &str, own_ips: &[&str], debug_local: bool) -> SmartRouter {
    let store = Arc::new(RuleStore::new(parser::parse_str(rules).rule_set));
    SmartRouter::new(
        store,
        DecisionEngine::new(LocalIdentity::from_addrs(own_ips.iter().copied()), debug_local),
        Box::new(RoundRobin::new()),
    )
}

/// In-memory rule source standing in for the remote config store.
#[derive(Debug, Default)]
pub struct MemorySource {
    content: Mutex<Vec<u8>>,
    fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new(content: &str) -> Arc<Self> {
        let source = Arc::new(Self::default());
        source.set(content);
        source
    }

    pub fn set(&self, content: &str) {
        *self.content.lock().unwrap() = content.as_bytes().to_vec();
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl RuleSource for MemorySource {
    fn fetch(&self) -> Result<Vec<u8>, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.content.lock().unwrap().clone())
    }
}
