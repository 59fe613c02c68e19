//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve local identity (failure degrades, never aborts)
//! - Load the initial rule snapshot synchronously
//! - Assemble the router around the shared store
//!
//! # Design Decisions
//! - The first decision always sees an installed snapshot (empty at worst)
//! - Subsystems initialize in order, not concurrently

use std::sync::Arc;

use crate::config::schema::EngineConfig;
use crate::load_balancer;
use crate::net::identity::LocalIdentity;
use crate::routing::engine::DecisionEngine;
use crate::routing::router::{SharedRouter, SmartRouter};
use crate::rules::reload::Reloader;
use crate::rules::source::{FileSource, RuleSource};
use crate::rules::store::RuleStore;

/// Everything a running engine needs.
#[derive(Debug)]
pub struct RoutingRuntime {
    pub router: SharedRouter,
    pub reloader: Arc<Reloader>,
}

/// Start against the configured rule file.
pub fn start(config: &EngineConfig) -> RoutingRuntime {
    let source = Arc::new(FileSource::new(&config.rules.path));
    start_with_source(config, source)
}

/// Start against any rule source.
pub fn start_with_source(config: &EngineConfig, source: Arc<dyn RuleSource>) -> RoutingRuntime {
    let identity = match LocalIdentity::resolve(&config.identity) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(error = %e, "Local-debug and host rules disabled for this process");
            LocalIdentity::unavailable()
        }
    };

    let store = Arc::new(RuleStore::default());
    let reloader = Arc::new(Reloader::new(source, store.clone()));
    // Errors are logged inside; the empty set stays installed.
    let _ = reloader.start();

    let engine = DecisionEngine::new(identity, config.routing.debug_local);
    let router = Arc::new(SmartRouter::new(
        store,
        engine,
        load_balancer::from_strategy(config.fallback.strategy),
    ));

    tracing::info!(
        rules = router.store().current().len(),
        debug_local = config.routing.debug_local,
        "Routing engine ready"
    );

    RoutingRuntime { router, reloader }
}
