//! Per-call routing entry point.
//!
//! # Responsibilities
//! - Capture the current rule snapshot once per call
//! - Run the decision engine against it
//! - Hand restricted or untouched pools to the fallback balancer
//!
//! # Design Decisions
//! - Never fails: rule faults degrade to plain fallback balancing
//! - No locks on the hot path (snapshot load is an atomic pointer read)

use std::sync::Arc;

use crate::load_balancer::LoadBalancer;
use crate::observability::metrics;
use crate::routing::context::{RequestContext, Server};
use crate::routing::engine::{Decision, DecisionEngine};
use crate::rules::store::SharedRuleStore;

/// Rule-aware server selection layered over a fallback balancer.
#[derive(Debug)]
pub struct SmartRouter {
    store: SharedRuleStore,
    engine: DecisionEngine,
    fallback: Box<dyn LoadBalancer>,
}

impl SmartRouter {
    pub fn new(
        store: SharedRuleStore,
        engine: DecisionEngine,
        fallback: Box<dyn LoadBalancer>,
    ) -> Self {
        Self {
            store,
            engine,
            fallback,
        }
    }

    /// Decide without consulting the fallback balancer.
    pub fn decide(&self, ctx: &RequestContext) -> Decision {
        let rules = self.store.current();
        self.engine.decide(&rules, ctx)
    }

    /// Pick the server for this call. `None` only when no candidate exists.
    pub fn choose(&self, ctx: &RequestContext) -> Option<Server> {
        self.choose_with_decision(ctx).1
    }

    /// Like `choose`, also returning the decision the server came from.
    pub fn choose_with_decision(&self, ctx: &RequestContext) -> (Decision, Option<Server>) {
        let decision = self.decide(ctx);
        metrics::record_decision(decision.stage().as_str());

        let server = match &decision {
            Decision::Override { server, .. } => Some(server.clone()),
            Decision::Restrict { pool, .. } => self.fallback.next_server(pool),
            Decision::Delegate => self.fallback.next_server(&ctx.candidates),
        };
        (decision, server)
    }

    pub fn store(&self) -> &SharedRuleStore {
        &self.store
    }
}

/// A thread-safe reference to the router.
pub type SharedRouter = Arc<SmartRouter>;
