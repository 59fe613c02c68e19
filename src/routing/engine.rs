//! Priority-ordered server selection.
//!
//! # Stages (first hit wins)
//! ```text
//! DebugHeader  per-call debug host override
//! LocalDebug   prefer an instance on this machine
//! DebugRule    debug.<own ip> pins the service to listed addresses;
//!              other hosts' debug targets are kept out of the pool
//! TestRule     test.<own ip>, same mechanism, separate namespace
//! AbRule       live ab version: pull selected clients in, push the rest out
//! GrayRule     pull matching clients onto gray targets
//! Fallback     default balancer over the (possibly narrowed) pool
//! ```
//!
//! # Design Decisions
//! - One tagged rule type, one ordered dispatch table
//! - A stage whose targets are all unavailable is a miss, never an empty result
//! - Pure function of (snapshot, context); no I/O, no locks

use serde::Serialize;

use crate::net::identity::LocalIdentity;
use crate::routing::context::{RequestContext, Server};
use crate::routing::matcher::{AnyMatcher, Matcher};
use crate::rules::model::{AbSide, Rule, RuleKind, RuleSet};

/// A step of the selection procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    DebugHeader,
    LocalDebug,
    DebugRule,
    TestRule,
    AbRule,
    GrayRule,
    Fallback,
}

impl Stage {
    /// Evaluation order. `Fallback` is implicit after the last entry.
    pub const ORDERED: [Stage; 6] = [
        Stage::DebugHeader,
        Stage::LocalDebug,
        Stage::DebugRule,
        Stage::TestRule,
        Stage::AbRule,
        Stage::GrayRule,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::DebugHeader => "debug_header",
            Stage::LocalDebug => "local_debug",
            Stage::DebugRule => "debug_rule",
            Stage::TestRule => "test_rule",
            Stage::AbRule => "ab_rule",
            Stage::GrayRule => "gray_rule",
            Stage::Fallback => "fallback",
        }
    }
}

/// Outcome of one decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Route to exactly this server.
    Override { server: Server, stage: Stage },
    /// A rule narrowed the candidates; the fallback balancer picks within `pool`.
    Restrict { pool: Vec<Server>, stage: Stage },
    /// No override; the fallback balancer sees the untouched candidate list.
    Delegate,
}

impl Decision {
    pub fn stage(&self) -> Stage {
        match self {
            Decision::Override { stage, .. } | Decision::Restrict { stage, .. } => *stage,
            Decision::Delegate => Stage::Fallback,
        }
    }
}

enum StageOutcome<'a> {
    Pick(&'a Server),
    Restrict(Vec<&'a Server>),
    /// Keep going, but with a smaller pool.
    Narrow(Vec<&'a Server>),
    Miss,
}

/// Applies the stage table to a snapshot and a request.
#[derive(Debug, Clone, Default)]
pub struct DecisionEngine {
    identity: LocalIdentity,
    debug_local: bool,
}

impl DecisionEngine {
    /// `debug_local` enables local-debug routing for every call from this process.
    pub fn new(identity: LocalIdentity, debug_local: bool) -> Self {
        Self {
            identity,
            debug_local,
        }
    }

    /// Run the stages against one snapshot.
    pub fn decide(&self, rules: &RuleSet, ctx: &RequestContext) -> Decision {
        let mut pool: Vec<&Server> = ctx.candidates.iter().collect();
        let mut narrowed_by = None;

        for stage in Stage::ORDERED {
            let outcome = match stage {
                Stage::DebugHeader => self.debug_header(ctx, &pool),
                Stage::LocalDebug => self.local_debug(ctx, &pool),
                Stage::DebugRule => self.debug_rule(rules, ctx, &pool),
                Stage::TestRule => self.host_rule(RuleKind::Test, rules, ctx, &pool),
                Stage::AbRule => ab_rule(rules, ctx, &pool),
                Stage::GrayRule => gray_rule(rules, ctx, &pool),
                Stage::Fallback => StageOutcome::Miss,
            };

            match outcome {
                StageOutcome::Pick(server) => {
                    tracing::debug!(
                        service = %ctx.service_id,
                        stage = stage.as_str(),
                        server = %server,
                        "Routing override"
                    );
                    return Decision::Override {
                        server: server.clone(),
                        stage,
                    };
                }
                StageOutcome::Restrict(subset) => {
                    tracing::debug!(
                        service = %ctx.service_id,
                        stage = stage.as_str(),
                        pool = subset.len(),
                        "Routing restricted to rule targets"
                    );
                    return Decision::Restrict {
                        pool: subset.into_iter().cloned().collect(),
                        stage,
                    };
                }
                StageOutcome::Narrow(subset) => {
                    pool = subset;
                    narrowed_by = Some(stage);
                }
                StageOutcome::Miss => {}
            }
        }

        match narrowed_by {
            Some(stage) => Decision::Restrict {
                pool: pool.into_iter().cloned().collect(),
                stage,
            },
            None => Decision::Delegate,
        }
    }

    fn debug_header<'a>(&self, ctx: &RequestContext, pool: &[&'a Server]) -> StageOutcome<'a> {
        let Some(debug_ip) = ctx.debug_server_ip.as_deref() else {
            return StageOutcome::Miss;
        };
        match pool.iter().copied().find(|s| s.host == debug_ip) {
            Some(server) => StageOutcome::Pick(server),
            None => {
                tracing::debug!(debug_ip, "Debug host not among candidates, falling through");
                StageOutcome::Miss
            }
        }
    }

    fn local_debug<'a>(&self, ctx: &RequestContext, pool: &[&'a Server]) -> StageOutcome<'a> {
        if !(ctx.local_debug || self.debug_local) {
            return StageOutcome::Miss;
        }
        pool.iter()
            .copied()
            .find(|s| self.identity.contains(&s.host))
            .map(StageOutcome::Pick)
            .unwrap_or(StageOutcome::Miss)
    }

    /// A debug target serves only the host that keyed it.
    fn debug_rule<'a>(
        &self,
        rules: &RuleSet,
        ctx: &RequestContext,
        pool: &[&'a Server],
    ) -> StageOutcome<'a> {
        match self.host_rule(RuleKind::Debug, rules, ctx, pool) {
            StageOutcome::Miss => self.exclude_foreign_debug_targets(rules, ctx, pool),
            outcome => outcome,
        }
    }

    fn exclude_foreign_debug_targets<'a>(
        &self,
        rules: &RuleSet,
        ctx: &RequestContext,
        pool: &[&'a Server],
    ) -> StageOutcome<'a> {
        let foreign: Vec<&Rule> = rules
            .rules_of(RuleKind::Debug)
            .filter(|r| !self.identity.contains(&r.key.info))
            .filter(|r| r.covers_service(&ctx.service_id))
            .collect();
        if foreign.is_empty() {
            return StageOutcome::Miss;
        }

        let remaining: Vec<&Server> = pool
            .iter()
            .copied()
            .filter(|s| !foreign.iter().any(|r| r.targets_host(&ctx.service_id, &s.host)))
            .collect();
        if remaining.is_empty() || remaining.len() == pool.len() {
            StageOutcome::Miss
        } else {
            StageOutcome::Narrow(remaining)
        }
    }

    /// Debug and test rules are keyed by this host's own addresses.
    fn host_rule<'a>(
        &self,
        kind: RuleKind,
        rules: &RuleSet,
        ctx: &RequestContext,
        pool: &[&'a Server],
    ) -> StageOutcome<'a> {
        for own_ip in self.identity.iter() {
            let Some(rule) = rules.get(kind, own_ip) else {
                continue;
            };
            if !rule.covers_service(&ctx.service_id) {
                continue;
            }
            if let Some(server) = first_in_target_order(rule, &ctx.service_id, pool) {
                return StageOutcome::Pick(server);
            }
            tracing::debug!(
                rule = %rule.key,
                service = %ctx.service_id,
                "No rule target among candidates, falling through"
            );
        }
        StageOutcome::Miss
    }
}

/// Try targets in declared order; within a target, candidates in list order.
fn first_in_target_order<'a>(
    rule: &Rule,
    service_id: &str,
    pool: &[&'a Server],
) -> Option<&'a Server> {
    rule.targets_for(service_id)
        .find_map(|pattern| pool.iter().find(|s| pattern.matches(&s.host)))
        .copied()
}

/// The live ab rule is the greatest switched-on version that targets the service.
fn ab_rule<'a>(rules: &RuleSet, ctx: &RequestContext, pool: &[&'a Server]) -> StageOutcome<'a> {
    let live = rules
        .rules_of(RuleKind::Ab)
        .rev()
        .filter(|r| r.covers_service(&ctx.service_id))
        .find_map(|r| rules.switch(&r.key.info).map(|side| (r, side)));
    let Some((rule, side)) = live else {
        return StageOutcome::Miss;
    };

    let selected = AnyMatcher::new(&rule.selectors).matches(ctx);
    // Side `a` sends selected clients to the targets; side `b` inverts it.
    let preferred = selected == (side == AbSide::A);

    let (inside, outside): (Vec<&Server>, Vec<&Server>) = pool
        .iter()
        .copied()
        .partition(|s| rule.targets_host(&ctx.service_id, &s.host));

    if preferred {
        if inside.is_empty() {
            StageOutcome::Miss
        } else {
            StageOutcome::Restrict(inside)
        }
    } else if inside.is_empty() || outside.is_empty() {
        // Nothing to exclude, or excluding would leave no server at all.
        StageOutcome::Miss
    } else {
        StageOutcome::Narrow(outside)
    }
}

/// Newest matching gray version with an available target wins.
fn gray_rule<'a>(rules: &RuleSet, ctx: &RequestContext, pool: &[&'a Server]) -> StageOutcome<'a> {
    for rule in rules.rules_of(RuleKind::Gray).rev() {
        if !rule.covers_service(&ctx.service_id) || !AnyMatcher::new(&rule.selectors).matches(ctx) {
            continue;
        }
        let inside: Vec<&Server> = pool
            .iter()
            .copied()
            .filter(|s| rule.targets_host(&ctx.service_id, &s.host))
            .collect();
        if !inside.is_empty() {
            return StageOutcome::Restrict(inside);
        }
    }
    StageOutcome::Miss
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::parser::parse_str;

    fn servers(hosts: &[&str]) -> Vec<Server> {
        hosts.iter().map(|h| Server::new(*h, 8080)).collect()
    }

    fn engine(own_ips: &[&str]) -> DecisionEngine {
        DecisionEngine::new(LocalIdentity::from_addrs(own_ips.iter().copied()), false)
    }

    fn ctx(hosts: &[&str]) -> RequestContext {
        RequestContext::new("auth", servers(hosts))
    }

    fn restrict(hosts: &[&str], stage: Stage) -> Decision {
        Decision::Restrict {
            pool: servers(hosts),
            stage,
        }
    }

    #[test]
    fn test_no_rules_delegates() {
        let ctx = ctx(&["10.0.0.1", "10.0.0.2"]);
        assert_eq!(engine(&[]).decide(&RuleSet::empty(), &ctx), Decision::Delegate);
    }

    #[test]
    fn test_debug_header_override() {
        let ctx = ctx(&["10.0.0.1", "10.0.0.2"]).with_debug_server("10.0.0.2");
        let decision = engine(&[]).decide(&RuleSet::empty(), &ctx);
        assert_eq!(
            decision,
            Decision::Override {
                server: Server::new("10.0.0.2", 8080),
                stage: Stage::DebugHeader
            }
        );
    }

    #[test]
    fn test_unknown_debug_header_falls_through() {
        let ctx = ctx(&["10.0.0.1"]).with_debug_server("10.9.9.9");
        assert_eq!(engine(&[]).decide(&RuleSet::empty(), &ctx), Decision::Delegate);
    }

    #[test]
    fn test_local_debug_prefers_own_host() {
        let ctx = ctx(&["10.0.0.1", "192.168.1.5"]);
        let engine = DecisionEngine::new(LocalIdentity::from_addrs(["192.168.1.5"]), true);
        assert_eq!(engine.decide(&RuleSet::empty(), &ctx).stage(), Stage::LocalDebug);

        let off = DecisionEngine::new(LocalIdentity::from_addrs(["192.168.1.5"]), false);
        assert_eq!(off.decide(&RuleSet::empty(), &ctx), Decision::Delegate);
        let per_call = ctx.clone().with_local_debug(true);
        assert_eq!(off.decide(&RuleSet::empty(), &per_call).stage(), Stage::LocalDebug);
    }

    #[test]
    fn test_local_debug_without_identity_is_noop() {
        let ctx = ctx(&["10.0.0.1"]).with_local_debug(true);
        let engine = DecisionEngine::new(LocalIdentity::unavailable(), true);
        assert_eq!(engine.decide(&RuleSet::empty(), &ctx), Decision::Delegate);
    }

    #[test]
    fn test_debug_rule_uses_own_host_ip() {
        let rules = parse_str("debug.192.168.23.4=auth:192.168.23.5").rule_set;
        let ctx = ctx(&["192.168.23.6", "192.168.23.5"]).with_client_ip("192.168.23.4");

        let decision = engine(&["192.168.23.4"]).decide(&rules, &ctx);
        assert_eq!(
            decision,
            Decision::Override {
                server: Server::new("192.168.23.5", 8080),
                stage: Stage::DebugRule
            }
        );
    }

    #[test]
    fn test_debug_target_is_kept_from_other_hosts() {
        let rules = parse_str("debug.192.168.23.4=auth:192.168.23.5").rule_set;
        let ctx = ctx(&["192.168.23.5", "192.168.23.6"]).with_client_ip("192.168.23.4");

        // Keyed by the calling machine, not by the client ip.
        assert_eq!(
            engine(&["10.9.9.9"]).decide(&rules, &ctx),
            restrict(&["192.168.23.6"], Stage::DebugRule)
        );

        let order = RequestContext::new("order", servers(&["192.168.23.5", "192.168.23.6"]));
        assert_eq!(engine(&["10.9.9.9"]).decide(&rules, &order), Decision::Delegate);
    }

    #[test]
    fn test_debug_exclusion_never_empties_pool() {
        let rules = parse_str("debug.192.168.23.4=auth:192.168.23.5").rule_set;
        let ctx = ctx(&["192.168.23.5"]);
        assert_eq!(engine(&["10.9.9.9"]).decide(&rules, &ctx), Decision::Delegate);
    }

    #[test]
    fn test_debug_exclusion_narrows_later_stages() {
        let rules = parse_str(
            "debug.192.168.23.4=auth:10.0.0.1\n\
             test.10.9.9.9=auth:10.0.0.1,auth:10.0.0.2\n",
        )
        .rule_set;
        let ctx = ctx(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
        assert_eq!(
            engine(&["10.9.9.9"]).decide(&rules, &ctx),
            Decision::Override {
                server: Server::new("10.0.0.2", 8080),
                stage: Stage::TestRule
            }
        );
    }

    #[test]
    fn test_unavailable_debug_target_falls_through_to_test_rule() {
        let rules = parse_str(
            "debug.192.168.23.4=auth:192.168.23.99\ntest.192.168.23.4=auth:192.168.23.*",
        )
        .rule_set;
        let ctx = ctx(&["10.0.0.1", "192.168.23.7"]);
        let decision = engine(&["192.168.23.4"]).decide(&rules, &ctx);
        assert_eq!(
            decision,
            Decision::Override {
                server: Server::new("192.168.23.7", 8080),
                stage: Stage::TestRule
            }
        );
    }

    #[test]
    fn test_host_rule_honours_target_order() {
        let rules = parse_str("test.10.1.1.1=auth:10.0.0.2,auth:10.0.0.1").rule_set;
        let ctx = ctx(&["10.0.0.1", "10.0.0.2"]);
        match engine(&["10.1.1.1"]).decide(&rules, &ctx) {
            Decision::Override { server, .. } => assert_eq!(server.host, "10.0.0.2"),
            other => panic!("unexpected decision {other:?}"),
        }
    }

    #[test]
    fn test_host_rule_for_other_service_is_ignored() {
        let rules = parse_str("test.10.1.1.1=order:10.0.0.2").rule_set;
        let ctx = ctx(&["10.0.0.1", "10.0.0.2"]);
        assert_eq!(engine(&["10.1.1.1"]).decide(&rules, &ctx), Decision::Delegate);
    }

    #[test]
    fn test_inactive_ab_rule_is_skipped() {
        let rules = parse_str("ab.v1=auth:10.0.0.1 <= ip:1.2.3.4").rule_set;
        let ctx = ctx(&["10.0.0.1", "10.0.0.2"]).with_client_ip("9.9.9.9");
        assert_eq!(engine(&[]).decide(&rules, &ctx), Decision::Delegate);
    }

    #[test]
    fn test_newest_switched_on_ab_version_is_live() {
        let rules = parse_str(
            "ab.v1=auth:10.0.0.1 <= ip:1.2.3.4\n\
             switch.ab.v1=a\n\
             ab.v2=auth:10.0.0.2 <= ip:1.2.3.4\n\
             switch.ab.v2=a\n\
             ab.v3=auth:10.0.0.3 <= ip:1.2.3.4\n",
        )
        .rule_set;
        let ctx = ctx(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]).with_client_ip("1.2.3.4");
        assert_eq!(engine(&[]).decide(&rules, &ctx), restrict(&["10.0.0.2"], Stage::AbRule));
    }

    #[test]
    fn test_ab_rule_without_selectors() {
        // No client is selected: side a pushes everyone out, side b pulls everyone in.
        let ctx = ctx(&["10.0.0.1", "10.0.0.2"]).with_client_ip("1.2.3.4").with_user("7");

        let side_a = parse_str("ab.v1=auth:10.0.0.1\nswitch.ab.v1=a").rule_set;
        assert_eq!(engine(&[]).decide(&side_a, &ctx), restrict(&["10.0.0.2"], Stage::AbRule));

        let side_b = parse_str("ab.v1=auth:10.0.0.1\nswitch.ab.v1=b").rule_set;
        assert_eq!(engine(&[]).decide(&side_b, &ctx), restrict(&["10.0.0.1"], Stage::AbRule));
    }

    #[test]
    fn test_ab_exclusion_never_empties_pool() {
        let rules = parse_str("ab.v1=auth:10.0.0.1 <= ip:1.2.3.4\nswitch.ab.v1=a").rule_set;
        let ctx = ctx(&["10.0.0.1"]).with_client_ip("9.9.9.9");
        assert_eq!(engine(&[]).decide(&rules, &ctx), Decision::Delegate);
    }

    #[test]
    fn test_gray_picks_newest_matching_version() {
        let rules = parse_str(
            "gray.20170301-1=auth:10.0.0.1 <= user:7\n\
             gray.20170325-1=auth:10.0.0.2,auth:10.0.0.3 <= user:7\n",
        )
        .rule_set;
        let ctx = ctx(&["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.4"]).with_user("7");
        assert_eq!(
            engine(&[]).decide(&rules, &ctx),
            restrict(&["10.0.0.2", "10.0.0.3"], Stage::GrayRule)
        );
    }

    #[test]
    fn test_gray_with_unavailable_targets_tries_older_version() {
        let rules =
            parse_str("gray.v1=auth:10.0.0.1 <= user:7\ngray.v2=auth:10.0.0.9 <= user:7\n")
                .rule_set;
        let ctx = ctx(&["10.0.0.1", "10.0.0.2"]).with_user("7");
        assert_eq!(engine(&[]).decide(&rules, &ctx), restrict(&["10.0.0.1"], Stage::GrayRule));
    }
}
