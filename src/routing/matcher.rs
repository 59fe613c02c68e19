//! Client matching logic.
//!
//! # Responsibilities
//! - Match `user:` selectors by exact user id
//! - Match `ip:` selectors by literal or prefix
//! - Combine a rule's selectors with OR semantics
//!
//! # Design Decisions
//! - Missing client ip or user id never matches
//! - Empty selector list matches nobody (host rules skip matching entirely)
//! - No regex, prefix matching only

use crate::routing::context::RequestContext;
use crate::rules::model::ClientSelector;

/// Trait for matching a request's client against a condition.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the client of `ctx` satisfies this condition.
    fn matches(&self, ctx: &RequestContext) -> bool;
}

impl Matcher for ClientSelector {
    fn matches(&self, ctx: &RequestContext) -> bool {
        match self {
            ClientSelector::User(expected) => ctx
                .client_user_id
                .as_deref()
                .map(|user| user == expected)
                .unwrap_or(false),
            ClientSelector::Ip(pattern) => ctx
                .client_ip
                .as_deref()
                .map(|ip| pattern.matches(ip))
                .unwrap_or(false),
        }
    }
}

/// Combines matchers with OR semantics.
#[derive(Debug)]
pub struct AnyMatcher<'a, M: Matcher> {
    matchers: &'a [M],
}

impl<'a, M: Matcher> AnyMatcher<'a, M> {
    pub fn new(matchers: &'a [M]) -> Self {
        Self { matchers }
    }
}

impl<M: Matcher> Matcher for AnyMatcher<'_, M> {
    fn matches(&self, ctx: &RequestContext) -> bool {
        // Any selector passes (OR)
        self.matchers.iter().any(|m| m.matches(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::model::AddressPattern;
    use proptest::prelude::*;

    fn ctx(ip: Option<&str>, user: Option<&str>) -> RequestContext {
        RequestContext {
            client_ip: ip.map(String::from),
            client_user_id: user.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_user_selector() {
        let selector = ClientSelector::User("1234".into());
        assert!(selector.matches(&ctx(None, Some("1234"))));
        assert!(!selector.matches(&ctx(None, Some("12345"))));
        assert!(!selector.matches(&ctx(Some("1234"), None)));
    }

    #[test]
    fn test_ip_selector() {
        let exact = ClientSelector::Ip(AddressPattern::parse("10.12.32.21").unwrap());
        assert!(exact.matches(&ctx(Some("10.12.32.21"), None)));
        assert!(!exact.matches(&ctx(Some("10.12.32.2"), None)));

        let prefix = ClientSelector::Ip(AddressPattern::parse("10.12.*").unwrap());
        assert!(prefix.matches(&ctx(Some("10.12.99.1"), None)));
        assert!(!prefix.matches(&ctx(None, Some("10.12.99.1"))));
    }

    #[test]
    fn test_any_matcher() {
        let selectors = vec![
            ClientSelector::User("1234".into()),
            ClientSelector::Ip(AddressPattern::parse("10.12.32.21").unwrap()),
        ];
        let any = AnyMatcher::new(&selectors);
        assert!(any.matches(&ctx(Some("10.12.32.21"), Some("9"))));
        assert!(any.matches(&ctx(Some("1.1.1.1"), Some("1234"))));
        assert!(!any.matches(&ctx(Some("1.1.1.1"), Some("9"))));

        let none: Vec<ClientSelector> = Vec::new();
        assert!(!AnyMatcher::new(&none).matches(&ctx(Some("1.1.1.1"), Some("9"))));
    }

    proptest! {
        #[test]
        fn prop_wildcard_matches_by_prefix_only(
            a in 0u8..=255,
            b in 0u8..=255,
            c in 0u8..=255,
            d in 0u8..=255,
        ) {
            let pattern = AddressPattern::parse("192.168.4.*").unwrap();
            let addr = format!("{a}.{b}.{c}.{d}");
            let expected = a == 192 && b == 168 && c == 4;
            prop_assert_eq!(pattern.matches(&addr), expected);
        }
    }
}
