use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use hashbrown::HashSet;
use parking_lot::Mutex;
use regex_lite::Regex;
use thiserror::Error;

use crate::destination::Destination;
use crate::error::RouteError;
use crate::router::{Destinations, Router};

/// A compiled relay-rule match predicate.
///
/// Patterns are regular expressions matched anywhere in the key (search, not
/// anchored), so `^` must be explicit when a prefix match is intended.
#[derive(Debug, Clone)]
pub struct RulePattern {
    regex: Regex,
    source: String,
}

impl RulePattern {
    /// Compiles a pattern from its source string.
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            source: pattern.to_owned(),
        })
    }

    /// Returns `true` if the pattern matches anywhere in `key`.
    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    /// Returns the source string the pattern was compiled from.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for RulePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for RulePattern {}

impl fmt::Display for RulePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Error returned when a relay-rule pattern fails to compile.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct PatternError(#[from] regex_lite::Error);

/// One relay rule: a match predicate, the destinations it applies to, and
/// the continue flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRule {
    pattern: RulePattern,
    destinations: Vec<Destination>,
    continue_matching: bool,
}

impl RelayRule {
    /// Creates a rule from its parts.
    pub fn new(
        pattern: RulePattern,
        destinations: Vec<Destination>,
        continue_matching: bool,
    ) -> Self {
        Self {
            pattern,
            destinations,
            continue_matching,
        }
    }

    /// Returns `true` if this rule applies to `key`.
    pub fn matches(&self, key: &str) -> bool {
        self.pattern.matches(key)
    }

    /// The destinations this rule routes matching keys to, in declaration
    /// order.
    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    /// Whether rule evaluation proceeds past this rule when it matches.
    ///
    /// When unset, a match shadows all later rules; when set, later rules
    /// may contribute additional (possibly overlapping) destinations.
    pub fn continue_matching(&self) -> bool {
        self.continue_matching
    }
}

/// An ordered sequence of [`RelayRule`]s.
///
/// Order is load-time-determined and semantically significant: earlier rules
/// shadow or combine with later ones depending on their continue flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayRuleSet {
    rules: Vec<RelayRule>,
}

impl RelayRuleSet {
    /// Creates a rule set from rules in evaluation order.
    pub fn new(rules: Vec<RelayRule>) -> Self {
        Self { rules }
    }

    /// Iterates the rules in evaluation order.
    pub fn iter(&self) -> std::slice::Iter<'_, RelayRule> {
        self.rules.iter()
    }

    /// Returns the number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if the set holds no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromIterator<RelayRule> for RelayRuleSet {
    fn from_iter<I: IntoIterator<Item = RelayRule>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RelayRuleSet {
    type Item = &'a RelayRule;
    type IntoIter = std::slice::Iter<'a, RelayRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Routes keys by scanning an ordered rule set.
///
/// For each rule matching the key, the rule's destinations are emitted in
/// declaration order; evaluation stops after the first matching rule whose
/// continue flag is unset. Destinations emitted across multiple matching
/// continue-rules are not deduplicated.
///
/// A rule may name destinations that are not currently configured; those are
/// silently dropped rather than treated as an error. This decouples declared
/// routing intent from live configuration and is load-bearing for partial
/// rollouts, but it also means a typo in a rule's destination list produces
/// no diagnostic beyond a `trace!` event.
pub struct RelayRulesRouter {
    rules: RelayRuleSet,
    destinations: ArcSwap<HashSet<Destination>>,
    write_lock: Mutex<()>,
}

impl RelayRulesRouter {
    /// Creates a router evaluating `rules`, with no destinations configured
    /// yet.
    pub fn new(rules: RelayRuleSet) -> Self {
        Self {
            rules,
            destinations: ArcSwap::from_pointee(HashSet::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the rule set this router evaluates.
    pub fn rules(&self) -> &RelayRuleSet {
        &self.rules
    }
}

impl fmt::Debug for RelayRulesRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayRulesRouter")
            .field("rules", &self.rules.len())
            .field("destinations", &self.destinations.load().len())
            .finish()
    }
}

impl Router for RelayRulesRouter {
    fn add_destination(&self, destination: Destination) -> Result<(), RouteError> {
        let _guard = self.write_lock.lock();
        let mut configured = (**self.destinations.load()).clone();
        if configured.insert(destination.clone()) {
            tracing::debug!(%destination, "destination configured");
        }
        self.destinations.store(Arc::new(configured));
        Ok(())
    }

    fn remove_destination(&self, destination: &Destination) -> Result<(), RouteError> {
        let _guard = self.write_lock.lock();
        let mut configured = (**self.destinations.load()).clone();
        if configured.remove(destination) {
            tracing::debug!(%destination, "destination removed");
        }
        self.destinations.store(Arc::new(configured));
        Ok(())
    }

    fn destinations(&self, key: &str) -> Destinations {
        let configured = self.destinations.load();
        let mut out = Destinations::new();

        for rule in &self.rules {
            if !rule.matches(key) {
                continue;
            }

            for destination in rule.destinations() {
                if configured.contains(destination) {
                    out.push(destination.clone());
                } else {
                    tracing::trace!(%destination, "rule destination not configured, dropped");
                }
            }

            if !rule.continue_matching() {
                break;
            }
        }

        out
    }
}
