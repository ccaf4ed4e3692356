use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use fanout_routing::{
    Destination, ParseDestinationError, PatternError, RelayRule, RelayRuleSet, RulePattern,
};

/// Errors raised while loading a relay-rules file.
///
/// All of these are configuration-time errors and fatal to configuration
/// application; a rules file that fails to load never yields a partial rule
/// set.
#[derive(Debug, Error)]
pub enum RelayRulesError {
    /// The rules file could not be read.
    #[error("failed to read relay rules from `{}`", path.display())]
    Io {
        /// Path of the rules file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The rules file is not valid JSON of the expected shape.
    #[error("failed to parse relay rules")]
    Parse(#[from] serde_json::Error),
    /// A rule's pattern failed to compile.
    #[error("relay rule {index} has an invalid pattern")]
    Pattern {
        /// Zero-based index of the offending rule.
        index: usize,
        /// The underlying pattern error.
        #[source]
        source: PatternError,
    },
    /// A rule names a destination that does not parse.
    #[error("relay rule {index} has an invalid destination")]
    Destination {
        /// Zero-based index of the offending rule.
        index: usize,
        /// The underlying destination parse error.
        #[source]
        source: ParseDestinationError,
    },
    /// The rules file contains no rules.
    #[error("relay rules must contain at least one rule")]
    Empty,
}

/// One relay rule as authored in the rules file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRuleConfig {
    /// Regular expression matched anywhere in the routing key.
    pub pattern: String,
    /// Destination strings of the form `host:port` or `host:port:instance`.
    pub destinations: Vec<String>,
    /// Whether rule evaluation proceeds past this rule when it matches.
    /// Defaults to `false` (a match shadows all later rules).
    #[serde(default)]
    pub continue_matching: bool,
}

/// The deserialized shape of a relay-rules file: an ordered rule list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRulesConfig {
    /// The rules in evaluation order.
    pub rules: Vec<RelayRuleConfig>,
}

impl RelayRulesConfig {
    /// Compiles the configured rules into a [`RelayRuleSet`].
    pub fn compile(&self) -> Result<RelayRuleSet, RelayRulesError> {
        if self.rules.is_empty() {
            return Err(RelayRulesError::Empty);
        }

        let mut rules = Vec::with_capacity(self.rules.len());
        for (index, rule) in self.rules.iter().enumerate() {
            let pattern = RulePattern::new(&rule.pattern)
                .map_err(|source| RelayRulesError::Pattern { index, source })?;

            let mut destinations = Vec::with_capacity(rule.destinations.len());
            for destination in &rule.destinations {
                let destination: Destination = destination
                    .parse()
                    .map_err(|source| RelayRulesError::Destination { index, source })?;
                destinations.push(destination);
            }

            rules.push(RelayRule::new(pattern, destinations, rule.continue_matching));
        }

        Ok(RelayRuleSet::new(rules))
    }
}

/// Loads and compiles a relay-rules file.
pub fn load_relay_rules(path: impl AsRef<Path>) -> Result<RelayRuleSet, RelayRulesError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| RelayRulesError::Io {
        path: path.to_owned(),
        source,
    })?;

    let config: RelayRulesConfig = serde_json::from_str(&raw)?;
    let rules = config.compile()?;

    tracing::debug!(rules = rules.len(), path = %path.display(), "loaded relay rules");
    Ok(rules)
}
