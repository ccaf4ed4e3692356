//! Relay-rule file loading for the fanout routing core.
//!
//! Relay rules are authored by operators as an ordered JSON list; this crate
//! deserializes and validates them into the [`RelayRuleSet`] consumed by
//! [`fanout_routing::RelayRulesRouter`]. The routing core only depends on
//! the rule iteration contract, never on the file format, so the format can
//! evolve here without touching the hot path.
//!
//! ```json
//! {
//!   "rules": [
//!     {
//!       "pattern": "^carbon\\.",
//!       "destinations": ["127.0.0.1:2004:a"],
//!       "continue_matching": false
//!     }
//!   ]
//! }
//! ```
//!
//! Rules may name destinations that are not configured on the router; the
//! router drops those silently at routing time (declared intent may be
//! broader than what is wired up). Validation here is purely structural:
//! patterns must compile, destination strings must parse, and the list must
//! not be empty.

#![warn(missing_docs)]

mod loader;

pub use self::loader::{load_relay_rules, RelayRuleConfig, RelayRulesConfig, RelayRulesError};
