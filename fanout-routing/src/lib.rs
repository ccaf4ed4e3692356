//! Routing core of the fanout metrics relay.
//!
//! Given an incoming datapoint identified by its metric name, this crate
//! decides which downstream [`Destination`]s should receive it. It sits
//! between the relay's ingestion front end and its outbound transport and is
//! the per-datapoint hot path: routing is synchronous pure computation with
//! no I/O and no locking on the read side.
//!
//! # Policies
//!
//! All policies implement the [`Router`] trait and differ only in how they
//! map a key to destinations:
//!
//! - [`RelayRulesRouter`]: scans an ordered [`RelayRuleSet`] and emits the
//!   destinations of matching rules, stopping at the first matching rule
//!   whose continue flag is unset (first-match-wins with optional fan-out).
//! - [`ConsistentHashingRouter`]: places destinations on a consistent hash
//!   ring and returns up to `replication_factor` of them per key, optionally
//!   constrained to distinct physical servers.
//! - [`AggregatedConsistentHashingRouter`]: resolves a metric to its
//!   aggregate forms first and unions the hash-routing results of every
//!   form, so the datapoint reaches every destination responsible for at
//!   least one of its aggregation buckets.
//!
//! The continue flag and the aggregate union are deliberately two distinct
//! behaviors (shadowing vs. fan-out-and-union); do not unify them.
//!
//! # Configuration changes
//!
//! Destinations are added and removed out-of-band on configuration reload.
//! Every router keeps its configuration in an immutable snapshot that is
//! atomically swapped by writers, so a routing call always observes a
//! consistent configuration without taking a lock.

#![warn(missing_docs)]

mod aggregated;
mod consistent;
mod destination;
mod error;
pub mod key_mapper;
mod router;
mod rules;

pub use self::aggregated::{AggregatedConsistentHashingRouter, AggregationRule};
pub use self::consistent::{ConsistentHashingConfig, ConsistentHashingRouter};
pub use self::destination::{Destination, DestinationIdentity, ParseDestinationError};
pub use self::error::RouteError;
pub use self::key_mapper::{IdentityKeyMapper, KeyMapper, KeyMapperError, PrefixKeyMapper};
pub use self::router::{Destinations, Router};
pub use self::rules::{PatternError, RelayRule, RelayRuleSet, RelayRulesRouter, RulePattern};
