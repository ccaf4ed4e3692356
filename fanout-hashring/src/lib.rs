//! Consistent hash ring for the fanout routing core.
//!
//! The ring assigns every node a fixed number of points on a 16-bit circle
//! and orders the full node set by preference for any given key. The two
//! properties routing relies on:
//!
//! - **Determinism**: while the node set is unchanged, [`ConsistentHashRing::nodes_for`]
//!   returns the same total order for the same key, and two rings built from
//!   the same node set agree regardless of insertion order.
//! - **Minimal disruption**: adding or removing a single node only inserts or
//!   deletes that node's points. The relative preference of all surviving
//!   nodes for any key is unaffected.
//!
//! Positions are derived from the first 16 bits of the md5 digest of
//! `"<node key>:<point>"`. This is carbon's placement function, so a fleet
//! migrated from a carbon relay keeps routing metrics to the same owners.

#![warn(missing_docs)]

mod ring;

pub use self::ring::{ConsistentHashRing, NodesFor, RingNode, DEFAULT_REPLICA_COUNT};
