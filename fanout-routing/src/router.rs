use smallvec::SmallVec;

use crate::destination::Destination;
use crate::error::RouteError;

/// The destinations a routing decision produced for one key.
///
/// Destination counts are bounded by the replication factor or the rule
/// fan-out and are small in practice, so results are materialized eagerly
/// into an inline buffer.
pub type Destinations = SmallVec<[Destination; 4]>;

/// Interface for datapoint routing policies.
///
/// Routing is read-mostly: [`destinations`](Self::destinations) runs on the
/// per-datapoint hot path of the relay, while the mutators run only on
/// configuration reload. Implementations keep their configuration in an
/// atomically swapped snapshot, so all methods take `&self` and a routing
/// call never observes a half-applied mutation.
pub trait Router: Send + Sync {
    /// Registers a destination as eligible for future routing decisions.
    fn add_destination(&self, destination: Destination) -> Result<(), RouteError>;

    /// Unregisters a destination; subsequent routing calls will not return
    /// it.
    fn remove_destination(&self, destination: &Destination) -> Result<(), RouteError>;

    /// Returns the destinations the given routing key maps to.
    ///
    /// Only destinations that are currently configured are returned. The
    /// result may be empty or shorter than requested by the policy; that is
    /// an acceptable operational state (e.g. during rolling restarts), not
    /// an error. Calling again with the same key and unchanged configuration
    /// yields the same sequence.
    fn destinations(&self, key: &str) -> Destinations;
}
