use thiserror::Error;

use crate::destination::DestinationIdentity;

/// Errors raised by router configuration mutation.
///
/// Both variants signal a configuration bug in the embedding service and
/// propagate synchronously; they are never raised on the routing path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The `(server, instance)` identity is already configured.
    #[error("destination instance {0} is already configured")]
    DuplicateDestination(DestinationIdentity),
    /// The `(server, instance)` identity was never configured.
    #[error("destination instance {0} is not configured")]
    UnknownDestination(DestinationIdentity),
}
