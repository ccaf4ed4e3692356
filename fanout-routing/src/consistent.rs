use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use fanout_hashring::ConsistentHashRing;
use hashbrown::HashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::destination::{Destination, DestinationIdentity};
use crate::error::RouteError;
use crate::key_mapper::{IdentityKeyMapper, KeyMapper};
use crate::router::{Destinations, Router};

/// Configuration of a [`ConsistentHashingRouter`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsistentHashingConfig {
    /// Maximum number of destinations returned per key. At least 1.
    pub replication_factor: usize,
    /// When set, replicas for one key land on distinct physical servers,
    /// trading strict ring order for fault tolerance.
    pub diverse_replicas: bool,
}

impl Default for ConsistentHashingConfig {
    fn default() -> Self {
        Self {
            replication_factor: 1,
            diverse_replicas: true,
        }
    }
}

/// The ring and port mapping, swapped atomically as one unit so routing
/// calls never observe the ring and the port map out of sync.
#[derive(Clone)]
struct RingState {
    ring: ConsistentHashRing<DestinationIdentity>,
    /// Port registered per `(server, instance)` identity. Invariant: the
    /// ring's node set is exactly this map's key set.
    ports: HashMap<DestinationIdentity, u16>,
    mapper: Arc<dyn KeyMapper>,
}

impl RingState {
    fn destination_for(&self, identity: &DestinationIdentity) -> Option<Destination> {
        let port = self.ports.get(identity).copied()?;
        Some(identity.with_port(port))
    }
}

/// Routes each metric to a bounded subset of the configured destinations
/// via a consistent hash ring.
///
/// Destinations are placed on the ring by their `(server, instance)`
/// identity. For a metric, the key mapper derives the routing key (identity
/// by default) and the ring's preference order determines which
/// `replication_factor` destinations receive the datapoint. With
/// `diverse_replicas`, nodes on already-selected servers are skipped so that
/// replicas land on distinct physical servers whenever the ring has enough
/// server diversity.
///
/// Membership changes move only a minimal share of keys; see
/// [`fanout_hashring`].
pub struct ConsistentHashingRouter {
    replication_factor: usize,
    diverse_replicas: bool,
    state: ArcSwap<RingState>,
    write_lock: Mutex<()>,
}

impl ConsistentHashingRouter {
    /// Creates an empty router with the given configuration and the
    /// identity key mapper.
    pub fn new(config: ConsistentHashingConfig) -> Self {
        Self {
            replication_factor: config.replication_factor.max(1),
            diverse_replicas: config.diverse_replicas,
            state: ArcSwap::from_pointee(RingState {
                ring: ConsistentHashRing::new(),
                ports: HashMap::new(),
                mapper: Arc::new(IdentityKeyMapper),
            }),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the configured replication factor.
    pub fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    /// Returns whether replicas are constrained to distinct servers.
    pub fn diverse_replicas(&self) -> bool {
        self.diverse_replicas
    }

    /// Returns the number of configured destinations.
    pub fn destination_count(&self) -> usize {
        self.state.load().ports.len()
    }

    /// Replaces the key mapper used to derive routing keys from metrics.
    ///
    /// Takes effect for all subsequent routing calls. The mapper runs on
    /// the hot path and must be side-effect-free and non-blocking.
    pub fn set_key_mapper(&self, mapper: Arc<dyn KeyMapper>) {
        let _guard = self.write_lock.lock();
        let mut state = (**self.state.load()).clone();
        state.mapper = mapper;
        self.state.store(Arc::new(state));
    }
}

impl Default for ConsistentHashingRouter {
    fn default() -> Self {
        Self::new(ConsistentHashingConfig::default())
    }
}

impl fmt::Debug for ConsistentHashingRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsistentHashingRouter")
            .field("replication_factor", &self.replication_factor)
            .field("diverse_replicas", &self.diverse_replicas)
            .field("destinations", &self.destination_count())
            .finish()
    }
}

impl Router for ConsistentHashingRouter {
    fn add_destination(&self, destination: Destination) -> Result<(), RouteError> {
        let _guard = self.write_lock.lock();
        let current = self.state.load();

        let identity = destination.identity();
        if current.ports.contains_key(&identity) {
            return Err(RouteError::DuplicateDestination(identity));
        }

        let mut next = (**current).clone();
        next.ports.insert(identity.clone(), destination.port);
        next.ring.add_node(identity);
        self.state.store(Arc::new(next));

        tracing::debug!(%destination, "destination added to hash ring");
        Ok(())
    }

    fn remove_destination(&self, destination: &Destination) -> Result<(), RouteError> {
        let _guard = self.write_lock.lock();
        let current = self.state.load();

        // The port is ignored for lookup: identity is (server, instance).
        let identity = destination.identity();
        if !current.ports.contains_key(&identity) {
            return Err(RouteError::UnknownDestination(identity));
        }

        let mut next = (**current).clone();
        next.ports.remove(&identity);
        next.ring.remove_node(&identity);
        self.state.store(Arc::new(next));

        tracing::debug!(%destination, "destination removed from hash ring");
        Ok(())
    }

    fn destinations(&self, metric: &str) -> Destinations {
        let state = self.state.load();
        let key = state.mapper.map(metric);
        let mut out = Destinations::new();

        if self.diverse_replicas {
            let mut used_servers: SmallVec<[&str; 4]> = SmallVec::new();
            for identity in state.ring.nodes_for(&key) {
                if used_servers.contains(&identity.server.as_str()) {
                    continue;
                }
                let Some(destination) = state.destination_for(identity) else {
                    continue;
                };
                used_servers.push(&identity.server);
                out.push(destination);
                if used_servers.len() >= self.replication_factor {
                    break;
                }
            }
        } else {
            for identity in state.ring.nodes_for(&key).take(self.replication_factor) {
                if let Some(destination) = state.destination_for(identity) {
                    out.push(destination);
                }
            }
        }

        out
    }
}
