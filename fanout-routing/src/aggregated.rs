use std::fmt;

use smallvec::SmallVec;

use crate::consistent::ConsistentHashingRouter;
use crate::destination::Destination;
use crate::error::RouteError;
use crate::router::{Destinations, Router};

/// One aggregation rule, as exposed by the relay's aggregation-rule manager.
///
/// A rule may rewrite a raw metric into the aggregate form it contributes
/// to (e.g. a rollup bucket), or return `None` if the metric does not match.
/// Implemented for plain functions and closures of the same shape.
pub trait AggregationRule: Send + Sync {
    /// Returns the aggregate form of `metric` under this rule, if any.
    fn aggregate_metric(&self, metric: &str) -> Option<String>;
}

impl<F> AggregationRule for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn aggregate_metric(&self, metric: &str) -> Option<String> {
        self(metric)
    }
}

/// Routes metrics by their aggregate forms.
///
/// A single raw metric can contribute to multiple independent aggregation
/// buckets (e.g. different rollup windows), each of which may hash to a
/// different destination. This router resolves the metric against *all*
/// aggregation rules in order — unlike relay rules, resolution does not stop
/// at the first match — and returns the deduplicated union of hash-routing
/// every resolved form, so the datapoint reaches every destination
/// responsible for at least one of its buckets.
///
/// A metric no rule aggregates is routed by its raw name and passes through
/// aggregation downstream unchanged.
pub struct AggregatedConsistentHashingRouter {
    hash_router: ConsistentHashingRouter,
    rules: Vec<Box<dyn AggregationRule>>,
}

impl AggregatedConsistentHashingRouter {
    /// Creates a router resolving metrics against `rules` in order and
    /// routing the resolved forms through `hash_router`.
    pub fn new(hash_router: ConsistentHashingRouter, rules: Vec<Box<dyn AggregationRule>>) -> Self {
        Self { hash_router, rules }
    }

    /// Returns the wrapped consistent hashing router.
    pub fn hash_router(&self) -> &ConsistentHashingRouter {
        &self.hash_router
    }
}

impl fmt::Debug for AggregatedConsistentHashingRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregatedConsistentHashingRouter")
            .field("hash_router", &self.hash_router)
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl Router for AggregatedConsistentHashingRouter {
    fn add_destination(&self, destination: Destination) -> Result<(), RouteError> {
        self.hash_router.add_destination(destination)
    }

    fn remove_destination(&self, destination: &Destination) -> Result<(), RouteError> {
        self.hash_router.remove_destination(destination)
    }

    fn destinations(&self, key: &str) -> Destinations {
        // Resolve the metric to its aggregate forms; a metric that will not
        // be aggregated is sent raw.
        let mut resolved: SmallVec<[String; 4]> = self
            .rules
            .iter()
            .filter_map(|rule| rule.aggregate_metric(key))
            .collect();
        if resolved.is_empty() {
            resolved.push(key.to_owned());
        }

        // Union over all forms, keeping first-seen order so repeated calls
        // with unchanged configuration return the same sequence.
        let mut out = Destinations::new();
        for form in &resolved {
            for destination in self.hash_router.destinations(form) {
                if !out.contains(&destination) {
                    out.push(destination);
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;
    use crate::consistent::ConsistentHashingConfig;

    fn hash_router() -> ConsistentHashingRouter {
        ConsistentHashingRouter::new(ConsistentHashingConfig {
            replication_factor: 1,
            diverse_replicas: true,
        })
    }

    fn populate(router: &impl Router) {
        for destination in ["cache01:2004:a", "cache02:2004:a", "cache03:2004:a"] {
            router.add_destination(destination.parse().unwrap()).unwrap();
        }
    }

    fn rollup(suffix: &'static str) -> Box<dyn AggregationRule> {
        Box::new(move |metric: &str| {
            metric
                .strip_suffix(".count")
                .map(|stem| format!("{stem}.{suffix}"))
        })
    }

    #[test]
    fn unaggregated_metrics_route_raw() {
        let aggregated = AggregatedConsistentHashingRouter::new(hash_router(), vec![rollup("1m")]);
        populate(&aggregated);

        let plain = hash_router();
        populate(&plain);

        let metric = "servers.web01.cpu.idle";
        assert_eq!(
            aggregated.destinations(metric).into_vec(),
            plain.destinations(metric).into_vec()
        );
    }

    #[test]
    fn resolved_form_routes_like_its_aggregate() {
        let aggregated = AggregatedConsistentHashingRouter::new(hash_router(), vec![rollup("1m")]);
        populate(&aggregated);

        let plain = hash_router();
        populate(&plain);

        assert_eq!(
            aggregated.destinations("requests.count").into_vec(),
            plain.destinations("requests.1m").into_vec()
        );
    }

    #[test]
    fn multiple_forms_union_their_destinations() {
        let aggregated = AggregatedConsistentHashingRouter::new(
            hash_router(),
            vec![rollup("1m"), rollup("5m"), rollup("1h")],
        );
        populate(&aggregated);

        let plain = hash_router();
        populate(&plain);

        let mut expected: Vec<Destination> = Vec::new();
        for form in ["requests.1m", "requests.5m", "requests.1h"] {
            for destination in plain.destinations(form) {
                if !expected.contains(&destination) {
                    expected.push(destination);
                }
            }
        }

        let union = aggregated.destinations("requests.count").into_vec();
        assert_eq!(union, expected);

        // The union is deduplicated.
        let mut sorted = union.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), union.len());
    }

    #[test]
    fn rules_that_do_not_match_contribute_nothing() {
        let never: Box<dyn AggregationRule> = Box::new(|_: &str| -> Option<String> { None });
        let aggregated = AggregatedConsistentHashingRouter::new(hash_router(), vec![never]);
        populate(&aggregated);

        let plain = hash_router();
        populate(&plain);

        assert_eq!(
            aggregated.destinations("foo.bar").into_vec(),
            plain.destinations("foo.bar").into_vec()
        );
    }

    #[test]
    fn mutation_is_delegated_to_the_inner_router() {
        let aggregated = AggregatedConsistentHashingRouter::new(hash_router(), Vec::new());
        populate(&aggregated);
        assert_eq!(aggregated.hash_router().destination_count(), 3);

        aggregated
            .remove_destination(&"cache01:2004:a".parse().unwrap())
            .unwrap();
        assert_eq!(aggregated.hash_router().destination_count(), 2);

        let err = aggregated
            .add_destination("cache02:9999:a".parse().unwrap())
            .unwrap_err();
        assert_eq!(
            err,
            RouteError::DuplicateDestination(
                "cache02:9999:a".parse::<Destination>().unwrap().identity()
            )
        );
    }
}
