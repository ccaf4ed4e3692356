use std::borrow::Cow;

/// Number of points each node occupies on the ring unless overridden.
///
/// More points smooth out the key distribution between nodes at the cost of
/// slower membership changes. 100 matches carbon's ring.
pub const DEFAULT_REPLICA_COUNT: usize = 100;

/// A value that can be placed on a [`ConsistentHashRing`].
///
/// `ring_key` must be stable for the lifetime of the node and unique within
/// one ring; it determines the node's point positions. `Ord` breaks ties
/// between nodes that land on the same ring position, which keeps the walk
/// order identical across independently built rings.
pub trait RingNode: Clone + Ord {
    /// Returns the stable identity string hashed into ring positions.
    fn ring_key(&self) -> Cow<'_, str>;
}

impl RingNode for String {
    fn ring_key(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl RingNode for (String, String) {
    fn ring_key(&self) -> Cow<'_, str> {
        Cow::Owned(format!("{}:{}", self.0, self.1))
    }
}

/// A consistent hash ring over a set of nodes.
///
/// Every node is hashed to [`DEFAULT_REPLICA_COUNT`] positions on a 16-bit
/// circle. For a key, [`nodes_for`](Self::nodes_for) walks the circle from
/// the key's own position and yields each distinct node once, in decreasing
/// preference. The first yielded node owns the key; subsequent nodes are the
/// replica candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistentHashRing<N: RingNode> {
    /// Ring points, sorted by `(position, node)`.
    entries: Vec<(u16, N)>,
    /// Distinct nodes, sorted. Kept alongside `entries` for cheap membership
    /// checks and to know when a ring walk is exhausted.
    nodes: Vec<N>,
    replica_count: usize,
}

impl<N: RingNode> Default for ConsistentHashRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: RingNode> ConsistentHashRing<N> {
    /// Creates an empty ring with the default number of points per node.
    pub fn new() -> Self {
        Self::with_replica_count(DEFAULT_REPLICA_COUNT)
    }

    /// Creates an empty ring with `replica_count` points per node.
    ///
    /// `replica_count` must be at least 1; smaller values are clamped.
    pub fn with_replica_count(replica_count: usize) -> Self {
        Self {
            entries: Vec::new(),
            nodes: Vec::new(),
            replica_count: replica_count.max(1),
        }
    }

    /// Returns the number of distinct nodes on the ring.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the total number of points on the ring.
    pub fn point_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the ring holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns `true` if `node` is on the ring.
    pub fn contains(&self, node: &N) -> bool {
        self.nodes.binary_search(node).is_ok()
    }

    /// Places `node` on the ring. Adding a node that is already present is
    /// a no-op.
    pub fn add_node(&mut self, node: N) {
        let slot = match self.nodes.binary_search(&node) {
            Ok(_) => return,
            Err(slot) => slot,
        };

        let key = node.ring_key();
        for point in 0..self.replica_count {
            let position = ring_position(format!("{key}:{point}").as_bytes());
            let entry = (position, node.clone());
            let index = match self.entries.binary_search(&entry) {
                Ok(index) | Err(index) => index,
            };
            self.entries.insert(index, entry);
        }

        self.nodes.insert(slot, node);
    }

    /// Removes `node` and all of its points from the ring. Removing a node
    /// that is not present is a no-op.
    pub fn remove_node(&mut self, node: &N) {
        let Ok(slot) = self.nodes.binary_search(node) else {
            return;
        };

        self.nodes.remove(slot);
        self.entries.retain(|(_, n)| n != node);
    }

    /// Returns all nodes ordered by decreasing preference for `key`.
    ///
    /// The order is a deterministic total order over the current node set:
    /// stable across calls while membership is unchanged, and the order of
    /// surviving nodes is preserved when a node is removed.
    pub fn nodes_for<'a>(&'a self, key: &str) -> NodesFor<'a, N> {
        let position = ring_position(key.as_bytes());
        let start = self
            .entries
            .partition_point(|(point, _)| *point < position);

        NodesFor {
            entries: &self.entries,
            start,
            offset: 0,
            seen: Vec::new(),
            remaining: self.nodes.len(),
        }
    }

    /// Returns the node that owns `key`, or `None` if the ring is empty.
    pub fn get_node(&self, key: &str) -> Option<&N> {
        self.nodes_for(key).next()
    }
}

/// Iterator over ring nodes in decreasing preference for one key.
///
/// Returned by [`ConsistentHashRing::nodes_for`]. Walks the point list from
/// the key's ring position, wrapping at the end, and yields each distinct
/// node the first time one of its points is encountered.
#[derive(Debug)]
pub struct NodesFor<'a, N: RingNode> {
    entries: &'a [(u16, N)],
    start: usize,
    offset: usize,
    seen: Vec<&'a N>,
    remaining: usize,
}

impl<'a, N: RingNode> Iterator for NodesFor<'a, N> {
    type Item = &'a N;

    fn next(&mut self) -> Option<&'a N> {
        let entries = self.entries;
        while self.remaining > 0 {
            let index = (self.start + self.offset) % entries.len();
            let (_, node) = &entries[index];
            self.offset += 1;

            if !self.seen.contains(&node) {
                self.seen.push(node);
                self.remaining -= 1;
                return Some(node);
            }
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// Maps arbitrary bytes onto the 16-bit ring circle.
fn ring_position(bytes: &[u8]) -> u16 {
    let digest = md5::compute(bytes);
    u16::from_be_bytes([digest[0], digest[1]])
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    fn ring_of(nodes: &[&str]) -> ConsistentHashRing<String> {
        let mut ring = ConsistentHashRing::new();
        for node in nodes {
            ring.add_node((*node).to_owned());
        }
        ring
    }

    fn order(ring: &ConsistentHashRing<String>, key: &str) -> Vec<String> {
        ring.nodes_for(key).cloned().collect()
    }

    #[test]
    fn empty_ring_yields_nothing() {
        let ring: ConsistentHashRing<String> = ConsistentHashRing::new();
        assert_eq!(ring.nodes_for("some.metric").count(), 0);
        assert_eq!(ring.get_node("some.metric"), None);
    }

    #[test]
    fn yields_every_node_exactly_once() {
        let ring = ring_of(&["a", "b", "c", "d"]);

        for key in ["foo", "carbon.agents.one", "x"] {
            let mut nodes = order(&ring, key);
            assert_eq!(nodes.len(), 4);
            nodes.sort();
            assert_eq!(nodes, ["a", "b", "c", "d"]);
        }
    }

    #[test]
    fn order_is_stable_across_calls() {
        let ring = ring_of(&["a", "b", "c"]);
        assert_eq!(order(&ring, "foo.bar"), order(&ring, "foo.bar"));
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let forward = ring_of(&["a", "b", "c", "d"]);
        let reverse = ring_of(&["d", "c", "b", "a"]);

        assert_eq!(forward, reverse);
        for key in ["foo", "bar", "metrics.cpu.idle"] {
            assert_eq!(order(&forward, key), order(&reverse, key));
        }
    }

    #[test]
    fn removal_preserves_survivor_order() {
        let mut ring = ring_of(&["a", "b", "c", "d"]);

        for key in ["foo", "bar", "servers.web01.load"] {
            let before: Vec<String> = order(&ring, key)
                .into_iter()
                .filter(|node| node != "b")
                .collect();

            let mut removed = ring.clone();
            removed.remove_node(&"b".to_owned());
            assert_eq!(order(&removed, key), before);
        }

        ring.remove_node(&"b".to_owned());
        assert_eq!(ring.node_count(), 3);
        assert!(!ring.contains(&"b".to_owned()));
    }

    #[test]
    fn add_then_remove_restores_the_ring() {
        let mut ring = ring_of(&["a", "b"]);
        let snapshot = ring.clone();

        ring.add_node("c".to_owned());
        assert_eq!(ring.node_count(), 3);
        ring.remove_node(&"c".to_owned());

        assert_eq!(ring, snapshot);
    }

    #[test]
    fn duplicate_add_is_a_noop() {
        let mut ring = ring_of(&["a", "b"]);
        let points = ring.point_count();

        ring.add_node("a".to_owned());
        assert_eq!(ring.node_count(), 2);
        assert_eq!(ring.point_count(), points);
    }

    #[test]
    fn removing_a_missing_node_is_a_noop() {
        let mut ring = ring_of(&["a"]);
        ring.remove_node(&"nope".to_owned());
        assert_eq!(ring.node_count(), 1);
    }

    #[test]
    fn replica_count_is_clamped_to_one() {
        let mut ring: ConsistentHashRing<String> = ConsistentHashRing::with_replica_count(0);
        ring.add_node("a".to_owned());
        assert_eq!(ring.point_count(), 1);
    }

    #[test]
    fn get_node_is_the_head_of_the_order() {
        let ring = ring_of(&["a", "b", "c"]);
        for key in ["foo", "bar", "baz"] {
            assert_eq!(ring.get_node(key), ring.nodes_for(key).next());
        }
    }
}
