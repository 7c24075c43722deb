use crate::signal::TrustEdge;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Sentinel distance for agents not reachable within `max_hops`.
pub const UNREACHABLE: u32 = 999;

/// Default trust horizon.
pub const DEFAULT_MAX_HOPS: u32 = 3;

/// Invoked with `(truster, trustee)` exactly once per previously-unseen
/// directed edge, so gossip layers can decide further propagation.
pub type EdgeCallback = Box<dyn Fn(&str, &str) + Send>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStats {
    pub adjacency_size: usize,
    pub cache_size: usize,
    pub direct_trust_size: usize,
}

/// Directed adjacency index over all admitted trust edges, with a
/// derived map from agent id to minimal hop count from the local
/// direct-trust set.
///
/// The distance map is pure cache: it holds no independent truth and
/// is rebuilt in full from the direct-trust set and the adjacency
/// index after every mutation. Recompute cost is bounded by the
/// horizon, queries are O(1), which is the right trade for this
/// system's mutation:query ratio.
pub struct HopDistanceCache {
    max_hops: u32,
    direct_trust: HashSet<String>,
    adjacency: HashMap<String, HashSet<String>>,
    distances: HashMap<String, u32>,
    on_new_edge: Option<EdgeCallback>,
}

impl HopDistanceCache {
    pub fn new(max_hops: u32) -> Self {
        Self {
            max_hops,
            direct_trust: HashSet::new(),
            adjacency: HashMap::new(),
            distances: HashMap::new(),
            on_new_edge: None,
        }
    }

    pub fn with_direct_trust(max_hops: u32, direct_trust: HashSet<String>) -> Self {
        let mut cache = Self::new(max_hops);
        cache.direct_trust = direct_trust;
        cache.recompute();
        cache
    }

    pub fn set_edge_callback(&mut self, callback: EdgeCallback) {
        self.on_new_edge = Some(callback);
    }

    pub fn max_hops(&self) -> u32 {
        self.max_hops
    }

    /// Insert a directed edge and recompute. Fires the edge callback
    /// only if the edge was not already present.
    pub fn update_caches(&mut self, truster: &str, trustee: &str) {
        let inserted = self
            .adjacency
            .entry(truster.to_string())
            .or_default()
            .insert(trustee.to_string());

        if inserted {
            tracing::debug!(truster, trustee, "new trust edge admitted");
            if let Some(callback) = &self.on_new_edge {
                callback(truster, trustee);
            }
        }

        self.recompute();
    }

    /// Delete a directed edge, dropping the truster's adjacency entry
    /// if it becomes empty, and recompute.
    pub fn remove_edge(&mut self, truster: &str, trustee: &str) {
        if let Some(trustees) = self.adjacency.get_mut(truster) {
            trustees.remove(trustee);
            if trustees.is_empty() {
                self.adjacency.remove(truster);
            }
        }
        self.recompute();
    }

    /// Minimal hop count for `id`: 1 for direct trust, the cached BFS
    /// distance for hops 2..=max_hops, otherwise [`UNREACHABLE`].
    ///
    /// The local identity itself (distance 0) is distinguished by the
    /// caller before this is consulted.
    pub fn calculate_hop_distance(&self, id: &str) -> u32 {
        if self.direct_trust.contains(id) {
            return 1;
        }
        self.distances.get(id).copied().unwrap_or(UNREACHABLE)
    }

    pub fn is_within_max_hops(&self, id: &str) -> bool {
        self.calculate_hop_distance(id) <= self.max_hops
    }

    /// Atomically replace the hop-1 set and recompute.
    pub fn update_direct_trust(&mut self, direct_trust: HashSet<String>) {
        self.direct_trust = direct_trust;
        self.recompute();
    }

    pub fn direct_trust(&self) -> &HashSet<String> {
        &self.direct_trust
    }

    /// Replace the entire adjacency index from an edge collection and
    /// recompute. Used for cold-start bootstrap from persisted edges.
    ///
    /// The edge callback stays exactly-once per cache lifetime: on a
    /// cold start every unique edge fires, matching an incremental
    /// replay from empty, while a warm rebuild fires only for edges
    /// the index had not seen before.
    pub fn rebuild_from_signals(&mut self, edges: &[TrustEdge]) {
        let previous = std::mem::take(&mut self.adjacency);
        for edge in edges {
            let inserted = self
                .adjacency
                .entry(edge.truster.clone())
                .or_default()
                .insert(edge.trustee.clone());
            let already_seen = previous
                .get(&edge.truster)
                .is_some_and(|trustees| trustees.contains(&edge.trustee));
            if inserted && !already_seen {
                if let Some(callback) = &self.on_new_edge {
                    callback(&edge.truster, &edge.trustee);
                }
            }
        }
        self.recompute();
        tracing::info!(
            edges = edges.len(),
            reachable = self.distances.len(),
            "adjacency index rebuilt"
        );
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            adjacency_size: self.adjacency.values().map(|t| t.len()).sum(),
            cache_size: self.distances.len(),
            direct_trust_size: self.direct_trust.len(),
        }
    }

    /// Multi-source BFS seeded from every direct-trust node at
    /// distance 1, expanding until `max_hops`. A single global visited
    /// set keeps the traversal correct and terminating on cycles;
    /// BFS layering makes the first assignment the minimal one.
    fn recompute(&mut self) {
        self.distances.clear();

        let mut visited: HashSet<String> = self.direct_trust.clone();
        let mut queue: VecDeque<(String, u32)> = self
            .direct_trust
            .iter()
            .map(|id| (id.clone(), 1))
            .collect();

        while let Some((id, distance)) = queue.pop_front() {
            if distance >= self.max_hops {
                continue;
            }
            if let Some(trustees) = self.adjacency.get(&id) {
                for trustee in trustees {
                    if visited.insert(trustee.clone()) {
                        self.distances.insert(trustee.clone(), distance + 1);
                        queue.push_back((trustee.clone(), distance + 1));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn direct(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn edge(truster: &str, trustee: &str) -> TrustEdge {
        TrustEdge {
            truster: truster.to_string(),
            trustee: trustee.to_string(),
            weight: 1.0,
            timestamp: 0,
            revoked: false,
        }
    }

    #[test]
    fn test_direct_trust_is_hop_one() {
        let cache = HopDistanceCache::with_direct_trust(3, direct(&["b"]));
        assert_eq!(cache.calculate_hop_distance("b"), 1);
        assert_eq!(cache.calculate_hop_distance("z"), UNREACHABLE);
    }

    #[test]
    fn test_distance_ladder_with_horizon() {
        // maxHops=3, direct {B}, edges B->C, C->D, D->E.
        let mut cache = HopDistanceCache::with_direct_trust(3, direct(&["b"]));
        cache.update_caches("b", "c");
        cache.update_caches("c", "d");
        cache.update_caches("d", "e");

        assert_eq!(cache.calculate_hop_distance("b"), 1);
        assert_eq!(cache.calculate_hop_distance("c"), 2);
        assert_eq!(cache.calculate_hop_distance("d"), 3);
        assert_eq!(cache.calculate_hop_distance("e"), UNREACHABLE);

        assert!(cache.is_within_max_hops("d"));
        assert!(!cache.is_within_max_hops("e"));
    }

    #[test]
    fn test_redundant_path_survives_edge_removal() {
        // A's perspective: direct {B, D}, B->C and D->C.
        let mut cache = HopDistanceCache::with_direct_trust(3, direct(&["b", "d"]));
        cache.update_caches("b", "c");
        cache.update_caches("d", "c");
        assert_eq!(cache.calculate_hop_distance("c"), 2);

        cache.remove_edge("b", "c");
        assert_eq!(cache.calculate_hop_distance("c"), 2);

        cache.remove_edge("d", "c");
        assert_eq!(cache.calculate_hop_distance("c"), UNREACHABLE);
    }

    #[test]
    fn test_cycle_terminates_with_minimal_distances() {
        let mut cache = HopDistanceCache::with_direct_trust(3, direct(&["b"]));
        cache.update_caches("b", "c");
        cache.update_caches("c", "b");
        cache.update_caches("c", "d");
        cache.update_caches("d", "b");

        assert_eq!(cache.calculate_hop_distance("b"), 1);
        assert_eq!(cache.calculate_hop_distance("c"), 2);
        assert_eq!(cache.calculate_hop_distance("d"), 3);
    }

    #[test]
    fn test_direct_node_never_demoted_by_longer_path() {
        let mut cache = HopDistanceCache::with_direct_trust(3, direct(&["b", "c"]));
        cache.update_caches("b", "c");
        assert_eq!(cache.calculate_hop_distance("c"), 1);
    }

    #[test]
    fn test_update_direct_trust_replaces_seeds() {
        let mut cache = HopDistanceCache::with_direct_trust(3, direct(&["b"]));
        cache.update_caches("b", "c");
        assert_eq!(cache.calculate_hop_distance("c"), 2);

        cache.update_direct_trust(direct(&["x"]));
        assert_eq!(cache.calculate_hop_distance("b"), UNREACHABLE);
        assert_eq!(cache.calculate_hop_distance("c"), UNREACHABLE);
        assert_eq!(cache.calculate_hop_distance("x"), 1);
    }

    #[test]
    fn test_edge_callback_fires_once_per_new_edge() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();

        let mut cache = HopDistanceCache::with_direct_trust(3, direct(&["b"]));
        cache.set_edge_callback(Box::new(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        cache.update_caches("b", "c");
        cache.update_caches("b", "c");
        cache.update_caches("c", "d");

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_warm_rebuild_fires_callback_only_for_unseen_edges() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();

        let mut cache = HopDistanceCache::with_direct_trust(3, direct(&["b"]));
        cache.set_edge_callback(Box::new(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        cache.update_caches("b", "c");
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Warm rebuild over a log containing the known edge plus a
        // new one: only the new edge announces.
        cache.rebuild_from_signals(&[edge("b", "c"), edge("c", "d")]);
        assert_eq!(count.load(Ordering::SeqCst), 2);

        // Rebuilding the same log again announces nothing.
        cache.rebuild_from_signals(&[edge("b", "c"), edge("c", "d")]);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_bulk_rebuild_matches_incremental() {
        let edges = vec![
            edge("b", "c"),
            edge("c", "d"),
            edge("d", "e"),
            edge("b", "e"),
        ];

        let mut incremental = HopDistanceCache::with_direct_trust(3, direct(&["b"]));
        for e in &edges {
            incremental.update_caches(&e.truster, &e.trustee);
        }

        // Reversed ordering through the bulk path must agree.
        let mut reversed = edges.clone();
        reversed.reverse();
        let mut bulk = HopDistanceCache::with_direct_trust(3, direct(&["b"]));
        bulk.rebuild_from_signals(&reversed);

        for id in ["b", "c", "d", "e", "z"] {
            assert_eq!(
                incremental.calculate_hop_distance(id),
                bulk.calculate_hop_distance(id),
                "distance mismatch for {}",
                id
            );
        }
    }

    #[test]
    fn test_remove_edge_drops_empty_adjacency_entry() {
        let mut cache = HopDistanceCache::with_direct_trust(3, direct(&["b"]));
        cache.update_caches("b", "c");
        assert_eq!(cache.stats().adjacency_size, 1);

        cache.remove_edge("b", "c");
        let stats = cache.stats();
        assert_eq!(stats.adjacency_size, 0);
        assert_eq!(stats.cache_size, 0);
    }

    #[test]
    fn test_stats_counts() {
        let mut cache = HopDistanceCache::with_direct_trust(3, direct(&["a", "b"]));
        cache.update_caches("a", "c");
        cache.update_caches("b", "c");
        cache.update_caches("c", "d");

        let stats = cache.stats();
        assert_eq!(stats.adjacency_size, 3);
        assert_eq!(stats.direct_trust_size, 2);
        // c at hop 2, d at hop 3.
        assert_eq!(stats.cache_size, 2);
    }
}
