use crate::error::{Error, WeftResult};
use crate::graph::{EdgeCallback, GraphStats, HopDistanceCache, DEFAULT_MAX_HOPS};
use crate::signal::{self, TrustEdge, TrustSignal};
use std::collections::{HashMap, HashSet};

/// One local identity's view of the trust graph.
///
/// Owns the direct-trust set and the shared hop-distance cache, and
/// mediates between local intent (`trust`/`untrust`) and inbound
/// network signals (`admit`/`handle_incoming_trust`). All mutations
/// take `&mut self` and leave the distance index fully recomputed
/// before returning; callers sharing a store across threads wrap the
/// whole store in a single `Mutex`.
pub struct TrustStore {
    agent_id: String,
    pending_requests: HashSet<String>,
    cache: HopDistanceCache,
}

impl TrustStore {
    pub fn new(agent_id: String) -> Self {
        Self::with_max_hops(agent_id, DEFAULT_MAX_HOPS)
    }

    pub fn with_max_hops(agent_id: String, max_hops: u32) -> Self {
        Self {
            agent_id,
            pending_requests: HashSet::new(),
            cache: HopDistanceCache::with_direct_trust(max_hops, HashSet::new()),
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn set_edge_callback(&mut self, callback: EdgeCallback) {
        self.cache.set_edge_callback(callback);
    }

    /// Add `id` to the direct-trust set. Idempotent. The weight is
    /// validated but only membership is retained; per-edge local
    /// weight would be an explicit entity-model extension.
    pub fn trust(&mut self, id: &str, weight: f32) -> WeftResult<()> {
        if !(0.0..=1.0).contains(&weight) {
            return Err(Error::Validation(format!(
                "Trust weight {} outside [0, 1]",
                weight
            )));
        }
        if id == self.agent_id {
            return Err(Error::Validation("Cannot trust own identity".to_string()));
        }
        self.pending_requests.remove(id);
        let mut direct = self.cache.direct_trust().clone();
        if direct.insert(id.to_string()) {
            tracing::info!(id, "direct trust added");
            self.cache.update_direct_trust(direct);
        }
        Ok(())
    }

    /// Remove `id` from the direct-trust set. Absent ids are a no-op.
    pub fn untrust(&mut self, id: &str) {
        let mut direct = self.cache.direct_trust().clone();
        if direct.remove(id) {
            tracing::info!(id, "direct trust removed");
            self.cache.update_direct_trust(direct);
        }
    }

    /// Direct-trust membership only (hop 1), independent of the wider
    /// cache.
    pub fn is_trusted(&self, id: &str) -> bool {
        self.cache.direct_trust().contains(id)
    }

    /// Minimal graph distance to `target`: 0 for self, 1 for direct
    /// trust, otherwise the bounded multi-hop BFS distance from the
    /// cache, up to `max_hops`.
    pub fn graph_distance(&self, target: &str) -> u32 {
        if target == self.agent_id {
            return 0;
        }
        self.cache.calculate_hop_distance(target)
    }

    pub fn calculate_hop_distance(&self, id: &str) -> u32 {
        self.cache.calculate_hop_distance(id)
    }

    pub fn is_within_max_hops(&self, id: &str) -> bool {
        self.cache.is_within_max_hops(id)
    }

    pub fn max_hops(&self) -> u32 {
        self.cache.max_hops()
    }

    /// Verify and admit a gossiped signal into the adjacency index.
    ///
    /// Fails closed: a signal that does not verify is rejected with a
    /// reason and leaves no trace in any index. Revocations remove the
    /// edge instead of inserting it; signals addressed to the local
    /// identity additionally run the inbound-trust policy.
    pub fn admit(&mut self, signal: &TrustSignal) -> WeftResult<()> {
        if !signal::verify(signal) {
            tracing::warn!(
                truster = %signal.truster,
                trustee = %signal.trustee,
                "trust signal rejected: verification failed"
            );
            return Err(Error::Verification(
                "Signature or payload hash did not verify".to_string(),
            ));
        }

        if signal.trustee == self.agent_id {
            self.handle_incoming_trust(signal);
        }

        if signal.is_revocation() {
            self.cache.remove_edge(&signal.truster, &signal.trustee);
        } else {
            self.cache.update_caches(&signal.truster, &signal.trustee);
        }
        Ok(())
    }

    /// Apply the inbound-trust policy for a signal addressed to the
    /// local identity. Signals addressed elsewhere are ignored.
    ///
    /// A revocation from a directly-trusted truster removes them from
    /// the direct-trust set. A new trust signal never triggers an
    /// automatic reciprocal trust; it lands in the pending-request set
    /// for an explicit consent step. The return value reports whether
    /// an auto-follow-back occurred, which under the current policy is
    /// always `false`.
    pub fn handle_incoming_trust(&mut self, signal: &TrustSignal) -> bool {
        if signal.trustee != self.agent_id {
            return false;
        }

        if signal.is_revocation() {
            self.pending_requests.remove(&signal.truster);
            if self.is_trusted(&signal.truster) {
                tracing::info!(truster = %signal.truster, "revoked by trusted agent, unfollowing");
                self.untrust(&signal.truster);
            }
            return false;
        }

        if !self.is_trusted(&signal.truster) {
            tracing::debug!(truster = %signal.truster, "inbound trust held as pending request");
            self.pending_requests.insert(signal.truster.clone());
        }
        false
    }

    pub fn pending_requests(&self) -> &HashSet<String> {
        &self.pending_requests
    }

    /// Consent step: promote a pending inbound trust request to a
    /// direct trust.
    pub fn accept_request(&mut self, id: &str) -> WeftResult<()> {
        if !self.pending_requests.remove(id) {
            return Err(Error::NotFound(format!(
                "No pending trust request from {}",
                id
            )));
        }
        self.trust(id, 1.0)
    }

    /// Discard a pending inbound trust request. Absent ids are a no-op.
    pub fn reject_request(&mut self, id: &str) {
        self.pending_requests.remove(id);
    }

    /// Flat pending-request list, for persistence across restarts.
    pub fn export_pending_requests(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.pending_requests.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Replace the pending-request set. Already-trusted agents and the
    /// local identity are dropped.
    pub fn import_pending_requests(&mut self, ids: Vec<String>) {
        self.pending_requests = ids
            .into_iter()
            .filter(|id| *id != self.agent_id && !self.is_trusted(id))
            .collect();
    }

    /// Flat direct-trust membership list, for bootstrap and backup.
    pub fn export_trust_graph(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.cache.direct_trust().iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Replace (not merge) the direct-trust membership list.
    pub fn import_trust_graph(&mut self, ids: Vec<String>) {
        let direct: HashSet<String> = ids
            .into_iter()
            .filter(|id| *id != self.agent_id)
            .collect();
        tracing::info!(count = direct.len(), "direct trust graph imported");
        self.cache.update_direct_trust(direct);
    }

    /// Replace the whole adjacency index from persisted edges.
    pub fn rebuild_from_signals(&mut self, edges: &[TrustEdge]) {
        self.cache.rebuild_from_signals(edges);
    }

    /// Cold-start bootstrap from a persisted signal log.
    ///
    /// Edges are facts in time order: a later revocation cancels the
    /// matching edge, so the rebuilt index is identical to the state
    /// after incremental admission of the same log. Unverifiable
    /// entries are skipped. Direct-trust and pending-request sets are
    /// restored from their own persisted exports, not replayed here.
    pub fn bootstrap_from_log(&mut self, signals: &[TrustSignal]) {
        let mut net: HashMap<(String, String), TrustEdge> = HashMap::new();
        for s in signals {
            if !signal::verify(s) {
                tracing::warn!(
                    truster = %s.truster,
                    trustee = %s.trustee,
                    "skipping unverifiable signal in persisted log"
                );
                continue;
            }
            let key = (s.truster.clone(), s.trustee.clone());
            if s.is_revocation() {
                net.remove(&key);
            } else {
                net.insert(key, s.edge());
            }
        }
        let edges: Vec<TrustEdge> = net.into_values().collect();
        self.cache.rebuild_from_signals(&edges);
    }

    pub fn stats(&self) -> GraphStats {
        self.cache.stats()
    }
}
