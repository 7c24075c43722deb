use crate::store::TrustStore;
use serde::{Deserialize, Serialize};

/// Baseline weight applied to agents outside the trust horizon.
pub const FLOOR_WEIGHT: f32 = 0.1;

/// Per-hop weight falloff.
pub const HOP_FALLOFF: f32 = 0.2;

/// Distance-derived reputation for one agent, as consumed by reaction
/// aggregation and propagation gating.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reputation {
    pub visible: bool,
    pub distance: u32,
}

impl Reputation {
    /// The canonical weighting law. Consumers must apply exactly this
    /// formula for behavioral parity across nodes:
    /// `visible ? max(0.1, 1 - distance * 0.2) : 0.1`.
    pub fn weight(&self) -> f32 {
        if self.visible {
            (1.0 - self.distance as f32 * HOP_FALLOFF).max(FLOOR_WEIGHT)
        } else {
            FLOOR_WEIGHT
        }
    }
}

/// Resolve an agent's reputation from the local trust store.
pub fn compute_reputation(store: &TrustStore, id: &str) -> Reputation {
    let distance = store.graph_distance(id);
    Reputation {
        visible: distance <= store.max_hops(),
        distance,
    }
}
