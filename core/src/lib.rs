pub mod error;
pub mod graph;
pub mod identity;
pub mod signal;
pub mod storage;
pub mod store;
pub mod weighting;

pub use error::WeftResult as Result;
pub use error::{Error, WeftResult};
pub use graph::{GraphStats, HopDistanceCache, DEFAULT_MAX_HOPS, UNREACHABLE};
pub use identity::{parse_agent_id, AgentInfo, Identity, AGENT_ID_LEN};
pub use signal::{
    canonicalize, current_timestamp_ms, payload_hash, sign_edge, signable_message, verify,
    Attestation, CanonicalEdge, LocalWitness, TrustEdge, TrustSignal, Witness, TRUST_SIGNAL_TAG,
};
pub use storage::IdentityStorage;
pub use store::TrustStore;
pub use weighting::{compute_reputation, Reputation};
