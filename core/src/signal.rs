use crate::error::{Error, WeftResult};
use crate::identity::{parse_agent_id, Identity};
use ed25519_dalek::{Signature, Verifier};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Domain separation tag prepended to every signable trust message, so
/// a trust signature can never be replayed as a signature for another
/// message type in the protocol.
pub const TRUST_SIGNAL_TAG: &str = "weft-trust-v1:";

/// A directed trust fact at a point in time. Edges are append-only: a
/// revocation is a new edge with `revoked = true`, not an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustEdge {
    pub truster: String,
    pub trustee: String,
    pub weight: f32,
    pub timestamp: i64,
    #[serde(default)]
    pub revoked: bool,
}

/// Canonical hashable form of a trust edge.
///
/// Field declaration order is the hash contract: serde_json emits
/// struct fields in this exact order, and `revoked` appears only when
/// true. Absence, not `false`, is the canonical no-revocation encoding.
#[derive(Debug, Clone, Serialize)]
pub struct CanonicalEdge {
    pub truster: String,
    pub trustee: String,
    pub weight: f32,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked: Option<bool>,
}

impl CanonicalEdge {
    pub fn is_revocation(&self) -> bool {
        self.revoked == Some(true)
    }
}

/// Opaque timestamp attestation from an external witness. The engine
/// stores it alongside a signal and never interprets the proof bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attestation {
    pub hash: String,
    pub timestamp: i64,
    pub proof: String,
}

/// External witness capability producing "signed no later than"
/// attestations over a payload hash.
pub trait Witness {
    fn attest(&self, hash: &str) -> Attestation;
}

/// Wall-clock witness with an empty proof, for local use and tests.
/// Production nodes plug in a real timestamp service here.
#[derive(Debug, Default)]
pub struct LocalWitness;

impl Witness for LocalWitness {
    fn attest(&self, hash: &str) -> Attestation {
        Attestation {
            hash: hash.to_string(),
            timestamp: current_timestamp_ms(),
            proof: String::new(),
        }
    }
}

/// Wire form of a trust edge: the edge fields plus the canonical
/// payload hash, the truster's signature over it, and a witness
/// attestation. Receivers recompute the hash from the carried fields;
/// the carried hash is never trusted as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustSignal {
    pub truster: String,
    pub trustee: String,
    #[serde(default = "default_weight")]
    pub weight: f32,
    pub timestamp: i64,
    #[serde(default)]
    pub revoked: bool,
    pub hash: String,
    pub signature: String,
    pub proof: Attestation,
}

fn default_weight() -> f32 {
    1.0
}

impl TrustSignal {
    pub fn edge(&self) -> TrustEdge {
        TrustEdge {
            truster: self.truster.clone(),
            trustee: self.trustee.clone(),
            weight: self.weight,
            timestamp: self.timestamp,
            revoked: self.revoked,
        }
    }

    pub fn is_revocation(&self) -> bool {
        self.revoked || self.weight == 0.0
    }
}

/// Validate an edge and derive its canonical form.
///
/// Rejects rather than clamps: out-of-range weights and a `revoked`
/// flag set against a nonzero weight are caller errors.
pub fn canonicalize(edge: &TrustEdge) -> WeftResult<CanonicalEdge> {
    if !(0.0..=1.0).contains(&edge.weight) {
        return Err(Error::Validation(format!(
            "Trust weight {} outside [0, 1]",
            edge.weight
        )));
    }
    if edge.revoked && edge.weight != 0.0 {
        return Err(Error::Validation(
            "Revocation must carry zero weight".to_string(),
        ));
    }
    let is_revocation = edge.revoked || edge.weight == 0.0;
    Ok(CanonicalEdge {
        truster: edge.truster.clone(),
        trustee: edge.trustee.clone(),
        weight: edge.weight,
        timestamp: edge.timestamp,
        revoked: if is_revocation { Some(true) } else { None },
    })
}

/// SHA-256 of the canonical JSON encoding, as lowercase hex.
pub fn payload_hash(canonical: &CanonicalEdge) -> WeftResult<String> {
    let bytes = serde_json::to_vec(canonical)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// The domain-separated byte string that actually gets signed.
pub fn signable_message(hash: &str) -> Vec<u8> {
    let mut message = Vec::with_capacity(TRUST_SIGNAL_TAG.len() + hash.len());
    message.extend_from_slice(TRUST_SIGNAL_TAG.as_bytes());
    message.extend_from_slice(hash.as_bytes());
    message
}

/// Canonicalize, hash, and sign an edge with the local identity,
/// producing the wire signal. The truster field must match the signing
/// identity.
pub fn sign_edge(
    identity: &Identity,
    edge: &TrustEdge,
    witness: &dyn Witness,
) -> WeftResult<TrustSignal> {
    if edge.truster != identity.agent_id() {
        return Err(Error::Validation(
            "Edge truster does not match signing identity".to_string(),
        ));
    }
    let canonical = canonicalize(edge)?;
    let hash = payload_hash(&canonical)?;
    let signature = identity.sign(&signable_message(&hash));
    let proof = witness.attest(&hash);
    Ok(TrustSignal {
        truster: edge.truster.clone(),
        trustee: edge.trustee.clone(),
        weight: edge.weight,
        timestamp: edge.timestamp,
        revoked: canonical.is_revocation(),
        hash,
        signature: hex::encode(signature.to_bytes()),
        proof,
    })
}

/// Verify an inbound signal against its own fields.
///
/// Recomputes the canonical hash, compares it to the carried hash and
/// to the hash the witness attestation is bound to, then checks the
/// ed25519 signature using the key declared by the truster's agent
/// identifier. The proof bytes stay opaque; only their hash binding
/// is validated. Every malformed encoding maps to `false`; this
/// function never panics on untrusted input.
pub fn verify(signal: &TrustSignal) -> bool {
    let canonical = match canonicalize(&signal.edge()) {
        Ok(c) => c,
        Err(_) => return false,
    };
    let recomputed = match payload_hash(&canonical) {
        Ok(h) => h,
        Err(_) => return false,
    };
    if recomputed != signal.hash {
        return false;
    }
    if signal.proof.hash != recomputed {
        return false;
    }
    let key = match parse_agent_id(&signal.truster) {
        Some(k) => k,
        None => return false,
    };
    let sig_bytes = match hex::decode(&signal.signature) {
        Ok(b) => b,
        Err(_) => return false,
    };
    let signature = match Signature::from_slice(&sig_bytes) {
        Ok(s) => s,
        Err(_) => return false,
    };
    key.verify(&signable_message(&recomputed), &signature).is_ok()
}

pub fn current_timestamp_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(truster: &str, trustee: &str, weight: f32, revoked: bool) -> TrustEdge {
        TrustEdge {
            truster: truster.to_string(),
            trustee: trustee.to_string(),
            weight,
            timestamp: 1_700_000_000_000,
            revoked,
        }
    }

    fn signed(identity: &Identity, trustee: &str, weight: f32, revoked: bool) -> TrustSignal {
        let edge = edge(&identity.agent_id(), trustee, weight, revoked);
        sign_edge(identity, &edge, &LocalWitness).unwrap()
    }

    #[test]
    fn test_canonicalize_accepts_valid_weights() {
        assert!(canonicalize(&edge("a", "b", 0.0, false)).is_ok());
        assert!(canonicalize(&edge("a", "b", 0.5, false)).is_ok());
        assert!(canonicalize(&edge("a", "b", 1.0, false)).is_ok());
        assert!(canonicalize(&edge("a", "b", 0.0, true)).is_ok());
    }

    #[test]
    fn test_canonicalize_rejects_out_of_range() {
        assert!(canonicalize(&edge("a", "b", -0.1, false)).is_err());
        assert!(canonicalize(&edge("a", "b", 1.1, false)).is_err());
        assert!(canonicalize(&edge("a", "b", f32::NAN, false)).is_err());
    }

    #[test]
    fn test_canonicalize_rejects_revoked_with_weight() {
        assert!(canonicalize(&edge("a", "b", 0.5, true)).is_err());
    }

    #[test]
    fn test_zero_weight_derives_revocation() {
        let canonical = canonicalize(&edge("a", "b", 0.0, false)).unwrap();
        assert!(canonical.is_revocation());
    }

    #[test]
    fn test_revoked_false_omitted_from_canonical_payload() {
        let canonical = canonicalize(&edge("a", "b", 1.0, false)).unwrap();
        let json = serde_json::to_string(&canonical).unwrap();
        assert!(!json.contains("revoked"));

        let revocation = canonicalize(&edge("a", "b", 0.0, false)).unwrap();
        let json = serde_json::to_string(&revocation).unwrap();
        assert!(json.contains("\"revoked\":true"));
    }

    #[test]
    fn test_canonical_field_order() {
        let canonical = canonicalize(&edge("a", "b", 1.0, false)).unwrap();
        let json = serde_json::to_string(&canonical).unwrap();
        assert_eq!(
            json,
            "{\"truster\":\"a\",\"trustee\":\"b\",\"weight\":1.0,\"timestamp\":1700000000000}"
        );
    }

    #[test]
    fn test_sign_verify_round_trip() {
        let identity = Identity::generate().unwrap();
        let signal = signed(&identity, "b", 1.0, false);
        assert!(verify(&signal));
    }

    #[test]
    fn test_verify_revocation_round_trip() {
        let identity = Identity::generate().unwrap();
        let signal = signed(&identity, "b", 0.0, true);
        assert!(signal.is_revocation());
        assert!(verify(&signal));
    }

    #[test]
    fn test_tampered_fields_fail_verification() {
        let identity = Identity::generate().unwrap();
        let other = Identity::generate().unwrap();

        let mut tampered = signed(&identity, "b", 0.8, false);
        tampered.trustee = "c".to_string();
        assert!(!verify(&tampered));

        let mut tampered = signed(&identity, "b", 0.8, false);
        tampered.weight = 0.9;
        assert!(!verify(&tampered));

        let mut tampered = signed(&identity, "b", 0.8, false);
        tampered.timestamp += 1;
        assert!(!verify(&tampered));

        let mut tampered = signed(&identity, "b", 0.8, false);
        tampered.truster = other.agent_id();
        assert!(!verify(&tampered));
    }

    #[test]
    fn test_rebound_attestation_fails_verification() {
        let identity = Identity::generate().unwrap();
        let mut signal = signed(&identity, "b", 1.0, false);
        signal.proof.hash = "00".repeat(32);
        assert!(!verify(&signal));
    }

    #[test]
    fn test_carried_hash_is_never_trusted() {
        let identity = Identity::generate().unwrap();
        let mut signal = signed(&identity, "b", 1.0, false);
        signal.hash = "00".repeat(32);
        assert!(!verify(&signal));
    }

    #[test]
    fn test_malformed_signature_yields_false() {
        let identity = Identity::generate().unwrap();
        let mut signal = signed(&identity, "b", 1.0, false);
        signal.signature = "not hex".to_string();
        assert!(!verify(&signal));

        let mut signal = signed(&identity, "b", 1.0, false);
        signal.signature = "ab".to_string();
        assert!(!verify(&signal));
    }

    #[test]
    fn test_unparseable_truster_key_yields_false() {
        let identity = Identity::generate().unwrap();
        let mut signal = signed(&identity, "b", 1.0, false);
        signal.truster = "nobody".to_string();
        // Hash no longer matches either, so rebuild it (and the proof
        // binding) to isolate the key parse path.
        let canonical = canonicalize(&signal.edge()).unwrap();
        signal.hash = payload_hash(&canonical).unwrap();
        signal.proof.hash = signal.hash.clone();
        assert!(!verify(&signal));
    }

    #[test]
    fn test_signature_domain_separation() {
        let identity = Identity::generate().unwrap();
        let signal = signed(&identity, "b", 1.0, false);
        // A signature over the bare hash must not verify as a trust
        // signal, and vice versa.
        let bare = identity.sign(signal.hash.as_bytes());
        assert!(!identity.verify(&signable_message(&signal.hash), &bare));
    }

    #[test]
    fn test_sign_edge_rejects_foreign_truster() {
        let identity = Identity::generate().unwrap();
        let foreign = edge("someone-else", "b", 1.0, false);
        assert!(sign_edge(&identity, &foreign, &LocalWitness).is_err());
    }

    #[test]
    fn test_attestation_binds_hash() {
        let identity = Identity::generate().unwrap();
        let signal = signed(&identity, "b", 1.0, false);
        assert_eq!(signal.proof.hash, signal.hash);
    }

    #[test]
    fn test_wire_defaults() {
        let identity = Identity::generate().unwrap();
        let signal = signed(&identity, "b", 1.0, false);

        // A wire signal may omit weight (defaults to 1.0) and revoked
        // (defaults to false); the recomputed hash must still match.
        let mut value: serde_json::Value = serde_json::to_value(&signal).unwrap();
        let obj = value.as_object_mut().unwrap();
        obj.remove("weight");
        obj.remove("revoked");

        let parsed: TrustSignal = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.weight, 1.0);
        assert!(!parsed.revoked);
        assert!(verify(&parsed));
    }
}
