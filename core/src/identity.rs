use crate::error::{Error, WeftResult};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length in characters of a hex-encoded agent identifier
/// (32-byte ed25519 public key).
pub const AGENT_ID_LEN: usize = 64;

#[derive(Debug, Clone)]
pub struct Identity {
    signing_key: SigningKey,
    display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInfo {
    pub agent_id: String,
    pub display_name: Option<String>,
}

impl Identity {
    pub fn generate() -> WeftResult<Self> {
        let signing_key = SigningKey::generate(&mut OsRng);
        Ok(Self {
            signing_key,
            display_name: None,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> WeftResult<Self> {
        let signing_key = SigningKey::from_bytes(
            bytes
                .try_into()
                .map_err(|_| Error::Identity("Invalid key bytes".to_string()))?,
        );
        Ok(Self {
            signing_key,
            display_name: None,
        })
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// The agent identifier: lowercase hex of the 32-byte public key.
    pub fn agent_id(&self) -> String {
        hex::encode(self.signing_key.verifying_key().as_bytes())
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn set_display_name(&mut self, name: String) {
        self.display_name = Some(name);
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        self.signing_key
            .verifying_key()
            .verify(message, signature)
            .is_ok()
    }

    pub fn to_agent_info(&self) -> AgentInfo {
        AgentInfo {
            agent_id: self.agent_id(),
            display_name: self.display_name.clone(),
        }
    }
}

/// Parse a hex agent identifier back into a verifying key.
///
/// Returns `None` on any malformed encoding: wrong length, bad hex,
/// or bytes that are not a valid ed25519 point.
pub fn parse_agent_id(agent_id: &str) -> Option<VerifyingKey> {
    if agent_id.len() != AGENT_ID_LEN {
        return None;
    }
    let bytes = hex::decode(agent_id).ok()?;
    let arr: [u8; 32] = bytes.try_into().ok()?;
    VerifyingKey::from_bytes(&arr).ok()
}

impl AgentInfo {
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.agent_id.as_bytes());
        let hash = hasher.finalize();
        let hex = hex::encode(&hash[..8]);
        hex.chars()
            .collect::<Vec<_>>()
            .chunks(4)
            .map(|c| c.iter().collect::<String>())
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase()
    }
}
