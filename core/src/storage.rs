use crate::error::{Error, WeftResult};
use crate::identity::Identity;
use crate::signal::TrustSignal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const IDENTITY_FILE: &str = "identity.bin";
const SIGNALS_FILE: &str = "signals.json";
const TRUST_GRAPH_FILE: &str = "trust_graph.json";
const PENDING_FILE: &str = "pending_requests.json";

#[derive(Serialize, Deserialize)]
struct StoredIdentity {
    key_bytes: [u8; 32],
    display_name: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct ExportedIdentity {
    pub agent_id: String,
    pub key_bytes: String,
    pub display_name: Option<String>,
}

/// Durable storage boundary for the local identity and the admitted
/// signal log. The engine structs never touch disk themselves; node
/// startup loads here and feeds `rebuild_from_signals`.
pub struct IdentityStorage {
    config_dir: PathBuf,
}

impl IdentityStorage {
    pub fn new() -> WeftResult<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Storage("Cannot determine config directory".to_string()))?
            .join("weft");

        Self::with_path(config_dir)
    }

    pub fn with_path(config_dir: PathBuf) -> WeftResult<Self> {
        std::fs::create_dir_all(&config_dir)
            .map_err(|e| Error::Storage(format!("Failed to create config directory: {}", e)))?;

        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    fn identity_path(&self) -> PathBuf {
        self.config_dir.join(IDENTITY_FILE)
    }

    fn signals_path(&self) -> PathBuf {
        self.config_dir.join(SIGNALS_FILE)
    }

    pub fn save(&self, identity: &Identity) -> WeftResult<()> {
        let path = self.identity_path();

        let stored = StoredIdentity {
            key_bytes: identity.to_bytes(),
            display_name: identity.display_name().map(|s| s.to_string()),
        };

        let bytes = postcard::to_allocvec(&stored)
            .map_err(|e| Error::Storage(format!("Failed to serialize identity: {}", e)))?;

        std::fs::write(&path, &bytes)
            .map_err(|e| Error::Storage(format!("Failed to write identity: {}", e)))?;

        Ok(())
    }

    pub fn load(&self) -> WeftResult<Identity> {
        let path = self.identity_path();

        if !path.exists() {
            return Err(Error::Storage("No stored identity found".to_string()));
        }

        let bytes = std::fs::read(&path)
            .map_err(|e| Error::Storage(format!("Failed to read identity: {}", e)))?;

        let stored: StoredIdentity = postcard::from_bytes(&bytes)
            .map_err(|e| Error::Storage(format!("Failed to deserialize identity: {}", e)))?;

        let mut identity = Identity::from_bytes(&stored.key_bytes)?;
        if let Some(name) = stored.display_name {
            identity.set_display_name(name);
        }

        Ok(identity)
    }

    pub fn has_stored_identity(&self) -> bool {
        self.identity_path().exists()
    }

    pub fn load_or_create(&self) -> WeftResult<Identity> {
        if self.has_stored_identity() {
            self.load()
        } else {
            let identity = Identity::generate()?;
            self.save(&identity)?;
            Ok(identity)
        }
    }

    pub fn delete(&self) -> WeftResult<()> {
        let path = self.identity_path();

        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| Error::Storage(format!("Failed to delete identity: {}", e)))?;
        }

        Ok(())
    }

    /// Persist the admitted signal log, replacing any previous log.
    pub fn save_signals(&self, signals: &[TrustSignal]) -> WeftResult<()> {
        let json = serde_json::to_string_pretty(signals)
            .map_err(|e| Error::Storage(format!("Failed to serialize signals: {}", e)))?;

        std::fs::write(self.signals_path(), json)
            .map_err(|e| Error::Storage(format!("Failed to write signals: {}", e)))?;

        Ok(())
    }

    /// Load the admitted signal log. A missing file is an empty log.
    pub fn load_signals(&self) -> WeftResult<Vec<TrustSignal>> {
        let path = self.signals_path();

        if !path.exists() {
            return Ok(Vec::new());
        }

        let json = std::fs::read_to_string(&path)
            .map_err(|e| Error::Storage(format!("Failed to read signals: {}", e)))?;

        serde_json::from_str(&json)
            .map_err(|e| Error::Storage(format!("Failed to parse signals: {}", e)))
    }

    /// Persist the flat direct-trust membership list.
    pub fn save_trust_graph(&self, ids: &[String]) -> WeftResult<()> {
        let json = serde_json::to_string_pretty(ids)
            .map_err(|e| Error::Storage(format!("Failed to serialize trust graph: {}", e)))?;

        std::fs::write(self.config_dir.join(TRUST_GRAPH_FILE), json)
            .map_err(|e| Error::Storage(format!("Failed to write trust graph: {}", e)))?;

        Ok(())
    }

    /// Load the direct-trust membership list. A missing file is empty.
    pub fn load_trust_graph(&self) -> WeftResult<Vec<String>> {
        let path = self.config_dir.join(TRUST_GRAPH_FILE);

        if !path.exists() {
            return Ok(Vec::new());
        }

        let json = std::fs::read_to_string(&path)
            .map_err(|e| Error::Storage(format!("Failed to read trust graph: {}", e)))?;

        serde_json::from_str(&json)
            .map_err(|e| Error::Storage(format!("Failed to parse trust graph: {}", e)))
    }

    /// Persist the pending-request list.
    pub fn save_pending_requests(&self, ids: &[String]) -> WeftResult<()> {
        let json = serde_json::to_string_pretty(ids)
            .map_err(|e| Error::Storage(format!("Failed to serialize pending requests: {}", e)))?;

        std::fs::write(self.config_dir.join(PENDING_FILE), json)
            .map_err(|e| Error::Storage(format!("Failed to write pending requests: {}", e)))?;

        Ok(())
    }

    /// Load the pending-request list. A missing file is empty.
    pub fn load_pending_requests(&self) -> WeftResult<Vec<String>> {
        let path = self.config_dir.join(PENDING_FILE);

        if !path.exists() {
            return Ok(Vec::new());
        }

        let json = std::fs::read_to_string(&path)
            .map_err(|e| Error::Storage(format!("Failed to read pending requests: {}", e)))?;

        serde_json::from_str(&json)
            .map_err(|e| Error::Storage(format!("Failed to parse pending requests: {}", e)))
    }

    pub fn export_to_file(&self, identity: &Identity, path: &Path) -> WeftResult<()> {
        let exported = ExportedIdentity {
            agent_id: identity.agent_id(),
            key_bytes: hex::encode(identity.to_bytes()),
            display_name: identity.display_name().map(|s| s.to_string()),
        };

        let json = serde_json::to_string_pretty(&exported)
            .map_err(|e| Error::Storage(format!("Failed to serialize: {}", e)))?;

        std::fs::write(path, json)
            .map_err(|e| Error::Storage(format!("Failed to write file: {}", e)))?;

        Ok(())
    }

    pub fn import_from_file(&self, path: &Path) -> WeftResult<Identity> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Storage(format!("Failed to read file: {}", e)))?;

        let exported: ExportedIdentity = serde_json::from_str(&json)
            .map_err(|e| Error::Storage(format!("Failed to parse: {}", e)))?;

        let key_bytes: [u8; 32] = hex::decode(&exported.key_bytes)
            .map_err(|e| Error::Storage(format!("Invalid key: {}", e)))?
            .try_into()
            .map_err(|_| Error::Storage("Invalid key length".to_string()))?;

        let mut identity = Identity::from_bytes(&key_bytes)?;
        if let Some(name) = exported.display_name {
            identity.set_display_name(name);
        }

        Ok(identity)
    }
}
