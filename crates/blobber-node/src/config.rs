use std::path::Path;

use blobber_crypto::VerifyingKey;
use blobber_proof::MAX_RECURSION_DEPTH;
use serde::{Deserialize, Serialize};

use crate::error::{NodeError, NodeResult};

/// Configuration for one storage node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// This node's ID as listed in allocation transactions.
    pub blobber_id: String,
    /// Hex Ed25519 key the node is registered with. Empty if unknown.
    pub blobber_public_key: String,
    /// Depth limit for proof construction and wire translation.
    pub max_recursion_depth: usize,
    /// One of `trace`, `debug`, `info`, `warn`, `error`.
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            blobber_id: String::new(),
            blobber_public_key: String::new(),
            max_recursion_depth: MAX_RECURSION_DEPTH,
            log_level: "info".into(),
        }
    }
}

impl NodeConfig {
    /// Defaults for the node with `blobber_id`.
    pub fn for_blobber(blobber_id: impl Into<String>) -> Self {
        Self {
            blobber_id: blobber_id.into(),
            ..Default::default()
        }
    }

    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> NodeResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> NodeResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> NodeResult<String> {
        toml::to_string(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn validate(&self) -> NodeResult<()> {
        if self.blobber_id.trim().is_empty() {
            return Err(NodeError::Config("blobber_id must be set".into()));
        }
        if !(1..=MAX_RECURSION_DEPTH).contains(&self.max_recursion_depth) {
            return Err(NodeError::Config(format!(
                "max_recursion_depth must be between 1 and {MAX_RECURSION_DEPTH}, got {}",
                self.max_recursion_depth
            )));
        }
        self.level()?;
        if !self.blobber_public_key.is_empty() {
            VerifyingKey::from_hex(&self.blobber_public_key)
                .map_err(|e| NodeError::Config(format!("blobber_public_key: {e}")))?;
        }
        Ok(())
    }

    pub fn level(&self) -> NodeResult<tracing::Level> {
        self.log_level
            .parse()
            .map_err(|_| NodeError::Config(format!("unknown log level {:?}", self.log_level)))
    }
}
