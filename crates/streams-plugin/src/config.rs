//! Offchain configuration carried in the protocol's config blob.
//!
//! The engine hands every plugin instance an opaque offchain config; ours
//! is a small JSON document. Empty bytes mean the default configuration
//! (no predecessor, strict validation).

use serde::{Deserialize, Serialize};

use streams_common::ConfigDigest;

use crate::error::PluginError;

/// Plugin configuration decoded from the offchain config bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OffchainConfig {
    /// Config digest of the protocol instance this one succeeds.
    /// When set, the instance starts in the staging stage and waits for
    /// the predecessor's retirement report before going to production.
    #[serde(
        rename = "PredecessorConfigDigest",
        skip_serializing_if = "Option::is_none"
    )]
    pub predecessor_config_digest: Option<ConfigDigest>,

    /// Accept zero-length observation bytes at seq_nr > 1 as an empty
    /// observation instead of rejecting them. Off by default.
    #[serde(rename = "LenientEmptyObservations")]
    pub lenient_empty_observations: bool,
}

impl OffchainConfig {
    /// Decodes the offchain config bytes the engine supplies.
    pub fn decode(data: &[u8]) -> Result<Self, PluginError> {
        if data.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_slice(data).map_err(PluginError::InvalidOffchainConfig)
    }

    /// Encodes this config for inclusion in the protocol configuration.
    pub fn encode(&self) -> Result<Vec<u8>, PluginError> {
        serde_json::to_vec(self)
            .map_err(|e| PluginError::Internal(format!("error encoding offchain config: {e}")))
    }
}
