//! Channel definitions and their canonical content hash.
//!
//! A channel groups an ordered list of streams into one report. Channel
//! definitions are voted in and out by oracles, so identical definitions
//! must hash identically on every node regardless of platform.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{ChannelId, ReportFormat, StreamId};

/// Canonical SHA-256 content hash of a channel definition.
///
/// Ordered bytewise; the outcome transition iterates pending channel
/// additions in ascending hash order.
pub type ChannelHash = [u8; 32];

/// Configuration of a single report channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDefinition {
    /// Destination encoding for this channel's reports.
    #[serde(rename = "ReportFormat")]
    pub report_format: ReportFormat,
    /// Selector of the chain the reports are destined for.
    #[serde(rename = "ChainSelector")]
    pub chain_selector: u64,
    /// Streams included in the report, in output order. Non-empty.
    #[serde(rename = "StreamIDs")]
    pub stream_ids: Vec<StreamId>,
}

/// The current set of channel definitions, keyed by channel id.
///
/// `BTreeMap` keeps iteration and serialization in ascending id order,
/// which the consensus wire format requires.
pub type ChannelDefinitions = BTreeMap<ChannelId, ChannelDefinition>;

/// A channel definition together with the id it is proposed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDefinitionWithId {
    pub channel_id: ChannelId,
    pub definition: ChannelDefinition,
}

/// Computes the canonical content hash of a channel definition.
///
/// Layout: `channel_id (BE u32) || len(format) (BE u32) || format bytes ||
/// chain_selector (BE u64) || len(stream_ids) (BE u32) || stream_id (BE u32)...`
/// The length prefixes keep adjacent variable-length fields from aliasing.
pub fn channel_hash(cd: &ChannelDefinitionWithId) -> ChannelHash {
    let format = cd.definition.report_format.as_str();

    let mut hasher = Sha256::new();
    hasher.update(cd.channel_id.to_be_bytes());
    hasher.update((format.len() as u32).to_be_bytes());
    hasher.update(format.as_bytes());
    hasher.update(cd.definition.chain_selector.to_be_bytes());
    hasher.update((cd.definition.stream_ids.len() as u32).to_be_bytes());
    for stream_id in &cd.definition.stream_ids {
        hasher.update(stream_id.to_be_bytes());
    }
    hasher.finalize().into()
}
