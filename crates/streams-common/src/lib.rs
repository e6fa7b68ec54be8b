//! Shared types for the streams consensus plugin.
//!
//! This crate contains:
//! - Identifier types (StreamId, ChannelId, ConfigDigest) and wire tags
//! - The stream value model (`Decimal` and `Quote` variants)
//! - Channel definitions and their canonical content hash
//! - The chain-selector registry for destination addressing
//!
//! CRITICAL: All stream values use `rust_decimal::Decimal`.
//! NEVER use f64 for values that participate in consensus.

pub mod chains;
pub mod channel;
pub mod types;
pub mod value;

pub use chains::chain_id_from_selector;
pub use channel::{
    channel_hash, ChannelDefinition, ChannelDefinitionWithId, ChannelDefinitions, ChannelHash,
};
pub use types::{
    ChannelId, ConfigDigest, ConfigDigestError, LifeCycleStage, ReportFormat, ReportFormatError,
    StreamId, MAX_OBSERVATION_ADD_CHANNEL_DEFINITIONS, MAX_OBSERVATION_REMOVE_CHANNEL_IDS,
    MAX_OBSERVATION_STREAM_VALUES, MAX_OUTCOME_CHANNEL_DEFINITIONS,
};
pub use value::{Quote, StreamValue, ValueError};
