//! Consensus plugin producing signed reports over observed data streams.
//!
//! This crate implements the application layer of a byzantine-fault-tolerant
//! reporting protocol. The surrounding consensus engine handles networking,
//! signing and agreement; the plugin answers the engine's callbacks:
//!
//! - `observation`: query the data source and caches, serialize an observation
//! - `validate_observation`: reject malformed or oversized observations
//! - `outcome`: deterministically fold 2f+1 observations into a new outcome
//! - `reports`: turn an outcome into per-channel encoded reports
//!
//! Everything except `observation` is pure: no I/O, deterministic output for
//! identical input on every replica. State survives only inside the outcome
//! bytes the engine carries between sequence numbers.
//!
//! ## Modules
//!
//! - `engine`: the engine-facing callback surface and its wire types
//! - `data_source`, `caches`: injected collaborator traits
//! - `observation`, `outcome`, `report`: the protocol state machine
//! - `codec`: report codec registry and the canonical JSON codec
//! - `config`: offchain configuration carried in the protocol config blob

pub mod caches;
pub mod codec;
pub mod config;
pub mod data_source;
pub mod engine;
pub mod error;
pub mod observation;
pub mod outcome;
pub mod plugin;
pub mod report;

pub use caches::{
    CacheError, ChannelDefinitionCache, PredecessorRetirementReportCache, ShouldRetireCache,
};
pub use codec::{CodecError, CodecRegistry, JsonReportCodec, ReportCodec, Unpacked};
pub use config::OffchainConfig;
pub use data_source::{DataSource, DataSourceError, ObsResult, StreamValues};
pub use engine::{
    AttributedObservation, AttributedSignature, OracleId, OutcomeContext, Quorum, ReportInfo,
    ReportWithInfo, ReportingPlugin,
};
pub use error::PluginError;
pub use observation::Observation;
pub use outcome::{NotReportable, Outcome};
pub use plugin::{Plugin, PluginConfig, PluginFactory};
pub use report::{Report, RetirementReport};
