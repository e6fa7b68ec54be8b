//! Error taxonomy for the plugin.
//!
//! Per-observation faults are logged and skipped inside the outcome
//! transition and never surface here; everything in this enum is fatal to
//! the current callback. The engine may retry at the next sequence number.

use thiserror::Error;

use streams_common::ReportFormat;

use crate::caches::CacheError;
use crate::codec::CodecError;
use crate::data_source::DataSourceError;

/// Fatal errors returned to the consensus engine.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The engine supplied a sequence number below the bootstrap round.
    #[error("invalid seq_nr {0}, must be >= 1")]
    InvalidSeqNr(u64),

    /// The previous outcome bytes did not decode.
    #[error("error decoding previous outcome: {0}")]
    InvalidPreviousOutcome(#[source] serde_json::Error),

    /// The outcome bytes handed to `reports` did not decode.
    #[error("error decoding outcome: {0}")]
    InvalidOutcome(#[source] serde_json::Error),

    /// Fewer attributed observations than the 2f+1 quorum.
    #[error("expected at least {need} attributed observations, got {got}")]
    InsufficientObservations { got: usize, need: usize },

    /// Every attributed observation was skipped as malformed.
    #[error("no valid observations")]
    NoValidObservations,

    /// A single observation failed validation (returned by
    /// `validate_observation` only).
    #[error("invalid observation: {0}")]
    InvalidObservation(String),

    /// The data source failed while building an observation.
    #[error(transparent)]
    DataSource(#[from] DataSourceError),

    /// A cache failed while building an observation.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A channel requested a report format with no registered codec.
    #[error("no codec registered for report format {0}")]
    MissingCodec(ReportFormat),

    /// Report encoding failed.
    #[error("report encoding failed: {0}")]
    Codec(#[from] CodecError),

    /// The offchain configuration blob did not decode.
    #[error("invalid offchain config: {0}")]
    InvalidOffchainConfig(#[source] serde_json::Error),

    /// The caller cancelled the observation.
    #[error("observation cancelled")]
    Cancelled,

    /// An invariant the plugin relies on was violated.
    #[error("internal: {0}")]
    Internal(String),
}
