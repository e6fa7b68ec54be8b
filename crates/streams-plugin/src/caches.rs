//! Cache facades owned by the host process.
//!
//! All three caches are concurrency-safe, read-mostly views of state
//! maintained elsewhere (onchain configuration, the predecessor protocol
//! instance). The plugin treats them as black boxes with best-effort
//! consistency and does not retry their failures.

use async_trait::async_trait;
use thiserror::Error;

use streams_common::{ChannelDefinitions, ConfigDigest};

use crate::report::RetirementReport;

/// Errors reported by the caches.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("no retirement report known for predecessor {0}")]
    UnknownPredecessor(ConfigDigest),

    #[error("invalid attested retirement report: {0}")]
    InvalidRetirementReport(String),
}

/// Expected channel definitions, synced from the onchain configuration
/// store. Oracles vote the consensus channel set toward this view.
#[async_trait]
pub trait ChannelDefinitionCache: Send + Sync {
    async fn definitions(&self) -> Result<ChannelDefinitions, CacheError>;
}

/// Whether the onchain configuration says this instance should retire.
#[async_trait]
pub trait ShouldRetireCache: Send + Sync {
    async fn should_retire(&self) -> Result<bool, CacheError>;
}

/// Attested retirement reports written by predecessor protocol instances.
///
/// The predecessor writes its signed retirement report here (locally,
/// offchain) so the successor can pick it up and take over the validity
/// window bookkeeping without gaps.
#[async_trait]
pub trait PredecessorRetirementReportCache: Send + Sync {
    /// The attested retirement report for the given predecessor, if the
    /// cache holds one. A miss is `Ok(None)`, not an error.
    async fn attested_retirement_report(
        &self,
        predecessor: ConfigDigest,
    ) -> Result<Option<Vec<u8>>, CacheError>;

    /// Verifies an attested retirement report received from another
    /// oracle and returns the decoded payload.
    ///
    /// Synchronous: this runs inside the pure outcome transition, so it
    /// must be purely local verification with no I/O.
    fn check_attested_retirement_report(
        &self,
        predecessor: ConfigDigest,
        attested: &[u8],
    ) -> Result<RetirementReport, CacheError>;
}
