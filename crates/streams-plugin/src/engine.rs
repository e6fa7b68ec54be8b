//! Engine-facing plugin surface.
//!
//! The consensus engine invokes these callbacks serially per protocol
//! instance. `observation` may block on the data source and honors the
//! caller's cancellation token; every other callback is pure, performs no
//! I/O, and must complete in a few milliseconds.
//!
//! The engine guarantees that `seq_nr` increases monotonically (though not
//! strictly) and that `previous_outcome` holds the consensus outcome for
//! `seq_nr - 1`. It does NOT guarantee that the observations handed to
//! `outcome` include this node's own, nor that all of them are honest: up
//! to f of them may be arbitrary garbage.

use std::fmt;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use streams_common::{LifeCycleStage, ReportFormat};

use crate::error::PluginError;

/// Index of one oracle within the protocol instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OracleId(pub u8);

impl fmt::Display for OracleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A serialized observation together with the oracle that signed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributedObservation {
    /// Serialized observation bytes, as gossiped by the engine.
    pub observation: Vec<u8>,
    /// The oracle the engine attributes these bytes to.
    pub observer: OracleId,
}

/// An on-chain signature together with the oracle that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributedSignature {
    pub signature: Vec<u8>,
    pub signer: OracleId,
}

/// Context the engine supplies with each callback for a sequence number.
#[derive(Debug, Clone, Default)]
pub struct OutcomeContext {
    /// Current sequence number; 1 is the bootstrap round.
    pub seq_nr: u64,
    /// Serialized consensus outcome of `seq_nr - 1`.
    pub previous_outcome: Vec<u8>,
}

/// Minimum number of valid observations required to form an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quorum {
    FPlusOne,
    TwoFPlusOne,
}

/// Metadata attached to an emitted report for downstream routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportInfo {
    pub lifecycle_stage: LifeCycleStage,
    pub report_format: ReportFormat,
}

/// An encoded report plus its routing metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportWithInfo {
    pub report: Vec<u8>,
    pub info: ReportInfo,
}

/// Application callbacks plugged into the consensus engine.
///
/// One implementation instance serves exactly one protocol instance; state
/// that must survive across sequence numbers lives in the outcome bytes.
#[async_trait]
pub trait ReportingPlugin: Send + Sync {
    /// Builds the query the leader sends with its observation request.
    async fn query(&self, ctx: &OutcomeContext) -> Result<Vec<u8>, PluginError>;

    /// Builds this oracle's serialized observation for `ctx.seq_nr`.
    ///
    /// The only side-effectful callback. Must abandon in-flight requests
    /// promptly when `cancel` fires and return an error; partial
    /// observations are never returned.
    async fn observation(
        &self,
        ctx: &OutcomeContext,
        query: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, PluginError>;

    /// Rejects malformed observations before they enter the protocol.
    /// Called once per gossiped observation; must be fast and I/O-free.
    fn validate_observation(
        &self,
        ctx: &OutcomeContext,
        query: &[u8],
        ao: &AttributedObservation,
    ) -> Result<(), PluginError>;

    /// How many valid observations are needed before `outcome` runs.
    fn observation_quorum(&self, ctx: &OutcomeContext, query: &[u8]) -> Quorum;

    /// Deterministically folds the attributed observations into the next
    /// outcome. The engine always supplies at least 2f+1 observations.
    fn outcome(
        &self,
        ctx: &OutcomeContext,
        query: &[u8],
        aos: &[AttributedObservation],
    ) -> Result<Vec<u8>, PluginError>;

    /// Emits zero or more encoded reports for an agreed outcome.
    fn reports(&self, seq_nr: u64, outcome: &[u8]) -> Result<Vec<ReportWithInfo>, PluginError>;

    /// Gate before the engine collects signatures for a report.
    async fn should_accept_attested_report(
        &self,
        seq_nr: u64,
        report: &ReportWithInfo,
    ) -> Result<bool, PluginError>;

    /// Gate before a signed report is handed to the transmitter.
    async fn should_transmit_accepted_report(
        &self,
        seq_nr: u64,
        report: &ReportWithInfo,
    ) -> Result<bool, PluginError>;

    /// Releases resources when the protocol instance shuts down.
    fn close(&self) -> Result<(), PluginError>;
}
