//! The plugin implementation and its factory.
//!
//! One [`Plugin`] serves exactly one protocol instance. The factory owns
//! the process-wide collaborators (data source, caches, codecs) and
//! builds a plugin per instance from the engine-supplied configuration.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use streams_common::{ConfigDigest, LifeCycleStage, StreamId};

use crate::caches::{ChannelDefinitionCache, PredecessorRetirementReportCache, ShouldRetireCache};
use crate::codec::CodecRegistry;
use crate::config::OffchainConfig;
use crate::data_source::DataSource;
use crate::engine::{
    AttributedObservation, OutcomeContext, Quorum, ReportWithInfo, ReportingPlugin,
};
use crate::error::PluginError;
use crate::observation::{channel_votes, stream_id_union, validate_observation, Observation};
use crate::outcome::{transition, Outcome};
use crate::report::build_reports;

/// Per-instance configuration supplied by the engine.
#[derive(Debug, Clone)]
pub struct PluginConfig {
    /// Digest of this protocol instance's configuration.
    pub config_digest: ConfigDigest,
    /// Maximum number of tolerated byzantine-faulty oracles.
    pub f: usize,
    /// Opaque offchain configuration; see [`OffchainConfig`].
    pub offchain_config: Vec<u8>,
}

/// Builds [`Plugin`] instances around the shared collaborators.
pub struct PluginFactory {
    predecessor_retirement_reports: Arc<dyn PredecessorRetirementReportCache>,
    should_retire: Arc<dyn ShouldRetireCache>,
    channel_definitions: Arc<dyn ChannelDefinitionCache>,
    data_source: Arc<dyn DataSource>,
    codecs: CodecRegistry,
}

impl PluginFactory {
    pub fn new(
        predecessor_retirement_reports: Arc<dyn PredecessorRetirementReportCache>,
        should_retire: Arc<dyn ShouldRetireCache>,
        channel_definitions: Arc<dyn ChannelDefinitionCache>,
        data_source: Arc<dyn DataSource>,
        codecs: CodecRegistry,
    ) -> Self {
        Self {
            predecessor_retirement_reports,
            should_retire,
            channel_definitions,
            data_source,
            codecs,
        }
    }

    /// Builds a plugin for one protocol instance.
    pub fn new_plugin(&self, config: PluginConfig) -> Result<Plugin, PluginError> {
        let offchain = OffchainConfig::decode(&config.offchain_config)?;
        Ok(Plugin {
            predecessor_config_digest: offchain.predecessor_config_digest,
            lenient_empty_observations: offchain.lenient_empty_observations,
            config_digest: config.config_digest,
            f: config.f,
            predecessor_retirement_reports: self.predecessor_retirement_reports.clone(),
            should_retire: self.should_retire.clone(),
            channel_definitions: self.channel_definitions.clone(),
            data_source: self.data_source.clone(),
            codecs: self.codecs.clone(),
        })
    }
}

/// The reporting plugin for one protocol instance.
pub struct Plugin {
    predecessor_config_digest: Option<ConfigDigest>,
    lenient_empty_observations: bool,
    config_digest: ConfigDigest,
    f: usize,
    predecessor_retirement_reports: Arc<dyn PredecessorRetirementReportCache>,
    should_retire: Arc<dyn ShouldRetireCache>,
    channel_definitions: Arc<dyn ChannelDefinitionCache>,
    data_source: Arc<dyn DataSource>,
    codecs: CodecRegistry,
}

impl Plugin {
    async fn build_observation(&self, ctx: &OutcomeContext) -> Result<Vec<u8>, PluginError> {
        if ctx.seq_nr < 1 {
            return Err(PluginError::InvalidSeqNr(ctx.seq_nr));
        }
        // Bootstrap convention: the first round carries empty observations.
        if ctx.seq_nr == 1 {
            return Ok(Vec::new());
        }

        // Single wall-clock read; everything below is a function of it.
        let unix_timestamp_nanoseconds = Utc::now()
            .timestamp_nanos_opt()
            .ok_or_else(|| PluginError::Internal("wall clock outside nanosecond range".into()))?;

        let previous: Outcome = serde_json::from_slice(&ctx.previous_outcome)
            .map_err(PluginError::InvalidPreviousOutcome)?;

        let mut attested_predecessor_retirement = Vec::new();
        if let Some(predecessor) = &self.predecessor_config_digest {
            if previous.life_cycle_stage == LifeCycleStage::Staging {
                // A cache miss is fine (the predecessor may not have
                // retired yet); transport errors are not.
                if let Some(bytes) = self
                    .predecessor_retirement_reports
                    .attested_retirement_report(*predecessor)
                    .await?
                {
                    attested_predecessor_retirement = bytes;
                }
            }
        }

        let should_retire = self.should_retire.should_retire().await?;

        let expected = self.channel_definitions.definitions().await?;
        let (remove_channel_ids, add_channel_definitions) = channel_votes(&previous, &expected);

        let stream_ids: BTreeSet<StreamId> = stream_id_union(&previous.channel_definitions);
        let mut stream_values = self.data_source.observe(&stream_ids).await?;
        // The source may return streams nobody asked about; drop them.
        stream_values.retain(|stream_id, _| stream_ids.contains(stream_id));

        let observation = Observation {
            attested_predecessor_retirement,
            should_retire,
            unix_timestamp_nanoseconds,
            remove_channel_ids,
            add_channel_definitions,
            stream_values,
        };
        serde_json::to_vec(&observation)
            .map_err(|e| PluginError::Internal(format!("error serializing observation: {e}")))
    }
}

#[async_trait]
impl ReportingPlugin for Plugin {
    async fn query(&self, _ctx: &OutcomeContext) -> Result<Vec<u8>, PluginError> {
        // Oracles need no coordination on what to observe.
        Ok(Vec::new())
    }

    async fn observation(
        &self,
        ctx: &OutcomeContext,
        _query: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, PluginError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(PluginError::Cancelled),
            result = self.build_observation(ctx) => result,
        }
    }

    fn validate_observation(
        &self,
        ctx: &OutcomeContext,
        _query: &[u8],
        ao: &AttributedObservation,
    ) -> Result<(), PluginError> {
        validate_observation(
            ctx.seq_nr,
            &ao.observation,
            self.predecessor_config_digest.is_some(),
            self.lenient_empty_observations,
        )
    }

    fn observation_quorum(&self, _ctx: &OutcomeContext, _query: &[u8]) -> Quorum {
        Quorum::TwoFPlusOne
    }

    fn outcome(
        &self,
        ctx: &OutcomeContext,
        _query: &[u8],
        aos: &[AttributedObservation],
    ) -> Result<Vec<u8>, PluginError> {
        let need = 2 * self.f + 1;
        if aos.len() < need {
            return Err(PluginError::InsufficientObservations {
                got: aos.len(),
                need,
            });
        }

        let outcome = if ctx.seq_nr <= 1 {
            Outcome::initial(self.predecessor_config_digest.is_some())
        } else {
            let previous: Outcome = serde_json::from_slice(&ctx.previous_outcome)
                .map_err(PluginError::InvalidPreviousOutcome)?;
            transition(
                &previous,
                aos,
                self.f,
                self.predecessor_config_digest.as_ref(),
                self.predecessor_retirement_reports.as_ref(),
            )?
        };

        serde_json::to_vec(&outcome)
            .map_err(|e| PluginError::Internal(format!("error serializing outcome: {e}")))
    }

    fn reports(&self, seq_nr: u64, outcome: &[u8]) -> Result<Vec<ReportWithInfo>, PluginError> {
        // No reports for the bootstrap round.
        if seq_nr <= 1 {
            return Ok(Vec::new());
        }
        let outcome: Outcome =
            serde_json::from_slice(outcome).map_err(PluginError::InvalidOutcome)?;
        build_reports(seq_nr, &outcome, &self.config_digest, &self.codecs)
    }

    async fn should_accept_attested_report(
        &self,
        _seq_nr: u64,
        _report: &ReportWithInfo,
    ) -> Result<bool, PluginError> {
        // Filtering happens at the transmitter.
        Ok(true)
    }

    async fn should_transmit_accepted_report(
        &self,
        _seq_nr: u64,
        _report: &ReportWithInfo,
    ) -> Result<bool, PluginError> {
        Ok(true)
    }

    fn close(&self) -> Result<(), PluginError> {
        Ok(())
    }
}
