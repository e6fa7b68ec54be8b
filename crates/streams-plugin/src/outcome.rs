//! Outcome state and the deterministic transition function.
//!
//! The outcome is the only state that survives across sequence numbers; the
//! engine carries it as opaque bytes and hands it back with the next round.
//! `transition` must therefore be a pure function of (previous outcome,
//! attributed observations, f): every map it touches iterates in sorted
//! order and every value is exact-precision, so independently executing
//! replicas produce byte-identical outcomes.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use streams_common::{
    chain_id_from_selector, channel_hash, ChannelDefinitionWithId, ChannelDefinitions, ChannelHash,
    ChannelId, ConfigDigest, LifeCycleStage, StreamId, StreamValue,
    MAX_OUTCOME_CHANNEL_DEFINITIONS,
};

use crate::caches::PredecessorRetirementReportCache;
use crate::engine::AttributedObservation;
use crate::error::PluginError;
use crate::observation::Observation;
use crate::report::RetirementReport;

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Why a channel cannot be reported on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotReportable {
    #[error("instance is retired")]
    Retired,

    #[error("observations timestamp {0}ns does not fit in u32 seconds")]
    InvalidTimestamp(i64),

    #[error("no channel definition with id {0}")]
    UnknownChannel(ChannelId),

    #[error("unknown chain selector {0}")]
    UnknownChainSelector(u64),

    #[error("no median for stream {0}")]
    MissingMedian(StreamId),

    #[error("no valid-after entry yet for channel {0}")]
    NoValidAfter(ChannelId),

    #[error("not valid yet: valid_after {valid_after} >= observations timestamp {observations}")]
    NotYetValid { valid_after: u32, observations: u32 },
}

/// Consensus state carried between sequence numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    #[serde(rename = "LifeCycleStage")]
    pub life_cycle_stage: LifeCycleStage,

    /// Median of the observers' local timestamps.
    #[serde(rename = "ObservationsTimestampNanoseconds")]
    pub observations_timestamp_nanoseconds: i64,

    /// The channel set reports are generated for.
    #[serde(rename = "ChannelDefinitions", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub channel_definitions: ChannelDefinitions,

    /// Floor of each channel's next report window. A channel's reports
    /// span (valid_after_seconds, observations_timestamp_seconds].
    #[serde(rename = "ValidAfterSeconds", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub valid_after_seconds: BTreeMap<ChannelId, u32>,

    /// Median observed value per stream. Present only for streams with
    /// more than f usable observations this round.
    #[serde(rename = "StreamMedians", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stream_medians: BTreeMap<StreamId, StreamValue>,
}

impl Outcome {
    /// The outcome of the bootstrap round (seq_nr 1).
    pub fn initial(has_predecessor: bool) -> Self {
        let life_cycle_stage = if has_predecessor {
            LifeCycleStage::Staging
        } else {
            LifeCycleStage::Production
        };
        Outcome {
            life_cycle_stage,
            observations_timestamp_nanoseconds: 0,
            channel_definitions: BTreeMap::new(),
            valid_after_seconds: BTreeMap::new(),
            stream_medians: BTreeMap::new(),
        }
    }

    /// The observations timestamp truncated to seconds precision.
    pub fn observations_timestamp_seconds(&self) -> Result<u32, PluginError> {
        timestamp_seconds(self.observations_timestamp_nanoseconds).ok_or_else(|| {
            PluginError::Internal(format!(
                "observations timestamp {}ns does not fit in u32 seconds",
                self.observations_timestamp_nanoseconds
            ))
        })
    }

    /// Whether a report can be generated for the given channel.
    pub fn is_reportable(&self, channel_id: ChannelId) -> Result<(), NotReportable> {
        if self.life_cycle_stage == LifeCycleStage::Retired {
            return Err(NotReportable::Retired);
        }

        let observations = timestamp_seconds(self.observations_timestamp_nanoseconds)
            .ok_or(NotReportable::InvalidTimestamp(self.observations_timestamp_nanoseconds))?;

        let definition = self
            .channel_definitions
            .get(&channel_id)
            .ok_or(NotReportable::UnknownChannel(channel_id))?;

        if chain_id_from_selector(definition.chain_selector).is_none() {
            return Err(NotReportable::UnknownChainSelector(definition.chain_selector));
        }

        for stream_id in &definition.stream_ids {
            if !self.stream_medians.contains_key(stream_id) {
                return Err(NotReportable::MissingMedian(*stream_id));
            }
        }

        let valid_after = self
            .valid_after_seconds
            .get(&channel_id)
            .copied()
            // The entry is created by the transition after the channel is
            // added; until then the channel stays quiet.
            .ok_or(NotReportable::NoValidAfter(channel_id))?;

        if valid_after >= observations {
            return Err(NotReportable::NotYetValid {
                valid_after,
                observations,
            });
        }

        Ok(())
    }

    /// All reportable channels, ascending by channel id.
    pub fn reportable_channels(&self) -> Vec<ChannelId> {
        self.channel_definitions
            .keys()
            .copied()
            .filter(|id| self.is_reportable(*id).is_ok())
            .collect()
    }
}

fn timestamp_seconds(nanoseconds: i64) -> Option<u32> {
    u32::try_from(nanoseconds.div_euclid(NANOS_PER_SECOND)).ok()
}

/// The lifecycle state machine.
///
/// staging -> production on an accepted predecessor retirement report;
/// production -> retired on more than f retire votes; retired is terminal.
/// A staging instance never retires directly: it first has to take over
/// from its predecessor.
fn next_lifecycle_stage(
    previous: LifeCycleStage,
    retirement_report_accepted: bool,
    should_retire_votes: usize,
    f: usize,
) -> LifeCycleStage {
    let mut stage = match previous {
        LifeCycleStage::Staging if retirement_report_accepted => LifeCycleStage::Production,
        other => other,
    };
    if stage == LifeCycleStage::Production && should_retire_votes > f {
        stage = LifeCycleStage::Retired;
    }
    stage
}

/// Everything accumulated from one pass over the attributed observations.
#[derive(Default)]
struct ObservationFold {
    valid_retirement: Option<RetirementReport>,
    should_retire_votes: usize,
    timestamps_nanoseconds: Vec<i64>,
    remove_votes: BTreeMap<ChannelId, usize>,
    add_votes: BTreeMap<ChannelHash, usize>,
    add_definitions: BTreeMap<ChannelHash, ChannelDefinitionWithId>,
    stream_observations: BTreeMap<StreamId, Vec<StreamValue>>,
}

fn fold_observations(
    previous: &Outcome,
    aos: &[AttributedObservation],
    predecessor_config_digest: Option<&ConfigDigest>,
    retirement_cache: &dyn PredecessorRetirementReportCache,
) -> ObservationFold {
    let mut fold = ObservationFold::default();

    for ao in aos {
        let observation: Observation = match serde_json::from_slice(&ao.observation) {
            Ok(observation) => observation,
            Err(e) => {
                warn!(oracle = %ao.observer, error = %e, "ignoring invalid observation");
                continue;
            }
        };

        // A single valid retirement report is enough. The field is only
        // meaningful while we are still staging; afterwards it is ignored.
        if !observation.attested_predecessor_retirement.is_empty()
            && fold.valid_retirement.is_none()
            && previous.life_cycle_stage == LifeCycleStage::Staging
        {
            if let Some(predecessor) = predecessor_config_digest {
                match retirement_cache.check_attested_retirement_report(
                    *predecessor,
                    &observation.attested_predecessor_retirement,
                ) {
                    Ok(report) => fold.valid_retirement = Some(report),
                    // Only the retirement field is dropped; the rest of
                    // this observation still counts.
                    Err(e) => warn!(
                        oracle = %ao.observer,
                        error = %e,
                        "ignoring invalid attested predecessor retirement"
                    ),
                }
            }
        }

        if observation.should_retire {
            fold.should_retire_votes += 1;
        }

        fold.timestamps_nanoseconds
            .push(observation.unix_timestamp_nanoseconds);

        for channel_id in &observation.remove_channel_ids {
            *fold.remove_votes.entry(*channel_id).or_default() += 1;
        }

        for (channel_id, definition) in observation.add_channel_definitions {
            let with_id = ChannelDefinitionWithId {
                channel_id,
                definition,
            };
            let hash = channel_hash(&with_id);
            *fold.add_votes.entry(hash).or_default() += 1;
            fold.add_definitions.insert(hash, with_id);
        }

        for (stream_id, result) in observation.stream_values {
            if !result.valid {
                debug!(stream_id, oracle = %ao.observer, "ignoring invalid stream value");
                continue;
            }
            match result.value {
                Some(value) => fold
                    .stream_observations
                    .entry(stream_id)
                    .or_default()
                    .push(value),
                None => warn!(
                    stream_id,
                    oracle = %ao.observer,
                    "stream value marked valid but carries no value"
                ),
            }
        }
    }

    fold
}

/// Deterministically folds 2f+1 attributed observations into the next
/// outcome.
///
/// Individual malformed observations are logged and skipped; the round
/// only fails if no observation at all could be used or an internal
/// invariant breaks.
pub fn transition(
    previous: &Outcome,
    aos: &[AttributedObservation],
    f: usize,
    predecessor_config_digest: Option<&ConfigDigest>,
    retirement_cache: &dyn PredecessorRetirementReportCache,
) -> Result<Outcome, PluginError> {
    let mut fold = fold_observations(previous, aos, predecessor_config_digest, retirement_cache);

    if fold.timestamps_nanoseconds.is_empty() {
        return Err(PluginError::NoValidObservations);
    }

    // Lifecycle stage. A valid predecessor retirement report promotes a
    // staging instance and carries the validity floors over verbatim.
    let mut valid_after_override = None;
    if previous.life_cycle_stage == LifeCycleStage::Staging {
        if let Some(report) = fold.valid_retirement.take() {
            valid_after_override = Some(report.valid_after_seconds);
        }
    }
    let life_cycle_stage = next_lifecycle_stage(
        previous.life_cycle_stage,
        valid_after_override.is_some(),
        fold.should_retire_votes,
        f,
    );

    // Rank-k median of the observers' timestamps.
    fold.timestamps_nanoseconds.sort_unstable();
    let observations_timestamp_nanoseconds =
        fold.timestamps_nanoseconds[fold.timestamps_nanoseconds.len() / 2];

    // Channel definitions. Retired instances freeze their channel set.
    let mut channel_definitions = previous.channel_definitions.clone();
    let mut removed_channel_ids = Vec::new();
    if life_cycle_stage != LifeCycleStage::Retired {
        for (&channel_id, &votes) in &fold.remove_votes {
            if votes <= f {
                continue;
            }
            // The id may live in valid_after_seconds only; record it
            // either way so the bookkeeping entry goes too.
            removed_channel_ids.push(channel_id);
            channel_definitions.remove(&channel_id);
        }

        // Ascending hash order: every replica applies additions in the
        // same sequence.
        for (hash, with_id) in &fold.add_definitions {
            let votes = fold.add_votes.get(hash).copied().unwrap_or(0);
            if votes <= f {
                continue;
            }
            if let Some(existing) = channel_definitions.get(&with_id.channel_id) {
                warn!(
                    channel_id = with_id.channel_id,
                    ?existing,
                    "more than f votes to add channel, but a different channel with this id exists"
                );
                continue;
            }
            // Deliberately `>` rather than `>=`: the set can reach one
            // past the nominal maximum. Kept for wire compatibility.
            if channel_definitions.len() > MAX_OUTCOME_CHANNEL_DEFINITIONS {
                warn!(
                    channel_id = with_id.channel_id,
                    max = MAX_OUTCOME_CHANNEL_DEFINITIONS,
                    "cannot add channel, outcome already contains maximum number of channels"
                );
                continue;
            }
            channel_definitions.insert(with_id.channel_id, with_id.definition.clone());
        }
    }

    // Validity floors. On promotion the predecessor's floors are adopted
    // verbatim; otherwise a channel that was reportable last round
    // advances to the previous timestamp (its report covered up to there)
    // and a skipped channel keeps its floor so no range goes missing.
    let mut valid_after_seconds = match valid_after_override {
        Some(adopted) => adopted,
        None => {
            let previous_seconds = previous.observations_timestamp_seconds()?;
            let mut floors = BTreeMap::new();
            for (&channel_id, &previous_floor) in &previous.valid_after_seconds {
                match previous.is_reportable(channel_id) {
                    Ok(()) => {
                        floors.insert(channel_id, previous_seconds);
                    }
                    Err(reason) => {
                        debug!(channel_id, %reason, "channel was not reportable last round");
                        floors.insert(channel_id, previous_floor);
                    }
                }
            }
            floors
        }
    };

    let observations_timestamp_seconds = timestamp_seconds(observations_timestamp_nanoseconds)
        .ok_or_else(|| {
            PluginError::Internal(format!(
                "observations timestamp {observations_timestamp_nanoseconds}ns does not fit in u32 seconds"
            ))
        })?;

    // New channels become reportable from the next round on.
    for channel_id in channel_definitions.keys() {
        valid_after_seconds
            .entry(*channel_id)
            .or_insert(observations_timestamp_seconds);
    }

    // Floors are dropped only on an explicit removal vote. Simply pruning
    // entries absent from the channel set could open gaps while a freshly
    // promoted instance is still ramping up its channels.
    for channel_id in &removed_channel_ids {
        valid_after_seconds.remove(channel_id);
    }

    // Stream medians. A median forms only from more than f usable values;
    // with at most f byzantine oracles it is then bounded by honest
    // observations on both sides.
    let mut stream_medians = BTreeMap::new();
    for (stream_id, mut values) in fold.stream_observations {
        if values.len() <= f {
            debug!(stream_id, count = values.len(), f, "not enough observations for a median");
            continue;
        }
        let tag = values[0].type_tag();
        if values.iter().any(|value| value.type_tag() != tag) {
            warn!(stream_id, "stream mixes value variants, omitting median");
            continue;
        }
        values.sort_by(|a, b| a.rank_cmp(b).unwrap_or(Ordering::Equal));
        stream_medians.insert(stream_id, values[values.len() / 2].clone());
    }

    Ok(Outcome {
        life_cycle_stage,
        observations_timestamp_nanoseconds,
        channel_definitions,
        valid_after_seconds,
        stream_medians,
    })
}
