//! Observation wire type, vote-set computation and validation.
//!
//! One observation is produced per oracle per sequence number. Its maps
//! are `BTreeMap`/`BTreeSet` so serialization is byte-identical across
//! replicas regardless of insertion order.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use streams_common::types::serde_hex;
use streams_common::{
    ChannelDefinitions, ChannelId, StreamId, MAX_OBSERVATION_ADD_CHANNEL_DEFINITIONS,
    MAX_OBSERVATION_REMOVE_CHANNEL_IDS, MAX_OBSERVATION_STREAM_VALUES,
};

use crate::data_source::StreamValues;
use crate::error::PluginError;
use crate::outcome::Outcome;

/// One oracle's observation for one sequence number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Observation {
    /// Attested (signed by f+1 oracles) retirement report of the
    /// predecessor instance. Empty unless a predecessor is configured and
    /// the instance is still staging.
    #[serde(
        rename = "AttestedPredecessorRetirement",
        with = "serde_hex",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub attested_predecessor_retirement: Vec<u8>,

    /// Vote to retire this protocol instance.
    #[serde(rename = "ShouldRetire")]
    pub should_retire: bool,

    /// Local wall-clock time when the observation was made.
    #[serde(rename = "UnixTimestampNanoseconds")]
    pub unix_timestamp_nanoseconds: i64,

    /// Votes to drop channels no longer present in the expected set.
    #[serde(rename = "RemoveChannelIDs", skip_serializing_if = "BTreeSet::is_empty")]
    pub remove_channel_ids: BTreeSet<ChannelId>,

    /// Votes to add channels from the expected set.
    #[serde(
        rename = "AddChannelDefinitions",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub add_channel_definitions: ChannelDefinitions,

    /// Observed values for the streams of the previous outcome's channels.
    #[serde(rename = "StreamValues", skip_serializing_if = "BTreeMap::is_empty")]
    pub stream_values: StreamValues,
}

/// Computes the channel add/remove vote sets for an observation.
///
/// Removals: channels present in the previous outcome's definitions or
/// valid-after bookkeeping but absent from the expected set. Additions:
/// channels expected but not yet in the previous outcome's definitions.
/// Both sets are truncated to their size bound in ascending id order, so
/// every honest oracle votes for the same prefix.
pub fn channel_votes(
    previous: &Outcome,
    expected: &ChannelDefinitions,
) -> (BTreeSet<ChannelId>, ChannelDefinitions) {
    let stale = previous
        .channel_definitions
        .keys()
        .chain(previous.valid_after_seconds.keys())
        .copied()
        .filter(|id| !expected.contains_key(id))
        .collect::<BTreeSet<_>>();
    let remove_channel_ids = stale
        .into_iter()
        .take(MAX_OBSERVATION_REMOVE_CHANNEL_IDS)
        .collect();

    let add_channel_definitions = expected
        .iter()
        .filter(|(id, _)| !previous.channel_definitions.contains_key(*id))
        .take(MAX_OBSERVATION_ADD_CHANNEL_DEFINITIONS)
        .map(|(id, definition)| (*id, definition.clone()))
        .collect();

    (remove_channel_ids, add_channel_definitions)
}

/// The union of stream ids across the previous outcome's channels: the
/// set of streams this oracle must observe.
pub fn stream_id_union(definitions: &ChannelDefinitions) -> BTreeSet<StreamId> {
    definitions
        .values()
        .flat_map(|definition| definition.stream_ids.iter().copied())
        .collect()
}

/// Rejects malformed observations before they enter the protocol.
///
/// Pure and cheap; called once per gossiped observation. Observations that
/// pass here can still carry adversarial content (e.g. a bogus retirement
/// report), which the outcome transition handles per field.
pub fn validate_observation(
    seq_nr: u64,
    raw: &[u8],
    has_predecessor: bool,
    lenient_empty: bool,
) -> Result<(), PluginError> {
    if seq_nr <= 1 {
        if !raw.is_empty() {
            return Err(PluginError::InvalidObservation(format!(
                "observation must be empty at seq_nr {seq_nr}"
            )));
        }
        return Ok(());
    }

    if raw.is_empty() {
        // An oracle that has nothing to say still reports its timestamp;
        // zero bytes means something went wrong on its side.
        if lenient_empty {
            return Ok(());
        }
        return Err(PluginError::InvalidObservation(
            "empty observation".to_string(),
        ));
    }

    let observation: Observation = serde_json::from_slice(raw)
        .map_err(|e| PluginError::InvalidObservation(format!("invalid json: {e}")))?;

    if !has_predecessor && !observation.attested_predecessor_retirement.is_empty() {
        return Err(PluginError::InvalidObservation(
            "AttestedPredecessorRetirement is not empty but this instance has no predecessor"
                .to_string(),
        ));
    }

    if observation.add_channel_definitions.len() > MAX_OBSERVATION_ADD_CHANNEL_DEFINITIONS {
        return Err(PluginError::InvalidObservation(format!(
            "AddChannelDefinitions is too long: {} vs {}",
            observation.add_channel_definitions.len(),
            MAX_OBSERVATION_ADD_CHANNEL_DEFINITIONS
        )));
    }

    if observation.remove_channel_ids.len() > MAX_OBSERVATION_REMOVE_CHANNEL_IDS {
        return Err(PluginError::InvalidObservation(format!(
            "RemoveChannelIDs is too long: {} vs {}",
            observation.remove_channel_ids.len(),
            MAX_OBSERVATION_REMOVE_CHANNEL_IDS
        )));
    }

    if observation.stream_values.len() > MAX_OBSERVATION_STREAM_VALUES {
        return Err(PluginError::InvalidObservation(format!(
            "StreamValues is too long: {} vs {}",
            observation.stream_values.len(),
            MAX_OBSERVATION_STREAM_VALUES
        )));
    }

    for (stream_id, result) in &observation.stream_values {
        if result.valid && result.value.is_none() {
            return Err(PluginError::InvalidObservation(format!(
                "stream {stream_id} is marked valid but carries no value"
            )));
        }
    }

    Ok(())
}
