//! Report assembly.
//!
//! Turns an agreed outcome into zero or more encoded reports. Pure: any
//! failure here is fatal to the `reports` callback, never retried.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use streams_common::{ChannelId, ConfigDigest, LifeCycleStage, ReportFormat, StreamValue};

use crate::codec::CodecRegistry;
use crate::engine::{ReportInfo, ReportWithInfo};
use crate::error::PluginError;
use crate::outcome::Outcome;

/// A single channel's report, before codec encoding.
///
/// A report attests the channel's stream medians for the half-open window
/// `(valid_after_seconds, observation_timestamp_seconds]`. The destination
/// chain selector is not part of the report body; codecs that need it read
/// it from the channel definition they are handed.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub config_digest: ConfigDigest,
    pub seq_nr: u64,
    pub channel_id: ChannelId,
    pub valid_after_seconds: u32,
    pub observation_timestamp_seconds: u32,
    /// Stream medians in the channel's stream order. Never has holes: a
    /// channel with a missing median is not reportable at all.
    pub values: Vec<StreamValue>,
    /// True unless the instance is in production. Specimen reports are
    /// rejected onchain and exist to verify wiring during staging.
    pub specimen: bool,
}

/// Validity handover payload emitted while the instance is retired.
///
/// The successor instance adopts these per-channel window floors verbatim
/// so report time ranges neither gap nor overlap across the handover.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetirementReport {
    #[serde(rename = "ValidAfterSeconds", default)]
    pub valid_after_seconds: BTreeMap<ChannelId, u32>,
}

/// Builds the report set for one agreed outcome.
pub fn build_reports(
    seq_nr: u64,
    outcome: &Outcome,
    config_digest: &ConfigDigest,
    codecs: &CodecRegistry,
) -> Result<Vec<ReportWithInfo>, PluginError> {
    let observation_timestamp_seconds = outcome.observations_timestamp_seconds()?;

    let mut reports = Vec::new();

    if outcome.life_cycle_stage == LifeCycleStage::Retired {
        let retirement = RetirementReport {
            valid_after_seconds: outcome.valid_after_seconds.clone(),
        };
        let encoded = serde_json::to_vec(&retirement)
            .map_err(|e| PluginError::Internal(format!("error encoding retirement report: {e}")))?;
        reports.push(ReportWithInfo {
            report: encoded,
            info: ReportInfo {
                lifecycle_stage: outcome.life_cycle_stage,
                report_format: ReportFormat::Json,
            },
        });
    }

    for channel_id in outcome.reportable_channels() {
        let Some(definition) = outcome.channel_definitions.get(&channel_id) else {
            continue;
        };

        let mut values = Vec::with_capacity(definition.stream_ids.len());
        for stream_id in &definition.stream_ids {
            let median = outcome.stream_medians.get(stream_id).ok_or_else(|| {
                PluginError::Internal(format!(
                    "median missing for stream {stream_id} of reportable channel {channel_id}"
                ))
            })?;
            values.push(median.clone());
        }
        let valid_after_seconds =
            outcome.valid_after_seconds.get(&channel_id).copied().ok_or_else(|| {
                PluginError::Internal(format!(
                    "valid-after entry missing for reportable channel {channel_id}"
                ))
            })?;

        let report = Report {
            config_digest: *config_digest,
            seq_nr,
            channel_id,
            valid_after_seconds,
            observation_timestamp_seconds,
            values,
            specimen: outcome.life_cycle_stage != LifeCycleStage::Production,
        };

        let codec = codecs
            .get(definition.report_format)
            .ok_or(PluginError::MissingCodec(definition.report_format))?;
        let encoded = codec.encode(&report, definition)?;

        reports.push(ReportWithInfo {
            report: encoded,
            info: ReportInfo {
                lifecycle_stage: outcome.life_cycle_stage,
                report_format: definition.report_format,
            },
        });
    }

    if reports.is_empty() {
        debug!(seq_nr, "no reports");
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retirement_report_wire_form() {
        let report = RetirementReport {
            valid_after_seconds: BTreeMap::from([(5, 1000), (9, 1200)]),
        };
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(json, r#"{"ValidAfterSeconds":{"5":1000,"9":1200}}"#);
        let back: RetirementReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn test_retirement_report_keys_sort_numerically() {
        let report = RetirementReport {
            valid_after_seconds: BTreeMap::from([(10, 1), (9, 2), (100, 3)]),
        };
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(json, r#"{"ValidAfterSeconds":{"9":2,"10":1,"100":3}}"#);
    }
}
