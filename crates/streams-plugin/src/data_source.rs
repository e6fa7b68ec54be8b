//! Data source abstraction.
//!
//! The data source is owned by the host process and shared between
//! protocol instances. The plugin only reads from it, once per
//! observation, and never retries its failures.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use streams_common::{StreamId, StreamValue};

/// Errors reported by a data source.
#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("timeout")]
    Timeout,

    #[error("data source unavailable: {0}")]
    Unavailable(String),
}

/// One stream's observation slot.
///
/// `valid` with an absent value is malformed; producers never emit it and
/// the observation validator rejects it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObsResult {
    #[serde(rename = "Val", skip_serializing_if = "Option::is_none")]
    pub value: Option<StreamValue>,
    #[serde(rename = "Valid")]
    pub valid: bool,
}

impl ObsResult {
    /// A usable observed value.
    pub fn valid(value: StreamValue) -> Self {
        Self {
            value: Some(value),
            valid: true,
        }
    }

    /// The stream was known but no usable value was available.
    pub fn invalid() -> Self {
        Self {
            value: None,
            valid: false,
        }
    }
}

/// Observed values for a set of streams, keyed by stream id.
pub type StreamValues = BTreeMap<StreamId, ObsResult>;

/// Source of stream observations.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Observes the given streams.
    ///
    /// Implementations should return an entry for each stream id they
    /// know; ids missing from the result are treated as not observed.
    /// Unknown ids in the result are ignored by the caller.
    async fn observe(
        &self,
        stream_ids: &BTreeSet<StreamId>,
    ) -> Result<StreamValues, DataSourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_obs_result_wire_form() {
        let valid = ObsResult::valid(StreamValue::Decimal(dec!(1.5)));
        let json = serde_json::to_string(&valid).unwrap();
        assert_eq!(json, r#"{"Val":{"Type":0,"Value":"1.5"},"Valid":true}"#);
        let back: ObsResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, valid);

        let invalid = ObsResult::invalid();
        assert_eq!(serde_json::to_string(&invalid).unwrap(), r#"{"Valid":false}"#);
        let back: ObsResult = serde_json::from_str(r#"{"Valid":false}"#).unwrap();
        assert_eq!(back, invalid);
    }

    #[test]
    fn test_valid_flag_without_value_still_decodes() {
        // Decoding succeeds; rejecting this shape is the validator's job.
        let res: ObsResult = serde_json::from_str(r#"{"Valid":true}"#).unwrap();
        assert!(res.valid);
        assert!(res.value.is_none());
    }
}
