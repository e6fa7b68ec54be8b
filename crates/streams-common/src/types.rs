//! Identifier types and wire tags shared across the plugin.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Identifies a single observed data stream (e.g. one price feed).
pub type StreamId = u32;

/// Identifies a report channel: a named grouping of streams that is
/// reported on together.
pub type ChannelId = u32;

/// Maximum number of channel-removal votes a single observation may carry.
pub const MAX_OBSERVATION_REMOVE_CHANNEL_IDS: usize = 5;

/// Maximum number of channel-addition votes a single observation may carry.
pub const MAX_OBSERVATION_ADD_CHANNEL_DEFINITIONS: usize = 5;

/// Maximum number of stream values a single observation may carry.
pub const MAX_OBSERVATION_STREAM_VALUES: usize = 1_000;

/// Maximum number of channel definitions an outcome may accumulate.
pub const MAX_OUTCOME_CHANNEL_DEFINITIONS: usize = 500;

/// Errors converting raw bytes or strings into a [`ConfigDigest`].
#[derive(Debug, Error)]
pub enum ConfigDigestError {
    /// The input did not have exactly 32 bytes.
    #[error("wrong length {0}")]
    WrongLength(usize),

    /// The input was not valid hex.
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// 32-byte identifier of a protocol configuration.
///
/// Rendered on the wire as 64 lower-case hex characters without a prefix.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ConfigDigest(pub [u8; 32]);

impl ConfigDigest {
    /// Returns the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl TryFrom<&[u8]> for ConfigDigest {
    type Error = ConfigDigestError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ConfigDigestError::WrongLength(bytes.len()))?;
        Ok(ConfigDigest(arr))
    }
}

impl FromStr for ConfigDigest {
    type Err = ConfigDigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        ConfigDigest::try_from(bytes.as_slice())
    }
}

impl fmt::Display for ConfigDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ConfigDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigDigest({})", hex::encode(self.0))
    }
}

impl Serialize for ConfigDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for ConfigDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// An unrecognized report format tag.
#[derive(Debug, Error)]
#[error("unknown report format {0:?}")]
pub struct ReportFormatError(pub String);

/// Destination encoding for a channel's reports.
///
/// The tag strings are stored on-chain and constrained to 8 characters.
/// The plugin ships a codec for `Json`; the other formats plug in through
/// the codec registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Evm,
    Json,
    Solana,
    Cosmos,
    Starknet,
}

impl ReportFormat {
    /// The on-chain tag string for this format.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Evm => "evm",
            ReportFormat::Json => "json",
            ReportFormat::Solana => "solana",
            ReportFormat::Cosmos => "cosmos",
            ReportFormat::Starknet => "starknet",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = ReportFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "evm" => Ok(ReportFormat::Evm),
            "json" => Ok(ReportFormat::Json),
            "solana" => Ok(ReportFormat::Solana),
            "cosmos" => Ok(ReportFormat::Cosmos),
            "starknet" => Ok(ReportFormat::Starknet),
            _ => Err(ReportFormatError(s.to_string())),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stage of a protocol instance's lifecycle.
///
/// Instances start in `Staging` (when configured with a predecessor) or
/// `Production`, and may later be voted into `Retired`, which is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifeCycleStage {
    /// Shadow-running next to a production instance; reports are specimen.
    Staging,
    /// Live; reports are valid for on-chain consumption.
    Production,
    /// Voted out; emits a retirement report each round until torn down.
    Retired,
}

impl fmt::Display for LifeCycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifeCycleStage::Staging => write!(f, "staging"),
            LifeCycleStage::Production => write!(f, "production"),
            LifeCycleStage::Retired => write!(f, "retired"),
        }
    }
}

/// Serde helper: `Vec<u8>` as a lower-case hex string.
///
/// Used for opaque byte fields on the observation wire format, where raw
/// byte arrays would not be valid JSON.
pub mod serde_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_digest_hex_round_trip() {
        let mut bytes = [0u8; 32];
        bytes[0] = 1;
        bytes[1] = 2;
        bytes[2] = 3;
        let digest = ConfigDigest(bytes);
        let hex = digest.to_string();
        assert_eq!(
            hex,
            "0102030000000000000000000000000000000000000000000000000000000000"
        );
        assert_eq!(hex.parse::<ConfigDigest>().unwrap(), digest);
    }

    #[test]
    fn test_config_digest_wrong_length() {
        let err = ConfigDigest::try_from(&[1u8, 2, 3][..]).unwrap_err();
        assert_eq!(err.to_string(), "wrong length 3");

        let err = "".parse::<ConfigDigest>().unwrap_err();
        assert_eq!(err.to_string(), "wrong length 0");
    }

    #[test]
    fn test_config_digest_bad_hex() {
        assert!("zzzz".parse::<ConfigDigest>().is_err());
        assert!("0xdead".parse::<ConfigDigest>().is_err());
    }

    #[test]
    fn test_report_format_tags() {
        for (format, tag) in [
            (ReportFormat::Evm, "evm"),
            (ReportFormat::Json, "json"),
            (ReportFormat::Solana, "solana"),
            (ReportFormat::Cosmos, "cosmos"),
            (ReportFormat::Starknet, "starknet"),
        ] {
            assert_eq!(format.as_str(), tag);
            assert_eq!(tag.parse::<ReportFormat>().unwrap(), format);
            // On-chain storage constrains tags to 8 chars.
            assert!(tag.len() <= 8);
        }
        assert!("protobuf".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn test_lifecycle_stage_wire_strings() {
        let json = serde_json::to_string(&LifeCycleStage::Staging).unwrap();
        assert_eq!(json, "\"staging\"");
        let parsed: LifeCycleStage = serde_json::from_str("\"retired\"").unwrap();
        assert_eq!(parsed, LifeCycleStage::Retired);
        assert!(serde_json::from_str::<LifeCycleStage>("\"paused\"").is_err());
    }
}
