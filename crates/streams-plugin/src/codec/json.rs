//! The canonical JSON report codec.
//!
//! Field names are PascalCase on the report body and camelCase on the
//! signed envelope. Decoding tolerates either casing per field, matching
//! the consumers already in the wild. Struct fields serialize in
//! declaration order and map keys sort naturally, so encoding the same
//! report always yields the same bytes.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use streams_common::{ChannelDefinition, ConfigDigest, StreamValue};

use crate::engine::{AttributedSignature, OracleId};
use crate::report::Report;

use super::{CodecError, ReportCodec};

/// The canonical JSON codec.
///
/// Also provides the signed transport envelope (`pack`/`unpack`) used to
/// ship attested reports to downstream consumers.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReportCodec;

#[derive(Serialize)]
struct WireReport {
    #[serde(rename = "ConfigDigest")]
    config_digest: String,
    #[serde(rename = "SeqNr")]
    seq_nr: u64,
    #[serde(rename = "ChannelID")]
    channel_id: u32,
    #[serde(rename = "ValidAfterSeconds")]
    valid_after_seconds: u32,
    #[serde(rename = "ObservationTimestampSeconds")]
    observation_timestamp_seconds: u32,
    #[serde(rename = "Values")]
    values: Vec<StreamValue>,
    #[serde(rename = "Specimen")]
    specimen: bool,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct WireReportDecode {
    #[serde(rename = "ConfigDigest", alias = "configDigest")]
    config_digest: Option<String>,
    #[serde(rename = "SeqNr", alias = "seqNr")]
    seq_nr: Option<u64>,
    #[serde(rename = "ChannelID", alias = "channelID", alias = "channelId")]
    channel_id: u32,
    #[serde(rename = "ValidAfterSeconds", alias = "validAfterSeconds")]
    valid_after_seconds: u32,
    #[serde(
        rename = "ObservationTimestampSeconds",
        alias = "observationTimestampSeconds"
    )]
    observation_timestamp_seconds: u32,
    #[serde(rename = "Values", alias = "values")]
    values: Vec<StreamValue>,
    #[serde(rename = "Specimen", alias = "specimen")]
    specimen: bool,
}

#[derive(Serialize)]
struct WireEnvelope<'a> {
    #[serde(rename = "configDigest")]
    config_digest: String,
    #[serde(rename = "seqNr")]
    seq_nr: u64,
    report: &'a RawValue,
    sigs: Vec<WireSignature>,
}

#[derive(Serialize, Deserialize)]
struct WireSignature {
    #[serde(rename = "Signature")]
    signature: String,
    #[serde(rename = "Signer")]
    signer: u8,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct WireEnvelopeDecode {
    #[serde(rename = "configDigest", alias = "ConfigDigest")]
    config_digest: Option<String>,
    #[serde(rename = "seqNr", alias = "SeqNr")]
    seq_nr: Option<u64>,
    report: Option<Box<RawValue>>,
    sigs: Vec<WireSignature>,
}

/// The contents of a signed transport envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unpacked {
    pub config_digest: ConfigDigest,
    pub seq_nr: u64,
    /// Inner report bytes, exactly as packed.
    pub report: Vec<u8>,
    pub sigs: Vec<AttributedSignature>,
}

impl JsonReportCodec {
    /// Wraps an encoded report and its signatures in the transport
    /// envelope. Fails if the report bytes are not valid JSON.
    pub fn pack(
        &self,
        config_digest: &ConfigDigest,
        seq_nr: u64,
        report: &[u8],
        sigs: &[AttributedSignature],
    ) -> Result<Vec<u8>, CodecError> {
        let report_str = std::str::from_utf8(report)?;
        let raw: &RawValue =
            serde_json::from_str(report_str).map_err(CodecError::InvalidReportJson)?;

        let envelope = WireEnvelope {
            config_digest: config_digest.to_string(),
            seq_nr,
            report: raw,
            sigs: sigs
                .iter()
                .map(|sig| WireSignature {
                    signature: BASE64.encode(&sig.signature),
                    signer: sig.signer.0,
                })
                .collect(),
        };
        Ok(serde_json::to_vec(&envelope)?)
    }

    /// Opens a transport envelope without decoding the inner report.
    pub fn unpack(&self, data: &[u8]) -> Result<Unpacked, CodecError> {
        let wire: WireEnvelopeDecode = serde_json::from_slice(data)?;

        let seq_nr = wire.seq_nr.ok_or(CodecError::MissingSeqNr)?;
        let config_digest = wire
            .config_digest
            .unwrap_or_default()
            .parse::<ConfigDigest>()
            .map_err(CodecError::InvalidConfigDigest)?;
        let report = wire
            .report
            .map(|raw| raw.get().as_bytes().to_vec())
            .unwrap_or_default();
        let sigs = wire
            .sigs
            .into_iter()
            .map(|sig| {
                Ok(AttributedSignature {
                    signature: BASE64.decode(sig.signature.as_bytes())?,
                    signer: OracleId(sig.signer),
                })
            })
            .collect::<Result<Vec<_>, CodecError>>()?;

        Ok(Unpacked {
            config_digest,
            seq_nr,
            report,
            sigs,
        })
    }

    /// Opens a transport envelope and decodes the inner report.
    pub fn unpack_decode(&self, data: &[u8]) -> Result<(Unpacked, Report), CodecError> {
        let unpacked = self.unpack(data)?;
        let report = self.decode(&unpacked.report)?;
        Ok((unpacked, report))
    }
}

impl ReportCodec for JsonReportCodec {
    fn encode(&self, report: &Report, _channel: &ChannelDefinition) -> Result<Vec<u8>, CodecError> {
        let wire = WireReport {
            config_digest: report.config_digest.to_string(),
            seq_nr: report.seq_nr,
            channel_id: report.channel_id,
            valid_after_seconds: report.valid_after_seconds,
            observation_timestamp_seconds: report.observation_timestamp_seconds,
            values: report.values.clone(),
            specimen: report.specimen,
        };
        Ok(serde_json::to_vec(&wire)?)
    }

    fn decode(&self, data: &[u8]) -> Result<Report, CodecError> {
        let wire: WireReportDecode = serde_json::from_slice(data)?;

        let seq_nr = wire.seq_nr.ok_or(CodecError::MissingSeqNr)?;
        let config_digest = wire
            .config_digest
            .unwrap_or_default()
            .parse::<ConfigDigest>()
            .map_err(CodecError::InvalidConfigDigest)?;

        Ok(Report {
            config_digest,
            seq_nr,
            channel_id: wire.channel_id,
            valid_after_seconds: wire.valid_after_seconds,
            observation_timestamp_seconds: wire.observation_timestamp_seconds,
            values: wire.values,
            specimen: wire.specimen,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use streams_common::ReportFormat;

    fn sample_report() -> Report {
        let mut digest = [0u8; 32];
        digest[..3].copy_from_slice(&[1, 2, 3]);
        Report {
            config_digest: ConfigDigest(digest),
            seq_nr: 43,
            channel_id: 46,
            valid_after_seconds: 44,
            observation_timestamp_seconds: 45,
            values: vec![StreamValue::Decimal(dec!(1))],
            specimen: true,
        }
    }

    fn sample_channel() -> ChannelDefinition {
        ChannelDefinition {
            report_format: ReportFormat::Json,
            chain_selector: streams_common::chains::TEST_CHAIN_SELECTOR,
            stream_ids: vec![7],
        }
    }

    #[test]
    fn test_decode_tolerates_camel_case() {
        let report = sample_report();
        let codec = JsonReportCodec;
        let channel = sample_channel();
        let encoded = codec.encode(&report, &channel).unwrap();
        let camel = String::from_utf8(encoded)
            .unwrap()
            .replace("\"SeqNr\"", "\"seqNr\"")
            .replace("\"ConfigDigest\"", "\"configDigest\"");
        let decoded = codec.decode(camel.as_bytes()).unwrap();
        assert_eq!(decoded, report);
    }

    #[test]
    fn test_unpack_missing_fields() {
        let codec = JsonReportCodec;
        assert!(matches!(
            codec.unpack(b"{}"),
            Err(CodecError::MissingSeqNr)
        ));
        let err = codec.unpack(br#"{"seqNr":1}"#).unwrap_err();
        assert!(err.to_string().contains("wrong length 0"));
    }

    #[test]
    fn test_unpack_rejects_bad_signature_encoding() {
        let template = |sig: &str| {
            format!(
                r#"{{"configDigest":"{}","seqNr":43,"report":{{}},"sigs":[{{"Signature":{sig},"Signer":2}}]}}"#,
                "00".repeat(32)
            )
        };
        let codec = JsonReportCodec;
        for sig in ["null", "1", "[]", r#""abc$def#ghi!""#] {
            assert!(codec.unpack(template(sig).as_bytes()).is_err(), "sig: {sig}");
        }
        // Empty string is valid base64 for an empty signature.
        let unpacked = codec.unpack(template(r#""""#).as_bytes()).unwrap();
        assert_eq!(unpacked.sigs[0].signature, Vec::<u8>::new());
    }
}
