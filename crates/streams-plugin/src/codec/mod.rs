//! Report codec registry.
//!
//! Each channel names the wire format of its reports; the registry maps
//! that tag to an encoder/decoder pair. The JSON codec ships with the
//! plugin and doubles as the canonical observation/outcome wire format;
//! chain-specific codecs (EVM, Solana, ...) are registered by the host.

mod json;

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use streams_common::{ChannelDefinition, ConfigDigestError, ReportFormat};

use crate::report::Report;

pub use json::{JsonReportCodec, Unpacked};

/// Errors produced by report codecs.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The report carries no sequence number.
    #[error("missing SeqNr")]
    MissingSeqNr,

    /// The config digest field did not decode to 32 bytes.
    #[error("invalid ConfigDigest; {0}")]
    InvalidConfigDigest(ConfigDigestError),

    /// The payload was not valid JSON (or violated the schema).
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The inner report handed to `pack` was not valid JSON.
    #[error("report is not valid json: {0}")]
    InvalidReportJson(#[source] serde_json::Error),

    /// The inner report handed to `pack` was not valid UTF-8.
    #[error("report is not valid utf-8: {0}")]
    InvalidReportUtf8(#[from] std::str::Utf8Error),

    /// A signature field was not valid base64.
    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] base64::DecodeError),
}

/// Encoder/decoder pair for one report format.
///
/// `encode` receives the channel definition alongside the report: formats
/// addressing a destination chain read the chain selector (and anything
/// else they need) from there.
pub trait ReportCodec: Send + Sync {
    fn encode(&self, report: &Report, channel: &ChannelDefinition) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, data: &[u8]) -> Result<Report, CodecError>;
}

/// Maps report format tags to codecs.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: HashMap<ReportFormat, Arc<dyn ReportCodec>>,
}

impl CodecRegistry {
    /// A registry with the canonical JSON codec pre-registered.
    pub fn new() -> Self {
        let mut codecs: HashMap<ReportFormat, Arc<dyn ReportCodec>> = HashMap::new();
        codecs.insert(ReportFormat::Json, Arc::new(JsonReportCodec));
        Self { codecs }
    }

    /// Registers (or replaces) the codec for a format.
    pub fn with_codec(mut self, format: ReportFormat, codec: Arc<dyn ReportCodec>) -> Self {
        self.codecs.insert(format, codec);
        self
    }

    /// The codec registered for a format, if any.
    pub fn get(&self, format: ReportFormat) -> Option<Arc<dyn ReportCodec>> {
        self.codecs.get(&format).cloned()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}
