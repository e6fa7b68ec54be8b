//! The stream value model.
//!
//! A stream produces tagged scalar values. Two variants exist today:
//! plain decimals and bid/benchmark/ask quotes. The numeric type tag is
//! persisted on the wire so decoders can reject unknown variants instead
//! of guessing.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::de::Error as _;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Wire tag for [`StreamValue::Decimal`].
pub const VALUE_TYPE_DECIMAL: i64 = 0;

/// Wire tag for [`StreamValue::Quote`].
pub const VALUE_TYPE_QUOTE: i64 = 1;

/// Errors decoding a stream value from its wire form.
#[derive(Debug, Error)]
pub enum ValueError {
    /// The type tag is not one of the known variants.
    #[error("unknown stream value type {0}")]
    UnknownType(i64),

    /// The tag was valid but the value string was absent.
    #[error("stream value of type {0} carries no value")]
    MissingValue(i64),

    /// The value string did not parse as a decimal.
    #[error("invalid decimal {0:?}: {1}")]
    InvalidDecimal(String, rust_decimal::Error),

    /// The value string did not parse as a quote.
    #[error("invalid quote {0:?}")]
    InvalidQuote(String),
}

/// A bid/benchmark/ask triple observed from a quoted market.
///
/// Producers guarantee `bid <= benchmark <= ask`; the consensus core does
/// not re-check the relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub bid: Decimal,
    pub benchmark: Decimal,
    pub ask: Decimal,
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Q{{Bid: {}, Benchmark: {}, Ask: {}}}",
            self.bid, self.benchmark, self.ask
        )
    }
}

impl FromStr for Quote {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValueError::InvalidQuote(s.to_string());
        let inner = s
            .strip_prefix("Q{")
            .and_then(|rest| rest.strip_suffix('}'))
            .ok_or_else(invalid)?;

        let mut parts = inner.split(", ");
        let mut field = |name: &str| -> Result<Decimal, ValueError> {
            let part = parts.next().ok_or_else(invalid)?;
            let raw = part
                .strip_prefix(name)
                .and_then(|rest| rest.strip_prefix(": "))
                .ok_or_else(invalid)?;
            Decimal::from_str(raw).map_err(|_| invalid())
        };

        let bid = field("Bid")?;
        let benchmark = field("Benchmark")?;
        let ask = field("Ask")?;
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Quote {
            bid,
            benchmark,
            ask,
        })
    }
}

/// A single observed value for one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamValue {
    /// An arbitrary-precision signed decimal.
    Decimal(Decimal),
    /// A bid/benchmark/ask quote.
    Quote(Quote),
}

impl StreamValue {
    /// The numeric type tag persisted on the wire.
    pub fn type_tag(&self) -> i64 {
        match self {
            StreamValue::Decimal(_) => VALUE_TYPE_DECIMAL,
            StreamValue::Quote(_) => VALUE_TYPE_QUOTE,
        }
    }

    /// The string form persisted on the wire.
    pub fn wire_value(&self) -> String {
        match self {
            StreamValue::Decimal(d) => d.to_string(),
            StreamValue::Quote(q) => q.to_string(),
        }
    }

    /// Reconstructs a value from its wire tag and string form.
    pub fn from_wire(type_tag: i64, value: Option<&str>) -> Result<Self, ValueError> {
        let value = value.ok_or(ValueError::MissingValue(type_tag))?;
        match type_tag {
            VALUE_TYPE_DECIMAL => Decimal::from_str(value)
                .map(StreamValue::Decimal)
                .map_err(|e| ValueError::InvalidDecimal(value.to_string(), e)),
            VALUE_TYPE_QUOTE => value.parse().map(StreamValue::Quote),
            other => Err(ValueError::UnknownType(other)),
        }
    }

    /// Ordering used to rank values of one stream when selecting a median.
    ///
    /// Decimals compare by numeric value, quotes by benchmark. Values of
    /// different variants do not compare; a stream mixing variants is
    /// invalid and must not produce a median.
    pub fn rank_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (StreamValue::Decimal(a), StreamValue::Decimal(b)) => Some(a.cmp(b)),
            (StreamValue::Quote(a), StreamValue::Quote(b)) => {
                Some(a.benchmark.cmp(&b.benchmark))
            }
            _ => None,
        }
    }
}

impl From<Decimal> for StreamValue {
    fn from(d: Decimal) -> Self {
        StreamValue::Decimal(d)
    }
}

impl From<Quote> for StreamValue {
    fn from(q: Quote) -> Self {
        StreamValue::Quote(q)
    }
}

impl Serialize for StreamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("StreamValue", 2)?;
        st.serialize_field("Type", &self.type_tag())?;
        st.serialize_field("Value", &self.wire_value())?;
        st.end()
    }
}

#[derive(Deserialize)]
struct WireStreamValue {
    #[serde(rename = "Type")]
    type_tag: i64,
    #[serde(rename = "Value", default)]
    value: Option<String>,
}

impl<'de> Deserialize<'de> for StreamValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireStreamValue::deserialize(deserializer)?;
        StreamValue::from_wire(wire.type_tag, wire.value.as_deref()).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_decimal_wire_form() {
        let v = StreamValue::Decimal(dec!(1));
        assert_eq!(serde_json::to_string(&v).unwrap(), r#"{"Type":0,"Value":"1"}"#);

        let parsed: StreamValue = serde_json::from_str(r#"{"Type":0,"Value":"1"}"#).unwrap();
        assert_eq!(parsed, v);
    }

    #[test]
    fn test_quote_wire_form() {
        let v = StreamValue::Quote(Quote {
            bid: dec!(3.13),
            benchmark: dec!(4.4),
            ask: dec!(5.12),
        });
        assert_eq!(
            serde_json::to_string(&v).unwrap(),
            r#"{"Type":1,"Value":"Q{Bid: 3.13, Benchmark: 4.4, Ask: 5.12}"}"#
        );

        let parsed: StreamValue = serde_json::from_str(
            r#"{"Type":1,"Value":"Q{Bid: 3.13, Benchmark: 4.4, Ask: 5.12}"}"#,
        )
        .unwrap();
        assert_eq!(parsed, v);
    }

    #[test]
    fn test_negative_and_high_precision_decimals() {
        for s in ["-1.5", "0", "123456789.000000001", "-0.0000000001"] {
            let v = StreamValue::from_wire(VALUE_TYPE_DECIMAL, Some(s)).unwrap();
            let json = serde_json::to_string(&v).unwrap();
            let back: StreamValue = serde_json::from_str(&json).unwrap();
            assert_eq!(back, v);
        }
    }

    #[test]
    fn test_unknown_type_tag_fails() {
        assert!(matches!(
            StreamValue::from_wire(-1, Some("2")),
            Err(ValueError::UnknownType(-1))
        ));
        assert!(matches!(
            StreamValue::from_wire(7, Some("2")),
            Err(ValueError::UnknownType(7))
        ));
        assert!(serde_json::from_str::<StreamValue>(r#"{"Type":-1,"Value":"2"}"#).is_err());
    }

    #[test]
    fn test_null_value_fails() {
        assert!(matches!(
            StreamValue::from_wire(VALUE_TYPE_DECIMAL, None),
            Err(ValueError::MissingValue(0))
        ));
        assert!(serde_json::from_str::<StreamValue>(r#"{"Type":0,"Value":null}"#).is_err());
        assert!(serde_json::from_str::<StreamValue>(r#"{"Type":0}"#).is_err());
    }

    #[test]
    fn test_malformed_quote_strings_fail() {
        for s in [
            "",
            "Q{}",
            "Q{Bid: 1}",
            "Q{Bid: 1, Benchmark: 2, Ask: x}",
            "Q{Bid: 1, Benchmark: 2, Ask: 3",
            "Q{Ask: 1, Benchmark: 2, Bid: 3}",
            "Q{Bid: 1, Benchmark: 2, Ask: 3, Extra: 4}",
        ] {
            assert!(s.parse::<Quote>().is_err(), "expected parse failure: {s:?}");
        }
    }

    #[test]
    fn test_rank_ordering() {
        let a = StreamValue::Decimal(dec!(1));
        let b = StreamValue::Decimal(dec!(2));
        assert_eq!(a.rank_cmp(&b), Some(Ordering::Less));

        let qa = StreamValue::Quote(Quote {
            bid: dec!(0.9),
            benchmark: dec!(1),
            ask: dec!(1.1),
        });
        let qb = StreamValue::Quote(Quote {
            bid: dec!(5),
            benchmark: dec!(2),
            ask: dec!(5),
        });
        // Quotes rank by benchmark only.
        assert_eq!(qa.rank_cmp(&qb), Some(Ordering::Less));

        // Mixed variants do not compare.
        assert_eq!(a.rank_cmp(&qa), None);
        assert_eq!(qa.rank_cmp(&a), None);
    }
}
