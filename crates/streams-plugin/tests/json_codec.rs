//! JSON codec tests: exact wire vectors, round-trip properties, and
//! decoder safety on arbitrary input.

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use streams_common::chains::TEST_CHAIN_SELECTOR;
use streams_common::{ChannelDefinition, ConfigDigest, Quote, ReportFormat, StreamValue};
use streams_plugin::{AttributedSignature, CodecError, JsonReportCodec, OracleId, Report, ReportCodec};

fn digest_010203() -> ConfigDigest {
    let mut bytes = [0u8; 32];
    bytes[..3].copy_from_slice(&[1, 2, 3]);
    ConfigDigest(bytes)
}

fn any_channel() -> ChannelDefinition {
    ChannelDefinition {
        report_format: ReportFormat::Json,
        chain_selector: TEST_CHAIN_SELECTOR,
        stream_ids: vec![1, 2, 3],
    }
}

#[test]
fn test_encode_then_decode() {
    let report = Report {
        config_digest: digest_010203(),
        seq_nr: 43,
        channel_id: 46,
        valid_after_seconds: 44,
        observation_timestamp_seconds: 45,
        values: vec![
            StreamValue::Decimal(dec!(1)),
            StreamValue::Decimal(dec!(2)),
            StreamValue::Quote(Quote {
                bid: dec!(3.13),
                benchmark: dec!(4.4),
                ask: dec!(5.12),
            }),
        ],
        specimen: true,
    };

    let codec = JsonReportCodec;
    let encoded = codec.encode(&report, &any_channel()).unwrap();

    assert_eq!(
        String::from_utf8(encoded.clone()).unwrap(),
        r#"{"ConfigDigest":"0102030000000000000000000000000000000000000000000000000000000000","SeqNr":43,"ChannelID":46,"ValidAfterSeconds":44,"ObservationTimestampSeconds":45,"Values":[{"Type":0,"Value":"1"},{"Type":0,"Value":"2"},{"Type":1,"Value":"Q{Bid: 3.13, Benchmark: 4.4, Ask: 5.12}"}],"Specimen":true}"#
    );

    let decoded = codec.decode(&encoded).unwrap();
    assert_eq!(decoded, report);
}

#[test]
fn test_pack_valid_json_report() {
    let codec = JsonReportCodec;
    let sigs = vec![AttributedSignature {
        signature: vec![2, 3, 4],
        signer: OracleId(2),
    }];

    let packed = codec
        .pack(&digest_010203(), 43, br#"{"foo":"bar"}"#, &sigs)
        .unwrap();
    assert_eq!(
        String::from_utf8(packed.clone()).unwrap(),
        r#"{"configDigest":"0102030000000000000000000000000000000000000000000000000000000000","seqNr":43,"report":{"foo":"bar"},"sigs":[{"Signature":"AgME","Signer":2}]}"#
    );

    let unpacked = codec.unpack(&packed).unwrap();
    assert_eq!(unpacked.config_digest, digest_010203());
    assert_eq!(unpacked.seq_nr, 43);
    assert_eq!(unpacked.report, br#"{"foo":"bar"}"#.to_vec());
    assert_eq!(unpacked.sigs, sigs);
}

#[test]
fn test_pack_rejects_non_json_report() {
    let codec = JsonReportCodec;
    let err = codec
        .pack(&digest_010203(), 43, b"foobar", &[])
        .unwrap_err();
    assert!(
        matches!(err, CodecError::InvalidReportJson(_)),
        "unexpected error: {err}"
    );
}

#[test]
fn test_decode_rejects_missing_fields() {
    let codec = JsonReportCodec;

    let err = codec.decode(b"{}").unwrap_err();
    assert_eq!(err.to_string(), "missing SeqNr");

    let err = codec.decode(br#"{"seqNr":1}"#).unwrap_err();
    assert_eq!(err.to_string(), "invalid ConfigDigest; wrong length 0");
}

#[test]
fn test_unpack_decode() {
    let inner = r#"{"ConfigDigest":"0102030000000000000000000000000000000000000000000000000000000000","SeqNr":43,"ChannelID":46,"ValidAfterSeconds":44,"ObservationTimestampSeconds":45,"Values":[{"Type":0,"Value":"1"},{"Type":0,"Value":"2"},{"Type":1,"Value":"Q{Bid: 3.13, Benchmark: 4.4, Ask: 5.12}"}],"Specimen":true}"#;
    let packed = format!(
        r#"{{"configDigest":"0102030000000000000000000000000000000000000000000000000000000000","seqNr":43,"report":{inner},"sigs":[{{"Signature":"AgME","Signer":2}}]}}"#
    );

    let codec = JsonReportCodec;
    let (unpacked, report) = codec.unpack_decode(packed.as_bytes()).unwrap();

    assert_eq!(unpacked.config_digest, digest_010203());
    assert_eq!(unpacked.seq_nr, 43);
    assert_eq!(
        unpacked.sigs,
        vec![AttributedSignature {
            signature: vec![2, 3, 4],
            signer: OracleId(2),
        }]
    );
    assert_eq!(report.seq_nr, 43);
    assert_eq!(report.channel_id, 46);
    assert_eq!(report.values.len(), 3);
    assert_eq!(report.values[0], StreamValue::Decimal(dec!(1)));
    assert!(report.specimen);
}

#[test]
fn test_decoders_survive_fuzz_corpus() {
    let corpus: &[&[u8]] = &[
        br#"{"foo":"bar"}"#,
        b"",
        b"null",
        b"{",
        br#""random string""#,
        &[1, 2, 3],
        br#"{"SeqNr":42,"ConfigDigest":"foo"}"#,
        br#"{"SeqNr":42,"ConfigDigest":"0xdead"}"#,
        br#"{"SeqNr":42,"ConfigDigest":"0102030000000000000000000000000000000000000000000000000000000000", "Values":[{"Type":0,"Value":null},{"Type":-1,"Value":"2"}]}"#,
        br#"{"configDigest":"0102030000000000000000000000000000000000000000000000000000000000","seqNr":43,"report":{},"sigs":[{"Signature":null,"Signer":2}]}"#,
        br#"{"configDigest":"0102030000000000000000000000000000000000000000000000000000000000","seqNr":43,"report":{},"sigs":[{"Signature":1,"Signer":2}]}"#,
        br#"{"configDigest":"0102030000000000000000000000000000000000000000000000000000000000","seqNr":43,"report":{},"sigs":[{"Signature":[],"Signer":2}]}"#,
        br#"{"configDigest":"0102030000000000000000000000000000000000000000000000000000000000","seqNr":43,"report":{},"sigs":[{"Signature":"abc$def#ghi!","Signer":2}]}"#,
    ];

    let codec = JsonReportCodec;
    for data in corpus {
        // Errors are fine; panics are not.
        let _ = codec.decode(data);
        let _ = codec.unpack(data);
        let _ = codec.unpack_decode(data);
    }
}

fn arb_decimal() -> impl Strategy<Value = Decimal> {
    (any::<i64>(), 0u32..=10).prop_map(|(mantissa, scale)| Decimal::new(mantissa, scale))
}

fn arb_stream_value() -> impl Strategy<Value = StreamValue> {
    prop_oneof![
        arb_decimal().prop_map(StreamValue::Decimal),
        (arb_decimal(), arb_decimal(), arb_decimal()).prop_map(|(bid, benchmark, ask)| {
            StreamValue::Quote(Quote {
                bid,
                benchmark,
                ask,
            })
        }),
    ]
}

fn arb_report() -> impl Strategy<Value = Report> {
    (
        any::<[u8; 32]>(),
        1u64..=u64::MAX,
        any::<u32>(),
        any::<u32>(),
        any::<u32>(),
        proptest::collection::vec(arb_stream_value(), 0..8),
        any::<bool>(),
    )
        .prop_map(
            |(digest, seq_nr, channel_id, valid_after, observation_ts, values, specimen)| Report {
                config_digest: ConfigDigest(digest),
                seq_nr,
                channel_id,
                valid_after_seconds: valid_after,
                observation_timestamp_seconds: observation_ts,
                values,
                specimen,
            },
        )
}

fn arb_sigs() -> impl Strategy<Value = Vec<AttributedSignature>> {
    proptest::collection::vec(
        (proptest::collection::vec(any::<u8>(), 0..96), any::<u8>()).prop_map(
            |(signature, signer)| AttributedSignature {
                signature,
                signer: OracleId(signer),
            },
        ),
        0..4,
    )
}

proptest! {
    #[test]
    fn prop_encode_decode_round_trip(report in arb_report()) {
        let codec = JsonReportCodec;
        let encoded = codec.encode(&report, &any_channel()).unwrap();
        let decoded = codec.decode(&encoded).unwrap();
        prop_assert_eq!(decoded, report);
    }

    #[test]
    fn prop_pack_unpack_round_trip(
        digest in any::<[u8; 32]>(),
        seq_nr in 1u64..=u64::MAX,
        sigs in arb_sigs(),
    ) {
        let codec = JsonReportCodec;
        let digest = ConfigDigest(digest);
        let report = br#"{"foo":"bar"}"#;

        let packed = codec.pack(&digest, seq_nr, report, &sigs).unwrap();
        let unpacked = codec.unpack(&packed).unwrap();

        prop_assert_eq!(unpacked.config_digest, digest);
        prop_assert_eq!(unpacked.seq_nr, seq_nr);
        prop_assert_eq!(unpacked.report, report.to_vec());
        prop_assert_eq!(unpacked.sigs, sigs);
    }

    #[test]
    fn prop_decoders_never_panic(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        let codec = JsonReportCodec;
        let _ = codec.decode(&data);
        let _ = codec.unpack(&data);
        let _ = codec.unpack_decode(&data);
    }
}
