use iapguard_receipt::asn1::{
    decode_attributes, decode_ia5_string, decode_integer, decode_signed_integer,
    decode_utf8_string, encode_attributes,
    encode_ia5_string, encode_integer, encode_utf8_string, first_occurrences,
};
use iapguard_receipt::{AttributeRecord, DecodeError};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

// ── Attribute sets ───────────────────────────────────────────────

#[test]
fn decode_known_bytes() {
    // SET { SEQUENCE { INTEGER 2, INTEGER 1, OCTET STRING 0c 01 41 } }
    let payload = [
        0x31, 0x0d, 0x30, 0x0b, 0x02, 0x01, 0x02, 0x02, 0x01, 0x01, 0x04, 0x03, 0x0c, 0x01, 0x41,
    ];
    let records = decode_attributes(&payload).unwrap();
    assert_eq!(records, vec![AttributeRecord::new(2, 1, vec![0x0c, 0x01, 0x41])]);
    assert_eq!(decode_utf8_string(&records[0].value), Some("A".to_string()));
}

#[test]
fn decode_empty_set() {
    assert!(decode_attributes(&[0x31, 0x00]).unwrap().is_empty());
}

#[test]
fn decode_preserves_order() {
    let records = vec![
        AttributeRecord::new(17, 1, vec![1]),
        AttributeRecord::new(2, 1, vec![2]),
        AttributeRecord::new(17, 1, vec![3]),
    ];
    let decoded = decode_attributes(&encode_attributes(&records)).unwrap();
    assert_eq!(decoded, records);
}

#[test]
fn decode_long_form_length() {
    let records = vec![AttributeRecord::new(4, 1, vec![0xab; 300])];
    let payload = encode_attributes(&records);
    // SET length needs two length octets.
    assert_eq!(payload[1], 0x82);
    assert_eq!(decode_attributes(&payload).unwrap(), records);
}

#[test]
fn decode_large_attribute_type() {
    let records = vec![AttributeRecord::new(1712, 1, vec![])];
    let decoded = decode_attributes(&encode_attributes(&records)).unwrap();
    assert_eq!(decoded[0].attribute_type, 1712);
}

#[test]
fn decode_integer_convention_shifts_bytes() {
    // SET { SEQUENCE { INTEGER 06 b0, INTEGER 1, OCTET STRING {} } }
    let payload = [
        0x31, 0x0b, 0x30, 0x09, 0x02, 0x02, 0x06, 0xb0, 0x02, 0x01, 0x01, 0x04, 0x00,
    ];
    let records = decode_attributes(&payload).unwrap();
    assert_eq!(records[0].attribute_type, 1712);
    assert_eq!(records[0].version, 1);
    assert!(records[0].value.is_empty());
}

// ── Malformed input ──────────────────────────────────────────────

#[test]
fn reject_wrong_outer_tag() {
    let err = decode_attributes(&[0x30, 0x00]).unwrap_err();
    assert_eq!(
        err,
        DecodeError::UnexpectedTag {
            expected: 17,
            found: 16
        }
    );
}

#[test]
fn reject_empty_input() {
    assert_eq!(decode_attributes(&[]).unwrap_err(), DecodeError::Truncated);
}

#[test]
fn reject_truncated_length() {
    let payload = encode_attributes(&[AttributeRecord::new(2, 1, vec![1, 2, 3])]);
    let truncated = &payload[..payload.len() - 1];
    assert_eq!(decode_attributes(truncated).unwrap_err(), DecodeError::Truncated);
}

#[test]
fn reject_indefinite_length() {
    let err = decode_attributes(&[0x31, 0x80, 0x00, 0x00]).unwrap_err();
    assert!(
        matches!(err, DecodeError::InvalidLength | DecodeError::Malformed(_)),
        "{err:?}"
    );
}

#[test]
fn reject_trailing_bytes() {
    let mut payload = encode_attributes(&[]);
    payload.extend_from_slice(&[0xff, 0xff]);
    assert_eq!(decode_attributes(&payload).unwrap_err(), DecodeError::TrailingBytes(2));
}

#[test]
fn reject_wrong_field_tag() {
    // Value is a UTF8String instead of an OCTET STRING.
    let payload = [
        0x31, 0x0a, 0x30, 0x08, 0x02, 0x01, 0x02, 0x02, 0x01, 0x01, 0x0c, 0x00,
    ];
    assert_eq!(
        decode_attributes(&payload).unwrap_err(),
        DecodeError::UnexpectedTag {
            expected: 4,
            found: 12
        }
    );
}

#[test]
fn reject_empty_integer() {
    let payload = [0x31, 0x09, 0x30, 0x07, 0x02, 0x00, 0x02, 0x01, 0x01, 0x04, 0x00];
    let err = decode_attributes(&payload).unwrap_err();
    assert!(
        matches!(err, DecodeError::InvalidLength | DecodeError::Malformed(_)),
        "{err:?}"
    );
}

#[test]
fn reject_oversized_integer() {
    let mut sequence = vec![0x02, 0x09, 0x01, 0, 0, 0, 0, 0, 0, 0, 0];
    sequence.extend_from_slice(&[0x02, 0x01, 0x01, 0x04, 0x00]);
    let mut payload = vec![0x31, (sequence.len() + 2) as u8, 0x30, sequence.len() as u8];
    payload.extend_from_slice(&sequence);
    assert_eq!(decode_attributes(&payload).unwrap_err(), DecodeError::IntegerOverflow);
}

#[test]
fn reject_extra_sequence_field() {
    let mut sequence = vec![0x02, 0x01, 0x02, 0x02, 0x01, 0x01, 0x04, 0x00];
    sequence.extend_from_slice(&[0x05, 0x00]);
    let mut payload = vec![0x31, (sequence.len() + 2) as u8, 0x30, sequence.len() as u8];
    payload.extend_from_slice(&sequence);
    assert_eq!(
        decode_attributes(&payload).unwrap_err(),
        DecodeError::FieldCount {
            expected: 3,
            found: 4
        }
    );
}

#[test]
fn reject_missing_sequence_field() {
    // SEQUENCE { INTEGER 2, INTEGER 1 }
    let payload = [0x31, 0x08, 0x30, 0x06, 0x02, 0x01, 0x02, 0x02, 0x01, 0x01];
    assert_eq!(
        decode_attributes(&payload).unwrap_err(),
        DecodeError::FieldCount {
            expected: 3,
            found: 2
        }
    );
}

#[test]
fn reject_non_sequence_item() {
    // SET { INTEGER 2 }
    let payload = [0x31, 0x03, 0x02, 0x01, 0x02];
    assert_eq!(
        decode_attributes(&payload).unwrap_err(),
        DecodeError::UnexpectedTag {
            expected: 16,
            found: 2
        }
    );
}

// ── Embedded values ──────────────────────────────────────────────

#[test]
fn utf8_string_value() {
    let value = encode_utf8_string("com.example.app");
    assert_eq!(value[0], 0x0c);
    assert_eq!(decode_utf8_string(&value), Some("com.example.app".to_string()));
}

#[test]
fn utf8_string_rejects_ia5_tag() {
    assert_eq!(decode_utf8_string(&encode_ia5_string("1.0")), None);
}

#[test]
fn utf8_string_rejects_invalid_utf8() {
    assert_eq!(decode_utf8_string(&[0x0c, 0x02, 0xc3, 0x28]), None);
}

#[test]
fn utf8_string_rejects_trailing_garbage() {
    let mut value = encode_utf8_string("abc");
    value.push(0);
    assert_eq!(decode_utf8_string(&value), None);
}

#[test]
fn ia5_string_value() {
    let value = encode_ia5_string("2014-03-01T12:00:00Z");
    assert_eq!(value[0], 0x16);
    assert_eq!(decode_ia5_string(&value), Some("2014-03-01T12:00:00Z".to_string()));
}

#[test]
fn ia5_string_rejects_non_ascii() {
    assert_eq!(decode_ia5_string(&[0x16, 0x02, 0xc3, 0xa9]), None);
}

#[test]
fn ia5_string_empty() {
    assert_eq!(decode_ia5_string(&[0x16, 0x00]), Some(String::new()));
}

#[test]
fn integer_values() {
    assert_eq!(decode_integer(&encode_integer(0)), Some(0));
    assert_eq!(decode_integer(&encode_integer(1)), Some(1));
    assert_eq!(decode_integer(&encode_integer(0x80)), Some(0x80));
    assert_eq!(decode_integer(&encode_integer(u64::MAX)), Some(u64::MAX));
    assert_eq!(encode_integer(0x80), vec![0x02, 0x02, 0x00, 0x80]);
}

#[test]
fn signed_integer_values() {
    assert_eq!(decode_signed_integer(&encode_integer(1)), Some(1));
    assert_eq!(decode_signed_integer(&encode_integer(0x80)), Some(0x80));
    assert_eq!(decode_signed_integer(&[0x02, 0x01, 0x00]), Some(0));
    assert_eq!(decode_signed_integer(&[0x02, 0x01, 0xff]), Some(-1));
    assert_eq!(decode_signed_integer(&[0x02, 0x01, 0x80]), Some(-128));
    assert_eq!(decode_signed_integer(&[0x02, 0x02, 0xff, 0x7f]), Some(-129));
    assert_eq!(decode_signed_integer(&encode_integer(u64::MAX)), None);
}

#[test]
fn unsigned_reading_ignores_sign_bit() {
    assert_eq!(decode_integer(&[0x02, 0x01, 0xff]), Some(0xff));
}

#[test]
fn integer_rejects_truncated() {
    assert_eq!(decode_integer(&[0x02, 0x02, 0x01]), None);
    assert_eq!(decode_integer(&[]), None);
}

// ── Duplicate handling ───────────────────────────────────────────

#[test]
fn first_occurrence_wins() {
    let records = vec![
        AttributeRecord::new(2, 1, vec![1]),
        AttributeRecord::new(17, 1, vec![2]),
        AttributeRecord::new(2, 1, vec![3]),
        AttributeRecord::new(17, 1, vec![4]),
    ];
    let kept: Vec<_> = first_occurrences(&records, &[17]).map(|r| r.value[0]).collect();
    assert_eq!(kept, vec![1, 2, 4]);
}

// ── Properties ───────────────────────────────────────────────────

fn record_strategy() -> impl Strategy<Value = AttributeRecord> {
    (
        any::<u64>(),
        any::<u64>(),
        prop::collection::vec(any::<u8>(), 0..400),
    )
        .prop_map(|(t, v, value)| AttributeRecord::new(t, v, value))
}

proptest! {
    /// Encoding then decoding yields the same ordered records.
    #[test]
    fn attribute_set_roundtrip(records in prop::collection::vec(record_strategy(), 0..20)) {
        let decoded = decode_attributes(&encode_attributes(&records)).unwrap();
        prop_assert_eq!(decoded, records);
    }

    /// Arbitrary bytes never panic the decoder.
    #[test]
    fn decoder_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode_attributes(&bytes);
        let _ = decode_utf8_string(&bytes);
        let _ = decode_ia5_string(&bytes);
        let _ = decode_integer(&bytes);
    }

    /// Every strict prefix of a valid payload is rejected.
    #[test]
    fn truncation_is_rejected(
        records in prop::collection::vec(record_strategy(), 1..5),
        cut in any::<prop::sample::Index>(),
    ) {
        let payload = encode_attributes(&records);
        let len = cut.index(payload.len());
        prop_assert!(decode_attributes(&payload[..len]).is_err());
    }
}
