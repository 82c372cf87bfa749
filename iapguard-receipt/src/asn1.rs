//! Codec for the receipt attribute schema.
//!
//! A receipt payload is a DER `SET OF SEQUENCE { type INTEGER, version
//! INTEGER, value OCTET STRING }`. Text attributes carry a UTF8String or an
//! IA5String inside the OCTET STRING; numeric ones carry an INTEGER.
//!
//! Parsing goes through `der-parser`. Integers are then read as big-endian
//! unsigned values by shifting in each content byte, which is not
//! two's-complement ASN.1 semantics: attribute types and versions are never
//! negative. Quantities use [`decode_signed_integer`] so a negative value is
//! not mistaken for a large one.
//!
//! The encoder writes the same schema for fixtures and tooling.

use crate::error::DecodeError;
use der_parser::ber::{BerObject, BerObjectContent, Tag};
use der_parser::der::parse_der_with_tag;
use der_parser::error::BerError;
use der_parser::nom;
use std::collections::HashSet;

/// Identifier octets used by the encoder.
pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_UTF8_STRING: u8 = 0x0c;
pub const TAG_IA5_STRING: u8 = 0x16;
pub const TAG_SEQUENCE: u8 = 0x30;
pub const TAG_SET: u8 = 0x31;

/// One `{type, version, value}` record of a decoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRecord {
    pub attribute_type: u64,
    pub version: u64,
    pub value: Vec<u8>,
}

impl AttributeRecord {
    pub fn new(attribute_type: u64, version: u64, value: impl Into<Vec<u8>>) -> Self {
        Self {
            attribute_type,
            version,
            value: value.into(),
        }
    }
}

fn decode_error(err: nom::Err<BerError>) -> DecodeError {
    match err {
        nom::Err::Incomplete(_) => DecodeError::Truncated,
        nom::Err::Error(e) | nom::Err::Failure(e) => match e {
            BerError::Incomplete(_) => DecodeError::Truncated,
            BerError::UnexpectedTag {
                expected: Some(expected),
                actual,
            } => DecodeError::UnexpectedTag {
                expected: expected.0,
                found: actual.0,
            },
            BerError::InvalidLength | BerError::IndefiniteLengthUnexpected => {
                DecodeError::InvalidLength
            }
            other => DecodeError::Malformed(other.to_string()),
        },
    }
}

fn expect_tag(object: &BerObject<'_>, tag: Tag) -> Result<(), DecodeError> {
    let found = object.header.tag();
    if found == tag {
        Ok(())
    } else {
        Err(DecodeError::UnexpectedTag {
            expected: tag.0,
            found: found.0,
        })
    }
}

/// Shifts each content byte in as an unsigned big-endian value.
fn integer_from_content(content: &[u8]) -> Result<u64, DecodeError> {
    if content.is_empty() {
        return Err(DecodeError::InvalidLength);
    }
    let start = content.iter().position(|b| *b != 0).unwrap_or(content.len());
    let significant = &content[start..];
    if significant.len() > 8 {
        return Err(DecodeError::IntegerOverflow);
    }
    Ok(significant
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte)))
}

fn integer_field(object: &BerObject<'_>) -> Result<u64, DecodeError> {
    expect_tag(object, Tag::Integer)?;
    match object.content {
        BerObjectContent::Integer(content) => integer_from_content(content),
        _ => Err(DecodeError::Malformed("INTEGER without content".to_string())),
    }
}

fn octet_string_field<'a>(object: &BerObject<'a>) -> Result<&'a [u8], DecodeError> {
    expect_tag(object, Tag::OctetString)?;
    match object.content {
        BerObjectContent::OctetString(content) => Ok(content),
        _ => Err(DecodeError::Malformed("constructed OCTET STRING".to_string())),
    }
}

fn attribute_record(item: &BerObject<'_>) -> Result<AttributeRecord, DecodeError> {
    expect_tag(item, Tag::Sequence)?;
    let BerObjectContent::Sequence(fields) = &item.content else {
        return Err(DecodeError::Malformed("primitive SEQUENCE".to_string()));
    };
    let [attribute_type, version, value] = fields.as_slice() else {
        return Err(DecodeError::FieldCount {
            expected: 3,
            found: fields.len(),
        });
    };
    Ok(AttributeRecord {
        attribute_type: integer_field(attribute_type)?,
        version: integer_field(version)?,
        value: octet_string_field(value)?.to_vec(),
    })
}

/// Decodes a payload into its records, in encoding order.
///
/// # Errors
///
/// Returns a [`DecodeError`] on any structural problem. There is no recovery:
/// a single bad record rejects the whole payload.
pub fn decode_attributes(payload: &[u8]) -> Result<Vec<AttributeRecord>, DecodeError> {
    let (rest, set) = parse_der_with_tag(payload, Tag::Set).map_err(decode_error)?;
    if !rest.is_empty() {
        return Err(DecodeError::TrailingBytes(rest.len()));
    }
    let BerObjectContent::Set(items) = &set.content else {
        return Err(DecodeError::Malformed("primitive SET".to_string()));
    };
    items.iter().map(attribute_record).collect()
}

/// Yields each record whose type has not appeared earlier in `records`.
///
/// Types listed in `repeatable` are always yielded. For every other type the
/// first occurrence is authoritative and later duplicates are skipped.
pub fn first_occurrences<'a>(
    records: &'a [AttributeRecord],
    repeatable: &'a [u64],
) -> impl Iterator<Item = &'a AttributeRecord> + 'a {
    let mut seen = HashSet::new();
    records.iter().filter(move |record| {
        repeatable.contains(&record.attribute_type) || seen.insert(record.attribute_type)
    })
}

/// The single `tag` element that makes up `value`, if it does.
fn embedded_object(value: &[u8], tag: Tag) -> Option<BerObject<'_>> {
    let (rest, object) = parse_der_with_tag(value, tag).ok()?;
    rest.is_empty().then_some(object)
}

/// Reads an attribute value holding a UTF8String.
#[must_use]
pub fn decode_utf8_string(value: &[u8]) -> Option<String> {
    match embedded_object(value, Tag::Utf8String)?.content {
        BerObjectContent::UTF8String(text) => Some(text.to_owned()),
        _ => None,
    }
}

/// Reads an attribute value holding an IA5String (7-bit ASCII).
#[must_use]
pub fn decode_ia5_string(value: &[u8]) -> Option<String> {
    match embedded_object(value, Tag::Ia5String)?.content {
        BerObjectContent::IA5String(text) if text.is_ascii() => Some(text.to_owned()),
        _ => None,
    }
}

fn embedded_integer_content(value: &[u8]) -> Option<&[u8]> {
    match embedded_object(value, Tag::Integer)?.content {
        BerObjectContent::Integer(content) => Some(content),
        _ => None,
    }
}

/// Reads an attribute value holding an INTEGER, as an unsigned number.
#[must_use]
pub fn decode_integer(value: &[u8]) -> Option<u64> {
    integer_from_content(embedded_integer_content(value)?).ok()
}

/// Reads an attribute value holding an INTEGER, honouring its sign bit.
///
/// For fields where a negative value must be told apart from a large one,
/// such as purchase quantities.
#[must_use]
pub fn decode_signed_integer(value: &[u8]) -> Option<i64> {
    let content = embedded_integer_content(value)?;
    match content.first() {
        Some(first) if first & 0x80 != 0 => {
            if content.len() > 8 {
                return None;
            }
            Some(
                content
                    .iter()
                    .fold(-1i64, |acc, byte| (acc << 8) | i64::from(*byte)),
            )
        }
        _ => i64::try_from(integer_from_content(content).ok()?).ok(),
    }
}

fn write_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    out.push(0x80 | (bytes.len() - start) as u8);
    out.extend_from_slice(&bytes[start..]);
}

fn write_element(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
    out.push(tag);
    write_length(out, content.len());
    out.extend_from_slice(content);
}

fn integer_content(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    let mut content = Vec::with_capacity(9);
    // Keep the DER sign bit clear for values with the top bit set.
    if bytes[start] & 0x80 != 0 {
        content.push(0);
    }
    content.extend_from_slice(&bytes[start..]);
    content
}

/// Encodes records as a payload that [`decode_attributes`] accepts.
#[must_use]
pub fn encode_attributes(records: &[AttributeRecord]) -> Vec<u8> {
    let mut items = Vec::new();
    for record in records {
        let mut fields = Vec::with_capacity(record.value.len() + 16);
        write_element(&mut fields, TAG_INTEGER, &integer_content(record.attribute_type));
        write_element(&mut fields, TAG_INTEGER, &integer_content(record.version));
        write_element(&mut fields, TAG_OCTET_STRING, &record.value);
        write_element(&mut items, TAG_SEQUENCE, &fields);
    }
    let mut out = Vec::with_capacity(items.len() + 6);
    write_element(&mut out, TAG_SET, &items);
    out
}

/// Wraps text as a UTF8String attribute value.
#[must_use]
pub fn encode_utf8_string(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + 4);
    write_element(&mut out, TAG_UTF8_STRING, text.as_bytes());
    out
}

/// Wraps text as an IA5String attribute value. `text` must be ASCII.
#[must_use]
pub fn encode_ia5_string(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + 4);
    write_element(&mut out, TAG_IA5_STRING, text.as_bytes());
    out
}

/// Wraps a number as an INTEGER attribute value.
#[must_use]
pub fn encode_integer(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(11);
    write_element(&mut out, TAG_INTEGER, &integer_content(value));
    out
}
