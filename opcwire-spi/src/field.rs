//! Field presence kinds.
//!
//! Every function here reads or writes one schema field through a
//! [`DataCodec`]. Length helpers (`*_bits`) return exactly the number of bits
//! the matching write emits, so message `length_in_bits` implementations can
//! be assembled from them.

use crate::error::{ParseError, SerializeError};
use crate::io::{ArrayPosition, DataCodec};
use crate::read_buffer::BitReader;
use crate::write_buffer::{write_context, WriteBuffer};
use bytes::Bytes;
use std::fmt;

// ----- simple ----------------------------------------------------------------

pub fn read_simple<C: DataCodec>(
    r: &mut BitReader,
    name: &str,
    codec: &C,
) -> Result<C::Value, ParseError> {
    codec.read(r, name)
}

pub fn write_simple<C: DataCodec>(
    w: &mut dyn WriteBuffer,
    name: &str,
    value: &C::Value,
    codec: &C,
) -> Result<(), SerializeError> {
    codec.write(w, name, value)
}

// ----- reserved --------------------------------------------------------------

/// Reads a reserved field of `bits` bits.
///
/// Returns the observed value when it differs from `expected`, after the
/// reader's reserved policy accepted the mismatch. Keep the result and hand it
/// back to [`write_reserved`] to re-encode the frame unchanged.
pub fn read_reserved(
    r: &mut BitReader,
    name: &str,
    bits: u8,
    expected: u64,
) -> Result<Option<u64>, ParseError> {
    let position = r.pos();
    let actual = r.read_unsigned(name, bits)?;
    if actual == expected {
        return Ok(None);
    }
    r.report_reserved_mismatch(name, position, expected, actual)?;
    Ok(Some(actual))
}

/// Writes a reserved field: the retained value if one was decoded, otherwise
/// the expected constant.
pub fn write_reserved(
    w: &mut dyn WriteBuffer,
    name: &str,
    bits: u8,
    expected: u64,
    retained: Option<u64>,
) -> Result<(), SerializeError> {
    w.write_unsigned(name, bits, retained.unwrap_or(expected))
}

// ----- optional --------------------------------------------------------------

/// Reads the field only when the enclosing message says it is present.
pub fn read_optional<C: DataCodec>(
    r: &mut BitReader,
    name: &str,
    present: bool,
    codec: &C,
) -> Result<Option<C::Value>, ParseError> {
    if present {
        codec.read(r, name).map(Some)
    } else {
        Ok(None)
    }
}

/// Writes the field when `present` is set. A set flag without a value is a
/// serialization error; a value without the flag is not written.
pub fn write_optional<C: DataCodec>(
    w: &mut dyn WriteBuffer,
    name: &str,
    value: Option<&C::Value>,
    present: bool,
    codec: &C,
) -> Result<(), SerializeError> {
    if !present {
        return Ok(());
    }
    match value {
        Some(value) => codec.write(w, name, value),
        None => Err(SerializeError::MissingField(name.to_string())),
    }
}

pub fn optional_bits<C: DataCodec>(value: Option<&C::Value>, present: bool, codec: &C) -> u64 {
    match value {
        Some(value) if present => codec.bit_length(value),
        _ => 0,
    }
}

// ----- implicit --------------------------------------------------------------

/// Reads a value that is never retained. The caller may still use it, for
/// example to bound a following read.
pub fn read_implicit<C: DataCodec>(
    r: &mut BitReader,
    name: &str,
    codec: &C,
) -> Result<C::Value, ParseError> {
    codec.read(r, name)
}

/// Writes a value the caller re-derived from the message.
pub fn write_implicit<C: DataCodec>(
    w: &mut dyn WriteBuffer,
    name: &str,
    derived: C::Value,
    codec: &C,
) -> Result<(), SerializeError> {
    codec.write(w, name, &derived)
}

// ----- virtual ---------------------------------------------------------------

/// Records a derived value. Emits no bits on the wire.
pub fn write_virtual(
    w: &mut dyn WriteBuffer,
    name: &str,
    value: &dyn fmt::Display,
) -> Result<(), SerializeError> {
    w.write_virtual(name, value)
}

// ----- arrays ----------------------------------------------------------------

fn element_count(name: &str, count: i64) -> Result<usize, ParseError> {
    usize::try_from(count).map_err(|_| ParseError::InvalidLength {
        field: name.to_string(),
        value: count,
    })
}

/// Reads `count` elements. The count comes from an explicit field read just
/// before, or from an already parsed sibling.
pub fn read_counted_array<C: DataCodec>(
    r: &mut BitReader,
    name: &str,
    count: i64,
    codec: &C,
) -> Result<Vec<C::Value>, ParseError> {
    let count = element_count(name, count)?;
    // the declared count is untrusted input
    let capacity = count.min(r.remaining_bits() as usize);
    r.in_context(name, |r| {
        let mut values = Vec::with_capacity(capacity);
        for index in 0..count {
            values.push(codec.read_element(r, "", ArrayPosition::new(index, count))?);
        }
        Ok(values)
    })
}

/// Writes `values` after checking them against the count already written (or
/// carried by a sibling).
pub fn write_counted_array<C: DataCodec>(
    w: &mut dyn WriteBuffer,
    name: &str,
    declared: i64,
    values: &[C::Value],
    codec: &C,
) -> Result<(), SerializeError> {
    if declared != values.len() as i64 {
        return Err(SerializeError::CountMismatch {
            field: name.to_string(),
            declared,
            actual: values.len(),
        });
    }
    write_array_elements(w, name, values, codec)
}

fn write_array_elements<C: DataCodec>(
    w: &mut dyn WriteBuffer,
    name: &str,
    values: &[C::Value],
    codec: &C,
) -> Result<(), SerializeError> {
    let count = values.len();
    write_context(w, name, |w| {
        for (index, value) in values.iter().enumerate() {
            codec.write_element(w, "", value, ArrayPosition::new(index, count))?;
        }
        Ok(())
    })
}

pub fn array_bits<C: DataCodec>(values: &[C::Value], codec: &C) -> u64 {
    values.iter().map(|value| codec.bit_length(value)).sum()
}

/// Reads a 32-bit signed count followed by that many elements. A count of
/// -1 denotes an absent array and decodes to `None`.
pub fn read_nullable_array<C: DataCodec>(
    r: &mut BitReader,
    name: &str,
    count_name: &str,
    codec: &C,
) -> Result<Option<Vec<C::Value>>, ParseError> {
    let count = r.read_signed(count_name, 32)?;
    if count == -1 {
        return Ok(None);
    }
    read_counted_array(r, name, count, codec).map(Some)
}

/// Writes the implicit count (-1 for `None`) and the elements.
pub fn write_nullable_array<C: DataCodec>(
    w: &mut dyn WriteBuffer,
    name: &str,
    count_name: &str,
    values: Option<&[C::Value]>,
    codec: &C,
) -> Result<(), SerializeError> {
    match values {
        None => w.write_signed(count_name, 32, -1),
        Some(values) => {
            let count = i32::try_from(values.len()).map_err(|_| SerializeError::ValueOutOfRange {
                field: count_name.to_string(),
                value: values.len().to_string(),
                bits: 32,
            })?;
            w.write_signed(count_name, 32, count as i64)?;
            write_array_elements(w, name, values, codec)
        }
    }
}

pub fn nullable_array_bits<C: DataCodec>(values: Option<&[C::Value]>, codec: &C) -> u64 {
    32 + values.map_or(0, |values| array_bits(values, codec))
}

// ----- byte arrays -------------------------------------------------------------

pub fn read_byte_array(r: &mut BitReader, name: &str, count: i64) -> Result<Bytes, ParseError> {
    let count = element_count(name, count)?;
    r.read_bytes(name, count)
}

pub fn write_byte_array(w: &mut dyn WriteBuffer, name: &str, value: &[u8]) -> Result<(), SerializeError> {
    w.write_bytes(name, value)
}

/// Bytes left of a message that started at bit `start` and declared a total
/// size of `total_bytes`.
pub fn remaining_bytes(r: &BitReader, start: u64, total_bytes: u64) -> Result<u64, ParseError> {
    let consumed = r.pos().saturating_sub(start);
    let total_bits = total_bytes.saturating_mul(8);
    if consumed > total_bits || (total_bits - consumed) % 8 != 0 {
        return Err(ParseError::LengthMismatch {
            region: r.context_path(),
            declared: total_bits,
            consumed,
        });
    }
    Ok((total_bits - consumed) / 8)
}

/// Reads the rest of a message that started at bit `start` and declared a
/// total size of `total_bytes`.
pub fn read_remaining_bytes(
    r: &mut BitReader,
    name: &str,
    start: u64,
    total_bytes: u64,
) -> Result<Bytes, ParseError> {
    let remaining = remaining_bytes(r, start, total_bytes)?;
    r.read_bytes(name, remaining as usize)
}

/// Runs `f` over exactly the next `bytes` bytes. The nested read must consume
/// the whole region.
pub fn read_bounded<T>(
    r: &mut BitReader,
    name: &str,
    bytes: i64,
    f: impl FnOnce(&mut BitReader) -> Result<T, ParseError>,
) -> Result<T, ParseError> {
    let bytes = element_count(name, bytes)? as u64;
    let declared = bytes * 8;
    let start = r.pos();
    let value = r.with_limit(declared, f)?;
    let consumed = r.pos() - start;
    if consumed != declared {
        return Err(ParseError::LengthMismatch {
            region: format!("{}/{}", r.context_path(), name),
            declared,
            consumed,
        });
    }
    Ok(value)
}
