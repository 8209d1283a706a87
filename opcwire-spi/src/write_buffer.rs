//! Bit-level write side.
//!
//! Messages serialize against the [`WriteBuffer`] trait. [`BitWriter`] packs
//! the wire bytes; [`crate::tree::TreeWriter`] records the same calls as a
//! labeled tree for debugging and structural comparison.

use crate::error::SerializeError;
use crate::options::{ByteOrder, CodecOptions, StringEncoding};
use crate::read_buffer::apply_byte_order;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// Sink for serialized fields.
pub trait WriteBuffer {
    /// Number of bits written so far.
    fn pos(&self) -> u64;

    fn byte_order(&self) -> ByteOrder;

    /// Opens a named field group. Writes no bits.
    fn push_context(&mut self, name: &str);

    /// Closes the innermost field group, which must be `name`.
    fn pop_context(&mut self, name: &str) -> Result<(), SerializeError>;

    fn write_bit(&mut self, name: &str, value: bool) -> Result<(), SerializeError>;

    fn write_unsigned(&mut self, name: &str, bits: u8, value: u64) -> Result<(), SerializeError>;

    fn write_signed(&mut self, name: &str, bits: u8, value: i64) -> Result<(), SerializeError>;

    fn write_f32(&mut self, name: &str, value: f32) -> Result<(), SerializeError>;

    fn write_f64(&mut self, name: &str, value: f64) -> Result<(), SerializeError>;

    fn write_bytes(&mut self, name: &str, value: &[u8]) -> Result<(), SerializeError>;

    /// Writes `value` into exactly `bits` bits, zero padded.
    fn write_string(
        &mut self,
        name: &str,
        bits: u64,
        encoding: StringEncoding,
        value: &str,
    ) -> Result<(), SerializeError>;

    /// Records a derived value that never reaches the wire.
    fn write_virtual(&mut self, _name: &str, _value: &dyn fmt::Display) -> Result<(), SerializeError> {
        Ok(())
    }
}

/// Runs `f` inside a named field group. The group is closed again even when
/// `f` fails.
pub fn write_context<T>(
    w: &mut dyn WriteBuffer,
    name: &str,
    f: impl FnOnce(&mut dyn WriteBuffer) -> Result<T, SerializeError>,
) -> Result<T, SerializeError> {
    w.push_context(name);
    let result = f(&mut *w);
    let popped = w.pop_context(name);
    let value = result?;
    popped?;
    Ok(value)
}

pub(crate) fn check_width(kind: &'static str, bits: u8) -> Result<(), SerializeError> {
    if bits == 0 || bits > 64 {
        return Err(SerializeError::InvalidWidth {
            kind,
            bits: bits as u64,
            max: 64,
        });
    }
    Ok(())
}

pub(crate) fn check_unsigned_range(name: &str, bits: u8, value: u64) -> Result<(), SerializeError> {
    if bits < 64 && value >> bits != 0 {
        return Err(SerializeError::ValueOutOfRange {
            field: name.to_string(),
            value: value.to_string(),
            bits: bits as u64,
        });
    }
    Ok(())
}

pub(crate) fn check_signed_range(name: &str, bits: u8, value: i64) -> Result<(), SerializeError> {
    if bits < 64 {
        let min = -(1i64 << (bits - 1));
        let max = (1i64 << (bits - 1)) - 1;
        if value < min || value > max {
            return Err(SerializeError::ValueOutOfRange {
                field: name.to_string(),
                value: value.to_string(),
                bits: bits as u64,
            });
        }
    }
    Ok(())
}

/// Encodes `value` into the byte representation of `encoding`.
pub(crate) fn encode_string(
    name: &str,
    encoding: StringEncoding,
    order: ByteOrder,
    value: &str,
) -> Result<Vec<u8>, SerializeError> {
    match encoding {
        StringEncoding::Utf8 => Ok(value.as_bytes().to_vec()),
        StringEncoding::Ascii => {
            if value.is_ascii() {
                Ok(value.as_bytes().to_vec())
            } else {
                Err(SerializeError::InvalidString {
                    field: name.to_string(),
                    encoding: encoding.name(),
                })
            }
        }
        StringEncoding::Utf16 => Ok(value
            .encode_utf16()
            .flat_map(|unit| match order {
                ByteOrder::BigEndian => unit.to_be_bytes(),
                ByteOrder::LittleEndian => unit.to_le_bytes(),
            })
            .collect()),
    }
}

/// Packs fields MSB-first into a growable byte buffer.
#[derive(Debug, Clone)]
pub struct BitWriter {
    buf: BytesMut,
    pos: u64,
    options: CodecOptions,
    contexts: Vec<String>,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::with_options(CodecOptions::default())
    }

    pub fn with_options(options: CodecOptions) -> Self {
        Self::with_capacity(0, options)
    }

    /// Creates a writer with room for `bytes` bytes.
    pub fn with_capacity(bytes: usize, options: CodecOptions) -> Self {
        Self {
            buf: BytesMut::with_capacity(bytes),
            pos: 0,
            options,
            contexts: Vec::new(),
        }
    }

    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    /// Number of currently open field groups.
    pub fn depth(&self) -> usize {
        self.contexts.len()
    }

    /// The bytes written so far. A partially written last byte is zero padded.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    fn put_bits(&mut self, value: u64, bits: u64) {
        if self.pos % 8 == 0 && bits % 8 == 0 {
            for shift in (0..bits / 8).rev() {
                self.buf.put_u8((value >> (shift * 8)) as u8);
            }
            self.pos += bits;
            return;
        }
        let mut remaining = bits;
        while remaining > 0 {
            let offset = self.pos % 8;
            if offset == 0 {
                self.buf.put_u8(0);
            }
            let avail = 8 - offset;
            let take = avail.min(remaining);
            let chunk = ((value >> (remaining - take)) & ((1u64 << take) - 1)) as u8;
            let idx = (self.pos / 8) as usize;
            self.buf[idx] |= chunk << (avail - take);
            remaining -= take;
            self.pos += take;
        }
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteBuffer for BitWriter {
    fn pos(&self) -> u64 {
        self.pos
    }

    fn byte_order(&self) -> ByteOrder {
        self.options.byte_order
    }

    fn push_context(&mut self, name: &str) {
        self.contexts.push(name.to_string());
    }

    fn pop_context(&mut self, name: &str) -> Result<(), SerializeError> {
        match self.contexts.last() {
            Some(top) if top == name => {
                self.contexts.pop();
                Ok(())
            }
            top => Err(SerializeError::ContextMismatch {
                expected: name.to_string(),
                found: top.cloned().unwrap_or_default(),
            }),
        }
    }

    fn write_bit(&mut self, _name: &str, value: bool) -> Result<(), SerializeError> {
        self.put_bits(value as u64, 1);
        Ok(())
    }

    fn write_unsigned(&mut self, name: &str, bits: u8, value: u64) -> Result<(), SerializeError> {
        check_width("unsigned integer", bits)?;
        check_unsigned_range(name, bits, value)?;
        let wire = apply_byte_order(value, bits, self.options.byte_order);
        self.put_bits(wire, bits as u64);
        Ok(())
    }

    fn write_signed(&mut self, name: &str, bits: u8, value: i64) -> Result<(), SerializeError> {
        check_width("signed integer", bits)?;
        check_signed_range(name, bits, value)?;
        let raw = if bits == 64 {
            value as u64
        } else {
            (value as u64) & ((1u64 << bits) - 1)
        };
        let wire = apply_byte_order(raw, bits, self.options.byte_order);
        self.put_bits(wire, bits as u64);
        Ok(())
    }

    fn write_f32(&mut self, name: &str, value: f32) -> Result<(), SerializeError> {
        self.write_unsigned(name, 32, value.to_bits() as u64)
    }

    fn write_f64(&mut self, name: &str, value: f64) -> Result<(), SerializeError> {
        self.write_unsigned(name, 64, value.to_bits())
    }

    fn write_bytes(&mut self, _name: &str, value: &[u8]) -> Result<(), SerializeError> {
        if self.pos % 8 == 0 {
            self.buf.put_slice(value);
            self.pos += value.len() as u64 * 8;
        } else {
            for &byte in value {
                self.put_bits(byte as u64, 8);
            }
        }
        Ok(())
    }

    fn write_string(
        &mut self,
        name: &str,
        bits: u64,
        encoding: StringEncoding,
        value: &str,
    ) -> Result<(), SerializeError> {
        let encoded = encode_string(name, encoding, self.options.byte_order, value)?;
        let encoded_bits = encoded.len() as u64 * 8;
        if bits % 8 != 0 || encoded_bits > bits {
            return Err(SerializeError::ValueOutOfRange {
                field: name.to_string(),
                value: value.to_string(),
                bits,
            });
        }
        self.write_bytes(name, &encoded)?;
        for _ in 0..(bits - encoded_bits) / 8 {
            self.put_bits(0, 8);
        }
        Ok(())
    }
}
