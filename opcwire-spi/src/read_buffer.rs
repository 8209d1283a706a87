//! Bit-level read cursor.
//!
//! A [`BitReader`] walks an already fully buffered frame. Every read names the
//! field it consumes so that truncation errors and reserved-field mismatches
//! can report where in the message tree they happened.

use crate::error::ParseError;
use crate::options::{ByteOrder, CodecOptions, ReservedPolicy, StringEncoding};
use bytes::Bytes;
use serde::Serialize;

/// A reserved field whose observed bits differed from the expected constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservedMismatch {
    pub path: String,
    pub field: String,
    pub position: u64,
    pub expected: u64,
    pub actual: u64,
}

/// Sequential bit reader over an in-memory buffer.
#[derive(Debug, Clone)]
pub struct BitReader {
    buf: Bytes,
    pos: u64,
    end: u64,
    options: CodecOptions,
    contexts: Vec<String>,
    mismatches: Vec<ReservedMismatch>,
}

impl BitReader {
    /// Creates a reader with default options.
    pub fn new(buf: impl Into<Bytes>) -> Self {
        Self::with_options(buf, CodecOptions::default())
    }

    pub fn with_options(buf: impl Into<Bytes>, options: CodecOptions) -> Self {
        let buf = buf.into();
        let end = buf.len() as u64 * 8;
        Self {
            buf,
            pos: 0,
            end,
            options,
            contexts: Vec::new(),
            mismatches: Vec::new(),
        }
    }

    /// Current absolute bit offset from the start of the buffer.
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Bits left before the current end (buffer end or active limit).
    pub fn remaining_bits(&self) -> u64 {
        self.end.saturating_sub(self.pos)
    }

    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.options.byte_order
    }

    // ----- naming context -------------------------------------------------

    /// Opens a named field group. Consumes no bits. Fails once the
    /// configured nesting limit is reached.
    pub fn pull_context(&mut self, name: &str) -> Result<(), ParseError> {
        if self.contexts.len() >= self.options.max_depth {
            return Err(ParseError::NestingTooDeep {
                path: self.field_path(name),
                limit: self.options.max_depth,
            });
        }
        self.contexts.push(name.to_string());
        Ok(())
    }

    /// Closes the innermost field group, which must be `name`.
    pub fn close_context(&mut self, name: &str) -> Result<(), ParseError> {
        match self.contexts.pop() {
            Some(top) if top == name => Ok(()),
            Some(top) => {
                let err = ParseError::ContextMismatch {
                    expected: name.to_string(),
                    found: top.clone(),
                };
                self.contexts.push(top);
                Err(err)
            }
            None => Err(ParseError::ContextMismatch {
                expected: name.to_string(),
                found: String::new(),
            }),
        }
    }

    /// Runs `f` inside a named field group. The group is closed again even
    /// when `f` fails.
    pub fn in_context<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        self.pull_context(name)?;
        let result = f(self);
        let closed = self.close_context(name);
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Number of currently open field groups.
    pub fn depth(&self) -> usize {
        self.contexts.len()
    }

    /// Slash separated path of the open field groups.
    pub fn context_path(&self) -> String {
        if self.contexts.is_empty() {
            "<root>".to_string()
        } else {
            self.contexts.join("/")
        }
    }

    fn field_path(&self, name: &str) -> String {
        if name.is_empty() {
            self.context_path()
        } else if self.contexts.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.context_path(), name)
        }
    }

    // ----- bounded regions ------------------------------------------------

    /// Runs `f` with the readable region cut down to the next `bits` bits.
    /// Reads past the region fail as truncated input.
    pub fn with_limit<T>(
        &mut self,
        bits: u64,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        let outer_end = self.end;
        let limit = self.pos.saturating_add(bits);
        if limit > outer_end {
            return Err(ParseError::Truncated {
                path: self.context_path(),
                position: self.pos,
                needed: bits,
                available: self.remaining_bits(),
            });
        }
        self.end = limit;
        let result = f(self);
        self.end = outer_end;
        result
    }

    // ----- reserved fields ------------------------------------------------

    /// Applies the reserved-field policy to a mismatch observed at `position`.
    pub fn report_reserved_mismatch(
        &mut self,
        field: &str,
        position: u64,
        expected: u64,
        actual: u64,
    ) -> Result<(), ParseError> {
        let path = self.context_path();
        match self.options.reserved_policy {
            ReservedPolicy::Strict => Err(ParseError::ReservedMismatch {
                path,
                field: field.to_string(),
                position,
                expected,
                actual,
            }),
            ReservedPolicy::Lenient => {
                tracing::warn!(
                    path = %path,
                    field,
                    position,
                    expected,
                    actual,
                    "unexpected value in reserved field"
                );
                self.mismatches.push(ReservedMismatch {
                    path,
                    field: field.to_string(),
                    position,
                    expected,
                    actual,
                });
                Ok(())
            }
        }
    }

    /// Reserved-field mismatches recorded so far.
    pub fn reserved_mismatches(&self) -> &[ReservedMismatch] {
        &self.mismatches
    }

    pub fn take_reserved_mismatches(&mut self) -> Vec<ReservedMismatch> {
        std::mem::take(&mut self.mismatches)
    }

    // ----- primitives -----------------------------------------------------

    fn ensure_available(&self, name: &str, bits: u64) -> Result<(), ParseError> {
        let available = self.remaining_bits();
        if bits > available {
            return Err(ParseError::Truncated {
                path: self.field_path(name),
                position: self.pos,
                needed: bits,
                available,
            });
        }
        Ok(())
    }

    /// Reads `bits` bits MSB-first without applying the byte order.
    fn take_bits(&mut self, name: &str, bits: u64) -> Result<u64, ParseError> {
        self.ensure_available(name, bits)?;
        let mut value: u64 = 0;
        let mut remaining = bits;
        while remaining > 0 {
            let byte = self.buf[(self.pos / 8) as usize];
            let offset = self.pos % 8;
            let avail = 8 - offset;
            let take = avail.min(remaining);
            let shift = avail - take;
            let mask = ((1u16 << take) - 1) as u8;
            let chunk = (byte >> shift) & mask;
            value = (value << take) | chunk as u64;
            remaining -= take;
            self.pos += take;
        }
        Ok(value)
    }

    pub fn read_bit(&mut self, name: &str) -> Result<bool, ParseError> {
        Ok(self.take_bits(name, 1)? == 1)
    }

    /// Reads an unsigned integer of 1 to 64 bits.
    pub fn read_unsigned(&mut self, name: &str, bits: u8) -> Result<u64, ParseError> {
        check_width("unsigned integer", bits)?;
        let raw = self.take_bits(name, bits as u64)?;
        Ok(apply_byte_order(raw, bits, self.options.byte_order))
    }

    /// Reads a two's complement signed integer of 1 to 64 bits.
    pub fn read_signed(&mut self, name: &str, bits: u8) -> Result<i64, ParseError> {
        check_width("signed integer", bits)?;
        let raw = self.read_unsigned(name, bits)?;
        Ok(sign_extend(raw, bits))
    }

    pub fn read_f32(&mut self, name: &str) -> Result<f32, ParseError> {
        Ok(f32::from_bits(self.read_unsigned(name, 32)? as u32))
    }

    pub fn read_f64(&mut self, name: &str) -> Result<f64, ParseError> {
        Ok(f64::from_bits(self.read_unsigned(name, 64)?))
    }

    /// Reads `count` raw bytes. Byte order does not apply.
    pub fn read_bytes(&mut self, name: &str, count: usize) -> Result<Bytes, ParseError> {
        let bits = count as u64 * 8;
        self.ensure_available(name, bits)?;
        if self.pos % 8 == 0 {
            let start = (self.pos / 8) as usize;
            self.pos += bits;
            return Ok(self.buf.slice(start..start + count));
        }
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.take_bits(name, 8)? as u8);
        }
        Ok(Bytes::from(out))
    }

    /// Reads a string occupying exactly `bits` bits.
    pub fn read_string(
        &mut self,
        name: &str,
        bits: u64,
        encoding: StringEncoding,
    ) -> Result<String, ParseError> {
        if bits % 8 != 0 {
            return Err(ParseError::InvalidWidth {
                kind: "string",
                bits,
                max: u32::MAX as u64,
            });
        }
        let raw = self.read_bytes(name, (bits / 8) as usize)?;
        let invalid = || ParseError::InvalidString {
            field: name.to_string(),
            encoding: encoding.name(),
        };
        match encoding {
            StringEncoding::Utf8 => String::from_utf8(raw.to_vec()).map_err(|_| invalid()),
            StringEncoding::Ascii => {
                if raw.is_ascii() {
                    Ok(raw.iter().map(|&b| b as char).collect())
                } else {
                    Err(invalid())
                }
            }
            StringEncoding::Utf16 => {
                if raw.len() % 2 != 0 {
                    return Err(invalid());
                }
                let units: Vec<u16> = raw
                    .chunks_exact(2)
                    .map(|pair| match self.options.byte_order {
                        ByteOrder::BigEndian => u16::from_be_bytes([pair[0], pair[1]]),
                        ByteOrder::LittleEndian => u16::from_le_bytes([pair[0], pair[1]]),
                    })
                    .collect();
                String::from_utf16(&units).map_err(|_| invalid())
            }
        }
    }
}

pub(crate) fn check_width(kind: &'static str, bits: u8) -> Result<(), ParseError> {
    if bits == 0 || bits > 64 {
        return Err(ParseError::InvalidWidth {
            kind,
            bits: bits as u64,
            max: 64,
        });
    }
    Ok(())
}

/// Converts between MSB-first wire order and the configured byte order.
/// Only whole-byte widths above eight bits are affected. The conversion is
/// its own inverse, so writers use it too.
pub(crate) fn apply_byte_order(value: u64, bits: u8, order: ByteOrder) -> u64 {
    if order == ByteOrder::BigEndian || bits % 8 != 0 || bits <= 8 {
        return value;
    }
    value.swap_bytes() >> (64 - bits as u32)
}

pub(crate) fn sign_extend(raw: u64, bits: u8) -> i64 {
    if bits >= 64 {
        return raw as i64;
    }
    let sign = 1u64 << (bits - 1);
    if raw & sign != 0 {
        (raw | (!0u64 << bits)) as i64
    } else {
        raw as i64
    }
}
