//! Per-position data codecs.
//!
//! A [`DataCodec`] knows how one schema position is read, written and sized.
//! The field functions in [`crate::field`] combine codecs with a presence
//! kind (simple, optional, array and so on).

use crate::enums::{EnumValue, WireEnum};
use crate::error::{ParseError, SerializeError};
use crate::message::Message;
use crate::options::StringEncoding;
use crate::read_buffer::BitReader;
use crate::write_buffer::{write_context, WriteBuffer};
use std::marker::PhantomData;

/// Position of an element inside the array being read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayPosition {
    pub index: usize,
    pub count: usize,
}

impl ArrayPosition {
    pub fn new(index: usize, count: usize) -> Self {
        Self { index, count }
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.count
    }
}

pub trait DataCodec {
    type Value;

    fn read(&self, r: &mut BitReader, name: &str) -> Result<Self::Value, ParseError>;

    fn write(
        &self,
        w: &mut dyn WriteBuffer,
        name: &str,
        value: &Self::Value,
    ) -> Result<(), SerializeError>;

    /// Bits `write` will emit for `value`.
    fn bit_length(&self, value: &Self::Value) -> u64;

    fn read_element(
        &self,
        r: &mut BitReader,
        name: &str,
        _position: ArrayPosition,
    ) -> Result<Self::Value, ParseError> {
        self.read(r, name)
    }

    fn write_element(
        &self,
        w: &mut dyn WriteBuffer,
        name: &str,
        value: &Self::Value,
        _position: ArrayPosition,
    ) -> Result<(), SerializeError> {
        self.write(w, name, value)
    }
}

/// Single bit as a boolean.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bit;

impl DataCodec for Bit {
    type Value = bool;

    fn read(&self, r: &mut BitReader, name: &str) -> Result<bool, ParseError> {
        r.read_bit(name)
    }

    fn write(&self, w: &mut dyn WriteBuffer, name: &str, value: &bool) -> Result<(), SerializeError> {
        w.write_bit(name, *value)
    }

    fn bit_length(&self, _value: &bool) -> u64 {
        1
    }
}

/// Unsigned integer of a declared width, held in `T`.
#[derive(Debug, Clone, Copy)]
pub struct Unsigned<T> {
    bits: u8,
    _repr: PhantomData<T>,
}

impl<T> Unsigned<T> {
    pub const fn new(bits: u8) -> Self {
        Self {
            bits,
            _repr: PhantomData,
        }
    }

    pub fn bits(&self) -> u8 {
        self.bits
    }
}

impl<T> DataCodec for Unsigned<T>
where
    T: Copy + Into<u64> + TryFrom<u64>,
{
    type Value = T;

    fn read(&self, r: &mut BitReader, name: &str) -> Result<T, ParseError> {
        let raw = r.read_unsigned(name, self.bits)?;
        T::try_from(raw).map_err(|_| ParseError::InvalidWidth {
            kind: "unsigned integer",
            bits: self.bits as u64,
            max: (std::mem::size_of::<T>() * 8) as u64,
        })
    }

    fn write(&self, w: &mut dyn WriteBuffer, name: &str, value: &T) -> Result<(), SerializeError> {
        w.write_unsigned(name, self.bits, (*value).into())
    }

    fn bit_length(&self, _value: &T) -> u64 {
        self.bits as u64
    }
}

/// Two's complement integer of a declared width, held in `T`.
#[derive(Debug, Clone, Copy)]
pub struct Signed<T> {
    bits: u8,
    _repr: PhantomData<T>,
}

impl<T> Signed<T> {
    pub const fn new(bits: u8) -> Self {
        Self {
            bits,
            _repr: PhantomData,
        }
    }

    pub fn bits(&self) -> u8 {
        self.bits
    }
}

impl<T> DataCodec for Signed<T>
where
    T: Copy + Into<i64> + TryFrom<i64>,
{
    type Value = T;

    fn read(&self, r: &mut BitReader, name: &str) -> Result<T, ParseError> {
        let raw = r.read_signed(name, self.bits)?;
        T::try_from(raw).map_err(|_| ParseError::InvalidWidth {
            kind: "signed integer",
            bits: self.bits as u64,
            max: (std::mem::size_of::<T>() * 8) as u64,
        })
    }

    fn write(&self, w: &mut dyn WriteBuffer, name: &str, value: &T) -> Result<(), SerializeError> {
        w.write_signed(name, self.bits, (*value).into())
    }

    fn bit_length(&self, _value: &T) -> u64 {
        self.bits as u64
    }
}

pub const U8: Unsigned<u8> = Unsigned::new(8);
pub const U16: Unsigned<u16> = Unsigned::new(16);
pub const U32: Unsigned<u32> = Unsigned::new(32);
pub const U64: Unsigned<u64> = Unsigned::new(64);
pub const I8: Signed<i8> = Signed::new(8);
pub const I16: Signed<i16> = Signed::new(16);
pub const I32: Signed<i32> = Signed::new(32);
pub const I64: Signed<i64> = Signed::new(64);

#[derive(Debug, Clone, Copy, Default)]
pub struct Float32;

impl DataCodec for Float32 {
    type Value = f32;

    fn read(&self, r: &mut BitReader, name: &str) -> Result<f32, ParseError> {
        r.read_f32(name)
    }

    fn write(&self, w: &mut dyn WriteBuffer, name: &str, value: &f32) -> Result<(), SerializeError> {
        w.write_f32(name, *value)
    }

    fn bit_length(&self, _value: &f32) -> u64 {
        32
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Float64;

impl DataCodec for Float64 {
    type Value = f64;

    fn read(&self, r: &mut BitReader, name: &str) -> Result<f64, ParseError> {
        r.read_f64(name)
    }

    fn write(&self, w: &mut dyn WriteBuffer, name: &str, value: &f64) -> Result<(), SerializeError> {
        w.write_f64(name, *value)
    }

    fn bit_length(&self, _value: &f64) -> u64 {
        64
    }
}

/// String occupying a fixed number of bits.
///
/// Writing pads shorter values with zero bytes; reading returns the decoded
/// bytes as-is.
#[derive(Debug, Clone, Copy)]
pub struct VString {
    bits: u64,
    encoding: StringEncoding,
}

impl VString {
    pub fn new(bits: u64, encoding: StringEncoding) -> Self {
        Self { bits, encoding }
    }

    /// A codec sized to hold exactly `value`.
    pub fn for_value(value: &str, encoding: StringEncoding) -> Self {
        let bytes = match encoding {
            StringEncoding::Utf8 | StringEncoding::Ascii => value.len(),
            StringEncoding::Utf16 => value.encode_utf16().count() * 2,
        };
        Self::new(bytes as u64 * 8, encoding)
    }
}

impl DataCodec for VString {
    type Value = String;

    fn read(&self, r: &mut BitReader, name: &str) -> Result<String, ParseError> {
        r.read_string(name, self.bits, self.encoding)
    }

    fn write(&self, w: &mut dyn WriteBuffer, name: &str, value: &String) -> Result<(), SerializeError> {
        w.write_string(name, self.bits, self.encoding, value)
    }

    fn bit_length(&self, _value: &String) -> u64 {
        self.bits
    }
}

/// A nested message.
///
/// Reads run `parse` inside a context named after the field; writes open the
/// same context and delegate to [`Message::serialize_element`].
pub struct Complex<M, F> {
    parse: F,
    _message: PhantomData<fn() -> M>,
}

impl<M, F> Complex<M, F>
where
    F: Fn(&mut BitReader) -> Result<M, ParseError>,
{
    pub fn new(parse: F) -> Self {
        Self {
            parse,
            _message: PhantomData,
        }
    }
}

impl<M, F> DataCodec for Complex<M, F>
where
    M: Message,
    F: Fn(&mut BitReader) -> Result<M, ParseError>,
{
    type Value = M;

    fn read(&self, r: &mut BitReader, name: &str) -> Result<M, ParseError> {
        r.in_context(name, |r| (self.parse)(r))
    }

    fn write(&self, w: &mut dyn WriteBuffer, name: &str, value: &M) -> Result<(), SerializeError> {
        write_context(w, name, |w| value.serialize(w))
    }

    fn bit_length(&self, value: &M) -> u64 {
        value.length_in_bits()
    }

    fn write_element(
        &self,
        w: &mut dyn WriteBuffer,
        name: &str,
        value: &M,
        position: ArrayPosition,
    ) -> Result<(), SerializeError> {
        write_context(w, name, |w| value.serialize_element(w, position))
    }
}

/// An enum decoded through [`EnumValue`].
#[derive(Debug)]
pub struct Enum<E>(PhantomData<E>);

impl<E> Enum<E> {
    pub const fn new() -> Self {
        Enum(PhantomData)
    }
}

impl<E> Default for Enum<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: WireEnum> DataCodec for Enum<E> {
    type Value = EnumValue<E>;

    fn read(&self, r: &mut BitReader, name: &str) -> Result<EnumValue<E>, ParseError> {
        EnumValue::read(r, name)
    }

    fn write(
        &self,
        w: &mut dyn WriteBuffer,
        name: &str,
        value: &EnumValue<E>,
    ) -> Result<(), SerializeError> {
        value.write(w, name)
    }

    fn bit_length(&self, _value: &EnumValue<E>) -> u64 {
        E::BITS as u64
    }
}
