//! Length-prefixed strings.
//!
//! Both types carry a signed 32-bit byte count. A count of -1 is a null value
//! and stays distinct from an empty one, so captured frames re-encode
//! byte-exactly.

use bytes::Bytes;
use opcwire_spi::{
    write_context, BitReader, Message, ParseError, SerializeError, StringEncoding, WriteBuffer,
};
use std::fmt;

fn read_length(r: &mut BitReader, name: &str) -> Result<Option<usize>, ParseError> {
    match r.read_signed(name, 32)? {
        -1 => Ok(None),
        n if n < -1 => Err(ParseError::InvalidLength {
            field: name.to_string(),
            value: n,
        }),
        n => Ok(Some(n as usize)),
    }
}

fn write_length(w: &mut dyn WriteBuffer, name: &str, len: Option<usize>) -> Result<(), SerializeError> {
    let value = match len {
        None => -1,
        Some(len) => i32::try_from(len).map_err(|_| SerializeError::ValueOutOfRange {
            field: name.to_string(),
            value: len.to_string(),
            bits: 32,
        })? as i64,
    };
    w.write_signed(name, 32, value)
}

/// UTF-8 string with a 32-bit length prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PascalString {
    pub value: Option<String>,
}

impl PascalString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }

    pub fn null() -> Self {
        Self { value: None }
    }

    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// The text, with null read as empty.
    pub fn as_str(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        r.in_context("PascalString", |r| {
            let value = match read_length(r, "sLength")? {
                None => None,
                Some(len) => Some(r.read_string("stringValue", len as u64 * 8, StringEncoding::Utf8)?),
            };
            Ok(Self { value })
        })
    }
}

impl From<&str> for PascalString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for PascalString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{:?}", value),
            None => f.write_str("null"),
        }
    }
}

impl Message for PascalString {
    fn type_name(&self) -> &'static str {
        "PascalString"
    }

    fn length_in_bits(&self) -> u64 {
        32 + self.value.as_ref().map_or(0, |v| v.len() as u64 * 8)
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        write_context(w, "PascalString", |w| {
            write_length(w, "sLength", self.value.as_ref().map(String::len))?;
            if let Some(value) = &self.value {
                w.write_string("stringValue", value.len() as u64 * 8, StringEncoding::Utf8, value)?;
            }
            Ok(())
        })
    }
}

/// Opaque bytes with a 32-bit length prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PascalByteString {
    pub value: Option<Bytes>,
}

impl PascalByteString {
    pub fn new(value: impl Into<Bytes>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }

    pub fn null() -> Self {
        Self { value: None }
    }

    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        r.in_context("PascalByteString", |r| {
            let value = match read_length(r, "stringLength")? {
                None => None,
                Some(len) => Some(r.read_bytes("stringValue", len)?),
            };
            Ok(Self { value })
        })
    }
}

impl Message for PascalByteString {
    fn type_name(&self) -> &'static str {
        "PascalByteString"
    }

    fn length_in_bits(&self) -> u64 {
        32 + self.value.as_ref().map_or(0, |v| v.len() as u64 * 8)
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        write_context(w, "PascalByteString", |w| {
            write_length(w, "stringLength", self.value.as_ref().map(Bytes::len))?;
            if let Some(value) = &self.value {
                w.write_bytes("stringValue", value)?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcwire_spi::{assert_length_agreement, CodecOptions, Decoder, Encoder};

    fn encode(message: &dyn Message) -> Vec<u8> {
        Encoder::encode(message, &CodecOptions::default()).unwrap().to_vec()
    }

    #[test]
    fn test_null_and_empty_differ() {
        assert_eq!(encode(&PascalString::null()), vec![0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(encode(&PascalString::new("")), vec![0x00, 0x00, 0x00, 0x00]);

        let decoder = Decoder::default();
        let null = decoder
            .decode(vec![0xFF, 0xFF, 0xFF, 0xFF], "PascalString", PascalString::parse)
            .unwrap();
        assert!(null.value.is_null());
        let empty = decoder
            .decode(vec![0x00, 0x00, 0x00, 0x00], "PascalString", PascalString::parse)
            .unwrap();
        assert_eq!(empty.value, PascalString::new(""));
    }

    #[test]
    fn test_string_roundtrip() {
        let value = PascalString::new("opc.tcp://localhost:4840");
        let bytes = encode(&value);
        assert_eq!(&bytes[..4], &[0, 0, 0, 24]);
        assert_eq!(assert_length_agreement(&value).unwrap(), 28 * 8);
        let decoded = Decoder::default()
            .decode(bytes, "PascalString", PascalString::parse)
            .unwrap();
        assert_eq!(decoded.value, value);
        assert_eq!(value.to_string(), "\"opc.tcp://localhost:4840\"");
    }

    #[test]
    fn test_invalid_lengths() {
        let err = Decoder::default()
            .decode(vec![0xFF, 0xFF, 0xFF, 0xFE], "PascalString", PascalString::parse)
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidLength { value: -2, .. }));

        let err = Decoder::default()
            .decode(vec![0x00, 0x00, 0x00, 0x05, b'a'], "PascalString", PascalString::parse)
            .unwrap_err();
        assert!(err.is_truncation());
    }

    #[test]
    fn test_byte_string_roundtrip() {
        for value in [
            PascalByteString::null(),
            PascalByteString::new(Bytes::new()),
            PascalByteString::new(vec![0xDE, 0xAD]),
        ] {
            let bytes = encode(&value);
            assert_eq!(bytes.len() as u64, value.length_in_bytes());
            let decoded = Decoder::default()
                .decode(bytes, "PascalByteString", PascalByteString::parse)
                .unwrap();
            assert_eq!(decoded.value, value);
        }
    }
}
