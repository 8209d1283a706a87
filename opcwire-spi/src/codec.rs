//! Encoder and decoder entry points.

use crate::error::{ParseError, SerializeError};
use crate::message::{serialize_checked, Message};
use crate::options::CodecOptions;
use crate::read_buffer::{BitReader, ReservedMismatch};
use crate::tree::{Node, TreeWriter};
use crate::write_buffer::BitWriter;
use bytes::Bytes;

/// Encodes messages into bytes or labeled trees.
pub struct Encoder;

impl Encoder {
    /// Encodes a message, verifying it wrote exactly its predicted length.
    pub fn encode(message: &dyn Message, options: &CodecOptions) -> Result<Bytes, SerializeError> {
        let bytes = message.length_in_bytes() as usize;
        tracing::trace!(type_name = message.type_name(), bytes, "encoding message");
        let mut writer = BitWriter::with_capacity(bytes, *options);
        serialize_checked(message, &mut writer)?;
        Ok(writer.into_bytes())
    }

    /// Renders a message as a labeled tree.
    pub fn render(message: &dyn Message) -> Result<Node, SerializeError> {
        let mut writer = TreeWriter::new();
        serialize_checked(message, &mut writer)?;
        writer.finish()
    }
}

/// A decoded value plus the reserved-field mismatches tolerated on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub value: T,
    pub mismatches: Vec<ReservedMismatch>,
}

impl<T> Decoded<T> {
    pub fn into_value(self) -> T {
        self.value
    }

    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Decodes fully buffered frames.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    options: CodecOptions,
    allow_trailing: bool,
}

impl Decoder {
    pub fn new(options: CodecOptions) -> Self {
        Self {
            options,
            allow_trailing: false,
        }
    }

    /// Accepts buffers with bits left over after the message.
    pub fn allow_trailing(mut self, allow: bool) -> Self {
        self.allow_trailing = allow;
        self
    }

    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    /// Runs `parse` over `buf`.
    ///
    /// Unless trailing bits are allowed, `parse` must consume the whole
    /// buffer; leftover bytes usually mean the wrong decoder was chosen.
    pub fn decode<T>(
        &self,
        buf: impl Into<Bytes>,
        type_name: &'static str,
        parse: impl FnOnce(&mut BitReader) -> Result<T, ParseError>,
    ) -> Result<Decoded<T>, ParseError> {
        let mut reader = BitReader::with_options(buf, self.options);
        tracing::trace!(type_name, bits = reader.remaining_bits(), "decoding message");
        let value = parse(&mut reader)?;
        let remaining = reader.remaining_bits();
        if remaining > 0 && !self.allow_trailing {
            return Err(ParseError::TrailingBits {
                type_name,
                remaining,
            });
        }
        Ok(Decoded {
            value,
            mismatches: reader.take_reserved_mismatches(),
        })
    }
}
