//! The message protocol.
//!
//! A message is an immutable value tree that can predict its own encoded size
//! and serialize itself. `serialize` must advance any [`WriteBuffer`] by
//! exactly [`Message::length_in_bits`]; several messages embed their own
//! `length_in_bytes()` as a field, so a disagreement corrupts the frame.
//!
//! Parsing is not part of the trait. Every family exposes a plain
//! `parse(reader, ...)` function taking the outer context it needs, and
//! decoders that depend on context supplied later return a continuation
//! (see `VariantValue` in the model crate).

use crate::error::SerializeError;
use crate::io::ArrayPosition;
use crate::write_buffer::{BitWriter, WriteBuffer};

pub trait Message {
    /// Name used as the serialization context and in diagnostics.
    fn type_name(&self) -> &'static str;

    /// Number of bits `serialize` writes. Must not write anything.
    fn length_in_bits(&self) -> u64;

    fn length_in_bytes(&self) -> u64 {
        self.length_in_bits().div_ceil(8)
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError>;

    /// Serializes the message as an element of an enclosing array.
    fn serialize_element(
        &self,
        w: &mut dyn WriteBuffer,
        _position: ArrayPosition,
    ) -> Result<(), SerializeError> {
        self.serialize(w)
    }
}

impl<M: Message + ?Sized> Message for Box<M> {
    fn type_name(&self) -> &'static str {
        (**self).type_name()
    }

    fn length_in_bits(&self) -> u64 {
        (**self).length_in_bits()
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        (**self).serialize(w)
    }

    fn serialize_element(
        &self,
        w: &mut dyn WriteBuffer,
        position: ArrayPosition,
    ) -> Result<(), SerializeError> {
        (**self).serialize_element(w, position)
    }
}

/// Serializes `message` and checks that the bits written match its
/// predicted length. Returns the number of bits.
pub fn assert_length_agreement(message: &dyn Message) -> Result<u64, SerializeError> {
    let predicted = message.length_in_bits();
    let mut writer = BitWriter::with_capacity(predicted.div_ceil(8) as usize, Default::default());
    serialize_checked(message, &mut writer)?;
    Ok(predicted)
}

/// Serializes `message` into `w`, failing when it advances `w` by anything
/// other than its predicted length.
pub fn serialize_checked(message: &dyn Message, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
    let predicted = message.length_in_bits();
    let start = w.pos();
    message.serialize(w)?;
    let written = w.pos() - start;
    if written != predicted {
        tracing::error!(
            type_name = message.type_name(),
            predicted,
            written,
            "serialized length disagrees with prediction"
        );
        return Err(SerializeError::LengthMismatch {
            type_name: message.type_name(),
            predicted,
            written,
        });
    }
    Ok(())
}
