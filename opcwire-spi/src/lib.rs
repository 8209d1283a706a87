//! # opcwire-spi
//!
//! Bit-precise codec framework for schema-driven binary protocols.
//!
//! This crate provides:
//! - `BitReader` / `BitWriter` cursors with naming contexts and byte order
//! - `TreeWriter` for labeled, comparable renderings of messages
//! - Field codecs for simple, reserved, optional, implicit, virtual and array fields
//! - Fixed-width enums with an explicit unknown-value result
//! - The `Message` protocol with enforced length agreement
//! - Closed discriminator registries for polymorphic message families

pub mod codec;
pub mod enums;
pub mod error;
pub mod field;
pub mod io;
pub mod message;
pub mod options;
pub mod read_buffer;
pub mod registry;
pub mod tree;
pub mod write_buffer;

pub use codec::{Decoded, Decoder, Encoder};
pub use enums::{EnumValue, WireEnum, WireRepr};
pub use error::{ParseError, RegistryError, SerializeError};
pub use io::{ArrayPosition, DataCodec};
pub use message::{assert_length_agreement, Message};
pub use options::{ByteOrder, CodecOptions, ReservedPolicy, StringEncoding, DEFAULT_MAX_DEPTH};
pub use read_buffer::{BitReader, ReservedMismatch};
pub use registry::{DecodeFn, Discriminated, Registry};
pub use tree::{Node, TreeValue, TreeWriter};
pub use write_buffer::{write_context, BitWriter, WriteBuffer};
