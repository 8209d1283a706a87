//! Codec error types.

use thiserror::Error;

/// Errors that abort a decode.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("truncated input at {path}: need {needed} bits at bit {position}, {available} available")]
    Truncated {
        path: String,
        position: u64,
        needed: u64,
        available: u64,
    },

    #[error("unknown discriminator for {family}: {value}")]
    UnknownDiscriminator { family: &'static str, value: String },

    #[error("reserved field '{field}' at {path} (bit {position}): expected {expected:#x}, got {actual:#x}")]
    ReservedMismatch {
        path: String,
        field: String,
        position: u64,
        expected: u64,
        actual: u64,
    },

    #[error("invalid bit width {bits} for {kind} (max {max})")]
    InvalidWidth { kind: &'static str, bits: u64, max: u64 },

    #[error("invalid {encoding} string in field '{field}'")]
    InvalidString {
        field: String,
        encoding: &'static str,
    },

    #[error("invalid length {value} for field '{field}'")]
    InvalidLength { field: String, value: i64 },

    #[error("context mismatch: expected to close '{expected}', found '{found}'")]
    ContextMismatch { expected: String, found: String },

    #[error("nesting too deep at {path}: more than {limit} open field groups")]
    NestingTooDeep { path: String, limit: usize },

    #[error("{region} declared {declared} bits but {consumed} bits were consumed")]
    LengthMismatch {
        region: String,
        declared: u64,
        consumed: u64,
    },

    #[error("{remaining} trailing bits after {type_name}")]
    TrailingBits {
        type_name: &'static str,
        remaining: u64,
    },
}

impl ParseError {
    /// Returns whether the input simply ended too early.
    pub fn is_truncation(&self) -> bool {
        matches!(self, ParseError::Truncated { .. })
    }

    /// Returns whether this error names a discriminator that has no decoder.
    pub fn is_unknown_discriminator(&self) -> bool {
        matches!(self, ParseError::UnknownDiscriminator { .. })
    }
}

/// Errors that abort an encode.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SerializeError {
    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("array count mismatch for '{field}': declared {declared}, actual {actual}")]
    CountMismatch {
        field: String,
        declared: i64,
        actual: usize,
    },

    #[error("value {value} of field '{field}' does not fit in {bits} bits")]
    ValueOutOfRange {
        field: String,
        value: String,
        bits: u64,
    },

    #[error("invalid bit width {bits} for {kind} (max {max})")]
    InvalidWidth { kind: &'static str, bits: u64, max: u64 },

    #[error("field '{field}' cannot be encoded as {encoding}")]
    InvalidString {
        field: String,
        encoding: &'static str,
    },

    #[error("context mismatch: expected to close '{expected}', found '{found}'")]
    ContextMismatch { expected: String, found: String },

    #[error("{family}: frame declares {declared} but the value is {actual}")]
    DiscriminatorMismatch {
        family: &'static str,
        declared: String,
        actual: String,
    },

    #[error("{type_name} predicted {predicted} bits but wrote {written}")]
    LengthMismatch {
        type_name: &'static str,
        predicted: u64,
        written: u64,
    },
}

impl SerializeError {
    /// Returns whether the message itself was inconsistent (as opposed to a
    /// defect in a codec implementation).
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            SerializeError::MissingField(_)
                | SerializeError::CountMismatch { .. }
                | SerializeError::ValueOutOfRange { .. }
                | SerializeError::DiscriminatorMismatch { .. }
        )
    }
}

/// A registry table that violates its own contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("{family}: key {key} registered more than once")]
    DuplicateKey { family: &'static str, key: String },

    #[error("{family}: no entries registered")]
    Empty { family: &'static str },
}
