//! Codec options shared by readers and writers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a reader reacts to a reserved field that does not carry its expected
/// constant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservedPolicy {
    /// Record and log the mismatch, keep the observed value, continue parsing.
    #[default]
    Lenient,
    /// Fail the parse.
    Strict,
}

impl FromStr for ReservedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lenient" => Ok(ReservedPolicy::Lenient),
            "strict" => Ok(ReservedPolicy::Strict),
            other => Err(format!("unknown reserved policy: {}", other)),
        }
    }
}

/// Byte order for fields whose width is a whole number of bytes.
///
/// Sub-byte fields and widths that are not a multiple of eight are always
/// packed most significant bit first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    #[default]
    BigEndian,
    LittleEndian,
}

impl FromStr for ByteOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "big_endian" | "be" => Ok(ByteOrder::BigEndian),
            "little_endian" | "le" => Ok(ByteOrder::LittleEndian),
            other => Err(format!("unknown byte order: {}", other)),
        }
    }
}

/// Character encodings supported for string fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringEncoding {
    Utf8,
    /// UTF-16 code units in the cursor's byte order.
    Utf16,
    Ascii,
}

impl StringEncoding {
    pub fn name(self) -> &'static str {
        match self {
            StringEncoding::Utf8 => "UTF-8",
            StringEncoding::Utf16 => "UTF-16",
            StringEncoding::Ascii => "ASCII",
        }
    }
}

impl fmt::Display for StringEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Default limit on open field groups while decoding.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Options applied to a single decode or encode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecOptions {
    pub reserved_policy: ReservedPolicy,
    pub byte_order: ByteOrder,
    /// Maximum number of nested field groups a decode may open. Recursive
    /// structures such as variants and diagnostics hit this before the stack
    /// runs out.
    pub max_depth: usize,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            reserved_policy: ReservedPolicy::default(),
            byte_order: ByteOrder::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl CodecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strict() -> Self {
        Self {
            reserved_policy: ReservedPolicy::Strict,
            ..Self::default()
        }
    }

    pub fn with_reserved_policy(mut self, policy: ReservedPolicy) -> Self {
        self.reserved_policy = policy;
        self
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}
