//! Labeled tree rendering of a message.
//!
//! [`TreeWriter`] accepts the same calls a message makes against a
//! [`BitWriter`](crate::write_buffer::BitWriter) and records them as nested
//! [`Node`]s. Two messages that render to equal trees are structurally equal.
//!
//! A tree can also be replayed: [`Node::replay`] repeats the recorded writes
//! against any [`WriteBuffer`], so a tree loaded back from JSON packs into the
//! same bytes and decodes through the ordinary parsers.

use crate::error::SerializeError;
use crate::options::{ByteOrder, CodecOptions, StringEncoding};
use crate::write_buffer::{
    check_signed_range, check_unsigned_range, check_width, encode_string, write_context,
    BitWriter, WriteBuffer,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Leaf value of a rendered field.
///
/// Serialized untagged, so a non-negative signed value reads back from JSON
/// as [`TreeValue::Unsigned`]. Both replay to the same bits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeValue {
    Bool(bool),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl fmt::Display for TreeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeValue::Bool(v) => write!(f, "{}", v),
            TreeValue::Unsigned(v) => write!(f, "{}", v),
            TreeValue::Signed(v) => write!(f, "{}", v),
            TreeValue::Float(v) => write!(f, "{}", v),
            TreeValue::Text(v) => write!(f, "{:?}", v),
            TreeValue::Bytes(v) => {
                f.write_str("0x")?;
                for byte in v {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

/// A node of the rendered tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Group {
        name: String,
        children: Vec<Node>,
    },
    Field {
        name: String,
        bits: u64,
        value: TreeValue,
        /// Set for string fields only.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        encoding: Option<StringEncoding>,
    },
    /// Derived value. Occupies no bits.
    Virtual { name: String, value: String },
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Group { name, .. } | Node::Field { name, .. } | Node::Virtual { name, .. } => name,
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Group { children, .. } => children,
            _ => &[],
        }
    }

    pub fn value(&self) -> Option<&TreeValue> {
        match self {
            Node::Field { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Finds a descendant by `/`-separated name path. The first match at each
    /// level wins.
    pub fn find(&self, path: &str) -> Option<&Node> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |node, segment| {
                node.children().iter().find(|child| child.name() == segment)
            })
    }

    /// Total number of wire bits below this node.
    pub fn bit_length(&self) -> u64 {
        match self {
            Node::Group { children, .. } => children.iter().map(Node::bit_length).sum(),
            Node::Field { bits, .. } => *bits,
            Node::Virtual { .. } => 0,
        }
    }

    /// Repeats the writes recorded in this tree against `w`.
    pub fn replay(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        match self {
            Node::Group { name, children } => write_context(w, name, |w| {
                children.iter().try_for_each(|child| child.replay(w))
            }),
            Node::Field {
                name,
                bits,
                value,
                encoding,
            } => replay_field(w, name, *bits, value, *encoding),
            Node::Virtual { name, value } => w.write_virtual(name, value),
        }
    }

    /// Packs the tree's fields into bytes.
    pub fn to_bytes(&self, options: &CodecOptions) -> Result<Bytes, SerializeError> {
        let mut writer = BitWriter::with_capacity(self.bit_length().div_ceil(8) as usize, *options);
        self.replay(&mut writer)?;
        Ok(writer.into_bytes())
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        let name = if self.name().is_empty() { "-" } else { self.name() };
        match self {
            Node::Group { children, .. } => {
                writeln!(f, "{}{}", indent, name)?;
                for child in children {
                    child.render(f, depth + 1)?;
                }
                Ok(())
            }
            Node::Field { bits, value, .. } => {
                writeln!(f, "{}{}: {} [{}b]", indent, name, value, bits)
            }
            Node::Virtual { value, .. } => writeln!(f, "{}{} = {}", indent, name, value),
        }
    }
}

fn replay_field(
    w: &mut dyn WriteBuffer,
    name: &str,
    bits: u64,
    value: &TreeValue,
    encoding: Option<StringEncoding>,
) -> Result<(), SerializeError> {
    let width = |kind: &'static str| {
        u8::try_from(bits).map_err(|_| SerializeError::InvalidWidth { kind, bits, max: 64 })
    };
    match value {
        TreeValue::Bool(v) if bits == 1 => w.write_bit(name, *v),
        TreeValue::Bool(_) => Err(SerializeError::InvalidWidth {
            kind: "bit",
            bits,
            max: 1,
        }),
        TreeValue::Unsigned(v) => w.write_unsigned(name, width("unsigned integer")?, *v),
        TreeValue::Signed(v) => w.write_signed(name, width("signed integer")?, *v),
        TreeValue::Float(v) => match bits {
            32 => w.write_f32(name, *v as f32),
            64 => w.write_f64(name, *v),
            _ => Err(SerializeError::InvalidWidth {
                kind: "float",
                bits,
                max: 64,
            }),
        },
        TreeValue::Text(v) => {
            w.write_string(name, bits, encoding.unwrap_or(StringEncoding::Utf8), v)
        }
        TreeValue::Bytes(v) if v.len() as u64 * 8 == bits => w.write_bytes(name, v),
        TreeValue::Bytes(v) => Err(SerializeError::ValueOutOfRange {
            field: name.to_string(),
            value: format!("{} bytes", v.len()),
            bits,
        }),
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, 0)
    }
}

/// [`WriteBuffer`] that builds a [`Node`] tree instead of bytes.
#[derive(Debug, Default)]
pub struct TreeWriter {
    options: CodecOptions,
    pos: u64,
    stack: Vec<(String, Vec<Node>)>,
    roots: Vec<Node>,
}

impl TreeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CodecOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Returns the rendered tree. Several top-level nodes are wrapped in an
    /// unnamed group.
    pub fn finish(mut self) -> Result<Node, SerializeError> {
        if let Some((open, _)) = self.stack.pop() {
            return Err(SerializeError::ContextMismatch {
                expected: String::new(),
                found: open,
            });
        }
        if self.roots.len() == 1 {
            if let Some(root) = self.roots.pop() {
                return Ok(root);
            }
        }
        Ok(Node::Group {
            name: String::new(),
            children: self.roots,
        })
    }

    fn push_node(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some((_, children)) => children.push(node),
            None => self.roots.push(node),
        }
    }

    fn push_field(&mut self, name: &str, bits: u64, value: TreeValue) {
        self.push_encoded_field(name, bits, value, None);
    }

    fn push_encoded_field(
        &mut self,
        name: &str,
        bits: u64,
        value: TreeValue,
        encoding: Option<StringEncoding>,
    ) {
        self.pos += bits;
        self.push_node(Node::Field {
            name: name.to_string(),
            bits,
            value,
            encoding,
        });
    }
}

impl WriteBuffer for TreeWriter {
    fn pos(&self) -> u64 {
        self.pos
    }

    fn byte_order(&self) -> ByteOrder {
        self.options.byte_order
    }

    fn push_context(&mut self, name: &str) {
        self.stack.push((name.to_string(), Vec::new()));
    }

    fn pop_context(&mut self, name: &str) -> Result<(), SerializeError> {
        match self.stack.last() {
            Some((top, _)) if top == name => {}
            top => {
                return Err(SerializeError::ContextMismatch {
                    expected: name.to_string(),
                    found: top.map(|(n, _)| n.clone()).unwrap_or_default(),
                })
            }
        }
        if let Some((name, children)) = self.stack.pop() {
            self.push_node(Node::Group { name, children });
        }
        Ok(())
    }

    fn write_bit(&mut self, name: &str, value: bool) -> Result<(), SerializeError> {
        self.push_field(name, 1, TreeValue::Bool(value));
        Ok(())
    }

    fn write_unsigned(&mut self, name: &str, bits: u8, value: u64) -> Result<(), SerializeError> {
        check_width("unsigned integer", bits)?;
        check_unsigned_range(name, bits, value)?;
        self.push_field(name, bits as u64, TreeValue::Unsigned(value));
        Ok(())
    }

    fn write_signed(&mut self, name: &str, bits: u8, value: i64) -> Result<(), SerializeError> {
        check_width("signed integer", bits)?;
        check_signed_range(name, bits, value)?;
        self.push_field(name, bits as u64, TreeValue::Signed(value));
        Ok(())
    }

    fn write_f32(&mut self, name: &str, value: f32) -> Result<(), SerializeError> {
        self.push_field(name, 32, TreeValue::Float(value as f64));
        Ok(())
    }

    fn write_f64(&mut self, name: &str, value: f64) -> Result<(), SerializeError> {
        self.push_field(name, 64, TreeValue::Float(value));
        Ok(())
    }

    fn write_bytes(&mut self, name: &str, value: &[u8]) -> Result<(), SerializeError> {
        self.push_field(name, value.len() as u64 * 8, TreeValue::Bytes(value.to_vec()));
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
        if bits % 8 != 0 || encoded.len() as u64 * 8 > bits {
            return Err(SerializeError::ValueOutOfRange {
                field: name.to_string(),
                value: value.to_string(),
                bits,
            });
        }
        self.push_encoded_field(name, bits, TreeValue::Text(value.to_string()), Some(encoding));
        Ok(())
    }

    fn write_virtual(&mut self, name: &str, value: &dyn fmt::Display) -> Result<(), SerializeError> {
        self.push_node(Node::Virtual {
            name: name.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }
}
