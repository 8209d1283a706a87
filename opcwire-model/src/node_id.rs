//! Node identifiers.
//!
//! Every node id starts with a 6-bit [`NodeIdType`] that selects one of six
//! address layouts. The two bits in front of it are reserved in a plain
//! [`NodeId`] and carry presence flags in an [`ExpandedNodeId`].

use crate::enums::NodeIdType;
use crate::strings::{PascalByteString, PascalString};
use crate::structures::GuidValue;
use opcwire_spi::field::{read_optional, read_reserved, write_optional, write_reserved, write_virtual};
use opcwire_spi::io::{Complex, U32};
use opcwire_spi::{
    write_context, BitReader, DecodeFn, Discriminated, EnumValue, Message, ParseError, Registry,
    SerializeError, WriteBuffer,
};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeIdTypeDefinition {
    TwoByte {
        identifier: u8,
    },
    FourByte {
        namespace_index: u8,
        identifier: u16,
    },
    Numeric {
        namespace_index: u16,
        identifier: u32,
    },
    String {
        namespace_index: u16,
        identifier: PascalString,
    },
    Guid {
        namespace_index: u16,
        identifier: GuidValue,
    },
    ByteString {
        namespace_index: u16,
        identifier: PascalByteString,
    },
}

static NODE_ID_TYPE_TABLE: &[(NodeIdType, DecodeFn<(), NodeIdTypeDefinition>)] = &[
    (NodeIdType::TwoByte, |r, _| {
        Ok(NodeIdTypeDefinition::TwoByte {
            identifier: r.read_unsigned("identifier", 8)? as u8,
        })
    }),
    (NodeIdType::FourByte, |r, _| {
        let namespace_index = r.read_unsigned("namespaceIndex", 8)? as u8;
        let identifier = r.read_unsigned("identifier", 16)? as u16;
        Ok(NodeIdTypeDefinition::FourByte {
            namespace_index,
            identifier,
        })
    }),
    (NodeIdType::Numeric, |r, _| {
        let namespace_index = r.read_unsigned("namespaceIndex", 16)? as u16;
        let identifier = r.read_unsigned("identifier", 32)? as u32;
        Ok(NodeIdTypeDefinition::Numeric {
            namespace_index,
            identifier,
        })
    }),
    (NodeIdType::String, |r, _| {
        let namespace_index = r.read_unsigned("namespaceIndex", 16)? as u16;
        let identifier = r.in_context("identifier", PascalString::parse)?;
        Ok(NodeIdTypeDefinition::String {
            namespace_index,
            identifier,
        })
    }),
    (NodeIdType::Guid, |r, _| {
        let namespace_index = r.read_unsigned("namespaceIndex", 16)? as u16;
        let identifier = r.in_context("identifier", GuidValue::parse)?;
        Ok(NodeIdTypeDefinition::Guid {
            namespace_index,
            identifier,
        })
    }),
    (NodeIdType::ByteString, |r, _| {
        let namespace_index = r.read_unsigned("namespaceIndex", 16)? as u16;
        let identifier = r.in_context("identifier", PascalByteString::parse)?;
        Ok(NodeIdTypeDefinition::ByteString {
            namespace_index,
            identifier,
        })
    }),
];

/// Decoders for the node id layouts, keyed by the node type.
pub static NODE_ID_TYPES: Registry<NodeIdType, (), NodeIdTypeDefinition> =
    Registry::new("NodeIdTypeDefinition", NODE_ID_TYPE_TABLE);

impl Discriminated for NodeIdTypeDefinition {
    type Key = NodeIdType;

    fn discriminator(&self) -> NodeIdType {
        match self {
            NodeIdTypeDefinition::TwoByte { .. } => NodeIdType::TwoByte,
            NodeIdTypeDefinition::FourByte { .. } => NodeIdType::FourByte,
            NodeIdTypeDefinition::Numeric { .. } => NodeIdType::Numeric,
            NodeIdTypeDefinition::String { .. } => NodeIdType::String,
            NodeIdTypeDefinition::Guid { .. } => NodeIdType::Guid,
            NodeIdTypeDefinition::ByteString { .. } => NodeIdType::ByteString,
        }
    }
}

impl NodeIdTypeDefinition {
    /// The most compact layout for a numeric address.
    pub fn numeric(namespace_index: u16, identifier: u32) -> Self {
        match (u8::try_from(namespace_index), identifier) {
            (Ok(0), id) if id <= u8::MAX as u32 => NodeIdTypeDefinition::TwoByte {
                identifier: id as u8,
            },
            (Ok(ns), id) if id <= u16::MAX as u32 => NodeIdTypeDefinition::FourByte {
                namespace_index: ns,
                identifier: id as u16,
            },
            _ => NodeIdTypeDefinition::Numeric {
                namespace_index,
                identifier,
            },
        }
    }

    pub fn string(namespace_index: u16, identifier: impl Into<String>) -> Self {
        NodeIdTypeDefinition::String {
            namespace_index,
            identifier: PascalString::new(identifier),
        }
    }

    pub fn namespace_index(&self) -> u16 {
        match self {
            NodeIdTypeDefinition::TwoByte { .. } => 0,
            NodeIdTypeDefinition::FourByte {
                namespace_index, ..
            } => *namespace_index as u16,
            NodeIdTypeDefinition::Numeric {
                namespace_index, ..
            }
            | NodeIdTypeDefinition::String {
                namespace_index, ..
            }
            | NodeIdTypeDefinition::Guid {
                namespace_index, ..
            }
            | NodeIdTypeDefinition::ByteString {
                namespace_index, ..
            } => *namespace_index,
        }
    }

    /// The address as a number, for the three numeric layouts.
    pub fn numeric_identifier(&self) -> Option<u32> {
        match self {
            NodeIdTypeDefinition::TwoByte { identifier } => Some(*identifier as u32),
            NodeIdTypeDefinition::FourByte { identifier, .. } => Some(*identifier as u32),
            NodeIdTypeDefinition::Numeric { identifier, .. } => Some(*identifier),
            _ => None,
        }
    }

    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        r.in_context("NodeIdTypeDefinition", |r| {
            let node_type = EnumValue::<NodeIdType>::read(r, "nodeType")?
                .expect_known("NodeIdTypeDefinition")?;
            NODE_ID_TYPES.decode(r, &node_type, ())
        })
    }

    fn write_identifier(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        match self {
            NodeIdTypeDefinition::TwoByte { identifier } => {
                w.write_unsigned("identifier", 8, *identifier as u64)
            }
            NodeIdTypeDefinition::FourByte {
                namespace_index,
                identifier,
            } => {
                w.write_unsigned("namespaceIndex", 8, *namespace_index as u64)?;
                w.write_unsigned("identifier", 16, *identifier as u64)
            }
            NodeIdTypeDefinition::Numeric {
                namespace_index,
                identifier,
            } => {
                w.write_unsigned("namespaceIndex", 16, *namespace_index as u64)?;
                w.write_unsigned("identifier", 32, *identifier as u64)
            }
            NodeIdTypeDefinition::String {
                namespace_index,
                identifier,
            } => {
                w.write_unsigned("namespaceIndex", 16, *namespace_index as u64)?;
                write_context(w, "identifier", |w| identifier.serialize(w))
            }
            NodeIdTypeDefinition::Guid {
                namespace_index,
                identifier,
            } => {
                w.write_unsigned("namespaceIndex", 16, *namespace_index as u64)?;
                write_context(w, "identifier", |w| identifier.serialize(w))
            }
            NodeIdTypeDefinition::ByteString {
                namespace_index,
                identifier,
            } => {
                w.write_unsigned("namespaceIndex", 16, *namespace_index as u64)?;
                write_context(w, "identifier", |w| identifier.serialize(w))
            }
        }
    }
}

impl Message for NodeIdTypeDefinition {
    fn type_name(&self) -> &'static str {
        "NodeIdTypeDefinition"
    }

    fn length_in_bits(&self) -> u64 {
        6 + match self {
            NodeIdTypeDefinition::TwoByte { .. } => 8,
            NodeIdTypeDefinition::FourByte { .. } => 24,
            NodeIdTypeDefinition::Numeric { .. } => 48,
            NodeIdTypeDefinition::String { identifier, .. } => 16 + identifier.length_in_bits(),
            NodeIdTypeDefinition::Guid { identifier, .. } => 16 + identifier.length_in_bits(),
            NodeIdTypeDefinition::ByteString { identifier, .. } => 16 + identifier.length_in_bits(),
        }
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        write_context(w, "NodeIdTypeDefinition", |w| {
            EnumValue::from(self.discriminator()).write(w, "nodeType")?;
            self.write_identifier(w)
        })
    }
}

impl fmt::Display for NodeIdTypeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = self.namespace_index();
        if ns != 0 {
            write!(f, "ns={};", ns)?;
        }
        match self {
            NodeIdTypeDefinition::TwoByte { .. }
            | NodeIdTypeDefinition::FourByte { .. }
            | NodeIdTypeDefinition::Numeric { .. } => {
                write!(f, "i={}", self.numeric_identifier().unwrap_or_default())
            }
            NodeIdTypeDefinition::String { identifier, .. } => {
                write!(f, "s={}", identifier.as_str())
            }
            NodeIdTypeDefinition::Guid { identifier, .. } => write!(f, "g={}", identifier.0),
            NodeIdTypeDefinition::ByteString { identifier, .. } => {
                f.write_str("b=")?;
                for byte in identifier.value.iter().flatten() {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

/// A node id whose two leading bits are reserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub reserved: Option<u64>,
    pub node_id: NodeIdTypeDefinition,
}

impl NodeId {
    pub fn new(node_id: NodeIdTypeDefinition) -> Self {
        Self {
            reserved: None,
            node_id,
        }
    }

    pub fn numeric(namespace_index: u16, identifier: u32) -> Self {
        Self::new(NodeIdTypeDefinition::numeric(namespace_index, identifier))
    }

    /// The null node id, `i=0`.
    pub fn null() -> Self {
        Self::numeric(0, 0)
    }

    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        r.in_context("NodeId", |r| {
            let reserved = read_reserved(r, "reserved", 2, 0)?;
            let node_id = r.in_context("nodeId", NodeIdTypeDefinition::parse)?;
            Ok(Self { reserved, node_id })
        })
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::null()
    }
}

impl Message for NodeId {
    fn type_name(&self) -> &'static str {
        "NodeId"
    }

    fn length_in_bits(&self) -> u64 {
        2 + self.node_id.length_in_bits()
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        write_context(w, "NodeId", |w| {
            write_reserved(w, "reserved", 2, 0, self.reserved)?;
            write_context(w, "nodeId", |w| self.node_id.serialize(w))
        })
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.node_id)
    }
}

/// A node id that may name its namespace by URI and live on another server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpandedNodeId {
    pub node_id: NodeIdTypeDefinition,
    pub namespace_uri: Option<PascalString>,
    pub server_index: Option<u32>,
}

impl ExpandedNodeId {
    pub fn new(node_id: NodeIdTypeDefinition) -> Self {
        Self {
            node_id,
            namespace_uri: None,
            server_index: None,
        }
    }

    pub fn numeric(identifier: u32) -> Self {
        Self::new(NodeIdTypeDefinition::numeric(0, identifier))
    }

    /// Numeric address of the node, used to look up extension object bodies.
    pub fn numeric_identifier(&self) -> Option<u32> {
        self.node_id.numeric_identifier()
    }

    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        r.in_context("ExpandedNodeId", |r| {
            let namespace_uri_specified = r.read_bit("namespaceURISpecified")?;
            let server_index_specified = r.read_bit("serverIndexSpecified")?;
            let node_id = r.in_context("nodeId", NodeIdTypeDefinition::parse)?;
            let namespace_uri = read_optional(
                r,
                "namespaceURI",
                namespace_uri_specified,
                &Complex::new(PascalString::parse),
            )?;
            let server_index = read_optional(r, "serverIndex", server_index_specified, &U32)?;
            Ok(Self {
                node_id,
                namespace_uri,
                server_index,
            })
        })
    }
}

impl Message for ExpandedNodeId {
    fn type_name(&self) -> &'static str {
        "ExpandedNodeId"
    }

    fn length_in_bits(&self) -> u64 {
        2 + self.node_id.length_in_bits()
            + self.namespace_uri.as_ref().map_or(0, Message::length_in_bits)
            + self.server_index.map_or(0, |_| 32)
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        write_context(w, "ExpandedNodeId", |w| {
            w.write_bit("namespaceURISpecified", self.namespace_uri.is_some())?;
            w.write_bit("serverIndexSpecified", self.server_index.is_some())?;
            write_context(w, "nodeId", |w| self.node_id.serialize(w))?;
            write_optional(
                w,
                "namespaceURI",
                self.namespace_uri.as_ref(),
                self.namespace_uri.is_some(),
                &Complex::new(PascalString::parse),
            )?;
            write_optional(
                w,
                "serverIndex",
                self.server_index.as_ref(),
                self.server_index.is_some(),
                &U32,
            )?;
            write_virtual(w, "identifier", &self.node_id)
        })
    }
}

impl fmt::Display for ExpandedNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(index) = self.server_index {
            write!(f, "svr={};", index)?;
        }
        if let Some(uri) = &self.namespace_uri {
            write!(f, "nsu={};", uri.as_str())?;
        }
        write!(f, "{}", self.node_id)
    }
}
