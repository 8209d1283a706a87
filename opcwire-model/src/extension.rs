//! Extension objects.
//!
//! An extension object names its body type with an [`ExpandedNodeId`]. The
//! numeric part of that id selects the body decoder. Inside variants and
//! headers an encoding mask follows the type id; a binary body is then
//! prefixed with its byte length and must fill it exactly.

use crate::definitions::ExtensionObjectDefinition;
use crate::enums::ExtensionObjectEncoding;
use crate::node_id::ExpandedNodeId;
use crate::strings::PascalString;
use opcwire_spi::field::{read_bounded, write_implicit};
use opcwire_spi::io::I32;
use opcwire_spi::{
    write_context, BitReader, Discriminated, EnumValue, Message, ParseError, SerializeError,
    WriteBuffer,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionBody {
    /// Body written directly after the type id, without an encoding mask.
    Unmasked(Box<ExtensionObjectDefinition>),
    Empty,
    Binary(Box<ExtensionObjectDefinition>),
    Xml(PascalString),
}

impl ExtensionBody {
    fn encoding(&self) -> Option<ExtensionObjectEncoding> {
        match self {
            ExtensionBody::Unmasked(_) => None,
            ExtensionBody::Empty => Some(ExtensionObjectEncoding::NoBody),
            ExtensionBody::Binary(_) => Some(ExtensionObjectEncoding::BinaryBody),
            ExtensionBody::Xml(_) => Some(ExtensionObjectEncoding::XmlBody),
        }
    }

    pub fn definition(&self) -> Option<&ExtensionObjectDefinition> {
        match self {
            ExtensionBody::Unmasked(definition) | ExtensionBody::Binary(definition) => {
                Some(definition)
            }
            ExtensionBody::Empty | ExtensionBody::Xml(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionObject {
    pub type_id: ExpandedNodeId,
    pub body: ExtensionBody,
}

fn extension_id(type_id: &ExpandedNodeId) -> Result<i32, ParseError> {
    type_id
        .numeric_identifier()
        .and_then(|id| i32::try_from(id).ok())
        .ok_or_else(|| ParseError::UnknownDiscriminator {
            family: "ExtensionObjectDefinition",
            value: type_id.to_string(),
        })
}

impl ExtensionObject {
    /// A binary-encoded object whose type id is taken from `definition`.
    pub fn new(definition: impl Into<ExtensionObjectDefinition>) -> Self {
        let definition = definition.into();
        Self {
            type_id: ExpandedNodeId::numeric(definition.discriminator() as u32),
            body: ExtensionBody::Binary(Box::new(definition)),
        }
    }

    /// An object written without an encoding mask.
    pub fn unmasked(definition: impl Into<ExtensionObjectDefinition>) -> Self {
        let definition = definition.into();
        Self {
            type_id: ExpandedNodeId::numeric(definition.discriminator() as u32),
            body: ExtensionBody::Unmasked(Box::new(definition)),
        }
    }

    /// The empty object with type id `i=0`.
    pub fn null() -> Self {
        Self {
            type_id: ExpandedNodeId::numeric(0),
            body: ExtensionBody::Empty,
        }
    }

    pub fn definition(&self) -> Option<&ExtensionObjectDefinition> {
        self.body.definition()
    }

    pub fn parse(r: &mut BitReader, include_encoding_mask: bool) -> Result<Self, ParseError> {
        r.in_context("ExtensionObject", |r| {
            let type_id = r.in_context("typeId", ExpandedNodeId::parse)?;
            if !include_encoding_mask {
                let definition = ExtensionObjectDefinition::parse(r, extension_id(&type_id)?)?;
                return Ok(Self {
                    type_id,
                    body: ExtensionBody::Unmasked(Box::new(definition)),
                });
            }

            let encoding = EnumValue::<ExtensionObjectEncoding>::read(r, "encodingMask")?
                .expect_known("ExtensionObject")?;
            let body = match encoding {
                ExtensionObjectEncoding::NoBody => ExtensionBody::Empty,
                ExtensionObjectEncoding::BinaryBody => {
                    let body_length = r.read_signed("bodyLength", 32)?;
                    let id = extension_id(&type_id)?;
                    let definition = read_bounded(r, "body", body_length, |r| {
                        r.in_context("body", |r| ExtensionObjectDefinition::parse(r, id))
                    })?;
                    ExtensionBody::Binary(Box::new(definition))
                }
                ExtensionObjectEncoding::XmlBody => {
                    ExtensionBody::Xml(r.in_context("body", PascalString::parse)?)
                }
            };
            Ok(Self { type_id, body })
        })
    }

    fn check_type_id(&self) -> Result<(), SerializeError> {
        let Some(definition) = self.definition() else {
            return Ok(());
        };
        let expected = definition.discriminator();
        match self.type_id.numeric_identifier() {
            Some(id) if i64::from(id) == i64::from(expected) => Ok(()),
            _ => Err(SerializeError::DiscriminatorMismatch {
                family: "ExtensionObjectDefinition",
                declared: self.type_id.to_string(),
                actual: expected.to_string(),
            }),
        }
    }
}

impl Message for ExtensionObject {
    fn type_name(&self) -> &'static str {
        "ExtensionObject"
    }

    fn length_in_bits(&self) -> u64 {
        let body = match &self.body {
            ExtensionBody::Unmasked(definition) => definition.length_in_bits(),
            ExtensionBody::Empty => 8,
            ExtensionBody::Binary(definition) => 8 + 32 + definition.length_in_bits(),
            ExtensionBody::Xml(xml) => 8 + xml.length_in_bits(),
        };
        self.type_id.length_in_bits() + body
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        self.check_type_id()?;
        write_context(w, "ExtensionObject", |w| {
            write_context(w, "typeId", |w| self.type_id.serialize(w))?;
            if let Some(encoding) = self.body.encoding() {
                EnumValue::from(encoding).write(w, "encodingMask")?;
            }
            match &self.body {
                ExtensionBody::Unmasked(definition) => definition.serialize(w),
                ExtensionBody::Empty => Ok(()),
                ExtensionBody::Binary(definition) => {
                    let body_length = i32::try_from(definition.length_in_bytes()).map_err(|_| {
                        SerializeError::ValueOutOfRange {
                            field: "bodyLength".to_string(),
                            value: definition.length_in_bytes().to_string(),
                            bits: 32,
                        }
                    })?;
                    write_implicit(w, "bodyLength", body_length, &I32)?;
                    write_context(w, "body", |w| definition.serialize(w))
                }
                ExtensionBody::Xml(xml) => write_context(w, "body", |w| xml.serialize(w)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::{AggregateConfiguration, ReadValueId};
    use crate::node_id::{NodeId, NodeIdTypeDefinition};
    use opcwire_spi::{assert_length_agreement, CodecOptions, Decoder, Encoder};

    fn encode(message: &dyn Message) -> Vec<u8> {
        Encoder::encode(message, &CodecOptions::default()).unwrap().to_vec()
    }

    fn decode(bytes: Vec<u8>, masked: bool) -> Result<ExtensionObject, ParseError> {
        Decoder::default()
            .decode(bytes, "ExtensionObject", |r| ExtensionObject::parse(r, masked))
            .map(|decoded| decoded.into_value())
    }

    fn aggregate_configuration() -> AggregateConfiguration {
        AggregateConfiguration {
            treat_uncertain_as_bad: true,
            percent_data_bad: 10,
            percent_data_good: 90,
            use_sloped_extrapolation: true,
            ..AggregateConfiguration::default()
        }
    }

    #[test]
    fn test_binary_body_layout() {
        let object = ExtensionObject::new(aggregate_configuration());
        let bytes = encode(&object);
        assert_eq!(
            hex::encode(&bytes),
            concat!("010003b6", "01", "00000004", "020a5a01")
        );
        assert_eq!(assert_length_agreement(&object).unwrap(), 13 * 8);
        assert_eq!(decode(bytes, true).unwrap(), object);
    }

    #[test]
    fn test_unmasked_body() {
        let object = ExtensionObject::unmasked(aggregate_configuration());
        let bytes = encode(&object);
        assert_eq!(bytes.len(), 4 + 4);
        assert_eq!(decode(bytes, false).unwrap(), object);
    }

    #[test]
    fn test_empty_and_xml_bodies() {
        let null = ExtensionObject::null();
        assert_eq!(encode(&null), vec![0x00, 0x00, 0x00]);
        assert_eq!(decode(encode(&null), true).unwrap(), null);

        let xml = ExtensionObject {
            type_id: ExpandedNodeId::numeric(12),
            body: ExtensionBody::Xml(PascalString::new("<a/>")),
        };
        assert_eq!(decode(encode(&xml), true).unwrap(), xml);
    }

    #[test]
    fn test_unknown_id_names_value() {
        let mut bytes = encode(&ExtensionObject::new(aggregate_configuration()));
        bytes[3] = 0xB7;
        let err = decode(bytes, true).unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownDiscriminator {
                family: "ExtensionObjectDefinition",
                value: "951".to_string(),
            }
        );
    }

    #[test]
    fn test_string_type_id_is_unknown() {
        let object = ExtensionObject {
            type_id: ExpandedNodeId::new(NodeIdTypeDefinition::string(1, "Custom")),
            body: ExtensionBody::Empty,
        };
        let mut bytes = encode(&object);
        let last = bytes.len() - 1;
        bytes[last] = 0x01;
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        assert!(decode(bytes, true).unwrap_err().is_unknown_discriminator());
    }

    #[test]
    fn test_body_length_must_be_filled() {
        let mut bytes = encode(&ExtensionObject::new(aggregate_configuration()));
        bytes[8] = 0x05;
        bytes.push(0x00);
        let err = decode(bytes, true).unwrap_err();
        assert!(matches!(
            err,
            ParseError::LengthMismatch {
                declared: 40,
                consumed: 32,
                ..
            }
        ));
    }

    #[test]
    fn test_type_id_must_match_body() {
        let object = ExtensionObject {
            type_id: ExpandedNodeId::numeric(950),
            body: ExtensionBody::Binary(Box::new(
                ReadValueId::value_of(NodeId::numeric(0, 1)).into(),
            )),
        };
        let err = Encoder::encode(&object, &CodecOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            SerializeError::DiscriminatorMismatch { ref actual, .. } if actual == "628"
        ));
    }
}
