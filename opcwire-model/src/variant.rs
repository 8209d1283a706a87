//! Variants and data values.
//!
//! A variant is decoded in two steps. The registry entry for its type tag
//! reads the optional array length and the values, then hands back a
//! [`VariantContinuation`] holding them. The array dimensions follow the
//! values on the wire, so the enclosing parse reads them and invokes the
//! continuation.

use crate::enums::VariantType;
use crate::extension::ExtensionObject;
use crate::node_id::{ExpandedNodeId, NodeId};
use crate::strings::{PascalByteString, PascalString};
use crate::structures::{DiagnosticInfo, GuidValue, LocalizedText, QualifiedName, StatusCode};
use opcwire_spi::field::{
    array_bits, optional_bits, read_counted_array, read_optional, read_reserved,
    write_counted_array, write_optional, write_reserved,
};
use opcwire_spi::io::{Complex, Float32, Float64, I16, I32, I64, I8, U16, U32, U64, U8};
use opcwire_spi::{
    write_context, BitReader, DecodeFn, Discriminated, EnumValue, Message, ParseError, Registry,
    SerializeError, WriteBuffer,
};

fn parse_extension_object(r: &mut BitReader) -> Result<ExtensionObject, ParseError> {
    ExtensionObject::parse(r, true)
}

macro_rules! variant_values {
    ($($variant:ident($ty:ty) => $codec:expr;)*) => {
        /// Values carried by a variant, one arm per built-in type. A scalar is
        /// a one-element vector.
        #[derive(Debug, Clone, PartialEq)]
        pub enum VariantValue {
            $($variant(Vec<$ty>),)*
        }

        impl VariantValue {
            pub fn len(&self) -> usize {
                match self {
                    $(VariantValue::$variant(values) => values.len(),)*
                }
            }

            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }

            fn values_bits(&self) -> u64 {
                match self {
                    $(VariantValue::$variant(values) => array_bits(values, &$codec),)*
                }
            }

            fn write_values(&self, w: &mut dyn WriteBuffer, declared: i64) -> Result<(), SerializeError> {
                match self {
                    $(VariantValue::$variant(values) => {
                        write_counted_array(w, "value", declared, values, &$codec)
                    })*
                }
            }
        }

        impl Discriminated for VariantValue {
            type Key = VariantType;

            fn discriminator(&self) -> VariantType {
                match self {
                    $(VariantValue::$variant(_) => VariantType::$variant,)*
                }
            }
        }

        static VARIANT_VALUE_TABLE: &[(VariantType, DecodeFn<bool, VariantContinuation>)] = &[
            $((VariantType::$variant, |r, array_length_specified| {
                let array_length = read_optional(r, "arrayLength", array_length_specified, &I32)?;
                let count = array_length.unwrap_or(1) as i64;
                let values = read_counted_array(r, "value", count, &$codec)?;
                let value = VariantValue::$variant(values);
                Ok(Box::new(move |array_dimensions: Option<Vec<i32>>| Variant {
                    array_length,
                    value,
                    array_dimensions,
                }))
            }),)*
        ];
    };
}

variant_values! {
    Boolean(u8) => U8;
    SByte(i8) => I8;
    Byte(u8) => U8;
    Int16(i16) => I16;
    UInt16(u16) => U16;
    Int32(i32) => I32;
    UInt32(u32) => U32;
    Int64(i64) => I64;
    UInt64(u64) => U64;
    Float(f32) => Float32;
    Double(f64) => Float64;
    String(PascalString) => Complex::new(PascalString::parse);
    DateTime(i64) => I64;
    Guid(GuidValue) => Complex::new(GuidValue::parse);
    ByteString(PascalByteString) => Complex::new(PascalByteString::parse);
    XmlElement(PascalString) => Complex::new(PascalString::parse);
    NodeId(NodeId) => Complex::new(NodeId::parse);
    ExpandedNodeId(ExpandedNodeId) => Complex::new(ExpandedNodeId::parse);
    StatusCode(StatusCode) => Complex::new(StatusCode::parse);
    QualifiedName(QualifiedName) => Complex::new(QualifiedName::parse);
    LocalizedText(LocalizedText) => Complex::new(LocalizedText::parse);
    ExtensionObject(ExtensionObject) => Complex::new(parse_extension_object);
    DataValue(DataValue) => Complex::new(DataValue::parse);
    Variant(Variant) => Complex::new(Variant::parse);
    DiagnosticInfo(DiagnosticInfo) => Complex::new(DiagnosticInfo::parse);
}

/// Variant value decoders keyed by type tag. The argument is the
/// array-length flag read by the enclosing variant.
pub static VARIANT_VALUES: Registry<VariantType, bool, VariantContinuation> =
    Registry::new("Variant", VARIANT_VALUE_TABLE);

/// Finishes a variant once its array dimensions are known.
pub type VariantContinuation = Box<dyn FnOnce(Option<Vec<i32>>) -> Variant>;

#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    /// Element count. `None` means a scalar, in which case `value` holds
    /// exactly one element.
    pub array_length: Option<i32>,
    pub value: VariantValue,
    pub array_dimensions: Option<Vec<i32>>,
}

impl Variant {
    pub fn scalar(value: VariantValue) -> Self {
        Self {
            array_length: None,
            value,
            array_dimensions: None,
        }
    }

    /// An array variant whose declared length matches `value`.
    pub fn array(value: VariantValue) -> Self {
        Self {
            array_length: Some(value.len() as i32),
            value,
            array_dimensions: None,
        }
    }

    pub fn with_dimensions(mut self, dimensions: Vec<i32>) -> Self {
        self.array_dimensions = Some(dimensions);
        self
    }

    pub fn variant_type(&self) -> VariantType {
        self.value.discriminator()
    }

    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        r.in_context("Variant", |r| {
            let array_length_specified = r.read_bit("arrayLengthSpecified")?;
            let array_dimensions_specified = r.read_bit("arrayDimensionsSpecified")?;
            let variant_type =
                EnumValue::<VariantType>::read(r, "VariantType")?.expect_known("Variant")?;
            let finish = VARIANT_VALUES.decode(r, &variant_type, array_length_specified)?;

            let array_dimensions = if array_dimensions_specified {
                let count = r.read_signed("noOfArrayDimensions", 32)?;
                Some(read_counted_array(r, "arrayDimensions", count, &I32)?)
            } else {
                None
            };
            Ok(finish(array_dimensions))
        })
    }
}

impl Message for Variant {
    fn type_name(&self) -> &'static str {
        "Variant"
    }

    fn length_in_bits(&self) -> u64 {
        8 + self.array_length.map_or(0, |_| 32)
            + self.value.values_bits()
            + self
                .array_dimensions
                .as_ref()
                .map_or(0, |dims| 32 + dims.len() as u64 * 32)
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        write_context(w, "Variant", |w| {
            w.write_bit("arrayLengthSpecified", self.array_length.is_some())?;
            w.write_bit("arrayDimensionsSpecified", self.array_dimensions.is_some())?;
            EnumValue::from(self.variant_type()).write(w, "VariantType")?;
            write_optional(
                w,
                "arrayLength",
                self.array_length.as_ref(),
                self.array_length.is_some(),
                &I32,
            )?;
            self.value
                .write_values(w, self.array_length.unwrap_or(1) as i64)?;
            if let Some(dims) = &self.array_dimensions {
                let count = i32::try_from(dims.len()).map_err(|_| SerializeError::ValueOutOfRange {
                    field: "noOfArrayDimensions".to_string(),
                    value: dims.len().to_string(),
                    bits: 32,
                })?;
                w.write_signed("noOfArrayDimensions", 32, count as i64)?;
                write_counted_array(w, "arrayDimensions", count as i64, dims, &I32)?;
            }
            Ok(())
        })
    }
}

/// A value with its quality and timestamps. Each part is flagged in the
/// leading byte.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataValue {
    pub reserved: Option<u64>,
    pub value: Option<Variant>,
    pub status_code: Option<StatusCode>,
    pub source_timestamp: Option<i64>,
    pub source_picoseconds: Option<u16>,
    pub server_timestamp: Option<i64>,
    pub server_picoseconds: Option<u16>,
}

impl DataValue {
    pub fn new(value: Variant) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        r.in_context("DataValue", |r| {
            let reserved = read_reserved(r, "reserved", 2, 0)?;
            let server_picoseconds_specified = r.read_bit("serverPicosecondsSpecified")?;
            let source_picoseconds_specified = r.read_bit("sourcePicosecondsSpecified")?;
            let server_timestamp_specified = r.read_bit("serverTimestampSpecified")?;
            let source_timestamp_specified = r.read_bit("sourceTimestampSpecified")?;
            let status_code_specified = r.read_bit("statusCodeSpecified")?;
            let value_specified = r.read_bit("valueSpecified")?;

            let value = read_optional(r, "value", value_specified, &Complex::new(Variant::parse))?;
            let status_code = read_optional(
                r,
                "statusCode",
                status_code_specified,
                &Complex::new(StatusCode::parse),
            )?;
            let source_timestamp =
                read_optional(r, "sourceTimestamp", source_timestamp_specified, &I64)?;
            let source_picoseconds =
                read_optional(r, "sourcePicoseconds", source_picoseconds_specified, &U16)?;
            let server_timestamp =
                read_optional(r, "serverTimestamp", server_timestamp_specified, &I64)?;
            let server_picoseconds =
                read_optional(r, "serverPicoseconds", server_picoseconds_specified, &U16)?;
            Ok(Self {
                reserved,
                value,
                status_code,
                source_timestamp,
                source_picoseconds,
                server_timestamp,
                server_picoseconds,
            })
        })
    }
}

impl Message for DataValue {
    fn type_name(&self) -> &'static str {
        "DataValue"
    }

    fn length_in_bits(&self) -> u64 {
        8 + optional_bits(self.value.as_ref(), true, &Complex::new(Variant::parse))
            + optional_bits(self.status_code.as_ref(), true, &Complex::new(StatusCode::parse))
            + optional_bits(self.source_timestamp.as_ref(), true, &I64)
            + optional_bits(self.source_picoseconds.as_ref(), true, &U16)
            + optional_bits(self.server_timestamp.as_ref(), true, &I64)
            + optional_bits(self.server_picoseconds.as_ref(), true, &U16)
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        write_context(w, "DataValue", |w| {
            write_reserved(w, "reserved", 2, 0, self.reserved)?;
            w.write_bit("serverPicosecondsSpecified", self.server_picoseconds.is_some())?;
            w.write_bit("sourcePicosecondsSpecified", self.source_picoseconds.is_some())?;
            w.write_bit("serverTimestampSpecified", self.server_timestamp.is_some())?;
            w.write_bit("sourceTimestampSpecified", self.source_timestamp.is_some())?;
            w.write_bit("statusCodeSpecified", self.status_code.is_some())?;
            w.write_bit("valueSpecified", self.value.is_some())?;

            write_optional(
                w,
                "value",
                self.value.as_ref(),
                self.value.is_some(),
                &Complex::new(Variant::parse),
            )?;
            write_optional(
                w,
                "statusCode",
                self.status_code.as_ref(),
                self.status_code.is_some(),
                &Complex::new(StatusCode::parse),
            )?;
            write_optional(
                w,
                "sourceTimestamp",
                self.source_timestamp.as_ref(),
                self.source_timestamp.is_some(),
                &I64,
            )?;
            write_optional(
                w,
                "sourcePicoseconds",
                self.source_picoseconds.as_ref(),
                self.source_picoseconds.is_some(),
                &U16,
            )?;
            write_optional(
                w,
                "serverTimestamp",
                self.server_timestamp.as_ref(),
                self.server_timestamp.is_some(),
                &I64,
            )?;
            write_optional(
                w,
                "serverPicoseconds",
                self.server_picoseconds.as_ref(),
                self.server_picoseconds.is_some(),
                &U16,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcwire_spi::{assert_length_agreement, CodecOptions, Decoder, Encoder, WireEnum};

    fn encode(message: &dyn Message) -> Vec<u8> {
        Encoder::encode(message, &CodecOptions::default()).unwrap().to_vec()
    }

    fn decode(bytes: Vec<u8>) -> Variant {
        Decoder::default()
            .decode(bytes, "Variant", Variant::parse)
            .unwrap()
            .into_value()
    }

    #[test]
    fn test_signed_byte_array_layout() {
        let variant = Variant::array(VariantValue::SByte(vec![1, 2, 3]));
        let bytes = encode(&variant);
        assert_eq!(bytes, vec![0x82, 0x00, 0x00, 0x00, 0x03, 0x01, 0x02, 0x03]);
        assert_eq!(variant.length_in_bits(), (1 + 4 + 3) * 8);

        let decoded = decode(bytes);
        assert_eq!(decoded.array_length, Some(3));
        assert_eq!(decoded.value, VariantValue::SByte(vec![1, 2, 3]));
        assert_eq!(decoded.array_dimensions, None);
    }

    #[test]
    fn test_registry_covers_every_type() {
        VARIANT_VALUES.validate().unwrap();
        assert_eq!(VARIANT_VALUES.len(), VariantType::VALUES.len());
        for variant_type in VariantType::VALUES {
            assert!(VARIANT_VALUES.contains(variant_type));
        }
    }

    #[test]
    fn test_scalar_values() {
        let values = [
            Variant::scalar(VariantValue::Boolean(vec![1])),
            Variant::scalar(VariantValue::Double(vec![21.5])),
            Variant::scalar(VariantValue::String(vec![PascalString::new("running")])),
            Variant::scalar(VariantValue::NodeId(vec![NodeId::numeric(2, 1001)])),
            Variant::scalar(VariantValue::LocalizedText(vec![LocalizedText::new(
                Some("en"),
                Some("Tank"),
            )])),
            Variant::scalar(VariantValue::Variant(vec![Variant::scalar(
                VariantValue::UInt16(vec![7]),
            )])),
        ];
        for variant in values {
            assert_length_agreement(&variant).unwrap();
            assert_eq!(decode(encode(&variant)), variant);
        }
    }

    #[test]
    fn test_array_dimensions() {
        let variant = Variant::array(VariantValue::Int32(vec![1, 2, 3, 4])).with_dimensions(vec![2, 2]);
        let bytes = encode(&variant);
        assert_eq!(bytes[0], 0xC6);
        assert_eq!(bytes.len(), 1 + 4 + 16 + 4 + 8);
        assert_eq!(decode(bytes), variant);
    }

    #[test]
    fn test_declared_length_must_match() {
        let variant = Variant {
            array_length: Some(2),
            value: VariantValue::SByte(vec![1, 2, 3]),
            array_dimensions: None,
        };
        let err = Encoder::encode(&variant, &CodecOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            SerializeError::CountMismatch {
                declared: 2,
                actual: 3,
                ..
            }
        ));

        let scalar_with_two = Variant::scalar(VariantValue::Byte(vec![1, 2]));
        assert!(Encoder::encode(&scalar_with_two, &CodecOptions::default()).is_err());
    }

    #[test]
    fn test_unknown_type_tag() {
        for tag in [0x00u8, 0x1A, 0x3F] {
            let err = Decoder::default()
                .decode(vec![tag, 0x00], "Variant", Variant::parse)
                .unwrap_err();
            assert!(err.is_unknown_discriminator(), "tag {tag}");
        }
    }

    #[test]
    fn test_nested_variants_are_bounded() {
        let err = Decoder::default()
            .decode(vec![0x18u8; 20_000], "Variant", Variant::parse)
            .unwrap_err();
        assert!(matches!(err, ParseError::NestingTooDeep { limit: 100, .. }));

        let mut variant = Variant::scalar(VariantValue::Byte(vec![7]));
        for _ in 0..19 {
            variant = Variant::scalar(VariantValue::Variant(vec![variant]));
        }
        let bytes = encode(&variant);
        assert_eq!(decode(bytes.clone()), variant);

        let shallow = Decoder::new(CodecOptions::default().with_max_depth(20));
        assert!(matches!(
            shallow.decode(bytes, "Variant", Variant::parse),
            Err(ParseError::NestingTooDeep { limit: 20, .. })
        ));
    }

    #[test]
    fn test_data_value_flags() {
        let value = DataValue {
            status_code: Some(StatusCode::GOOD),
            source_timestamp: Some(132_000_000_000_000_000),
            ..DataValue::new(Variant::scalar(VariantValue::Float(vec![1.5])))
        };
        let bytes = encode(&value);
        assert_eq!(bytes[0], 0b0000_0111);
        assert_eq!(bytes.len() as u64, value.length_in_bytes());

        let decoded = Decoder::default()
            .decode(bytes, "DataValue", DataValue::parse)
            .unwrap();
        assert_eq!(decoded.value, value);
        assert_eq!(encode(&DataValue::default()), vec![0x00]);
    }
}
