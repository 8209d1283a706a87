//! Leaf structures shared across services.

use crate::strings::PascalString;
use opcwire_spi::field::{
    optional_bits, read_optional, read_reserved, write_optional, write_reserved,
};
use opcwire_spi::io::{Complex, I32};
use opcwire_spi::{write_context, BitReader, Message, ParseError, SerializeError, WriteBuffer};
use std::fmt;
use uuid::Uuid;

/// A GUID in its OPC-UA field layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GuidValue(pub Uuid);

impl GuidValue {
    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        r.in_context("GuidValue", |r| {
            let data1 = r.read_unsigned("data1", 32)? as u32;
            let data2 = r.read_unsigned("data2", 16)? as u16;
            let data3 = r.read_unsigned("data3", 16)? as u16;
            let mut tail = [0u8; 8];
            tail[..2].copy_from_slice(&r.read_bytes("data4", 2)?);
            tail[2..].copy_from_slice(&r.read_bytes("data5", 6)?);
            Ok(GuidValue(Uuid::from_fields(data1, data2, data3, &tail)))
        })
    }
}

impl Message for GuidValue {
    fn type_name(&self) -> &'static str {
        "GuidValue"
    }

    fn length_in_bits(&self) -> u64 {
        128
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        let (data1, data2, data3, tail) = self.0.as_fields();
        write_context(w, "GuidValue", |w| {
            w.write_unsigned("data1", 32, data1 as u64)?;
            w.write_unsigned("data2", 16, data2 as u64)?;
            w.write_unsigned("data3", 16, data3 as u64)?;
            w.write_bytes("data4", &tail[..2])?;
            w.write_bytes("data5", &tail[2..])
        })
    }
}

/// A 32-bit OPC-UA status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StatusCode {
    pub code: u32,
}

impl StatusCode {
    pub const GOOD: StatusCode = StatusCode { code: 0 };
    pub const BAD_UNEXPECTED_ERROR: StatusCode = StatusCode { code: 0x8001_0000 };
    pub const BAD_DECODING_ERROR: StatusCode = StatusCode { code: 0x8007_0000 };

    pub const fn new(code: u32) -> Self {
        Self { code }
    }

    pub fn is_good(&self) -> bool {
        self.code >> 30 == 0
    }

    pub fn is_bad(&self) -> bool {
        self.code >> 30 == 0b10
    }

    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        r.in_context("StatusCode", |r| {
            Ok(Self {
                code: r.read_unsigned("statusCode", 32)? as u32,
            })
        })
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.code)
    }
}

impl Message for StatusCode {
    fn type_name(&self) -> &'static str {
        "StatusCode"
    }

    fn length_in_bits(&self) -> u64 {
        32
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        write_context(w, "StatusCode", |w| {
            w.write_unsigned("statusCode", 32, self.code as u64)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct QualifiedName {
    pub namespace_index: u16,
    pub name: PascalString,
}

impl QualifiedName {
    pub fn new(namespace_index: u16, name: impl Into<String>) -> Self {
        Self {
            namespace_index,
            name: PascalString::new(name),
        }
    }

    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        r.in_context("QualifiedName", |r| {
            let namespace_index = r.read_unsigned("namespaceIndex", 16)? as u16;
            let name = r.in_context("name", PascalString::parse)?;
            Ok(Self {
                namespace_index,
                name,
            })
        })
    }
}

impl Message for QualifiedName {
    fn type_name(&self) -> &'static str {
        "QualifiedName"
    }

    fn length_in_bits(&self) -> u64 {
        16 + self.name.length_in_bits()
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        write_context(w, "QualifiedName", |w| {
            w.write_unsigned("namespaceIndex", 16, self.namespace_index as u64)?;
            write_context(w, "name", |w| self.name.serialize(w))
        })
    }
}

/// Text with an optional locale. Presence of each part is flagged in a
/// leading byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LocalizedText {
    pub reserved: Option<u64>,
    pub locale: Option<PascalString>,
    pub text: Option<PascalString>,
}

impl LocalizedText {
    pub fn new(locale: Option<&str>, text: Option<&str>) -> Self {
        Self {
            reserved: None,
            locale: locale.map(PascalString::new),
            text: text.map(PascalString::new),
        }
    }

    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        r.in_context("LocalizedText", |r| {
            let strings = Complex::new(PascalString::parse);
            let reserved = read_reserved(r, "reserved", 6, 0)?;
            let text_specified = r.read_bit("textSpecified")?;
            let locale_specified = r.read_bit("localeSpecified")?;
            let locale = read_optional(r, "locale", locale_specified, &strings)?;
            let text = read_optional(r, "text", text_specified, &strings)?;
            Ok(Self {
                reserved,
                locale,
                text,
            })
        })
    }
}

impl Message for LocalizedText {
    fn type_name(&self) -> &'static str {
        "LocalizedText"
    }

    fn length_in_bits(&self) -> u64 {
        let strings = Complex::new(PascalString::parse);
        8 + optional_bits(self.locale.as_ref(), self.locale.is_some(), &strings)
            + optional_bits(self.text.as_ref(), self.text.is_some(), &strings)
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        let strings = Complex::new(PascalString::parse);
        write_context(w, "LocalizedText", |w| {
            write_reserved(w, "reserved", 6, 0, self.reserved)?;
            w.write_bit("textSpecified", self.text.is_some())?;
            w.write_bit("localeSpecified", self.locale.is_some())?;
            write_optional(w, "locale", self.locale.as_ref(), self.locale.is_some(), &strings)?;
            write_optional(w, "text", self.text.as_ref(), self.text.is_some(), &strings)
        })
    }
}

/// Nested diagnostics attached to a service result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DiagnosticInfo {
    pub reserved: Option<u64>,
    pub symbolic_id: Option<i32>,
    pub namespace_uri: Option<i32>,
    pub locale: Option<i32>,
    pub localized_text: Option<i32>,
    pub additional_info: Option<PascalString>,
    pub inner_status_code: Option<StatusCode>,
    pub inner_diagnostic_info: Option<Box<DiagnosticInfo>>,
}

fn parse_boxed_diagnostic(r: &mut BitReader) -> Result<Box<DiagnosticInfo>, ParseError> {
    DiagnosticInfo::parse(r).map(Box::new)
}

impl DiagnosticInfo {
    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        r.in_context("DiagnosticInfo", |r| {
            let reserved = read_reserved(r, "reserved", 1, 0)?;
            let inner_diagnostic_info_specified = r.read_bit("innerDiagnosticInfoSpecified")?;
            let inner_status_code_specified = r.read_bit("innerStatusCodeSpecified")?;
            let additional_info_specified = r.read_bit("additionalInfoSpecified")?;
            let locale_specified = r.read_bit("localeSpecified")?;
            let localized_text_specified = r.read_bit("localizedTextSpecified")?;
            let namespace_uri_specified = r.read_bit("namespaceURISpecified")?;
            let symbolic_id_specified = r.read_bit("symbolicIdSpecified")?;

            let symbolic_id = read_optional(r, "symbolicId", symbolic_id_specified, &I32)?;
            let namespace_uri = read_optional(r, "namespaceURI", namespace_uri_specified, &I32)?;
            let locale = read_optional(r, "locale", locale_specified, &I32)?;
            let localized_text = read_optional(r, "localizedText", localized_text_specified, &I32)?;
            let additional_info = read_optional(
                r,
                "additionalInfo",
                additional_info_specified,
                &Complex::new(PascalString::parse),
            )?;
            let inner_status_code = read_optional(
                r,
                "innerStatusCode",
                inner_status_code_specified,
                &Complex::new(StatusCode::parse),
            )?;
            let inner_diagnostic_info = read_optional(
                r,
                "innerDiagnosticInfo",
                inner_diagnostic_info_specified,
                &Complex::new(parse_boxed_diagnostic),
            )?;
            Ok(Self {
                reserved,
                symbolic_id,
                namespace_uri,
                locale,
                localized_text,
                additional_info,
                inner_status_code,
                inner_diagnostic_info,
            })
        })
    }
}

impl Message for DiagnosticInfo {
    fn type_name(&self) -> &'static str {
        "DiagnosticInfo"
    }

    fn length_in_bits(&self) -> u64 {
        let ints = [
            self.symbolic_id,
            self.namespace_uri,
            self.locale,
            self.localized_text,
        ];
        8 + ints.iter().flatten().count() as u64 * 32
            + self.additional_info.as_ref().map_or(0, Message::length_in_bits)
            + self.inner_status_code.as_ref().map_or(0, Message::length_in_bits)
            + self
                .inner_diagnostic_info
                .as_ref()
                .map_or(0, |inner| inner.length_in_bits())
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        write_context(w, "DiagnosticInfo", |w| {
            write_reserved(w, "reserved", 1, 0, self.reserved)?;
            w.write_bit("innerDiagnosticInfoSpecified", self.inner_diagnostic_info.is_some())?;
            w.write_bit("innerStatusCodeSpecified", self.inner_status_code.is_some())?;
            w.write_bit("additionalInfoSpecified", self.additional_info.is_some())?;
            w.write_bit("localeSpecified", self.locale.is_some())?;
            w.write_bit("localizedTextSpecified", self.localized_text.is_some())?;
            w.write_bit("namespaceURISpecified", self.namespace_uri.is_some())?;
            w.write_bit("symbolicIdSpecified", self.symbolic_id.is_some())?;

            for (name, value) in [
                ("symbolicId", self.symbolic_id),
                ("namespaceURI", self.namespace_uri),
                ("locale", self.locale),
                ("localizedText", self.localized_text),
            ] {
                write_optional(w, name, value.as_ref(), value.is_some(), &I32)?;
            }
            write_optional(
                w,
                "additionalInfo",
                self.additional_info.as_ref(),
                self.additional_info.is_some(),
                &Complex::new(PascalString::parse),
            )?;
            write_optional(
                w,
                "innerStatusCode",
                self.inner_status_code.as_ref(),
                self.inner_status_code.is_some(),
                &Complex::new(StatusCode::parse),
            )?;
            write_optional(
                w,
                "innerDiagnosticInfo",
                self.inner_diagnostic_info.as_ref(),
                self.inner_diagnostic_info.is_some(),
                &Complex::new(parse_boxed_diagnostic),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opcwire_spi::{assert_length_agreement, CodecOptions, Decoder, Encoder};

    fn roundtrip<M, F>(message: &M, parse: F) -> M
    where
        M: Message,
        F: FnOnce(&mut BitReader) -> Result<M, ParseError>,
    {
        assert_length_agreement(message).unwrap();
        let bytes = Encoder::encode(message, &CodecOptions::default()).unwrap();
        Decoder::default()
            .decode(bytes, message.type_name(), parse)
            .unwrap()
            .into_value()
    }

    #[test]
    fn test_guid_layout() {
        let guid = GuidValue(Uuid::from_u128(0x00112233_4455_6677_8899_aabbccddeeff));
        let bytes = Encoder::encode(&guid, &CodecOptions::default()).unwrap();
        assert_eq!(
            hex::encode(&bytes),
            "00112233445566778899aabbccddeeff"
        );
        assert_eq!(roundtrip(&guid, GuidValue::parse), guid);
    }

    #[test]
    fn test_status_code() {
        assert!(StatusCode::GOOD.is_good());
        assert!(StatusCode::BAD_DECODING_ERROR.is_bad());
        assert_eq!(StatusCode::BAD_DECODING_ERROR.to_string(), "0x80070000");
        let code = StatusCode::new(0x4000_0000);
        assert!(!code.is_good() && !code.is_bad());
        assert_eq!(roundtrip(&code, StatusCode::parse), code);
    }

    #[test]
    fn test_qualified_name() {
        let name = QualifiedName::new(2, "Temperature");
        assert_eq!(name.length_in_bits(), 16 + 32 + 11 * 8);
        assert_eq!(roundtrip(&name, QualifiedName::parse), name);
    }

    #[test]
    fn test_localized_text_presence() {
        for text in [
            LocalizedText::default(),
            LocalizedText::new(Some("en"), None),
            LocalizedText::new(None, Some("Pump")),
            LocalizedText::new(Some("de"), Some("Pumpe")),
        ] {
            assert_eq!(roundtrip(&text, LocalizedText::parse), text);
        }

        let bytes = Encoder::encode(&LocalizedText::new(Some("en"), None), &CodecOptions::default())
            .unwrap();
        assert_eq!(bytes[0], 0b0000_0001);
    }

    #[test]
    fn test_localized_text_reserved_retained() {
        let wire = vec![0b1000_0000];
        let decoded = Decoder::default()
            .decode(wire.clone(), "LocalizedText", LocalizedText::parse)
            .unwrap();
        assert_eq!(decoded.mismatches.len(), 1);
        assert_eq!(decoded.value.reserved, Some(0b10_0000));
        let bytes = Encoder::encode(&decoded.value, &CodecOptions::default()).unwrap();
        assert_eq!(&bytes[..], &wire[..]);
    }

    #[test]
    fn test_diagnostic_info_recursive() {
        let info = DiagnosticInfo {
            symbolic_id: Some(7),
            additional_info: Some(PascalString::new("outer")),
            inner_status_code: Some(StatusCode::BAD_UNEXPECTED_ERROR),
            inner_diagnostic_info: Some(Box::new(DiagnosticInfo {
                locale: Some(-1),
                ..DiagnosticInfo::default()
            })),
            ..DiagnosticInfo::default()
        };
        let bytes = Encoder::encode(&info, &CodecOptions::default()).unwrap();
        assert_eq!(bytes[0], 0b0111_0001);
        assert_eq!(roundtrip(&info, DiagnosticInfo::parse), info);
    }

    #[test]
    fn test_diagnostic_info_nesting_is_bounded() {
        let err = Decoder::default()
            .decode(vec![0x40u8; 20_000], "DiagnosticInfo", DiagnosticInfo::parse)
            .unwrap_err();
        assert!(matches!(err, ParseError::NestingTooDeep { limit: 100, .. }));
    }

    #[test]
    fn test_diagnostic_info_nesting_up_to_limit() {
        // ten levels open nineteen field groups: one per level plus one per
        // innerDiagnosticInfo field
        let mut wire = vec![0x40u8; 9];
        wire.push(0x00);

        let at_limit = Decoder::new(CodecOptions::default().with_max_depth(19))
            .decode(wire.clone(), "DiagnosticInfo", DiagnosticInfo::parse)
            .unwrap()
            .into_value();
        let mut levels = 1;
        let mut info = &at_limit;
        while let Some(inner) = &info.inner_diagnostic_info {
            levels += 1;
            info = inner;
        }
        assert_eq!(levels, 10);

        let err = Decoder::new(CodecOptions::default().with_max_depth(18))
            .decode(wire, "DiagnosticInfo", DiagnosticInfo::parse)
            .unwrap_err();
        assert_eq!(
            err,
            ParseError::NestingTooDeep {
                path: [["DiagnosticInfo", "innerDiagnosticInfo"]; 9].concat().join("/")
                    + "/DiagnosticInfo",
                limit: 18,
            }
        );
    }
}
