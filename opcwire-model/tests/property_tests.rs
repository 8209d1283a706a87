//! Property-based tests using proptest
//!
//! Round-trips and length agreement across randomly generated catalogue
//! values, plus robustness of the decoders against arbitrary input.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::Bytes;
use opcwire_model::definitions::AggregateConfiguration;
use opcwire_model::pdu::{SecurityHeader, SequenceHeader};
use opcwire_model::{
    DiagnosticInfo, ExtensionObject, LocalizedText, MessagePdu, NodeId, Payload, PduBody, PascalString, Variant,
    VariantValue,
};
use opcwire_spi::{assert_length_agreement, CodecOptions, Decoder, Encoder, Message, ParseError};
use proptest::prelude::*;

fn roundtrip<T, F>(message: &T, parse: F) -> T
where
    T: Message,
    F: FnOnce(&mut opcwire_spi::BitReader) -> Result<T, ParseError>,
{
    let bytes = Encoder::encode(message, &CodecOptions::default()).expect("encode should not fail");
    Decoder::default()
        .decode(bytes, message.type_name(), parse)
        .expect("decode should not fail")
        .into_value()
}

// Property: numeric node ids survive a round-trip in their most compact layout
proptest! {
    #[test]
    fn prop_numeric_node_id_roundtrip(namespace in any::<u16>(), identifier in any::<u32>()) {
        let node = NodeId::numeric(namespace, identifier);
        let bits = assert_length_agreement(&node).unwrap();

        let expected = if namespace == 0 && identifier <= 0xFF {
            16
        } else if namespace <= 0xFF && identifier <= 0xFFFF {
            32
        } else {
            56
        };
        prop_assert_eq!(bits, expected);
        prop_assert_eq!(roundtrip(&node, NodeId::parse), node);
    }
}

// Property: null and empty strings stay distinct
proptest! {
    #[test]
    fn prop_pascal_string_roundtrip(value in proptest::option::of("\\PC{0,40}")) {
        let string = PascalString { value };
        assert_length_agreement(&string).unwrap();
        prop_assert_eq!(roundtrip(&string, PascalString::parse), string);
    }
}

// Property: presence bits of localized text follow the optionals
proptest! {
    #[test]
    fn prop_localized_text_roundtrip(
        locale in proptest::option::of("[a-z]{2}-[A-Z]{2}"),
        text in proptest::option::of("\\PC{0,20}"),
    ) {
        let localized = LocalizedText::new(locale.as_deref(), text.as_deref());
        assert_length_agreement(&localized).unwrap();
        prop_assert_eq!(roundtrip(&localized, LocalizedText::parse), localized);
    }
}

// Property: arrays of every length keep their values and count
proptest! {
    #[test]
    fn prop_variant_array_roundtrip(values in prop::collection::vec(any::<i32>(), 0..64)) {
        let variant = Variant::array(VariantValue::Int32(values.clone()));
        let bits = assert_length_agreement(&variant).unwrap();
        prop_assert_eq!(bits, 8 + 32 + values.len() as u64 * 32);
        prop_assert_eq!(roundtrip(&variant, Variant::parse), variant);
    }
}

// Property: sub-byte fields pack without disturbing their neighbours
proptest! {
    #[test]
    fn prop_aggregate_configuration_roundtrip(
        treat_uncertain_as_bad in any::<bool>(),
        use_server_capabilities_defaults in any::<bool>(),
        percent_data_bad in any::<u8>(),
        percent_data_good in any::<u8>(),
        use_sloped_extrapolation in any::<bool>(),
    ) {
        let configuration = AggregateConfiguration {
            treat_uncertain_as_bad,
            use_server_capabilities_defaults,
            percent_data_bad,
            percent_data_good,
            use_sloped_extrapolation,
            ..AggregateConfiguration::default()
        };
        let object = ExtensionObject::new(configuration);
        prop_assert_eq!(assert_length_agreement(&configuration).unwrap(), 32);
        prop_assert_eq!(roundtrip(&object, |r| ExtensionObject::parse(r, true)), object);
    }
}

// Property: totalLength always equals the encoded size
proptest! {
    #[test]
    fn prop_pdu_total_length(payload in prop::collection::vec(any::<u8>(), 0..512)) {
        let pdu = MessagePdu::new(PduBody::MessageRequest {
            security_header: SecurityHeader::default(),
            message: Payload::Binary {
                sequence_header: SequenceHeader::default(),
                payload: Bytes::from(payload.clone()),
            },
        });
        let bytes = Encoder::encode(&pdu, &CodecOptions::default()).unwrap();
        let total = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        prop_assert_eq!(total, bytes.len());
        prop_assert_eq!(bytes.len(), 24 + payload.len());
        prop_assert_eq!(roundtrip(&pdu, |r| MessagePdu::parse(r, false, true)), pdu);
    }
}

// Property: arbitrary input yields a value or an error, never a panic
proptest! {
    #[test]
    fn prop_decoders_never_panic(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let decoder = Decoder::default().allow_trailing(true);
        let _ = decoder.decode(data.clone(), "MessagePdu", |r| MessagePdu::parse(r, true, false));
        let _ = decoder.decode(data.clone(), "Variant", Variant::parse);
        let _ = decoder.decode(data, "ExtensionObject", |r| ExtensionObject::parse(r, true));
    }
}

// Property: self-nesting input stops at the depth limit instead of recursing
proptest! {
    #[test]
    fn prop_deep_nesting_is_rejected(
        lead in prop_oneof![Just(0x40u8), Just(0x18u8)],
        count in 100usize..20_000,
    ) {
        let data = vec![lead; count];
        let decoder = Decoder::default();
        let result = if lead == 0x40 {
            decoder.decode(data, "DiagnosticInfo", DiagnosticInfo::parse).map(|_| ())
        } else {
            decoder.decode(data, "Variant", Variant::parse).map(|_| ())
        };
        let is_nesting_error = matches!(result, Err(ParseError::NestingTooDeep { .. }));
        prop_assert!(is_nesting_error);
    }
}
