//! End-to-end checks over the public catalogue API.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use opcwire_model::definitions::{AggregateConfiguration, EndpointType};
use opcwire_model::{
    registries, validate_registries, ExtensionObjectDefinition, MessageSecurityMode, NodeIdType,
    PascalString, Variant, VariantType, VariantValue, EXTENSION_OBJECTS, NODE_ID_TYPES,
    VARIANT_VALUES,
};
use opcwire_model::ExtensionObject;
use opcwire_spi::{
    CodecOptions, Decoder, Encoder, EnumValue, Node, ParseError, ReservedPolicy, WireEnum,
};

#[test]
fn test_aggregate_configuration_by_extension_id() {
    let bytes = hex::decode("020a5a01").unwrap();
    let decoded = Decoder::default()
        .decode(bytes.clone(), "ExtensionObjectDefinition", |r| {
            ExtensionObjectDefinition::parse(r, 950)
        })
        .unwrap();
    assert!(decoded.is_clean());

    let ExtensionObjectDefinition::AggregateConfiguration(configuration) = &decoded.value else {
        panic!("expected AggregateConfiguration, got {:?}", decoded.value);
    };
    assert!(!configuration.use_server_capabilities_defaults);
    assert!(configuration.treat_uncertain_as_bad);
    assert_eq!(configuration.percent_data_bad, 10);
    assert_eq!(configuration.percent_data_good, 90);
    assert!(configuration.use_sloped_extrapolation);

    let encoded = Encoder::encode(&decoded.value, &CodecOptions::default()).unwrap();
    assert_eq!(encoded.to_vec(), bytes);
}

#[test]
fn test_deviating_reserved_bits_are_reported_and_kept() {
    let bytes = hex::decode("820a5a81").unwrap();
    let decoded = Decoder::default()
        .decode(bytes.clone(), "AggregateConfiguration", AggregateConfiguration::parse)
        .unwrap();
    assert_eq!(decoded.mismatches.len(), 2);
    assert_eq!(decoded.value.reserved_head, Some(0x20));
    assert_eq!(
        Encoder::encode(&decoded.value, &CodecOptions::default())
            .unwrap()
            .to_vec(),
        bytes
    );

    let strict = CodecOptions::default().with_reserved_policy(ReservedPolicy::Strict);
    let err = Decoder::new(strict)
        .decode(bytes, "AggregateConfiguration", AggregateConfiguration::parse)
        .unwrap_err();
    assert!(matches!(err, ParseError::ReservedMismatch { .. }));
}

#[test]
fn test_variant_byte_array() {
    let bytes = [0x82, 0x00, 0x00, 0x00, 0x03, 0x01, 0x02, 0x03];
    let decoded = Decoder::default()
        .decode(bytes.to_vec(), "Variant", Variant::parse)
        .unwrap()
        .into_value();
    assert_eq!(decoded.variant_type(), VariantType::Byte);
    assert_eq!(decoded.array_length, Some(3));
    assert_eq!(decoded.value, VariantValue::Byte(vec![1, 2, 3]));
    assert_eq!(decoded.array_dimensions, None);
    assert_eq!(
        Encoder::encode(&decoded, &CodecOptions::default())
            .unwrap()
            .to_vec(),
        bytes
    );
}

#[test]
fn test_every_discriminator_resolves() {
    validate_registries().unwrap();

    for node_type in NodeIdType::VALUES {
        assert!(NODE_ID_TYPES.contains(node_type), "{}", node_type);
    }
    for variant_type in VariantType::VALUES {
        assert!(VARIANT_VALUES.contains(variant_type), "{}", variant_type);
    }
    assert_eq!(EXTENSION_OBJECTS.len(), 13);
    assert!(EXTENSION_OBJECTS.resolve(&951_i32).is_err());

    let total: usize = registries().iter().map(|summary| summary.keys.len()).sum();
    assert_eq!(total, 6 + 25 + 13 + 4 + 2 + 8);
}

#[test]
fn test_unknown_enum_outside_discriminator() {
    let endpoint = EndpointType {
        endpoint_url: PascalString::new("opc.tcp://plc:4840"),
        security_mode: EnumValue::Unknown(7),
        security_policy_uri: PascalString::null(),
        transport_profile_uri: PascalString::null(),
    };
    let bytes = Encoder::encode(&endpoint, &CodecOptions::default()).unwrap();
    let decoded = Decoder::default()
        .decode(bytes, "EndpointType", EndpointType::parse)
        .unwrap()
        .into_value();
    assert_eq!(decoded.security_mode, EnumValue::Unknown(7));
    assert_ne!(
        decoded.security_mode,
        EnumValue::from(MessageSecurityMode::None)
    );
}

#[test]
fn test_rendered_tree_json_round_trip() {
    let wire = hex::decode("010003b60100000004020a5a01").unwrap();
    let object = Decoder::default()
        .decode(wire.clone(), "ExtensionObject", |r| ExtensionObject::parse(r, true))
        .unwrap()
        .into_value();
    let tree = Encoder::render(&object).unwrap();

    let json = serde_json::to_string_pretty(&tree).unwrap();
    let loaded: Node = serde_json::from_str(&json).unwrap();
    let packed = loaded.to_bytes(&CodecOptions::default()).unwrap();
    assert_eq!(packed.to_vec(), wire);

    let again = Decoder::default()
        .decode(packed, "ExtensionObject", |r| ExtensionObject::parse(r, true))
        .unwrap()
        .into_value();
    assert_eq!(again, object);
    assert_eq!(Encoder::render(&again).unwrap(), tree);
}
