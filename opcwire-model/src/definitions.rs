//! Extension object bodies, keyed by the numeric id of their binary encoding.

use crate::enums::{MessageSecurityMode, TimestampsToReturn};
use crate::extension::ExtensionObject;
use crate::identity::UserIdentityToken;
use crate::node_id::NodeId;
use crate::strings::PascalString;
use crate::structures::{DiagnosticInfo, LocalizedText, QualifiedName, StatusCode};
use crate::variant::DataValue;
use opcwire_spi::field::{
    array_bits, nullable_array_bits, read_counted_array, read_nullable_array, read_reserved,
    read_simple, write_counted_array, write_nullable_array, write_reserved, write_simple,
};
use opcwire_spi::io::{Complex, Enum, U32};
use opcwire_spi::{
    write_context, BitReader, DecodeFn, Discriminated, EnumValue, Message, ParseError, Registry,
    SerializeError, WireEnum, WriteBuffer,
};

fn parse_masked_extension(r: &mut BitReader) -> Result<ExtensionObject, ParseError> {
    ExtensionObject::parse(r, true)
}

macro_rules! extension_objects {
    ($($variant:ident = $id:literal;)*) => {
        /// Body of an extension object.
        #[derive(Debug, Clone, PartialEq)]
        pub enum ExtensionObjectDefinition {
            $($variant($variant),)*
        }

        $(
            impl $variant {
                pub const EXTENSION_ID: i32 = $id;
            }

            impl From<$variant> for ExtensionObjectDefinition {
                fn from(value: $variant) -> Self {
                    ExtensionObjectDefinition::$variant(value)
                }
            }
        )*

        impl Discriminated for ExtensionObjectDefinition {
            type Key = i32;

            fn discriminator(&self) -> i32 {
                match self {
                    $(ExtensionObjectDefinition::$variant(_) => $id,)*
                }
            }
        }

        impl Message for ExtensionObjectDefinition {
            fn type_name(&self) -> &'static str {
                match self {
                    $(ExtensionObjectDefinition::$variant(inner) => inner.type_name(),)*
                }
            }

            fn length_in_bits(&self) -> u64 {
                match self {
                    $(ExtensionObjectDefinition::$variant(inner) => inner.length_in_bits(),)*
                }
            }

            fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
                match self {
                    $(ExtensionObjectDefinition::$variant(inner) => inner.serialize(w),)*
                }
            }
        }

        static EXTENSION_OBJECT_TABLE: &[(i32, DecodeFn<(), ExtensionObjectDefinition>)] = &[
            $(($id, |r, _| $variant::parse(r).map(ExtensionObjectDefinition::$variant)),)*
        ];
    };
}

extension_objects! {
    RequestHeader = 391;
    ResponseHeader = 394;
    ServiceFault = 397;
    StructureField = 103;
    UserIdentityToken = 324;
    ReadValueId = 628;
    ReadRequest = 631;
    ReadResponse = 634;
    ReadProcessedDetails = 652;
    AggregateFilterResult = 739;
    AggregateConfiguration = 950;
    EndpointType = 15530;
    BitFieldDefinition = 32423;
}

/// Extension object bodies keyed by the numeric type id.
pub static EXTENSION_OBJECTS: Registry<i32, (), ExtensionObjectDefinition> =
    Registry::new("ExtensionObjectDefinition", EXTENSION_OBJECT_TABLE);

impl ExtensionObjectDefinition {
    pub fn parse(r: &mut BitReader, extension_id: i32) -> Result<Self, ParseError> {
        EXTENSION_OBJECTS.decode(r, &extension_id, ())
    }
}

// ----- headers ---------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RequestHeader {
    pub authentication_token: NodeId,
    pub timestamp: i64,
    pub request_handle: u32,
    pub return_diagnostics: u32,
    pub audit_entry_id: PascalString,
    pub timeout_hint: u32,
    pub additional_header: ExtensionObject,
}

impl RequestHeader {
    pub fn new(request_handle: u32, timestamp: i64) -> Self {
        Self {
            authentication_token: NodeId::null(),
            timestamp,
            request_handle,
            return_diagnostics: 0,
            audit_entry_id: PascalString::null(),
            timeout_hint: 0,
            additional_header: ExtensionObject::null(),
        }
    }

    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        r.in_context("RequestHeader", |r| {
            let authentication_token = r.in_context("authenticationToken", NodeId::parse)?;
            let timestamp = r.read_signed("timestamp", 64)?;
            let request_handle = r.read_unsigned("requestHandle", 32)? as u32;
            let return_diagnostics = r.read_unsigned("returnDiagnostics", 32)? as u32;
            let audit_entry_id = r.in_context("auditEntryId", PascalString::parse)?;
            let timeout_hint = r.read_unsigned("timeoutHint", 32)? as u32;
            let additional_header = r.in_context("additionalHeader", parse_masked_extension)?;
            Ok(Self {
                authentication_token,
                timestamp,
                request_handle,
                return_diagnostics,
                audit_entry_id,
                timeout_hint,
                additional_header,
            })
        })
    }
}

impl Message for RequestHeader {
    fn type_name(&self) -> &'static str {
        "RequestHeader"
    }

    fn length_in_bits(&self) -> u64 {
        self.authentication_token.length_in_bits()
            + 64
            + 32
            + 32
            + self.audit_entry_id.length_in_bits()
            + 32
            + self.additional_header.length_in_bits()
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        write_context(w, "RequestHeader", |w| {
            write_context(w, "authenticationToken", |w| self.authentication_token.serialize(w))?;
            w.write_signed("timestamp", 64, self.timestamp)?;
            w.write_unsigned("requestHandle", 32, self.request_handle as u64)?;
            w.write_unsigned("returnDiagnostics", 32, self.return_diagnostics as u64)?;
            write_context(w, "auditEntryId", |w| self.audit_entry_id.serialize(w))?;
            w.write_unsigned("timeoutHint", 32, self.timeout_hint as u64)?;
            write_context(w, "additionalHeader", |w| self.additional_header.serialize(w))
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseHeader {
    pub timestamp: i64,
    pub request_handle: u32,
    pub service_result: StatusCode,
    pub service_diagnostics: DiagnosticInfo,
    pub string_table: Option<Vec<PascalString>>,
    pub additional_header: ExtensionObject,
}

impl ResponseHeader {
    pub fn new(request_handle: u32, service_result: StatusCode) -> Self {
        Self {
            timestamp: 0,
            request_handle,
            service_result,
            service_diagnostics: DiagnosticInfo::default(),
            string_table: None,
            additional_header: ExtensionObject::null(),
        }
    }

    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        r.in_context("ResponseHeader", |r| {
            let timestamp = r.read_signed("timestamp", 64)?;
            let request_handle = r.read_unsigned("requestHandle", 32)? as u32;
            let service_result = r.in_context("serviceResult", StatusCode::parse)?;
            let service_diagnostics = r.in_context("serviceDiagnostics", DiagnosticInfo::parse)?;
            let string_table = read_nullable_array(
                r,
                "stringTable",
                "noOfStringTable",
                &Complex::new(PascalString::parse),
            )?;
            let additional_header = r.in_context("additionalHeader", parse_masked_extension)?;
            Ok(Self {
                timestamp,
                request_handle,
                service_result,
                service_diagnostics,
                string_table,
                additional_header,
            })
        })
    }
}

impl Message for ResponseHeader {
    fn type_name(&self) -> &'static str {
        "ResponseHeader"
    }

    fn length_in_bits(&self) -> u64 {
        64 + 32
            + self.service_result.length_in_bits()
            + self.service_diagnostics.length_in_bits()
            + nullable_array_bits(self.string_table.as_deref(), &Complex::new(PascalString::parse))
            + self.additional_header.length_in_bits()
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        write_context(w, "ResponseHeader", |w| {
            w.write_signed("timestamp", 64, self.timestamp)?;
            w.write_unsigned("requestHandle", 32, self.request_handle as u64)?;
            write_context(w, "serviceResult", |w| self.service_result.serialize(w))?;
            write_context(w, "serviceDiagnostics", |w| self.service_diagnostics.serialize(w))?;
            write_nullable_array(
                w,
                "stringTable",
                "noOfStringTable",
                self.string_table.as_deref(),
                &Complex::new(PascalString::parse),
            )?;
            write_context(w, "additionalHeader", |w| self.additional_header.serialize(w))
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceFault {
    pub response_header: ResponseHeader,
}

impl ServiceFault {
    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        r.in_context("ServiceFault", |r| {
            let response_header = r.in_context("responseHeader", ResponseHeader::parse)?;
            Ok(Self { response_header })
        })
    }
}

impl Message for ServiceFault {
    fn type_name(&self) -> &'static str {
        "ServiceFault"
    }

    fn length_in_bits(&self) -> u64 {
        self.response_header.length_in_bits()
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        write_context(w, "ServiceFault", |w| {
            write_context(w, "responseHeader", |w| self.response_header.serialize(w))
        })
    }
}

// ----- aggregates ------------------------------------------------------------

/// Aggregate calculation settings. Two flag bits share a byte with six
/// reserved bits, and the trailing flag is preceded by seven more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AggregateConfiguration {
    pub reserved_head: Option<u64>,
    pub treat_uncertain_as_bad: bool,
    pub use_server_capabilities_defaults: bool,
    pub percent_data_bad: u8,
    pub percent_data_good: u8,
    pub reserved_tail: Option<u64>,
    pub use_sloped_extrapolation: bool,
}

impl AggregateConfiguration {
    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        r.in_context("AggregateConfiguration", |r| {
            let reserved_head = read_reserved(r, "reserved", 6, 0)?;
            let treat_uncertain_as_bad = r.read_bit("treatUncertainAsBad")?;
            let use_server_capabilities_defaults = r.read_bit("useServerCapabilitiesDefaults")?;
            let percent_data_bad = r.read_unsigned("percentDataBad", 8)? as u8;
            let percent_data_good = r.read_unsigned("percentDataGood", 8)? as u8;
            let reserved_tail = read_reserved(r, "reserved", 7, 0)?;
            let use_sloped_extrapolation = r.read_bit("useSlopedExtrapolation")?;
            Ok(Self {
                reserved_head,
                treat_uncertain_as_bad,
                use_server_capabilities_defaults,
                percent_data_bad,
                percent_data_good,
                reserved_tail,
                use_sloped_extrapolation,
            })
        })
    }
}

impl Message for AggregateConfiguration {
    fn type_name(&self) -> &'static str {
        "AggregateConfiguration"
    }

    fn length_in_bits(&self) -> u64 {
        6 + 1 + 1 + 8 + 8 + 7 + 1
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        write_context(w, "AggregateConfiguration", |w| {
            write_reserved(w, "reserved", 6, 0, self.reserved_head)?;
            w.write_bit("treatUncertainAsBad", self.treat_uncertain_as_bad)?;
            w.write_bit("useServerCapabilitiesDefaults", self.use_server_capabilities_defaults)?;
            w.write_unsigned("percentDataBad", 8, self.percent_data_bad as u64)?;
            w.write_unsigned("percentDataGood", 8, self.percent_data_good as u64)?;
            write_reserved(w, "reserved", 7, 0, self.reserved_tail)?;
            w.write_bit("useSlopedExtrapolation", self.use_sloped_extrapolation)
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateFilterResult {
    pub revised_start_time: i64,
    pub revised_processing_interval: f64,
    pub revised_aggregate_configuration: AggregateConfiguration,
}

impl AggregateFilterResult {
    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        r.in_context("AggregateFilterResult", |r| {
            let revised_start_time = r.read_signed("revisedStartTime", 64)?;
            let revised_processing_interval = r.read_f64("revisedProcessingInterval")?;
            let revised_aggregate_configuration = r.in_context(
                "revisedAggregateConfiguration",
                AggregateConfiguration::parse,
            )?;
            Ok(Self {
                revised_start_time,
                revised_processing_interval,
                revised_aggregate_configuration,
            })
        })
    }
}

impl Message for AggregateFilterResult {
    fn type_name(&self) -> &'static str {
        "AggregateFilterResult"
    }

    fn length_in_bits(&self) -> u64 {
        64 + 64 + self.revised_aggregate_configuration.length_in_bits()
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        write_context(w, "AggregateFilterResult", |w| {
            w.write_signed("revisedStartTime", 64, self.revised_start_time)?;
            w.write_f64("revisedProcessingInterval", self.revised_processing_interval)?;
            write_context(w, "revisedAggregateConfiguration", |w| {
                self.revised_aggregate_configuration.serialize(w)
            })
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadProcessedDetails {
    pub start_time: i64,
    pub end_time: i64,
    pub processing_interval: f64,
    pub aggregate_type: Option<Vec<NodeId>>,
    pub aggregate_configuration: AggregateConfiguration,
}

impl ReadProcessedDetails {
    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        r.in_context("ReadProcessedDetails", |r| {
            let start_time = r.read_signed("startTime", 64)?;
            let end_time = r.read_signed("endTime", 64)?;
            let processing_interval = r.read_f64("processingInterval")?;
            let aggregate_type = read_nullable_array(
                r,
                "aggregateType",
                "noOfAggregateType",
                &Complex::new(NodeId::parse),
            )?;
            let aggregate_configuration =
                r.in_context("aggregateConfiguration", AggregateConfiguration::parse)?;
            Ok(Self {
                start_time,
                end_time,
                processing_interval,
                aggregate_type,
                aggregate_configuration,
            })
        })
    }
}

impl Message for ReadProcessedDetails {
    fn type_name(&self) -> &'static str {
        "ReadProcessedDetails"
    }

    fn length_in_bits(&self) -> u64 {
        64 + 64
            + 64
            + nullable_array_bits(self.aggregate_type.as_deref(), &Complex::new(NodeId::parse))
            + self.aggregate_configuration.length_in_bits()
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        write_context(w, "ReadProcessedDetails", |w| {
            w.write_signed("startTime", 64, self.start_time)?;
            w.write_signed("endTime", 64, self.end_time)?;
            w.write_f64("processingInterval", self.processing_interval)?;
            write_nullable_array(
                w,
                "aggregateType",
                "noOfAggregateType",
                self.aggregate_type.as_deref(),
                &Complex::new(NodeId::parse),
            )?;
            write_context(w, "aggregateConfiguration", |w| {
                self.aggregate_configuration.serialize(w)
            })
        })
    }
}

// ----- type descriptions -----------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BitFieldDefinition {
    pub name: PascalString,
    pub description: LocalizedText,
    pub reserved_head: Option<u64>,
    pub reserved_flag: Option<u64>,
    pub starting_bit_position: u32,
    pub ending_bit_position: u32,
}

impl BitFieldDefinition {
    pub fn new(name: &str, starting_bit_position: u32, ending_bit_position: u32) -> Self {
        Self {
            name: PascalString::new(name),
            description: LocalizedText::default(),
            reserved_head: None,
            reserved_flag: None,
            starting_bit_position,
            ending_bit_position,
        }
    }

    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        r.in_context("BitFieldDefinition", |r| {
            let name = r.in_context("name", PascalString::parse)?;
            let description = r.in_context("description", LocalizedText::parse)?;
            let reserved_head = read_reserved(r, "reserved", 7, 0)?;
            let reserved_flag = read_reserved(r, "reserved", 1, 0)?;
            let starting_bit_position = r.read_unsigned("startingBitPosition", 32)? as u32;
            let ending_bit_position = r.read_unsigned("endingBitPosition", 32)? as u32;
            Ok(Self {
                name,
                description,
                reserved_head,
                reserved_flag,
                starting_bit_position,
                ending_bit_position,
            })
        })
    }
}

impl Message for BitFieldDefinition {
    fn type_name(&self) -> &'static str {
        "BitFieldDefinition"
    }

    fn length_in_bits(&self) -> u64 {
        self.name.length_in_bits() + self.description.length_in_bits() + 7 + 1 + 32 + 32
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        write_context(w, "BitFieldDefinition", |w| {
            write_context(w, "name", |w| self.name.serialize(w))?;
            write_context(w, "description", |w| self.description.serialize(w))?;
            write_reserved(w, "reserved", 7, 0, self.reserved_head)?;
            write_reserved(w, "reserved", 1, 0, self.reserved_flag)?;
            w.write_unsigned("startingBitPosition", 32, self.starting_bit_position as u64)?;
            w.write_unsigned("endingBitPosition", 32, self.ending_bit_position as u64)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointType {
    pub endpoint_url: PascalString,
    pub security_mode: EnumValue<MessageSecurityMode>,
    pub security_policy_uri: PascalString,
    pub transport_profile_uri: PascalString,
}

impl EndpointType {
    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        let strings = Complex::new(PascalString::parse);
        r.in_context("EndpointType", |r| {
            let endpoint_url = read_simple(r, "endpointUrl", &strings)?;
            let security_mode = read_simple(r, "securityMode", &Enum::<MessageSecurityMode>::new())?;
            let security_policy_uri = read_simple(r, "securityPolicyUri", &strings)?;
            let transport_profile_uri = read_simple(r, "transportProfileUri", &strings)?;
            Ok(Self {
                endpoint_url,
                security_mode,
                security_policy_uri,
                transport_profile_uri,
            })
        })
    }
}

impl Message for EndpointType {
    fn type_name(&self) -> &'static str {
        "EndpointType"
    }

    fn length_in_bits(&self) -> u64 {
        self.endpoint_url.length_in_bits()
            + MessageSecurityMode::BITS as u64
            + self.security_policy_uri.length_in_bits()
            + self.transport_profile_uri.length_in_bits()
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        let strings = Complex::new(PascalString::parse);
        write_context(w, "EndpointType", |w| {
            write_simple(w, "endpointUrl", &self.endpoint_url, &strings)?;
            write_simple(
                w,
                "securityMode",
                &self.security_mode,
                &Enum::<MessageSecurityMode>::new(),
            )?;
            write_simple(w, "securityPolicyUri", &self.security_policy_uri, &strings)?;
            write_simple(w, "transportProfileUri", &self.transport_profile_uri, &strings)
        })
    }
}

/// One field of a structure type description. The dimension count is kept
/// as read, so a `-1` on the wire survives re-encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructureField {
    pub name: PascalString,
    pub description: LocalizedText,
    pub data_type: NodeId,
    pub value_rank: i32,
    pub no_of_array_dimensions: i32,
    pub array_dimensions: Vec<u32>,
    pub max_string_length: u32,
    pub reserved: Option<u64>,
    pub is_optional: bool,
}

impl StructureField {
    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        r.in_context("StructureField", |r| {
            let name = r.in_context("name", PascalString::parse)?;
            let description = r.in_context("description", LocalizedText::parse)?;
            let data_type = r.in_context("dataType", NodeId::parse)?;
            let value_rank = r.read_signed("valueRank", 32)? as i32;
            let no_of_array_dimensions = r.read_signed("noOfArrayDimensions", 32)? as i32;
            let array_dimensions = read_counted_array(
                r,
                "arrayDimensions",
                no_of_array_dimensions.max(0) as i64,
                &U32,
            )?;
            let max_string_length = r.read_unsigned("maxStringLength", 32)? as u32;
            let reserved = read_reserved(r, "reserved", 7, 0)?;
            let is_optional = r.read_bit("isOptional")?;
            Ok(Self {
                name,
                description,
                data_type,
                value_rank,
                no_of_array_dimensions,
                array_dimensions,
                max_string_length,
                reserved,
                is_optional,
            })
        })
    }
}

impl Message for StructureField {
    fn type_name(&self) -> &'static str {
        "StructureField"
    }

    fn length_in_bits(&self) -> u64 {
        self.name.length_in_bits()
            + self.description.length_in_bits()
            + self.data_type.length_in_bits()
            + 32
            + 32
            + array_bits(&self.array_dimensions, &U32)
            + 32
            + 7
            + 1
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        write_context(w, "StructureField", |w| {
            write_context(w, "name", |w| self.name.serialize(w))?;
            write_context(w, "description", |w| self.description.serialize(w))?;
            write_context(w, "dataType", |w| self.data_type.serialize(w))?;
            w.write_signed("valueRank", 32, self.value_rank as i64)?;
            w.write_signed("noOfArrayDimensions", 32, self.no_of_array_dimensions as i64)?;
            write_counted_array(
                w,
                "arrayDimensions",
                self.no_of_array_dimensions.max(0) as i64,
                &self.array_dimensions,
                &U32,
            )?;
            w.write_unsigned("maxStringLength", 32, self.max_string_length as u64)?;
            write_reserved(w, "reserved", 7, 0, self.reserved)?;
            w.write_bit("isOptional", self.is_optional)
        })
    }
}

// ----- read service ----------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadValueId {
    pub node_id: NodeId,
    pub attribute_id: u32,
    pub index_range: PascalString,
    pub data_encoding: QualifiedName,
}

impl ReadValueId {
    /// Reads the value attribute (13) of `node_id`.
    pub fn value_of(node_id: NodeId) -> Self {
        Self {
            node_id,
            attribute_id: 13,
            index_range: PascalString::null(),
            data_encoding: QualifiedName {
                namespace_index: 0,
                name: PascalString::null(),
            },
        }
    }

    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        r.in_context("ReadValueId", |r| {
            let node_id = r.in_context("nodeId", NodeId::parse)?;
            let attribute_id = r.read_unsigned("attributeId", 32)? as u32;
            let index_range = r.in_context("indexRange", PascalString::parse)?;
            let data_encoding = r.in_context("dataEncoding", QualifiedName::parse)?;
            Ok(Self {
                node_id,
                attribute_id,
                index_range,
                data_encoding,
            })
        })
    }
}

impl Message for ReadValueId {
    fn type_name(&self) -> &'static str {
        "ReadValueId"
    }

    fn length_in_bits(&self) -> u64 {
        self.node_id.length_in_bits()
            + 32
            + self.index_range.length_in_bits()
            + self.data_encoding.length_in_bits()
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        write_context(w, "ReadValueId", |w| {
            write_context(w, "nodeId", |w| self.node_id.serialize(w))?;
            w.write_unsigned("attributeId", 32, self.attribute_id as u64)?;
            write_context(w, "indexRange", |w| self.index_range.serialize(w))?;
            write_context(w, "dataEncoding", |w| self.data_encoding.serialize(w))
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    pub request_header: RequestHeader,
    pub max_age: f64,
    pub timestamps_to_return: EnumValue<TimestampsToReturn>,
    pub nodes_to_read: Option<Vec<ReadValueId>>,
}

impl ReadRequest {
    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        r.in_context("ReadRequest", |r| {
            let request_header = r.in_context("requestHeader", RequestHeader::parse)?;
            let max_age = r.read_f64("maxAge")?;
            let timestamps_to_return =
                read_simple(r, "timestampsToReturn", &Enum::<TimestampsToReturn>::new())?;
            let nodes_to_read = read_nullable_array(
                r,
                "nodesToRead",
                "noOfNodesToRead",
                &Complex::new(ReadValueId::parse),
            )?;
            Ok(Self {
                request_header,
                max_age,
                timestamps_to_return,
                nodes_to_read,
            })
        })
    }
}

impl Message for ReadRequest {
    fn type_name(&self) -> &'static str {
        "ReadRequest"
    }

    fn length_in_bits(&self) -> u64 {
        self.request_header.length_in_bits()
            + 64
            + 32
            + nullable_array_bits(self.nodes_to_read.as_deref(), &Complex::new(ReadValueId::parse))
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        write_context(w, "ReadRequest", |w| {
            write_context(w, "requestHeader", |w| self.request_header.serialize(w))?;
            w.write_f64("maxAge", self.max_age)?;
            write_simple(
                w,
                "timestampsToReturn",
                &self.timestamps_to_return,
                &Enum::<TimestampsToReturn>::new(),
            )?;
            write_nullable_array(
                w,
                "nodesToRead",
                "noOfNodesToRead",
                self.nodes_to_read.as_deref(),
                &Complex::new(ReadValueId::parse),
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadResponse {
    pub response_header: ResponseHeader,
    pub results: Option<Vec<DataValue>>,
    pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
}

impl ReadResponse {
    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        r.in_context("ReadResponse", |r| {
            let response_header = r.in_context("responseHeader", ResponseHeader::parse)?;
            let results =
                read_nullable_array(r, "results", "noOfResults", &Complex::new(DataValue::parse))?;
            let diagnostic_infos = read_nullable_array(
                r,
                "diagnosticInfos",
                "noOfDiagnosticInfos",
                &Complex::new(DiagnosticInfo::parse),
            )?;
            Ok(Self {
                response_header,
                results,
                diagnostic_infos,
            })
        })
    }
}

impl Message for ReadResponse {
    fn type_name(&self) -> &'static str {
        "ReadResponse"
    }

    fn length_in_bits(&self) -> u64 {
        self.response_header.length_in_bits()
            + nullable_array_bits(self.results.as_deref(), &Complex::new(DataValue::parse))
            + nullable_array_bits(
                self.diagnostic_infos.as_deref(),
                &Complex::new(DiagnosticInfo::parse),
            )
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        write_context(w, "ReadResponse", |w| {
            write_context(w, "responseHeader", |w| self.response_header.serialize(w))?;
            write_nullable_array(
                w,
                "results",
                "noOfResults",
                self.results.as_deref(),
                &Complex::new(DataValue::parse),
            )?;
            write_nullable_array(
                w,
                "diagnosticInfos",
                "noOfDiagnosticInfos",
                self.diagnostic_infos.as_deref(),
                &Complex::new(DiagnosticInfo::parse),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::{Variant, VariantValue};
    use opcwire_spi::{assert_length_agreement, CodecOptions, Decoder, Encoder, ReservedPolicy};

    fn roundtrip(definition: &ExtensionObjectDefinition) -> ExtensionObjectDefinition {
        assert_length_agreement(definition).unwrap();
        let bytes = Encoder::encode(definition, &CodecOptions::default()).unwrap();
        let id = definition.discriminator();
        Decoder::default()
            .decode(bytes, definition.type_name(), |r| {
                ExtensionObjectDefinition::parse(r, id)
            })
            .unwrap()
            .into_value()
    }

    fn aggregate_configuration() -> AggregateConfiguration {
        AggregateConfiguration {
            treat_uncertain_as_bad: true,
            use_server_capabilities_defaults: false,
            percent_data_bad: 10,
            percent_data_good: 90,
            use_sloped_extrapolation: true,
            ..AggregateConfiguration::default()
        }
    }

    #[test]
    fn test_aggregate_configuration_is_32_bits() {
        let config = aggregate_configuration();
        assert_eq!(config.length_in_bits(), 32);
        let bytes = Encoder::encode(&config, &CodecOptions::default()).unwrap();
        assert_eq!(&bytes[..], &[0x02, 0x0A, 0x5A, 0x01]);

        let decoded = ExtensionObjectDefinition::parse(&mut BitReader::new(bytes), 950).unwrap();
        assert_eq!(decoded, ExtensionObjectDefinition::AggregateConfiguration(config));
    }

    #[test]
    fn test_aggregate_configuration_reserved_policy() {
        let wire = vec![0x82, 0x0A, 0x5A, 0x81];
        let decoded = Decoder::default()
            .decode(wire.clone(), "AggregateConfiguration", AggregateConfiguration::parse)
            .unwrap();
        assert_eq!(decoded.mismatches.len(), 2);
        assert_eq!(decoded.value.percent_data_good, 90);
        let bytes = Encoder::encode(&decoded.value, &CodecOptions::default()).unwrap();
        assert_eq!(&bytes[..], &wire[..]);

        let strict = Decoder::new(CodecOptions::default().with_reserved_policy(ReservedPolicy::Strict));
        assert!(strict
            .decode(wire, "AggregateConfiguration", AggregateConfiguration::parse)
            .is_err());
    }

    #[test]
    fn test_registry_is_total() {
        EXTENSION_OBJECTS.validate().unwrap();
        assert_eq!(EXTENSION_OBJECTS.len(), 13);
        assert!(EXTENSION_OBJECTS.contains(&AggregateConfiguration::EXTENSION_ID));

        let err = ExtensionObjectDefinition::parse(&mut BitReader::new(vec![0u8; 4]), 951)
            .unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownDiscriminator {
                family: "ExtensionObjectDefinition",
                value: "951".to_string(),
            }
        );
    }

    #[test]
    fn test_definitions_roundtrip() {
        let definitions: Vec<ExtensionObjectDefinition> = vec![
            RequestHeader::new(7, 133_000_000_000_000_000).into(),
            ResponseHeader {
                string_table: Some(vec![PascalString::new("a"), PascalString::null()]),
                ..ResponseHeader::new(7, StatusCode::GOOD)
            }
            .into(),
            ServiceFault {
                response_header: ResponseHeader::new(1, StatusCode::BAD_DECODING_ERROR),
            }
            .into(),
            AggregateFilterResult {
                revised_start_time: 1,
                revised_processing_interval: 500.0,
                revised_aggregate_configuration: aggregate_configuration(),
            }
            .into(),
            ReadProcessedDetails {
                start_time: 10,
                end_time: 20,
                processing_interval: 1.0,
                aggregate_type: Some(vec![NodeId::numeric(0, 2342)]),
                aggregate_configuration: aggregate_configuration(),
            }
            .into(),
            BitFieldDefinition::new("overheat", 0, 0).into(),
            EndpointType {
                endpoint_url: PascalString::new("opc.tcp://plc:4840"),
                security_mode: MessageSecurityMode::SignAndEncrypt.into(),
                security_policy_uri: PascalString::new("http://opcfoundation.org/UA/SecurityPolicy#None"),
                transport_profile_uri: PascalString::null(),
            }
            .into(),
            StructureField {
                name: PascalString::new("Speed"),
                description: LocalizedText::new(Some("en"), Some("Motor speed")),
                data_type: NodeId::numeric(0, 11),
                value_rank: 1,
                no_of_array_dimensions: 2,
                array_dimensions: vec![4, 8],
                max_string_length: 0,
                reserved: None,
                is_optional: true,
            }
            .into(),
            ReadRequest {
                request_header: RequestHeader::new(3, 0),
                max_age: 0.0,
                timestamps_to_return: TimestampsToReturn::Both.into(),
                nodes_to_read: Some(vec![ReadValueId::value_of(NodeId::numeric(2, 5001))]),
            }
            .into(),
            ReadResponse {
                response_header: ResponseHeader::new(3, StatusCode::GOOD),
                results: Some(vec![DataValue::new(Variant::scalar(VariantValue::Double(
                    vec![42.0],
                )))]),
                diagnostic_infos: None,
            }
            .into(),
        ];
        for definition in &definitions {
            assert_eq!(&roundtrip(definition), definition);
        }
    }

    #[test]
    fn test_unknown_security_mode_is_kept() {
        let endpoint = EndpointType {
            endpoint_url: PascalString::new(""),
            security_mode: EnumValue::Unknown(9),
            security_policy_uri: PascalString::null(),
            transport_profile_uri: PascalString::null(),
        };
        let decoded = roundtrip(&endpoint.clone().into());
        assert_eq!(decoded, ExtensionObjectDefinition::EndpointType(endpoint));
    }

    #[test]
    fn test_structure_field_keeps_null_dimensions() {
        let field = StructureField {
            name: PascalString::new("Flag"),
            description: LocalizedText::default(),
            data_type: NodeId::numeric(0, 1),
            value_rank: -1,
            no_of_array_dimensions: -1,
            array_dimensions: vec![],
            max_string_length: 0,
            reserved: None,
            is_optional: false,
        };
        let bytes = Encoder::encode(&field, &CodecOptions::default()).unwrap();
        let decoded = Decoder::default()
            .decode(bytes.clone(), "StructureField", StructureField::parse)
            .unwrap();
        assert_eq!(decoded.value.no_of_array_dimensions, -1);
        let again = Encoder::encode(&decoded.value, &CodecOptions::default()).unwrap();
        assert_eq!(again, bytes);

        let mismatched = StructureField {
            no_of_array_dimensions: 3,
            ..field
        };
        assert!(matches!(
            Encoder::encode(&mismatched, &CodecOptions::default()),
            Err(SerializeError::CountMismatch { .. })
        ));
    }
}
