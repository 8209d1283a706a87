//! Secure-channel PDUs.
//!
//! Every PDU opens with a three-letter message type, a chunk marker and its
//! own total length in bytes. The message type alone does not select the
//! body: the same code decodes differently for requests and responses, so
//! the registry is keyed by the code together with the direction supplied
//! by the caller.

use crate::enums::ChunkType;
use crate::extension::{ExtensionBody, ExtensionObject};
use crate::strings::{PascalByteString, PascalString};
use crate::structures::StatusCode;
use bytes::Bytes;
use opcwire_spi::field::{read_bounded, read_remaining_bytes, remaining_bytes, write_implicit};
use opcwire_spi::io::U32;
use opcwire_spi::{
    write_context, BitReader, DecodeFn, Discriminated, EnumValue, Message, ParseError, Registry,
    SerializeError, StringEncoding, WriteBuffer,
};
use std::fmt;

/// Size of the fixed PDU header: message type, chunk and total length.
pub const PDU_HEADER_BYTES: u64 = 8;

// ----- headers ---------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OpcuaProtocolLimits {
    pub receive_buffer_size: u32,
    pub send_buffer_size: u32,
    pub max_message_size: u32,
    pub max_chunk_count: u32,
}

impl OpcuaProtocolLimits {
    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        r.in_context("OpcuaProtocolLimits", |r| {
            Ok(Self {
                receive_buffer_size: r.read_unsigned("receiveBufferSize", 32)? as u32,
                send_buffer_size: r.read_unsigned("sendBufferSize", 32)? as u32,
                max_message_size: r.read_unsigned("maxMessageSize", 32)? as u32,
                max_chunk_count: r.read_unsigned("maxChunkCount", 32)? as u32,
            })
        })
    }
}

impl Message for OpcuaProtocolLimits {
    fn type_name(&self) -> &'static str {
        "OpcuaProtocolLimits"
    }

    fn length_in_bits(&self) -> u64 {
        4 * 32
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        write_context(w, "OpcuaProtocolLimits", |w| {
            w.write_unsigned("receiveBufferSize", 32, self.receive_buffer_size as u64)?;
            w.write_unsigned("sendBufferSize", 32, self.send_buffer_size as u64)?;
            w.write_unsigned("maxMessageSize", 32, self.max_message_size as u64)?;
            w.write_unsigned("maxChunkCount", 32, self.max_chunk_count as u64)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SecurityHeader {
    pub secure_channel_id: u32,
    pub secure_token_id: u32,
}

impl SecurityHeader {
    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        r.in_context("SecurityHeader", |r| {
            Ok(Self {
                secure_channel_id: r.read_unsigned("secureChannelId", 32)? as u32,
                secure_token_id: r.read_unsigned("secureTokenId", 32)? as u32,
            })
        })
    }
}

impl Message for SecurityHeader {
    fn type_name(&self) -> &'static str {
        "SecurityHeader"
    }

    fn length_in_bits(&self) -> u64 {
        64
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        write_context(w, "SecurityHeader", |w| {
            w.write_unsigned("secureChannelId", 32, self.secure_channel_id as u64)?;
            w.write_unsigned("secureTokenId", 32, self.secure_token_id as u64)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SequenceHeader {
    pub sequence_number: i32,
    pub request_id: i32,
}

impl SequenceHeader {
    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        r.in_context("SequenceHeader", |r| {
            Ok(Self {
                sequence_number: r.read_signed("sequenceNumber", 32)? as i32,
                request_id: r.read_signed("requestId", 32)? as i32,
            })
        })
    }
}

impl Message for SequenceHeader {
    fn type_name(&self) -> &'static str {
        "SequenceHeader"
    }

    fn length_in_bits(&self) -> u64 {
        64
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        write_context(w, "SequenceHeader", |w| {
            w.write_signed("sequenceNumber", 32, self.sequence_number as i64)?;
            w.write_signed("requestId", 32, self.request_id as i64)
        })
    }
}

// ----- payload ---------------------------------------------------------------

/// What the caller knows about the enclosing PDU while its body is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Bit position of the first byte of the PDU.
    pub start: u64,
    /// The PDU's declared length in bytes.
    pub total_length: u64,
    /// Keep payloads as raw bytes instead of decoding a service message.
    pub binary: bool,
}

/// Service payload of OPN, CLO and MSG PDUs. It always fills the rest of
/// the PDU.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Binary {
        sequence_header: SequenceHeader,
        payload: Bytes,
    },
    /// The service message, written without an encoding mask.
    Extensible {
        sequence_header: SequenceHeader,
        payload: ExtensionObject,
    },
}

impl Payload {
    pub fn parse(r: &mut BitReader, frame: Frame) -> Result<Self, ParseError> {
        r.in_context("Payload", |r| {
            let sequence_header = r.in_context("sequenceHeader", SequenceHeader::parse)?;
            if frame.binary {
                let payload = read_remaining_bytes(r, "payload", frame.start, frame.total_length)?;
                return Ok(Payload::Binary {
                    sequence_header,
                    payload,
                });
            }
            let remaining = remaining_bytes(r, frame.start, frame.total_length)?;
            let payload = read_bounded(r, "payload", remaining as i64, |r| {
                r.in_context("payload", |r| ExtensionObject::parse(r, false))
            })?;
            Ok(Payload::Extensible {
                sequence_header,
                payload,
            })
        })
    }

    pub fn sequence_header(&self) -> &SequenceHeader {
        match self {
            Payload::Binary {
                sequence_header, ..
            }
            | Payload::Extensible {
                sequence_header, ..
            } => sequence_header,
        }
    }
}

impl Discriminated for Payload {
    type Key = bool;

    /// Whether the payload is kept as raw bytes.
    fn discriminator(&self) -> bool {
        matches!(self, Payload::Binary { .. })
    }
}

impl Message for Payload {
    fn type_name(&self) -> &'static str {
        "Payload"
    }

    fn length_in_bits(&self) -> u64 {
        64 + match self {
            Payload::Binary { payload, .. } => payload.len() as u64 * 8,
            Payload::Extensible { payload, .. } => payload.length_in_bits(),
        }
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        if let Payload::Extensible { payload, .. } = self {
            if !matches!(payload.body, ExtensionBody::Unmasked(_)) {
                return Err(SerializeError::DiscriminatorMismatch {
                    family: "Payload",
                    declared: "extensible".to_string(),
                    actual: "masked extension object".to_string(),
                });
            }
        }
        write_context(w, "Payload", |w| {
            write_context(w, "sequenceHeader", |w| self.sequence_header().serialize(w))?;
            match self {
                Payload::Binary { payload, .. } => w.write_bytes("payload", payload),
                Payload::Extensible { payload, .. } => {
                    write_context(w, "payload", |w| payload.serialize(w))
                }
            }
        })
    }
}

// ----- open channel ----------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OpenChannelMessage {
    Request {
        secure_channel_id: i32,
        endpoint: PascalString,
        sender_certificate: PascalByteString,
        receiver_certificate_thumbprint: PascalByteString,
    },
    Response {
        secure_channel_id: i32,
        security_policy_uri: PascalString,
        sender_certificate: PascalByteString,
        receiver_certificate_thumbprint: PascalByteString,
    },
}

static OPEN_CHANNEL_MESSAGE_TABLE: &[(bool, DecodeFn<(), OpenChannelMessage>)] = &[
    (false, |r, _| {
        let secure_channel_id = r.read_signed("secureChannelId", 32)? as i32;
        let endpoint = r.in_context("endpoint", PascalString::parse)?;
        let sender_certificate = r.in_context("senderCertificate", PascalByteString::parse)?;
        let receiver_certificate_thumbprint =
            r.in_context("receiverCertificateThumbprint", PascalByteString::parse)?;
        Ok(OpenChannelMessage::Request {
            secure_channel_id,
            endpoint,
            sender_certificate,
            receiver_certificate_thumbprint,
        })
    }),
    (true, |r, _| {
        let secure_channel_id = r.read_signed("secureChannelId", 32)? as i32;
        let security_policy_uri = r.in_context("securityPolicyUri", PascalString::parse)?;
        let sender_certificate = r.in_context("senderCertificate", PascalByteString::parse)?;
        let receiver_certificate_thumbprint =
            r.in_context("receiverCertificateThumbprint", PascalByteString::parse)?;
        Ok(OpenChannelMessage::Response {
            secure_channel_id,
            security_policy_uri,
            sender_certificate,
            receiver_certificate_thumbprint,
        })
    }),
];

/// Open-channel headers keyed by the response flag.
pub static OPEN_CHANNEL_MESSAGES: Registry<bool, (), OpenChannelMessage> =
    Registry::new("OpenChannelMessage", OPEN_CHANNEL_MESSAGE_TABLE);

impl Discriminated for OpenChannelMessage {
    type Key = bool;

    fn discriminator(&self) -> bool {
        matches!(self, OpenChannelMessage::Response { .. })
    }
}

impl OpenChannelMessage {
    pub fn parse(r: &mut BitReader, response: bool) -> Result<Self, ParseError> {
        r.in_context("OpenChannelMessage", |r| {
            OPEN_CHANNEL_MESSAGES.decode(r, &response, ())
        })
    }
}

impl Message for OpenChannelMessage {
    fn type_name(&self) -> &'static str {
        "OpenChannelMessage"
    }

    fn length_in_bits(&self) -> u64 {
        match self {
            OpenChannelMessage::Request {
                endpoint,
                sender_certificate,
                receiver_certificate_thumbprint,
                ..
            } => {
                32 + endpoint.length_in_bits()
                    + sender_certificate.length_in_bits()
                    + receiver_certificate_thumbprint.length_in_bits()
            }
            OpenChannelMessage::Response {
                security_policy_uri,
                sender_certificate,
                receiver_certificate_thumbprint,
                ..
            } => {
                32 + security_policy_uri.length_in_bits()
                    + sender_certificate.length_in_bits()
                    + receiver_certificate_thumbprint.length_in_bits()
            }
        }
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        write_context(w, "OpenChannelMessage", |w| match self {
            OpenChannelMessage::Request {
                secure_channel_id,
                endpoint,
                sender_certificate,
                receiver_certificate_thumbprint,
            } => {
                w.write_signed("secureChannelId", 32, *secure_channel_id as i64)?;
                write_context(w, "endpoint", |w| endpoint.serialize(w))?;
                write_context(w, "senderCertificate", |w| sender_certificate.serialize(w))?;
                write_context(w, "receiverCertificateThumbprint", |w| {
                    receiver_certificate_thumbprint.serialize(w)
                })
            }
            OpenChannelMessage::Response {
                secure_channel_id,
                security_policy_uri,
                sender_certificate,
                receiver_certificate_thumbprint,
            } => {
                w.write_signed("secureChannelId", 32, *secure_channel_id as i64)?;
                write_context(w, "securityPolicyUri", |w| security_policy_uri.serialize(w))?;
                write_context(w, "senderCertificate", |w| sender_certificate.serialize(w))?;
                write_context(w, "receiverCertificateThumbprint", |w| {
                    receiver_certificate_thumbprint.serialize(w)
                })
            }
        })
    }
}

// ----- PDU -------------------------------------------------------------------

/// Composite registry key of a PDU body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageKey {
    pub code: [u8; 3],
    pub response: bool,
}

impl MessageKey {
    pub const fn new(code: [u8; 3], response: bool) -> Self {
        Self { code, response }
    }

    pub fn code_str(&self) -> &str {
        std::str::from_utf8(&self.code).unwrap_or("???")
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = if self.response { "response" } else { "request" };
        write!(f, "{}/{}", self.code_str(), direction)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PduBody {
    Hello {
        version: u32,
        limits: OpcuaProtocolLimits,
        endpoint: PascalString,
    },
    Acknowledge {
        version: u32,
        limits: OpcuaProtocolLimits,
    },
    OpenRequest {
        open_request: OpenChannelMessage,
        message: Payload,
    },
    OpenResponse {
        open_response: OpenChannelMessage,
        message: Payload,
    },
    CloseRequest {
        security_header: SecurityHeader,
        message: Payload,
    },
    MessageRequest {
        security_header: SecurityHeader,
        message: Payload,
    },
    MessageResponse {
        security_header: SecurityHeader,
        message: Payload,
    },
    Error {
        error: StatusCode,
        reason: PascalString,
    },
}

fn parse_security_payload(
    r: &mut BitReader,
    frame: Frame,
) -> Result<(SecurityHeader, Payload), ParseError> {
    let security_header = r.in_context("securityHeader", SecurityHeader::parse)?;
    let message = r.in_context("message", |r| Payload::parse(r, frame))?;
    Ok((security_header, message))
}

static MESSAGE_PDU_TABLE: &[(MessageKey, DecodeFn<Frame, PduBody>)] = &[
    (MessageKey::new(*b"HEL", false), |r, _| {
        let version = r.read_unsigned("version", 32)? as u32;
        let limits = r.in_context("limits", OpcuaProtocolLimits::parse)?;
        let endpoint = r.in_context("endpoint", PascalString::parse)?;
        Ok(PduBody::Hello {
            version,
            limits,
            endpoint,
        })
    }),
    (MessageKey::new(*b"ACK", true), |r, _| {
        let version = r.read_unsigned("version", 32)? as u32;
        let limits = r.in_context("limits", OpcuaProtocolLimits::parse)?;
        Ok(PduBody::Acknowledge { version, limits })
    }),
    (MessageKey::new(*b"OPN", false), |r, frame| {
        let open_request = r.in_context("openRequest", |r| OpenChannelMessage::parse(r, false))?;
        let message = r.in_context("message", |r| Payload::parse(r, frame))?;
        Ok(PduBody::OpenRequest {
            open_request,
            message,
        })
    }),
    (MessageKey::new(*b"OPN", true), |r, frame| {
        let open_response = r.in_context("openResponse", |r| OpenChannelMessage::parse(r, true))?;
        let message = r.in_context("message", |r| Payload::parse(r, frame))?;
        Ok(PduBody::OpenResponse {
            open_response,
            message,
        })
    }),
    (MessageKey::new(*b"CLO", false), |r, frame| {
        let (security_header, message) = parse_security_payload(r, frame)?;
        Ok(PduBody::CloseRequest {
            security_header,
            message,
        })
    }),
    (MessageKey::new(*b"MSG", false), |r, frame| {
        let (security_header, message) = parse_security_payload(r, frame)?;
        Ok(PduBody::MessageRequest {
            security_header,
            message,
        })
    }),
    (MessageKey::new(*b"MSG", true), |r, frame| {
        let (security_header, message) = parse_security_payload(r, frame)?;
        Ok(PduBody::MessageResponse {
            security_header,
            message,
        })
    }),
    (MessageKey::new(*b"ERR", true), |r, _| {
        let error = r.in_context("error", StatusCode::parse)?;
        let reason = r.in_context("reason", PascalString::parse)?;
        Ok(PduBody::Error { error, reason })
    }),
];

/// PDU bodies keyed by message type and direction.
pub static MESSAGE_PDUS: Registry<MessageKey, Frame, PduBody> =
    Registry::new("MessagePdu", MESSAGE_PDU_TABLE);

impl Discriminated for PduBody {
    type Key = MessageKey;

    fn discriminator(&self) -> MessageKey {
        match self {
            PduBody::Hello { .. } => MessageKey::new(*b"HEL", false),
            PduBody::Acknowledge { .. } => MessageKey::new(*b"ACK", true),
            PduBody::OpenRequest { .. } => MessageKey::new(*b"OPN", false),
            PduBody::OpenResponse { .. } => MessageKey::new(*b"OPN", true),
            PduBody::CloseRequest { .. } => MessageKey::new(*b"CLO", false),
            PduBody::MessageRequest { .. } => MessageKey::new(*b"MSG", false),
            PduBody::MessageResponse { .. } => MessageKey::new(*b"MSG", true),
            PduBody::Error { .. } => MessageKey::new(*b"ERR", true),
        }
    }
}

impl PduBody {
    pub fn payload(&self) -> Option<&Payload> {
        match self {
            PduBody::OpenRequest { message, .. }
            | PduBody::OpenResponse { message, .. }
            | PduBody::CloseRequest { message, .. }
            | PduBody::MessageRequest { message, .. }
            | PduBody::MessageResponse { message, .. } => Some(message),
            PduBody::Hello { .. } | PduBody::Acknowledge { .. } | PduBody::Error { .. } => None,
        }
    }

    fn check_open_direction(&self) -> Result<(), SerializeError> {
        let (channel, response) = match self {
            PduBody::OpenRequest { open_request, .. } => (open_request, false),
            PduBody::OpenResponse { open_response, .. } => (open_response, true),
            _ => return Ok(()),
        };
        if channel.discriminator() == response {
            return Ok(());
        }
        Err(SerializeError::DiscriminatorMismatch {
            family: "OpenChannelMessage",
            declared: response.to_string(),
            actual: channel.discriminator().to_string(),
        })
    }

    fn body_bits(&self) -> u64 {
        match self {
            PduBody::Hello {
                limits, endpoint, ..
            } => 32 + limits.length_in_bits() + endpoint.length_in_bits(),
            PduBody::Acknowledge { limits, .. } => 32 + limits.length_in_bits(),
            PduBody::OpenRequest {
                open_request: channel,
                message,
            }
            | PduBody::OpenResponse {
                open_response: channel,
                message,
            } => channel.length_in_bits() + message.length_in_bits(),
            PduBody::CloseRequest {
                security_header,
                message,
            }
            | PduBody::MessageRequest {
                security_header,
                message,
            }
            | PduBody::MessageResponse {
                security_header,
                message,
            } => security_header.length_in_bits() + message.length_in_bits(),
            PduBody::Error { error, reason } => error.length_in_bits() + reason.length_in_bits(),
        }
    }

    fn write_body(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        match self {
            PduBody::Hello {
                version,
                limits,
                endpoint,
            } => {
                w.write_unsigned("version", 32, *version as u64)?;
                write_context(w, "limits", |w| limits.serialize(w))?;
                write_context(w, "endpoint", |w| endpoint.serialize(w))
            }
            PduBody::Acknowledge { version, limits } => {
                w.write_unsigned("version", 32, *version as u64)?;
                write_context(w, "limits", |w| limits.serialize(w))
            }
            PduBody::OpenRequest {
                open_request,
                message,
            } => {
                write_context(w, "openRequest", |w| open_request.serialize(w))?;
                write_context(w, "message", |w| message.serialize(w))
            }
            PduBody::OpenResponse {
                open_response,
                message,
            } => {
                write_context(w, "openResponse", |w| open_response.serialize(w))?;
                write_context(w, "message", |w| message.serialize(w))
            }
            PduBody::CloseRequest {
                security_header,
                message,
            }
            | PduBody::MessageRequest {
                security_header,
                message,
            }
            | PduBody::MessageResponse {
                security_header,
                message,
            } => {
                write_context(w, "securityHeader", |w| security_header.serialize(w))?;
                write_context(w, "message", |w| message.serialize(w))
            }
            PduBody::Error { error, reason } => {
                write_context(w, "error", |w| error.serialize(w))?;
                write_context(w, "reason", |w| reason.serialize(w))
            }
        }
    }
}

/// Outermost framed unit of the binary transport.
#[derive(Debug, Clone, PartialEq)]
pub struct MessagePdu {
    pub chunk: EnumValue<ChunkType>,
    pub body: PduBody,
}

impl MessagePdu {
    pub fn new(body: PduBody) -> Self {
        Self {
            chunk: ChunkType::Final.into(),
            body,
        }
    }

    pub fn key(&self) -> MessageKey {
        self.body.discriminator()
    }

    pub fn is_response(&self) -> bool {
        self.key().response
    }

    /// Decodes one PDU. `response` selects the direction, `binary` keeps
    /// service payloads as raw bytes.
    pub fn parse(r: &mut BitReader, response: bool, binary: bool) -> Result<Self, ParseError> {
        r.in_context("MessagePdu", |r| {
            let start = r.pos();
            let message_type = r.read_string("messageType", 24, StringEncoding::Ascii)?;
            let chunk = EnumValue::<ChunkType>::read(r, "chunk")?;
            let total_length = r.read_unsigned("totalLength", 32)?;

            let code: [u8; 3] = message_type.as_bytes().try_into().map_err(|_| {
                ParseError::UnknownDiscriminator {
                    family: "MessagePdu",
                    value: message_type.clone(),
                }
            })?;
            let frame = Frame {
                start,
                total_length,
                binary,
            };
            let key = MessageKey::new(code, response);
            tracing::trace!(%key, total_length, binary, "decoding pdu body");
            let body = MESSAGE_PDUS.decode(r, &key, frame)?;

            let consumed = r.pos() - start;
            if consumed != total_length * 8 {
                return Err(ParseError::LengthMismatch {
                    region: r.context_path(),
                    declared: total_length * 8,
                    consumed,
                });
            }
            Ok(Self { chunk, body })
        })
    }
}

impl Message for MessagePdu {
    fn type_name(&self) -> &'static str {
        "MessagePdu"
    }

    fn length_in_bits(&self) -> u64 {
        PDU_HEADER_BYTES * 8 + self.body.body_bits()
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        self.body.check_open_direction()?;
        let key = self.key();
        let total_length = u32::try_from(self.length_in_bytes()).map_err(|_| {
            SerializeError::ValueOutOfRange {
                field: "totalLength".to_string(),
                value: self.length_in_bytes().to_string(),
                bits: 32,
            }
        })?;
        write_context(w, "MessagePdu", |w| {
            w.write_string("messageType", 24, StringEncoding::Ascii, key.code_str())?;
            self.chunk.write(w, "chunk")?;
            write_implicit(w, "totalLength", total_length, &U32)?;
            self.body.write_body(w)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::{ReadRequest, RequestHeader};
    use crate::enums::TimestampsToReturn;
    use opcwire_spi::{assert_length_agreement, ByteOrder, CodecOptions, Decoder, Encoder, WireEnum};

    fn encode(pdu: &MessagePdu) -> Vec<u8> {
        Encoder::encode(pdu, &CodecOptions::default()).unwrap().to_vec()
    }

    fn decode(bytes: Vec<u8>, response: bool, binary: bool) -> Result<MessagePdu, ParseError> {
        Decoder::default()
            .decode(bytes, "MessagePdu", |r| MessagePdu::parse(r, response, binary))
            .map(|decoded| decoded.into_value())
    }

    fn hello() -> MessagePdu {
        MessagePdu::new(PduBody::Hello {
            version: 0,
            limits: OpcuaProtocolLimits {
                receive_buffer_size: 65_535,
                send_buffer_size: 65_535,
                max_message_size: 2_097_152,
                max_chunk_count: 64,
            },
            endpoint: PascalString::new("opc.tcp://h:4840"),
        })
    }

    #[test]
    fn test_hello_layout() {
        let pdu = hello();
        let bytes = encode(&pdu);
        assert_eq!(&bytes[..8], b"HELF\x00\x00\x00\x30");
        assert_eq!(bytes.len(), 48);
        assert_eq!(assert_length_agreement(&pdu).unwrap(), 48 * 8);
        assert_eq!(decode(bytes, false, true).unwrap(), pdu);
    }

    #[test]
    fn test_little_endian_total_length() {
        let options = CodecOptions::default().with_byte_order(ByteOrder::LittleEndian);
        let bytes = Encoder::encode(&hello(), &options).unwrap();
        assert_eq!(&bytes[..8], b"HELF\x30\x00\x00\x00");
        let decoded = Decoder::new(options)
            .decode(bytes, "MessagePdu", |r| MessagePdu::parse(r, false, true))
            .unwrap();
        assert_eq!(decoded.value, hello());
    }

    #[test]
    fn test_direction_selects_body() {
        let ack = MessagePdu::new(PduBody::Acknowledge {
            version: 0,
            limits: OpcuaProtocolLimits::default(),
        });
        let bytes = encode(&ack);
        assert_eq!(decode(bytes.clone(), true, true).unwrap(), ack);
        let err = decode(bytes, false, true).unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownDiscriminator {
                family: "MessagePdu",
                value: "ACK/request".to_string(),
            }
        );
    }

    #[test]
    fn test_binary_message_payload() {
        let pdu = MessagePdu::new(PduBody::MessageRequest {
            security_header: SecurityHeader {
                secure_channel_id: 1,
                secure_token_id: 2,
            },
            message: Payload::Binary {
                sequence_header: SequenceHeader {
                    sequence_number: 3,
                    request_id: 4,
                },
                payload: Bytes::from_static(&[0xAA, 0xBB]),
            },
        });
        let bytes = encode(&pdu);
        assert_eq!(bytes.len(), 8 + 8 + 8 + 2);
        assert_eq!(bytes[7], 26);
        assert_eq!(decode(bytes, false, true).unwrap(), pdu);
    }

    #[test]
    fn test_extensible_open_and_message() {
        let request = ReadRequest {
            request_header: RequestHeader::new(9, 0),
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Neither.into(),
            nodes_to_read: Some(vec![]),
        };
        let pdu = MessagePdu::new(PduBody::MessageRequest {
            security_header: SecurityHeader::default(),
            message: Payload::Extensible {
                sequence_header: SequenceHeader::default(),
                payload: ExtensionObject::unmasked(request),
            },
        });
        assert_eq!(decode(encode(&pdu), false, false).unwrap(), pdu);

        let open = MessagePdu::new(PduBody::OpenResponse {
            open_response: OpenChannelMessage::Response {
                secure_channel_id: 5,
                security_policy_uri: PascalString::new("http://opcfoundation.org/UA/SecurityPolicy#None"),
                sender_certificate: PascalByteString::null(),
                receiver_certificate_thumbprint: PascalByteString::null(),
            },
            message: Payload::Binary {
                sequence_header: SequenceHeader::default(),
                payload: Bytes::new(),
            },
        });
        assert_eq!(decode(encode(&open), true, true).unwrap(), open);
    }

    #[test]
    fn test_masked_extensible_payload_rejected() {
        let pdu = MessagePdu::new(PduBody::CloseRequest {
            security_header: SecurityHeader::default(),
            message: Payload::Extensible {
                sequence_header: SequenceHeader::default(),
                payload: ExtensionObject::null(),
            },
        });
        assert!(matches!(
            Encoder::encode(&pdu, &CodecOptions::default()),
            Err(SerializeError::DiscriminatorMismatch { family: "Payload", .. })
        ));
    }

    #[test]
    fn test_open_direction_must_agree() {
        let pdu = MessagePdu::new(PduBody::OpenRequest {
            open_request: OpenChannelMessage::Response {
                secure_channel_id: 0,
                security_policy_uri: PascalString::null(),
                sender_certificate: PascalByteString::null(),
                receiver_certificate_thumbprint: PascalByteString::null(),
            },
            message: Payload::Binary {
                sequence_header: SequenceHeader::default(),
                payload: Bytes::new(),
            },
        });
        assert!(matches!(
            Encoder::encode(&pdu, &CodecOptions::default()),
            Err(SerializeError::DiscriminatorMismatch {
                family: "OpenChannelMessage",
                ..
            })
        ));
    }

    #[test]
    fn test_declared_length_is_checked() {
        let mut bytes = encode(&hello());
        bytes[7] = 0x31;
        bytes.push(0x00);
        let err = decode(bytes, false, true).unwrap_err();
        assert!(matches!(err, ParseError::LengthMismatch { .. }));
    }

    #[test]
    fn test_error_and_unknown_chunk() {
        let mut pdu = MessagePdu::new(PduBody::Error {
            error: StatusCode::BAD_DECODING_ERROR,
            reason: PascalString::new("bad frame"),
        });
        pdu.chunk = EnumValue::Unknown(b'X');
        let bytes = encode(&pdu);
        assert_eq!(bytes[3], b'X');
        let decoded = decode(bytes, true, true).unwrap();
        assert_eq!(decoded, pdu);
        assert!(decoded.is_response());
    }

    #[test]
    fn test_registries_are_total() {
        MESSAGE_PDUS.validate().unwrap();
        OPEN_CHANNEL_MESSAGES.validate().unwrap();
        assert_eq!(MESSAGE_PDUS.len(), 8);
        assert!(ChunkType::VALUES.contains(&ChunkType::Final));
    }
}
