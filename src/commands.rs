//! Command execution.

use crate::config::{Config, OutputFormat};
use colored::Colorize;
use opcwire_model::{registries, validate_registries, ExtensionObject, MessagePdu};
use opcwire_spi::{
    Decoded, Decoder, Encoder, Message, ParseError, RegistryError, ReservedMismatch,
    SerializeError,
};

/// Error returned by a failed command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("invalid hex input")]
    Hex(#[from] hex::FromHexError),

    #[error("decode failed")]
    Parse(#[from] ParseError),

    #[error("render failed")]
    Serialize(#[from] SerializeError),

    #[error("registry check failed")]
    Registry(#[from] RegistryError),

    #[error("json output failed")]
    Json(#[from] serde_json::Error),
}

/// Accepts hex with optional `0x` prefix and whitespace or `:` separators.
pub fn parse_hex(input: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let trimmed = input.trim();
    let digits: String = trimmed
        .strip_prefix("0x")
        .unwrap_or(trimmed)
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    hex::decode(digits)
}

/// Decodes a secure-channel PDU.
pub fn decode_pdu(
    input: &str,
    request: bool,
    extensible: bool,
    config: &Config,
) -> Result<String, CommandError> {
    let bytes = parse_hex(input)?;
    tracing::debug!(bytes = bytes.len(), request, extensible, "decoding pdu");
    let decoded = Decoder::new(config.codec).decode(bytes, "MessagePdu", |r| {
        MessagePdu::parse(r, !request, !extensible)
    })?;
    let heading = format!(
        "{} {} ({} bytes)",
        "MessagePdu".bold(),
        decoded.value.key().to_string().cyan(),
        decoded.value.length_in_bytes()
    );
    format_decoded(heading, &decoded, config)
}

/// Decodes a standalone extension object.
pub fn decode_extension(input: &str, mask: bool, config: &Config) -> Result<String, CommandError> {
    let bytes = parse_hex(input)?;
    tracing::debug!(bytes = bytes.len(), mask, "decoding extension object");
    let decoded = Decoder::new(config.codec).decode(bytes, "ExtensionObject", |r| {
        ExtensionObject::parse(r, mask)
    })?;
    let heading = format!(
        "{} {}",
        "ExtensionObject".bold(),
        decoded.value.type_id.to_string().cyan()
    );
    format_decoded(heading, &decoded, config)
}

/// Lists every registered discriminator.
pub fn list_registries(config: &Config) -> Result<String, CommandError> {
    validate_registries()?;
    let summaries = registries();
    if config.output.format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(&summaries)?);
    }

    let mut out = String::new();
    for summary in summaries {
        out.push_str(&format!(
            "{} ({})\n",
            summary.family.bold(),
            summary.keys.len()
        ));
        for key in summary.keys {
            out.push_str(&format!("  {}\n", key.cyan()));
        }
    }
    Ok(out.trim_end().to_string())
}

fn format_decoded<T: Message>(
    heading: String,
    decoded: &Decoded<T>,
    config: &Config,
) -> Result<String, CommandError> {
    let tree = Encoder::render(&decoded.value)?;
    if config.output.format == OutputFormat::Json {
        let json = serde_json::json!({
            "message": tree,
            "reserved_mismatches": decoded.mismatches,
        });
        return Ok(serde_json::to_string_pretty(&json)?);
    }

    let mut out = format!("{}\n{}", heading, tree);
    if !decoded.mismatches.is_empty() {
        out.push_str(&format!(
            "\n{} {} reserved field(s) deviated",
            "Warning:".yellow(),
            decoded.mismatches.len()
        ));
        for mismatch in &decoded.mismatches {
            out.push_str(&format!("\n  {}", format_mismatch(mismatch)));
        }
    }
    Ok(out)
}

fn format_mismatch(mismatch: &ReservedMismatch) -> String {
    format!(
        "{}/{} at bit {}: expected {:#x}, got {:#x}",
        mismatch.path, mismatch.field, mismatch.position, mismatch.expected, mismatch.actual
    )
}
