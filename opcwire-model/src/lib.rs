//! # opcwire-model
//!
//! The OPC-UA binary message catalogue, built on `opcwire-spi`.
//!
//! This crate provides:
//! - Leaf structures: Pascal strings, GUIDs, status codes, localized text, diagnostics
//! - Node ids in all six address layouts
//! - Variants and data values
//! - Extension objects and the structures they carry
//! - User identity tokens keyed by policy id
//! - Secure-channel PDUs keyed by message type and direction
//!
//! Every polymorphic family decodes through a closed [`Registry`]; the
//! [`registries`] summary lists them all.

pub mod definitions;
pub mod enums;
pub mod extension;
pub mod identity;
pub mod node_id;
pub mod pdu;
pub mod strings;
pub mod structures;
pub mod time;
pub mod variant;

pub use definitions::{ExtensionObjectDefinition, EXTENSION_OBJECTS};
pub use enums::{
    ChunkType, ExtensionObjectEncoding, MessageSecurityMode, NodeIdType, TimestampsToReturn,
    VariantType,
};
pub use extension::{ExtensionBody, ExtensionObject};
pub use identity::{UserIdentityToken, UserIdentityTokenDefinition, USER_IDENTITY_TOKENS};
pub use node_id::{ExpandedNodeId, NodeId, NodeIdTypeDefinition, NODE_ID_TYPES};
pub use pdu::{MessageKey, MessagePdu, Payload, PduBody, MESSAGE_PDUS, OPEN_CHANNEL_MESSAGES};
pub use strings::{PascalByteString, PascalString};
pub use structures::{DiagnosticInfo, GuidValue, LocalizedText, QualifiedName, StatusCode};
pub use variant::{DataValue, Variant, VariantValue, VARIANT_VALUES};

use opcwire_spi::{Registry, RegistryError};
use serde::Serialize;
use std::fmt;

/// Discriminators registered for one message family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrySummary {
    pub family: &'static str,
    pub keys: Vec<String>,
}

impl RegistrySummary {
    fn of<K, A, T>(registry: &Registry<K, A, T>) -> Self
    where
        K: fmt::Display + 'static,
        A: 'static,
        T: 'static,
    {
        Self {
            family: registry.family(),
            keys: registry.keys().map(|key| key.to_string()).collect(),
        }
    }
}

/// Summaries of every registry in the catalogue.
pub fn registries() -> Vec<RegistrySummary> {
    vec![
        RegistrySummary::of(&NODE_ID_TYPES),
        RegistrySummary::of(&VARIANT_VALUES),
        RegistrySummary::of(&EXTENSION_OBJECTS),
        RegistrySummary::of(&USER_IDENTITY_TOKENS),
        RegistrySummary::of(&OPEN_CHANNEL_MESSAGES),
        RegistrySummary::of(&MESSAGE_PDUS),
    ]
}

/// Checks every registry maps each of its keys to exactly one decoder.
pub fn validate_registries() -> Result<(), RegistryError> {
    NODE_ID_TYPES.validate()?;
    VARIANT_VALUES.validate()?;
    EXTENSION_OBJECTS.validate()?;
    USER_IDENTITY_TOKENS.validate()?;
    OPEN_CHANNEL_MESSAGES.validate()?;
    MESSAGE_PDUS.validate()?;
    tracing::debug!(families = registries().len(), "registries validated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registries_validate() {
        validate_registries().unwrap();
    }

    #[test]
    fn test_summary_lists_keys() {
        let summaries = registries();
        assert_eq!(summaries.len(), 6);

        let pdus = summaries
            .iter()
            .find(|summary| summary.family == "MessagePdu")
            .unwrap();
        assert!(pdus.keys.contains(&"HEL/request".to_string()));
        assert!(pdus.keys.contains(&"ERR/response".to_string()));

        let extensions = summaries
            .iter()
            .find(|summary| summary.family == "ExtensionObjectDefinition")
            .unwrap();
        assert!(extensions.keys.contains(&"950".to_string()));
    }
}
