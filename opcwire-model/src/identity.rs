//! User identity tokens.
//!
//! The token kind is selected by the policy id string that precedes the
//! token body, so the policy id is not stored: it is re-derived from the
//! token kind when encoding.

use crate::strings::{PascalByteString, PascalString};
use opcwire_spi::field::write_implicit;
use opcwire_spi::io::Complex;
use opcwire_spi::{
    write_context, BitReader, DecodeFn, Discriminated, Message, ParseError, Registry,
    SerializeError, WriteBuffer,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserIdentityTokenDefinition {
    Anonymous,
    UserName {
        user_name: PascalString,
        password: PascalByteString,
        encryption_algorithm: PascalString,
    },
    X509 {
        certificate_data: PascalByteString,
    },
    Issued {
        token_data: PascalByteString,
        encryption_algorithm: PascalString,
    },
}

static USER_IDENTITY_TOKEN_TABLE: &[(&str, DecodeFn<(), UserIdentityTokenDefinition>)] = &[
    ("anonymous", |_, _| Ok(UserIdentityTokenDefinition::Anonymous)),
    ("username", |r, _| {
        let user_name = r.in_context("userName", PascalString::parse)?;
        let password = r.in_context("password", PascalByteString::parse)?;
        let encryption_algorithm = r.in_context("encryptionAlgorithm", PascalString::parse)?;
        Ok(UserIdentityTokenDefinition::UserName {
            user_name,
            password,
            encryption_algorithm,
        })
    }),
    ("certificate", |r, _| {
        let certificate_data = r.in_context("certificateData", PascalByteString::parse)?;
        Ok(UserIdentityTokenDefinition::X509 { certificate_data })
    }),
    ("identity", |r, _| {
        let token_data = r.in_context("tokenData", PascalByteString::parse)?;
        let encryption_algorithm = r.in_context("encryptionAlgorithm", PascalString::parse)?;
        Ok(UserIdentityTokenDefinition::Issued {
            token_data,
            encryption_algorithm,
        })
    }),
];

/// Identity token bodies keyed by policy id.
pub static USER_IDENTITY_TOKENS: Registry<&str, (), UserIdentityTokenDefinition> =
    Registry::new("UserIdentityTokenDefinition", USER_IDENTITY_TOKEN_TABLE);

impl Discriminated for UserIdentityTokenDefinition {
    type Key = &'static str;

    fn discriminator(&self) -> &'static str {
        match self {
            UserIdentityTokenDefinition::Anonymous => "anonymous",
            UserIdentityTokenDefinition::UserName { .. } => "username",
            UserIdentityTokenDefinition::X509 { .. } => "certificate",
            UserIdentityTokenDefinition::Issued { .. } => "identity",
        }
    }
}

impl UserIdentityTokenDefinition {
    pub fn parse(r: &mut BitReader, policy_id: &str) -> Result<Self, ParseError> {
        r.in_context("UserIdentityTokenDefinition", |r| {
            USER_IDENTITY_TOKENS.decode(r, policy_id, ())
        })
    }
}

impl Message for UserIdentityTokenDefinition {
    fn type_name(&self) -> &'static str {
        "UserIdentityTokenDefinition"
    }

    fn length_in_bits(&self) -> u64 {
        match self {
            UserIdentityTokenDefinition::Anonymous => 0,
            UserIdentityTokenDefinition::UserName {
                user_name,
                password,
                encryption_algorithm,
            } => {
                user_name.length_in_bits()
                    + password.length_in_bits()
                    + encryption_algorithm.length_in_bits()
            }
            UserIdentityTokenDefinition::X509 { certificate_data } => {
                certificate_data.length_in_bits()
            }
            UserIdentityTokenDefinition::Issued {
                token_data,
                encryption_algorithm,
            } => token_data.length_in_bits() + encryption_algorithm.length_in_bits(),
        }
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        write_context(w, "UserIdentityTokenDefinition", |w| match self {
            UserIdentityTokenDefinition::Anonymous => Ok(()),
            UserIdentityTokenDefinition::UserName {
                user_name,
                password,
                encryption_algorithm,
            } => {
                write_context(w, "userName", |w| user_name.serialize(w))?;
                write_context(w, "password", |w| password.serialize(w))?;
                write_context(w, "encryptionAlgorithm", |w| encryption_algorithm.serialize(w))
            }
            UserIdentityTokenDefinition::X509 { certificate_data } => {
                write_context(w, "certificateData", |w| certificate_data.serialize(w))
            }
            UserIdentityTokenDefinition::Issued {
                token_data,
                encryption_algorithm,
            } => {
                write_context(w, "tokenData", |w| token_data.serialize(w))?;
                write_context(w, "encryptionAlgorithm", |w| encryption_algorithm.serialize(w))
            }
        })
    }
}

/// Identity presented when activating a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserIdentityToken {
    pub token: UserIdentityTokenDefinition,
}

impl UserIdentityToken {
    pub fn new(token: UserIdentityTokenDefinition) -> Self {
        Self { token }
    }

    pub fn policy_id(&self) -> &'static str {
        self.token.discriminator()
    }

    pub fn parse(r: &mut BitReader) -> Result<Self, ParseError> {
        r.in_context("UserIdentityToken", |r| {
            let policy_id = r.in_context("policyId", PascalString::parse)?;
            let token = r.in_context("userIdentityTokenDefinition", |r| {
                UserIdentityTokenDefinition::parse(r, policy_id.as_str())
            })?;
            Ok(Self { token })
        })
    }
}

impl Message for UserIdentityToken {
    fn type_name(&self) -> &'static str {
        "UserIdentityToken"
    }

    fn length_in_bits(&self) -> u64 {
        PascalString::new(self.policy_id()).length_in_bits() + self.token.length_in_bits()
    }

    fn serialize(&self, w: &mut dyn WriteBuffer) -> Result<(), SerializeError> {
        write_context(w, "UserIdentityToken", |w| {
            write_implicit(
                w,
                "policyId",
                PascalString::new(self.policy_id()),
                &Complex::new(PascalString::parse),
            )?;
            write_context(w, "userIdentityTokenDefinition", |w| self.token.serialize(w))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::ExtensionObjectDefinition;
    use crate::extension::ExtensionObject;
    use opcwire_spi::{assert_length_agreement, CodecOptions, Decoder, Encoder};

    fn tokens() -> Vec<UserIdentityTokenDefinition> {
        vec![
            UserIdentityTokenDefinition::Anonymous,
            UserIdentityTokenDefinition::UserName {
                user_name: PascalString::new("operator"),
                password: PascalByteString::new(b"secret".to_vec()),
                encryption_algorithm: PascalString::null(),
            },
            UserIdentityTokenDefinition::X509 {
                certificate_data: PascalByteString::new(vec![0x30, 0x82]),
            },
            UserIdentityTokenDefinition::Issued {
                token_data: PascalByteString::null(),
                encryption_algorithm: PascalString::new("rsa-oaep"),
            },
        ]
    }

    #[test]
    fn test_every_policy_roundtrips() {
        USER_IDENTITY_TOKENS.validate().unwrap();
        for token in tokens() {
            assert!(USER_IDENTITY_TOKENS.contains(token.discriminator()));
            let message = UserIdentityToken::new(token);
            assert_length_agreement(&message).unwrap();
            let bytes = Encoder::encode(&message, &CodecOptions::default()).unwrap();
            let decoded = Decoder::default()
                .decode(bytes, "UserIdentityToken", UserIdentityToken::parse)
                .unwrap();
            assert_eq!(decoded.value, message);
        }
    }

    #[test]
    fn test_anonymous_layout() {
        let bytes = Encoder::encode(
            &UserIdentityToken::new(UserIdentityTokenDefinition::Anonymous),
            &CodecOptions::default(),
        )
        .unwrap();
        assert_eq!(&bytes[..4], &[0, 0, 0, 9]);
        assert_eq!(&bytes[4..], b"anonymous");
    }

    #[test]
    fn test_unknown_policy_fails() {
        let bytes = Encoder::encode(&PascalString::new("kerberos"), &CodecOptions::default()).unwrap();
        let err = Decoder::default()
            .decode(bytes, "UserIdentityToken", UserIdentityToken::parse)
            .unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownDiscriminator {
                family: "UserIdentityTokenDefinition",
                value: "kerberos".to_string(),
            }
        );
    }

    #[test]
    fn test_token_inside_extension_object() {
        let object = ExtensionObject::new(UserIdentityToken::new(tokens().remove(1)));
        let bytes = Encoder::encode(&object, &CodecOptions::default()).unwrap();
        let decoded = Decoder::default()
            .decode(bytes, "ExtensionObject", |r| ExtensionObject::parse(r, true))
            .unwrap();
        assert!(matches!(
            decoded.value.definition(),
            Some(ExtensionObjectDefinition::UserIdentityToken(token)) if token.policy_id() == "username"
        ));
    }
}
