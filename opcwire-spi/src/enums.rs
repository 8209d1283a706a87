//! Fixed-width enumerations.
//!
//! Enums are declared with [`wire_enum!`](crate::wire_enum), which generates
//! the closed variant set and its [`WireEnum`] mapping. Decoding goes through
//! [`EnumValue`], so a wire integer without a variant stays visible as
//! [`EnumValue::Unknown`] instead of being replaced by a default.

use crate::error::{ParseError, SerializeError};
use crate::read_buffer::BitReader;
use crate::write_buffer::WriteBuffer;
use std::fmt;
use std::hash::Hash;

/// Integer types an enum can be carried in.
pub trait WireRepr: Copy + Eq + Hash + fmt::Debug + fmt::Display + 'static {
    fn read(r: &mut BitReader, name: &str, bits: u8) -> Result<Self, ParseError>;
    fn write(self, w: &mut dyn WriteBuffer, name: &str, bits: u8) -> Result<(), SerializeError>;
}

macro_rules! impl_unsigned_repr {
    ($($t:ty),*) => {$(
        impl WireRepr for $t {
            fn read(r: &mut BitReader, name: &str, bits: u8) -> Result<Self, ParseError> {
                let raw = r.read_unsigned(name, bits)?;
                <$t>::try_from(raw).map_err(|_| ParseError::InvalidWidth {
                    kind: stringify!($t),
                    bits: bits as u64,
                    max: <$t>::BITS as u64,
                })
            }

            fn write(self, w: &mut dyn WriteBuffer, name: &str, bits: u8) -> Result<(), SerializeError> {
                w.write_unsigned(name, bits, self as u64)
            }
        }
    )*};
}

macro_rules! impl_signed_repr {
    ($($t:ty),*) => {$(
        impl WireRepr for $t {
            fn read(r: &mut BitReader, name: &str, bits: u8) -> Result<Self, ParseError> {
                let raw = r.read_signed(name, bits)?;
                <$t>::try_from(raw).map_err(|_| ParseError::InvalidWidth {
                    kind: stringify!($t),
                    bits: bits as u64,
                    max: <$t>::BITS as u64,
                })
            }

            fn write(self, w: &mut dyn WriteBuffer, name: &str, bits: u8) -> Result<(), SerializeError> {
                w.write_signed(name, bits, self as i64)
            }
        }
    )*};
}

impl_unsigned_repr!(u8, u16, u32, u64);
impl_signed_repr!(i8, i16, i32, i64);

/// A closed set of named variants with a fixed-width wire value each.
pub trait WireEnum: Copy + Eq + Hash + fmt::Debug + fmt::Display + 'static {
    type Repr: WireRepr;

    /// Enum name used in diagnostics.
    const NAME: &'static str;
    /// Width on the wire.
    const BITS: u8;
    /// Every variant in declaration order.
    const VALUES: &'static [Self];

    fn value(self) -> Self::Repr;

    fn from_value(value: Self::Repr) -> Option<Self>;

    /// Looks up `value`, keeping it when no variant matches.
    fn decode(value: Self::Repr) -> EnumValue<Self> {
        match Self::from_value(value) {
            Some(known) => EnumValue::Known(known),
            None => EnumValue::Unknown(value),
        }
    }
}

/// Result of decoding an enum from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumValue<E: WireEnum> {
    Known(E),
    /// A wire value with no variant. Re-encodes unchanged.
    Unknown(E::Repr),
}

impl<E: WireEnum> EnumValue<E> {
    pub fn is_known(&self) -> bool {
        matches!(self, EnumValue::Known(_))
    }

    pub fn known(self) -> Option<E> {
        match self {
            EnumValue::Known(value) => Some(value),
            EnumValue::Unknown(_) => None,
        }
    }

    /// Requires a known variant, failing the parse with the raw value
    /// otherwise. Used where the enum selects a decoder.
    pub fn expect_known(self, family: &'static str) -> Result<E, ParseError> {
        match self {
            EnumValue::Known(value) => Ok(value),
            EnumValue::Unknown(raw) => Err(ParseError::UnknownDiscriminator {
                family,
                value: format!("{} {}", E::NAME, raw),
            }),
        }
    }

    /// The integer that goes on the wire.
    pub fn raw(self) -> E::Repr {
        match self {
            EnumValue::Known(value) => value.value(),
            EnumValue::Unknown(raw) => raw,
        }
    }

    pub fn read(r: &mut BitReader, name: &str) -> Result<Self, ParseError> {
        let raw = E::Repr::read(r, name, E::BITS)?;
        let value = E::decode(raw);
        if !value.is_known() {
            tracing::debug!(enum_name = E::NAME, field = name, raw = %raw, "unknown enum value");
        }
        Ok(value)
    }

    pub fn write(self, w: &mut dyn WriteBuffer, name: &str) -> Result<(), SerializeError> {
        self.raw().write(w, name, E::BITS)
    }
}

impl<E: WireEnum> From<E> for EnumValue<E> {
    fn from(value: E) -> Self {
        EnumValue::Known(value)
    }
}

impl<E: WireEnum> fmt::Display for EnumValue<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnumValue::Known(value) => write!(f, "{}", value),
            EnumValue::Unknown(raw) => write!(f, "{}({})", E::NAME, raw),
        }
    }
}

/// Declares a wire enum.
///
/// ```
/// opcwire_spi::wire_enum! {
///     /// Security applied to a secure channel.
///     pub enum SecurityMode: u32, 32 {
///         Invalid = 0,
///         None = 1,
///         Sign = 2,
///         SignAndEncrypt = 3,
///     }
/// }
///
/// use opcwire_spi::WireEnum;
/// assert_eq!(SecurityMode::Sign.value(), 2);
/// assert_eq!(SecurityMode::from_value(3), Some(SecurityMode::SignAndEncrypt));
/// assert_eq!(SecurityMode::VALUES.len(), 4);
/// ```
#[macro_export]
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $repr:ty, $bits:literal {
            $( $(#[$vmeta:meta])* $variant:ident = $value:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $crate::enums::WireEnum for $name {
            type Repr = $repr;
            const NAME: &'static str = stringify!($name);
            const BITS: u8 = $bits;
            const VALUES: &'static [Self] = &[$($name::$variant),+];

            fn value(self) -> $repr {
                match self {
                    $( $name::$variant => $value ),+
                }
            }

            fn from_value(value: $repr) -> ::std::option::Option<Self> {
                $(
                    if value == $value {
                        return ::std::option::Option::Some($name::$variant);
                    }
                )+
                ::std::option::Option::None
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(match self {
                    $( $name::$variant => stringify!($variant) ),+
                })
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::write_buffer::BitWriter;

    crate::wire_enum! {
        enum Color: u8, 4 {
            Red = 1,
            Green = 2,
            Blue = 0xF,
        }
    }

    crate::wire_enum! {
        enum Offset: i16, 16 {
            Behind = -1,
            Ahead = 1,
        }
    }

    #[test]
    fn test_enum_symmetry() {
        for &color in Color::VALUES {
            let mut writer = BitWriter::new();
            EnumValue::from(color).write(&mut writer, "color").unwrap();
            assert_eq!(writer.pos(), 4);
            let mut reader = BitReader::new(writer.into_bytes());
            assert_eq!(
                EnumValue::<Color>::read(&mut reader, "color").unwrap(),
                EnumValue::Known(color)
            );
        }
    }

    #[test]
    fn test_unknown_value_is_explicit() {
        let mut reader = BitReader::new(vec![0b0011_0000]);
        let value = EnumValue::<Color>::read(&mut reader, "color").unwrap();
        assert_eq!(value, EnumValue::Unknown(3));
        assert!(!value.is_known());
        assert_eq!(value.known(), None);
        assert_eq!(value.to_string(), "Color(3)");

        let err = value.expect_known("Palette").unwrap_err();
        assert!(err.is_unknown_discriminator());
        assert!(err.to_string().contains("Color 3"));
    }

    #[test]
    fn test_unknown_reencodes_raw() {
        let mut writer = BitWriter::new();
        EnumValue::<Color>::Unknown(3).write(&mut writer, "color").unwrap();
        assert_eq!(writer.as_slice(), &[0b0011_0000]);
    }

    #[test]
    fn test_signed_repr() {
        assert_eq!(Offset::Behind.value(), -1);
        assert_eq!(Offset::from_value(1), Some(Offset::Ahead));
        assert_eq!(Offset::from_value(0), None);

        let mut writer = BitWriter::new();
        EnumValue::from(Offset::Behind).write(&mut writer, "offset").unwrap();
        assert_eq!(writer.as_slice(), &[0xFF, 0xFF]);
        let mut reader = BitReader::new(writer.into_bytes());
        assert_eq!(
            EnumValue::<Offset>::read(&mut reader, "offset").unwrap(),
            EnumValue::Known(Offset::Behind)
        );
    }

    #[test]
    fn test_display_and_metadata() {
        assert_eq!(Color::Blue.to_string(), "Blue");
        assert_eq!(Color::NAME, "Color");
        assert_eq!(Color::BITS, 4);
        assert_eq!(EnumValue::from(Color::Green).raw(), 2);
    }
}
