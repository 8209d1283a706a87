//! Discriminated registries.
//!
//! A [`Registry`] maps the discriminator of an abstract message family to the
//! decoder of the concrete variant. Tables are closed `'static` slices built
//! at compile time and never change afterwards. The inverse direction, from
//! a built value back to its discriminator, is the [`Discriminated`] trait on
//! the family's sum type.

use crate::error::{ParseError, RegistryError};
use crate::read_buffer::BitReader;
use std::borrow::Borrow;
use std::fmt;

/// Decoder continuation for one registered key. `A` carries context from the
/// enclosing frame.
pub type DecodeFn<A, T> = fn(&mut BitReader, A) -> Result<T, ParseError>;

/// Implemented by the sum type of a family to regenerate the discriminator a
/// value was (or will be) decoded with.
pub trait Discriminated {
    type Key;

    fn discriminator(&self) -> Self::Key;
}

pub struct Registry<K: 'static, A: 'static, T: 'static> {
    family: &'static str,
    entries: &'static [(K, DecodeFn<A, T>)],
}

impl<K: 'static, A: 'static, T: 'static> Registry<K, A, T> {
    pub const fn new(family: &'static str, entries: &'static [(K, DecodeFn<A, T>)]) -> Self {
        Self { family, entries }
    }

    pub fn family(&self) -> &'static str {
        self.family
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered keys in table order.
    pub fn keys(&self) -> impl Iterator<Item = &'static K> {
        self.entries.iter().map(|(key, _)| key)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        self.entries.iter().any(|(k, _)| k.borrow() == key)
    }

    /// Looks up the decoder for `key`. An unregistered key is a parse
    /// failure naming the key.
    pub fn resolve<Q>(&self, key: &Q) -> Result<DecodeFn<A, T>, ParseError>
    where
        K: Borrow<Q>,
        Q: PartialEq + fmt::Display + ?Sized,
    {
        match self.entries.iter().find(|(k, _)| k.borrow() == key) {
            Some((_, decode)) => Ok(*decode),
            None => {
                tracing::debug!(family = self.family, key = %key, "no decoder registered");
                Err(ParseError::UnknownDiscriminator {
                    family: self.family,
                    value: key.to_string(),
                })
            }
        }
    }

    /// Resolves `key` and continues decoding with it.
    pub fn decode<Q>(&self, r: &mut BitReader, key: &Q, args: A) -> Result<T, ParseError>
    where
        K: Borrow<Q>,
        Q: PartialEq + fmt::Display + ?Sized,
    {
        let decode = self.resolve(key)?;
        decode(r, args)
    }

    /// Checks that the table is non-empty and maps every key exactly once.
    pub fn validate(&self) -> Result<(), RegistryError>
    where
        K: PartialEq + fmt::Display,
    {
        if self.entries.is_empty() {
            return Err(RegistryError::Empty {
                family: self.family,
            });
        }
        for (i, (key, _)) in self.entries.iter().enumerate() {
            if self.entries[..i].iter().any(|(earlier, _)| earlier == key) {
                return Err(RegistryError::DuplicateKey {
                    family: self.family,
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl<K: fmt::Debug + 'static, A: 'static, T: 'static> fmt::Debug for Registry<K, A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("family", &self.family)
            .field("keys", &self.entries.iter().map(|(k, _)| k).collect::<Vec<_>>())
            .finish()
    }
}
