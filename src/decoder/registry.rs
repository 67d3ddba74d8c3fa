//! Mapping from [`Format`] to decoder constructors.
//!
//! A registry is built once at startup, with every backend adding its constructor, and is
//! then only read. It is a plain value passed by reference to whatever needs a lookup, so
//! tests can build isolated registries holding test doubles.
//!
//! ```
//! use audiopipe::decoder::DecoderRegistry;
//! use audiopipe::format::Format;
//!
//! let registry = DecoderRegistry::with_default_decoders();
//! assert!(registry.lookup(Format::Ogg).is_none());
//! ```

use std::collections::HashMap;
use std::fmt;

use super::{ByteStream, DecodedSource, DecoderError, Settings};
use crate::common::assert_error_traits;
use crate::format::Format;

/// Builds a decoder over a byte stream that starts at the true beginning of the audio data.
pub type Constructor = fn(ByteStream, &Settings) -> Result<Box<dyn DecodedSource>, DecoderError>;

/// Error returned by [`DecoderRegistry::try_register`].
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A constructor is already registered for the format.
    #[error("A decoder is already registered for {0}")]
    AlreadyRegistered(Format),
}
assert_error_traits!(RegistryError);

/// Append-only table of decoder constructors, one per [`Format`].
#[derive(Clone, Default)]
pub struct DecoderRegistry {
    constructors: HashMap<Format, Constructor>,
}

impl DecoderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every backend compiled into this build.
    pub fn with_default_decoders() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "mp3")]
        super::mp3::register(&mut registry);
        #[cfg(feature = "flac")]
        super::flac::register(&mut registry);
        registry
    }

    /// Adds the constructor for `format`.
    ///
    /// # Panics
    ///
    /// Panics if `format` already has a constructor. Registration happens once at startup, so
    /// a second registration is a configuration bug.
    pub fn register(&mut self, format: Format, constructor: Constructor) {
        if let Err(err) = self.try_register(format, constructor) {
            panic!("{err}");
        }
    }

    /// Adds the constructor for `format`, failing if one is already present.
    pub fn try_register(
        &mut self,
        format: Format,
        constructor: Constructor,
    ) -> Result<(), RegistryError> {
        if self.constructors.contains_key(&format) {
            return Err(RegistryError::AlreadyRegistered(format));
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(%format, "registered decoder");
        self.constructors.insert(format, constructor);
        Ok(())
    }

    /// The constructor registered for `format`, if any.
    pub fn lookup(&self, format: Format) -> Option<Constructor> {
        self.constructors.get(&format).copied()
    }

    /// Whether a constructor is registered for `format`.
    pub fn supports(&self, format: Format) -> bool {
        self.constructors.contains_key(&format)
    }

    /// Formats that have a constructor, in no particular order.
    pub fn formats(&self) -> impl Iterator<Item = Format> + '_ {
        self.constructors.keys().copied()
    }
}

impl fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.constructors.keys()).finish()
    }
}
