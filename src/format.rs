//! Container/codec detection from a stream prefix.
//!
//! A stream is classified by comparing its first bytes against an ordered table of
//! [`Signature`]s. Detection never consumes anything: it works on a borrowed slice that the
//! caller has already read (see [`crate::decoder::dispatch`]).
//!
//! # Example
//!
//! ```
//! use audiopipe::format::{detect, Format};
//!
//! assert_eq!(detect(&[0xFF, 0xFB, 0x90, 0x00]), Format::Mp3);
//! assert_eq!(detect(b"RIFF....WAVE"), Format::Unsupported);
//! ```

use std::fmt;

/// Audio stream format recognised by [`detect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// No signature matched.
    Unsupported,
    /// MPEG-1/2/2.5 Layer III, optionally preceded by an ID3v2 tag.
    Mp3,
    /// Native FLAC stream.
    Flac,
    /// Ogg container. Recognised, but no decoder ships for it.
    Ogg,
}

impl Format {
    /// Short upper-case name, as used in log events and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Format::Unsupported => "unsupported",
            Format::Mp3 => "MP3",
            Format::Flac => "FLAC",
            Format::Ogg => "OGG",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A byte prefix that identifies a [`Format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    /// Bytes the stream must start with.
    pub prefix: &'static [u8],
    /// Format reported when `prefix` matches.
    pub format: Format,
}

impl Signature {
    const fn new(prefix: &'static [u8], format: Format) -> Self {
        Self { prefix, format }
    }

    /// Whether `head` starts with this signature and carries at least one byte past it.
    #[inline]
    pub fn matches(&self, head: &[u8]) -> bool {
        head.len() > self.prefix.len() && head.starts_with(self.prefix)
    }
}

/// Signatures in match order. The first match wins.
///
/// The MP3 entries cover the frame sync word combined with the version, layer III and
/// protection bits of a frame header. Layers I and II are not recognised.
pub const SIGNATURES: &[Signature] = &[
    // STREAMINFO must be the first metadata block, so the block header that follows the
    // marker is always "not last, type 0" with a length well below 2^16.
    Signature::new(b"fLaC\x00\x00\x00", Format::Flac),
    // ID3v2 tagged
    Signature::new(&[0x49, 0x44, 0x33], Format::Mp3),
    // MPEG-1
    Signature::new(&[0xFF, 0xFB], Format::Mp3),
    Signature::new(&[0xFF, 0xFA], Format::Mp3),
    // MPEG-2
    Signature::new(&[0xFF, 0xF3], Format::Mp3),
    Signature::new(&[0xFF, 0xF2], Format::Mp3),
    // MPEG-2.5
    Signature::new(&[0xFF, 0xE3], Format::Mp3),
    Signature::new(&[0xFF, 0xE2], Format::Mp3),
    Signature::new(b"OggS\x00", Format::Ogg),
];

/// Classifies a stream from its first bytes.
///
/// A signature only counts when `head` extends at least one byte beyond it; a buffer that
/// holds nothing but the signature is too short to be trusted and yields
/// [`Format::Unsupported`].
pub fn detect(head: &[u8]) -> Format {
    SIGNATURES
        .iter()
        .find(|signature| signature.matches(head))
        .map_or(Format::Unsupported, |signature| signature.format)
}
