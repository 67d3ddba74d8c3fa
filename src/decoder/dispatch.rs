//! Opening a byte stream with the decoder its first bytes call for.
//!
//! The byte source can only be read once, so the prefix that is read for sniffing is kept
//! and stitched back in front of the rest of the stream before the decoder sees it.

use std::io::{self, Cursor, Read};

use super::{ByteStream, DecodedSource, DecoderError, DecoderRegistry, Settings};
use crate::format::{self, Format};

/// Upper bound on the number of bytes read ahead for format detection.
pub const SNIFF_LEN: u64 = 4096;

/// A byte source that yields a retained prefix and then continues with the original source.
pub type Prefixed<R> = io::Chain<Cursor<Vec<u8>>, R>;

/// Reads up to [`SNIFF_LEN`] bytes from `source` and returns them together with a reader
/// that replays them before the rest of `source`.
///
/// Fewer bytes are retained only when the source ends first.
pub fn read_prefix<R: Read>(mut source: R) -> io::Result<(Vec<u8>, R)> {
    let mut head = Vec::with_capacity(SNIFF_LEN as usize);
    (&mut source).take(SNIFF_LEN).read_to_end(&mut head)?;
    Ok((head, source))
}

/// Reattaches a prefix returned by [`read_prefix`] to the source it was read from.
pub fn reattach<R: Read>(head: Vec<u8>, rest: R) -> Prefixed<R> {
    Cursor::new(head).chain(rest)
}

/// Detects the format of `source` and opens it with the matching decoder from `registry`.
///
/// # Errors
///
/// - [`DecoderError::UnsupportedFormat`] when the prefix matches no signature or the registry
///   has no decoder for the detected format.
/// - [`DecoderError::Upstream`] when reading the prefix fails.
/// - Whatever the constructor reports, usually [`DecoderError::ConstructionFailed`].
pub fn open<R>(
    registry: &DecoderRegistry,
    source: R,
    settings: &Settings,
) -> Result<Box<dyn DecodedSource>, DecoderError>
where
    R: Read + Send + 'static,
{
    let (head, rest) = read_prefix(source)?;

    let format = format::detect(&head);
    let constructor = match format {
        Format::Unsupported => None,
        format => registry.lookup(format),
    };
    let Some(constructor) = constructor else {
        #[cfg(feature = "tracing")]
        tracing::warn!(%format, sniffed = head.len(), "no decoder for stream");
        return Err(DecoderError::UnsupportedFormat { format });
    };

    let stream: ByteStream = Box::new(reattach(head, rest));
    constructor(stream, settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_bounded() {
        let data: Vec<u8> = (0..10_000u32).map(|i| i as u8).collect();
        let (head, rest) = read_prefix(Cursor::new(data.clone())).unwrap();
        assert_eq!(head.len(), SNIFF_LEN as usize);
        assert_eq!(rest.position(), SNIFF_LEN);

        let mut replay = Vec::new();
        reattach(head, rest).read_to_end(&mut replay).unwrap();
        assert_eq!(replay, data);
    }

    #[test]
    fn short_source_is_retained_whole() {
        let (head, _) = read_prefix(&b"ID3\x04"[..]).unwrap();
        assert_eq!(head, b"ID3\x04");
    }

    #[test]
    fn unknown_bytes_are_rejected() {
        let registry = DecoderRegistry::new();
        let err = open(&registry, Cursor::new(vec![0u8; 64]), &Settings::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            DecoderError::UnsupportedFormat {
                format: Format::Unsupported
            }
        ));
    }
}
