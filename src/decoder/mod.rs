//! Decoding of sniffed byte streams into PCM.
//!
//! A byte stream enters through [`dispatch::open`], which detects its [`Format`], looks the
//! format up in a [`DecoderRegistry`] and hands the untouched stream to the registered
//! constructor. What comes back is a [`DecodedSource`]: a pull interface yielding
//! interleaved little-endian `f32` PCM bytes.
//!
//! # Example
//!
//! ```no_run
//! use std::fs::File;
//! use audiopipe::decoder::{dispatch, DecoderRegistry, Settings, Status};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = DecoderRegistry::with_default_decoders();
//!     let source = dispatch::open(&registry, File::open("reading.mp3")?, &Settings::default())?;
//!
//!     let mut pcm = vec![0u8; 4096];
//!     loop {
//!         let pull = source.read(&mut pcm)?;
//!         // hand pcm[..pull.len] to the output
//!         if pull.status == Status::EndOfStream {
//!             break;
//!         }
//!     }
//!     source.close();
//!     Ok(())
//! }
//! ```

use std::io::{self, Read};
use std::sync::Arc;

use crate::common::{assert_error_traits, ChannelCount, StreamSpec, MONO, STEREO};
use crate::format::Format;

pub mod dispatch;
#[cfg(feature = "flac")]
pub mod flac;
pub mod framed;
#[cfg(feature = "mp3")]
pub mod mp3;
pub mod registry;
mod utils;

pub use framed::{FrameEngine, FramedSource};
pub use registry::{Constructor, DecoderRegistry, RegistryError};

/// Byte source handed to decoder constructors.
///
/// `Ok(0)` from `read` means end of stream; any other error is an upstream failure.
pub type ByteStream = Box<dyn Read + Send>;

/// Outcome of a [`DecodedSource::read`] that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// More data may follow.
    Ok,
    /// The stream is exhausted (or the source was closed). Every later read reports the same.
    EndOfStream,
}

/// Bytes written by a read together with the stream status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pull {
    /// Number of bytes written to the front of the caller's buffer.
    pub len: usize,
    /// Whether the stream continues.
    pub status: Status,
}

impl Pull {
    pub(crate) fn data(len: usize) -> Self {
        Self {
            len,
            status: Status::Ok,
        }
    }

    pub(crate) fn end() -> Self {
        Self {
            len: 0,
            status: Status::EndOfStream,
        }
    }

    /// Whether this read reached the end of the stream.
    pub fn is_end(&self) -> bool {
        self.status == Status::EndOfStream
    }
}

/// A pull source of decoded PCM bytes.
///
/// Implementations own their native decoder. The methods take `&self` because a source is
/// usually read on one thread and closed from another during teardown; implementations
/// serialise both behind a single lock.
pub trait DecodedSource: Send + Sync {
    /// Fills the front of `buf` with interleaved little-endian `f32` samples.
    ///
    /// Bytes are delivered exactly once and in order, independently of how the native decoder
    /// chunks its output. Reading after end of stream or after [`close`](Self::close) returns
    /// [`Status::EndOfStream`].
    fn read(&self, buf: &mut [u8]) -> Result<Pull, DecoderError>;

    /// Releases the native decoder. Idempotent.
    fn close(&self);

    /// Format this source decodes.
    fn format(&self) -> Format;

    /// Output parameters, known once the decoder has announced them.
    fn spec(&self) -> Option<StreamSpec>;
}

/// Errors that can happen when opening or decoding a stream.
#[derive(Debug, thiserror::Error, Clone)]
pub enum DecoderError {
    /// The stream prefix matched no signature, or no decoder is registered for it.
    #[error("Unsupported audio format ({format})")]
    UnsupportedFormat {
        /// What the sniffer detected. [`Format::Unsupported`] when no signature matched.
        format: Format,
    },
    /// The native decoder could not be initialised.
    #[error("Could not construct {format} decoder: {reason}")]
    ConstructionFailed {
        /// Format of the decoder that failed.
        format: Format,
        /// Native error text.
        reason: String,
    },
    /// The native decoder reported an error mid-stream.
    #[error("Decoding failed: {0}")]
    Decode(String),
    /// Reading the upstream byte source failed.
    #[error("Reading the upstream byte source failed")]
    Upstream(#[source] Arc<io::Error>),
}
assert_error_traits!(DecoderError);

impl From<io::Error> for DecoderError {
    fn from(err: io::Error) -> Self {
        Self::Upstream(Arc::new(err))
    }
}

/// Audio decoder configuration settings.
#[derive(Clone, Copy, Debug)]
pub struct Settings {
    /// Channel layout of the decoded PCM. Chosen once per decoder; sources with a different
    /// layout are remixed.
    pub(crate) channels: ChannelCount,

    /// Size of the scratch buffer used for each upstream read.
    pub(crate) scratch_len: usize,
}

/// Upstream read size used unless configured otherwise.
pub const DEFAULT_SCRATCH_LEN: usize = 4096;

impl Default for Settings {
    fn default() -> Self {
        Self {
            channels: STEREO,
            scratch_len: DEFAULT_SCRATCH_LEN,
        }
    }
}

impl Settings {
    /// Decode to mono.
    pub fn mono(self) -> Self {
        self.with_channels(MONO)
    }

    /// Sets the output channel count.
    ///
    /// Only mono and stereo are supported; larger counts are clamped to stereo.
    pub fn with_channels(mut self, channels: ChannelCount) -> Self {
        self.channels = channels.min(STEREO);
        self
    }

    /// Sets the number of bytes requested from the upstream source per read.
    pub fn with_scratch_len(mut self, scratch_len: usize) -> Self {
        self.scratch_len = scratch_len.max(1);
        self
    }

    /// Output channel count.
    pub fn channels(&self) -> ChannelCount {
        self.channels
    }

    /// Upstream read size.
    pub fn scratch_len(&self) -> usize {
        self.scratch_len
    }
}

/// Reads from `src`, retrying on interruption. `Ok(0)` means end of stream.
pub(crate) fn read_upstream<R: Read + ?Sized>(src: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match src.read(buf) {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}
