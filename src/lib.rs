//! Streaming audio decoding and playback.
//!
//! Turns an arbitrary byte stream (a file, an HTTP response body) into PCM and plays it on a
//! real-time output without ever blocking the audio callback.
//!
//! - [`format::detect`] classifies a stream from a short prefix.
//! - A [`DecoderRegistry`] maps each format to a decoder constructor.
//! - [`decoder::dispatch::open`] sniffs a stream, reattaches the sniffed prefix and builds a
//!   [`DecodedSource`] that yields interleaved little-endian `f32` bytes.
//! - A [`Session`](playback::Session) decodes on a producer thread into a lock-free queue that
//!   a [`PlaybackBridge`](playback::PlaybackBridge) drains from the audio callback.
//!
//! # Usage
//!
#![cfg_attr(feature = "playback", doc = "```no_run")]
#![cfg_attr(not(feature = "playback"), doc = "```ignore")]
//! use std::fs::File;
//! use audiopipe::{DecoderRegistry, Player};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let file = File::open("reading.flac")?;
//!     let len = file.metadata()?.len();
//!
//!     Player::new(DecoderRegistry::with_default_decoders()).play(file, Some(len))?;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `playback` (default): output through `cpal`.
//! - `mp3` (default): MP3 decoding.
//! - `flac` (default): FLAC decoding.
//! - `http`: a blocking HTTP byte source.
//! - `tracing`: log events through `tracing`.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

mod common;

pub mod decoder;
pub mod format;
pub mod playback;
pub mod source;

pub use crate::common::{ChannelCount, Sample, SampleRate, StreamSpec, MONO, SAMPLE_WIDTH, STEREO};
pub use crate::decoder::{DecodedSource, DecoderError, DecoderRegistry, Pull, Status};
pub use crate::format::Format;
pub use crate::playback::{PlayError, PlaybackConfig, PlaybackReport, Session};
#[cfg(feature = "playback")]
pub use crate::playback::Player;
