//! MP3 decoding on a feed-driven decoder.
//!
//! The native decoder does not read by itself. [`Mp3Source`] reads the upstream byte source
//! into a fixed scratch buffer, feeds the decoder, and reacts to what it reports:
//!
//! | native status                    | adapter reaction                                        |
//! |----------------------------------|---------------------------------------------------------|
//! | [`NativeStatus::NeedMoreInput`]  | read and feed more upstream bytes, or end the stream if upstream already ended |
//! | [`NativeStatus::FormatChanged`]  | record the announced parameters, deliver the frame      |
//! | [`NativeStatus::Ok`]             | deliver the frame                                       |
//! | [`NativeStatus::Error`]          | fail with [`DecoderError::Decode`]                      |
//!
//! When upstream ends the decoder is told through [`FeedEngine::finish`] and drained until it
//! asks for input again.
//!
//! Frames are delivered through the same leftover mechanism as [`super::FramedSource`].

use std::collections::VecDeque;
use std::sync::Mutex;

use dasp_sample::Sample as _;

use super::framed::{lock, Leftover};
use super::utils::append_remixed;
use super::{read_upstream, ByteStream, DecodedSource, DecoderError, Pull, Settings};
use crate::common::{ChannelCount, SampleRate, StreamSpec};
use crate::format::Format;

/// What a feed-driven decoder reports after a decode attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeStatus {
    /// Nothing can be decoded until more input is fed.
    NeedMoreInput,
    /// The stream parameters changed; output written by this attempt uses the new ones.
    FormatChanged(StreamSpec),
    /// A frame was decoded.
    Ok,
    /// The decoder failed. Carries the native error text.
    Error(String),
}

/// A decoder that is fed input explicitly and decodes from what it has buffered.
pub trait FeedEngine: Send {
    /// Hands more encoded bytes to the decoder.
    fn feed(&mut self, input: &[u8]);

    /// Decodes at most one frame from the buffered input, appending interleaved
    /// little-endian `f32` PCM to `out`.
    fn decode(&mut self, out: &mut Vec<u8>) -> NativeStatus;

    /// Tells the decoder no more input will be fed, so a trailing partial frame is all
    /// there is.
    fn finish(&mut self) {}
}

/// Registers the MP3 backend.
pub fn register(registry: &mut super::DecoderRegistry) {
    registry.register(Format::Mp3, open);
}

fn open(stream: ByteStream, settings: &Settings) -> Result<Box<dyn DecodedSource>, DecoderError> {
    let engine = Minimp3Engine::new(settings.channels());
    Ok(Box::new(Mp3Source::new(engine, stream, settings)))
}

struct Open<E> {
    engine: E,
    upstream: ByteStream,
    scratch: Box<[u8]>,
    leftover: Leftover,
    upstream_done: bool,
    finished: bool,
}

/// [`DecodedSource`] that drives a [`FeedEngine`] from an upstream byte stream.
pub struct Mp3Source<E = Minimp3Engine> {
    // `None` once closed
    state: Mutex<Option<Open<E>>>,
    spec: Mutex<Option<StreamSpec>>,
}

impl<E: FeedEngine> Mp3Source<E> {
    /// Creates a source that reads `upstream` in chunks of `settings.scratch_len()` bytes.
    pub fn new(engine: E, upstream: ByteStream, settings: &Settings) -> Self {
        Self {
            state: Mutex::new(Some(Open {
                engine,
                upstream,
                scratch: vec![0; settings.scratch_len()].into_boxed_slice(),
                leftover: Leftover::default(),
                upstream_done: false,
                finished: false,
            })),
            spec: Mutex::new(None),
        }
    }

    fn announce(&self, spec: StreamSpec) {
        let mut current = lock(&self.spec);
        if *current == Some(spec) {
            return;
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(
            format = %Format::Mp3,
            sample_rate = spec.sample_rate.get(),
            channels = spec.channels.get(),
            "stream format announced"
        );
        *current = Some(spec);
    }
}

impl<E: FeedEngine> DecodedSource for Mp3Source<E> {
    fn read(&self, buf: &mut [u8]) -> Result<Pull, DecoderError> {
        let mut guard = lock(&self.state);
        let Some(open) = guard.as_mut() else {
            return Ok(Pull::end());
        };

        if buf.is_empty() {
            return Ok(Pull::data(0));
        }
        if !open.leftover.is_empty() {
            return Ok(Pull::data(open.leftover.drain_into(buf)));
        }
        if open.finished {
            return Ok(Pull::end());
        }

        loop {
            match open.engine.decode(open.leftover.refill()) {
                NativeStatus::NeedMoreInput => {
                    if open.upstream_done {
                        // Upstream is exhausted and so are the decoder's buffers
                        open.finished = true;
                        return Ok(Pull::end());
                    }
                    match read_upstream(&mut open.upstream, &mut open.scratch) {
                        Ok(0) => {
                            open.upstream_done = true;
                            open.engine.finish();
                        }
                        Ok(n) => open.engine.feed(&open.scratch[..n]),
                        Err(err) => {
                            open.finished = true;
                            return Err(err.into());
                        }
                    }
                }
                NativeStatus::FormatChanged(spec) => {
                    self.announce(spec);
                    break;
                }
                NativeStatus::Ok => break,
                NativeStatus::Error(reason) => {
                    open.finished = true;
                    return Err(DecoderError::Decode(reason));
                }
            }
        }

        Ok(Pull::data(open.leftover.drain_into(buf)))
    }

    fn close(&self) {
        drop(lock(&self.state).take());
    }

    fn format(&self) -> Format {
        Format::Mp3
    }

    fn spec(&self) -> Option<StreamSpec> {
        *lock(&self.spec)
    }
}

/// Largest MPEG audio frame: layer III, 320 kbit/s at 32 kHz, padded.
const MAX_FRAME_LEN: usize = 1441;

/// Input kept queued ahead of the decoder until the stream ends. `minimp3` discards a
/// trailing frame it cannot sync, so it must never be handed the end of the input early.
const MIN_LOOKAHEAD: usize = 2 * MAX_FRAME_LEN;

/// [`FeedEngine`] backed by `minimp3`.
///
/// Decoded frames keep their sample rate; the channel layout is remixed to the count chosen
/// at construction.
pub struct Minimp3Engine {
    decoder: minimp3_fixed::Decoder<VecDeque<u8>>,
    channels: ChannelCount,
    current: Option<StreamSpec>,
    input_ended: bool,
}

impl Minimp3Engine {
    /// Creates an engine producing `channels` output channels.
    pub fn new(channels: ChannelCount) -> Self {
        Self {
            decoder: minimp3_fixed::Decoder::new(VecDeque::new()),
            channels,
            current: None,
            input_ended: false,
        }
    }
}

impl FeedEngine for Minimp3Engine {
    fn feed(&mut self, input: &[u8]) {
        self.decoder.reader_mut().extend(input);
    }

    fn finish(&mut self) {
        self.input_ended = true;
    }

    fn decode(&mut self, out: &mut Vec<u8>) -> NativeStatus {
        if !self.input_ended && self.decoder.reader().len() < MIN_LOOKAHEAD {
            return NativeStatus::NeedMoreInput;
        }
        let frame = match self.decoder.next_frame() {
            Ok(frame) => frame,
            Err(minimp3_fixed::Error::Io(err)) => return NativeStatus::Error(err.to_string()),
            // Eof, InsufficientData and SkippedData all mean the buffered input ran out
            Err(_) => return NativeStatus::NeedMoreInput,
        };

        let source_channels = u16::try_from(frame.channels)
            .ok()
            .and_then(ChannelCount::new);
        let sample_rate = u32::try_from(frame.sample_rate)
            .ok()
            .and_then(SampleRate::new);
        let (Some(source_channels), Some(sample_rate)) = (source_channels, sample_rate) else {
            return NativeStatus::Error(format!(
                "invalid frame header: {} channels at {} Hz",
                frame.channels, frame.sample_rate
            ));
        };

        append_remixed(
            out,
            frame.data.iter().map(|sample| sample.to_sample::<f32>()),
            source_channels,
            self.channels,
        );

        let spec = StreamSpec {
            sample_rate,
            channels: self.channels,
        };
        if self.current == Some(spec) {
            NativeStatus::Ok
        } else {
            self.current = Some(spec);
            NativeStatus::FormatChanged(spec)
        }
    }
}
