//! Playing a decoded stream on a real-time output.
//!
//! A [`Session`] splits playback in two halves connected by a bounded lock-free queue:
//!
//! - a producer thread that reads the byte source, decodes it and pushes samples;
//! - a [`PlaybackBridge`] that the audio engine calls on its own schedule and that only ever
//!   pops from the queue, padding with silence when the producer falls behind.
//!
//! The session completes through a [`CompletionSignal`] that is resolved exactly once,
//! either when the queue has drained after the last decoded sample or, to reproduce the
//! behaviour of byte-rate based players, a fixed time after playback started.
//!
//! [`Player`] runs a whole session on the default output device:
//!
#![cfg_attr(feature = "playback", doc = "```no_run")]
#![cfg_attr(not(feature = "playback"), doc = "```ignore")]
//! use std::fs::File;
//! use audiopipe::decoder::DecoderRegistry;
//! use audiopipe::playback::Player;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let file = File::open("reading.mp3")?;
//!     let len = file.metadata()?.len();
//!
//!     let player = Player::new(DecoderRegistry::with_default_decoders());
//!     let report = player.play(file, Some(len))?;
//!     println!("played {:?}", report.played());
//!     Ok(())
//! }
//! ```

use std::io::{self, Read};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::common::{assert_error_traits, units_to_duration, StreamSpec, SAMPLE_WIDTH};
use crate::decoder::{dispatch, DecodedSource, DecoderError, DecoderRegistry, Settings};
use crate::format::Format;
use crate::source::{ByteCount, CountingReader};

mod bridge;
mod completion;
#[cfg(feature = "playback")]
mod output;
mod producer;

pub use bridge::PlaybackBridge;
pub use completion::{
    estimate_playback_duration, CompletionSignal, ASSUMED_BYTES_PER_SECOND, COMPLETION_MARGIN,
};
#[cfg(feature = "playback")]
pub use output::{open_output, OutputError, OutputStream};

use bridge::Trigger;
use completion::EstimatedTimer;
use producer::Producer;

/// When a session counts as complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Completion {
    /// Once every decoded sample has been handed to the output.
    #[default]
    Drained,
    /// A fixed time after the first output callback: the transfer size divided by
    /// `bytes_per_second`, plus the completion margin.
    ///
    /// Needs the total transfer size; sessions without one fall back to [`Drained`](Self::Drained).
    Estimated {
        /// Assumed encoded byte rate of the stream.
        bytes_per_second: NonZeroU32,
    },
}

impl Completion {
    /// [`Completion::Estimated`] at [`ASSUMED_BYTES_PER_SECOND`].
    pub fn estimated() -> Self {
        Self::Estimated {
            bytes_per_second: ASSUMED_BYTES_PER_SECOND,
        }
    }
}

/// Playback configuration.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackConfig {
    pub(crate) decoder: Settings,
    pub(crate) completion: Completion,
    pub(crate) completion_margin: Duration,
    pub(crate) queue_duration: Duration,
    pub(crate) buffer_frames: Option<u32>,
    pub(crate) chunk_len: usize,
    pub(crate) producer_backoff: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            decoder: Settings::default(),
            completion: Completion::default(),
            completion_margin: COMPLETION_MARGIN,
            queue_duration: Duration::from_millis(500),
            buffer_frames: None,
            chunk_len: 4096,
            producer_backoff: Duration::from_millis(5),
        }
    }
}

impl PlaybackConfig {
    /// Sets the decoder settings, including the output channel count.
    pub fn with_decoder(mut self, decoder: Settings) -> Self {
        self.decoder = decoder;
        self
    }

    /// Sets how completion is decided.
    pub fn with_completion(mut self, completion: Completion) -> Self {
        self.completion = completion;
        self
    }

    /// Sets the time added to an estimated playback duration.
    pub fn with_completion_margin(mut self, margin: Duration) -> Self {
        self.completion_margin = margin;
        self
    }

    /// Sets how much decoded audio the queue between producer and output can hold.
    pub fn with_queue_duration(mut self, duration: Duration) -> Self {
        self.queue_duration = duration;
        self
    }

    /// Requests a fixed device buffer of `frames` frames.
    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_frames = Some(frames);
        self
    }

    /// Sets how many decoded bytes the producer asks for per read.
    pub fn with_chunk_len(mut self, chunk_len: usize) -> Self {
        self.chunk_len = chunk_len.max(SAMPLE_WIDTH);
        self
    }

    /// Sets how long the producer sleeps when the queue is full.
    pub fn with_producer_backoff(mut self, backoff: Duration) -> Self {
        self.producer_backoff = backoff;
        self
    }

    /// Decoder settings.
    pub fn decoder(&self) -> &Settings {
        &self.decoder
    }

    /// Completion mode.
    pub fn completion(&self) -> Completion {
        self.completion
    }
}

/// Errors that end a playback attempt.
#[derive(Debug, thiserror::Error, Clone)]
pub enum PlayError {
    /// Opening or decoding the stream failed.
    #[error(transparent)]
    Decoder(#[from] DecoderError),
    /// The output device could not be opened.
    #[cfg(feature = "playback")]
    #[error(transparent)]
    Output(#[from] OutputError),
    /// The stream ended before yielding any audio.
    #[error("The stream ended before producing any audio")]
    EmptyStream,
    /// The decoder produced audio without reporting its parameters.
    #[error("The decoder did not report the stream parameters")]
    UnknownStreamSpec,
    /// A playback thread could not be started.
    #[error("Could not spawn a playback thread")]
    Spawn(#[source] Arc<io::Error>),
    /// The producer thread panicked.
    #[error("The decoding thread panicked")]
    ProducerPanicked,
}
assert_error_traits!(PlayError);

/// Summary of a finished session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackReport {
    /// Detected format of the stream.
    pub format: Format,
    /// Parameters of the decoded samples.
    pub spec: StreamSpec,
    /// Encoded bytes read from the source.
    pub bytes_read: u64,
    /// Expected size of the source, if it was known.
    pub total_bytes: Option<u64>,
    /// Decoded PCM bytes produced.
    pub decoded_bytes: u64,
    /// Samples handed to the output, across all channels.
    pub samples_played: u64,
    /// Output callbacks that had to be padded with silence while decoding was still running.
    pub underruns: u64,
    /// Whether the output was ever started.
    pub started: bool,
    /// Whether completion was reached before the session was finished.
    pub completed: bool,
}

impl PlaybackReport {
    /// Duration of the audio handed to the output.
    pub fn played(&self) -> Duration {
        let frames = self.samples_played / self.spec.channels.get() as u64;
        units_to_duration(frames, self.spec.sample_rate)
    }
}

/// State shared by the producer, the bridge and the session.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub(crate) started: AtomicBool,
    pub(crate) producer_done: AtomicBool,
    /// Asks the producer to exit.
    pub(crate) stop: AtomicBool,
    pub(crate) decoded_bytes: AtomicU64,
    pub(crate) samples_played: AtomicU64,
    pub(crate) underruns: AtomicU64,
}

/// A running playback of one stream.
///
/// Dropping a session without calling [`finish`](Self::finish) tears it down the same way but
/// discards the outcome.
pub struct Session {
    source: Arc<dyn DecodedSource>,
    format: Format,
    spec: StreamSpec,
    total_bytes: Option<u64>,
    bytes_read: ByteCount,
    shared: Arc<Shared>,
    completion: Arc<CompletionSignal>,
    producer: Option<JoinHandle<Result<(), DecoderError>>>,
    timer: Option<EstimatedTimer>,
}

impl Session {
    /// Opens `source` and starts decoding it.
    ///
    /// The first decoded chunk is read on the calling thread to learn the stream parameters;
    /// the rest is decoded on a producer thread. `total_bytes` is the expected size of
    /// `source`, used for progress and for [`Completion::Estimated`].
    ///
    /// Hand the returned [`PlaybackBridge`] to the output.
    pub fn start<R>(
        registry: &DecoderRegistry,
        source: R,
        total_bytes: Option<u64>,
        config: &PlaybackConfig,
    ) -> Result<(Self, PlaybackBridge), PlayError>
    where
        R: Read + Send + 'static,
    {
        let reader = CountingReader::new(source);
        let bytes_read = reader.counter();
        let source: Arc<dyn DecodedSource> =
            Arc::from(dispatch::open(registry, reader, &config.decoder)?);

        let mut preroll = vec![0u8; config.chunk_len];
        let len = read_first_chunk(&*source, &mut preroll)?;
        preroll.truncate(len);
        let spec = source.spec().ok_or(PlayError::UnknownStreamSpec)?;

        let shared = Arc::new(Shared::default());
        shared.decoded_bytes.store(len as u64, Ordering::Relaxed);
        let completion = Arc::new(CompletionSignal::new());

        let mut session = Session {
            format: source.format(),
            source,
            spec,
            total_bytes,
            bytes_read,
            shared,
            completion,
            producer: None,
            timer: None,
        };

        let trigger = match (config.completion, total_bytes) {
            (Completion::Estimated { bytes_per_second }, Some(total)) => {
                let wait =
                    estimate_playback_duration(total, bytes_per_second) + config.completion_margin;
                let timer = EstimatedTimer::spawn(wait, session.completion.clone())
                    .map_err(|err| PlayError::Spawn(Arc::new(err)))?;
                let arm = timer.arming();
                session.timer = Some(timer);
                Trigger::Estimated(arm)
            }
            (Completion::Estimated { .. }, None) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("no total size known, completing when drained");
                Trigger::Drained
            }
            (Completion::Drained, _) => Trigger::Drained,
        };

        let capacity = (config.queue_duration.as_secs_f64() * spec.samples_per_second() as f64)
            as usize;
        let (queue_in, queue_out) =
            rtrb::RingBuffer::new(capacity.max(config.chunk_len / SAMPLE_WIDTH).max(1));

        let producer = Producer {
            source: session.source.clone(),
            queue: queue_in,
            shared: session.shared.clone(),
            completion: session.completion.clone(),
            chunk_len: config.chunk_len,
            backoff: config.producer_backoff,
            preroll,
        };
        session.producer = Some(
            producer
                .spawn()
                .map_err(|err| PlayError::Spawn(Arc::new(err)))?,
        );

        let bridge = PlaybackBridge::new(
            queue_out,
            spec,
            session.shared.clone(),
            session.completion.clone(),
            trigger,
        );
        Ok((session, bridge))
    }

    /// Format of the stream being played.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Parameters of the samples the bridge delivers.
    pub fn spec(&self) -> StreamSpec {
        self.spec
    }

    /// Encoded bytes read from the source so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.get()
    }

    /// Fraction of the expected bytes read so far, if the total size is known.
    pub fn progress(&self) -> Option<f32> {
        self.bytes_read.progress(self.total_bytes?)
    }

    /// The signal resolved when playback completes.
    pub fn completion(&self) -> &CompletionSignal {
        &self.completion
    }

    /// Blocks until playback completes.
    pub fn wait(&self) {
        self.completion.wait();
    }

    /// Stops decoding, releases the decoder and reports on the session.
    ///
    /// # Errors
    ///
    /// The decode or upstream error that stopped the producer, or
    /// [`PlayError::ProducerPanicked`].
    pub fn finish(mut self) -> Result<PlaybackReport, PlayError> {
        let completed = self.completion.is_resolved();
        match self.teardown() {
            Some(Err(_)) => return Err(PlayError::ProducerPanicked),
            Some(Ok(Err(err))) => return Err(err.into()),
            Some(Ok(Ok(()))) | None => {}
        }

        Ok(PlaybackReport {
            format: self.format,
            spec: self.spec,
            bytes_read: self.bytes_read.get(),
            total_bytes: self.total_bytes,
            decoded_bytes: self.shared.decoded_bytes.load(Ordering::Relaxed),
            samples_played: self.shared.samples_played.load(Ordering::Relaxed),
            underruns: self.shared.underruns.load(Ordering::Relaxed),
            started: self.shared.started.load(Ordering::Relaxed),
            completed,
        })
    }

    fn teardown(&mut self) -> Option<std::thread::Result<Result<(), DecoderError>>> {
        self.shared.stop.store(true, Ordering::Relaxed);
        // Wakes waiters and a counting-down timer
        self.completion.resolve();
        self.source.close();
        let outcome = self.producer.take().map(JoinHandle::join);
        if let Some(mut timer) = self.timer.take() {
            timer.shutdown();
        }
        outcome
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("format", &self.format)
            .field("spec", &self.spec)
            .field("bytes_read", &self.bytes_read.get())
            .field("total_bytes", &self.total_bytes)
            .finish_non_exhaustive()
    }
}

fn read_first_chunk(source: &dyn DecodedSource, buf: &mut [u8]) -> Result<usize, PlayError> {
    loop {
        let pull = source.read(buf)?;
        if pull.len > 0 {
            return Ok(pull.len);
        }
        if pull.is_end() {
            return Err(PlayError::EmptyStream);
        }
    }
}

/// Plays streams on the default output device.
#[cfg(feature = "playback")]
#[derive(Debug, Clone)]
pub struct Player {
    registry: DecoderRegistry,
    config: PlaybackConfig,
}

#[cfg(feature = "playback")]
impl Player {
    /// Creates a player decoding with `registry` and the default configuration.
    pub fn new(registry: DecoderRegistry) -> Self {
        Self {
            registry,
            config: PlaybackConfig::default(),
        }
    }

    /// Replaces the playback configuration.
    pub fn with_config(mut self, config: PlaybackConfig) -> Self {
        self.config = config;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Decodes `source` and plays it, blocking until playback completes.
    ///
    /// Every failure is returned; nothing started by this call outlives it.
    pub fn play<R>(&self, source: R, total_bytes: Option<u64>) -> Result<PlaybackReport, PlayError>
    where
        R: Read + Send + 'static,
    {
        let (session, bridge) = Session::start(&self.registry, source, total_bytes, &self.config)?;
        let stream = open_output(bridge, self.config.buffer_frames)?;
        session.wait();
        drop(stream);
        session.finish()
    }
}
