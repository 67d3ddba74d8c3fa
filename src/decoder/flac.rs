//! FLAC decoding using the `claxon` library.
//!
//! FLAC audio is organised in blocks of channel-major samples. [`FlacEngine`] decodes one
//! block per [`FrameEngine::next_frame`] call, interleaves it, converts it to `f32` according
//! to the stream's bit depth and remixes it to the configured channel count. The byte-exact
//! delivery to callers is handled by [`FramedSource`].

use std::mem;

use claxon::{FlacReader, FlacReaderOptions};
use dasp_sample::Sample as _;
use dasp_sample::I24;

use super::utils::append_remixed;
use super::{ByteStream, DecodedSource, DecoderError, FrameEngine, FramedSource, Settings};
use crate::common::{ChannelCount, Sample, SampleRate, StreamSpec};
use crate::format::Format;

/// Only the STREAMINFO block is needed for playback.
const READER_OPTIONS: FlacReaderOptions = FlacReaderOptions {
    metadata_only: false,
    read_vorbis_comment: false,
};

/// Registers the FLAC backend.
pub fn register(registry: &mut super::DecoderRegistry) {
    registry.register(Format::Flac, open);
}

fn open(stream: ByteStream, settings: &Settings) -> Result<Box<dyn DecodedSource>, DecoderError> {
    let engine = FlacEngine::new(stream, settings)?;
    Ok(Box::new(FramedSource::new(Format::Flac, engine)))
}

/// [`FrameEngine`] decoding FLAC blocks.
pub struct FlacEngine {
    reader: FlacReader<ByteStream>,
    /// Reused across blocks to avoid reallocating.
    block: Vec<i32>,
    bits_per_sample: u32,
    source_channels: ChannelCount,
    spec: StreamSpec,
    total_frames: Option<u64>,
}

impl FlacEngine {
    /// Parses the stream header and prepares block decoding.
    ///
    /// # Errors
    ///
    /// [`DecoderError::ConstructionFailed`] if the header is not valid FLAC or describes a
    /// stream without channels or with a zero sample rate.
    pub fn new(stream: ByteStream, settings: &Settings) -> Result<Self, DecoderError> {
        let reader = FlacReader::new_ext(stream, READER_OPTIONS).map_err(construction)?;

        let info = reader.streaminfo();
        let sample_rate = SampleRate::new(info.sample_rate)
            .ok_or_else(|| construction("stream has a zero sample rate"))?;
        let source_channels = u16::try_from(info.channels)
            .ok()
            .and_then(ChannelCount::new)
            .ok_or_else(|| construction("stream has an invalid channel count"))?;

        Ok(Self {
            block: Vec::with_capacity(info.max_block_size as usize * info.channels as usize),
            bits_per_sample: info.bits_per_sample,
            source_channels,
            spec: StreamSpec {
                sample_rate,
                channels: settings.channels(),
            },
            total_frames: info.samples,
            reader,
        })
    }

    /// Bit depth of the encoded samples (8 to 32).
    pub fn bits_per_sample(&self) -> u32 {
        self.bits_per_sample
    }

    /// Number of inter-channel samples in the stream, when the header records it.
    pub fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }

    /// Channel count of the encoded stream, before remixing.
    pub fn source_channels(&self) -> ChannelCount {
        self.source_channels
    }

    fn to_float(&self, raw: i32) -> Sample {
        match self.bits_per_sample {
            8 => (raw as i8).to_sample(),
            16 => (raw as i16).to_sample(),
            24 => I24::new(raw).unwrap_or(I24::EQUILIBRIUM).to_sample(),
            32 => raw.to_sample(),
            // 12 and 20 bit samples have no sample type; widen them to 32 bits
            bits => (raw << (32 - bits)).to_sample(),
        }
    }
}

impl FrameEngine for FlacEngine {
    fn next_frame(&mut self, out: &mut Vec<u8>) -> Result<bool, DecoderError> {
        let buffer = mem::take(&mut self.block);
        let block = match self.reader.blocks().read_next_or_eof(buffer) {
            Ok(Some(block)) => block,
            Ok(None) => return Ok(false),
            Err(err) => return Err(DecoderError::Decode(err.to_string())),
        };

        let channels = block.channels();
        let Some(block_channels) = u16::try_from(channels).ok().and_then(ChannelCount::new) else {
            return Err(DecoderError::Decode("block without channels".to_owned()));
        };
        let interleaved = (0..block.duration())
            .flat_map(|frame| (0..channels).map(move |channel| (channel, frame)))
            .map(|(channel, frame)| self.to_float(block.sample(channel, frame)));
        append_remixed(out, interleaved, block_channels, self.spec.channels);

        self.block = block.into_buffer();
        Ok(true)
    }

    fn spec(&self) -> Option<StreamSpec> {
        Some(self.spec)
    }
}

fn construction(reason: impl ToString) -> DecoderError {
    DecoderError::ConstructionFailed {
        format: Format::Flac,
        reason: reason.to_string(),
    }
}
