#![allow(dead_code)]
/// in separate folder so its not ran as integration test
use std::collections::VecDeque;
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use audiopipe::decoder::{
    ByteStream, DecodedSource, DecoderError, FrameEngine, FramedSource, Settings,
};
use audiopipe::{Format, SampleRate, StreamSpec, MONO};

/// Header of an MPEG-1 Layer III frame: 128 kbit/s, 44.1 kHz, stereo, no CRC.
pub const MP3_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x00];

/// Length of a frame with [`MP3_HEADER`] and no padding.
pub const MP3_FRAME_LEN: usize = 417;

/// `count` frames of silence. The side information is all zero, so every frame decodes to
/// 1152 zero samples per channel.
pub fn silent_mp3(count: usize) -> Vec<u8> {
    let mut frame = vec![0u8; MP3_FRAME_LEN];
    frame[..4].copy_from_slice(&MP3_HEADER);
    frame.repeat(count)
}

/// A FLAC stream of one 16 bit mono frame at 44.1 kHz, holding `samples` verbatim.
pub fn flac_stream(samples: &[i16]) -> Vec<u8> {
    flac_blocks(&[samples])
}

/// A FLAC stream of 16 bit mono frames at 44.1 kHz, one per block, each holding its samples
/// verbatim.
///
/// The STREAMINFO block is followed by a PADDING block, so the stream starts with the bytes
/// the sniffer looks for.
pub fn flac_blocks(blocks: &[&[i16]]) -> Vec<u8> {
    assert!(!blocks.is_empty() && blocks.len() < 128);
    assert!(blocks.iter().all(|block| (16..=256).contains(&block.len())));
    let min_block = blocks.iter().map(|block| block.len()).min().unwrap() as u16;
    let max_block = blocks.iter().map(|block| block.len()).max().unwrap() as u16;
    let total: u64 = blocks.iter().map(|block| block.len() as u64).sum();

    let mut out = b"fLaC".to_vec();

    // STREAMINFO, not last
    out.push(0x00);
    out.extend_from_slice(&[0x00, 0x00, 34]);
    out.extend_from_slice(&min_block.to_be_bytes());
    out.extend_from_slice(&max_block.to_be_bytes());
    out.extend_from_slice(&[0; 3]);
    out.extend_from_slice(&[0; 3]);
    let packed: u64 = (44_100u64 << 44) | (15 << 36) | total;
    out.extend_from_slice(&packed.to_be_bytes());
    out.extend_from_slice(&[0; 16]);

    // PADDING, last
    out.push(0x81);
    out.extend_from_slice(&[0x00, 0x00, 4]);
    out.extend_from_slice(&[0; 4]);

    for (number, block) in blocks.iter().enumerate() {
        let frame_start = out.len();
        out.extend_from_slice(&[0xFF, 0xF8]);
        // 8 bit block size at end of header, sample rate from STREAMINFO
        out.push(0x60);
        // mono, 16 bit
        out.push(0x08);
        // frame number, a single byte below 128
        out.push(number as u8);
        out.push((block.len() - 1) as u8);
        let crc = crc8(&out[frame_start..]);
        out.push(crc);

        // verbatim subframe
        out.push(0x02);
        for sample in block.iter() {
            out.extend_from_slice(&sample.to_be_bytes());
        }
        let crc = crc16(&out[frame_start..]);
        out.extend_from_slice(&crc.to_be_bytes());
    }
    out
}

fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x07
            } else {
                crc << 1
            };
        }
    }
    crc
}

fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0u16;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x8005
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Counts how many times values holding a clone of it were dropped.
#[derive(Debug, Clone, Default)]
pub struct DropCounter(Arc<AtomicUsize>);

impl DropCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// A [`FrameEngine`] that replays fixed frames.
pub struct ScriptedFrames {
    frames: VecDeque<Result<Vec<u8>, DecoderError>>,
    spec: Option<StreamSpec>,
    drops: DropCounter,
}

impl ScriptedFrames {
    pub fn new(frames: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self {
            frames: frames.into_iter().map(Ok).collect(),
            spec: None,
            drops: DropCounter::default(),
        }
    }

    /// Fails with `err` after the frames given so far.
    pub fn then_fail(mut self, err: DecoderError) -> Self {
        self.frames.push_back(Err(err));
        self
    }

    pub fn with_spec(mut self, spec: StreamSpec) -> Self {
        self.spec = Some(spec);
        self
    }

    pub fn drops(&self) -> DropCounter {
        self.drops.clone()
    }
}

impl FrameEngine for ScriptedFrames {
    fn next_frame(&mut self, out: &mut Vec<u8>) -> Result<bool, DecoderError> {
        match self.frames.pop_front() {
            Some(Ok(frame)) => {
                out.extend_from_slice(&frame);
                Ok(true)
            }
            Some(Err(err)) => Err(err),
            None => Ok(false),
        }
    }

    fn spec(&self) -> Option<StreamSpec> {
        self.spec
    }
}

impl Drop for ScriptedFrames {
    fn drop(&mut self) {
        self.drops.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// A [`FrameEngine`] serving the raw bytes of a stream, 7 bytes at a time.
pub struct RawFrames {
    stream: ByteStream,
    skip: usize,
    spec: Option<StreamSpec>,
}

impl FrameEngine for RawFrames {
    fn next_frame(&mut self, out: &mut Vec<u8>) -> Result<bool, DecoderError> {
        let mut buf = [0u8; 7];
        loop {
            let n = self.stream.read(&mut buf)?;
            if n == 0 {
                return Ok(false);
            }
            let skipped = n.min(self.skip);
            self.skip -= skipped;
            if skipped < n {
                out.extend_from_slice(&buf[skipped..n]);
                return Ok(true);
            }
        }
    }

    fn spec(&self) -> Option<StreamSpec> {
        self.spec
    }
}

/// Constructor that hands back the stream it is given, undecoded.
pub fn passthrough(
    stream: ByteStream,
    _settings: &Settings,
) -> Result<Box<dyn DecodedSource>, DecoderError> {
    let engine = RawFrames {
        stream,
        skip: 0,
        spec: None,
    };
    Ok(Box::new(FramedSource::new(Format::Mp3, engine)))
}

/// Sample rate of [`pcm_after_header`] streams.
pub const PCM_RATE: u32 = 1000;

/// Constructor for streams made of [`MP3_HEADER`] followed by raw little-endian `f32` mono
/// samples at [`PCM_RATE`].
pub fn pcm_after_header(
    stream: ByteStream,
    _settings: &Settings,
) -> Result<Box<dyn DecodedSource>, DecoderError> {
    let engine = RawFrames {
        stream,
        skip: MP3_HEADER.len(),
        spec: Some(pcm_spec()),
    };
    Ok(Box::new(FramedSource::new(Format::Mp3, engine)))
}

pub fn pcm_spec() -> StreamSpec {
    StreamSpec {
        sample_rate: SampleRate::new(PCM_RATE).unwrap(),
        channels: MONO,
    }
}

/// A stream for [`pcm_after_header`] carrying `samples`.
pub fn pcm_stream(samples: &[f32]) -> Vec<u8> {
    let mut out = MP3_HEADER.to_vec();
    out.extend(samples.iter().flat_map(|s| s.to_le_bytes()));
    out
}

/// A byte source whose unread remainder can be inspected after it was handed away.
#[derive(Clone)]
pub struct SharedReader {
    data: Arc<Mutex<VecDeque<u8>>>,
}

impl SharedReader {
    pub fn new(data: impl IntoIterator<Item = u8>) -> Self {
        Self {
            data: Arc::new(Mutex::new(data.into_iter().collect())),
        }
    }

    pub fn remaining(&self) -> usize {
        self.data.lock().unwrap().len()
    }
}

impl Read for SharedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.data.lock().unwrap().read(buf)
    }
}

/// Reads `source` to its end in reads of `read_len` bytes.
pub fn drain(source: &dyn DecodedSource, read_len: usize) -> Result<Vec<u8>, DecoderError> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; read_len];
    loop {
        let pull = source.read(&mut buf)?;
        out.extend_from_slice(&buf[..pull.len]);
        if pull.is_end() {
            return Ok(out);
        }
    }
}

/// Decodes little-endian `f32` bytes.
pub fn samples(bytes: &[u8]) -> Vec<f32> {
    assert_eq!(bytes.len() % 4, 0);
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}
