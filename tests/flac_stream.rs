#![cfg(feature = "flac")]

mod test_support;

use std::io::Cursor;

use approx::assert_abs_diff_eq;
use audiopipe::decoder::flac::FlacEngine;
use audiopipe::decoder::{dispatch, DecoderError, DecoderRegistry, FrameEngine, Settings};
use audiopipe::{Format, SampleRate, MONO, STEREO};

use test_support::{drain, flac_blocks, flac_stream, samples};

const SAMPLES: [i16; 16] = [
    0, 1000, -1000, 16384, -16384, 32767, -32768, 1, -1, 200, 300, -400, 500, -600, 700, 0,
];

fn expected() -> Vec<f32> {
    SAMPLES.iter().map(|&s| s as f32 / 32768.0).collect()
}

#[test]
fn decodes_verbatim_block_to_mono() {
    let registry = DecoderRegistry::with_default_decoders();
    let source = dispatch::open(
        &registry,
        Cursor::new(flac_stream(&SAMPLES)),
        &Settings::default().mono(),
    )
    .unwrap();

    assert_eq!(source.format(), Format::Flac);
    let spec = source.spec().unwrap();
    assert_eq!(spec.sample_rate, SampleRate::new(44_100).unwrap());
    assert_eq!(spec.channels, MONO);

    let decoded = samples(&drain(&*source, 7).unwrap());
    assert_eq!(decoded.len(), SAMPLES.len());
    for (got, want) in decoded.iter().zip(expected()) {
        assert_abs_diff_eq!(*got, want, epsilon = 1e-6);
    }
}

#[test]
fn mono_is_duplicated_to_stereo() {
    let registry = DecoderRegistry::with_default_decoders();
    let source = dispatch::open(
        &registry,
        Cursor::new(flac_stream(&SAMPLES)),
        &Settings::default(),
    )
    .unwrap();
    assert_eq!(source.spec().map(|spec| spec.channels), Some(STEREO));

    let decoded = samples(&drain(&*source, 4096).unwrap());
    assert_eq!(decoded.len(), SAMPLES.len() * 2);
    for (frame, want) in decoded.chunks_exact(2).zip(expected()) {
        assert_abs_diff_eq!(frame[0], want, epsilon = 1e-6);
        assert_abs_diff_eq!(frame[1], want, epsilon = 1e-6);
    }
}

#[test]
fn blocks_decode_back_to_back() {
    let second: Vec<i16> = (0..16).map(|i| i * 100 - 800).collect();
    let third: Vec<i16> = (0..16).map(|i| 2000 - i * 150).collect();
    let data = flac_blocks(&[&SAMPLES, &second, &third]);

    let registry = DecoderRegistry::with_default_decoders();
    let settings = Settings::default().mono();
    let source = dispatch::open(&registry, Cursor::new(data), &settings).unwrap();

    let want: Vec<f32> = SAMPLES
        .iter()
        .chain(&second)
        .chain(&third)
        .map(|&s| s as f32 / 32768.0)
        .collect();
    let decoded = samples(&drain(&*source, 10).unwrap());
    assert_eq!(decoded.len(), want.len());
    for (got, want) in decoded.iter().zip(want) {
        assert_abs_diff_eq!(*got, want, epsilon = 1e-6);
    }
}

#[test]
fn engine_reads_one_block_per_frame() {
    let second = [-5i16; 16];
    let data = flac_blocks(&[&SAMPLES, &second]);
    let mut engine =
        FlacEngine::new(Box::new(Cursor::new(data)), &Settings::default().mono()).unwrap();
    assert_eq!(engine.total_frames(), Some(32));

    let mut out = Vec::new();
    assert!(engine.next_frame(&mut out).unwrap());
    assert_eq!(samples(&out).len(), 16);
    out.clear();
    assert!(engine.next_frame(&mut out).unwrap());
    for got in samples(&out) {
        assert_abs_diff_eq!(got, -5.0 / 32768.0, epsilon = 1e-6);
    }
    out.clear();
    assert!(!engine.next_frame(&mut out).unwrap());
}

#[test]
fn engine_reports_stream_info() {
    let mut engine =
        FlacEngine::new(Box::new(Cursor::new(flac_stream(&SAMPLES))), &Settings::default())
            .unwrap();
    assert_eq!(engine.bits_per_sample(), 16);
    assert_eq!(engine.total_frames(), Some(SAMPLES.len() as u64));
    assert_eq!(engine.source_channels(), MONO);

    let mut out = Vec::new();
    assert!(engine.next_frame(&mut out).unwrap());
    assert_eq!(out.len(), SAMPLES.len() * 2 * 4);
    out.clear();
    assert!(!engine.next_frame(&mut out).unwrap());
    assert!(out.is_empty());
}

#[test]
fn corrupted_frame_is_a_decode_error() {
    let mut data = flac_stream(&SAMPLES);
    let last = data.len() - 1;
    // Breaks the frame checksum
    data[last] ^= 0xFF;

    let registry = DecoderRegistry::with_default_decoders();
    let source = dispatch::open(&registry, Cursor::new(data), &Settings::default()).unwrap();
    assert!(matches!(
        drain(&*source, 4096),
        Err(DecoderError::Decode(_))
    ));
}

#[test]
fn truncated_header_fails_construction() {
    let data = flac_stream(&SAMPLES)[..20].to_vec();
    let registry = DecoderRegistry::with_default_decoders();
    let result = dispatch::open(&registry, Cursor::new(data), &Settings::default());
    assert!(matches!(
        result,
        Err(DecoderError::ConstructionFailed {
            format: Format::Flac,
            ..
        })
    ));
}
