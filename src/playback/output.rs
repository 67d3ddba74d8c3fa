use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::PlaybackBridge;
use crate::common::assert_error_traits;

/// Error opening or starting the output device.
#[derive(Debug, thiserror::Error, Clone)]
pub enum OutputError {
    /// No output device is available on the system.
    #[error("There is no output device")]
    NoDevice,
    /// Failed to get the default output configuration for the device.
    #[error("Could not get default output configuration for output device: '{device_name}'")]
    DefaultConfig {
        /// What the device reported.
        #[source]
        source: Arc<cpal::DefaultStreamConfigError>,
        /// Name of the device, `"unknown"` if it has none.
        device_name: String,
    },
    /// The device refused to build a stream with the requested parameters.
    #[error("Could not build output stream")]
    BuildStream(#[source] Arc<cpal::BuildStreamError>),
    /// The stream was built but could not be started.
    #[error("Could not start output stream")]
    PlayStream(#[source] Arc<cpal::PlayStreamError>),
    /// The device only accepts a sample format this crate does not convert to.
    #[error("The device sample format {0:?} is not supported")]
    UnsupportedSampleFormat(cpal::SampleFormat),
}
assert_error_traits!(OutputError);

/// A running device stream. Playback stops when this is dropped.
pub struct OutputStream {
    _stream: cpal::Stream,
}

fn default_error_callback(err: cpal::StreamError) {
    #[cfg(feature = "tracing")]
    tracing::error!("audio stream error: {err}");
    #[cfg(not(feature = "tracing"))]
    eprintln!("audio stream error: {err}");
}

/// Opens the default output device at the bridge's sample rate and channel count and starts
/// pulling samples from `bridge`.
///
/// `buffer_frames` requests a fixed device buffer size; `None` keeps the device default.
pub fn open_output(
    mut bridge: PlaybackBridge,
    buffer_frames: Option<u32>,
) -> Result<OutputStream, OutputError> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or(OutputError::NoDevice)?;
    let default_config =
        device
            .default_output_config()
            .map_err(|source| OutputError::DefaultConfig {
                source: Arc::new(source),
                device_name: device.name().unwrap_or_else(|_| "unknown".to_string()),
            })?;

    let spec = bridge.spec();
    let config = cpal::StreamConfig {
        channels: spec.channels.get(),
        sample_rate: cpal::SampleRate(spec.sample_rate.get()),
        buffer_size: match buffer_frames {
            Some(frames) => cpal::BufferSize::Fixed(frames),
            None => cpal::BufferSize::Default,
        },
    };

    macro_rules! build_output_streams {
        ($($sample_format:tt, $generic:ty);+) => {
            match default_config.sample_format() {
                $(
                    cpal::SampleFormat::$sample_format => device.build_output_stream::<$generic, _, _>(
                        &config,
                        move |data, _| bridge.fill(data),
                        default_error_callback,
                        None,
                    ),
                )+
                other => return Err(OutputError::UnsupportedSampleFormat(other)),
            }
        };
    }

    let stream = build_output_streams!(
        F32, f32;
        F64, f64;
        I8, i8;
        I16, i16;
        I32, i32;
        I64, i64;
        U8, u8;
        U16, u16;
        U32, u32;
        U64, u64
    )
    .map_err(|err| OutputError::BuildStream(Arc::new(err)))?;
    stream
        .play()
        .map_err(|err| OutputError::PlayStream(Arc::new(err)))?;

    Ok(OutputStream { _stream: stream })
}
