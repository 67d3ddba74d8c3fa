use std::fmt;
use std::num::{NonZeroU16, NonZeroU32};
use std::time::Duration;

/// Stream sample rate (samples per second per channel).
pub type SampleRate = NonZeroU32;

/// Number of channels in a stream.
pub type ChannelCount = NonZeroU16;

/// Single channel layout.
pub const MONO: ChannelCount = ChannelCount::MIN;

/// Two channel layout.
pub const STEREO: ChannelCount = ChannelCount::MIN.saturating_add(1);

/// Represents value of a single sample.
/// Decoded PCM is always carried as 32-bit float.
pub type Sample = f32;

/// Width in bytes of one encoded [`Sample`] in a decoded byte stream.
pub const SAMPLE_WIDTH: usize = std::mem::size_of::<Sample>();

/// Parameters of a decoded PCM stream.
///
/// Samples are interleaved little-endian `f32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamSpec {
    /// Frames per second.
    pub sample_rate: SampleRate,
    /// Interleaved channels per frame.
    pub channels: ChannelCount,
}

impl StreamSpec {
    /// Number of samples (across all channels) that make up one second of audio.
    pub fn samples_per_second(&self) -> u64 {
        self.sample_rate.get() as u64 * self.channels.get() as u64
    }
}

impl fmt::Display for StreamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz, {} ch, f32le", self.sample_rate, self.channels)
    }
}

/// Converts a count of `units` consumed at `rate` units per second into a duration,
/// without going through floating point.
pub(crate) fn units_to_duration(units: u64, rate: NonZeroU32) -> Duration {
    let rate = rate.get() as u64;
    let secs = units / rate;
    let nanos = ((units % rate) * 1_000_000_000) / rate;
    Duration::new(secs, nanos as u32)
}

macro_rules! assert_error_traits {
    ($to_test:path) => {
        const _: () = { $crate::common::check_error_traits::<$to_test>() };
    };
}

pub(crate) use assert_error_traits;
#[allow(dead_code)]
pub(crate) const fn check_error_traits<T: Sync + Send + Clone + std::error::Error + 'static>() {}
