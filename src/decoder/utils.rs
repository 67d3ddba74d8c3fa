//! Helpers shared by the decoder backends.

use crate::common::{ChannelCount, Sample};

/// Appends interleaved `frames` to `out` as little-endian `f32`, converting the channel
/// layout from `from` to `to` channels.
///
/// - to mono: the channels of each frame are averaged;
/// - mono to more channels: the single channel is duplicated;
/// - otherwise channels are mapped by index, missing ones repeat the last source channel.
///
/// A trailing partial frame is ignored.
pub(crate) fn append_remixed<I>(out: &mut Vec<u8>, frames: I, from: ChannelCount, to: ChannelCount)
where
    I: IntoIterator<Item = Sample>,
{
    let from = from.get() as usize;
    let to = to.get() as usize;
    let mut frame = Vec::with_capacity(from);

    for sample in frames {
        frame.push(sample);
        if frame.len() < from {
            continue;
        }
        if to == 1 {
            let mixed = frame.iter().sum::<Sample>() / from as Sample;
            out.extend_from_slice(&mixed.to_le_bytes());
        } else {
            for channel in 0..to {
                let sample = frame[channel.min(from - 1)];
                out.extend_from_slice(&sample.to_le_bytes());
            }
        }
        frame.clear();
    }
}
