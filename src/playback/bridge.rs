use std::sync::atomic::Ordering;
use std::sync::Arc;

use dasp_sample::{FromSample, Sample as DaspSample};

use super::completion::{CompletionSignal, TimerArm};
use super::Shared;
use crate::common::{Sample, StreamSpec};

/// How the bridge decides that playback is complete.
#[derive(Debug)]
pub(crate) enum Trigger {
    /// Resolve once the producer finished and the queue ran dry.
    Drained,
    /// Arm the timer on the first fill; the timer resolves.
    Estimated(TimerArm),
}

/// The real-time end of a playback session.
///
/// Hand this to the audio engine's data callback. [`fill`](Self::fill) only pops from a
/// lock-free queue that a producer thread keeps topped up, so it returns promptly no matter
/// what the network or the decoder are doing.
pub struct PlaybackBridge {
    queue: rtrb::Consumer<Sample>,
    spec: StreamSpec,
    shared: Arc<Shared>,
    completion: Arc<CompletionSignal>,
    trigger: Trigger,
    started: bool,
}

impl PlaybackBridge {
    pub(crate) fn new(
        queue: rtrb::Consumer<Sample>,
        spec: StreamSpec,
        shared: Arc<Shared>,
        completion: Arc<CompletionSignal>,
        trigger: Trigger,
    ) -> Self {
        Self {
            queue,
            spec,
            shared,
            completion,
            trigger,
            started: false,
        }
    }

    /// Fills `out` with interleaved samples, converted to the device's sample type.
    ///
    /// Slots the queue cannot cover are filled with silence. Never blocks.
    pub fn fill<T>(&mut self, out: &mut [T])
    where
        T: DaspSample + FromSample<Sample>,
    {
        if !self.started {
            self.started = true;
            self.shared.started.store(true, Ordering::Relaxed);
            if let Trigger::Estimated(arm) = &self.trigger {
                arm.arm();
            }
        }

        // Load before looking at the queue: once `producer_done` is seen, every sample the
        // producer pushed is visible.
        let producer_done = self.shared.producer_done.load(Ordering::Acquire);

        let available = self.queue.slots().min(out.len());
        let written = match self.queue.read_chunk(available) {
            Ok(chunk) => {
                let (first, second) = chunk.as_slices();
                for (slot, sample) in out.iter_mut().zip(first.iter().chain(second)) {
                    *slot = T::from_sample(*sample);
                }
                chunk.commit_all();
                available
            }
            Err(_) => 0,
        };
        for slot in &mut out[written..] {
            *slot = T::EQUILIBRIUM;
        }

        self.shared
            .samples_played
            .fetch_add(written as u64, Ordering::Relaxed);
        if written < out.len() && !producer_done {
            self.shared.underruns.fetch_add(1, Ordering::Relaxed);
        }

        if matches!(self.trigger, Trigger::Drained) && producer_done && self.queue.is_empty() {
            self.completion.resolve();
        }
    }

    /// Parameters of the samples this bridge delivers.
    pub fn spec(&self) -> StreamSpec {
        self.spec
    }

    /// Whether [`fill`](Self::fill) has been called at least once.
    pub fn is_started(&self) -> bool {
        self.started
    }
}

impl std::fmt::Debug for PlaybackBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackBridge")
            .field("spec", &self.spec)
            .field("queued", &self.queue.slots())
            .field("started", &self.started)
            .finish()
    }
}
