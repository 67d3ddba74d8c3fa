//! The decoding side of a playback session.
//!
//! Runs on its own thread: reads decoded bytes, reassembles them into samples and pushes
//! those into the queue the [`PlaybackBridge`](super::PlaybackBridge) pops from. All
//! blocking work of a session (network reads, decoding, waiting for queue space) happens
//! here.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::completion::CompletionSignal;
use super::Shared;
use crate::common::{Sample, SAMPLE_WIDTH};
use crate::decoder::{DecodedSource, DecoderError};

/// Reassembles little-endian `f32` samples from byte chunks of arbitrary length.
#[derive(Debug, Default)]
pub(crate) struct SampleAssembler {
    carry: Vec<u8>,
}

impl SampleAssembler {
    /// Appends every sample completed by `bytes` to `out`. An incomplete trailing sample is
    /// kept for the next call.
    pub(crate) fn push(&mut self, bytes: &[u8], out: &mut Vec<Sample>) {
        self.carry.extend_from_slice(bytes);
        let whole = self.carry.len() / SAMPLE_WIDTH * SAMPLE_WIDTH;
        out.extend(
            self.carry[..whole]
                .chunks_exact(SAMPLE_WIDTH)
                .map(|b| Sample::from_le_bytes([b[0], b[1], b[2], b[3]])),
        );
        self.carry.drain(..whole);
    }

    /// Bytes of an incomplete sample still waiting for the rest.
    pub(crate) fn pending(&self) -> usize {
        self.carry.len()
    }
}

/// Raises `producer_done` however the producer exits.
struct DoneGuard(Arc<Shared>);

impl Drop for DoneGuard {
    fn drop(&mut self) {
        self.0.producer_done.store(true, Ordering::Release);
    }
}

pub(crate) struct Producer {
    pub(crate) source: Arc<dyn DecodedSource>,
    pub(crate) queue: rtrb::Producer<Sample>,
    pub(crate) shared: Arc<Shared>,
    pub(crate) completion: Arc<CompletionSignal>,
    pub(crate) chunk_len: usize,
    pub(crate) backoff: Duration,
    /// Bytes decoded before the thread started.
    pub(crate) preroll: Vec<u8>,
}

impl Producer {
    pub(crate) fn spawn(self) -> std::io::Result<thread::JoinHandle<Result<(), DecoderError>>> {
        thread::Builder::new()
            .name("audiopipe producer".to_string())
            .spawn(move || self.run())
    }

    fn run(mut self) -> Result<(), DecoderError> {
        let _done = DoneGuard(self.shared.clone());

        let mut assembler = SampleAssembler::default();
        let mut samples = Vec::new();
        assembler.push(&std::mem::take(&mut self.preroll), &mut samples);
        if !self.push_all(&samples) {
            return Ok(());
        }

        let mut chunk = vec![0u8; self.chunk_len];
        loop {
            let pull = match self.source.read(&mut chunk) {
                Ok(pull) => pull,
                Err(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!(error = %err, "decoding stopped");
                    // Nobody would otherwise resolve an estimated completion early
                    self.completion.resolve();
                    return Err(err);
                }
            };
            self.shared
                .decoded_bytes
                .fetch_add(pull.len as u64, Ordering::Relaxed);

            samples.clear();
            assembler.push(&chunk[..pull.len], &mut samples);
            if !self.push_all(&samples) || pull.is_end() {
                return Ok(());
            }
        }
    }

    /// Pushes `samples` into the queue, waiting for space. Returns `false` when the session is
    /// being torn down or the bridge is gone.
    fn push_all(&mut self, mut samples: &[Sample]) -> bool {
        while !samples.is_empty() {
            if self.shared.stop.load(Ordering::Relaxed) || self.queue.is_abandoned() {
                return false;
            }
            let n = self.queue.slots().min(samples.len());
            if n == 0 {
                thread::sleep(self.backoff);
                continue;
            }
            let Ok(chunk) = self.queue.write_chunk_uninit(n) else {
                continue;
            };
            let written = chunk.fill_from_iter(samples[..n].iter().copied());
            samples = &samples[written..];
        }
        true
    }
}
