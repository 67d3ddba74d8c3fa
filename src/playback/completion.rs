//! One-shot completion of a playback session.
//!
//! Playback is complete either when every decoded sample has been handed to the device
//! ([`Completion::Drained`](super::Completion::Drained)) or when an estimated duration derived
//! from the transfer size has elapsed
//! ([`Completion::Estimated`](super::Completion::Estimated)). The estimate is a crude upper
//! bound: it assumes a constant encoded byte rate and drifts with the real bit rate.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle, Thread};
use std::time::{Duration, Instant};

use crate::common::units_to_duration;
use crate::decoder::framed::lock;

/// Encoded byte rate assumed when estimating playback duration from a transfer size.
pub const ASSUMED_BYTES_PER_SECOND: NonZeroU32 = NonZeroU32::MIN.saturating_add(3999);

/// Added to the estimated duration before completion resolves.
pub const COMPLETION_MARGIN: Duration = Duration::from_secs(1);

/// Time it takes to play `total_bytes` of encoded audio at `bytes_per_second`.
///
/// ```
/// use std::time::Duration;
/// use audiopipe::playback::{estimate_playback_duration, ASSUMED_BYTES_PER_SECOND};
///
/// let estimate = estimate_playback_duration(400_000, ASSUMED_BYTES_PER_SECOND);
/// assert_eq!(estimate, Duration::from_secs(100));
/// ```
pub fn estimate_playback_duration(total_bytes: u64, bytes_per_second: NonZeroU32) -> Duration {
    units_to_duration(total_bytes, bytes_per_second)
}

/// A signal that is resolved at most once and can be waited on from any thread.
#[derive(Debug, Default)]
pub struct CompletionSignal {
    resolved: Mutex<bool>,
    cvar: Condvar,
    resolutions: AtomicUsize,
}

impl CompletionSignal {
    /// Creates an unresolved signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves the signal and wakes every waiter.
    ///
    /// Returns `true` if this call resolved it, `false` if it already was.
    pub fn resolve(&self) -> bool {
        let mut resolved = lock(&self.resolved);
        if *resolved {
            return false;
        }
        *resolved = true;
        self.resolutions.fetch_add(1, Ordering::Relaxed);
        self.cvar.notify_all();
        true
    }

    /// Whether the signal has been resolved.
    pub fn is_resolved(&self) -> bool {
        *lock(&self.resolved)
    }

    /// Number of calls to [`resolve`](Self::resolve) that resolved the signal. Never above one.
    pub fn resolutions(&self) -> usize {
        self.resolutions.load(Ordering::Relaxed)
    }

    /// Blocks until the signal is resolved.
    pub fn wait(&self) {
        let mut resolved = lock(&self.resolved);
        while !*resolved {
            resolved = self
                .cvar
                .wait(resolved)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Blocks until the signal is resolved or `timeout` has passed.
    ///
    /// Returns whether the signal is resolved.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut resolved = lock(&self.resolved);
        while !*resolved {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            resolved = self
                .cvar
                .wait_timeout(resolved, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
        true
    }
}

#[derive(Debug, Default)]
struct TimerFlags {
    armed: AtomicBool,
    cancelled: AtomicBool,
}

/// Handle to a parked timer thread that resolves a [`CompletionSignal`] a fixed time after
/// it is armed.
///
/// The thread is spawned up front so that arming, which happens on the real-time audio
/// callback, only flips a flag and unparks a thread.
#[derive(Debug)]
pub(crate) struct EstimatedTimer {
    arm: TimerArm,
    handle: Option<JoinHandle<()>>,
}

/// Arms an [`EstimatedTimer`] from another thread.
#[derive(Debug, Clone)]
pub(crate) struct TimerArm {
    thread: Thread,
    flags: Arc<TimerFlags>,
}

impl TimerArm {
    /// Starts the countdown. Only the first call has an effect.
    pub(crate) fn arm(&self) {
        if !self.flags.armed.swap(true, Ordering::AcqRel) {
            self.thread.unpark();
        }
    }
}

impl EstimatedTimer {
    pub(crate) fn spawn(
        wait: Duration,
        completion: Arc<CompletionSignal>,
    ) -> std::io::Result<Self> {
        let flags = Arc::new(TimerFlags::default());
        let handle = thread::Builder::new()
            .name("audiopipe completion timer".to_string())
            .spawn({
                let flags = flags.clone();
                move || {
                    while !flags.armed.load(Ordering::Acquire) {
                        if flags.cancelled.load(Ordering::Acquire) {
                            return;
                        }
                        thread::park();
                    }
                    #[cfg(feature = "tracing")]
                    tracing::info!(?wait, "estimated completion timer armed");
                    // Returns early when the session is torn down first
                    if !completion.wait_timeout(wait) {
                        completion.resolve();
                    }
                }
            })?;
        Ok(Self {
            arm: TimerArm {
                thread: handle.thread().clone(),
                flags,
            },
            handle: Some(handle),
        })
    }

    pub(crate) fn arming(&self) -> TimerArm {
        self.arm.clone()
    }

    /// Stops the timer thread and waits for it.
    ///
    /// An armed timer only exits once its completion signal is resolved or its wait is over.
    pub(crate) fn shutdown(&mut self) {
        self.arm.flags.cancelled.store(true, Ordering::Release);
        self.arm.thread.unpark();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_once() {
        let signal = CompletionSignal::new();
        assert!(signal.resolve());
        assert!(!signal.resolve());
        assert_eq!(signal.resolutions(), 1);
        assert!(signal.wait_timeout(Duration::ZERO));
    }

    #[test]
    fn unarmed_timer_shuts_down() {
        let completion = Arc::new(CompletionSignal::new());
        let mut timer =
            EstimatedTimer::spawn(Duration::from_millis(1), completion.clone()).unwrap();
        timer.shutdown();
        assert!(!completion.is_resolved());
    }

    #[test]
    fn armed_timer_resolves_after_wait() {
        let completion = Arc::new(CompletionSignal::new());
        let mut timer =
            EstimatedTimer::spawn(Duration::from_millis(20), completion.clone()).unwrap();
        let started = Instant::now();
        timer.arming().arm();
        timer.arming().arm();
        completion.wait();
        assert!(started.elapsed() >= Duration::from_millis(20));
        timer.shutdown();
        assert_eq!(completion.resolutions(), 1);
    }
}
