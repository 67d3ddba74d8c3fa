//! Byte-exact pull adapter over frame-oriented decoders.
//!
//! Native decoders produce output one frame (or block) at a time, and frame sizes have
//! nothing to do with the buffer a caller passes to [`DecodedSource::read`]. The
//! [`FramedSource`] keeps the part of a frame that did not fit and serves it on the next
//! read before asking the engine for anything new.

use std::sync::{Mutex, MutexGuard};

use super::{DecodedSource, DecoderError, Pull};
use crate::common::StreamSpec;
use crate::format::Format;

/// A native decoder that yields decoded PCM one frame at a time.
pub trait FrameEngine: Send {
    /// Appends the next frame of interleaved little-endian `f32` PCM to `out`.
    ///
    /// Returns `Ok(false)` once the stream is exhausted. A frame may be empty.
    fn next_frame(&mut self, out: &mut Vec<u8>) -> Result<bool, DecoderError>;

    /// Output parameters, if known.
    fn spec(&self) -> Option<StreamSpec>;
}

/// Decoded bytes that did not fit into the caller's buffer.
#[derive(Debug, Default)]
pub(crate) struct Leftover {
    bytes: Vec<u8>,
    cursor: usize,
}

impl Leftover {
    pub(crate) fn is_empty(&self) -> bool {
        self.cursor >= self.bytes.len()
    }

    /// Copies as much as fits into `buf` and returns the number of bytes copied.
    pub(crate) fn drain_into(&mut self, buf: &mut [u8]) -> usize {
        let pending = &self.bytes[self.cursor..];
        let n = pending.len().min(buf.len());
        buf[..n].copy_from_slice(&pending[..n]);
        self.cursor += n;
        if self.is_empty() {
            self.clear();
        }
        n
    }

    /// Buffer the next frame is decoded into. Only valid while the leftover is empty.
    pub(crate) fn refill(&mut self) -> &mut Vec<u8> {
        debug_assert!(self.is_empty(), "leftover must be drained before refilling");
        self.clear();
        &mut self.bytes
    }

    fn clear(&mut self) {
        self.bytes.clear();
        self.cursor = 0;
    }
}

struct Open<E> {
    engine: E,
    leftover: Leftover,
    finished: bool,
}

/// [`DecodedSource`] over a [`FrameEngine`].
///
/// The engine is dropped exactly once: on [`close`](DecodedSource::close), or together with
/// the adapter if it was never closed.
pub struct FramedSource<E> {
    format: Format,
    // `None` once closed
    state: Mutex<Option<Open<E>>>,
    spec: Mutex<Option<StreamSpec>>,
}

impl<E: FrameEngine> FramedSource<E> {
    /// Wraps `engine`, which decodes a stream of the given `format`.
    pub fn new(format: Format, engine: E) -> Self {
        let spec = engine.spec();
        Self {
            format,
            state: Mutex::new(Some(Open {
                engine,
                leftover: Leftover::default(),
                finished: false,
            })),
            spec: Mutex::new(spec),
        }
    }

    /// Whether [`close`](DecodedSource::close) has been called.
    pub fn is_closed(&self) -> bool {
        lock(&self.state).is_none()
    }
}

impl<E: FrameEngine> DecodedSource for FramedSource<E> {
    fn read(&self, buf: &mut [u8]) -> Result<Pull, DecoderError> {
        let mut guard = lock(&self.state);
        let Some(open) = guard.as_mut() else {
            return Ok(Pull::end());
        };

        if buf.is_empty() {
            return Ok(Pull::data(0));
        }
        if !open.leftover.is_empty() {
            return Ok(Pull::data(open.leftover.drain_into(buf)));
        }
        if open.finished {
            return Ok(Pull::end());
        }

        loop {
            match open.engine.next_frame(open.leftover.refill()) {
                Ok(true) if open.leftover.is_empty() => continue,
                Ok(true) => break,
                Ok(false) => {
                    open.finished = true;
                    return Ok(Pull::end());
                }
                Err(err) => {
                    // Errors are terminal for the stream
                    open.finished = true;
                    return Err(err);
                }
            }
        }

        if let Some(spec) = open.engine.spec() {
            *lock(&self.spec) = Some(spec);
        }
        Ok(Pull::data(open.leftover.drain_into(buf)))
    }

    fn close(&self) {
        // Dropping the taken state releases the engine
        drop(lock(&self.state).take());
    }

    fn format(&self) -> Format {
        self.format
    }

    fn spec(&self) -> Option<StreamSpec> {
        *lock(&self.spec)
    }
}

/// Locks `mutex`, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
