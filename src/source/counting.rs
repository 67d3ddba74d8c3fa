use std::io::{self, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Transparent [`Read`] wrapper that counts the bytes it has returned.
///
/// The count can be observed from other threads through a [`ByteCount`] handle, which stays
/// valid after the reader has been moved into a decoder.
///
/// ```
/// use std::io::Read;
/// use audiopipe::source::CountingReader;
///
/// let mut reader = CountingReader::new(&b"hello world"[..]);
/// let count = reader.counter();
///
/// let mut buf = [0u8; 5];
/// reader.read_exact(&mut buf).unwrap();
/// assert_eq!(count.get(), 5);
/// ```
#[derive(Debug)]
pub struct CountingReader<R> {
    inner: R,
    count: ByteCount,
}

impl<R> CountingReader<R> {
    /// Wraps `inner` with a counter starting at zero.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            count: ByteCount::default(),
        }
    }

    /// Bytes returned by `read` so far.
    pub fn count(&self) -> u64 {
        self.count.get()
    }

    /// A handle observing this reader's count.
    pub fn counter(&self) -> ByteCount {
        self.count.clone()
    }

    /// Returns the wrapped reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count.add(n as u64);
        Ok(n)
    }
}

/// Shared, monotonically increasing byte count.
#[derive(Debug, Clone, Default)]
pub struct ByteCount(Arc<AtomicU64>);

impl ByteCount {
    /// Current count.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Fraction of `total` consumed so far, clamped to `1.0`. `None` when `total` is zero.
    pub fn progress(&self, total: u64) -> Option<f32> {
        if total == 0 {
            return None;
        }
        Some((self.get() as f64 / total as f64).min(1.0) as f32)
    }

    fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_do_not_count() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            }
        }

        let mut reader = CountingReader::new(Failing);
        assert!(reader.read(&mut [0u8; 8]).is_err());
        assert_eq!(reader.count(), 0);
    }

    #[test]
    fn progress_is_clamped() {
        let mut reader = CountingReader::new(&[0u8; 10][..]);
        let count = reader.counter();
        assert_eq!(count.progress(0), None);
        std::io::copy(&mut reader, &mut std::io::sink()).unwrap();
        assert_eq!(count.progress(20), Some(0.5));
        assert_eq!(count.progress(5), Some(1.0));
    }
}
