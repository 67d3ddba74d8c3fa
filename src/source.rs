//! Byte sources feeding the decoders.
//!
//! Any [`std::io::Read`] + [`Send`] value is a byte source. This module adds the ones a
//! streaming player needs: a [`CountingReader`] to follow transfer progress and, with the
//! `http` feature, an [`HttpStream`] over a response body.

mod counting;
#[cfg(feature = "http")]
mod http;

pub use counting::{ByteCount, CountingReader};
#[cfg(feature = "http")]
pub use http::{HttpError, HttpStream};
