use std::io::{self, Read};
use std::sync::Arc;

use reqwest::blocking::{Client, Response};

use crate::common::assert_error_traits;

/// Error opening an [`HttpStream`].
#[derive(Debug, thiserror::Error, Clone)]
pub enum HttpError {
    /// The request could not be sent or the response could not be read.
    #[error("Request to '{url}' failed")]
    Request {
        /// The requested URL.
        url: String,
        /// What went wrong.
        #[source]
        source: Arc<reqwest::Error>,
    },
    /// The server answered with a non-success status.
    #[error("Request to '{url}' returned status {status}")]
    Status {
        /// The requested URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },
}
assert_error_traits!(HttpError);

/// Body of a blocking HTTP GET, readable as a byte source.
///
/// The body is streamed, not buffered: bytes are pulled from the connection as the decoder
/// reads them.
pub struct HttpStream {
    inner: Response,
    content_length: Option<u64>,
}

impl HttpStream {
    /// Sends a GET request to `url` and returns the response body.
    pub fn get(url: &str) -> Result<Self, HttpError> {
        Self::get_with(&Client::new(), url)
    }

    /// Sends a GET request to `url` through `client`.
    pub fn get_with(client: &Client, url: &str) -> Result<Self, HttpError> {
        let inner = client.get(url).send().map_err(|source| HttpError::Request {
            url: url.to_owned(),
            source: Arc::new(source),
        })?;
        let status = inner.status();
        if !status.is_success() {
            return Err(HttpError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }
        Ok(Self::from(inner))
    }

    /// Size of the body announced by the `Content-Length` header.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }
}

impl From<Response> for HttpStream {
    fn from(inner: Response) -> Self {
        HttpStream {
            content_length: inner.content_length(),
            inner,
        }
    }
}

impl Read for HttpStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}
