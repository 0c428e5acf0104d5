//! HTTP transport seam
//!
//! The session driver only needs "GET this URL with these headers and give
//! me a status plus a byte stream". [`ReqwestTransport`] is the default;
//! tests plug in [`MockTransport`](crate::testing::MockTransport).

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::{Stream, StreamExt};
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Response body as a stream of byte chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Errors raised by a transport
#[derive(Error, Debug)]
pub enum TransportError {
    /// The transport's own deadline expired
    #[error("Request timed out")]
    Timeout,

    /// Connection could not be established
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Reading the body failed
    #[error("Body read failed: {0}")]
    Body(String),

    /// Request issued on a closed session
    #[error("Session closed")]
    Closed,

    /// Underlying HTTP client error
    #[error("HTTP client error: {0}")]
    Client(reqwest::Error),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            Self::Body(e.to_string())
        } else {
            Self::Client(e)
        }
    }
}

/// Status line and streaming body of a response
pub struct HttpResponse {
    pub status: u16,
    pub body: ByteStream,
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// One scoped HTTP session, owned by a single subscription
pub trait HttpSession: Send + Sync {
    /// Issue a GET request
    fn get(&self, url: Url, headers: HeaderMap)
        -> BoxFuture<'static, Result<HttpResponse, TransportError>>;

    /// Release the session and any connection it holds
    ///
    /// Requests issued afterwards fail with [`TransportError::Closed`].
    fn close(&self);
}

/// Factory for HTTP sessions
pub trait HttpTransport: Send + Sync {
    /// Open a session whose requests share the given overall timeout
    fn open_session(
        &self,
        timeout: Option<Duration>,
    ) -> Result<Arc<dyn HttpSession>, TransportError>;
}

/// Transport backed by `reqwest`
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport;

impl ReqwestTransport {
    /// Create a transport with no deadlines beyond the per-subscription timeout
    pub fn new() -> Self {
        Self
    }
}

impl HttpTransport for ReqwestTransport {
    fn open_session(
        &self,
        timeout: Option<Duration>,
    ) -> Result<Arc<dyn HttpSession>, TransportError> {
        // No default timeout: SSE streams are expected to stay open
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Arc::new(ReqwestSession {
            client: Mutex::new(Some(client)),
        }))
    }
}

struct ReqwestSession {
    client: Mutex<Option<Client>>,
}

impl HttpSession for ReqwestSession {
    fn get(
        &self,
        url: Url,
        headers: HeaderMap,
    ) -> BoxFuture<'static, Result<HttpResponse, TransportError>> {
        let client = self.client.lock().clone();

        Box::pin(async move {
            let client = client.ok_or(TransportError::Closed)?;
            let response = client.get(url).headers(headers).send().await?;
            let status = response.status().as_u16();
            let body = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(TransportError::from));

            Ok(HttpResponse {
                status,
                body: Box::pin(body),
            })
        })
    }

    fn close(&self) {
        if self.client.lock().take().is_some() {
            debug!("HTTP session closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_after_close_fails() {
        let session = ReqwestTransport::new().open_session(None).unwrap();
        session.close();
        session.close();

        let url = Url::parse("http://127.0.0.1:9/stream").unwrap();
        let result = session.get(url, HeaderMap::new()).await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }
}
