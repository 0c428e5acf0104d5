//! Test utilities for sse-client
//!
//! [`MockTransport`] scripts a response without touching the network and
//! counts session opens and closes. [`TestServer`] serves real SSE over HTTP
//! on an ephemeral port for end-to-end tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap as AxumHeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use tokio::net::TcpListener;
use url::Url;

use crate::transport::{HttpResponse, HttpSession, HttpTransport, TransportError};

#[derive(Debug, Clone)]
enum Chunk {
    Data(Bytes),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ending {
    Close,
    Stall,
}

#[derive(Debug)]
struct MockState {
    status: u16,
    chunks: Vec<Chunk>,
    ending: Ending,
    connect_error: Option<String>,
    stall_connect: bool,
    opened: AtomicUsize,
    closed: AtomicUsize,
    requests: Mutex<Vec<(Url, HeaderMap)>>,
}

/// Scripted in-memory transport
///
/// Every session it opens returns the same status and body. Cloning shares
/// the counters.
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    /// Respond with `status` and the whole body as one chunk
    pub fn new(status: u16, body: &str) -> Self {
        Self::from_chunks(status, [body.as_bytes()])
    }

    /// Respond with `status` and the body split into the given chunks
    pub fn from_chunks<'a>(status: u16, chunks: impl IntoIterator<Item = &'a [u8]>) -> Self {
        Self {
            state: Arc::new(MockState {
                status,
                chunks: chunks
                    .into_iter()
                    .map(|c| Chunk::Data(Bytes::copy_from_slice(c)))
                    .collect(),
                ending: Ending::Close,
                connect_error: None,
                stall_connect: false,
                opened: AtomicUsize::new(0),
                closed: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Keep the body open forever after the scripted chunks
    pub fn stall_after_body(self) -> Self {
        self.map_state(|s| s.ending = Ending::Stall)
    }

    /// Fail the body read after the scripted chunks
    pub fn fail_after_body(self, message: &str) -> Self {
        let message = message.to_string();
        self.map_state(move |s| s.chunks.push(Chunk::Error(message)))
    }

    /// Fail every request before a response arrives
    pub fn fail_connect(self, message: &str) -> Self {
        let message = message.to_string();
        self.map_state(move |s| s.connect_error = Some(message))
    }

    /// Never produce a response head
    pub fn stall_connect(self) -> Self {
        self.map_state(|s| s.stall_connect = true)
    }

    /// Number of sessions opened
    pub fn opened_count(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    /// Number of `close()` calls across all sessions
    pub fn close_count(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Headers of the most recent request
    pub fn last_headers(&self) -> Option<HeaderMap> {
        self.state.requests.lock().last().map(|(_, h)| h.clone())
    }

    /// URLs requested, in order
    pub fn requested_urls(&self) -> Vec<Url> {
        self.state.requests.lock().iter().map(|(u, _)| u.clone()).collect()
    }

    fn map_state(self, f: impl FnOnce(&mut MockState)) -> Self {
        let mut state = Arc::try_unwrap(self.state).unwrap_or_else(|shared| MockState {
            status: shared.status,
            chunks: shared.chunks.clone(),
            ending: shared.ending,
            connect_error: shared.connect_error.clone(),
            stall_connect: shared.stall_connect,
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        });
        f(&mut state);
        Self {
            state: Arc::new(state),
        }
    }
}

impl HttpTransport for MockTransport {
    fn open_session(
        &self,
        _timeout: Option<Duration>,
    ) -> Result<Arc<dyn HttpSession>, TransportError> {
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockSession {
            state: self.state.clone(),
        }))
    }
}

struct MockSession {
    state: Arc<MockState>,
}

impl HttpSession for MockSession {
    fn get(
        &self,
        url: Url,
        headers: HeaderMap,
    ) -> BoxFuture<'static, Result<HttpResponse, TransportError>> {
        self.state.requests.lock().push((url, headers));
        let state = self.state.clone();

        Box::pin(async move {
            if state.stall_connect {
                futures::future::pending::<()>().await;
            }
            if let Some(message) = &state.connect_error {
                return Err(TransportError::Connect(message.clone()));
            }

            let chunks = state.chunks.clone().into_iter().map(|chunk| match chunk {
                Chunk::Data(bytes) => Ok(bytes),
                Chunk::Error(message) => Err(TransportError::Body(message)),
            });
            let body = stream::iter(chunks);
            let body = match state.ending {
                Ending::Close => body.boxed(),
                Ending::Stall => body.chain(stream::pending()).boxed(),
            };

            Ok(HttpResponse {
                status: state.status,
                body,
            })
        })
    }

    fn close(&self) {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Clone)]
struct ServerState {
    status: StatusCode,
    chunks: Arc<Vec<Bytes>>,
    requests: Arc<Mutex<Vec<AxumHeaderMap>>>,
}

/// A test server that automatically shuts down when dropped
///
/// Serves `GET /stream` with a fixed status and SSE body.
pub struct TestServer {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<AxumHeaderMap>>>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Serve `body` in one chunk with status 200
    pub async fn start(body: &str) -> std::io::Result<Self> {
        Self::start_with(StatusCode::OK, vec![body.to_string()]).await
    }

    /// Serve the given chunks with the given status
    pub async fn start_with(status: StatusCode, chunks: Vec<String>) -> std::io::Result<Self> {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = ServerState {
            status,
            chunks: Arc::new(chunks.into_iter().map(Bytes::from).collect()),
            requests: requests.clone(),
        };
        let router = Router::new()
            .route("/stream", get(serve_stream))
            .with_state(state);

        // Bind to any available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        Ok(Self {
            addr,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Get the base URL of the test server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// URL of the SSE endpoint
    pub fn stream_url(&self) -> String {
        format!("{}/stream", self.base_url())
    }

    /// Request headers received so far, in order
    pub fn received_headers(&self) -> Vec<AxumHeaderMap> {
        self.requests.lock().clone()
    }

    /// Shutdown the server gracefully
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn serve_stream(State(state): State<ServerState>, headers: AxumHeaderMap) -> Response {
    state.requests.lock().push(headers);

    let chunks: Vec<Result<Bytes, std::io::Error>> =
        state.chunks.iter().cloned().map(Ok).collect();

    axum::http::Response::builder()
        .status(state.status)
        .header("content-type", "text/event-stream")
        .header("cache-control", "no-cache")
        .body(Body::from_stream(stream::iter(chunks)))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}
