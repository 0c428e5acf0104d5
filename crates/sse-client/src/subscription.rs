//! Subscription implementation
//!
//! A [`Subscription`] drives one HTTP session: it opens the request on the
//! first poll, splits the body into lines, frames blocks and yields decoded
//! events until the body ends, a terminal error occurs, an exit event is
//! delivered, or the subscription is closed or dropped.

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{Stream, StreamExt};
use reqwest::header::HeaderMap;
use tokio::time::Sleep;
use tracing::{debug, error, info};
use url::Url;

use crate::decoder::BlockDecoder;
use crate::error::{StreamError, StreamResult};
use crate::event::Event;
use crate::lines::LineDecoder;
use crate::options::SubscribeOptions;
use crate::transport::{
    ByteStream, HttpResponse, HttpSession, HttpTransport, ReqwestTransport, TransportError,
};

/// Subscribe to an SSE endpoint using the default `reqwest` transport
///
/// The URL and headers are validated immediately; no request is sent until
/// the returned stream is first polled.
pub fn subscribe(url: &str, options: SubscribeOptions) -> StreamResult<Subscription> {
    subscribe_with(Arc::new(ReqwestTransport::new()), url, options)
}

/// Subscribe to an SSE endpoint through a custom transport
pub fn subscribe_with(
    transport: Arc<dyn HttpTransport>,
    url: &str,
    options: SubscribeOptions,
) -> StreamResult<Subscription> {
    let url = Url::parse(url)?;
    let headers = options.build_headers()?;

    Ok(Subscription {
        url,
        headers: Some(headers),
        transport,
        valid_statuses: options.valid_statuses,
        exit_events: options.exit_events,
        timeout: options.timeout,
        session: None,
        deadline: None,
        state: State::Idle,
        lines: LineDecoder::new(),
        blocks: BlockDecoder::new(),
        pending: VecDeque::new(),
        last_event_id: None,
    })
}

/// Closes the session exactly once, on whichever exit path comes first
struct SessionGuard {
    session: Arc<dyn HttpSession>,
    released: bool,
}

impl SessionGuard {
    fn new(session: Arc<dyn HttpSession>) -> Self {
        Self {
            session,
            released: false,
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.session.close();
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.release();
    }
}

enum State {
    /// Not polled yet
    Idle,
    /// Waiting for the response head
    Connecting(BoxFuture<'static, Result<HttpResponse, TransportError>>),
    /// Reading the body
    Streaming(ByteStream),
    /// Finished; every further poll yields `None`
    Done,
}

/// An active SSE subscription
///
/// Implements `Stream<Item = Result<Event, StreamError>>`. A terminal error
/// is yielded once, after which the stream ends. Dropping the subscription
/// at any point releases the HTTP session.
///
/// # Example
///
/// ```no_run
/// use sse_client::{subscribe, SubscribeOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut sub = subscribe(
///     "https://example.com/stream",
///     SubscribeOptions::new().exit_event("bye"),
/// )?;
///
/// while let Some(event) = sub.next().await {
///     let event = event?;
///     println!("{}: {}", event.event(), event.data());
/// }
/// # Ok(())
/// # }
/// ```
pub struct Subscription {
    url: Url,
    /// Taken when the request is issued
    headers: Option<HeaderMap>,
    transport: Arc<dyn HttpTransport>,
    valid_statuses: Vec<u16>,
    exit_events: HashSet<String>,
    timeout: Option<Duration>,

    session: Option<SessionGuard>,
    deadline: Option<Pin<Box<Sleep>>>,
    state: State,

    lines: LineDecoder,
    blocks: BlockDecoder,
    /// Decoded events not yet handed to the consumer
    pending: VecDeque<Event>,
    last_event_id: Option<String>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("url", &self.url.as_str())
            .field("pending", &self.pending.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Subscription {
    /// The subscribed URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Id of the most recent event delivered that carried one
    ///
    /// Pass it as `last_id` when subscribing again.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Get the next event from the stream
    ///
    /// Returns `None` when the stream ends or is closed.
    pub async fn next(&mut self) -> Option<StreamResult<Event>> {
        <Self as StreamExt>::next(self).await
    }

    /// Whether the subscription has finished and released its session
    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Done)
    }

    /// Close the subscription now; later polls yield `None`
    pub fn close(&mut self) {
        self.finish();
    }

    /// Release the session and drop the body. Idempotent.
    fn finish(&mut self) {
        if !matches!(self.state, State::Done) {
            debug!("Closing SSE subscription to {}", self.url);
        }
        self.state = State::Done;
        self.deadline = None;
        self.pending.clear();
        if let Some(mut session) = self.session.take() {
            session.release();
        }
    }

    /// Open the session, arm the deadline and issue the request
    fn start(&mut self) -> StreamResult<()> {
        let session = self.transport.open_session(self.timeout)?;
        info!("SSE session opened for {}", self.url);

        if let Some(timeout) = self.timeout {
            self.deadline = Some(Box::pin(tokio::time::sleep(timeout)));
        }

        let headers = self.headers.take().unwrap_or_default();
        let request = session.get(self.url.clone(), headers);
        self.session = Some(SessionGuard::new(session));
        self.state = State::Connecting(request);
        Ok(())
    }

    /// Fails the subscription once the overall deadline has passed
    fn poll_deadline(&mut self, cx: &mut Context<'_>) -> Poll<Option<StreamResult<Event>>> {
        let expired = match self.deadline.as_mut() {
            Some(deadline) => deadline.as_mut().poll(cx).is_ready(),
            None => false,
        };

        if expired {
            let timeout = self.timeout.unwrap_or_default();
            error!("SSE stream {} timed out after {:?}", self.url, timeout);
            self.finish();
            return Poll::Ready(Some(Err(StreamError::Timeout { timeout })));
        }
        Poll::Pending
    }

    /// Terminal failure: release everything and report
    fn fail(&mut self, err: StreamError) -> Poll<Option<StreamResult<Event>>> {
        self.finish();
        Poll::Ready(Some(Err(err)))
    }
}

impl Stream for Subscription {
    type Item = StreamResult<Event>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            // Hand out decoded events before reading more bytes
            if let Some(event) = this.pending.pop_front() {
                if let Some(id) = event.id() {
                    this.last_event_id = Some(id.to_string());
                }
                if this.exit_events.contains(event.event()) {
                    debug!("Exit event '{}' received", event.event());
                    this.finish();
                }
                return Poll::Ready(Some(Ok(event)));
            }

            if matches!(this.state, State::Connecting(_) | State::Streaming(_)) {
                if let Poll::Ready(item) = this.poll_deadline(cx) {
                    return Poll::Ready(item);
                }
            }

            match &mut this.state {
                State::Idle => {
                    if let Err(e) = this.start() {
                        return this.fail(e);
                    }
                }
                State::Connecting(request) => match request.as_mut().poll(cx) {
                    Poll::Ready(Ok(response)) => {
                        if !this.valid_statuses.contains(&response.status) {
                            error!("Invalid HTTP response status: {}", response.status);
                            let err = StreamError::InvalidStatus {
                                status: response.status,
                                url: this.url.to_string(),
                            };
                            return this.fail(err);
                        }
                        debug!("SSE stream connected: {} ({})", this.url, response.status);
                        this.state = State::Streaming(response.body);
                    }
                    Poll::Ready(Err(e)) => {
                        error!("SSE request to {} failed: {}", this.url, e);
                        return this.fail(e.into());
                    }
                    Poll::Pending => return Poll::Pending,
                },
                State::Streaming(body) => match body.as_mut().poll_next(cx) {
                    Poll::Ready(Some(Ok(chunk))) => {
                        for line in this.lines.feed(&chunk) {
                            if let Some(event) = this.blocks.push_line(&line) {
                                this.pending.push_back(event);
                            }
                        }
                    }
                    Poll::Ready(Some(Err(e))) => {
                        error!("SSE stream {} failed: {}", this.url, e);
                        return this.fail(e.into());
                    }
                    Poll::Ready(None) => {
                        // An unterminated tail never completes a block
                        if let Some(tail) = this.lines.finish() {
                            this.blocks.push_line(&tail);
                        }
                        if !this.blocks.is_idle() {
                            debug!("Discarding incomplete SSE block at end of stream");
                        }
                        debug!("SSE stream {} ended", this.url);
                        this.finish();
                        return Poll::Ready(None);
                    }
                    Poll::Pending => return Poll::Pending,
                },
                State::Done => return Poll::Ready(None),
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.finish();
    }
}
