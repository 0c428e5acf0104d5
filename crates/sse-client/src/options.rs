//! Subscription options and request header assembly

use std::collections::HashSet;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CACHE_CONTROL};

use crate::error::{StreamError, StreamResult};

/// Header used to resume a stream after the last seen event
pub const LAST_EVENT_ID: &str = "last-event-id";

/// Statuses accepted when none are configured
pub const DEFAULT_VALID_STATUSES: [u16; 3] = [200, 301, 307];

/// Options for [`subscribe`](crate::subscribe)
#[derive(Debug, Clone)]
pub struct SubscribeOptions {
    /// Sent as `Last-Event-ID` when non-empty
    pub last_id: Option<String>,
    /// Response statuses that start a stream
    pub valid_statuses: Vec<u16>,
    /// Event types that end the subscription once delivered
    pub exit_events: HashSet<String>,
    /// Overall deadline for the whole subscription; `None` waits forever
    pub timeout: Option<Duration>,
    /// Extra request headers
    pub headers: Vec<(String, String)>,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            last_id: None,
            valid_statuses: DEFAULT_VALID_STATUSES.to_vec(),
            exit_events: HashSet::new(),
            timeout: None,
            headers: Vec::new(),
        }
    }
}

impl SubscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume after the given event id
    pub fn last_id(mut self, id: impl Into<String>) -> Self {
        self.last_id = Some(id.into());
        self
    }

    /// Replace the accepted status set
    pub fn valid_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.valid_statuses = statuses.into_iter().collect();
        self
    }

    /// Stop after delivering an event of this type
    pub fn exit_event(mut self, event: impl Into<String>) -> Self {
        self.exit_events.insert(event.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add a request header. Mandatory SSE headers win on conflict.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub(crate) fn accepts(&self, status: u16) -> bool {
        self.valid_statuses.contains(&status)
    }

    /// Merge caller headers with the headers every SSE request carries
    pub fn build_headers(&self) -> StreamResult<HeaderMap> {
        let mut headers = HeaderMap::new();

        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| StreamError::InvalidHeader(format!("{}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| StreamError::InvalidHeader(format!("{}: {}", name, e)))?;
            headers.append(name, value);
        }

        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));

        if let Some(last_id) = self.last_id.as_deref().filter(|id| !id.is_empty()) {
            let value = HeaderValue::from_str(last_id)
                .map_err(|e| StreamError::InvalidHeader(format!("{}: {}", LAST_EVENT_ID, e)))?;
            headers.insert(HeaderName::from_static(LAST_EVENT_ID), value);
        }

        Ok(headers)
    }
}
