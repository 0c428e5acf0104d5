//! SSE event model
//!
//! One [`Event`] corresponds to one message block on the wire. The same type
//! is used for decoding ([`Event::parse`]) and encoding ([`Event::dump`]).

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Event type used when a block carries no `event:` field
pub const DEFAULT_EVENT: &str = "message";

/// A decoded (or to-be-encoded) Server-Sent Event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawEvent")]
pub struct Event {
    data: String,
    event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    /// Reconnection delay hint in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    retry: Option<u64>,
}

/// Wire shape accepted when deserializing an [`Event`]
#[derive(Deserialize)]
struct RawEvent {
    #[serde(default)]
    data: String,
    #[serde(default)]
    event: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    retry: Option<u64>,
}

impl From<RawEvent> for Event {
    fn from(raw: RawEvent) -> Self {
        let mut event = Self {
            data: raw.data,
            event: String::new(),
            id: raw.id,
            retry: raw.retry,
        };
        event.set_event(raw.event);
        event
    }
}

/// A recoverable problem found while parsing a block
///
/// Warnings never abort parsing: the offending line or field is dropped and
/// the rest of the block still contributes to the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseWarning {
    /// Line without a `:` separator
    MalformedLine(String),
    /// `retry` value that is not a non-negative integer
    InvalidRetry(String),
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedLine(line) => write!(f, "Invalid SSE line: {:?}", line),
            Self::InvalidRetry(value) => write!(f, "Invalid SSE retry value: {:?}", value),
        }
    }
}

impl Default for Event {
    fn default() -> Self {
        Self {
            data: String::new(),
            event: DEFAULT_EVENT.to_string(),
            id: None,
            retry: None,
        }
    }
}

impl Event {
    /// Create a `message` event carrying `data`
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    /// Set the event type. An empty name falls back to `message`.
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.set_event(event.into());
        self
    }

    /// Set the event id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the reconnection delay hint in milliseconds
    pub fn with_retry(mut self, retry: u64) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Event payload
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Event type, `message` unless the block said otherwise
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Event id, to be resent as `Last-Event-ID` on reconnect
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Reconnection delay hint in milliseconds
    pub fn retry(&self) -> Option<u64> {
        self.retry
    }

    /// Parse one raw message block (without its terminating blank line)
    ///
    /// Malformed lines and unparsable `retry` values are logged and dropped;
    /// this never fails.
    pub fn parse(raw: &str) -> Self {
        let (event, warnings) = Self::parse_with_diagnostics(raw);
        for warning in &warnings {
            warn!("{}", warning);
        }
        event
    }

    /// Parse one raw message block, returning the warnings instead of logging them
    pub fn parse_with_diagnostics(raw: &str) -> (Self, Vec<ParseWarning>) {
        let mut event = Self::default();
        let mut warnings = Vec::new();

        for line in block_lines(raw) {
            if line.is_empty() {
                continue;
            }

            let Some((name, value)) = line.split_once(':') else {
                warnings.push(ParseWarning::MalformedLine(line.to_string()));
                continue;
            };
            let value = value.strip_prefix(' ').unwrap_or(value);

            match name {
                // Comment
                "" => {}
                "data" => {
                    if !event.data.is_empty() {
                        event.data.push('\n');
                    }
                    event.data.push_str(value);
                }
                "event" => event.set_event(value.to_string()),
                "id" => event.id = Some(value.to_string()),
                "retry" => match parse_retry(value) {
                    Some(retry) => event.retry = Some(retry),
                    None => warnings.push(ParseWarning::InvalidRetry(value.to_string())),
                },
                _ => {}
            }
        }

        (event, warnings)
    }

    /// Serialize to the SSE wire format, including the terminating blank line
    pub fn dump(&self) -> String {
        let mut out = String::new();

        if let Some(id) = self.id.as_deref().filter(|id| !id.is_empty()) {
            out.push_str(&format!("id: {}\n", id));
        }
        if self.event != DEFAULT_EVENT {
            out.push_str(&format!("event: {}\n", self.event));
        }
        if let Some(retry) = self.retry.filter(|r| *r != 0) {
            out.push_str(&format!("retry: {}\n", retry));
        }
        for segment in self.data.split('\n') {
            out.push_str(&format!("data: {}\n", segment));
        }
        out.push('\n');

        out
    }

    /// [`dump`](Self::dump) as UTF-8 bytes
    pub fn encode(&self) -> Bytes {
        Bytes::from(self.dump())
    }

    fn set_event(&mut self, event: String) {
        self.event = if event.is_empty() {
            DEFAULT_EVENT.to_string()
        } else {
            event
        };
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.data)
    }
}

/// Split a block on `\n`, `\r\n` or a lone `\r`
fn block_lines(raw: &str) -> impl Iterator<Item = &str> {
    raw.split('\n')
        .flat_map(|line| line.strip_suffix('\r').unwrap_or(line).split('\r'))
}

fn parse_retry(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}
