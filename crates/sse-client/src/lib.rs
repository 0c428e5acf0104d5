//! Server-Sent Events client
//!
//! Opens one long-lived HTTP GET, splits the streamed body into lines, frames
//! message blocks on blank lines and yields decoded [`Event`]s as a lazy,
//! pull-driven [`Subscription`].
//!
//! # Example
//!
//! ```rust,no_run
//! use sse_client::{subscribe, SubscribeOptions};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let options = SubscribeOptions::new()
//!         .timeout(Duration::from_secs(60))
//!         .exit_event("done");
//!     let mut sub = subscribe("http://localhost:8080/events", options)?;
//!
//!     while let Some(event) = sub.next().await {
//!         let event = event?;
//!         println!("[{}] {}", event.event(), event.data());
//!     }
//!
//!     // Reconnect where we left off
//!     if let Some(id) = sub.last_event_id() {
//!         println!("resume with Last-Event-ID {}", id);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Encoding
//!
//! The same [`Event`] type produces wire text:
//!
//! ```rust
//! use sse_client::Event;
//!
//! let event = Event::new("hello").with_event("greeting").with_id("1");
//! assert_eq!(event.dump(), "id: 1\nevent: greeting\ndata: hello\n\n");
//! assert_eq!(Event::parse("id: 1\nevent: greeting\ndata: hello"), event);
//! ```

mod decoder;
mod error;
mod event;
mod lines;
mod options;
mod subscription;
pub mod testing;
pub mod transport;

pub use decoder::BlockDecoder;
pub use error::{StreamError, StreamResult};
pub use event::{Event, ParseWarning, DEFAULT_EVENT};
pub use lines::LineDecoder;
pub use options::{SubscribeOptions, DEFAULT_VALID_STATUSES, LAST_EVENT_ID};
pub use subscription::{subscribe, subscribe_with, Subscription};
pub use transport::{HttpTransport, ReqwestTransport, TransportError};
