//! Command implementations for sse-cli

pub mod dump;
pub mod parse;
pub mod watch;

pub use dump::dump;
pub use parse::parse;
pub use watch::{watch, WatchSettings};
