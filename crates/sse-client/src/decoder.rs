//! Block framing
//!
//! Groups body lines into message blocks on blank-line boundaries and turns
//! each completed block into an [`Event`].

use tracing::trace;

use crate::event::Event;

/// Accumulates the lines of the block currently being built
#[derive(Debug, Default)]
pub struct BlockDecoder {
    lines: Vec<String>,
}

impl BlockDecoder {
    /// Create a new block decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Push one line (without terminator); returns an event when a block completes
    pub fn push_line(&mut self, line: &str) -> Option<Event> {
        if line.is_empty() {
            // Blank line before any content
            if self.lines.is_empty() {
                return None;
            }
            let raw = self.lines.join("\n");
            self.lines.clear();
            return Some(Event::parse(&raw));
        }

        if line.starts_with(':') {
            trace!("SSE keepalive/comment");
            return None;
        }

        self.lines.push(line.to_string());
        None
    }

    /// True when no block is in progress
    pub fn is_idle(&self) -> bool {
        self.lines.is_empty()
    }

    /// Decode every complete block in `lines`, in order
    pub fn decode_all<'a>(&mut self, lines: impl IntoIterator<Item = &'a str>) -> Vec<Event> {
        lines
            .into_iter()
            .filter_map(|line| self.push_line(line))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_line_framing() {
        let mut decoder = BlockDecoder::new();
        let events = decoder.decode_all(["data: 1", "", "data: 2", ""]);

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data(), "1");
        assert_eq!(events[1].data(), "2");
    }

    #[test]
    fn test_leading_blank_lines_are_ignored() {
        let mut decoder = BlockDecoder::new();
        let events = decoder.decode_all(["", "", "data: x", ""]);

        assert_eq!(events, vec![Event::new("x")]);
    }

    #[test]
    fn test_heartbeat_between_blocks() {
        let mut decoder = BlockDecoder::new();
        let events = decoder.decode_all([":ping", "", "data: x", ":mid", "", ":ping"]);

        assert_eq!(events, vec![Event::new("x")]);
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_heartbeat_only_block_yields_nothing() {
        let mut decoder = BlockDecoder::new();
        assert!(decoder.decode_all([":keepalive", ""]).is_empty());
    }

    #[test]
    fn test_incomplete_block_is_held() {
        let mut decoder = BlockDecoder::new();

        assert!(decoder.push_line("event: partial").is_none());
        assert!(!decoder.is_idle());
    }

    #[test]
    fn test_block_with_fields() {
        let mut decoder = BlockDecoder::new();
        let events = decoder.decode_all(["event: add", "id: 9", "data: a", "data: b", ""]);

        assert_eq!(
            events,
            vec![Event::new("a\nb").with_event("add").with_id("9")]
        );
    }

    #[test]
    fn test_malformed_only_block_yields_default_event() {
        let mut decoder = BlockDecoder::new();
        assert_eq!(decoder.decode_all(["garbage", ""]), vec![Event::default()]);
    }
}
