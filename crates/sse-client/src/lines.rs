//! Incremental line splitting for SSE bodies
//!
//! Body bytes arrive in arbitrary chunks; lines may be terminated by `\n`,
//! `\r\n` or a lone `\r`, and a `\r\n` pair may straddle two chunks.

use tracing::warn;

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Splits a chunked byte stream into text lines
#[derive(Debug, Default)]
pub struct LineDecoder {
    /// Bytes of the line currently being assembled
    buffer: Vec<u8>,
    /// The previous chunk ended in `\r`; a leading `\n` belongs to it
    pending_cr: bool,
    /// Whether the start-of-stream BOM check is done
    bom_checked: bool,
}

impl LineDecoder {
    /// Create a new line decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completes, without terminators
    ///
    /// A blank line comes back as an empty string.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut chunk = chunk;

        if self.pending_cr && !chunk.is_empty() {
            self.pending_cr = false;
            if chunk[0] == b'\n' {
                chunk = &chunk[1..];
            }
        }

        let mut start = 0;
        let mut i = 0;
        while i < chunk.len() {
            match chunk[i] {
                b'\n' => {
                    self.buffer.extend_from_slice(&chunk[start..i]);
                    lines.push(self.take_line());
                    i += 1;
                    start = i;
                }
                b'\r' => {
                    self.buffer.extend_from_slice(&chunk[start..i]);
                    lines.push(self.take_line());
                    i += 1;
                    match chunk.get(i) {
                        Some(b'\n') => i += 1,
                        Some(_) => {}
                        None => self.pending_cr = true,
                    }
                    start = i;
                }
                _ => i += 1,
            }
        }
        self.buffer.extend_from_slice(&chunk[start..]);

        lines
    }

    /// Return the unterminated tail left at end of stream, if any
    pub fn finish(&mut self) -> Option<String> {
        self.pending_cr = false;
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.take_line())
        }
    }

    fn take_line(&mut self) -> String {
        let mut bytes = std::mem::take(&mut self.buffer);

        if !self.bom_checked {
            self.bom_checked = true;
            if bytes.starts_with(BOM) {
                bytes.drain(..BOM.len());
            }
        }

        match String::from_utf8(bytes) {
            Ok(line) => line,
            Err(e) => {
                warn!("Invalid UTF-8 in SSE line, replacing bad sequences");
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_lf() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.feed(b"data: 1\n\n"), vec!["data: 1", ""]);
    }

    #[test]
    fn test_split_cr_and_crlf() {
        let mut decoder = LineDecoder::new();
        assert_eq!(
            decoder.feed(b"a\rb\r\nc\n"),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn test_crlf_across_chunks() {
        let mut decoder = LineDecoder::new();

        assert_eq!(decoder.feed(b"data: x\r"), vec!["data: x"]);
        // The \n completes the previous \r, it is not a blank line
        assert!(decoder.feed(b"\n").is_empty());
        assert_eq!(decoder.feed(b"\r\n"), vec![""]);
    }

    #[test]
    fn test_partial_line_across_chunks() {
        let mut decoder = LineDecoder::new();

        assert!(decoder.feed(b"data: hel").is_empty());
        assert_eq!(decoder.feed(b"lo\n"), vec!["data: hello"]);
    }

    #[test]
    fn test_finish_returns_tail() {
        let mut decoder = LineDecoder::new();

        decoder.feed(b"data: 1\ndata: tail");
        assert_eq!(decoder.finish().as_deref(), Some("data: tail"));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_leading_bom_stripped_once() {
        let mut decoder = LineDecoder::new();

        let lines = decoder.feed(b"\xEF\xBB\xBFdata: 1\n\xEF\xBB\xBFdata: 2\n");
        assert_eq!(lines[0], "data: 1");
        assert_eq!(lines[1], "\u{FEFF}data: 2");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.feed(b"data: \xFF\n"), vec!["data: \u{FFFD}"]);
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        let mut decoder = LineDecoder::new();

        assert!(decoder.feed(b"data: ok\xE2\x80").is_empty());
        assert_eq!(decoder.feed(b"\xA6\n"), vec!["data: ok…"]);
    }
}
