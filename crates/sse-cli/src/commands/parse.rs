//! Parse command - decode a captured event stream offline

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use sse_client::{BlockDecoder, Event, LineDecoder};

use crate::output::OutputContext;

/// Decode a file (or `-` for stdin) holding raw SSE body text
pub fn parse(path: &Path, ctx: &OutputContext) -> Result<()> {
    let bytes = if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?
    };

    let (events, complete) = decode_body(&bytes);
    if !complete {
        ctx.warn("Input ends inside an unterminated block; it was discarded");
    }

    ctx.print_events(&events);
    Ok(())
}

/// Run a whole body through the stream decoder
///
/// Returns the events and whether the input ended on a block boundary.
pub fn decode_body(bytes: &[u8]) -> (Vec<Event>, bool) {
    let mut lines = LineDecoder::new();
    let mut blocks = BlockDecoder::new();

    let mut all_lines = lines.feed(bytes);
    all_lines.extend(lines.finish());
    let events = blocks.decode_all(all_lines.iter().map(String::as_str));

    (events, blocks.is_idle())
}
