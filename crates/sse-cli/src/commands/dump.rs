//! Dump command - print the wire form of one event

use anyhow::Result;
use sse_client::Event;

/// Build an event from the given fields
pub fn build_event(data: &str, event: Option<&str>, id: Option<&str>, retry: Option<u64>) -> Event {
    let mut built = Event::new(data);
    if let Some(event) = event {
        built = built.with_event(event);
    }
    if let Some(id) = id {
        built = built.with_id(id);
    }
    if let Some(retry) = retry {
        built = built.with_retry(retry);
    }
    built
}

/// Print the encoded block, including its terminating blank line
pub fn dump(data: &str, event: Option<&str>, id: Option<&str>, retry: Option<u64>) -> Result<()> {
    print!("{}", build_event(data, event, id, retry).dump());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_event() {
        let event = build_event("a\nb", Some("note"), Some("1"), Some(2000));
        assert_eq!(
            event.dump(),
            "id: 1\nevent: note\nretry: 2000\ndata: a\ndata: b\n\n"
        );
    }
}
