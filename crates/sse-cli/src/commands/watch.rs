//! Watch command - subscribe to a stream and print events as they arrive

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use sse_client::{subscribe_with, HttpTransport, StreamError, SubscribeOptions};
use tracing::debug;

use crate::output::OutputContext;
use crate::reconnect::Backoff;

/// Resolved settings for one watch run
#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub url: String,
    pub last_id: Option<String>,
    pub exit_events: Vec<String>,
    pub valid_statuses: Vec<u16>,
    pub timeout: Option<Duration>,
    pub headers: BTreeMap<String, String>,
    /// Reconnects allowed over the whole run
    pub max_retries: u32,
    pub backoff: Backoff,
    /// Stop after this many events
    pub count: Option<usize>,
}

impl WatchSettings {
    fn options(&self, last_id: Option<&str>) -> SubscribeOptions {
        let mut options = SubscribeOptions::new();
        if !self.valid_statuses.is_empty() {
            options = options.valid_statuses(self.valid_statuses.iter().copied());
        }
        for event in &self.exit_events {
            options = options.exit_event(event.clone());
        }
        for (name, value) in &self.headers {
            options = options.header(name.clone(), value.clone());
        }
        if let Some(timeout) = self.timeout {
            options = options.timeout(timeout);
        }
        if let Some(id) = last_id {
            options = options.last_id(id);
        }
        options
    }
}

/// How one subscription ended
enum Outcome {
    /// Event limit reached, exit event seen, or Ctrl+C
    Stop,
    /// Server closed the stream
    Ended,
    Failed(StreamError),
}

/// Watch a stream until Ctrl+C, an exit event or the retry budget runs out
pub async fn watch(
    transport: Arc<dyn HttpTransport>,
    settings: WatchSettings,
    ctx: &OutputContext,
) -> Result<usize> {
    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    watch_until(transport, settings, ctx, running).await
}

/// Subscribe, print and reconnect while `running` holds
///
/// `max_retries` bounds the total number of reconnects for the whole run.
/// Returns the number of events printed.
async fn watch_until(
    transport: Arc<dyn HttpTransport>,
    settings: WatchSettings,
    ctx: &OutputContext,
    running: Arc<AtomicBool>,
) -> Result<usize> {
    ctx.info(&format!("Watching {} (Ctrl+C to stop)", settings.url));
    ctx.print_event_header();

    let mut last_id = settings.last_id.clone();
    let mut backoff = settings.backoff;
    let mut attempt: u32 = 0;
    let mut received: usize = 0;

    loop {
        let mut subscription = subscribe_with(
            transport.clone(),
            &settings.url,
            settings.options(last_id.as_deref()),
        )
        .context("Failed to create subscription")?;

        let outcome = loop {
            tokio::select! {
                event = subscription.next() => {
                    match event {
                        Some(Ok(event)) => {
                            if let Some(retry) = event.retry() {
                                backoff = backoff.with_initial_delay(Duration::from_millis(retry));
                            }
                            ctx.print_event(&event);
                            received += 1;

                            if settings.count.is_some_and(|limit| received >= limit)
                                || settings.exit_events.iter().any(|e| e == event.event())
                            {
                                break Outcome::Stop;
                            }
                        }
                        Some(Err(e)) => break Outcome::Failed(e),
                        None => break Outcome::Ended,
                    }
                }
                _ = tokio::time::sleep(Duration::from_millis(100)) => {
                    // Check running flag periodically
                    if !running.load(Ordering::SeqCst) {
                        break Outcome::Stop;
                    }
                }
            }
        };

        if let Some(id) = subscription.last_event_id() {
            last_id = Some(id.to_string());
        }
        drop(subscription);

        match outcome {
            Outcome::Stop => {
                ctx.success(&format!("Stopped after {} event(s)", received));
                return Ok(received);
            }
            Outcome::Failed(e @ StreamError::InvalidStatus { .. }) => {
                return Err(e).context("Server rejected the stream");
            }
            Outcome::Failed(e) => ctx.error(&format!("Stream error: {}", e)),
            Outcome::Ended => ctx.info("Stream ended by server"),
        }

        if attempt >= settings.max_retries {
            bail!("Giving up after {} reconnect attempt(s)", attempt);
        }
        let delay = backoff.delay(attempt);
        attempt += 1;

        ctx.warn(&format!(
            "Reconnecting in {:.1}s (attempt {}/{}){}",
            delay.as_secs_f64(),
            attempt,
            settings.max_retries,
            last_id
                .as_deref()
                .map(|id| format!(", resuming after id {}", id))
                .unwrap_or_default()
        ));
        debug!("Reconnect delay {:?}", delay);

        tokio::time::sleep(delay).await;
        if !running.load(Ordering::SeqCst) {
            return Ok(received);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use sse_client::testing::MockTransport;

    fn settings() -> WatchSettings {
        WatchSettings {
            url: "http://localhost/stream".to_string(),
            last_id: None,
            exit_events: vec!["bye".to_string()],
            valid_statuses: vec![],
            timeout: Some(Duration::from_secs(5)),
            headers: BTreeMap::from([("X-Token".to_string(), "t".to_string())]),
            max_retries: 3,
            backoff: Backoff::default(),
            count: None,
        }
    }

    fn quiet() -> OutputContext {
        OutputContext::new(OutputFormat::Json, true, true)
    }

    fn fast(mut s: WatchSettings) -> WatchSettings {
        s.backoff = Backoff::default().with_initial_delay(Duration::from_millis(1));
        s
    }

    async fn run(transport: &MockTransport, settings: WatchSettings) -> Result<usize> {
        let running = Arc::new(AtomicBool::new(true));
        tokio::time::timeout(
            Duration::from_secs(5),
            watch_until(Arc::new(transport.clone()), settings, &quiet(), running),
        )
        .await
        .expect("watch did not finish")
    }

    #[test]
    fn test_options_keep_defaults_without_statuses() {
        let options = settings().options(None);

        assert_eq!(options.valid_statuses, vec![200, 301, 307]);
        assert!(options.exit_events.contains("bye"));
        assert_eq!(options.timeout, Some(Duration::from_secs(5)));
        assert_eq!(options.last_id, None);
    }

    #[test]
    fn test_options_carry_last_id_and_headers() {
        let mut s = settings();
        s.valid_statuses = vec![200];
        let options = s.options(Some("12"));

        assert_eq!(options.valid_statuses, vec![200]);
        assert_eq!(options.last_id.as_deref(), Some("12"));
        let headers = options.build_headers().unwrap();
        assert_eq!(headers["x-token"], "t");
        assert_eq!(headers["last-event-id"], "12");
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let transport = MockTransport::new(200, "id: 1\ndata: a\n\n");
        let mut s = fast(settings());
        s.max_retries = 2;

        let err = run(&transport, s).await.unwrap_err();

        assert!(err.to_string().contains("Giving up after 2"));
        assert_eq!(transport.opened_count(), 3);
        assert_eq!(transport.close_count(), 3);
    }

    #[tokio::test]
    async fn test_reconnect_resends_last_id() {
        let transport = MockTransport::new(200, "id: 41\ndata: a\n\nid: 42\ndata: b\n\n");
        let mut s = fast(settings());
        s.max_retries = 1;

        let _ = run(&transport, s).await;

        let headers = transport.last_headers().expect("no request made");
        assert_eq!(headers["last-event-id"], "42");
        assert_eq!(transport.opened_count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_status_is_not_retried() {
        let transport = MockTransport::new(404, "");

        let err = run(&transport, fast(settings())).await.unwrap_err();

        assert!(err.to_string().contains("Server rejected the stream"));
        assert_eq!(transport.opened_count(), 1);
        assert_eq!(transport.close_count(), 1);
    }

    #[tokio::test]
    async fn test_server_retry_hint_sets_first_delay() {
        let transport = MockTransport::new(200, "retry: 5\ndata: a\n\n");
        let mut s = settings();
        s.backoff = Backoff::default().with_initial_delay(Duration::from_secs(20));
        s.max_retries = 1;

        // The 20s default would trip the 5s guard in `run`
        let err = run(&transport, s).await.unwrap_err();

        assert!(err.to_string().contains("Giving up after 1"));
        assert_eq!(transport.opened_count(), 2);
    }

    #[tokio::test]
    async fn test_exit_event_stops_without_reconnect() {
        let transport = MockTransport::new(200, "data: a\n\nevent: bye\ndata: b\n\n");

        let received = run(&transport, fast(settings())).await.unwrap();

        assert_eq!(received, 2);
        assert_eq!(transport.opened_count(), 1);
    }

    #[tokio::test]
    async fn test_count_limit_stops() {
        let transport = MockTransport::new(200, "data: a\n\ndata: b\n\ndata: c\n\n");
        let mut s = fast(settings());
        s.count = Some(2);

        assert_eq!(run(&transport, s).await.unwrap(), 2);
    }
}
