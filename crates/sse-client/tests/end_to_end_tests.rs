//! End-to-end tests over real HTTP
//!
//! These tests spin up an axum server and subscribe with the default
//! reqwest transport.

use axum::http::StatusCode;
use sse_client::testing::TestServer;
use sse_client::{subscribe, Event, StreamError, SubscribeOptions};

#[tokio::test]
async fn test_stream_from_server() {
    let server = TestServer::start("data: 1\n\nevent: tick\nid: a\ndata: 2\n\n")
        .await
        .expect("Failed to start test server");

    let mut sub = subscribe(&server.stream_url(), SubscribeOptions::new()).unwrap();

    let mut events = Vec::new();
    while let Some(event) = sub.next().await {
        events.push(event.unwrap());
    }

    assert_eq!(
        events,
        vec![
            Event::new("1"),
            Event::new("2").with_event("tick").with_id("a")
        ]
    );
    assert!(sub.is_closed());
}

#[tokio::test]
async fn test_chunked_body_from_server() {
    let chunks = vec![
        ": welcome\n".to_string(),
        "data: par".to_string(),
        "tial\r\n\r\n".to_string(),
        "data: end\n\n".to_string(),
    ];
    let server = TestServer::start_with(StatusCode::OK, chunks)
        .await
        .expect("Failed to start test server");

    let mut sub = subscribe(&server.stream_url(), SubscribeOptions::new()).unwrap();

    let first = sub.next().await.unwrap().unwrap();
    let second = sub.next().await.unwrap().unwrap();

    assert_eq!(first.data(), "partial");
    assert_eq!(second.data(), "end");
    assert!(sub.next().await.is_none());
}

#[tokio::test]
async fn test_headers_reach_server() {
    let server = TestServer::start("data: x\n\n")
        .await
        .expect("Failed to start test server");

    let options = SubscribeOptions::new()
        .last_id("41")
        .header("X-Client", "e2e");
    let mut sub = subscribe(&server.stream_url(), options).unwrap();
    while sub.next().await.is_some() {}

    let received = server.received_headers();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["accept"], "text/event-stream");
    assert_eq!(received[0]["cache-control"], "no-cache");
    assert_eq!(received[0]["last-event-id"], "41");
    assert_eq!(received[0]["x-client"], "e2e");
}

#[tokio::test]
async fn test_server_error_status() {
    let server = TestServer::start_with(StatusCode::NOT_FOUND, vec!["data: x\n\n".to_string()])
        .await
        .expect("Failed to start test server");

    let mut sub = subscribe(&server.stream_url(), SubscribeOptions::new()).unwrap();

    match sub.next().await {
        Some(Err(StreamError::InvalidStatus { status, url })) => {
            assert_eq!(status, 404);
            assert!(url.ends_with("/stream"));
        }
        other => panic!("expected invalid status, got {:?}", other),
    }
    assert!(sub.next().await.is_none());
}

#[tokio::test]
async fn test_exit_event_from_server() {
    let server = TestServer::start("data: a\n\nevent: close\ndata: b\n\ndata: c\n\n")
        .await
        .expect("Failed to start test server");

    let options = SubscribeOptions::new().exit_event("close");
    let mut sub = subscribe(&server.stream_url(), options).unwrap();

    let mut events = Vec::new();
    while let Some(event) = sub.next().await {
        events.push(event.unwrap());
    }

    assert_eq!(events.len(), 2);
    assert_eq!(events[1].event(), "close");
}

#[tokio::test]
async fn test_connection_refused() {
    let server = TestServer::start("")
        .await
        .expect("Failed to start test server");
    let url = server.stream_url();
    server.shutdown().await;

    let mut sub = subscribe(&url, SubscribeOptions::new()).unwrap();

    assert!(matches!(
        sub.next().await,
        Some(Err(StreamError::Transport(_)))
    ));
    assert!(sub.next().await.is_none());
}
