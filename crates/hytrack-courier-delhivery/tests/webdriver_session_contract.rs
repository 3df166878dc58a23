//! Contract Test: WebDriver Session Handling
//!
//! Runs the Delhivery adapter against a mock WebDriver endpoint.
//!
//! Constraints verified:
//! - The newest timeline entry becomes "<h3>: <p>"
//! - The browser session is closed on success, on failure, and when the
//!   fetch is cancelled from outside
//! - An unrendered timeline or unreachable driver is a FetchFailure

use hytrack_core::config::CouriersConfig;
use hytrack_core::traits::CourierAdapter;
use hytrack_core::{Courier, FetchFailure};
use hytrack_courier_delhivery::DelhiveryAdapter;
use hytrack_courier_delhivery::webdriver::ELEMENT_KEY;
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{Value, json};
use std::io::Write;
use std::time::Duration;
use tokio::net::TcpListener;

const WAYBILL: &str = "1234567890123";

fn element_ref(id: &str) -> Value {
    let mut reference = serde_json::Map::new();
    reference.insert(ELEMENT_KEY.to_string(), json!(id));
    Value::Object(reference)
}

fn value(v: Value) -> String {
    json!({ "value": v }).to_string()
}

async fn respond(server: &mut ServerGuard, method: &str, path: &str, body: Value) -> Mock {
    server
        .mock(method, path)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(value(body))
        .create_async()
        .await
}

/// Session lifecycle mocks; the returned mocks must stay alive
struct Session {
    opened: Mock,
    closed: Mock,
    _timeouts: Mock,
}

async fn session(server: &mut ServerGuard) -> Session {
    Session {
        opened: respond(server, "POST", "/session", json!({ "sessionId": "s1", "capabilities": {} })).await,
        closed: respond(server, "DELETE", "/session/s1", Value::Null).await,
        _timeouts: respond(server, "POST", "/session/s1/timeouts", Value::Null).await,
    }
}

/// Timeline mocks reporting `entries` as (h3, p), newest first
async fn timeline(server: &mut ServerGuard, entries: &[(&str, &str)]) -> Vec<Mock> {
    let blocks = entries
        .iter()
        .enumerate()
        .map(|(i, _)| element_ref(&format!("block-{}", i)))
        .collect();

    let mut mocks = vec![
        respond(server, "POST", "/session/s1/url", Value::Null).await,
        respond(server, "POST", "/session/s1/elements", Value::Array(blocks)).await,
    ];

    for (i, (heading, paragraph)) in entries.iter().enumerate() {
        for (tag, text) in [("h3", heading), ("p", paragraph)] {
            let child = format!("block-{}-{}", i, tag);
            mocks.push(
                server
                    .mock("POST", format!("/session/s1/element/block-{}/element", i).as_str())
                    .match_body(Matcher::PartialJson(json!({ "using": "tag name", "value": tag })))
                    .with_status(200)
                    .with_body(value(element_ref(&child)))
                    .create_async()
                    .await,
            );
            mocks.push(
                respond(
                    server,
                    "GET",
                    &format!("/session/s1/element/{}/text", child),
                    json!(text),
                )
                .await,
            );
        }
    }

    mocks
}

fn adapter_for(webdriver_url: String) -> DelhiveryAdapter {
    let config = CouriersConfig {
        webdriver_url,
        page_wait_secs: 1,
        http_timeout_secs: 5,
        ..CouriersConfig::default()
    };
    DelhiveryAdapter::new(&config)
        .unwrap()
        .with_page_base("http://tracking.invalid/")
}

#[tokio::test]
async fn reads_newest_timeline_entry_and_closes_session() {
    let mut server = Server::new_async().await;
    let session = session(&mut server).await;
    let _timeline = timeline(
        &mut server,
        &[
            ("Delivered", "Package delivered to consignee"),
            ("Out for Delivery", "Agent is on the way"),
        ],
    )
    .await;

    let payload = adapter_for(server.url()).fetch(WAYBILL).await.unwrap();

    assert_eq!(payload.courier, Courier::Delhivery);
    assert_eq!(payload.status, "Delivered: Package delivered to consignee");
    assert!(payload.is_delivered());
    assert_eq!(payload.location, None);
    assert_eq!(payload.tracking_url, Courier::Delhivery.tracking_url(WAYBILL));

    session.opened.assert_async().await;
    session.closed.assert_async().await;
}

#[tokio::test]
async fn empty_timeline_is_unrecognized_and_session_closed() {
    let mut server = Server::new_async().await;
    let session = session(&mut server).await;
    let _timeline = timeline(&mut server, &[]).await;

    let err = adapter_for(server.url()).fetch(WAYBILL).await.unwrap_err();

    assert!(matches!(err, FetchFailure::Unrecognized(_)));
    session.closed.assert_async().await;
}

#[tokio::test]
async fn cancelled_fetch_still_closes_session() {
    let mut server = Server::new_async().await;
    let session = session(&mut server).await;
    let _slow_page = server
        .mock("POST", "/session/s1/url")
        .with_status(200)
        .with_chunked_body(|w| {
            std::thread::sleep(Duration::from_secs(3));
            w.write_all(br#"{"value":null}"#)
        })
        .create_async()
        .await;

    let adapter = adapter_for(server.url());
    let cancelled = tokio::time::timeout(Duration::from_millis(500), adapter.fetch(WAYBILL)).await;
    assert!(cancelled.is_err(), "fetch should still be waiting on the page load");

    // The delete runs on a spawned task after the fetch is dropped
    let mut closed = false;
    for _ in 0..50 {
        if session.closed.matched_async().await {
            closed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(closed, "session s1 was never deleted");
}

#[tokio::test]
async fn unreachable_driver_is_browser_failure() {
    // Bind then drop to get a port with nothing listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = adapter_for(format!("http://{}", addr))
        .fetch(WAYBILL)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchFailure::Browser(_)));
}
