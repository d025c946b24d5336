//! End-to-end tests for the SSE change feed.
//!
//! These drive the router in-process and read the event stream from the
//! response body.

use axum::body::{Body, BodyDataStream};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tailfeed_protocol::{Document, LogEntry, Timestamp};
use tailfeed_server::{build_router, AppState, MemoryOplog, ServerConfig, StaticRegistry};
use tower::ServiceExt;

const WAIT: Duration = Duration::from_secs(5);

fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

fn app_with(oplog: &MemoryOplog, config: ServerConfig) -> Router {
    let registry = StaticRegistry::new(["brands", "products"]);
    build_router(AppState::new(
        Arc::new(oplog.clone()),
        Arc::new(registry),
        config,
    ))
}

fn app(oplog: &MemoryOplog) -> Router {
    app_with(
        oplog,
        ServerConfig::default().with_ticker_interval(Duration::from_secs(3600)),
    )
}

async fn get(app: Router, uri: &str, last_event_id: Option<&str>) -> Response {
    let mut request = Request::builder().uri(uri);
    if let Some(id) = last_event_id {
        request = request.header("last-event-id", id);
    }
    app.oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn error_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn wait_for_cursors(oplog: &MemoryOplog, count: usize) {
    tokio::time::timeout(WAIT, async {
        while oplog.open_cursors() != count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("expected {count} open cursors, got {}", oplog.open_cursors()));
}

#[derive(Debug, Default, PartialEq)]
struct Frame {
    id: String,
    event: String,
    data: Value,
}

impl Frame {
    fn parse(raw: &str) -> Option<Self> {
        let mut frame = Frame::default();
        let mut data = None;
        for line in raw.lines() {
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.strip_prefix(' ').unwrap_or(value);
            match field {
                "id" => frame.id = value.to_string(),
                "event" => frame.event = value.to_string(),
                "data" => data = Some(serde_json::from_str(value).unwrap()),
                _ => {}
            }
        }
        frame.data = data?;
        Some(frame)
    }
}

struct SseReader {
    body: BodyDataStream,
    buffer: String,
}

impl SseReader {
    fn new(response: Response) -> Self {
        Self {
            body: response.into_body().into_data_stream(),
            buffer: String::new(),
        }
    }

    /// Next frame, or `None` once the body ends.
    async fn next_frame(&mut self) -> Option<Frame> {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let raw: String = self.buffer.drain(..end + 2).collect();
                match Frame::parse(&raw) {
                    Some(frame) => return Some(frame),
                    None => continue,
                }
            }
            let chunk = tokio::time::timeout(WAIT, self.body.next())
                .await
                .expect("timed out waiting for body");
            match chunk {
                Some(Ok(bytes)) => self.buffer.push_str(std::str::from_utf8(&bytes).unwrap()),
                _ => return None,
            }
        }
    }

    /// Next non-ticker frame.
    async fn next_change(&mut self) -> Option<Frame> {
        loop {
            let frame = self.next_frame().await?;
            if frame.event != "ticker" {
                return Some(frame);
            }
        }
    }
}

#[tokio::test]
async fn missing_resources_is_bad_request() {
    let oplog = MemoryOplog::new("shop");
    let response = get(app(&oplog), "/changes/streaming", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = error_body(response).await;
    assert_eq!(body["error"], "MISSING_RESOURCE");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("resources=foo,bar"));
    assert_eq!(oplog.open_cursors(), 0);
}

#[tokio::test]
async fn unknown_resources_are_listed() {
    let oplog = MemoryOplog::new("shop");
    let response = get(
        app(&oplog),
        "/changes/streaming?resources=brands,unknown",
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = error_body(response).await;
    assert_eq!(
        body["message"],
        "The following resources don't exist: unknown"
    );
}

#[tokio::test]
async fn invalid_cursor_is_bad_request() {
    let oplog = MemoryOplog::new("shop");
    let response = get(
        app(&oplog),
        "/changes/streaming?resources=brands",
        Some("abc"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = error_body(response).await;
    assert_eq!(body["error"], "INVALID_TIMESTAMP");
    assert!(body["message"].as_str().unwrap().contains("abc"));
}

#[tokio::test]
async fn resumes_after_last_event_id() {
    let oplog = MemoryOplog::new("shop");
    oplog
        .append(LogEntry::insert(
            Timestamp::new(100, 1),
            "shop.brands",
            doc(json!({"_id": "b1", "__v": 0})),
        ))
        .unwrap();
    oplog
        .append(LogEntry::insert(
            Timestamp::new(100, 2),
            "shop.brands",
            doc(json!({"_id": "b2", "__v": 0, "name": "Acme"})),
        ))
        .unwrap();

    let response = get(
        app(&oplog),
        "/changes/streaming?resources=brands",
        Some("100_1"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );

    let mut reader = SseReader::new(response);
    assert_eq!(
        reader.next_change().await,
        Some(Frame {
            id: "100_2".into(),
            event: "brands_i".into(),
            data: json!({"id": "b2", "name": "Acme"}),
        })
    );
}

#[tokio::test]
async fn live_events_without_cursor() {
    let oplog = MemoryOplog::new("shop");
    oplog.insert("brands", doc(json!({"_id": "old"}))).unwrap();

    let response = get(app(&oplog), "/changes/streaming?resources=brands", None).await;
    let mut reader = SseReader::new(response);
    wait_for_cursors(&oplog, 1).await;

    let ts = oplog.insert("brands", doc(json!({"_id": "new"}))).unwrap();
    let frame = reader.next_change().await.unwrap();
    assert_eq!(frame.id, ts.encode());
    assert_eq!(frame.data, json!({"id": "new"}));
}

#[tokio::test]
async fn field_filters_apply() {
    let oplog = MemoryOplog::new("shop");
    let response = get(
        app(&oplog),
        "/changes/streaming?resources=products&limit=10&brand.code=X",
        None,
    )
    .await;
    let mut reader = SseReader::new(response);
    wait_for_cursors(&oplog, 1).await;

    oplog.insert("products", doc(json!({"_id": "1", "brand": {"code": "Y"}}))).unwrap();
    oplog.insert("products", doc(json!({"_id": "2", "brand": {"code": "X"}}))).unwrap();

    let frame = reader.next_change().await.unwrap();
    assert_eq!(frame.event, "products_i");
    assert_eq!(frame.data["id"], "2");
}

#[tokio::test]
async fn single_resource_route_ignores_resources_param() {
    let oplog = MemoryOplog::new("shop");
    let response = get(
        app(&oplog),
        "/brands/changes/streaming?resources=unknown",
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut reader = SseReader::new(response);
    wait_for_cursors(&oplog, 1).await;

    oplog.insert("products", doc(json!({"_id": "p"}))).unwrap();
    oplog.insert("brands", doc(json!({"_id": "b"}))).unwrap();

    let frame = reader.next_change().await.unwrap();
    assert_eq!(frame.event, "brands_i");
    assert_eq!(frame.data, json!({"id": "b"}));
}

#[tokio::test]
async fn unregistered_single_route_is_not_found() {
    let oplog = MemoryOplog::new("shop");
    let response = get(app(&oplog), "/orders/changes/streaming", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn single_resource_routes_can_be_disabled() {
    let oplog = MemoryOplog::new("shop");
    let config = ServerConfig::default().with_single_resource_routes(false);
    let response = get(app_with(&oplog, config), "/brands/changes/streaming", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ticker_events_are_interleaved() {
    let oplog = MemoryOplog::new("shop");
    let config = ServerConfig::default().with_ticker_interval(Duration::from_millis(50));
    let response = get(
        app_with(&oplog, config),
        "/changes/streaming?resources=brands",
        None,
    )
    .await;
    let mut reader = SseReader::new(response);

    for tick in 0..3u64 {
        let frame = reader.next_frame().await.unwrap();
        assert_eq!(frame.event, "ticker");
        assert_eq!(frame.id, tick.to_string());
        assert_eq!(frame.data, json!(tick));
    }
}

#[tokio::test]
async fn dropping_the_body_releases_the_cursor() {
    let oplog = MemoryOplog::new("shop");
    let response = get(app(&oplog), "/changes/streaming?resources=brands", None).await;
    wait_for_cursors(&oplog, 1).await;

    drop(response);
    wait_for_cursors(&oplog, 0).await;
}

#[tokio::test]
async fn tailer_failure_ends_the_stream() {
    let oplog = MemoryOplog::new("shop");
    let response = get(app(&oplog), "/changes/streaming?resources=brands", None).await;
    let mut reader = SseReader::new(response);
    wait_for_cursors(&oplog, 1).await;

    assert_eq!(oplog.fail_tailers("replica set lost"), 1);
    assert_eq!(reader.next_change().await, None);
    assert_eq!(oplog.open_cursors(), 0);
}

#[tokio::test]
async fn shutdown_ends_open_streams() {
    let oplog = MemoryOplog::new("shop");
    let state = AppState::new(
        Arc::new(oplog.clone()),
        Arc::new(StaticRegistry::new(["brands"])),
        ServerConfig::default(),
    );
    let shutdown = state.shutdown.clone();
    let app = build_router(state);

    let response = get(app, "/brands/changes/streaming", None).await;
    let mut reader = SseReader::new(response);
    wait_for_cursors(&oplog, 1).await;

    shutdown.cancel();
    assert_eq!(reader.next_change().await, None);
    wait_for_cursors(&oplog, 0).await;
}
