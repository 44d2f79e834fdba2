//! HTTP surface tests, driven through the router without a socket.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{FakeTranscribe, Harness, RecordingEmail, INBOUND, MINUTES_TEXT, PROCESSED};
use minutes_relay::api::{create_router, AppState};
use minutes_relay::db::InvocationLog;
use minutes_relay::events::StateChangeEvent;
use minutes_relay::summarize::GenerationError;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    transcribe: Arc<FakeTranscribe>,
    email: Arc<RecordingEmail>,
    harness_generator: Arc<common::ScriptedGenerator>,
}

fn test_app() -> TestApp {
    let Harness {
        pipeline,
        transcribe,
        generator,
        email,
        ..
    } = Harness::new();
    let log = Arc::new(InvocationLog::in_memory().unwrap());
    let pipeline = Arc::new(pipeline.with_invocation_log(log));

    TestApp {
        router: create_router(AppState { pipeline }),
        transcribe,
        email,
        harness_generator: generator,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}

fn put(uri: &str, body: &'static [u8]) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "audio/mpeg")
        .body(Body::from(body))
        .unwrap()
}

fn post_event(event: &StateChangeEvent) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/events")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(event).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_status_and_version() {
    let app = test_app();
    let (status, body) = send(&app.router, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "minutes-relay");

    let (status, body) = send(&app.router, get("/version")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_topology_endpoint() {
    let app = test_app();
    let (status, body) = send(&app.router, get("/topology")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["audioFilesBucket"]["name"], INBOUND);
    assert_eq!(body["rules"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_upload_then_completion_sends_email() {
    let app = test_app();

    let (status, body) = send(&app.router, put(&format!("/buckets/{}/team/sync.mp3", INBOUND), b"audio")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["key"], "team/sync.mp3");
    assert_eq!(body["targets"][0]["function"], "TranscribeProcessor");
    assert_eq!(body["targets"][0]["status"], "succeeded");

    let job = app.transcribe.started().await[0].job_name.clone();
    let event = app.transcribe.finish(&job, "notes").await;

    let (status, body) = send(&app.router, post_event(&event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["routed"], true);
    assert_eq!(body["targets"][0]["function"], "MinutesGenerator");
    assert_eq!(app.email.sent().await.len(), 1);

    let (status, body) = send(
        &app.router,
        get(&format!("/buckets/{}/minutes/{}.txt", PROCESSED, job)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String(MINUTES_TEXT.to_string()));
}

#[tokio::test]
async fn test_unmatched_upload_is_stored_but_not_routed() {
    let app = test_app();
    let (status, body) = send(&app.router, put(&format!("/buckets/{}/notes.txt", INBOUND), b"hello")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["targets"].as_array().unwrap().is_empty());

    let (status, body) = send(&app.router, get(&format!("/buckets/{}", INBOUND))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["keys"], serde_json::json!(["notes.txt"]));
    assert!(app.transcribe.started().await.is_empty());
}

#[tokio::test]
async fn test_failed_event_is_accepted_unrouted() {
    let app = test_app();
    let event = StateChangeEvent::job_state_change("J", "FAILED");
    let (status, body) = send(&app.router, post_event(&event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["routed"], false);
    assert!(app.email.sent().await.is_empty());
}

#[tokio::test]
async fn test_handler_failure_is_bad_gateway() {
    let app = test_app();
    send(&app.router, put(&format!("/buckets/{}/a.mp3", INBOUND), b"audio")).await;
    let job = app.transcribe.started().await[0].job_name.clone();
    let event = app.transcribe.finish(&job, "notes").await;
    app.harness_generator
        .fail_next(GenerationError::ContentPolicy("refused".into()))
        .await;

    let (status, body) = send(&app.router, post_event(&event)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], true);
}

#[tokio::test]
async fn test_missing_object_is_not_found() {
    let app = test_app();
    let (status, body) = send(&app.router, get(&format!("/buckets/{}/nope.txt", PROCESSED))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], true);
}

#[tokio::test]
async fn test_relative_bucket_names_are_rejected() {
    let app = test_app();
    for uri in ["/buckets/%2E%2E", "/buckets/%2E", "/buckets/%2E%2E/secret.db"] {
        let (status, body) = send(&app.router, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"], true);
    }
}

#[tokio::test]
async fn test_empty_upload_is_rejected() {
    let app = test_app();
    let (status, _) = send(&app.router, put(&format!("/buckets/{}/a.mp3", INBOUND), b"")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.transcribe.started().await.is_empty());
}

#[tokio::test]
async fn test_invocations_endpoint() {
    let app = test_app();
    send(&app.router, put(&format!("/buckets/{}/a.mp3", INBOUND), b"audio")).await;
    send(&app.router, put(&format!("/buckets/{}/b.txt", INBOUND), b"text")).await;

    let (status, body) = send(&app.router, get("/invocations?limit=1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = send(&app.router, get("/invocations")).await;
    let outcomes: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["outcome"].as_str().unwrap())
        .collect();
    assert!(outcomes.contains(&"succeeded"));
    assert!(outcomes.contains(&"unrouted"));
}
