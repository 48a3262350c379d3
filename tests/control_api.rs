use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};
use tower::ServiceExt;

use magic_booth::control::ControlPlane;
use magic_booth::delivery::DeliveryJob;
use magic_booth::filters::Filter;
use magic_booth::http::router;
use magic_booth::session::SessionHandle;

struct Api {
    app: Router,
    session: SessionHandle,
    print_rx: Receiver<DeliveryJob>,
}

fn api(event_mode: bool, temp_dir: &std::path::Path) -> Api {
    let session = SessionHandle::default();
    let (tx, print_rx) = mpsc::channel();
    let plane = ControlPlane::new(session.clone(), event_mode, tx, temp_dir).unwrap();
    Api {
        app: router(plane),
        session,
        print_rx,
    }
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_reports_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let api = api(false, dir.path());
    let (status, body) = call(&api.app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "status": "ok", "mode": "SINGLE", "filter": "STRANGER_THEME", "event_mode": false })
    );
}

#[tokio::test]
async fn set_filter_then_health_reflects_it() {
    let dir = tempfile::tempdir().unwrap();
    let api = api(false, dir.path());
    for filter in Filter::ALL {
        let (status, body) = call(&api.app, "POST", "/set_filter", Some(json!({ "filter": filter.name().to_lowercase() }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true, "filter": filter.name() }));

        let (_, health) = call(&api.app, "GET", "/health", None).await;
        assert_eq!(health["filter"], filter.name());
    }
}

#[tokio::test]
async fn invalid_filter_is_rejected_without_change() {
    let dir = tempfile::tempdir().unwrap();
    let api = api(false, dir.path());
    let before = api.session.snapshot();

    let (status, body) = call(&api.app, "POST", "/set_filter", Some(json!({ "filter": "SEPIA" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Invalid filter" }));

    let (status, _) = call(&api.app, "POST", "/set_filter", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(api.session.snapshot(), before);
}

#[tokio::test]
async fn set_mode_accepts_gif_alias() {
    let dir = tempfile::tempdir().unwrap();
    let api = api(false, dir.path());
    let (status, body) = call(&api.app, "POST", "/set_mode", Some(json!({ "mode": "gif" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "ANIMATED");

    let (status, body) = call(&api.app, "POST", "/set_mode", Some(json!({ "mode": "video" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid mode");
}

#[tokio::test]
async fn event_mode_locks_settings() {
    let dir = tempfile::tempdir().unwrap();
    let api = api(true, dir.path());

    let (status, body) = call(&api.app, "POST", "/set_mode", Some(json!({ "mode": "BURST" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({ "error": "Event Mode locked settings" }));

    let (status, _) = call(&api.app, "POST", "/set_filter", Some(json!({ "filter": "NOIR" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, health) = call(&api.app, "GET", "/health", None).await;
    assert_eq!(health["event_mode"], true);
    assert_eq!(health["mode"], "SINGLE");
}

#[tokio::test]
async fn print_without_url_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let api = api(false, dir.path());
    let (status, body) = call(&api.app, "POST", "/print", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Missing imageUrl" }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn print_downloads_then_queues() {
    // Serve a photo locally to stand in for the cloud bucket
    let photo: &'static [u8] = b"\xff\xd8remote-photo\xff\xd9";
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let bucket = Router::new().route("/public/magic_77.jpg", get(move || async move { photo }));
    tokio::spawn(async move { axum::serve(listener, bucket).await.unwrap() });

    let dir = tempfile::tempdir().unwrap();
    let api = api(false, dir.path());
    let url = format!("http://{}/public/magic_77.jpg?download=1", addr);
    let (status, body) = call(&api.app, "POST", "/print", Some(json!({ "imageUrl": url }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));

    let start = Instant::now();
    let job = loop {
        if let Ok(job) = api.print_rx.try_recv() {
            break job;
        }
        assert!(start.elapsed() < Duration::from_secs(5), "print job never queued");
        tokio::time::sleep(Duration::from_millis(20)).await;
    };
    assert_eq!(job.file_path, dir.path().join("magic_77.jpg"));
    assert_eq!(std::fs::read(&job.file_path).unwrap(), photo);
}
