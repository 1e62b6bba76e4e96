#![cfg(feature = "web")]

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use sheetx::app::{AppState, router};
use sheetx::store::SqliteStore;
use sheetx::uploads::UploadDir;

fn app(dir: &tempfile::TempDir) -> Router {
    router(Arc::new(AppState {
        store: SqliteStore::open_in_memory().unwrap(),
        uploads: UploadDir::new(dir.path()),
    }))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn sheet_crud() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir);

    let (status, body) = send_json(&app, json_request("POST", "/api/sheets", json!({"title": "Order 1"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["sheet"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["sheet"]["data"]["activeSheet"], "综合");
    assert_eq!(body["sheet"]["data"]["masterData"].as_array().unwrap().len(), 100);

    let patch = json!({"data": {"activeSheet": "出货", "masterData": [{"productName": "gear"}]}});
    let (status, body) = send_json(&app, json_request("PUT", &format!("/api/sheets/{}", id), patch)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sheet"]["title"], "Order 1");
    assert_eq!(body["sheet"]["data"]["masterData"][0]["productName"], "gear");
    assert_eq!(body["sheet"]["data"]["masterData"].as_array().unwrap().len(), 100);

    let (status, body) = send_json(&app, get(&format!("/api/sheets/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sheet"]["data"]["activeSheet"], "出货");

    let (_, body) = send_json(&app, get("/api/sheets")).await;
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    let (_, body) = send_json(&app, get("/api/sheets?q=order")).await;
    assert_eq!(body["items"][0]["id"], id.as_str());
    let (_, body) = send_json(&app, get("/api/sheets?q=zzz")).await;
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn create_without_body_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir);
    let request = Request::builder().method("POST").uri("/api/sheets").body(Body::empty()).unwrap();
    let (status, body) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["sheet"]["title"], "Untitled");
}

#[tokio::test]
async fn unknown_sheet_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir);
    let (status, body) = send_json(&app, get("/api/sheets/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("missing"));

    let (status, _) = send_json(&app, json_request("PUT", "/api/sheets/missing", json!({"title": "x"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn uploads_validate_and_serve() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir);

    let upload = |ct: &str, body: &'static [u8]| {
        Request::builder()
            .method("POST")
            .uri("/api/uploads")
            .header(header::CONTENT_TYPE, ct)
            .header("x-sheet-id", "sheet-1")
            .body(Body::from(body))
            .unwrap()
    };

    let (status, _) = send(&app, upload("text/plain", b"hello")).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let (status, _) = send(&app, upload("image/png", b"")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send_json(&app, upload("image/gif", b"GIF89a")).await;
    assert_eq!(status, StatusCode::OK);
    let url = body["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/uploads/sheet-1/") && url.ends_with(".gif"));

    let (status, bytes) = send(&app, get(&url)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"GIF89a");
}

#[tokio::test]
async fn print_reports() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(&dir);
    let data = json!({
        "masterData": [
            {"productName": "gear", "isOutsourced": true},
            {"productName": "shaft"}
        ],
        "outsourcingData": {"counterpartName": "Acme"}
    });
    let (_, body) = send_json(&app, json_request("POST", "/api/sheets", json!({"data": data}))).await;
    let id = body["sheet"]["id"].as_str().unwrap().to_string();

    let (status, bytes) = send(&app, get(&format!("/api/sheets/{}/print/outsourcing", id))).await;
    assert_eq!(status, StatusCode::OK);
    let csv = String::from_utf8(bytes).unwrap();
    assert!(csv.contains("对方名称,Acme"));
    assert!(csv.contains("1,,gear,,,"));
    assert!(!csv.contains("shaft"));

    let (status, bytes) = send(&app, get(&format!("/api/sheets/{}/print/shipping?format=xlsx", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&bytes[..2], b"PK");

    let (status, _) = send(&app, get(&format!("/api/sheets/{}/print/invoice", id))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, get(&format!("/api/sheets/{}/print/shipping?format=pdf", id))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
