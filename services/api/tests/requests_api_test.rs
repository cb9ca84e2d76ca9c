//! Drives the HTTP surface end to end over the in-memory store and a
//! temporary PDF directory.

use api_lib::adapters::{LocalPdfStorage, LogMailer};
use api_lib::config::Config;
use api_lib::web::{build_router, state::AppState};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use review_core::memory::MemoryDb;
use review_core::{ReviewWorkflow, TokenCodec};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const REQUESTER: &str = "requester@example.com";
const APPROVER: &str = "approver@example.com";
const PDF: &str = "JVBERi0xLjcKJSVFT0Y=";

struct TestApp {
    router: Router,
    _storage: TempDir,
}

fn app() -> TestApp {
    let storage = tempfile::tempdir().unwrap();
    let config = Arc::new(Config::from_lookup(|_| None).unwrap());
    let workflow = ReviewWorkflow::new(
        Arc::new(MemoryDb::new()),
        Arc::new(LocalPdfStorage::new(storage.path())),
        Arc::new(LogMailer),
        TokenCodec::legacy(),
        config.frontend_url.clone(),
    );
    let router = build_router(Arc::new(AppState { workflow, config })).unwrap();
    TestApp {
        router,
        _storage: storage,
    }
}

fn token(email: &str) -> String {
    TokenCodec::legacy().issue(email).into_inner()
}

fn creds(email: &str) -> String {
    format!("token={}&email={}", token(email), email)
}

fn position(page: u32) -> String {
    json!({
        "boundingRect": {"x1": 12.0, "y1": 40.0, "x2": 300.0, "y2": 72.0, "width": 816.0, "height": 1056.0},
        "rects": [],
        "pageNumber": page,
    })
    .to_string()
}

fn create_body() -> Value {
    json!({
        "requesterEmail": REQUESTER,
        "approverEmail": APPROVER,
        "subject": "Quarterly report sign-off",
        "pdf": PDF,
        "highlights": [
            {"type": "TEXT", "content": "Revenue grew 12%", "position": position(1)},
            {"type": "AREA", "content": "data:image/png;base64,iVBORw0KGgo=", "position": position(3)},
        ],
    })
}

async fn send(app: &TestApp, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes, _) = send_raw(app, method, uri, body.map(|b| b.to_string())).await;
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn send_raw(
    app: &TestApp,
    method: Method,
    uri: &str,
    body: Option<String>,
) -> (StatusCode, Vec<u8>, Option<String>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
    }
    let request = builder.body(body.map(Body::from).unwrap_or_else(Body::empty)).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec(), content_type)
}

async fn create(app: &TestApp) -> String {
    let (status, body) = send(app, Method::POST, "/requests", Some(create_body())).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["token"], token(REQUESTER));
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn full_review_round_trip() {
    let app = app();
    let id = create(&app).await;

    let (status, view) = send(&app, Method::GET, &format!("/requests/{id}?{}", creds(APPROVER)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["state"], "CREATED");
    assert_eq!(view["role"], "approver");
    assert_eq!(view["reviewedAt"], Value::Null);
    let highlights = view["highlights"].as_array().unwrap();
    assert_eq!(highlights.len(), 2);
    assert_eq!(highlights[0]["type"], "TEXT");
    assert_eq!(highlights[0]["content"], json!({"text": "Revenue grew 12%"}));
    assert_eq!(highlights[1]["type"], "AREA");
    assert_eq!(highlights[1]["position"]["pageNumber"], 3);
    assert!(highlights.iter().all(|h| h["status"].is_null()));

    let review = json!({"highlights": [
        {"id": highlights[0]["id"], "status": "APPROVED"},
        {"id": highlights[1]["id"], "status": "REJECTED"},
    ]});
    let (status, grant) = send(
        &app,
        Method::PATCH,
        &format!("/requests/{id}?{}", creds(APPROVER)),
        Some(review.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(grant["token"], token(APPROVER));

    let (_, view) = send(&app, Method::GET, &format!("/requests/{id}?{}", creds(REQUESTER)), None).await;
    assert_eq!(view["state"], "REVIEWED");
    assert_eq!(view["role"], "requester");
    assert!(view["reviewedAt"].is_string());
    assert_eq!(view["highlights"][0]["status"], "APPROVED");
    assert_eq!(view["highlights"][1]["status"], "REJECTED");
    assert_eq!(view["highlights"][0]["reviewedAt"], view["reviewedAt"]);

    let (status, error) = send(
        &app,
        Method::PATCH,
        &format!("/requests/{id}?{}", creds(APPROVER)),
        Some(review),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["code"], "GENERAL-002");
}

#[tokio::test]
async fn wrong_token_is_unauthorized_even_for_unknown_ids() {
    let app = app();
    let id = create(&app).await;
    let forged = format!("token={}&email={}", token("mallory@example.com"), APPROVER);

    for target in [id.as_str(), "6f9619ff-8b86-d011-b42d-00cf4fc964ff"] {
        let (status, error) = send(&app, Method::GET, &format!("/requests/{target}?{forged}"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error["code"], "REQUEST-003");
        assert_eq!(error["message"], "Invalid Token");
        assert_eq!(error["details"], Value::Null);
    }

    let (status, _) = send(&app, Method::GET, &format!("/requests/{id}"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_request_is_not_found() {
    let app = app();
    let (status, error) = send(
        &app,
        Method::GET,
        &format!("/requests/6f9619ff-8b86-d011-b42d-00cf4fc964ff?{}", creds(APPROVER)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["code"], "REQUEST-001");
}

#[tokio::test]
async fn only_the_approver_may_review() {
    let app = app();
    let id = create(&app).await;
    let (status, error) = send(
        &app,
        Method::PATCH,
        &format!("/requests/{id}?{}", creds(REQUESTER)),
        Some(json!({"highlights": []})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error["code"], "REQUEST-003");
}

#[tokio::test]
async fn validation_failures_use_the_error_envelope() {
    let app = app();
    let mut body = create_body();
    body["approverEmail"] = json!(REQUESTER);

    let (status, error) = send(&app, Method::POST, "/requests", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "GENERAL-002");
    assert_eq!(error["message"], "Validation error");
    assert!(error["details"]
        .as_array()
        .unwrap()
        .contains(&json!("requesterEmail should not be the same as approverEmail")));
}

#[tokio::test]
async fn wrong_typed_fields_are_reported_with_the_rest() {
    let app = app();
    let body = json!({
        "requesterEmail": 42,
        "approverEmail": "not-an-email",
        "subject": "",
        "pdf": "aGVsbG8=",
        "highlights": "none",
    });

    let (status, error) = send(&app, Method::POST, "/requests", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "GENERAL-002");
    assert_eq!(
        error["details"],
        json!([
            "requesterEmail must be a string",
            "approverEmail must be an email",
            "subject should not be empty",
            "pdf must be a base64 encoded PDF",
            "highlights must be an array",
        ])
    );

    let id = create(&app).await;
    let (status, error) = send(
        &app,
        Method::PATCH,
        &format!("/requests/{id}?{}", creds(APPROVER)),
        Some(json!({"highlights": [{"id": 1, "status": "APPROVED"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["details"], json!(["highlights[0].id must be a string"]));

    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/requests/{id}?{}", creds(REQUESTER)),
        Some(json!({"highlights": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_input_is_a_validation_error() {
    let app = app();
    let (status, _, _) = send_raw(&app, Method::POST, "/requests", Some("{not json".into())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, error) = send(&app, Method::GET, &format!("/requests/not-a-uuid?{}", creds(APPROVER)), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "GENERAL-002");
}

#[tokio::test]
async fn pdf_downloads() {
    let app = app();
    let id = create(&app).await;
    let (_, view) = send(&app, Method::GET, &format!("/requests/{id}?{}", creds(APPROVER)), None).await;
    let filename = view["pdfPath"].as_str().unwrap().trim_start_matches("pdf/").to_string();

    let (status, bytes, content_type) =
        send_raw(&app, Method::GET, &format!("/requests/pdf/{filename}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/pdf"));
    assert!(bytes.starts_with(b"%PDF-1.7"));

    let (status, gated, _) = send_raw(&app, Method::GET, &format!("/requests/{id}/pdf?{}", creds(APPROVER)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(gated, bytes);

    let (status, error) = send(&app, Method::GET, "/requests/pdf/missing.pdf", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["code"], "REQUEST-002");
}

#[tokio::test]
async fn requester_can_delete() {
    let app = app();
    let id = create(&app).await;

    let (status, _) = send(&app, Method::DELETE, &format!("/requests/{id}?{}", creds(APPROVER)), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, Method::DELETE, &format!("/requests/{id}?{}", creds(REQUESTER)), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = send(&app, Method::GET, &format!("/requests/{id}?{}", creds(APPROVER)), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = app();
    let (status, doc) = send(&app, Method::GET, "/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/requests/{id}"]["patch"].is_object());
    assert!(doc["components"]["schemas"]["ErrorBody"].is_object());
    let create = &doc["components"]["schemas"]["CreateRequestBody"];
    assert!(create["properties"]["requesterEmail"].is_object());
    assert!(doc["components"]["schemas"]["ReviewBody"]["properties"]["highlights"].is_object());
}
