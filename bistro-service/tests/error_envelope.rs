mod support;

use std::sync::Arc;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Method, Request, StatusCode};
use serde_json::{json, Value};
use support::{TestApp, UnavailableStore};

fn raw_post(uri: &str, content_type: Option<&str>, body: &'static str) -> Result<Request<Body>> {
    let mut builder = Request::builder().method(Method::POST).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header(CONTENT_TYPE, content_type);
    }
    Ok(builder.body(Body::from(body))?)
}

fn assert_bad_request(status: StatusCode, body: &Value) {
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!(true));
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn non_object_user_body_is_a_bad_request() -> Result<()> {
    let app = TestApp::new()?;
    let (status, body) = app
        .send(raw_post("/users", Some("application/json"), "[1,2]")?)
        .await?;
    assert_bad_request(status, &body);
    assert!(app.state.users().list_all().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn cart_body_without_content_type_is_a_bad_request() -> Result<()> {
    let app = TestApp::new()?;
    let (status, body) = app
        .send(raw_post("/carts", None, r#"{"email":"ada@bistro.example"}"#)?)
        .await?;
    assert_bad_request(status, &body);
    Ok(())
}

#[tokio::test]
async fn unparsable_claim_is_a_bad_request() -> Result<()> {
    let app = TestApp::new()?;
    let (status, body) = app
        .send(raw_post("/jwt", Some("application/json"), "{\"email\": ")?)
        .await?;
    assert_bad_request(status, &body);
    Ok(())
}

#[tokio::test]
async fn repeated_email_query_is_a_bad_request() -> Result<()> {
    let app = TestApp::new()?;
    let token = app.token_for("ada@bistro.example")?;
    let (status, body) = app
        .get("/carts?email=ada@bistro.example&email=bob@bistro.example", Some(&token))
        .await?;
    assert_bad_request(status, &body);
    Ok(())
}

#[tokio::test]
async fn rejected_bodies_are_counted_by_code() -> Result<()> {
    let app = TestApp::new()?;
    app.send(raw_post("/jwt", Some("application/json"), "nope")?).await?;

    let (_, metrics) = app.get("/metrics", None).await?;
    let text = metrics.as_str().unwrap_or_default();
    assert!(text.contains("http_errors_total{code=\"invalid_body\",status=\"400\"} 1"));
    Ok(())
}

#[tokio::test]
async fn store_failure_during_admin_check_is_internal_error() -> Result<()> {
    let app = TestApp::with_store(Arc::new(UnavailableStore))?;
    let token = app.token_for("owner@bistro.example")?;

    let (status, body) = app.get("/users", Some(&token)).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": true, "message": "internal server error"}));
    Ok(())
}

#[tokio::test]
async fn store_failure_on_catalog_is_internal_error() -> Result<()> {
    let app = TestApp::with_store(Arc::new(UnavailableStore))?;
    let (status, body) = app.get("/menu", None).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], json!(true));
    Ok(())
}
