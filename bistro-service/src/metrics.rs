use anyhow::Result;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use common_http_errors::ERROR_CODE_HEADER;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::AppState;

#[derive(Clone)]
pub struct ServiceMetrics {
    registry: Registry,
    tokens_issued: IntCounter,
    registrations: IntCounterVec,
    access_denied: IntCounterVec,
    http_errors: IntCounterVec,
}

impl ServiceMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let tokens_issued = IntCounter::new(
            "bistro_tokens_issued_total",
            "Count of bearer tokens issued",
        )?;
        registry.register(Box::new(tokens_issued.clone()))?;

        let registrations = IntCounterVec::new(
            Opts::new(
                "bistro_registrations_total",
                "Count of user registration calls grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(registrations.clone()))?;

        let access_denied = IntCounterVec::new(
            Opts::new(
                "bistro_access_denied_total",
                "Count of authenticated requests denied by ownership or role checks",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(access_denied.clone()))?;

        let http_errors = IntCounterVec::new(
            Opts::new(
                "http_errors_total",
                "Count of HTTP error responses emitted (status >= 400)",
            ),
            &["code", "status"],
        )?;
        registry.register(Box::new(http_errors.clone()))?;

        Ok(Self {
            registry,
            tokens_issued,
            registrations,
            access_denied,
            http_errors,
        })
    }

    pub fn token_issued(&self) {
        self.tokens_issued.inc();
    }

    pub fn registration(&self, outcome: &str) {
        self.registrations.with_label_values(&[outcome]).inc();
    }

    pub fn access_denied(&self, reason: &str) {
        self.access_denied.with_label_values(&[reason]).inc();
    }

    pub fn http_error(&self, code: &str, status: StatusCode) {
        self.http_errors
            .with_label_values(&[code, status.as_str()])
            .inc();
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}

/// Counts every error response by its `X-Error-Code` header. Responses
/// produced outside `ApiError` (extractor rejections) count as `unclassified`.
pub async fn track_http_errors(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        let code = response
            .headers()
            .get(ERROR_CODE_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("unclassified");
        state.metrics.http_error(code, status);
    }
    response
}
