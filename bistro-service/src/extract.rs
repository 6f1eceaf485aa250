//! `Json` and `Query` wrappers whose rejections use the service error envelope.

use axum::extract::{FromRequest, FromRequestParts};
use common_http_errors::ApiError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);
