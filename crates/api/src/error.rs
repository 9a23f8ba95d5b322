//! Maps `CoreError` onto the addon protocol's HTTP responses. Callers never
//! see internal error detail; only a malformed `(type, id)` is distinguished
//! from "something went wrong".

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use streamforge_core::error::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::Core(core_error) = self;
        let (status, message) = match &core_error {
            CoreError::InvalidRequest { reason } => (StatusCode::BAD_REQUEST, reason.clone()),
            _ => {
                tracing::error!(error = %core_error, "stream request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
