use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use larp_derive::api_model;

/// JSON body of every failed request.
#[api_model]
pub struct ErrorBody {
    /// Stable machine-readable kind, e.g. `character-not-found`.
    pub error: String,
    pub message: String,
}

impl ErrorBody {
    /// Builds the response for an error exposing `kind()` and `status_code()`.
    pub fn respond(status: u16, kind: &str, message: impl ToString) -> Response {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(kind, status = status.as_u16(), "request failed");
        }
        let body = Self { error: kind.to_owned(), message: message.to_string() };
        (status, Json(body)).into_response()
    }
}
