use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use tallybook_core::DomainError;

/// Map a domain error to its transport shape: stable code, message, and the
/// offending field for validation failures.
pub fn domain_error_response(err: &DomainError) -> axum::response::Response {
    let status =
        StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut body = json!({
        "error": err.code().as_str(),
        "message": err.to_string(),
    });
    if let Some(field) = err.field() {
        body["field"] = json!(field);
    }

    (status, axum::Json(body)).into_response()
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Normalize a non-domain failure at the outer boundary. The original
/// message is preserved as the cause, never swallowed.
pub fn internal_error(err: impl std::fmt::Display) -> axum::response::Response {
    tracing::error!(error = %err, "unhandled internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        axum::Json(json!({
            "error": "INTERNAL_ERROR",
            "message": "internal error",
            "cause": err.to_string(),
        })),
    )
        .into_response()
}
