//! Domain error model.
//!
//! Every failure in the backend surfaces as a `DomainError`: a stable
//! machine-readable code, a human message, and an HTTP-equivalent status.
//! The API boundary maps these one-to-one onto transport responses.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Stable machine-readable error codes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    Conflict,
    Unauthorized,
    Forbidden,
    TooManyRequests,
    DatabaseError,
}

impl ErrorCode {
    /// Wire rendering of the code (matches the serde representation).
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::TooManyRequests => "TOO_MANY_REQUESTS",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
        }
    }
}

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures plus the one
/// infrastructure case (`Database`) the repository layer is allowed to raise.
/// Already-typed `DomainError`s must be re-thrown unchanged, never rewrapped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (optionally attributed to a field).
    #[error("validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// A referenced entity is absent.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A uniqueness or state conflict (duplicate pending invitation, slug
    /// collision, already-processed invitation, ...).
    #[error("conflict: {0}")]
    Conflict(String),

    /// No or invalid identity.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Identity present but insufficient role/permission.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Rate limit exceeded.
    #[error("too many requests: {0}")]
    TooManyRequests(String),

    /// Store-level failure or invariant violation, tagged with the
    /// repository operation that raised it.
    #[error("database error in {operation}: {message}")]
    Database { operation: String, message: String },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: None,
        }
    }

    pub fn validation_field(msg: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn database(operation: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Database {
            operation: operation.into(),
            message: msg.into(),
        }
    }

    /// Stable code for the API boundary.
    pub fn code(&self) -> ErrorCode {
        match self {
            DomainError::Validation { .. } => ErrorCode::ValidationError,
            DomainError::NotFound { .. } => ErrorCode::NotFound,
            DomainError::Conflict(_) => ErrorCode::Conflict,
            DomainError::Unauthorized(_) => ErrorCode::Unauthorized,
            DomainError::Forbidden(_) => ErrorCode::Forbidden,
            DomainError::TooManyRequests(_) => ErrorCode::TooManyRequests,
            DomainError::Database { .. } => ErrorCode::DatabaseError,
        }
    }

    /// HTTP-equivalent status for the code.
    pub fn status(&self) -> u16 {
        match self.code() {
            ErrorCode::ValidationError => 400,
            ErrorCode::NotFound => 404,
            ErrorCode::Conflict => 409,
            ErrorCode::Unauthorized => 401,
            ErrorCode::Forbidden => 403,
            ErrorCode::TooManyRequests => 429,
            ErrorCode::DatabaseError => 500,
        }
    }

    /// Offending field name, when the error is field-attributed.
    pub fn field(&self) -> Option<&str> {
        match self {
            DomainError::Validation { field, .. } => field.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_expected_statuses() {
        let cases = [
            (DomainError::validation("bad"), ErrorCode::ValidationError, 400),
            (DomainError::not_found("category", 7), ErrorCode::NotFound, 404),
            (DomainError::conflict("dup"), ErrorCode::Conflict, 409),
            (DomainError::unauthorized("no token"), ErrorCode::Unauthorized, 401),
            (DomainError::forbidden("viewer"), ErrorCode::Forbidden, 403),
            (
                DomainError::TooManyRequests("slow down".into()),
                ErrorCode::TooManyRequests,
                429,
            ),
            (
                DomainError::database("delete", "0 rows affected"),
                ErrorCode::DatabaseError,
                500,
            ),
        ];

        for (err, code, status) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(err.status(), status);
        }
    }

    #[test]
    fn validation_field_is_surfaced() {
        let err = DomainError::validation_field("must not be empty", "email");
        assert_eq!(err.field(), Some("email"));
        assert_eq!(DomainError::validation("x").field(), None);
    }

    #[test]
    fn not_found_carries_entity_and_id() {
        let err = DomainError::not_found("invitation", 42);
        assert_eq!(err.to_string(), "invitation not found: 42");
    }
}
