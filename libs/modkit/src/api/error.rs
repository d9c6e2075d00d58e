use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::{DbErr, SqlErr};

use crate::api::problem::{Problem, ProblemResponse, ValidationError};

/// Unified error type for every viewset handler.
///
/// Handlers propagate with `?` and convert once at the boundary through
/// [`ApiError::to_problem`], which keeps internal details in the logs only.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    /// Field-level validation failures (400).
    #[error("validation failed: {}", summarize(.0))]
    Validation(Vec<ValidationError>),

    /// The requested object or resource does not exist for this caller (404).
    #[error("{0}")]
    NotFound(String),

    /// A written object fell outside the caller's permitted queryset.
    /// Rendered as 404 so the caller learns nothing about the object.
    #[error("object does not exist")]
    ObjectDoesNotExist,

    /// Export template could not be rendered.
    #[error("template error: {0}")]
    Template(String),

    #[error(transparent)]
    Database(#[from] DbErr),

    #[error("internal error: {0}")]
    Internal(String),
}

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.pointer, e.detail))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ApiError {
    /// Single field error at a JSON pointer.
    pub fn invalid(pointer: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Validation(vec![ValidationError::new(pointer, detail)])
    }

    /// Single field error for a top-level field name.
    pub fn field(name: &str, detail: impl Into<String>) -> Self {
        Self::Validation(vec![ValidationError::field(name, detail)])
    }

    pub fn not_found() -> Self {
        Self::NotFound("Not found.".to_string())
    }

    /// Body could not be deserialized into the write shape. A missing field
    /// is reported against that field.
    pub fn malformed(err: serde_json::Error) -> Self {
        let msg = err.to_string();
        if let Some(name) = msg
            .strip_prefix("missing field `")
            .and_then(|rest| rest.split('`').next())
        {
            return Self::field(name, "This field is required.");
        }
        Self::invalid("", msg)
    }

    /// Prefix validation pointers with the element index of a list payload.
    pub fn at_index(self, index: usize) -> Self {
        match self {
            Self::Validation(errors) => Self::Validation(
                errors.into_iter().map(|e| e.under_index(index)).collect(),
            ),
            other => other,
        }
    }

    /// Render as RFC 9457 problem for `instance` (the request path).
    pub fn to_problem(&self, instance: &str) -> ProblemResponse {
        let problem = match self {
            Self::Validation(errors) => {
                tracing::debug!(errors = %summarize(errors), "request failed validation");
                Problem::new(StatusCode::BAD_REQUEST, "Validation error", "Invalid input")
                    .with_code("VALIDATION")
                    .with_errors(errors.clone())
            }
            Self::NotFound(detail) => {
                Problem::new(StatusCode::NOT_FOUND, "Not Found", detail).with_code("NOT_FOUND")
            }
            Self::ObjectDoesNotExist => {
                tracing::warn!("write produced an object outside the caller's queryset");
                Problem::new(StatusCode::NOT_FOUND, "Not Found", "Not found.")
                    .with_code("NOT_FOUND")
            }
            Self::Template(msg) => {
                tracing::error!(error = %msg, "export template rendering failed");
                Problem::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error",
                    "Export template could not be rendered",
                )
                .with_code("EXPORT_TEMPLATE")
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                Problem::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error",
                    "An internal error occurred",
                )
                .with_code("INTERNAL")
            }
            Self::Database(err) => match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(msg)) => {
                    tracing::debug!(error = %msg, "unique constraint violation");
                    Problem::new(
                        StatusCode::BAD_REQUEST,
                        "Validation error",
                        "An object with these values already exists",
                    )
                    .with_code("VALIDATION")
                }
                Some(SqlErr::ForeignKeyConstraintViolation(msg)) => {
                    tracing::debug!(error = %msg, "foreign key violation");
                    Problem::new(
                        StatusCode::BAD_REQUEST,
                        "Validation error",
                        "A referenced object does not exist",
                    )
                    .with_code("VALIDATION")
                }
                _ => {
                    tracing::error!(error = ?err, "Database error occurred");
                    Problem::new(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal error",
                        "An internal database error occurred",
                    )
                    .with_code("INTERNAL_DB")
                }
            },
        };

        let type_url = format!("https://errors.example.com/{}", problem.code);
        let problem = problem.with_type(type_url).with_instance(instance);
        ProblemResponse(problem)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        // No request context here; handlers use `to_problem` with the real path.
        self.to_problem("/").into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_index_only_touches_validation() {
        let e = ApiError::field("name", "required").at_index(2);
        match e {
            ApiError::Validation(errs) => assert_eq!(errs[0].pointer, "/2/name"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            ApiError::ObjectDoesNotExist.at_index(1),
            ApiError::ObjectDoesNotExist
        ));
    }

    #[test]
    fn missing_field_points_at_field() {
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Body {
            name: String,
        }
        let err = serde_json::from_str::<Body>("{}").unwrap_err();
        match ApiError::malformed(err) {
            ApiError::Validation(errs) => {
                assert_eq!(errs[0].pointer, "/name");
                assert_eq!(errs[0].detail, "This field is required.");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn conformance_failure_renders_as_not_found() {
        let p = ApiError::ObjectDoesNotExist.to_problem("/api/tenancy/tenants/");
        assert_eq!(p.0.status, 404);
        assert_eq!(p.0.code, "NOT_FOUND");
        assert_eq!(p.0.instance, "/api/tenancy/tenants/");
    }

    #[test]
    fn validation_carries_field_errors() {
        let p = ApiError::field("slug", "Enter a valid slug.").to_problem("/x/");
        assert_eq!(p.0.status, 400);
        let errors = p.0.errors.expect("errors");
        assert_eq!(errors[0].pointer, "/slug");
    }

    #[test]
    fn generic_db_errors_hide_details() {
        let p = ApiError::Database(DbErr::Custom("secret table".into())).to_problem("/");
        assert_eq!(p.0.status, 500);
        assert!(!p.0.detail.contains("secret"));
    }
}
