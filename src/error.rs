//! Error taxonomy for the discovery service.
//!
//! Mirrors the kind-not-type-name taxonomy described by the spec: every
//! error that can reach an HTTP response carries a stable `code`, the
//! component/operation that raised it, and a detail string safe to show
//! to callers. Underlying causes (storage errors, parse errors) are
//! logged but never echoed back.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

/// The error kinds named in the spec's error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    BadRequest,
    Unauthenticated,
    InsufficientScope,
    Forbidden,
    NotFound,
    Conflict,
    Internal,
    PolicyParse,
    PolicySchema,
}

impl ErrorKind {
    fn status(self) -> StatusCode {
        match self {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::InsufficientScope => StatusCode::FORBIDDEN,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::PolicyParse | ErrorKind::PolicySchema => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A structured, user-facing error produced anywhere in the request path.
#[derive(Debug, thiserror::Error)]
#[error("{component}.{operation}: {detail}")]
pub struct AppError {
    pub kind: ErrorKind,
    pub component: &'static str,
    pub operation: &'static str,
    pub detail: String,
}

impl AppError {
    pub fn new(
        kind: ErrorKind,
        component: &'static str,
        operation: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            component,
            operation,
            detail: detail.into(),
        }
    }

    pub fn bad_request(component: &'static str, operation: &'static str, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, component, operation, detail)
    }

    pub fn unauthenticated(operation: &'static str, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthenticated, "guard", operation, detail)
    }

    pub fn insufficient_scope(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InsufficientScope, "guard", "scope_check", detail)
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, "policy", "authorize", detail)
    }

    pub fn not_found(component: &'static str, operation: &'static str, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, component, operation, detail)
    }

    pub fn conflict(component: &'static str, operation: &'static str, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, component, operation, detail)
    }

    /// Wraps an underlying (unexposed) cause as an `INTERNAL` error with a
    /// short, stable machine code. The cause is logged here, not returned.
    pub fn internal(component: &'static str, operation: &'static str, code: &str, cause: impl std::fmt::Display) -> Self {
        tracing::error!(component, operation, code, %cause, "internal error");
        Self::new(ErrorKind::Internal, component, operation, code.to_string())
    }
}

/// Wire form of an `AppError`: `{code, component, operation, detail}`.
#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    code: ErrorKind,
    component: &'static str,
    operation: &'static str,
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.kind.status();
        let body = ErrorEnvelope {
            code: self.kind,
            component: self.component,
            operation: self.operation,
            detail: self.detail,
        };
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
