//! Request guard middleware: the single choke point through which every
//! request passes before reaching a handler. Verifies the bearer token,
//! runs the policy engine, and attaches the resulting `Claims` and
//! optional `QueryFilter` to the request's extensions.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::{debug, instrument};

use crate::claims::Claims;
use crate::error::AppError;
use crate::http::state::AppState;
use crate::policy::{PolicyEngine, QueryFilter, Verdict};
use crate::token::TokenVerifier;

const BEARER_PREFIX: &str = "Bearer ";

/// Endpoints that never require a token, regardless of ABAC configuration.
const PUBLIC_PATHS: &[&str] = &["/health", "/description"];

/// Per-request context the guard attaches to `Request::extensions` for
/// downstream handlers to read.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub claims: Claims,
    pub filter: Option<QueryFilter>,
}

fn extract_bearer(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
}

#[instrument(skip_all, fields(path = %request.uri().path(), method = %request.method()))]
pub async fn request_guard(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = request.uri().path().to_string();
    let method = request.method().to_string();

    if PUBLIC_PATHS.contains(&path.as_str()) {
        debug!("bypassing guard for public endpoint");
        return Ok(next.run(request).await);
    }

    let token = extract_bearer(request.headers())
        .ok_or_else(|| AppError::unauthenticated("require_bearer", "missing bearer token"))?;
    let claims = state.token_verifier.verify(token).await?;

    let filter = if state.abac.enabled {
        let model = state
            .access_model
            .load()
            .ok_or_else(|| AppError::internal("guard", "authorize", "DISC-ABAC-NOMODEL", "access model not loaded"))?;
        let engine = PolicyEngine::new(&model);
        match engine.authorize(&method, &path, &claims) {
            Verdict::Allow { filter } => filter,
            Verdict::Deny { reason } => return Err(AppError::forbidden(reason)),
        }
    } else {
        None
    };

    let mut request = request;
    request.extensions_mut().insert(RequestContext { claims, filter });

    Ok(next.run(request).await)
}

pub trait RequestContextExt {
    fn request_context(&self) -> Option<&RequestContext>;
}

impl RequestContextExt for Request {
    fn request_context(&self) -> Option<&RequestContext> {
        self.extensions().get::<RequestContext>()
    }
}
