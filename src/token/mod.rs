//! Token verification: turns a bearer credential into verified `Claims`.

pub mod jwt;
pub mod static_verifier;

use async_trait::async_trait;

use crate::claims::Claims;
use crate::error::AppError;

/// Verifies a bearer token string and returns the claims it carries.
/// Implementations must check signature, issuer, audience and expiry
/// before returning; a token that fails any check is `Unauthenticated`.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, bearer_token: &str) -> Result<Claims, AppError>;
}

pub use jwt::JwtTokenVerifier;
pub use static_verifier::StaticTokenVerifier;
