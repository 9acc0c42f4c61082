//! An in-memory token verifier for tests and local development, keyed by
//! opaque token string rather than JWT signature.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::claims::Claims;
use crate::error::AppError;
use crate::token::TokenVerifier;

#[derive(Debug, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, Claims>,
}

impl StaticTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, claims: Claims) -> Self {
        self.tokens.insert(token.into(), claims);
        self
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, bearer_token: &str) -> Result<Claims, AppError> {
        self.tokens
            .get(bearer_token)
            .cloned()
            .ok_or_else(|| AppError::unauthenticated("verify", "unknown token"))
    }
}
