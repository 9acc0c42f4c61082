//! JWT bearer token verification against a JWKS endpoint.
//!
//! The key set is fetched lazily and cached in-process; a `kid` miss
//! triggers one refetch (to tolerate key rotation) before failing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;
use tracing::{instrument, warn};

use crate::claims::Claims;
use crate::config::OidcConfig;
use crate::error::AppError;
use crate::token::TokenVerifier;

const JWKS_CACHE_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kty: String,
    kid: Option<String>,
    alg: Option<String>,
    #[serde(rename = "use")]
    #[allow(dead_code)]
    usage: Option<String>,
    n: Option<String>,
    e: Option<String>,
    crv: Option<String>,
    x: Option<String>,
    y: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

struct CachedJwks {
    fetched_at: Instant,
    keys: JwkSet,
}

pub struct JwtTokenVerifier {
    config: OidcConfig,
    http: reqwest::Client,
    cache: RwLock<Option<CachedJwks>>,
}

impl JwtTokenVerifier {
    pub fn new(config: OidcConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            cache: RwLock::new(None),
        }
    }

    async fn jwks(&self, force_refresh: bool) -> Result<Arc<JwkSet>, AppError> {
        if !force_refresh {
            if let Some(cached) = self.cache.read().as_ref() {
                if cached.fetched_at.elapsed() < JWKS_CACHE_TTL {
                    return Ok(Arc::new(cached.keys.clone()));
                }
            }
        }

        let keys: JwkSet = self
            .http
            .get(&self.config.jwks_url)
            .send()
            .await
            .map_err(|e| AppError::internal("token", "jwks_fetch", "DISC-JWKS-FETCH", e))?
            .json()
            .await
            .map_err(|e| AppError::internal("token", "jwks_parse", "DISC-JWKS-PARSE", e))?;

        *self.cache.write() = Some(CachedJwks {
            fetched_at: Instant::now(),
            keys: keys.clone(),
        });
        Ok(Arc::new(keys))
    }

    fn decoding_key(jwk: &Jwk) -> Result<DecodingKey, AppError> {
        match jwk.kty.as_str() {
            "RSA" => {
                let (Some(n), Some(e)) = (&jwk.n, &jwk.e) else {
                    return Err(AppError::unauthenticated("decode_key", "RSA JWK missing n/e"));
                };
                DecodingKey::from_rsa_components(n, e)
                    .map_err(|e| AppError::unauthenticated("decode_key", format!("malformed RSA JWK: {e}")))
            }
            "EC" => {
                let (Some(x), Some(y)) = (&jwk.x, &jwk.y) else {
                    return Err(AppError::unauthenticated("decode_key", "EC JWK missing x/y"));
                };
                DecodingKey::from_ec_components(x, y)
                    .map_err(|e| AppError::unauthenticated("decode_key", format!("malformed EC JWK: {e}")))
            }
            other => Err(AppError::unauthenticated(
                "decode_key",
                format!("unsupported key type: {other}"),
            )),
        }
    }

    fn algorithm(jwk: &Jwk) -> Result<Algorithm, AppError> {
        match jwk.alg.as_deref().unwrap_or("") {
            "RS256" => Ok(Algorithm::RS256),
            "RS384" => Ok(Algorithm::RS384),
            "RS512" => Ok(Algorithm::RS512),
            "ES256" => Ok(Algorithm::ES256),
            "ES384" => Ok(Algorithm::ES384),
            _ => match jwk.kty.as_str() {
                "RSA" => Ok(Algorithm::RS256),
                "EC" => match jwk.crv.as_deref() {
                    Some("P-384") => Ok(Algorithm::ES384),
                    _ => Ok(Algorithm::ES256),
                },
                other => Err(AppError::unauthenticated(
                    "decode_key",
                    format!("cannot infer algorithm for key type {other}"),
                )),
            },
        }
    }
}

#[async_trait]
impl TokenVerifier for JwtTokenVerifier {
    #[instrument(skip_all)]
    async fn verify(&self, bearer_token: &str) -> Result<Claims, AppError> {
        let header = decode_header(bearer_token)
            .map_err(|e| AppError::unauthenticated("decode_header", format!("malformed token: {e}")))?;

        let mut keys = self.jwks(false).await?;
        let mut jwk = keys.keys.iter().find(|k| k.kid == header.kid);
        if jwk.is_none() {
            warn!(kid = ?header.kid, "jwks cache miss, refetching");
            keys = self.jwks(true).await?;
            jwk = keys.keys.iter().find(|k| k.kid == header.kid);
        }
        let jwk = jwk.ok_or_else(|| AppError::unauthenticated("find_key", "no matching key id in jwks"))?;

        let decoding_key = Self::decoding_key(jwk)?;
        let algorithm = Self::algorithm(jwk)?;

        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);
        validation.validate_exp = true;

        let token_data = decode::<std::collections::HashMap<String, Value>>(bearer_token, &decoding_key, &validation)
            .map_err(|e| AppError::unauthenticated("verify_signature", format!("token rejected: {e}")))?;

        let claims = Claims::from_map(token_data.claims.into_iter().collect());

        if let Some(typ) = claims.get_string("typ") {
            if !typ.is_empty() && !typ.eq_ignore_ascii_case("bearer") {
                return Err(AppError::unauthenticated("check_typ", "token typ is not Bearer"));
            }
        }

        if !self.config.required_scopes.is_empty()
            && !self.config.required_scopes.iter().any(|s| claims.has_scope(s))
        {
            return Err(AppError::insufficient_scope(format!(
                "token missing one of required scopes: {:?}",
                self.config.required_scopes
            )));
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rsa_jwk(alg: Option<&str>) -> Jwk {
        Jwk {
            kty: "RSA".to_string(),
            kid: Some("k1".to_string()),
            alg: alg.map(str::to_string),
            usage: None,
            n: Some("n".to_string()),
            e: Some("e".to_string()),
            crv: None,
            x: None,
            y: None,
        }
    }

    fn ec_jwk(crv: Option<&str>) -> Jwk {
        Jwk {
            kty: "EC".to_string(),
            kid: Some("k1".to_string()),
            alg: None,
            usage: None,
            n: None,
            e: None,
            crv: crv.map(str::to_string),
            x: Some("x".to_string()),
            y: Some("y".to_string()),
        }
    }

    #[test]
    fn algorithm_prefers_explicit_alg_over_inference() {
        assert_eq!(JwtTokenVerifier::algorithm(&rsa_jwk(Some("RS512"))).unwrap(), Algorithm::RS512);
    }

    #[test]
    fn algorithm_falls_back_to_key_type_inference() {
        assert_eq!(JwtTokenVerifier::algorithm(&rsa_jwk(None)).unwrap(), Algorithm::RS256);
        assert_eq!(JwtTokenVerifier::algorithm(&ec_jwk(None)).unwrap(), Algorithm::ES256);
        assert_eq!(JwtTokenVerifier::algorithm(&ec_jwk(Some("P-384"))).unwrap(), Algorithm::ES384);
    }

    #[test]
    fn decoding_key_rejects_rsa_jwk_missing_components() {
        let mut jwk = rsa_jwk(None);
        jwk.n = None;
        assert!(JwtTokenVerifier::decoding_key(&jwk).is_err());
    }

    #[test]
    fn decoding_key_accepts_well_formed_ec_jwk() {
        // x/y are not valid base64url in this fixture; decoding_key should
        // surface that as an error rather than panicking.
        assert!(JwtTokenVerifier::decoding_key(&ec_jwk(None)).is_err());
    }
}
