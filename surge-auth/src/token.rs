//! HS256 capability claims and the signing/verification service

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{AuthError, AuthResult};
use surge_config::AuthConfig;

/// Capability claim set authorizing one run
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CapabilityClaims {
    /// Subject (run id)
    pub sub: String,
    /// The resolved target URL this token is bound to
    pub target_url: String,
    /// Maximum requests a single batch call may carry
    pub count_per_batch: u32,
    /// Batch-call ceiling for the whole run
    pub max_batches: u32,
    /// Concurrency ceiling fixed at issuance from the tenant tier
    pub max_concurrency: u32,
    /// Issued at
    pub iat: i64,
    /// Expiration time
    pub exp: i64,
    /// Issuer
    pub iss: String,
}

/// Issues and verifies capability tokens
pub struct TokenService {
    issuer: String,
    ttl: Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            issuer: config.issuer.clone(),
            ttl: config.token_ttl,
            encoding_key: EncodingKey::from_secret(config.token_secret.as_ref()),
            decoding_key: DecodingKey::from_secret(config.token_secret.as_ref()),
        }
    }

    /// Token lifetime; doubles as the TTL for per-run server state
    /// (quota counters, cancellation flags).
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a claim set for one run. Tokens are issued once and never
    /// renewed; expiry is the hard outer timeout of the run.
    pub fn issue(
        &self,
        run_id: &str,
        target_url: &str,
        count_per_batch: u32,
        max_batches: u32,
        max_concurrency: u32,
    ) -> AuthResult<String> {
        let now = Utc::now();
        let claims = CapabilityClaims {
            sub: run_id.to_string(),
            target_url: target_url.to_string(),
            count_per_batch,
            max_batches,
            max_concurrency,
            iat: now.timestamp(),
            exp: (now + chrono::Duration::from_std(self.ttl).unwrap_or_default()).timestamp(),
            iss: self.issuer.clone(),
        };

        debug!(run_id, count_per_batch, max_batches, "issuing capability token");
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::SigningFailed(e.to_string()))
    }

    /// Verify a token against the (url, count) of one batch call.
    ///
    /// Fails closed: signature, expiry, issuer, target binding, and the
    /// per-batch count ceiling must all hold, in that order, with no
    /// partial trust on mismatch.
    pub fn verify(&self, token: &str, url: &str, count: u32) -> AuthResult<CapabilityClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = 0;

        let token_data =
            decode::<CapabilityClaims>(token, &self.decoding_key, &validation).map_err(|e| {
                warn!("capability token rejected: {}", e);
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                    _ => AuthError::InvalidToken(e.to_string()),
                }
            })?;

        let claims = token_data.claims;

        if claims.target_url != url {
            warn!(run_id = %claims.sub, "batch call for a target the token does not authorize");
            return Err(AuthError::TargetMismatch {
                requested: url.to_string(),
            });
        }

        if count > claims.count_per_batch {
            return Err(AuthError::CountExceedsGrant {
                requested: count,
                granted: claims.count_per_batch,
            });
        }

        Ok(claims)
    }
}
