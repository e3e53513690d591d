//! Token verification

use super::keys::KeyEngine;
use super::{AuthError, Principal, Result};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct Claims {
    sub: Option<String>,
    scope: Option<String>,
}

/// Verifies RS256 bearer tokens for one audience and issuer
#[derive(Clone)]
pub struct AuthClient {
    audience: String,
    issuer: String,
    keys: Arc<dyn KeyEngine>,
}

impl std::fmt::Debug for AuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthClient")
            .field("audience", &self.audience)
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl AuthClient {
    pub fn new(
        audience: impl Into<String>,
        issuer: impl Into<String>,
        keys: Arc<dyn KeyEngine>,
    ) -> Self {
        Self {
            audience: audience.into(),
            issuer: issuer.into(),
            keys,
        }
    }

    /// Verify `token` and return its principal.
    ///
    /// A leading `Bearer ` is accepted and stripped.
    pub async fn authorize(&self, token: &str) -> Result<Principal> {
        let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();

        let header = decode_header(token).map_err(|e| {
            debug!(error = %e, "Undecodable token header");
            AuthError::InvalidToken
        })?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::IncorrectAlgorithm);
        }
        let kid = header.kid.ok_or(AuthError::InvalidToken)?;
        let key = self.keys.signing_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_issuer(&[self.issuer.as_str()]);

        let data = decode::<Claims>(token, &key, &validation).map_err(|e| {
            debug!(error = %e, "Token rejected");
            match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAudience
                | ErrorKind::InvalidIssuer
                | ErrorKind::ExpiredSignature
                | ErrorKind::ImmatureSignature => AuthError::VerificationFailed,
                ErrorKind::InvalidAlgorithm => AuthError::IncorrectAlgorithm,
                _ => AuthError::InvalidToken,
            }
        })?;

        match (data.claims.scope, data.claims.sub) {
            (Some(scope), Some(user_id)) => Ok(Principal { scope, user_id }),
            _ => Err(AuthError::InvalidToken),
        }
    }
}
