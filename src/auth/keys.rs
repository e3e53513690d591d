//! Signing key lookup

use super::{AuthError, Result};
use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::DecodingKey;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves a token's `kid` to a verification key
#[async_trait]
pub trait KeyEngine: Send + Sync {
    async fn signing_key(&self, kid: &str) -> Result<DecodingKey>;
}

/// Fetches keys from a JWKS endpoint and caches them by `kid`.
///
/// A miss triggers a refetch, but never more often than `min_refresh`.
pub struct JwksKeyEngine {
    jwks_uri: String,
    http: reqwest::Client,
    keys: RwLock<HashMap<String, DecodingKey>>,
    last_fetch: Mutex<Option<Instant>>,
    min_refresh: Duration,
}

impl std::fmt::Debug for JwksKeyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksKeyEngine")
            .field("jwks_uri", &self.jwks_uri)
            .finish()
    }
}

impl JwksKeyEngine {
    pub fn new(jwks_uri: impl Into<String>) -> Self {
        Self {
            jwks_uri: jwks_uri.into(),
            http: reqwest::Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build()
                .unwrap_or_default(),
            keys: RwLock::new(HashMap::new()),
            last_fetch: Mutex::new(None),
            // ten requests per minute
            min_refresh: Duration::from_secs(6),
        }
    }

    pub fn with_min_refresh(mut self, min_refresh: Duration) -> Self {
        self.min_refresh = min_refresh;
        self
    }

    async fn refresh(&self) -> Result<()> {
        let mut last_fetch = self.last_fetch.lock().await;
        if let Some(at) = *last_fetch {
            if at.elapsed() < self.min_refresh {
                debug!("Skipping JWKS refresh");
                return Ok(());
            }
        }
        *last_fetch = Some(Instant::now());

        let jwks: JwkSet = self
            .http
            .get(&self.jwks_uri)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        let mut fetched = HashMap::new();
        for jwk in &jwks.keys {
            let Some(kid) = jwk.common.key_id.clone() else {
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    fetched.insert(kid, key);
                }
                Err(e) => debug!(kid = %kid, error = %e, "Skipping unusable JWK"),
            }
        }

        info!(uri = %self.jwks_uri, keys = fetched.len(), "Fetched signing keys");
        *self.keys.write().await = fetched;
        Ok(())
    }
}

#[async_trait]
impl KeyEngine for JwksKeyEngine {
    async fn signing_key(&self, kid: &str) -> Result<DecodingKey> {
        if let Some(key) = self.keys.read().await.get(kid) {
            return Ok(key.clone());
        }

        self.refresh().await?;
        self.keys
            .read()
            .await
            .get(kid)
            .cloned()
            .ok_or_else(|| AuthError::KeyNotFound(kid.to_string()))
    }
}

/// Fixed in-memory keys
#[derive(Clone, Default)]
pub struct StaticKeyEngine {
    keys: HashMap<String, DecodingKey>,
}

impl StaticKeyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, kid: impl Into<String>, key: DecodingKey) -> Self {
        self.keys.insert(kid.into(), key);
        self
    }

    /// Add an RSA public key in PEM form
    pub fn with_rsa_pem(self, kid: impl Into<String>, pem: &[u8]) -> Result<Self> {
        let key = DecodingKey::from_rsa_pem(pem).map_err(|e| AuthError::KeyFetch(e.to_string()))?;
        Ok(self.with_key(kid, key))
    }
}

#[async_trait]
impl KeyEngine for StaticKeyEngine {
    async fn signing_key(&self, kid: &str) -> Result<DecodingKey> {
        self.keys
            .get(kid)
            .cloned()
            .ok_or_else(|| AuthError::KeyNotFound(kid.to_string()))
    }
}
