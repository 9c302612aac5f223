//! Applies credentials to outgoing requests
//!
//! Static credentials go straight onto the request. Google tokens are
//! fetched on first use, cached, and refreshed once they near expiry.

use super::types::{AuthConfig, CachedToken};
use crate::error::{Error, Result};
use crate::types::JwtAlgorithm;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

pub struct Authenticator {
    config: AuthConfig,
    token: Arc<RwLock<Option<CachedToken>>>,
    /// Used only for token endpoints
    http_client: Client,
}

impl Authenticator {
    pub fn new(config: AuthConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    /// Share an existing connection pool for token requests
    pub fn with_client(config: AuthConfig, http_client: Client) -> Self {
        Self {
            config,
            token: Arc::new(RwLock::new(None)),
            http_client,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Add credentials to a request
    pub async fn apply(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        match &self.config {
            AuthConfig::None => Ok(req),
            AuthConfig::Basic { username, password } => {
                Ok(req.basic_auth(username, Some(password)))
            }
            AuthConfig::Bearer { token } => Ok(req.bearer_auth(token)),
            AuthConfig::ServiceAccount { .. } | AuthConfig::MetadataServer { .. } => {
                Ok(req.bearer_auth(self.access_token().await?))
            }
        }
    }

    /// Forget the cached token so the next request fetches a fresh one
    pub async fn clear_cache(&self) {
        *self.token.write().await = None;
    }

    async fn access_token(&self) -> Result<String> {
        if let Some(token) = fresh(&*self.token.read().await) {
            return Ok(token);
        }

        let mut slot = self.token.write().await;
        // Concurrent callers queue on the write lock; only the first refreshes
        if let Some(token) = fresh(&slot) {
            return Ok(token);
        }

        let token = self.fetch_token().await?;
        let value = token.token.clone();
        *slot = Some(token);
        Ok(value)
    }

    async fn fetch_token(&self) -> Result<CachedToken> {
        match &self.config {
            AuthConfig::ServiceAccount {
                client_email,
                private_key,
                token_uri,
                scopes,
                algorithm,
                token_lifetime_seconds,
            } => {
                let assertion = Assertion {
                    iss: client_email.clone(),
                    scope: scopes.join(" "),
                    aud: token_uri.clone(),
                    iat: Utc::now().timestamp(),
                    exp: 0,
                }
                .sign(private_key, *algorithm, *token_lifetime_seconds)?;

                let form = [
                    ("grant_type", JWT_BEARER_GRANT),
                    ("assertion", assertion.as_str()),
                ];
                let req = self.http_client.post(token_uri).form(&form);
                let token = redeem(req, |message| Error::JwtGeneration {
                    message: format!("JWT token exchange failed with {message}"),
                })
                .await?;
                debug!("Obtained service account token for {}", client_email);
                Ok(token)
            }
            AuthConfig::MetadataServer { url } => {
                let req = self.http_client.get(url).header("Metadata-Flavor", "Google");
                redeem(req, |message| {
                    Error::auth(format!("Metadata token request failed with {message}"))
                })
                .await
            }
            AuthConfig::None | AuthConfig::Basic { .. } | AuthConfig::Bearer { .. } => {
                Err(Error::auth("Token refresh not supported for this auth type"))
            }
        }
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("needs_token", &self.config.needs_token())
            .finish_non_exhaustive()
    }
}

fn fresh(slot: &Option<CachedToken>) -> Option<String> {
    slot.as_ref()
        .filter(|token| !token.is_expired())
        .map(|token| token.token.clone())
}

/// Send a token request and read the OAuth2 token response
async fn redeem(
    req: RequestBuilder,
    rejected: impl FnOnce(String) -> Error,
) -> Result<CachedToken> {
    let response = req.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(rejected(format!("status {}: {body}", status.as_u16())));
    }

    let token: TokenResponse = response.json().await?;
    Ok(match token.expires_in {
        Some(seconds) => CachedToken::expires_in(token.access_token, seconds),
        None => CachedToken::new(token.access_token, None),
    })
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Claims of the service account JWT grant
#[derive(Debug, Serialize)]
struct Assertion {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

impl Assertion {
    fn sign(
        mut self,
        private_key: &str,
        algorithm: JwtAlgorithm,
        lifetime_seconds: u64,
    ) -> Result<String> {
        self.exp = self
            .iat
            .saturating_add(i64::try_from(lifetime_seconds).unwrap_or(i64::MAX));

        let key = EncodingKey::from_rsa_pem(private_key.as_bytes()).map_err(|e| {
            Error::JwtGeneration {
                message: format!("Invalid private key: {e}"),
            }
        })?;

        encode(&Header::new(algorithm.into()), &self, &key).map_err(|e| Error::JwtGeneration {
            message: format!("Failed to encode JWT: {e}"),
        })
    }
}
