//! OAuth2 client-credentials tokens for Microsoft Graph.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{MsGraphConfig, MsGraphError, MsGraphResult};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Expired, or expiring within `grace`.
    fn is_expired(&self, grace: Duration) -> bool {
        Utc::now() + grace >= self.expires_at
    }
}

/// Caches one access token and refreshes it shortly before expiry.
#[derive(Debug)]
pub struct TokenCache {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    cached: RwLock<Option<CachedToken>>,
    grace_period: Duration,
}

impl TokenCache {
    pub fn new(http: reqwest::Client, config: &MsGraphConfig) -> Self {
        Self {
            http,
            token_url: config.token_url(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scope: config.scope.clone(),
            cached: RwLock::new(None),
            grace_period: Duration::minutes(5),
        }
    }

    pub async fn get_token(&self) -> MsGraphResult<String> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref().filter(|t| !t.is_expired(self.grace_period)) {
                return Ok(token.access_token.clone());
            }
        }

        let mut cached = self.cached.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(token) = cached.as_ref().filter(|t| !t.is_expired(self.grace_period)) {
            return Ok(token.access_token.clone());
        }

        let token = self.acquire().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Drop the cached token so the next call fetches a new one.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    async fn acquire(&self) -> MsGraphResult<CachedToken> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| MsGraphError::Auth(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MsGraphError::Auth(format!(
                "token request failed with status {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| MsGraphError::Auth(format!("invalid token response: {e}")))?;
        let expires_at = Utc::now() + Duration::seconds(token.expires_in);
        debug!(expires_at = %expires_at, "Acquired access token");

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_inside_grace_period_is_expired() {
        let token = CachedToken {
            access_token: "t".to_string(),
            expires_at: Utc::now() + Duration::minutes(4),
        };
        assert!(token.is_expired(Duration::minutes(5)));
        assert!(!token.is_expired(Duration::minutes(1)));
    }

    #[test]
    fn test_past_token_is_expired() {
        let token = CachedToken {
            access_token: "t".to_string(),
            expires_at: Utc::now() - Duration::seconds(1),
        };
        assert!(token.is_expired(Duration::zero()));
    }
}
