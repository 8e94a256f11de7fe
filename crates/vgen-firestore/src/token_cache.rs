//! Access token cache for the Firestore REST client.
//!
//! Tokens are refreshed a minute before expiry. Concurrent callers that find
//! a stale token queue on the write lock so only one refresh hits the
//! metadata server; if that refresh fails the old token is reused while it
//! is still inside its lifetime.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use gcp_auth::TokenProvider;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{FirestoreError, FirestoreResult};

const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Used when the provider returns an expiry we cannot convert.
const FALLBACK_TTL: Duration = Duration::from_secs(50 * 60);

/// OAuth scope for the Firestore REST API.
pub const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + REFRESH_MARGIN < self.expires_at
    }

    fn is_alive(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Shared OAuth token cache.
pub struct TokenCache {
    provider: Arc<dyn TokenProvider>,
    slot: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            provider,
            slot: RwLock::new(None),
        }
    }

    /// Drop the cached token so the next call fetches a new one.
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }

    /// Return a token that is valid for at least the refresh margin.
    pub async fn get_token(&self) -> FirestoreResult<String> {
        if let Some(cached) = self.slot.read().await.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.value.clone());
            }
        }

        let mut slot = self.slot.write().await;

        // another task may have refreshed while we waited for the lock
        if let Some(cached) = slot.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.value.clone());
            }
        }

        match self.provider.token(&[FIRESTORE_SCOPE]).await {
            Ok(token) => {
                let value = token.as_str().to_string();
                let expires_at = expiry_instant(token.expires_at());
                *slot = Some(CachedToken {
                    value: value.clone(),
                    expires_at,
                });
                debug!("Refreshed Firestore access token");
                Ok(value)
            }
            Err(e) => match slot.as_ref() {
                Some(cached) if cached.is_alive() => {
                    warn!("Token refresh failed, reusing current token: {}", e);
                    Ok(cached.value.clone())
                }
                _ => Err(FirestoreError::auth_error(format!(
                    "Failed to obtain auth token: {}",
                    e
                ))),
            },
        }
    }
}

fn expiry_instant(expires_at: chrono::DateTime<Utc>) -> Instant {
    let now = Utc::now();
    if expires_at <= now {
        return Instant::now();
    }
    match (expires_at - now).to_std() {
        Ok(ttl) => Instant::now() + ttl,
        Err(_) => Instant::now() + FALLBACK_TTL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_targets_datastore() {
        assert!(FIRESTORE_SCOPE.ends_with("/auth/datastore"));
    }

    #[test]
    fn test_expired_token_expires_immediately() {
        let past = Utc::now() - chrono::Duration::minutes(5);
        assert!(expiry_instant(past) <= Instant::now());
    }

    #[test]
    fn test_future_expiry_is_honoured() {
        let future = Utc::now() + chrono::Duration::minutes(30);
        let at = expiry_instant(future);
        let remaining = at.saturating_duration_since(Instant::now());
        assert!(remaining > Duration::from_secs(29 * 60));
        assert!(remaining <= Duration::from_secs(30 * 60));
    }
}
