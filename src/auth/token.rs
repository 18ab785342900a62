use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::AuthError;
use crate::state::atomic::write_atomic;

/// Seconds shaved off `expires_at` so a token is refreshed slightly early.
const EXPIRY_SKEW_SECS: f64 = 60.0;

/// OAuth token material as issued by Ring.
///
/// Fields this client does not interpret are kept in `extra` so the cached
/// file round-trips whatever the service sent.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// Unix timestamp (seconds) after which the access token is stale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl Token {
    /// Derive `expires_at` from `expires_in` when the service only sent the
    /// relative lifetime.
    pub fn stamp_expiry(&mut self, now: DateTime<Utc>) {
        if self.expires_at.is_none() {
            if let Some(secs) = self.expires_in {
                self.expires_at = Some(now.timestamp() as f64 + secs as f64);
            }
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(at) => now.timestamp() as f64 + EXPIRY_SKEW_SECS >= at,
            None => false,
        }
    }
}

/// On-disk cache of the most recently issued token.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached token. Missing or unreadable caches are reported and
    /// treated as absent.
    pub async fn load(&self) -> Option<Token> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    "Token cache {} not found, full authentication required",
                    self.path.display()
                );
                return None;
            }
            Err(e) => {
                tracing::warn!("Failed to read token cache {}: {}", self.path.display(), e);
                return None;
            }
        };
        match serde_json::from_str::<Token>(&contents) {
            Ok(token) => {
                tracing::debug!("Loaded cached token from {}", self.path.display());
                Some(token)
            }
            Err(e) => {
                tracing::warn!(
                    "Token cache {} is corrupt ({}), full authentication required",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    /// Overwrite the cache with `token`. Owner-only permissions on Unix.
    pub async fn store(&self, token: &Token) -> Result<(), AuthError> {
        let json = serde_json::to_vec_pretty(token)?;
        write_atomic(&self.path, &json, true)
            .await
            .map_err(|source| AuthError::TokenCache {
                path: self.path.clone(),
                source,
            })?;
        tracing::debug!("Saved token to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn token(json: &str) -> Token {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_unknown_fields_round_trip() {
        let t = token(
            r#"{"access_token":"a","refresh_token":"r","expires_in":3600,"scope":"client","token_type":"bearer"}"#,
        );
        assert_eq!(t.extra.get("scope"), Some(&Value::from("client")));
        let back: Value = serde_json::to_value(&t).unwrap();
        assert_eq!(back["token_type"], "bearer");
        assert_eq!(back["refresh_token"], "r");
    }

    #[test]
    fn test_stamp_expiry_from_expires_in() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut t = token(r#"{"access_token":"a","expires_in":3600}"#);
        t.stamp_expiry(now);
        assert_eq!(t.expires_at, Some(now.timestamp() as f64 + 3600.0));
        assert!(!t.is_expired(now));
        assert!(t.is_expired(now + chrono::Duration::seconds(3550)));
    }

    #[test]
    fn test_stamp_expiry_keeps_existing_value() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut t = token(r#"{"access_token":"a","expires_in":3600,"expires_at":10.0}"#);
        t.stamp_expiry(now);
        assert_eq!(t.expires_at, Some(10.0));
        assert!(t.is_expired(now));
    }

    #[test]
    fn test_token_without_expiry_never_expires() {
        let t = token(r#"{"access_token":"a"}"#);
        assert!(!t.is_expired(Utc::now()));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let t = token(r#"{"access_token":"secret-access","refresh_token":"secret-refresh"}"#);
        let dbg = format!("{:?}", t);
        assert!(!dbg.contains("secret-access"));
        assert!(!dbg.contains("secret-refresh"));
    }

    #[tokio::test]
    async fn test_cache_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path().join("token.json"));
        let t = token(r#"{"access_token":"a","refresh_token":"r","expires_at":99.5}"#);

        cache.store(&t).await.unwrap();
        assert_eq!(cache.load().await, Some(t));
    }

    #[tokio::test]
    async fn test_cache_missing_or_corrupt_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TokenCache::new(dir.path().join("token.json"));
        assert!(cache.load().await.is_none());

        std::fs::write(cache.path(), "{not json").unwrap();
        assert!(cache.load().await.is_none());
    }
}
