use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use uuid::Uuid;

use super::error::AuthError;
use super::token::Token;

pub const OAUTH_URL: &str = "https://oauth.ring.com/oauth/token";
pub const CLIENT_ID: &str = "ring_official_android";
pub const USER_AGENT: &str = "android:com.ringapp";

/// Token-issuing side of the remote account service.
#[async_trait]
pub trait OAuthApi: Send + Sync {
    /// Primary authentication. Fails with [`AuthError::TwoFactorRequired`]
    /// when the account wants a one-time code and none was supplied.
    async fn password_grant(
        &self,
        username: &str,
        password: &str,
        otp: Option<&str>,
    ) -> Result<Token, AuthError>;

    async fn refresh_grant(&self, refresh_token: &str) -> Result<Token, AuthError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grant {
    Password,
    Refresh,
}

/// Stable per-account device identifier so Ring does not see a new device
/// on every run.
pub fn hardware_id(username: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, username.to_lowercase().as_bytes()).to_string()
}

/// Ring's OAuth endpoint.
pub struct RingOAuth {
    client: Client,
    url: String,
    hardware_id: String,
}

impl RingOAuth {
    pub fn new(client: Client, username: &str) -> Self {
        Self {
            client,
            url: OAUTH_URL.to_string(),
            hardware_id: hardware_id(username),
        }
    }

    async fn request(
        &self,
        grant: Grant,
        body: serde_json::Value,
        otp: Option<&str>,
    ) -> Result<Token, AuthError> {
        let mut builder = self
            .client
            .post(&self.url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header("hardware_id", &self.hardware_id)
            .header("2fa-support", "true")
            .json(&body);
        if let Some(code) = otp {
            builder = builder.header("2fa-code", code);
        }

        tracing::debug!("POST {} ({:?} grant)", self.url, grant);
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<Token>().await?);
        }
        let text = response.text().await.unwrap_or_default();
        Err(classify_failure(grant, status, text))
    }
}

#[async_trait]
impl OAuthApi for RingOAuth {
    async fn password_grant(
        &self,
        username: &str,
        password: &str,
        otp: Option<&str>,
    ) -> Result<Token, AuthError> {
        let body = json!({
            "client_id": CLIENT_ID,
            "scope": "client",
            "grant_type": "password",
            "username": username,
            "password": password,
        });
        self.request(Grant::Password, body, otp).await
    }

    async fn refresh_grant(&self, refresh_token: &str) -> Result<Token, AuthError> {
        let body = json!({
            "client_id": CLIENT_ID,
            "scope": "client",
            "grant_type": "refresh_token",
            "refresh_token": refresh_token,
        });
        self.request(Grant::Refresh, body, None).await
    }
}

/// Map a non-success OAuth response onto the auth error taxonomy.
/// HTTP 412 is Ring's "verification code required" signal.
fn classify_failure(grant: Grant, status: StatusCode, text: String) -> AuthError {
    match (grant, status.as_u16()) {
        (Grant::Password, 412) => AuthError::TwoFactorRequired,
        (Grant::Refresh, 400 | 401) => AuthError::InvalidToken(text),
        (Grant::Password, 400 | 401 | 403) => AuthError::FailedLogin(text),
        (_, code) => AuthError::ApiError {
            code,
            message: text,
        },
    }
}
