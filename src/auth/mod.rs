//! Ring account authentication.
//!
//! The flow mirrors what the Ring mobile app does: reuse a cached OAuth
//! token when there is one, otherwise log in with username/password and, if
//! the account asks for it, answer a one-time-code challenge. Every issued
//! token is written to the token cache before it is handed out.

pub mod error;
pub mod oauth;
pub mod token;
pub mod twofa;

use std::sync::Arc;

use chrono::Utc;

use self::error::AuthError;
use self::oauth::OAuthApi;
use self::token::{Token, TokenCache};
use self::twofa::CodePrompt;

/// Shared handle to the session manager. The API client locks it to fetch
/// the current access token and to renew after a rejection.
pub type SharedSession = Arc<tokio::sync::Mutex<SessionManager>>;

/// Account login.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    NoToken,
    AwaitingPrimaryAuth,
    AwaitingSecondFactor,
    Authenticated(Token),
}

/// Owns the credentials and token for the duration of a run.
pub struct SessionManager {
    api: Box<dyn OAuthApi>,
    prompt: Box<dyn CodePrompt>,
    cache: TokenCache,
    credentials: Credentials,
    state: AuthState,
    /// The code prompt may fire at most once per run.
    prompted: bool,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("username", &self.credentials.username)
            .field("state", &self.state_name())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Build the manager, adopting a cached token if one exists. The cached
    /// token is not checked here; the first rejected request does that.
    pub async fn start(
        api: Box<dyn OAuthApi>,
        prompt: Box<dyn CodePrompt>,
        cache: TokenCache,
        credentials: Credentials,
    ) -> Self {
        let state = match cache.load().await {
            Some(token) => {
                tracing::debug!(
                    "Using cached token for {} from {}",
                    credentials.username,
                    cache.path().display()
                );
                AuthState::Authenticated(token)
            }
            None => AuthState::NoToken,
        };
        Self {
            api,
            prompt,
            cache,
            credentials,
            state,
            prompted: false,
        }
    }

    pub fn into_shared(self) -> SharedSession {
        Arc::new(tokio::sync::Mutex::new(self))
    }

    #[cfg(test)]
    pub fn state(&self) -> &AuthState {
        &self.state
    }

    fn state_name(&self) -> &'static str {
        match self.state {
            AuthState::NoToken => "no-token",
            AuthState::AwaitingPrimaryAuth => "awaiting-primary-auth",
            AuthState::AwaitingSecondFactor => "awaiting-second-factor",
            AuthState::Authenticated(_) => "authenticated",
        }
    }

    /// Current access token, logging in or refreshing first when needed.
    pub async fn access_token(&mut self) -> Result<String, AuthError> {
        if let AuthState::Authenticated(token) = &self.state {
            if !token.is_expired(Utc::now()) {
                return Ok(token.access_token.clone());
            }
            tracing::info!("Access token expired, refreshing");
            return self.renew().await;
        }
        self.authenticate().await
    }

    /// The remote service refused the current access token.
    pub async fn token_rejected(&mut self) -> Result<String, AuthError> {
        tracing::info!("Access token rejected, renewing");
        self.renew().await
    }

    /// Try the refresh token first, then fall back to a full login.
    async fn renew(&mut self) -> Result<String, AuthError> {
        let refresh_token = match &self.state {
            AuthState::Authenticated(token) => token.refresh_token.clone(),
            _ => None,
        };
        if let Some(refresh_token) = refresh_token {
            match self.api.refresh_grant(&refresh_token).await {
                Ok(token) => return self.issue(token).await,
                Err(e) => {
                    tracing::info!("Token refresh failed, logging in again: {}", e);
                }
            }
        }
        self.authenticate().await
    }

    /// Full login with username/password, answering a second-factor
    /// challenge if the service raises one.
    pub async fn authenticate(&mut self) -> Result<String, AuthError> {
        self.state = AuthState::AwaitingPrimaryAuth;
        let result = self.login().await;
        if result.is_err() {
            self.state = AuthState::NoToken;
        }
        result
    }

    async fn login(&mut self) -> Result<String, AuthError> {
        tracing::debug!("Authenticating as {}", self.credentials.username);
        let first = self
            .api
            .password_grant(&self.credentials.username, &self.credentials.password, None)
            .await;
        match first {
            Ok(token) => return self.issue(token).await,
            Err(AuthError::TwoFactorRequired) => {}
            Err(e) => return Err(e),
        }

        self.state = AuthState::AwaitingSecondFactor;
        if self.prompted {
            return Err(AuthError::TwoFactorFailed(
                "verification code requested more than once in this run".into(),
            ));
        }
        self.prompted = true;
        tracing::info!("Two-factor authentication is required");

        let code = self.prompt.second_factor_code().await?;
        if let Err(e) = twofa::validate_code(&code) {
            tracing::warn!("{}; sending it anyway", e);
        }

        let second = self
            .api
            .password_grant(
                &self.credentials.username,
                &self.credentials.password,
                Some(&code),
            )
            .await;
        match second {
            Ok(token) => {
                tracing::info!("Two-factor verification successful");
                self.issue(token).await
            }
            Err(AuthError::TwoFactorRequired) => Err(AuthError::TwoFactorFailed(
                "verification code was not accepted".into(),
            )),
            Err(e) => Err(e),
        }
    }

    /// Persist a freshly issued token, then adopt it.
    async fn issue(&mut self, mut token: Token) -> Result<String, AuthError> {
        token.stamp_expiry(Utc::now());
        self.cache.store(&token).await?;
        let access = token.access_token.clone();
        self.state = AuthState::Authenticated(token);
        Ok(access)
    }
}
