use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::error::ApiError;
use super::types::{Device, DeviceList, RecordingEvent, RecordingUrl};
use crate::auth::error::AuthError;
use crate::auth::oauth::{hardware_id, USER_AGENT};
use crate::auth::SharedSession;
use crate::types::EventId;

pub const API_BASE: &str = "https://api.ring.com/clients_api";

/// HTTP client shared by the OAuth and API sides.
///
/// `timeout` bounds connecting and each read, not the whole request: a slow
/// but steady recording download may take as long as it needs.
pub fn build_http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .build()
}

/// Body of a recording, delivered chunk by chunk.
pub type RecordingStream = BoxStream<'static, Result<Bytes, ApiError>>;

/// The parts of the Ring account API a sync run needs.
#[async_trait]
pub trait RingApi: Send + Sync {
    async fn devices(&self) -> Result<Vec<Device>, ApiError>;

    /// One page of a device's history, newest first. `older_than` pages
    /// backwards from the given event.
    async fn history(
        &self,
        device: &Device,
        limit: u32,
        older_than: Option<&EventId>,
    ) -> Result<Vec<RecordingEvent>, ApiError>;

    async fn recording(&self, event_id: &EventId) -> Result<RecordingStream, ApiError>;
}

/// HTTP implementation backed by the shared authenticated session.
pub struct RingClient {
    http: Client,
    session: SharedSession,
    base_url: String,
    hardware_id: String,
}

impl RingClient {
    pub fn new(http: Client, session: SharedSession, username: &str) -> Self {
        Self::with_base_url(http, session, username, API_BASE)
    }

    pub fn with_base_url(
        http: Client,
        session: SharedSession,
        username: &str,
        base_url: &str,
    ) -> Self {
        Self {
            http,
            session,
            base_url: base_url.trim_end_matches('/').to_string(),
            hardware_id: hardware_id(username),
        }
    }

    async fn send(&self, url: &str, access_token: &str) -> Result<Response, ApiError> {
        tracing::debug!("GET {}", url);
        self.http
            .get(url)
            .bearer_auth(access_token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .header("hardware_id", &self.hardware_id)
            .send()
            .await
            .map_err(|source| ApiError::Http {
                url: url.to_string(),
                source,
            })
    }

    /// Authorized GET. A 401 renews the token through the session manager
    /// and the request is repeated once.
    async fn get(&self, path: &str) -> Result<Response, ApiError> {
        let url = format!("{}{}", self.base_url, path);

        let token = self.session.lock().await.access_token().await?;
        let mut response = self.send(&url, &token).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let token = self.session.lock().await.token_rejected().await?;
            response = self.send(&url, &token).await?;
            if response.status() == StatusCode::UNAUTHORIZED {
                return Err(AuthError::FailedLogin(
                    "Ring rejected a freshly issued token".into(),
                )
                .into());
            }
        }

        check_status(response, &url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.get(path).await?;
        let url = response.url().to_string();
        response.json::<T>().await.map_err(|e| ApiError::Decode {
            url,
            message: e.to_string(),
        })
    }
}

fn check_status(response: Response, url: &str) -> Result<Response, ApiError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(response)
}

fn history_path(device_id: u64, limit: u32, older_than: Option<&EventId>) -> String {
    match older_than {
        Some(id) => format!(
            "/doorbots/{}/history?limit={}&older_than={}",
            device_id, limit, id
        ),
        None => format!("/doorbots/{}/history?limit={}", device_id, limit),
    }
}

#[async_trait]
impl RingApi for RingClient {
    async fn devices(&self) -> Result<Vec<Device>, ApiError> {
        let list: DeviceList = self.get_json("/ring_devices").await?;
        Ok(list.into_doorbells())
    }

    async fn history(
        &self,
        device: &Device,
        limit: u32,
        older_than: Option<&EventId>,
    ) -> Result<Vec<RecordingEvent>, ApiError> {
        self.get_json(&history_path(device.id, limit, older_than))
            .await
    }

    async fn recording(&self, event_id: &EventId) -> Result<RecordingStream, ApiError> {
        let path = format!("/dings/{}/recording?disable_redirect=true", event_id);
        let location: RecordingUrl = self.get_json(&path).await?;

        // The returned URL is pre-signed; no bearer token.
        let response = self
            .http
            .get(&location.url)
            .send()
            .await
            .map_err(|source| ApiError::Http {
                url: location.url.clone(),
                source,
            })?;
        let response = check_status(response, &location.url)?;

        let url = location.url;
        Ok(response
            .bytes_stream()
            .map(move |chunk| {
                chunk.map_err(|source| ApiError::Http {
                    url: url.clone(),
                    source,
                })
            })
            .boxed())
    }
}
