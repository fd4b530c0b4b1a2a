//! DashVite backend API client (http://127.0.0.1:8000 by default).
//! Covers the profile, history, assistant, and login endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::session::Sender;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("backend request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("backend api error: {0}")]
    Api(String),
}

impl ApiError {
    /// True when the server answered but with an error payload (as opposed
    /// to being unreachable or returning something unparseable).
    pub fn is_server_error(&self) -> bool {
        matches!(self, ApiError::Api(_))
    }
}

/// Authenticated user profile from `GET /users/me`.
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub id: i64,
}

/// One persisted message from `GET /history/{user_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub message: String,
    pub sender: Sender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Assistant reply from `POST /ask`.
#[derive(Debug, Clone, Deserialize)]
pub struct AskResponse {
    pub response: String,
}

/// Credentials issued by `POST /login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user_id: i64,
}

/// The remote calls the session core depends on. A trait so the engine and
/// stores can be driven by an in-process fake in tests.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn fetch_profile(&self, token: &str) -> Result<Profile, ApiError>;
    async fn fetch_history(&self, user_id: i64) -> Result<Vec<HistoryRecord>, ApiError>;
    async fn ask(&self, message: &str, user_id: Option<i64>) -> Result<AskResponse, ApiError>;
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError>;
}

/// HTTP client for the DashVite backend.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }
}

/// Convert a non-2xx response into an `ApiError::Api`, preferring the
/// `detail` field the backend puts in error payloads.
async fn api_error(res: reqwest::Response) -> ApiError {
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from))
        .unwrap_or(body);
    ApiError::Api(format!("{} {}", status, detail))
}

#[derive(Serialize)]
struct AskRequest<'a> {
    message: &'a str,
    user_id: Option<i64>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[async_trait]
impl Backend for ApiClient {
    /// GET /users/me with a bearer token.
    async fn fetch_profile(&self, token: &str) -> Result<Profile, ApiError> {
        let url = format!("{}/users/me", self.base_url);
        let res = self.client.get(&url).bearer_auth(token).send().await?;
        if !res.status().is_success() {
            return Err(api_error(res).await);
        }
        Ok(res.json().await?)
    }

    /// GET /history/{user_id} — all persisted messages, chronological.
    async fn fetch_history(&self, user_id: i64) -> Result<Vec<HistoryRecord>, ApiError> {
        let url = format!("{}/history/{}", self.base_url, user_id);
        let res = self.client.get(&url).send().await?;
        if !res.status().is_success() {
            return Err(api_error(res).await);
        }
        Ok(res.json().await?)
    }

    /// POST /ask — one assistant turn. `user_id` is null for guests.
    async fn ask(&self, message: &str, user_id: Option<i64>) -> Result<AskResponse, ApiError> {
        let url = format!("{}/ask", self.base_url);
        let res = self
            .client
            .post(&url)
            .json(&AskRequest { message, user_id })
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(api_error(res).await);
        }
        Ok(res.json().await?)
    }

    /// POST /login — relay credentials; token issuance stays server-side.
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let url = format!("{}/login", self.base_url);
        let res = self
            .client
            .post(&url)
            .json(&LoginRequest { email, password })
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(api_error(res).await);
        }
        Ok(res.json().await?)
    }
}
