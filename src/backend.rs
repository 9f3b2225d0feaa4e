//! HTTP client for the batch share backend.
//!
//! Two POST contracts are consumed: `/api/validate` and `/api/share`. The
//! backend reports domain failures inside the JSON body (`success: false`),
//! so the body is decoded regardless of HTTP status; transport and decode
//! failures surface as [`BackendError`].

use crate::model::{AttemptResult, RunRequest, RunSummary};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend unreachable: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::InvalidResponse(e.to_string())
        } else {
            BackendError::Transport(e.to_string())
        }
    }
}

/// Request body for `POST /api/validate`.
#[derive(Debug, Serialize)]
pub struct ValidateRequest {
    pub appstate: Value,
}

/// Response from the validate endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateResponse {
    pub success: bool,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Request body for `POST /api/share`. The backend performs all `count`
/// repetitions with `delay` spacing; the client never loops per attempt.
#[derive(Debug, Serialize)]
pub struct ShareRequest {
    pub appstate: Value,
    pub message: String,
    pub link: String,
    pub count: u32,
    pub delay: u32,
}

impl From<&RunRequest> for ShareRequest {
    fn from(req: &RunRequest) -> Self {
        Self {
            appstate: req.appstate.clone(),
            message: req.message.clone(),
            link: req.link.clone(),
            count: req.count,
            delay: req.delay_secs,
        }
    }
}

/// Response from the share endpoint: the full ordered result list in one
/// atomic payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ShareResponse {
    pub success: bool,
    #[serde(default)]
    pub results: Option<Vec<AttemptResult>>,
    #[serde(default)]
    pub summary: Option<RunSummary>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Seam between the controller and the wire, so controller flows can run
/// against a scripted backend in tests.
pub trait ShareBackend {
    fn validate(
        &self,
        appstate: &Value,
    ) -> impl Future<Output = Result<ValidateResponse, BackendError>> + Send;

    fn share(
        &self,
        req: &RunRequest,
    ) -> impl Future<Output = Result<ShareResponse, BackendError>> + Send;
}

/// reqwest-backed implementation of the two contracts.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    http: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .user_agent(format!("share-console/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, BackendError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.post(&url).json(body).send().await?;
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}

impl ShareBackend for HttpBackend {
    fn validate(
        &self,
        appstate: &Value,
    ) -> impl Future<Output = Result<ValidateResponse, BackendError>> + Send {
        let body = ValidateRequest {
            appstate: appstate.clone(),
        };
        async move { self.post_json("/api/validate", &body).await }
    }

    fn share(
        &self,
        req: &RunRequest,
    ) -> impl Future<Output = Result<ShareResponse, BackendError>> + Send {
        let body = ShareRequest::from(req);
        async move { self.post_json("/api/share", &body).await }
    }
}
