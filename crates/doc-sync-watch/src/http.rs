//! HTTP transport for the document endpoints.
//!
//! `GET  <base>/<namespace>/<container>/document/<id>` loads a document,
//! `POST` to the same path saves it. Bodies are JSON.

use async_trait::async_trait;
use doc_sync::remote::Result;
use doc_sync::{
    DocumentKey, DocumentRemote, ErrorBody, LoadedDocument, RemoteError, SaveRequest, SaveResponse,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, trace};

/// Client settings.
#[derive(Debug, Clone, Default)]
pub struct HttpOptions {
    /// Bearer token sent with every request
    pub auth_token: Option<String>,
    pub connect_timeout: Option<Duration>,
    pub request_timeout: Option<Duration>,
}

pub struct HttpRemote {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>, options: HttpOptions) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = options.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| RemoteError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        debug!(base_url = %base_url, "HTTP remote created");

        Ok(Self {
            client,
            base_url,
            auth_token: options.auth_token,
        })
    }

    /// Endpoint URL for a document.
    pub fn document_url(&self, key: &DocumentKey) -> String {
        format!("{}/{}", self.base_url, key.path())
    }

    fn request(&self, method: Method, key: &DocumentKey) -> RequestBuilder {
        let request = self.client.request(method, self.document_url(key));
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl DocumentRemote for HttpRemote {
    async fn load(&self, key: &DocumentKey) -> Result<LoadedDocument> {
        trace!(path = %key, "GET document");
        let response = self
            .request(Method::GET, key)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        decode(response).await
    }

    async fn save(&self, key: &DocumentKey, request: &SaveRequest) -> Result<SaveResponse> {
        trace!(path = %key, mode = ?request.mode(), "POST document");
        let response = self
            .request(Method::POST, key)
            .json(request)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()));
    }

    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body))
}

/// Map a non-success response to an error.
///
/// 409 is a version conflict. Anything else carries the `error` field of the
/// body, falling back to the raw body and then the status reason.
pub fn status_error(status: StatusCode, body: &str) -> RemoteError {
    if status == StatusCode::CONFLICT {
        return RemoteError::Conflict;
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.error)
        .or_else(|| {
            let raw = body.trim();
            (!raw.is_empty()).then(|| raw.to_string())
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());

    RemoteError::Status {
        code: status.as_u16(),
        message,
    }
}
