//! DocumentRemote trait: the network side of document sync.
//!
//! Implementations:
//! - `InMemoryRemote` - In-process server for testing
//! - `HttpRemote` (in doc-sync-watch) - JSON over HTTP with reqwest

use crate::document::{DocumentKey, LoadedDocument};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    /// The base version a patch was computed against is no longer current.
    #[error("Version conflict")]
    Conflict,

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Server returned {code}: {message}")]
    Status { code: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, RemoteError>;

/// Body of a save request.
///
/// Serialises to either `{"content": ...}` or
/// `{"patch": ..., "baseVersionToken": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SaveRequest {
    Patch {
        patch: String,
        #[serde(rename = "baseVersionToken")]
        base_version_token: String,
    },
    Full {
        content: String,
    },
}

impl SaveRequest {
    pub fn mode(&self) -> SaveMode {
        match self {
            SaveRequest::Patch { .. } => SaveMode::Patch,
            SaveRequest::Full { .. } => SaveMode::Full,
        }
    }
}

/// Which strategy a save request uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SaveMode {
    Patch,
    Full,
}

/// Body of a successful save response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    /// Content as committed by the server
    pub content: String,
    pub version_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Body of a failed response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

/// Remote document store.
#[async_trait]
pub trait DocumentRemote: Send + Sync {
    /// Fetch a document with its current version token.
    async fn load(&self, key: &DocumentKey) -> Result<LoadedDocument>;

    /// Submit a full document or a patch.
    ///
    /// Returns `RemoteError::Conflict` when a patch's base version is stale.
    async fn save(&self, key: &DocumentKey, request: &SaveRequest) -> Result<SaveResponse>;

    /// Fetch only the title of a document.
    async fn fetch_title(&self, key: &DocumentKey) -> Result<Option<String>> {
        Ok(self.load(key).await?.title)
    }
}

// Share one remote between several editor surfaces
#[async_trait]
impl<T: DocumentRemote + ?Sized> DocumentRemote for std::sync::Arc<T> {
    async fn load(&self, key: &DocumentKey) -> Result<LoadedDocument> {
        (**self).load(key).await
    }

    async fn save(&self, key: &DocumentKey, request: &SaveRequest) -> Result<SaveResponse> {
        (**self).save(key, request).await
    }

    async fn fetch_title(&self, key: &DocumentKey) -> Result<Option<String>> {
        (**self).fetch_title(key).await
    }
}
