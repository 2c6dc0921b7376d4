//! VersionedDocument: what one editor surface believes about a remote page.
//!
//! Each surface holds its own copy:
//! - `base_content`: the text last confirmed by the server (the diff base)
//! - `version_token`: the server's marker for the state `base_content` came from
//! - `title`: advisory display title
//!
//! The base only moves on initial load or a confirmed save. Local edits never
//! touch it; they are compared against it to decide whether the surface is dirty.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The collection a document lives in. Determines the API namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "camelCase")]
pub enum ContainerId {
    /// A regular project
    Project(String),
    /// An announcement channel
    Channel(String),
}

impl ContainerId {
    /// API namespace for this container type.
    pub fn namespace(&self) -> &'static str {
        match self {
            ContainerId::Project(_) => "projects",
            ContainerId::Channel(_) => "announcements",
        }
    }

    /// The container's own identifier.
    pub fn id(&self) -> &str {
        match self {
            ContainerId::Project(id) | ContainerId::Channel(id) => id,
        }
    }

    /// Kind of documents this container holds unless told otherwise.
    pub fn default_kind(&self) -> DocumentKind {
        match self {
            ContainerId::Project(_) => DocumentKind::Standard,
            ContainerId::Channel(_) => DocumentKind::Restricted,
        }
    }
}

/// Write-permission class of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentKind {
    /// Writable by the owning context
    Standard,
    /// Writable only by a privileged role (announcements)
    Restricted,
}

/// Identity of a remote document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentKey {
    pub container: ContainerId,
    pub document_id: String,
}

impl DocumentKey {
    pub fn new(container: ContainerId, document_id: impl Into<String>) -> Self {
        Self {
            container,
            document_id: document_id.into(),
        }
    }

    pub fn project(project_id: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self::new(ContainerId::Project(project_id.into()), document_id)
    }

    pub fn channel(channel_id: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self::new(ContainerId::Channel(channel_id.into()), document_id)
    }

    /// Another document in the same container.
    pub fn sibling(&self, document_id: impl Into<String>) -> Self {
        Self::new(self.container.clone(), document_id)
    }

    /// Request path: `<namespace>/<containerId>/document/<documentId>`
    pub fn path(&self) -> String {
        format!(
            "{}/{}/document/{}",
            self.container.namespace(),
            self.container.id(),
            self.document_id
        )
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Document as returned by a load request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedDocument {
    pub content: String,
    pub version_token: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// One surface's view of a remote document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedDocument {
    key: DocumentKey,
    kind: DocumentKind,
    base_content: Option<String>,
    version_token: Option<String>,
    title: Option<String>,
}

impl VersionedDocument {
    /// A document that has not been fetched yet.
    pub fn unloaded(key: DocumentKey, kind: DocumentKind) -> Self {
        Self {
            key,
            kind,
            base_content: None,
            version_token: None,
            title: None,
        }
    }

    /// Build from a load response. `content` is the text to use as base,
    /// which may differ from `loaded.content` after link labels were resolved.
    pub fn from_loaded(
        key: DocumentKey,
        kind: DocumentKind,
        loaded: &LoadedDocument,
        content: String,
    ) -> Self {
        Self {
            key,
            kind,
            base_content: Some(content),
            version_token: Some(loaded.version_token.clone()),
            title: loaded.title.clone(),
        }
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn base_content(&self) -> Option<&str> {
        self.base_content.as_deref()
    }

    pub fn version_token(&self) -> Option<&str> {
        self.version_token.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Whether `current` differs from the base. An unloaded base counts as differing.
    pub fn differs_from(&self, current: &str) -> bool {
        self.base_content.as_deref() != Some(current)
    }

    /// Apply a confirmed save. The server's content and token replace ours.
    ///
    /// Returns the new title if it changed.
    pub fn apply_saved(
        &mut self,
        content: String,
        version_token: String,
        title: Option<String>,
    ) -> Option<String> {
        self.base_content = Some(content);
        self.version_token = Some(version_token);

        match title {
            Some(title) if self.title.as_deref() != Some(title.as_str()) => {
                self.title = Some(title.clone());
                Some(title)
            }
            _ => None,
        }
    }

    /// The remote moved on without us: the token no longer describes the base.
    pub fn mark_conflict(&mut self) {
        self.version_token = None;
    }
}
