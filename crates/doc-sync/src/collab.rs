//! Collaborators an editor surface plugs into its sync instance.
//!
//! The engine never renders anything itself. It asks the surface for the
//! canonical text of what is on screen and tells it what to show.

use crate::document::{DocumentKey, DocumentKind};
use crate::links::ResolvedLink;
use serde::{Deserialize, Serialize};

/// Role of the user editing through a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Viewer,
    Editor,
    Admin,
}

/// Decides whether a role may write a kind of document.
pub trait WritePolicy: Send + Sync {
    fn can_write(&self, kind: DocumentKind, role: Role) -> bool;
}

/// Standard documents: editors and admins. Restricted documents: admins only.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultWritePolicy;

impl WritePolicy for DefaultWritePolicy {
    fn can_write(&self, kind: DocumentKind, role: Role) -> bool {
        match kind {
            DocumentKind::Standard => matches!(role, Role::Editor | Role::Admin),
            DocumentKind::Restricted => role == Role::Admin,
        }
    }
}

impl<F> WritePolicy for F
where
    F: Fn(DocumentKind, Role) -> bool + Send + Sync,
{
    fn can_write(&self, kind: DocumentKind, role: Role) -> bool {
        self(kind, role)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

/// A line for the surface's status area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub text: String,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Error,
            text: text.into(),
        }
    }
}

/// What a surface should display after a fresh load.
#[derive(Debug, Clone)]
pub struct LoadedView<'a> {
    pub key: &'a DocumentKey,
    pub content: &'a str,
    pub title: Option<&'a str>,
    /// Page references whose labels were resolved; render them non-editable.
    pub locked_links: &'a [ResolvedLink],
}

/// A live editor surface (main editor, peek window, mirrored file, ...).
pub trait EditorSurface: Send + Sync {
    /// Canonical text of the content currently shown.
    ///
    /// Must be deterministic: the same rendered content always yields the same
    /// text, otherwise dirty detection flaps.
    fn canonical_text(&self) -> String;

    /// Replace the displayed content with a freshly loaded document.
    fn show_document(&self, view: &LoadedView<'_>);

    /// Show a status line.
    fn show_status(&self, status: &StatusMessage);

    /// Reflect unsaved changes (save button, title marker).
    fn set_dirty(&self, _dirty: bool) {}
}

/// Receives title changes so navigation (sidebar, tabs) can follow.
pub trait Navigation: Send + Sync {
    fn on_title_changed(&self, key: &DocumentKey, title: &str);
}

/// Navigation that ignores title changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNavigation;

impl Navigation for NoNavigation {
    fn on_title_changed(&self, _key: &DocumentKey, _title: &str) {}
}
