//! EditorSession: the set of live editor surfaces in one window.
//!
//! A session has one main editor and any number of peek windows. Each gets
//! its own `EditorSync`; the session only keeps track of them, wires the
//! shared collaborators in and tears peeks down when they close.

use crate::collab::{DefaultWritePolicy, EditorSurface, Navigation, NoNavigation, Role, WritePolicy};
use crate::config::SyncConfig;
use crate::document::DocumentKey;
use crate::events::EventBus;
use crate::instance::{EditorSync, LoadOutcome, Result, SaveOutcome, SaveTrigger};
use crate::patch::{LineDiffCodec, PatchCodec};
use crate::remote::DocumentRemote;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Label of the main editor surface.
pub const MAIN_SURFACE: &str = "main";

/// Identifies a peek window within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeekId(u64);

impl fmt::Display for PeekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peek-{}", self.0)
    }
}

/// Collaborators shared by every surface of a session.
#[derive(Clone)]
pub struct SessionDeps {
    pub remote: Arc<dyn DocumentRemote>,
    pub navigation: Arc<dyn Navigation>,
    pub policy: Arc<dyn WritePolicy>,
    pub codec: Option<Arc<dyn PatchCodec>>,
    pub events: Option<Arc<EventBus>>,
    pub config: SyncConfig,
    pub role: Role,
}

impl SessionDeps {
    pub fn new(remote: Arc<dyn DocumentRemote>) -> Self {
        Self {
            remote,
            navigation: Arc::new(NoNavigation),
            policy: Arc::new(DefaultWritePolicy),
            codec: Some(Arc::new(LineDiffCodec::new())),
            events: None,
            config: SyncConfig::default(),
            role: Role::Editor,
        }
    }

    fn build(&self, label: String, surface: Arc<dyn EditorSurface>) -> EditorSync {
        let mut builder = EditorSync::builder(label, Arc::clone(&self.remote), surface)
            .role(self.role)
            .navigation(Arc::clone(&self.navigation))
            .policy(Arc::clone(&self.policy))
            .codec(self.codec.clone())
            .config(self.config.clone());
        if let Some(events) = &self.events {
            builder = builder.events(Arc::clone(events));
        }
        builder.build()
    }
}

pub struct EditorSession {
    deps: SessionDeps,
    main: EditorSync,
    peeks: Mutex<BTreeMap<PeekId, EditorSync>>,
    next_peek: AtomicU64,
}

impl EditorSession {
    pub fn new(deps: SessionDeps, main_surface: Arc<dyn EditorSurface>) -> Self {
        let main = deps.build(MAIN_SURFACE.to_string(), main_surface);
        Self {
            deps,
            main,
            peeks: Mutex::new(BTreeMap::new()),
            next_peek: AtomicU64::new(1),
        }
    }

    pub fn main(&self) -> &EditorSync {
        &self.main
    }

    /// Show another document in the main editor.
    pub async fn navigate(&self, key: DocumentKey) -> Result<LoadOutcome> {
        self.main.open(key).await
    }

    /// Open a peek window on `key`. The peek is registered only if the load succeeds.
    pub async fn open_peek(
        &self,
        surface: Arc<dyn EditorSurface>,
        key: DocumentKey,
    ) -> Result<(PeekId, EditorSync)> {
        let id = PeekId(self.next_peek.fetch_add(1, Ordering::Relaxed));
        let sync = self.deps.build(id.to_string(), surface);

        if let Err(e) = sync.open(key).await {
            sync.close();
            return Err(e);
        }

        debug!(peek = %id, "Peek window opened");
        self.lock_peeks().insert(id, sync.clone());
        Ok((id, sync))
    }

    pub fn peek(&self, id: PeekId) -> Option<EditorSync> {
        self.lock_peeks().get(&id).cloned()
    }

    /// Close a peek window. Its pending autosave is cancelled.
    pub fn close_peek(&self, id: PeekId) -> bool {
        let removed = self.lock_peeks().remove(&id);
        match removed {
            Some(sync) => {
                sync.close();
                debug!(peek = %id, "Peek window closed");
                true
            }
            None => false,
        }
    }

    /// Labels of surfaces currently showing `key`.
    pub fn surfaces_showing(&self, key: &DocumentKey) -> Vec<String> {
        self.surfaces()
            .into_iter()
            .filter(|sync| sync.shows(key))
            .map(|sync| sync.label().to_string())
            .collect()
    }

    /// Labels of surfaces with unsaved changes.
    pub fn dirty_surfaces(&self) -> Vec<String> {
        self.surfaces()
            .into_iter()
            .filter(|sync| sync.is_dirty())
            .map(|sync| sync.label().to_string())
            .collect()
    }

    /// Save every surface, main editor first.
    pub async fn save_all(&self, trigger: SaveTrigger) -> Vec<(String, SaveOutcome)> {
        let mut outcomes = Vec::new();
        for sync in self.surfaces() {
            let outcome = sync.save(trigger).await;
            outcomes.push((sync.label().to_string(), outcome));
        }
        outcomes
    }

    /// Close every surface.
    pub fn close(&self) {
        let peeks = std::mem::take(&mut *self.lock_peeks());
        for sync in peeks.values() {
            sync.close();
        }
        self.main.close();
    }

    fn surfaces(&self) -> Vec<EditorSync> {
        let mut all = vec![self.main.clone()];
        all.extend(self.lock_peeks().values().cloned());
        all
    }

    fn lock_peeks(&self) -> std::sync::MutexGuard<'_, BTreeMap<PeekId, EditorSync>> {
        self.peeks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{LoadedView, StatusMessage};
    use crate::memory::InMemoryRemote;

    #[derive(Default)]
    struct Pane {
        text: Mutex<String>,
    }

    impl Pane {
        fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn type_text(&self, text: &str) {
            *self.text.lock().unwrap() = text.to_string();
        }
    }

    impl EditorSurface for Pane {
        fn canonical_text(&self) -> String {
            self.text.lock().unwrap().clone()
        }

        fn show_document(&self, view: &LoadedView<'_>) {
            self.type_text(view.content);
        }

        fn show_status(&self, _status: &StatusMessage) {}
    }

    fn session() -> (Arc<InMemoryRemote>, Arc<Pane>, EditorSession) {
        let remote = Arc::new(InMemoryRemote::new());
        remote.insert(&DocumentKey::project("p", "a"), "A", "ta");
        remote.insert(&DocumentKey::project("p", "b"), "B", "tb");
        let pane = Pane::new();
        let session = EditorSession::new(SessionDeps::new(remote.clone()), pane.clone());
        (remote, pane, session)
    }

    #[tokio::test]
    async fn test_peeks_get_their_own_instances() {
        let (_remote, _pane, session) = session();
        let a = DocumentKey::project("p", "a");

        session.navigate(a.clone()).await.unwrap();
        let (id, peek) = session.open_peek(Pane::new(), a.clone()).await.unwrap();

        assert_eq!(peek.label(), id.to_string());
        assert_eq!(session.surfaces_showing(&a), vec!["main".to_string(), id.to_string()]);
        assert!(session.peek(id).is_some());
    }

    #[tokio::test]
    async fn test_failed_peek_is_not_registered() {
        let (_remote, _pane, session) = session();
        let missing = DocumentKey::project("p", "missing");

        assert!(session.open_peek(Pane::new(), missing.clone()).await.is_err());
        assert!(session.surfaces_showing(&missing).is_empty());
    }

    #[tokio::test]
    async fn test_close_peek_retires_instance() {
        let (_remote, _pane, session) = session();
        let b = DocumentKey::project("p", "b");
        let pane = Pane::new();
        let (id, peek) = session.open_peek(pane.clone(), b.clone()).await.unwrap();

        pane.type_text("B edited");
        peek.notify_edited();
        assert_eq!(session.dirty_surfaces(), vec![id.to_string()]);

        assert!(session.close_peek(id));
        assert!(!session.close_peek(id));
        assert_eq!(peek.phase(), crate::instance::SyncPhase::Closed);
        assert!(session.dirty_surfaces().is_empty());
    }

    #[tokio::test]
    async fn test_save_all_saves_every_dirty_surface() {
        let (remote, pane, session) = session();
        let a = DocumentKey::project("p", "a");
        let b = DocumentKey::project("p", "b");

        session.navigate(a.clone()).await.unwrap();
        let peek_pane = Pane::new();
        let (_id, peek) = session.open_peek(peek_pane.clone(), b.clone()).await.unwrap();

        pane.type_text("A2");
        session.main().notify_edited();
        peek_pane.type_text("B2");
        peek.notify_edited();

        let outcomes = session.save_all(SaveTrigger::Explicit).await;
        assert_eq!(outcomes.len(), 2);
        assert!(
            outcomes
                .iter()
                .all(|(_, outcome)| *outcome == SaveOutcome::Saved { pending_edits: false })
        );
        assert_eq!(remote.content(&a).as_deref(), Some("A2"));
        assert_eq!(remote.content(&b).as_deref(), Some("B2"));
    }

    #[tokio::test]
    async fn test_close_retires_everything() {
        let (_remote, _pane, session) = session();
        session.navigate(DocumentKey::project("p", "a")).await.unwrap();
        let (id, peek) = session
            .open_peek(Pane::new(), DocumentKey::project("p", "b"))
            .await
            .unwrap();

        session.close();

        assert!(session.peek(id).is_none());
        assert_eq!(peek.phase(), crate::instance::SyncPhase::Closed);
        assert_eq!(session.main().phase(), crate::instance::SyncPhase::Closed);
    }
}
