//! EditorSync: the save/autosave state machine of one editor surface.
//!
//! Every live surface (the main editor, each peek window) owns exactly one
//! `EditorSync`. It holds that surface's `VersionedDocument`, its dirty and
//! saving flags and its autosave timer. Instances never share state, even
//! when they show the same document; the server's version token is the only
//! thing that keeps them consistent.
//!
//! Phases:
//!
//! ```text
//! Unloaded -> Clean <-> Dirty -> Saving -> Clean
//!                                       -> Dirty(Conflict)
//!                                       -> Dirty(Error)
//! ```
//!
//! State lives behind a `std::sync::Mutex` that is never held across an
//! `.await`. Every committed load bumps an epoch; a save response that comes
//! back under an older epoch belongs to a document the surface no longer
//! shows and is discarded. Loads carry their own sequence number so a newer
//! `open` supersedes an older one, while a load that fails leaves the epoch
//! and any in-flight save of the shown document untouched.

use crate::collab::{
    DefaultWritePolicy, EditorSurface, LoadedView, Navigation, NoNavigation, Role, StatusMessage,
    WritePolicy,
};
use crate::config::SyncConfig;
use crate::document::{DocumentKey, DocumentKind, VersionedDocument};
use crate::events::{now_millis, EventBus, SyncEvent};
use crate::links::resolve_link_labels;
use crate::patch::{LineDiffCodec, PatchCodec};
use crate::remote::{DocumentRemote, RemoteError, SaveMode, SaveRequest, SaveResponse};
use crate::scheduler::AutosaveScheduler;
use crate::selector::{select_mode_or_full, SaveDecision};

use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Editor instance is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// What started a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTrigger {
    /// The user asked for it (save button, shortcut)
    Explicit,
    /// The debounce timer fired
    Autosave,
}

impl SaveTrigger {
    pub fn is_explicit(self) -> bool {
        self == SaveTrigger::Explicit
    }
}

/// Why a save attempt did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOpReason {
    /// The user may not write this document
    PermissionDenied,
    /// Content equals the base
    Identical,
    /// Another save from this instance is still in flight
    AlreadyInFlight,
    /// No document loaded yet
    NotLoaded,
    /// A document is being loaded
    Loading,
    /// The instance was closed
    Closed,
}

/// Result of one save attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The server accepted the save. `pending_edits` is true when the surface
    /// changed during the round trip and is still dirty.
    Saved { pending_edits: bool },
    /// The remote changed since our version; the next save overwrites it.
    Conflict,
    /// Nothing was sent.
    NoOp(NoOpReason),
    /// The save failed; local edits are kept.
    Failed(String),
    /// The surface moved to another document before the response arrived.
    Stale,
}

/// Result of loading a document into a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded {
        resolved_links: usize,
        failed_links: usize,
    },
    /// A newer `open` (or `close`) superseded this load.
    Stale,
}

/// Why a surface is dirty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyReason {
    /// Unsaved local edits
    Edited,
    /// The last save hit a version conflict; the next save overwrites
    Conflict,
    /// The last save failed
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Unloaded,
    Clean,
    Dirty(DirtyReason),
    Saving,
    Closed,
}

/// Point-in-time view of an instance.
#[derive(Debug, Clone)]
pub struct SyncSnapshot {
    pub phase: SyncPhase,
    pub document: Option<VersionedDocument>,
    pub dirty: bool,
    pub saving: bool,
    pub autosave_armed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveFailure {
    Conflict,
    Error,
}

struct InstanceState {
    document: Option<VersionedDocument>,
    dirty: bool,
    saving: bool,
    loading: bool,
    closed: bool,
    epoch: u64,
    load_seq: u64,
    failure: Option<SaveFailure>,
    autosave: AutosaveScheduler,
}

impl InstanceState {
    fn phase(&self) -> SyncPhase {
        if self.closed {
            return SyncPhase::Closed;
        }
        if self.document.is_none() {
            return SyncPhase::Unloaded;
        }
        if self.saving {
            return SyncPhase::Saving;
        }
        if !self.dirty {
            return SyncPhase::Clean;
        }
        SyncPhase::Dirty(match self.failure {
            None => DirtyReason::Edited,
            Some(SaveFailure::Conflict) => DirtyReason::Conflict,
            Some(SaveFailure::Error) => DirtyReason::Error,
        })
    }
}

/// A save that passed the guards and is ready to go out.
struct PreparedSave {
    key: DocumentKey,
    request: SaveRequest,
    epoch: u64,
}

enum Prepared {
    Send(PreparedSave),
    Skip {
        reason: NoOpReason,
        /// The identical-content check turned a dirty surface clean
        cleared: Option<DocumentKey>,
    },
}

struct Inner {
    label: String,
    role: Role,
    remote: Arc<dyn DocumentRemote>,
    surface: Arc<dyn EditorSurface>,
    navigation: Arc<dyn Navigation>,
    policy: Arc<dyn WritePolicy>,
    codec: Option<Arc<dyn PatchCodec>>,
    events: Option<Arc<EventBus>>,
    state: Mutex<InstanceState>,
}

/// Builder for `EditorSync`.
pub struct EditorSyncBuilder {
    label: String,
    role: Role,
    remote: Arc<dyn DocumentRemote>,
    surface: Arc<dyn EditorSurface>,
    navigation: Arc<dyn Navigation>,
    policy: Arc<dyn WritePolicy>,
    codec: Option<Arc<dyn PatchCodec>>,
    events: Option<Arc<EventBus>>,
    config: SyncConfig,
}

impl EditorSyncBuilder {
    pub fn role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn navigation(mut self, navigation: Arc<dyn Navigation>) -> Self {
        self.navigation = navigation;
        self
    }

    pub fn policy(mut self, policy: Arc<dyn WritePolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Codec for patch mode. `None` makes every save a full save.
    pub fn codec(mut self, codec: Option<Arc<dyn PatchCodec>>) -> Self {
        self.codec = codec;
        self
    }

    pub fn events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> EditorSync {
        let codec = if self.config.patch_mode { self.codec } else { None };
        EditorSync {
            inner: Arc::new(Inner {
                label: self.label,
                role: self.role,
                remote: self.remote,
                surface: self.surface,
                navigation: self.navigation,
                policy: self.policy,
                codec,
                events: self.events,
                state: Mutex::new(InstanceState {
                    document: None,
                    dirty: false,
                    saving: false,
                    loading: false,
                    closed: false,
                    epoch: 0,
                    load_seq: 0,
                    failure: None,
                    autosave: AutosaveScheduler::new(self.config.autosave_delay()),
                }),
            }),
        }
    }
}

/// Handle to one surface's sync instance. Clones refer to the same instance.
#[derive(Clone)]
pub struct EditorSync {
    inner: Arc<Inner>,
}

impl EditorSync {
    /// Start building an instance for a surface.
    ///
    /// Defaults: role `Editor`, `DefaultWritePolicy`, line-diff patches, no
    /// navigation callback, no event bus, `SyncConfig::default()`.
    pub fn builder(
        label: impl Into<String>,
        remote: Arc<dyn DocumentRemote>,
        surface: Arc<dyn EditorSurface>,
    ) -> EditorSyncBuilder {
        EditorSyncBuilder {
            label: label.into(),
            role: Role::Editor,
            remote,
            surface,
            navigation: Arc::new(NoNavigation),
            policy: Arc::new(DefaultWritePolicy),
            codec: Some(Arc::new(LineDiffCodec::new())),
            events: None,
            config: SyncConfig::default(),
        }
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn phase(&self) -> SyncPhase {
        self.inner.lock_state().phase()
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        let st = self.inner.lock_state();
        SyncSnapshot {
            phase: st.phase(),
            document: st.document.clone(),
            dirty: st.dirty,
            saving: st.saving,
            autosave_armed: st.autosave.is_armed(),
        }
    }

    pub fn document(&self) -> Option<VersionedDocument> {
        self.inner.lock_state().document.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.lock_state().dirty
    }

    pub fn is_saving(&self) -> bool {
        self.inner.lock_state().saving
    }

    /// Whether this instance currently shows `key`.
    pub fn shows(&self, key: &DocumentKey) -> bool {
        self.inner
            .lock_state()
            .document
            .as_ref()
            .is_some_and(|doc| doc.key() == key)
    }

    /// Load a document using its container's default kind.
    pub async fn open(&self, key: DocumentKey) -> Result<LoadOutcome> {
        let kind = key.container.default_kind();
        self.open_with_kind(key, kind).await
    }

    /// Load a document into this surface, replacing whatever it showed.
    ///
    /// Cancels the pending autosave. A save still in flight for the previous
    /// document completes on the server but no longer touches this surface.
    pub async fn open_with_kind(&self, key: DocumentKey, kind: DocumentKind) -> Result<LoadOutcome> {
        self.inner.open(key, kind).await
    }

    /// Recompute the surface's canonical text after an edit.
    ///
    /// Switches between clean and dirty and (re)arms or cancels the autosave.
    /// Must be called from within a tokio runtime.
    pub fn notify_edited(&self) -> SyncPhase {
        self.inner.notify_edited()
    }

    /// Attempt a save now.
    pub async fn save(&self, trigger: SaveTrigger) -> SaveOutcome {
        self.inner.attempt_save(trigger).await
    }

    /// Retire the instance: cancel the autosave and ignore any later response.
    pub fn close(&self) {
        let mut st = self.inner.lock_state();
        if !st.closed {
            debug!(surface = %self.inner.label, "Closing editor sync instance");
        }
        st.closed = true;
        st.autosave.cancel();
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, InstanceState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }

    fn can_write(&self, kind: DocumentKind) -> bool {
        self.policy.can_write(kind, self.role)
    }

    async fn open(self: &Arc<Self>, key: DocumentKey, kind: DocumentKind) -> Result<LoadOutcome> {
        let seq = {
            let mut st = self.lock_state();
            if st.closed {
                return Err(SyncError::Closed);
            }
            st.load_seq += 1;
            st.autosave.cancel();
            st.loading = true;
            st.load_seq
        };

        debug!(surface = %self.label, path = %key, "Loading document");

        let loaded = match self.remote.load(&key).await {
            Ok(loaded) => loaded,
            Err(e) => {
                self.abort_load(seq);
                error!(surface = %self.label, path = %key, "Failed to load document: {}", e);
                return Err(e.into());
            }
        };

        let resolution = resolve_link_labels(self.remote.as_ref(), &key, &loaded.content).await;
        if resolution.changed(&loaded.content) {
            debug!(path = %key, "Page reference labels updated at load");
        }

        {
            let mut st = self.lock_state();
            if st.closed || st.load_seq != seq {
                debug!(surface = %self.label, path = %key, "Discarding superseded load");
                return Ok(LoadOutcome::Stale);
            }
            // Responses to saves of the previous document are now stale
            st.epoch += 1;
            st.autosave.cancel();
            st.document = Some(VersionedDocument::from_loaded(
                key.clone(),
                kind,
                &loaded,
                resolution.content.clone(),
            ));
            st.loading = false;
            st.dirty = false;
            st.saving = false;
            st.failure = None;
        }

        self.surface.show_document(&LoadedView {
            key: &key,
            content: &resolution.content,
            title: loaded.title.as_deref(),
            locked_links: &resolution.resolved,
        });
        self.surface.set_dirty(false);

        info!(
            surface = %self.label,
            path = %key,
            resolved_links = resolution.resolved.len(),
            "Document loaded"
        );
        self.emit(SyncEvent::Loaded {
            surface: self.label.clone(),
            path: key.path(),
            resolved_links: resolution.resolved.len(),
            timestamp: now_millis(),
        });

        Ok(LoadOutcome::Loaded {
            resolved_links: resolution.resolved.len(),
            failed_links: resolution.failed.len(),
        })
    }

    /// A load failed: keep showing the previous document and resume its autosave.
    fn abort_load(self: &Arc<Self>, seq: u64) {
        let mut st = self.lock_state();
        if st.load_seq != seq {
            return;
        }
        st.loading = false;
        // An in-flight save re-arms on completion
        if st.dirty && !st.closed && !st.saving {
            self.arm_autosave(&mut st);
        }
    }

    fn notify_edited(self: &Arc<Self>) -> SyncPhase {
        let current = self.surface.canonical_text();

        let (phase, dirty, changed_key) = {
            let mut st = self.lock_state();
            if st.closed || st.loading {
                return st.phase();
            }
            let Some(doc) = st.document.as_ref() else {
                return SyncPhase::Unloaded;
            };

            let dirty = doc.differs_from(&current);
            let changed_key = (dirty != st.dirty).then(|| doc.key().clone());
            st.dirty = dirty;

            if dirty {
                if !st.saving {
                    self.arm_autosave(&mut st);
                }
            } else {
                st.autosave.cancel();
                st.failure = None;
            }
            (st.phase(), dirty, changed_key)
        };

        if let Some(key) = changed_key {
            self.announce_dirty(&key, dirty);
        }
        phase
    }

    fn announce_dirty(&self, key: &DocumentKey, dirty: bool) {
        self.surface.set_dirty(dirty);
        self.emit(SyncEvent::DirtyChanged {
            surface: self.label.clone(),
            path: key.path(),
            dirty,
            timestamp: now_millis(),
        });
    }

    fn arm_autosave(self: &Arc<Self>, st: &mut InstanceState) {
        let weak = Arc::downgrade(self);
        st.autosave.arm(move |generation| async move {
            // The instance may have been dropped while the timer slept
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let claimed = inner.lock_state().autosave.claim(generation);
            if claimed {
                inner.attempt_save(SaveTrigger::Autosave).await;
            }
        });
    }

    /// Run the guards and, if they pass, enter `Saving`.
    fn prepare_save(&self, st: &mut InstanceState, current: &str) -> Prepared {
        let skip = |reason| Prepared::Skip {
            reason,
            cleared: None,
        };

        if st.closed {
            return skip(NoOpReason::Closed);
        }
        if st.loading {
            return skip(NoOpReason::Loading);
        }
        if st.saving {
            return skip(NoOpReason::AlreadyInFlight);
        }
        let Some(doc) = st.document.as_ref() else {
            return skip(NoOpReason::NotLoaded);
        };

        if !doc.differs_from(current) {
            let cleared = st.dirty.then(|| doc.key().clone());
            st.dirty = false;
            st.failure = None;
            st.autosave.cancel();
            return Prepared::Skip {
                reason: NoOpReason::Identical,
                cleared,
            };
        }

        let can_write = self.can_write(doc.kind());
        let request = match select_mode_or_full(doc, current, can_write, self.codec.as_deref()) {
            SaveDecision::Refused => return skip(NoOpReason::PermissionDenied),
            SaveDecision::Send(request) => request,
        };

        let key = doc.key().clone();
        st.saving = true;
        st.autosave.cancel();

        Prepared::Send(PreparedSave {
            key,
            request,
            epoch: st.epoch,
        })
    }

    async fn attempt_save(self: &Arc<Self>, trigger: SaveTrigger) -> SaveOutcome {
        let explicit = trigger.is_explicit();
        let current = self.surface.canonical_text();

        let prepared = {
            let mut st = self.lock_state();
            self.prepare_save(&mut st, &current)
        };

        let save = match prepared {
            Prepared::Send(save) => save,
            Prepared::Skip { reason, cleared } => {
                if let Some(key) = cleared {
                    self.announce_dirty(&key, false);
                }
                self.report_skip(reason, explicit);
                return SaveOutcome::NoOp(reason);
            }
        };

        let mode = save.request.mode();
        info!(surface = %self.label, path = %save.key, ?mode, explicit, "Saving document");
        self.emit(SyncEvent::SaveStarted {
            surface: self.label.clone(),
            path: save.key.path(),
            mode,
            explicit,
            timestamp: now_millis(),
        });

        let result = self.remote.save(&save.key, &save.request).await;

        // The surface may have changed during the round trip
        let current = self.surface.canonical_text();
        self.complete_save(save, mode, result, &current, explicit)
    }

    fn report_skip(&self, reason: NoOpReason, explicit: bool) {
        debug!(surface = %self.label, ?reason, explicit, "Save skipped");
        if !explicit {
            return;
        }
        let status = match reason {
            NoOpReason::PermissionDenied => {
                StatusMessage::info("You don't have permission to edit this page")
            }
            NoOpReason::Identical => StatusMessage::info("No changes to save"),
            NoOpReason::AlreadyInFlight => StatusMessage::info("Save already in progress"),
            NoOpReason::NotLoaded | NoOpReason::Loading | NoOpReason::Closed => return,
        };
        self.surface.show_status(&status);
    }

    fn complete_save(
        self: &Arc<Self>,
        save: PreparedSave,
        mode: SaveMode,
        result: std::result::Result<SaveResponse, RemoteError>,
        current: &str,
        explicit: bool,
    ) -> SaveOutcome {
        let key = save.key;
        let mut st = self.lock_state();

        let still_shown = st
            .document
            .as_ref()
            .is_some_and(|doc| doc.key() == &key);
        if st.closed || st.epoch != save.epoch || !still_shown {
            drop(st);
            match &result {
                Ok(_) => debug!(surface = %self.label, path = %key, "Save succeeded after surface moved on"),
                Err(e) => debug!(surface = %self.label, path = %key, "Stale save failed: {}", e),
            }
            self.emit(SyncEvent::StaleResponse {
                surface: self.label.clone(),
                path: key.path(),
                timestamp: now_millis(),
            });
            return SaveOutcome::Stale;
        }

        st.saving = false;

        match result {
            Ok(response) => {
                let version_token = response.version_token.clone();
                let Some(doc) = st.document.as_mut() else {
                    return SaveOutcome::Stale;
                };
                let new_title = doc.apply_saved(response.content, response.version_token, response.title);
                let pending_edits = doc.differs_from(current);

                st.dirty = pending_edits;
                st.failure = None;
                if pending_edits {
                    self.arm_autosave(&mut st);
                }
                drop(st);

                self.surface.set_dirty(pending_edits);
                if let Some(title) = new_title {
                    self.navigation.on_title_changed(&key, &title);
                    self.emit(SyncEvent::TitleChanged {
                        surface: self.label.clone(),
                        path: key.path(),
                        title,
                        timestamp: now_millis(),
                    });
                }
                if explicit {
                    let text = response.message.unwrap_or_else(|| "Saved".to_string());
                    self.surface.show_status(&StatusMessage::info(text));
                }

                info!(surface = %self.label, path = %key, pending_edits, "Document saved");
                self.emit(SyncEvent::Saved {
                    surface: self.label.clone(),
                    path: key.path(),
                    version_token,
                    pending_edits,
                    timestamp: now_millis(),
                });
                SaveOutcome::Saved { pending_edits }
            }
            Err(RemoteError::Conflict) if mode == SaveMode::Patch => {
                let dirty = match st.document.as_mut() {
                    Some(doc) => {
                        doc.mark_conflict();
                        doc.differs_from(current)
                    }
                    None => false,
                };
                st.dirty = dirty;
                st.failure = dirty.then_some(SaveFailure::Conflict);
                drop(st);

                self.surface.set_dirty(dirty);
                self.surface.show_status(&StatusMessage::warning(
                    "This page was changed elsewhere. Saving again will overwrite those changes.",
                ));

                warn!(surface = %self.label, path = %key, "Version conflict, next save overwrites remote");
                self.emit(SyncEvent::Conflict {
                    surface: self.label.clone(),
                    path: key.path(),
                    timestamp: now_millis(),
                });
                SaveOutcome::Conflict
            }
            Err(e) => {
                let dirty = st
                    .document
                    .as_ref()
                    .is_some_and(|doc| doc.differs_from(current));
                st.dirty = dirty;
                st.failure = dirty.then_some(SaveFailure::Error);
                if dirty {
                    self.arm_autosave(&mut st);
                }
                drop(st);

                self.surface.set_dirty(dirty);
                if explicit {
                    self.surface
                        .show_status(&StatusMessage::error(format!("Save failed: {}", e)));
                }

                warn!(surface = %self.label, path = %key, explicit, "Save failed: {}", e);
                self.emit(SyncEvent::SaveFailed {
                    surface: self.label.clone(),
                    path: key.path(),
                    error: e.to_string(),
                    timestamp: now_millis(),
                });
                SaveOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRemote;

    struct TextSurface {
        text: Mutex<String>,
        statuses: Mutex<Vec<StatusMessage>>,
    }

    impl TextSurface {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                text: Mutex::new(String::new()),
                statuses: Mutex::new(Vec::new()),
            })
        }

        fn type_text(&self, text: &str) {
            *self.text.lock().unwrap() = text.to_string();
        }
    }

    impl EditorSurface for TextSurface {
        fn canonical_text(&self) -> String {
            self.text.lock().unwrap().clone()
        }

        fn show_document(&self, view: &LoadedView<'_>) {
            self.type_text(view.content);
        }

        fn show_status(&self, status: &StatusMessage) {
            self.statuses.lock().unwrap().push(status.clone());
        }
    }

    fn setup() -> (Arc<InMemoryRemote>, Arc<TextSurface>, EditorSync) {
        let remote = Arc::new(InMemoryRemote::new());
        let surface = TextSurface::new();
        let sync = EditorSync::builder("main", remote.clone(), surface.clone()).build();
        (remote, surface, sync)
    }

    #[tokio::test]
    async fn test_open_sets_clean_state() {
        let (remote, surface, sync) = setup();
        let key = DocumentKey::project("p", "d");
        remote.insert(&key, "A", "t1");

        assert_eq!(sync.phase(), SyncPhase::Unloaded);
        let outcome = sync.open(key.clone()).await.unwrap();

        assert!(matches!(outcome, LoadOutcome::Loaded { .. }));
        assert_eq!(sync.phase(), SyncPhase::Clean);
        assert_eq!(surface.canonical_text(), "A");
        let doc = sync.document().unwrap();
        assert_eq!(doc.version_token(), Some("t1"));
        assert_eq!(doc.kind(), DocumentKind::Standard);
    }

    #[tokio::test]
    async fn test_open_missing_document_is_an_error() {
        let (_remote, _surface, sync) = setup();
        let err = sync.open(DocumentKey::project("p", "nope")).await.unwrap_err();
        assert!(matches!(err, SyncError::Remote(RemoteError::NotFound(_))));
        assert_eq!(sync.phase(), SyncPhase::Unloaded);
    }

    #[tokio::test]
    async fn test_save_before_load_is_noop() {
        let (remote, _surface, sync) = setup();
        assert_eq!(
            sync.save(SaveTrigger::Explicit).await,
            SaveOutcome::NoOp(NoOpReason::NotLoaded)
        );
        assert_eq!(remote.save_count(), 0);
    }

    #[tokio::test]
    async fn test_identical_content_skips_network() {
        let (remote, surface, sync) = setup();
        let key = DocumentKey::project("p", "d");
        remote.insert(&key, "A", "t1");
        sync.open(key).await.unwrap();

        assert_eq!(
            sync.save(SaveTrigger::Explicit).await,
            SaveOutcome::NoOp(NoOpReason::Identical)
        );
        assert_eq!(remote.save_count(), 0);
        assert_eq!(
            surface.statuses.lock().unwrap().last(),
            Some(&StatusMessage::info("No changes to save"))
        );
    }

    #[tokio::test]
    async fn test_restricted_document_refused_for_editor() {
        let (remote, surface, sync) = setup();
        let key = DocumentKey::channel("news", "d");
        remote.insert(&key, "A", "t1");
        sync.open(key).await.unwrap();

        surface.type_text("AB");
        sync.notify_edited();

        assert_eq!(
            sync.save(SaveTrigger::Explicit).await,
            SaveOutcome::NoOp(NoOpReason::PermissionDenied)
        );
        assert_eq!(remote.save_count(), 0);
        assert_eq!(
            surface.statuses.lock().unwrap().last(),
            Some(&StatusMessage::info("You don't have permission to edit this page"))
        );

        // Autosave refusals stay silent
        let shown = surface.statuses.lock().unwrap().len();
        assert_eq!(
            sync.save(SaveTrigger::Autosave).await,
            SaveOutcome::NoOp(NoOpReason::PermissionDenied)
        );
        assert_eq!(surface.statuses.lock().unwrap().len(), shown);
        assert!(sync.is_dirty());
    }

    #[tokio::test]
    async fn test_admin_may_write_restricted_document() {
        let remote = Arc::new(InMemoryRemote::new());
        let surface = TextSurface::new();
        let sync = EditorSync::builder("main", remote.clone(), surface.clone())
            .role(Role::Admin)
            .build();
        let key = DocumentKey::channel("news", "d");
        remote.insert(&key, "A", "t1");
        sync.open(key.clone()).await.unwrap();

        surface.type_text("AB");
        sync.notify_edited();

        assert_eq!(
            sync.save(SaveTrigger::Explicit).await,
            SaveOutcome::Saved { pending_edits: false }
        );
        assert_eq!(remote.content(&key).as_deref(), Some("AB"));
    }

    #[tokio::test]
    async fn test_closed_instance_skips_save() {
        let (remote, surface, sync) = setup();
        let key = DocumentKey::project("p", "d");
        remote.insert(&key, "A", "t1");
        sync.open(key).await.unwrap();

        surface.type_text("AB");
        sync.notify_edited();
        assert!(sync.snapshot().autosave_armed);

        sync.close();
        assert!(!sync.snapshot().autosave_armed);
        assert_eq!(
            sync.save(SaveTrigger::Explicit).await,
            SaveOutcome::NoOp(NoOpReason::Closed)
        );
        assert_eq!(remote.save_count(), 0);
    }

    #[tokio::test]
    async fn test_closed_instance_rejects_open() {
        let (_remote, _surface, sync) = setup();
        sync.close();
        assert!(matches!(
            sync.open(DocumentKey::project("p", "d")).await,
            Err(SyncError::Closed)
        ));
        assert_eq!(sync.phase(), SyncPhase::Closed);
    }
}
