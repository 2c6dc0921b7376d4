//! doc-sync: Save and autosave engine for collaboratively edited documents.
//!
//! This crate provides:
//! - Versioned document state (base content plus server version token)
//! - Patch-vs-full save mode selection with optimistic concurrency
//! - A debounced autosave scheduler per editor surface
//! - Independent sync instances for the main editor and peek windows
//! - Load-time resolution of page reference labels
//! - DocumentRemote and EditorSurface trait abstractions

pub mod collab;
pub mod config;
pub mod document;
pub mod events;
pub mod instance;
pub mod links;
pub mod memory;
pub mod patch;
pub mod remote;
pub mod scheduler;
pub mod selector;
pub mod session;

pub use collab::{
    DefaultWritePolicy, EditorSurface, LoadedView, Navigation, NoNavigation, Role, StatusLevel,
    StatusMessage, WritePolicy,
};
pub use config::SyncConfig;
pub use document::{ContainerId, DocumentKey, DocumentKind, LoadedDocument, VersionedDocument};
pub use events::{EventBus, Subscription, SyncEvent};
pub use instance::{
    DirtyReason, EditorSync, EditorSyncBuilder, LoadOutcome, NoOpReason, SaveOutcome, SaveTrigger,
    SyncError, SyncPhase, SyncSnapshot,
};
pub use links::{LinkResolution, ResolvedLink, resolve_link_labels};
pub use memory::InMemoryRemote;
pub use patch::{LineDiffCodec, Patch, PatchCodec, PatchError, PatchOp};
pub use remote::{DocumentRemote, ErrorBody, RemoteError, SaveMode, SaveRequest, SaveResponse};
pub use scheduler::AutosaveScheduler;
pub use selector::{SaveDecision, select_mode, select_mode_or_full};
pub use session::{EditorSession, PeekId, SessionDeps};
