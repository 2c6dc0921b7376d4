//! Event infrastructure for doc-sync.
//!
//! Provides `SyncEvent` for debug/monitoring and `EventBus` for subscriptions.
//! Several editor instances may share one bus; every event names its surface.

use crate::remote::SaveMode;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, Weak};

/// Events emitted by editor sync instances for real-time monitoring.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SyncEvent {
    /// A document was loaded into a surface.
    Loaded {
        surface: String,
        /// Document path (`<namespace>/<container>/document/<id>`).
        path: String,
        /// Number of page references whose label was resolved.
        #[serde(rename = "resolvedLinks")]
        resolved_links: usize,
        /// When the load completed, in milliseconds since Unix epoch.
        timestamp: f64,
    },
    /// The surface switched between clean and dirty.
    DirtyChanged {
        surface: String,
        path: String,
        dirty: bool,
        timestamp: f64,
    },
    /// A save request was sent.
    SaveStarted {
        surface: String,
        path: String,
        mode: SaveMode,
        /// Whether the user asked for it (false for autosave).
        explicit: bool,
        timestamp: f64,
    },
    /// The server accepted a save.
    Saved {
        surface: String,
        path: String,
        #[serde(rename = "versionToken")]
        version_token: String,
        /// Edits made during the round trip are still unsaved.
        #[serde(rename = "pendingEdits")]
        pending_edits: bool,
        timestamp: f64,
    },
    /// The server rejected a patch because the remote changed.
    Conflict {
        surface: String,
        path: String,
        timestamp: f64,
    },
    /// A save failed for any other reason.
    SaveFailed {
        surface: String,
        path: String,
        error: String,
        timestamp: f64,
    },
    /// A response arrived for a document the surface no longer shows.
    StaleResponse {
        surface: String,
        path: String,
        timestamp: f64,
    },
    /// The server reported a new title.
    TitleChanged {
        surface: String,
        path: String,
        title: String,
        timestamp: f64,
    },
}

impl SyncEvent {
    /// Label of the surface that emitted the event.
    pub fn surface(&self) -> &str {
        match self {
            SyncEvent::Loaded { surface, .. }
            | SyncEvent::DirtyChanged { surface, .. }
            | SyncEvent::SaveStarted { surface, .. }
            | SyncEvent::Saved { surface, .. }
            | SyncEvent::Conflict { surface, .. }
            | SyncEvent::SaveFailed { surface, .. }
            | SyncEvent::StaleResponse { surface, .. }
            | SyncEvent::TitleChanged { surface, .. } => surface,
        }
    }

    /// Path of the document the event concerns.
    pub fn path(&self) -> &str {
        match self {
            SyncEvent::Loaded { path, .. }
            | SyncEvent::DirtyChanged { path, .. }
            | SyncEvent::SaveStarted { path, .. }
            | SyncEvent::Saved { path, .. }
            | SyncEvent::Conflict { path, .. }
            | SyncEvent::SaveFailed { path, .. }
            | SyncEvent::StaleResponse { path, .. }
            | SyncEvent::TitleChanged { path, .. } => path,
        }
    }
}

/// Current time in milliseconds since Unix epoch.
pub fn now_millis() -> f64 {
    web_time::SystemTime::now()
        .duration_since(web_time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

/// Subscription handle that unsubscribes automatically when dropped.
///
/// Follows the disposer pattern: hold this value to keep receiving events,
/// drop it (or let it go out of scope) to unsubscribe.
pub struct Subscription {
    bus: Weak<EventBus>,
    id: usize,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

/// Event bus for publishing sync events to subscribers.
///
/// Wrap in `Arc` to enable subscriptions.
pub struct EventBus {
    callbacks: RwLock<Vec<(usize, Arc<dyn Fn(SyncEvent) + Send + Sync>)>>,
    next_id: AtomicUsize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self {
            callbacks: RwLock::new(Vec::new()),
            next_id: AtomicUsize::new(0),
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events. Returns `Subscription` that unsubscribes on drop.
    pub fn subscribe(
        self: &Arc<Self>,
        callback: impl Fn(SyncEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(callback)));
        Subscription {
            bus: Arc::downgrade(self),
            id,
        }
    }

    fn unsubscribe(&self, id: usize) {
        // try_write: Drop may run during unwinding while emit holds a read lock
        if let Ok(mut guard) = self.callbacks.try_write() {
            guard.retain(|(i, _)| *i != id);
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: SyncEvent) {
        // Clone the list so a callback may subscribe without deadlocking.
        let callbacks: Vec<_> = self
            .callbacks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            callback(event.clone());
        }
    }
}
