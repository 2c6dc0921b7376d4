//! Debounced watcher for the mirrored document file.
//!
//! Uses notify-debouncer-mini on the file's parent directory so the file can
//! be replaced atomically by editors that write-and-rename.

use anyhow::{Context, Result};
use notify::RecursiveMode;
use notify_debouncer_mini::{DebouncedEvent, new_debouncer};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Debounce period for raw file system events.
pub const DEBOUNCE: Duration = Duration::from_millis(200);

/// Change to the watched file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    /// File was created or modified
    Modified,
    /// File was deleted
    Deleted,
}

pub struct FileWatcher {
    path: PathBuf,
    /// Debouncer handle (must keep alive)
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
    event_rx: mpsc::UnboundedReceiver<FileEventKind>,
}

/// Last seen mtime, to drop events that did not change the file
type LastMtime = Arc<Mutex<Option<SystemTime>>>;

impl FileWatcher {
    /// Watch `path`. Its parent directory must exist.
    pub fn new(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .with_context(|| format!("Not a file path: {}", path.display()))?
            .to_owned();
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        // FSEvents reports real paths (/private/var/... on macOS)
        let parent = parent.canonicalize().unwrap_or(parent);
        let path = parent.join(&file_name);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let watched = path.clone();
        let last_mtime: LastMtime = Arc::new(Mutex::new(None));

        let mut debouncer = new_debouncer(
            DEBOUNCE,
            move |result: Result<Vec<DebouncedEvent>, notify::Error>| match result {
                Ok(events) => {
                    // One notification per batch is enough: the consumer re-reads the file
                    let touched = events.iter().any(|event| event.path == watched);
                    if !touched {
                        return;
                    }
                    if let Some(kind) = Self::classify(&watched, &last_mtime) {
                        let _ = event_tx.send(kind);
                    }
                }
                Err(e) => {
                    error!("File watcher error: {}", e);
                }
            },
        )?;

        debouncer
            .watcher()
            .watch(&parent, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", parent.display()))?;

        debug!(path = %path.display(), "Watching document file");

        Ok(Self {
            path,
            _debouncer: debouncer,
            event_rx,
        })
    }

    fn classify(path: &Path, last_mtime: &LastMtime) -> Option<FileEventKind> {
        let mut last = last_mtime.lock().unwrap_or_else(|e| e.into_inner());

        let Ok(metadata) = std::fs::metadata(path) else {
            *last = None;
            debug!(path = %path.display(), "Document file deleted");
            return Some(FileEventKind::Deleted);
        };

        if let Ok(mtime) = metadata.modified() {
            if *last == Some(mtime) {
                return None;
            }
            *last = Some(mtime);
        }
        debug!(path = %path.display(), "Document file modified");
        Some(FileEventKind::Modified)
    }

    /// Get the receiver for file events.
    pub fn event_rx(&mut self) -> &mut mpsc::UnboundedReceiver<FileEventKind> {
        &mut self.event_rx
    }

    /// Watched path, with the parent directory canonicalized.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
