//! A markdown file on disk acting as an editor surface.

use doc_sync::{EditorSurface, LoadedView, StatusLevel, StatusMessage};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

pub struct FileSurface {
    path: PathBuf,
    /// Last text read from or written to the file
    last_text: Mutex<String>,
    dirty: AtomicBool,
}

impl FileSurface {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_text: Mutex::new(String::new()),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    fn remember(&self, text: &str) {
        let mut last = self.last_text.lock().unwrap_or_else(|e| e.into_inner());
        *last = text.to_string();
    }
}

/// Line endings are not content: CRLF and LF files compare equal.
fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n")
}

impl EditorSurface for FileSurface {
    /// The file's text, or the last known text while the file is unreadable.
    fn canonical_text(&self) -> String {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => {
                let text = normalize(&text);
                self.remember(&text);
                text
            }
            Err(e) => {
                debug!(path = %self.path.display(), "Using last known content: {}", e);
                self.last_text
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .clone()
            }
        }
    }

    fn show_document(&self, view: &LoadedView<'_>) {
        self.remember(view.content);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                error!(path = %parent.display(), "Failed to create directory: {}", e);
            }
        }
        if let Err(e) = std::fs::write(&self.path, view.content) {
            error!(path = %self.path.display(), "Failed to write document: {}", e);
            return;
        }

        info!(
            path = %self.path.display(),
            document = %view.key,
            title = view.title.unwrap_or(""),
            locked_links = view.locked_links.len(),
            "Document written"
        );
    }

    fn show_status(&self, status: &StatusMessage) {
        match status.level {
            StatusLevel::Info => info!("{}", status.text),
            StatusLevel::Warning => warn!("{}", status.text),
            StatusLevel::Error => error!("{}", status.text),
        }
    }

    fn set_dirty(&self, dirty: bool) {
        if self.dirty.swap(dirty, Ordering::SeqCst) != dirty {
            debug!(path = %self.path.display(), dirty, "Unsaved changes changed");
        }
    }
}
