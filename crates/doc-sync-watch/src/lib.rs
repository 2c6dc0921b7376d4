//! doc-sync-watch library: Exposes the file mirror's components for testing.
//!
//! A thin layer over doc-sync: an HTTP transport, a file-backed editor
//! surface and a watcher that turns file changes into edit notifications.

pub mod config;
pub mod http;
pub mod surface;
pub mod watcher;

pub use config::WatchConfig;
pub use http::{HttpOptions, HttpRemote};
pub use surface::FileSurface;
pub use watcher::{FileEventKind, FileWatcher};
