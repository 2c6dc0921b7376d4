//! End-to-end tests for the file mirror.
//!
//! Wires a real file, the watcher and the sync engine to an in-process
//! document server.

use std::sync::Arc;
use std::time::Duration;

use doc_sync::{DocumentKey, EditorSync, InMemoryRemote, SyncConfig, SyncPhase};
use doc_sync_watch::{FileEventKind, FileSurface, FileWatcher};
use tempfile::TempDir;
use tokio::time::timeout;

const AUTOSAVE: Duration = Duration::from_millis(50);

struct Mirror {
    _dir: TempDir,
    remote: Arc<InMemoryRemote>,
    surface: Arc<FileSurface>,
    sync: EditorSync,
    watcher: FileWatcher,
}

async fn mirror(content: &str) -> Mirror {
    let dir = TempDir::new().unwrap();
    let remote = Arc::new(InMemoryRemote::new());
    remote.insert(&key(), content, "t1");

    let surface = Arc::new(FileSurface::new(dir.path().join("page.md")));
    let sync = EditorSync::builder("file", remote.clone(), surface.clone())
        .config(SyncConfig::default().with_autosave_delay(AUTOSAVE))
        .build();
    sync.open(key()).await.expect("load failed");

    let watcher = FileWatcher::new(surface.path()).expect("watcher failed");

    Mirror {
        _dir: dir,
        remote,
        surface,
        sync,
        watcher,
    }
}

fn key() -> DocumentKey {
    DocumentKey::project("proj", "page")
}

/// Wait for the next watcher event and feed it to the engine.
async fn next_edit(mirror: &mut Mirror) -> SyncPhase {
    let kind = timeout(Duration::from_secs(5), mirror.watcher.event_rx().recv())
        .await
        .expect("Timeout waiting for file event")
        .expect("Watcher closed");
    assert_eq!(kind, FileEventKind::Modified);
    mirror.sync.notify_edited()
}

/// Poll until the server holds `expected`.
async fn wait_for_remote(mirror: &Mirror, expected: &str) {
    let result = timeout(Duration::from_secs(5), async {
        while mirror.remote.content(&key()).as_deref() != Some(expected) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "server never received {:?}", expected);
}

#[tokio::test]
async fn test_load_writes_file() {
    let mirror = mirror("# Page\nhello\n").await;

    assert_eq!(
        std::fs::read_to_string(mirror.surface.path()).unwrap(),
        "# Page\nhello\n"
    );
    assert_eq!(mirror.sync.phase(), SyncPhase::Clean);
}

#[tokio::test]
async fn test_file_edit_is_autosaved() {
    let mut mirror = mirror("# Page\nhello\n").await;

    std::fs::write(mirror.surface.path(), "# Page\nhello world\n").unwrap();
    let phase = next_edit(&mut mirror).await;
    assert!(matches!(phase, SyncPhase::Dirty(_)));

    wait_for_remote(&mirror, "# Page\nhello world\n").await;
    assert_eq!(mirror.remote.save_count(), 1);
}

#[tokio::test]
async fn test_reverting_the_file_cancels_the_save() {
    let mut mirror = mirror("original\n").await;

    std::fs::write(mirror.surface.path(), "changed\n").unwrap();
    assert!(matches!(next_edit(&mut mirror).await, SyncPhase::Dirty(_)));

    std::fs::write(mirror.surface.path(), "original\n").unwrap();
    mirror.sync.notify_edited();
    assert_eq!(mirror.sync.phase(), SyncPhase::Clean);

    tokio::time::sleep(AUTOSAVE * 4).await;
    assert_eq!(mirror.remote.save_count(), 0);
}
