//! In-memory document server for testing.
//!
//! Behaves like the real endpoint: patches are validated against the stored
//! version token and applied server-side, every commit mints a new token from
//! the committed content, and titles are taken from the first `# ` heading.
//! Saves are recorded, can be made to fail, and can be held back to simulate
//! a slow network. Loads can be held back the same way.

use crate::document::{DocumentKey, LoadedDocument};
use crate::patch::{LineDiffCodec, PatchCodec};
use crate::remote::{DocumentRemote, RemoteError, Result, SaveRequest, SaveResponse};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::Semaphore;

#[derive(Debug, Clone)]
struct StoredDocument {
    content: String,
    version_token: String,
    title: Option<String>,
}

/// A save request as received by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSave {
    pub key: DocumentKey,
    pub request: SaveRequest,
}

pub struct InMemoryRemote {
    documents: RwLock<HashMap<DocumentKey, StoredDocument>>,
    codec: LineDiffCodec,
    saves: Mutex<Vec<RecordedSave>>,
    loads: AtomicUsize,
    /// Errors returned by the next saves, in order
    failures: Mutex<VecDeque<RemoteError>>,
    /// When set, saves wait for a permit before being processed
    gate: Mutex<Option<Arc<Semaphore>>>,
    load_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            codec: LineDiffCodec::new(),
            saves: Mutex::new(Vec::new()),
            loads: AtomicUsize::new(0),
            failures: Mutex::new(VecDeque::new()),
            gate: Mutex::new(None),
            load_gate: Mutex::new(None),
        }
    }

    /// Store a document with an explicit version token.
    pub fn insert(&self, key: &DocumentKey, content: &str, version_token: &str) {
        self.documents.write().unwrap().insert(
            key.clone(),
            StoredDocument {
                content: content.to_string(),
                version_token: version_token.to_string(),
                title: title_from_content(content),
            },
        );
    }

    /// Overwrite a document as another client would, minting a new token.
    pub fn edit_remotely(&self, key: &DocumentKey, content: &str) -> String {
        let mut documents = self.documents.write().unwrap();
        let stored = commit(content);
        let token = stored.version_token.clone();
        documents.insert(key.clone(), stored);
        token
    }

    pub fn content(&self, key: &DocumentKey) -> Option<String> {
        self.documents
            .read()
            .unwrap()
            .get(key)
            .map(|doc| doc.content.clone())
    }

    pub fn version_token(&self, key: &DocumentKey) -> Option<String> {
        self.documents
            .read()
            .unwrap()
            .get(key)
            .map(|doc| doc.version_token.clone())
    }

    /// All save requests received so far, including failed ones.
    pub fn saves(&self) -> Vec<RecordedSave> {
        self.saves.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().unwrap().len()
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Make the next save (after any already queued failures) fail.
    pub fn fail_next_save(&self, error: RemoteError) {
        self.failures.lock().unwrap().push_back(error);
    }

    /// Hold saves until `release_saves` is called.
    pub fn hold_saves(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let `count` held saves through.
    pub fn release_saves(&self, count: usize) {
        if let Some(gate) = self.gate.lock().unwrap().as_ref() {
            gate.add_permits(count);
        }
    }

    /// Stop holding saves and release everything waiting.
    pub fn open_gate(&self) {
        release_all(&self.gate);
    }

    /// Hold loads until `open_load_gate` is called. Loads are counted before
    /// they wait.
    pub fn hold_loads(&self) {
        *self.load_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn open_load_gate(&self) {
        release_all(&self.load_gate);
    }
}

fn release_all(gate: &Mutex<Option<Arc<Semaphore>>>) {
    if let Some(gate) = gate.lock().unwrap().take() {
        gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }
}

async fn wait_for(gate: &Mutex<Option<Arc<Semaphore>>>) {
    let gate = gate.lock().unwrap().clone();
    if let Some(gate) = gate {
        if let Ok(permit) = gate.acquire().await {
            permit.forget();
        }
    }
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentRemote for InMemoryRemote {
    async fn load(&self, key: &DocumentKey) -> Result<LoadedDocument> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        wait_for(&self.load_gate).await;

        let documents = self.documents.read().unwrap();
        let doc = documents
            .get(key)
            .ok_or_else(|| RemoteError::NotFound(key.path()))?;
        Ok(LoadedDocument {
            content: doc.content.clone(),
            version_token: doc.version_token.clone(),
            title: doc.title.clone(),
        })
    }

    async fn save(&self, key: &DocumentKey, request: &SaveRequest) -> Result<SaveResponse> {
        self.saves.lock().unwrap().push(RecordedSave {
            key: key.clone(),
            request: request.clone(),
        });

        wait_for(&self.gate).await;

        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        let mut documents = self.documents.write().unwrap();
        let current = documents
            .get(key)
            .ok_or_else(|| RemoteError::NotFound(key.path()))?;

        let content = match request {
            SaveRequest::Full { content } => content.clone(),
            SaveRequest::Patch {
                patch,
                base_version_token,
            } => {
                if *base_version_token != current.version_token {
                    return Err(RemoteError::Conflict);
                }
                self.codec
                    .apply_patch(&current.content, patch)
                    .map_err(|e| RemoteError::Status {
                        code: 422,
                        message: e.to_string(),
                    })?
            }
        };

        let stored = commit(&content);
        let response = SaveResponse {
            content: stored.content.clone(),
            version_token: stored.version_token.clone(),
            title: stored.title.clone(),
            message: None,
        };
        documents.insert(key.clone(), stored);
        Ok(response)
    }
}

/// Normalise and store content the way the server commits it.
fn commit(content: &str) -> StoredDocument {
    let content = content.replace("\r\n", "\n");
    StoredDocument {
        version_token: content_token(&content),
        title: title_from_content(&content),
        content,
    }
}

/// Version token for committed content: hex SHA-256.
pub fn content_token(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Title from the first level-one heading.
pub fn title_from_content(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> DocumentKey {
        DocumentKey::project("p", "d")
    }

    #[tokio::test]
    async fn test_load_missing_document() {
        let remote = InMemoryRemote::new();
        let err = remote.load(&key()).await.unwrap_err();
        assert!(matches!(err, RemoteError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_full_save_commits_and_mints_token() {
        let remote = InMemoryRemote::new();
        remote.insert(&key(), "A", "t1");

        let response = remote
            .save(&key(), &SaveRequest::Full { content: "# New\r\nbody".into() })
            .await
            .unwrap();

        assert_eq!(response.content, "# New\nbody");
        assert_eq!(response.version_token, content_token("# New\nbody"));
        assert_eq!(response.title.as_deref(), Some("New"));
        assert_eq!(remote.content(&key()).as_deref(), Some("# New\nbody"));
    }

    #[tokio::test]
    async fn test_patch_against_current_token_applies() {
        let remote = InMemoryRemote::new();
        remote.insert(&key(), "A\n", "t1");

        let patch = LineDiffCodec.make_patch("A\n", "A\nB\n").unwrap();
        let response = remote
            .save(
                &key(),
                &SaveRequest::Patch {
                    patch,
                    base_version_token: "t1".into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(response.content, "A\nB\n");
        assert_ne!(response.version_token, "t1");
    }

    #[tokio::test]
    async fn test_patch_against_stale_token_conflicts() {
        let remote = InMemoryRemote::new();
        remote.insert(&key(), "A\n", "t1");
        remote.edit_remotely(&key(), "A\nremote\n");

        let patch = LineDiffCodec.make_patch("A\n", "A\nB\n").unwrap();
        let err = remote
            .save(
                &key(),
                &SaveRequest::Patch {
                    patch,
                    base_version_token: "t1".into(),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RemoteError::Conflict));
        assert_eq!(remote.content(&key()).as_deref(), Some("A\nremote\n"));
        assert_eq!(remote.save_count(), 1);
    }

    #[tokio::test]
    async fn test_injected_failure_is_consumed_once() {
        let remote = InMemoryRemote::new();
        remote.insert(&key(), "A", "t1");
        remote.fail_next_save(RemoteError::Transport("offline".into()));

        let request = SaveRequest::Full { content: "B".into() };
        assert!(remote.save(&key(), &request).await.is_err());
        assert!(remote.save(&key(), &request).await.is_ok());
    }

    #[test]
    fn test_title_from_content() {
        assert_eq!(title_from_content("intro\n#  Heading \n"), Some("Heading".to_string()));
        assert_eq!(title_from_content("## Not a title\n"), None);
        assert_eq!(title_from_content("# \n"), None);
    }
}
