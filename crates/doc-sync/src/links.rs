//! Load-time resolution of page reference labels.
//!
//! Before loaded content becomes a surface's diff base, every `[[page:...]]`
//! reference gets its label replaced by the referenced document's current
//! title. Titles are fetched once per distinct target, concurrently. A failed
//! lookup keeps that reference's old label and does not fail the load.

use crate::document::DocumentKey;
use crate::remote::DocumentRemote;
use futures::future::join_all;
use page_links::{extract_targets, rewrite_labels};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// A reference whose label now mirrors the target's title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedLink {
    pub target: String,
    pub label: String,
    /// Render non-editable so the label cannot drift from the title.
    pub locked: bool,
}

/// Result of resolving the references in one document.
#[derive(Debug, Clone, Default)]
pub struct LinkResolution {
    /// Content with labels rewritten
    pub content: String,
    pub resolved: Vec<ResolvedLink>,
    /// Targets whose title could not be fetched
    pub failed: Vec<String>,
}

impl LinkResolution {
    /// Whether any label text changed.
    pub fn changed(&self, original: &str) -> bool {
        self.content != original
    }
}

/// Resolve all page reference labels in `content`.
///
/// References point at documents in the same container as `owner`.
pub async fn resolve_link_labels(
    remote: &dyn DocumentRemote,
    owner: &DocumentKey,
    content: &str,
) -> LinkResolution {
    let targets = extract_targets(content);
    if targets.is_empty() {
        return LinkResolution {
            content: content.to_string(),
            ..Default::default()
        };
    }

    debug!(path = %owner, count = targets.len(), "Resolving page reference titles");

    let lookups = targets.iter().map(|target| {
        let key = owner.sibling(target.clone());
        async move { (key.document_id.clone(), remote.fetch_title(&key).await) }
    });

    let mut titles = HashMap::new();
    let mut failed = Vec::new();
    for (target, result) in join_all(lookups).await {
        match result {
            Ok(Some(title)) => {
                titles.insert(target, title);
            }
            Ok(None) => {
                debug!(target = %target, "Referenced document has no title");
                failed.push(target);
            }
            Err(e) => {
                warn!(target = %target, "Failed to resolve page reference: {}", e);
                failed.push(target);
            }
        }
    }

    let rewritten = rewrite_labels(content, |link| titles.get(&link.target).cloned());

    let resolved = targets
        .iter()
        .filter_map(|target| {
            titles.get(target).map(|title| ResolvedLink {
                target: target.clone(),
                label: page_links::sanitize_label(title),
                locked: true,
            })
        })
        .collect();

    LinkResolution {
        content: rewritten,
        resolved,
        failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRemote;

    #[tokio::test]
    async fn test_no_references_is_passthrough() {
        let remote = InMemoryRemote::new();
        let owner = DocumentKey::project("p", "main");

        let resolution = resolve_link_labels(&remote, &owner, "plain text").await;

        assert_eq!(resolution.content, "plain text");
        assert!(resolution.resolved.is_empty());
        assert_eq!(remote.load_count(), 0);
    }

    #[tokio::test]
    async fn test_labels_follow_titles_and_targets_are_fetched_once() {
        let remote = InMemoryRemote::new();
        remote.insert(&DocumentKey::project("p", "a"), "# Alpha\n", "ta");
        remote.insert(&DocumentKey::project("p", "b"), "# Beta\n", "tb");
        let owner = DocumentKey::project("p", "main");

        let content = "[[page:a|old]] [[page:b]] [[page:a|old]]";
        let resolution = resolve_link_labels(&remote, &owner, content).await;

        assert_eq!(
            resolution.content,
            "[[page:a|Alpha]] [[page:b|Beta]] [[page:a|Alpha]]"
        );
        assert!(resolution.changed(content));
        assert_eq!(resolution.resolved.len(), 2);
        assert!(resolution.resolved.iter().all(|link| link.locked));
        assert_eq!(remote.load_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_lookup_keeps_old_label() {
        let remote = InMemoryRemote::new();
        remote.insert(&DocumentKey::project("p", "a"), "# Alpha\n", "ta");
        let owner = DocumentKey::project("p", "main");

        let content = "[[page:a|x]] [[page:missing|Keep me]]";
        let resolution = resolve_link_labels(&remote, &owner, content).await;

        assert_eq!(resolution.content, "[[page:a|Alpha]] [[page:missing|Keep me]]");
        assert_eq!(resolution.failed, vec!["missing".to_string()]);
    }
}
