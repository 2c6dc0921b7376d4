//! Parser for internal page references
//!
//! Pages reference each other inside canonical text as:
//! - Basic references: `[[page:abc123]]`
//! - Labels: `[[page:abc123|Display Text]]`
//! - Headings: `[[page:abc123#Section|Display Text]]`
//!
//! Anything else between `[[` and `]]` (for example `[[Note]]`) is ordinary
//! text and is left alone.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Range;

/// Prefix that marks a `[[...]]` block as a page reference.
pub const PAGE_PREFIX: &str = "page:";

/// A parsed page reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    /// Id of the referenced document: "abc123"
    pub target: String,
    /// Heading fragment if present: "Section"
    pub heading: Option<String>,
    /// Display label if present: "Display Text"
    pub label: Option<String>,
    /// Byte range of the whole reference (including the brackets)
    pub span: Range<usize>,
}

impl PageLink {
    /// Returns the label if present, otherwise the target id
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.target)
    }

    /// Render this reference back to text with the given label.
    pub fn render_with_label(&self, label: &str) -> String {
        let label = sanitize_label(label);
        let mut out = String::with_capacity(self.target.len() + label.len() + 12);
        out.push_str("[[");
        out.push_str(PAGE_PREFIX);
        out.push_str(&self.target);
        if let Some(heading) = &self.heading {
            out.push('#');
            out.push_str(heading);
        }
        if !label.is_empty() {
            out.push('|');
            out.push_str(&label);
        }
        out.push_str("]]");
        out
    }
}

/// Parse all page references from content, in order of appearance.
pub fn parse_page_links(content: &str) -> Vec<PageLink> {
    let bytes = content.as_bytes();
    let len = bytes.len();
    let mut links = Vec::new();
    let mut i = 0;

    // The delimiters are all ASCII, so byte offsets always land on char boundaries.
    while i + 1 < len {
        if bytes[i] == b'[' && bytes[i + 1] == b'[' {
            if let Some(close) = find_close(bytes, i + 2) {
                if let Some(link) = parse_link_content(&content[i + 2..close], i..close + 2) {
                    links.push(link);
                    i = close + 2;
                    continue;
                }
            }
        }
        i += 1;
    }

    links
}

/// Find the `]]` that closes a reference whose content starts at `start`.
/// Nested `[[` aborts the match; references cannot contain other references.
fn find_close(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start;
    while i + 1 < bytes.len() {
        match (bytes[i], bytes[i + 1]) {
            (b']', b']') => return Some(i),
            (b'[', b'[') => return None,
            (b'\n', _) => return None,
            _ => i += 1,
        }
    }
    None
}

/// Parse the content inside `[[ ]]`. Returns None for non-page blocks.
fn parse_link_content(content: &str, span: Range<usize>) -> Option<PageLink> {
    let rest = content.strip_prefix(PAGE_PREFIX)?;

    let (target_part, label) = match rest.find('|') {
        Some(pipe) => (&rest[..pipe], Some(rest[pipe + 1..].to_string())),
        None => (rest, None),
    };

    let (target, heading) = match target_part.find('#') {
        Some(hash) => (
            &target_part[..hash],
            Some(target_part[hash + 1..].to_string()),
        ),
        None => (target_part, None),
    };

    let target = target.trim();
    if target.is_empty() {
        return None;
    }

    Some(PageLink {
        target: target.to_string(),
        heading,
        label: label.filter(|l| !l.is_empty()),
        span,
    })
}

/// Strip characters that would break the reference syntax.
pub fn sanitize_label(label: &str) -> String {
    label
        .replace(['|', '[', ']', '\n'], " ")
        .trim()
        .to_string()
}

/// Extract all unique reference targets, in order of first appearance.
pub fn extract_targets(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    parse_page_links(content)
        .into_iter()
        .filter(|link| seen.insert(link.target.clone()))
        .map(|link| link.target)
        .collect()
}

/// Rewrite reference labels.
///
/// `label_for` returns the label a reference should carry, or None to leave
/// it untouched. References whose label already matches are copied verbatim,
/// so content without changes round-trips byte for byte.
pub fn rewrite_labels<F>(content: &str, mut label_for: F) -> String
where
    F: FnMut(&PageLink) -> Option<String>,
{
    let mut out = String::with_capacity(content.len());
    let mut cursor = 0;

    for link in parse_page_links(content) {
        let Some(label) = label_for(&link) else {
            continue;
        };
        let rendered = link.render_with_label(&label);
        if rendered == content[link.span.clone()] {
            continue;
        }
        out.push_str(&content[cursor..link.span.start]);
        out.push_str(&rendered);
        cursor = link.span.end;
    }

    out.push_str(&content[cursor..]);
    out
}
