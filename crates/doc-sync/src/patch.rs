//! Patch codec: textual deltas between a base and a target text.
//!
//! A patch is a sequence of edit operations serialised as JSON:
//!
//! ```json
//! {"ops":[{"keep":12},{"delete":"old line\n"},{"insert":"new line\n"}]}
//! ```
//!
//! Deletions carry the removed text, so a patch can be verified against its
//! base before it is applied and can be inverted to go back.

use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("Malformed patch: {0}")]
    Malformed(String),

    #[error("Patch does not match base at byte {offset}")]
    BaseMismatch { offset: usize },

    #[error("Patch ends at byte {consumed} but base has {len} bytes")]
    Incomplete { consumed: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, PatchError>;

/// A single edit operation, applied left to right over the base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PatchOp {
    /// Copy this many bytes of the base unchanged
    Keep(usize),
    /// Skip this text in the base
    Delete(String),
    /// Emit this text
    Insert(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Patch {
    pub ops: Vec<PatchOp>,
}

impl Patch {
    /// True when applying the patch reproduces the base.
    pub fn is_identity(&self) -> bool {
        self.ops.iter().all(|op| matches!(op, PatchOp::Keep(_)))
    }

    /// The patch that undoes this one.
    pub fn inverted(&self) -> Patch {
        let ops = self
            .ops
            .iter()
            .map(|op| match op {
                PatchOp::Keep(n) => PatchOp::Keep(*n),
                PatchOp::Delete(text) => PatchOp::Insert(text.clone()),
                PatchOp::Insert(text) => PatchOp::Delete(text.clone()),
            })
            .collect();
        Patch { ops }
    }

    /// Apply to `base`, checking every kept and deleted span against it.
    pub fn apply(&self, base: &str) -> Result<String> {
        let mut out = String::with_capacity(base.len());
        let mut cursor: usize = 0;

        for op in &self.ops {
            match op {
                PatchOp::Keep(n) => {
                    let span = cursor
                        .checked_add(*n)
                        .and_then(|end| base.get(cursor..end))
                        .ok_or(PatchError::BaseMismatch { offset: cursor })?;
                    out.push_str(span);
                    cursor += n;
                }
                PatchOp::Delete(text) => {
                    if !base[cursor..].starts_with(text.as_str()) {
                        return Err(PatchError::BaseMismatch { offset: cursor });
                    }
                    cursor += text.len();
                }
                PatchOp::Insert(text) => out.push_str(text),
            }
        }

        if cursor != base.len() {
            return Err(PatchError::Incomplete {
                consumed: cursor,
                len: base.len(),
            });
        }

        Ok(out)
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| PatchError::Malformed(e.to_string()))
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        serde_json::from_str(encoded).map_err(|e| PatchError::Malformed(e.to_string()))
    }

    /// Append an op, merging it into the previous op of the same kind.
    fn push(&mut self, op: PatchOp) {
        match (self.ops.last_mut(), op) {
            (Some(PatchOp::Keep(prev)), PatchOp::Keep(n)) => *prev += n,
            (Some(PatchOp::Delete(prev)), PatchOp::Delete(text)) => prev.push_str(&text),
            (Some(PatchOp::Insert(prev)), PatchOp::Insert(text)) => prev.push_str(&text),
            (_, op) => self.ops.push(op),
        }
    }
}

/// Produces and applies patches in an encoded string form.
pub trait PatchCodec: Send + Sync {
    /// Encode the delta that turns `base` into `target`.
    fn make_patch(&self, base: &str, target: &str) -> Result<String>;

    /// Rebuild the target from `base` and an encoded patch.
    fn apply_patch(&self, base: &str, patch: &str) -> Result<String>;
}

/// Line-granular diff codec built on `similar`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineDiffCodec;

impl LineDiffCodec {
    pub fn new() -> Self {
        Self
    }

    /// Compute the patch without encoding it.
    pub fn diff(&self, base: &str, target: &str) -> Patch {
        let mut patch = Patch::default();
        for change in TextDiff::from_lines(base, target).iter_all_changes() {
            let value = change.value();
            let op = match change.tag() {
                ChangeTag::Equal => PatchOp::Keep(value.len()),
                ChangeTag::Delete => PatchOp::Delete(value.to_string()),
                ChangeTag::Insert => PatchOp::Insert(value.to_string()),
            };
            patch.push(op);
        }
        patch
    }
}

impl PatchCodec for LineDiffCodec {
    fn make_patch(&self, base: &str, target: &str) -> Result<String> {
        self.diff(base, target).encode()
    }

    fn apply_patch(&self, base: &str, patch: &str) -> Result<String> {
        Patch::decode(patch)?.apply(base)
    }
}
