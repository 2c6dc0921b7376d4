//! Choosing between a full-document save and a patch.

use crate::document::VersionedDocument;
use crate::patch::{PatchCodec, PatchError};
use crate::remote::SaveRequest;

/// Outcome of mode selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveDecision {
    /// Writing is not permitted; nothing should be sent.
    Refused,
    /// Send this request.
    Send(SaveRequest),
}

/// Pick the request for saving `current`.
///
/// Patch mode needs a version token, a base and a codec. Anything less, such
/// as a first save or the save after a conflict, goes out as a full document.
pub fn select_mode(
    document: &VersionedDocument,
    current: &str,
    can_write: bool,
    codec: Option<&dyn PatchCodec>,
) -> Result<SaveDecision, PatchError> {
    if !can_write {
        return Ok(SaveDecision::Refused);
    }

    let request = match (document.version_token(), document.base_content(), codec) {
        (Some(token), Some(base), Some(codec)) => SaveRequest::Patch {
            patch: codec.make_patch(base, current)?,
            base_version_token: token.to_string(),
        },
        _ => full(current),
    };

    Ok(SaveDecision::Send(request))
}

/// Like `select_mode`, but a codec failure degrades to a full save.
pub fn select_mode_or_full(
    document: &VersionedDocument,
    current: &str,
    can_write: bool,
    codec: Option<&dyn PatchCodec>,
) -> SaveDecision {
    match select_mode(document, current, can_write, codec) {
        Ok(decision) => decision,
        Err(e) => {
            tracing::warn!(path = %document.key(), "Patch encoding failed, saving full document: {}", e);
            SaveDecision::Send(full(current))
        }
    }
}

fn full(current: &str) -> SaveRequest {
    SaveRequest::Full {
        content: current.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentKey, DocumentKind, LoadedDocument};
    use crate::patch::LineDiffCodec;
    use crate::remote::SaveMode;

    fn loaded_doc(base: &str, token: &str) -> VersionedDocument {
        let loaded = LoadedDocument {
            content: base.into(),
            version_token: token.into(),
            title: None,
        };
        VersionedDocument::from_loaded(
            DocumentKey::project("p", "d"),
            DocumentKind::Standard,
            &loaded,
            base.into(),
        )
    }

    struct FailingCodec;

    impl PatchCodec for FailingCodec {
        fn make_patch(&self, _: &str, _: &str) -> crate::patch::Result<String> {
            Err(PatchError::Malformed("boom".into()))
        }

        fn apply_patch(&self, _: &str, _: &str) -> crate::patch::Result<String> {
            Err(PatchError::Malformed("boom".into()))
        }
    }

    #[test]
    fn test_refused_without_permission() {
        let doc = loaded_doc("A", "t1");
        let decision = select_mode(&doc, "AB", false, Some(&LineDiffCodec)).unwrap();
        assert_eq!(decision, SaveDecision::Refused);
    }

    #[test]
    fn test_patch_mode_with_token_base_and_codec() {
        let doc = loaded_doc("A", "t1");
        let SaveDecision::Send(request) = select_mode(&doc, "AB", true, Some(&LineDiffCodec)).unwrap()
        else {
            panic!("expected a request");
        };

        match request {
            SaveRequest::Patch {
                patch,
                base_version_token,
            } => {
                assert_eq!(base_version_token, "t1");
                assert_eq!(LineDiffCodec.apply_patch("A", &patch).unwrap(), "AB");
            }
            other => panic!("expected patch, got {:?}", other),
        }
    }

    #[test]
    fn test_full_mode_for_every_incomplete_pairing() {
        let mut conflicted = loaded_doc("A", "t1");
        conflicted.mark_conflict();
        let unloaded =
            VersionedDocument::unloaded(DocumentKey::project("p", "d"), DocumentKind::Standard);
        let with_token = loaded_doc("A", "t1");

        let cases: [(&VersionedDocument, Option<&dyn PatchCodec>); 3] = [
            (&conflicted, Some(&LineDiffCodec)),
            (&unloaded, Some(&LineDiffCodec)),
            (&with_token, None),
        ];

        for (doc, codec) in cases {
            let decision = select_mode(doc, "AB", true, codec).unwrap();
            assert_eq!(
                decision,
                SaveDecision::Send(SaveRequest::Full {
                    content: "AB".into()
                })
            );
        }
    }

    #[test]
    fn test_codec_failure_degrades_to_full() {
        let doc = loaded_doc("A", "t1");
        assert!(select_mode(&doc, "AB", true, Some(&FailingCodec)).is_err());

        let decision = select_mode_or_full(&doc, "AB", true, Some(&FailingCodec));
        match decision {
            SaveDecision::Send(request) => assert_eq!(request.mode(), SaveMode::Full),
            SaveDecision::Refused => panic!("should not refuse"),
        }
    }
}
