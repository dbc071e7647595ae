//! Placement of one comment: build the fallback ladder, then walk it.
//!
//! Ladder, most precise first:
//! 1. positional comment on the new side (needs anchors);
//! 2. positional comment with the old side filled in as well;
//! 3. plain note with the location embedded in the body.

use tracing::{debug, error, warn};

use crate::errors::ReviewError;
use crate::git_providers::VcsProvider;
use crate::git_providers::types::{
    ChangeRequestId, DiffAnchorContext, FileChange, LineKind, PositionPayload,
};
use crate::parser::diff_position;
use crate::review::render::{inline_body, note_body};
use crate::review::types::ReviewComment;

/// One placement attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rung {
    Positional {
        payload: PositionPayload,
        body: String,
    },
    PlainNote {
        body: String,
    },
}

/// Which rung succeeded, or why none did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Positioned,
    PositionedBothSides,
    PlainNote,
    Failed(String),
}

/// Ordered placement attempts for `comment`.
///
/// Without anchors only the plain note is offered. `file` is the diff of the
/// commented file; it supplies the old line for context lines and the
/// provider diff position.
pub fn ladder(
    comment: &ReviewComment,
    anchors: &DiffAnchorContext,
    file: Option<&FileChange>,
) -> Vec<Rung> {
    let mut rungs = Vec::with_capacity(3);

    if anchors.is_present() {
        let body = inline_body(comment);
        let new_side = PositionPayload::new_side(&comment.file_path, comment.line_number);

        let target = file.and_then(|f| f.line_at_new(comment.line_number));
        let old_line = match target {
            Some(l) if l.kind == LineKind::Unchanged => l.old_line.unwrap_or(comment.line_number),
            _ => comment.line_number,
        };
        let old_path = file
            .and_then(|f| f.old_path.clone())
            .unwrap_or_else(|| comment.file_path.clone());
        let both_sides = PositionPayload {
            old_path: Some(old_path),
            old_line: Some(old_line),
            diff_position: file
                .and_then(|f| f.raw_diff.as_deref())
                .and_then(|d| diff_position(d, comment.line_number)),
            ..new_side.clone()
        };

        rungs.push(Rung::Positional {
            payload: new_side,
            body: body.clone(),
        });
        rungs.push(Rung::Positional {
            payload: both_sides,
            body,
        });
    }

    rungs.push(Rung::PlainNote {
        body: note_body(comment),
    });
    rungs
}

/// Submits rungs in order until one succeeds.
///
/// Failures before the last rung are logged and fall through. If every rung
/// fails the comment is reported as [`SubmissionOutcome::Failed`].
pub async fn submit<V: VcsProvider>(
    vcs: &V,
    id: &ChangeRequestId,
    anchors: &DiffAnchorContext,
    comment: &ReviewComment,
    rungs: &[Rung],
) -> SubmissionOutcome {
    let mut last_error = String::from("no placement strategy available");

    for rung in rungs {
        let result = match rung {
            Rung::Positional { payload, body } => vcs
                .submit_positioned_comment(id, anchors, payload, body)
                .await
                .map(|_| {
                    if payload.is_both_sides() {
                        SubmissionOutcome::PositionedBothSides
                    } else {
                        SubmissionOutcome::Positioned
                    }
                }),
            Rung::PlainNote { body } => vcs
                .submit_plain_note(id, body)
                .await
                .map(|_| SubmissionOutcome::PlainNote),
        };

        match result {
            Ok(outcome) => {
                debug!(
                    path = %comment.file_path,
                    line = comment.line_number,
                    ?outcome,
                    "comment placed"
                );
                return outcome;
            }
            Err(err) => {
                warn!(
                    path = %comment.file_path,
                    line = comment.line_number,
                    error = %err,
                    "placement attempt rejected"
                );
                last_error = err.to_string();
            }
        }
    }

    let err = ReviewError::PositionResolution {
        file: comment.file_path.clone(),
        line: comment.line_number,
        reason: last_error,
    };
    error!(error = %err, "comment dropped");
    SubmissionOutcome::Failed(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::types::{Category, Severity};

    fn comment(line: u32) -> ReviewComment {
        ReviewComment {
            file_path: "src/lib.rs".into(),
            line_number: line,
            end_line_number: None,
            category: Category::Bug,
            severity: Severity::Minor,
            text: "check".into(),
        }
    }

    fn anchors() -> DiffAnchorContext {
        DiffAnchorContext {
            base_sha: Some("base".into()),
            start_sha: None,
            head_sha: Some("head".into()),
        }
    }

    fn file() -> FileChange {
        FileChange::from_diff(
            "src/lib.rs".into(),
            Some("src/old_lib.rs".into()),
            Some("@@ -8,2 +10,3 @@\n keep\n+new\n keep2".into()),
        )
    }

    #[test]
    fn full_ladder_with_anchors() {
        let f = file();
        let rungs = ladder(&comment(11), &anchors(), Some(&f));
        assert_eq!(rungs.len(), 3);

        let Rung::Positional { payload, .. } = &rungs[0] else {
            panic!("expected positional rung");
        };
        assert!(!payload.is_both_sides());

        let Rung::Positional { payload, .. } = &rungs[1] else {
            panic!("expected positional rung");
        };
        assert_eq!(payload.old_path.as_deref(), Some("src/old_lib.rs"));
        assert_eq!(payload.old_line, Some(11));
        assert_eq!(payload.diff_position, Some(2));

        assert!(matches!(&rungs[2], Rung::PlainNote { body } if body.contains("`src/lib.rs` (line 11)")));
    }

    #[test]
    fn context_line_uses_real_old_line() {
        let f = file();
        let rungs = ladder(&comment(12), &anchors(), Some(&f));
        let Rung::Positional { payload, .. } = &rungs[1] else {
            panic!("expected positional rung");
        };
        assert_eq!(payload.old_line, Some(9));
    }

    #[test]
    fn without_anchors_only_a_note() {
        let rungs = ladder(&comment(11), &DiffAnchorContext::default(), None);
        assert_eq!(rungs.len(), 1);
        assert!(matches!(rungs[0], Rung::PlainNote { .. }));
    }
}
