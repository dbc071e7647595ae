//! GitLab provider (REST v4) for MR diffs, file contents and comments.
//!
//! Endpoints used:
//!   * GET    /projects/:id/merge_requests/:iid
//!   * GET    /projects/:id/merge_requests/:iid/diffs
//!   * GET    /projects/:id/merge_requests/:iid/raw_diffs
//!   * GET    /projects/:id/repository/files/:path/raw?ref=:ref
//!   * GET    /projects/:id/merge_requests/:iid/notes
//!   * DELETE /projects/:id/merge_requests/:iid/notes/:note_id
//!   * POST   /projects/:id/merge_requests/:iid/discussions
//!   * POST   /projects/:id/merge_requests/:iid/notes

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{GitContextEngineProviderError, GitContextEngineResult};
use crate::git_providers::types::*;
use crate::parser::split_raw_diff;

const PER_PAGE: usize = 100;
const MAX_PAGES: usize = 50;

/// GitLab HTTP client wrapper.
#[derive(Debug, Clone)]
pub struct GitLabClient {
    http: Client,
    base_api: String, // e.g. "https://gitlab.com/api/v4"
    token: String,    // "PRIVATE-TOKEN"
}

impl GitLabClient {
    /// Constructs a GitLab client with a shared HTTP instance and auth token.
    pub fn new(http: Client, base_api: String, token: String) -> Self {
        debug!("Creating GitLabClient with base_api={}", base_api);
        Self {
            http,
            base_api,
            token,
        }
    }

    fn mr_url(&self, id: &ChangeRequestId) -> String {
        format!(
            "{}/projects/{}/merge_requests/{}",
            self.base_api,
            urlencoding::encode(&id.project),
            id.iid
        )
    }

    /// Fetches diff anchors, per-file diffs and current file contents.
    pub async fn fetch_changed_files(
        &self,
        id: &ChangeRequestId,
    ) -> GitContextEngineResult<ChangedFiles> {
        let anchors = self.get_anchors(id).await?;
        let raw_files: Vec<GitLabMrDiffFile> =
            self.get_paged(&format!("{}/diffs", self.mr_url(id))).await?;

        let mut files: Vec<FileChange> = raw_files.iter().map(to_file_change).collect();

        let missing = raw_files
            .iter()
            .zip(files.iter())
            .any(|(raw, f)| raw.is_collapsed() && f.raw_diff.is_none());
        let mut is_truncated = false;
        if missing {
            warn!("GitLab returned collapsed diffs; falling back to raw_diffs");
            if let Err(err) = self.fill_from_raw_diffs(id, &mut files).await {
                warn!(error = %err, "raw_diffs fallback failed");
            }
            is_truncated = raw_files
                .iter()
                .zip(files.iter())
                .any(|(raw, f)| raw.is_collapsed() && f.raw_diff.is_none());
        }

        if let Some(head) = anchors.head_sha.as_deref() {
            for file in files.iter_mut().filter(|f| !f.is_deleted && !f.is_binary) {
                match self.get_file_raw(id, &file.path, head).await {
                    Ok(Some(bytes)) => file.content = String::from_utf8_lossy(&bytes).into_owned(),
                    Ok(None) => debug!(path = %file.path, "file missing at head"),
                    Err(err) => warn!(path = %file.path, error = %err, "failed to fetch file content"),
                }
            }
        }

        debug!(
            project = %id.project,
            iid = id.iid,
            files = files.len(),
            anchored = anchors.is_present(),
            "GitLab changes fetched"
        );

        Ok(ChangedFiles {
            files,
            anchors,
            is_truncated,
        })
    }

    /// Reads `diff_refs`; fresh MRs may not have them yet.
    async fn get_anchors(&self, id: &ChangeRequestId) -> GitContextEngineResult<DiffAnchorContext> {
        let url = self.mr_url(id);
        debug!("GitLab get_meta: {}", url);

        let resp: GitLabMr = self
            .http
            .get(url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let refs = resp.diff_refs.unwrap_or_default();
        Ok(DiffAnchorContext {
            base_sha: refs.base_sha,
            start_sha: refs.start_sha,
            head_sha: refs.head_sha.or(resp.sha),
        })
    }

    /// Replaces missing per-file diffs with slices of the MR raw diff.
    async fn fill_from_raw_diffs(
        &self,
        id: &ChangeRequestId,
        files: &mut [FileChange],
    ) -> GitContextEngineResult<()> {
        let url = format!("{}/raw_diffs", self.mr_url(id));
        debug!("GitLab raw_diffs: {}", url);

        let raw = self
            .http
            .get(url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        for part in split_raw_diff(&raw) {
            let path = part.new_path.as_deref().or(part.old_path.as_deref());
            let Some(target) = files
                .iter_mut()
                .find(|f| f.raw_diff.is_none() && Some(f.path.as_str()) == path)
            else {
                continue;
            };
            let rebuilt = FileChange::from_diff(target.path.clone(), target.old_path.clone(), Some(part.diff));
            target.is_binary = rebuilt.is_binary;
            target.lines = rebuilt.lines;
            target.raw_diff = rebuilt.raw_diff;
        }
        Ok(())
    }

    /// Fetches raw file bytes at a specific ref in the repository.
    ///
    /// Returns `Ok(Some(bytes))` on success, `Ok(None)` if the file does not
    /// exist at the given ref (404).
    pub async fn get_file_raw(
        &self,
        id: &ChangeRequestId,
        repo_relative_path: &str,
        git_ref: &str,
    ) -> GitContextEngineResult<Option<Vec<u8>>> {
        let url = format!(
            "{}/projects/{}/repository/files/{}/raw",
            self.base_api,
            urlencoding::encode(&id.project),
            urlencoding::encode(repo_relative_path),
        );
        debug!("GitLab get_file_raw: {}", url);

        let resp = self
            .http
            .get(url)
            .query(&[("ref", git_ref)])
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?;

        if resp.status().as_u16() == 404 {
            return Ok(None);
        }

        let bytes = resp.error_for_status()?.bytes().await?;
        Ok(Some(bytes.to_vec()))
    }

    /// Lists MR notes, skipping system notes. DiffNotes are reported as inline.
    pub async fn fetch_existing_comments(
        &self,
        id: &ChangeRequestId,
    ) -> GitContextEngineResult<Vec<ExistingComment>> {
        let notes: Vec<GitLabNote> = self.get_paged(&format!("{}/notes", self.mr_url(id))).await?;

        Ok(notes
            .into_iter()
            .filter(|n| !n.system)
            .map(|n| ExistingComment {
                id: n.id,
                kind: match n.note_type.as_deref() {
                    Some("DiffNote") => CommentKind::Inline,
                    _ => CommentKind::Note,
                },
                body: n.body,
            })
            .collect())
    }

    pub async fn delete_comment(
        &self,
        id: &ChangeRequestId,
        comment: &ExistingComment,
    ) -> GitContextEngineResult<()> {
        let url = format!("{}/notes/{}", self.mr_url(id), comment.id);
        debug!("GitLab delete note: {}", url);

        self.http
            .delete(url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Starts a positioned discussion on the MR diff.
    ///
    /// `start_sha` falls back to `base_sha`. The old side is sent only when
    /// the payload carries it.
    pub async fn submit_positioned_comment(
        &self,
        id: &ChangeRequestId,
        anchors: &DiffAnchorContext,
        position: &PositionPayload,
        body: &str,
    ) -> GitContextEngineResult<()> {
        let (Some(base_sha), Some(head_sha), Some(start_sha)) = (
            anchors.base_sha.as_deref(),
            anchors.head_sha.as_deref(),
            anchors.start_or_base(),
        ) else {
            return Err(GitContextEngineProviderError::Unsupported("diff anchors are missing").into());
        };

        let payload = GitLabDiscussionCreate {
            body,
            position: GitLabPosition {
                base_sha,
                start_sha,
                head_sha,
                position_type: "text",
                new_path: Some(position.new_path.as_str()),
                new_line: Some(position.new_line),
                old_path: position.old_path.as_deref(),
                old_line: position.old_line,
            },
        };

        debug!(
            path = %position.new_path,
            line = position.new_line,
            old_line = ?position.old_line,
            "Posting GitLab inline discussion"
        );

        self.http
            .post(format!("{}/discussions", self.mr_url(id)))
            .header("PRIVATE-TOKEN", &self.token)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Posts a plain MR note.
    pub async fn submit_note(&self, id: &ChangeRequestId, body: &str) -> GitContextEngineResult<()> {
        self.http
            .post(format!("{}/notes", self.mr_url(id)))
            .header("PRIVATE-TOKEN", &self.token)
            .json(&GitLabNoteCreate { body })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// GETs every page of a list endpoint.
    async fn get_paged<T: DeserializeOwned>(&self, url: &str) -> GitContextEngineResult<Vec<T>> {
        let mut out = Vec::new();
        for page in 1..=MAX_PAGES {
            let batch: Vec<T> = self
                .http
                .get(url)
                .query(&[("per_page", PER_PAGE), ("page", page)])
                .header("PRIVATE-TOKEN", &self.token)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            let last = batch.len() < PER_PAGE;
            out.extend(batch);
            if last {
                break;
            }
        }
        Ok(out)
    }
}

fn to_file_change(f: &GitLabMrDiffFile) -> FileChange {
    let diff = f.diff.clone().filter(|d| !d.is_empty());
    let path = if f.deleted_file {
        f.old_path.clone()
    } else {
        f.new_path.clone()
    };

    let mut change = FileChange::from_diff(path, Some(f.old_path.clone()), diff);
    change.is_new = f.new_file;
    change.is_deleted = f.deleted_file;
    change.is_renamed = f.renamed_file;
    // an empty diff that was not collapsed is a binary change
    if change.raw_diff.is_none() && !f.is_collapsed() {
        change.is_binary = true;
    }
    change
}

/// GitLab MR response (subset).
#[derive(Debug, Deserialize)]
struct GitLabMr {
    #[serde(default)]
    sha: Option<String>,
    #[serde(default)]
    diff_refs: Option<GitLabDiffRefs>,
}

#[derive(Debug, Default, Deserialize)]
struct GitLabDiffRefs {
    base_sha: Option<String>,
    head_sha: Option<String>,
    start_sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitLabMrDiffFile {
    old_path: String,
    new_path: String,
    new_file: bool,
    renamed_file: bool,
    deleted_file: bool,
    #[serde(default)]
    too_large: Option<bool>,
    #[serde(default)]
    collapsed: Option<bool>,
    #[serde(default)]
    diff: Option<String>, // unified diff; empty for binary/too large
}

impl GitLabMrDiffFile {
    fn is_collapsed(&self) -> bool {
        self.too_large.unwrap_or(false) || self.collapsed.unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
struct GitLabNote {
    id: u64,
    body: String,
    #[serde(default)]
    system: bool,
    #[serde(rename = "type", default)]
    note_type: Option<String>,
}

#[derive(Debug, Serialize)]
struct GitLabPosition<'a> {
    base_sha: &'a str,
    start_sha: &'a str,
    head_sha: &'a str,
    position_type: &'static str, // always "text" here
    #[serde(skip_serializing_if = "Option::is_none")]
    new_path: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    old_path: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    old_line: Option<u32>,
}

#[derive(Debug, Serialize)]
struct GitLabDiscussionCreate<'a> {
    body: &'a str,
    position: GitLabPosition<'a>,
}

#[derive(Debug, Serialize)]
struct GitLabNoteCreate<'a> {
    body: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_file_maps_flags_and_lines() {
        let raw: GitLabMrDiffFile = serde_json::from_str(
            r#"{"old_path":"lib/a.dart","new_path":"lib/b.dart","new_file":false,
                "renamed_file":true,"deleted_file":false,
                "diff":"@@ -1,1 +1,2 @@\n line\n+added"}"#,
        )
        .unwrap();
        let change = to_file_change(&raw);
        assert_eq!(change.path, "lib/b.dart");
        assert_eq!(change.language, "Dart");
        assert!(change.is_renamed);
        assert_eq!(change.line_at_new(2).map(|l| l.kind), Some(LineKind::Added));
    }

    #[test]
    fn empty_diff_is_binary_unless_collapsed() {
        let binary: GitLabMrDiffFile = serde_json::from_str(
            r#"{"old_path":"a.png","new_path":"a.png","new_file":true,
                "renamed_file":false,"deleted_file":false,"diff":""}"#,
        )
        .unwrap();
        assert!(to_file_change(&binary).is_binary);

        let big: GitLabMrDiffFile = serde_json::from_str(
            r#"{"old_path":"gen.rs","new_path":"gen.rs","new_file":false,
                "renamed_file":false,"deleted_file":false,"too_large":true,"diff":""}"#,
        )
        .unwrap();
        assert!(!to_file_change(&big).is_binary);
    }

    #[test]
    fn position_payload_omits_old_side_when_absent() {
        let pos = GitLabPosition {
            base_sha: "b",
            start_sha: "b",
            head_sha: "h",
            position_type: "text",
            new_path: Some("src/x.rs"),
            new_line: Some(4),
            old_path: None,
            old_line: None,
        };
        let json = serde_json::to_value(&pos).unwrap();
        assert_eq!(json["position_type"], "text");
        assert!(json.get("old_line").is_none());
    }

    #[test]
    fn diff_notes_are_inline() {
        let notes: Vec<GitLabNote> = serde_json::from_str(
            r#"[{"id":1,"body":"a","system":false,"type":"DiffNote"},
                {"id":2,"body":"b","system":true,"type":null},
                {"id":3,"body":"c","system":false}]"#,
        )
        .unwrap();
        assert_eq!(notes[0].note_type.as_deref(), Some("DiffNote"));
        assert!(notes[1].system);
        assert!(notes[2].note_type.is_none());
    }
}
