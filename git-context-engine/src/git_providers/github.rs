//! GitHub provider (REST v3) for PR diffs, file contents and comments.
//!
//! Endpoints used:
//!   * GET    /repos/{owner}/{repo}/pulls/{number}
//!   * GET    /repos/{owner}/{repo}/pulls/{number}/files
//!   * GET    /repos/{owner}/{repo}/contents/{path}?ref={ref}
//!   * GET    /repos/{owner}/{repo}/pulls/{number}/comments
//!   * GET    /repos/{owner}/{repo}/issues/{number}/comments
//!   * DELETE /repos/{owner}/{repo}/pulls/comments/{id}
//!   * DELETE /repos/{owner}/{repo}/issues/comments/{id}
//!   * POST   /repos/{owner}/{repo}/pulls/{number}/comments
//!   * POST   /repos/{owner}/{repo}/issues/{number}/comments

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::{GitContextEngineError, GitContextEngineProviderError, GitContextEngineResult};
use crate::git_providers::types::*;
use crate::parser::split_raw_diff;

const PER_PAGE: usize = 100;
const MAX_PAGES: usize = 30;
const ACCEPT_JSON: &str = "application/vnd.github+json";

/// GitHub HTTP client wrapper.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    base_api: String, // "https://api.github.com"
    auth: String,     // "Bearer <token>"
}

impl GitHubClient {
    /// Constructs a GitHub client with a shared HTTP instance and auth token.
    ///
    /// A bare token is sent as `Bearer <token>`; a value that already carries
    /// a scheme (`token …`, `Bearer …`) is sent as is.
    pub fn new(http: Client, base_api: String, token: String) -> Self {
        debug!("Creating GitHubClient with base_api={}", base_api);
        let auth = if token.starts_with("Bearer ") || token.starts_with("token ") {
            token
        } else {
            format!("Bearer {token}")
        };
        Self {
            http,
            base_api,
            auth,
        }
    }

    fn repo_url(&self, id: &ChangeRequestId) -> GitContextEngineResult<String> {
        let (owner, repo) = split_owner_repo(&id.project)?;
        Ok(format!("{}/repos/{}/{}", self.base_api, owner, repo))
    }

    /// Fetches PR SHAs, per-file patches and current file contents.
    pub async fn fetch_changed_files(
        &self,
        id: &ChangeRequestId,
    ) -> GitContextEngineResult<ChangedFiles> {
        let repo_url = self.repo_url(id)?;
        let pr_url = format!("{}/pulls/{}", repo_url, id.iid);
        debug!("GitHub get_meta: {}", pr_url);

        let pr: GitHubPr = self
            .http
            .get(&pr_url)
            .header("Authorization", &self.auth)
            .header("Accept", ACCEPT_JSON)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let anchors = DiffAnchorContext {
            base_sha: Some(pr.base.sha),
            start_sha: None,
            head_sha: Some(pr.head.sha.clone()),
        };

        let raw_files: Vec<GitHubPrFile> = self.get_paged(&format!("{}/files", pr_url)).await?;
        let mut files: Vec<FileChange> = raw_files.iter().map(to_file_change).collect();

        // GitHub omits `patch` for very large diffs (and for binaries).
        let missing = files
            .iter()
            .any(|f| f.raw_diff.is_none() && !f.is_deleted && !f.is_binary);
        let mut is_truncated = false;
        if missing {
            if let Err(err) = self.fill_from_pr_diff(&pr_url, &mut files).await {
                warn!(error = %err, "PR diff fallback failed");
            }
            is_truncated = raw_files
                .iter()
                .zip(files.iter())
                .any(|(raw, f)| raw.changes > 0 && f.raw_diff.is_none() && !f.is_deleted);
        }

        for file in files.iter_mut().filter(|f| !f.is_deleted && !f.is_binary) {
            match self.get_file_raw(id, &file.path, &pr.head.sha).await {
                Ok(Some(bytes)) => file.content = String::from_utf8_lossy(&bytes).into_owned(),
                Ok(None) => debug!(path = %file.path, "file missing at head"),
                Err(err) => warn!(path = %file.path, error = %err, "failed to fetch file content"),
            }
        }

        debug!(
            project = %id.project,
            iid = id.iid,
            files = files.len(),
            "GitHub changes fetched"
        );

        Ok(ChangedFiles {
            files,
            anchors,
            is_truncated,
        })
    }

    /// Fills missing patches from the whole-PR unified diff.
    async fn fill_from_pr_diff(
        &self,
        pr_url: &str,
        files: &mut [FileChange],
    ) -> GitContextEngineResult<()> {
        let raw = self
            .http
            .get(pr_url)
            .header("Authorization", &self.auth)
            .header("Accept", "application/vnd.github.v3.diff")
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
            let rebuilt =
                FileChange::from_diff(target.path.clone(), target.old_path.clone(), Some(part.diff));
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
        let url = format!("{}/contents/{}", self.repo_url(id)?, repo_relative_path);
        debug!("GitHub get_file_raw: url={}, ref={}", url, git_ref);

        let resp = self
            .http
            .get(url)
            .query(&[("ref", git_ref)])
            .header("Authorization", &self.auth)
            .header("Accept", "application/vnd.github.v3.raw")
            .send()
            .await?;

        if resp.status().as_u16() == 404 {
            return Ok(None);
        }

        let bytes = resp.error_for_status()?.bytes().await?;
        Ok(Some(bytes.to_vec()))
    }

    /// Review comments (inline) followed by issue comments (notes).
    pub async fn fetch_existing_comments(
        &self,
        id: &ChangeRequestId,
    ) -> GitContextEngineResult<Vec<ExistingComment>> {
        let repo_url = self.repo_url(id)?;

        let inline: Vec<GitHubComment> = self
            .get_paged(&format!("{}/pulls/{}/comments", repo_url, id.iid))
            .await?;
        let notes: Vec<GitHubComment> = self
            .get_paged(&format!("{}/issues/{}/comments", repo_url, id.iid))
            .await?;

        let as_existing = |kind: CommentKind| {
            move |c: GitHubComment| ExistingComment {
                id: c.id,
                kind,
                body: c.body.unwrap_or_default(),
            }
        };

        Ok(inline
            .into_iter()
            .map(as_existing(CommentKind::Inline))
            .chain(notes.into_iter().map(as_existing(CommentKind::Note)))
            .collect())
    }

    pub async fn delete_comment(
        &self,
        id: &ChangeRequestId,
        comment: &ExistingComment,
    ) -> GitContextEngineResult<()> {
        let scope = match comment.kind {
            CommentKind::Inline => "pulls",
            CommentKind::Note => "issues",
        };
        let url = format!("{}/{}/comments/{}", self.repo_url(id)?, scope, comment.id);
        debug!("GitHub delete comment: {}", url);

        self.http
            .delete(url)
            .header("Authorization", &self.auth)
            .header("Accept", ACCEPT_JSON)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Posts a review comment on the head commit.
    ///
    /// New-side payloads use `line` + `side=RIGHT`. Payloads that carry the
    /// old side fall back to the legacy diff `position`.
    pub async fn submit_positioned_comment(
        &self,
        id: &ChangeRequestId,
        anchors: &DiffAnchorContext,
        position: &PositionPayload,
        body: &str,
    ) -> GitContextEngineResult<()> {
        let commit_id = anchors
            .head_sha
            .as_deref()
            .ok_or(GitContextEngineProviderError::Unsupported("head sha is missing"))?;

        let payload = if position.is_both_sides() {
            let diff_position = position.diff_position.ok_or(
                GitContextEngineProviderError::Unsupported("line is not addressable by diff position"),
            )?;
            GitHubReviewCommentCreate {
                body,
                commit_id,
                path: &position.new_path,
                line: None,
                side: None,
                position: Some(diff_position),
            }
        } else {
            GitHubReviewCommentCreate {
                body,
                commit_id,
                path: &position.new_path,
                line: Some(position.new_line),
                side: Some("RIGHT"),
                position: None,
            }
        };

        debug!(
            path = %position.new_path,
            line = position.new_line,
            diff_position = ?payload.position,
            "Posting GitHub review comment"
        );

        self.http
            .post(format!("{}/pulls/{}/comments", self.repo_url(id)?, id.iid))
            .header("Authorization", &self.auth)
            .header("Accept", ACCEPT_JSON)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Posts a conversation-level PR comment.
    pub async fn submit_issue_comment(
        &self,
        id: &ChangeRequestId,
        body: &str,
    ) -> GitContextEngineResult<()> {
        self.http
            .post(format!("{}/issues/{}/comments", self.repo_url(id)?, id.iid))
            .header("Authorization", &self.auth)
            .header("Accept", ACCEPT_JSON)
            .json(&GitHubIssueCommentCreate { body })
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
                .header("Authorization", &self.auth)
                .header("Accept", ACCEPT_JSON)
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

fn to_file_change(f: &GitHubPrFile) -> FileChange {
    let old_path = match f.status.as_str() {
        "added" => None,
        "renamed" => f.previous_filename.clone(),
        _ => Some(f.filename.clone()),
    };

    let mut change = FileChange::from_diff(f.filename.clone(), old_path, f.patch.clone());
    change.is_new = f.status == "added";
    change.is_deleted = f.status == "removed";
    change.is_renamed = f.status == "renamed";
    // no patch and no line stats: binary
    if f.patch.is_none() && f.changes == 0 && !change.is_renamed {
        change.is_binary = true;
    }
    change
}

/// Splits "owner/repo" into components or returns a validation error.
fn split_owner_repo(project: &str) -> GitContextEngineResult<(String, String)> {
    let mut parts = project.split('/');
    let owner = parts.next().unwrap_or("").trim();
    let repo = parts.next().unwrap_or("").trim();

    if owner.is_empty() || repo.is_empty() || parts.next().is_some() {
        return Err(GitContextEngineError::Validation(format!(
            "invalid GitHub project id '{}', expected 'owner/repo'",
            project
        )));
    }

    Ok((owner.to_string(), repo.to_string()))
}

/// GitHub PR response (subset).
#[derive(Debug, Deserialize)]
struct GitHubPr {
    base: GitHubRef,
    head: GitHubRef,
}

#[derive(Debug, Deserialize)]
struct GitHubRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GitHubPrFile {
    filename: String,
    #[serde(default)]
    previous_filename: Option<String>,
    status: String,
    #[serde(default)]
    changes: u64,
    #[serde(default)]
    patch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubComment {
    id: u64,
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Serialize)]
struct GitHubReviewCommentCreate<'a> {
    body: &'a str,
    commit_id: &'a str,
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    side: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<u32>,
}

#[derive(Debug, Serialize)]
struct GitHubIssueCommentCreate<'a> {
    body: &'a str,
}
