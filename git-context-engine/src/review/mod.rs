//! Review orchestration: fetch, prompt, normalize, clear, post.
//!
//! [`ReviewRunner::run_review`] always returns a [`ReviewOutcome`]. Fatal
//! failures (diff fetch, model call, unparseable output) end in `FAILED`
//! with the reason in the summary; per-comment failures do not.

pub mod config;
pub mod model;
pub mod normalize;
pub mod position;
pub mod prompt;
pub mod render;
pub mod store;
pub mod types;

use tracing::{debug, error, info, warn};

use crate::errors::ReviewError;
use crate::git_providers::VcsProvider;
use crate::git_providers::types::{ChangeRequestId, ChangedFiles};

use self::config::ReviewConfig;
use self::model::ModelProvider;
use self::normalize::normalize;
use self::position::{SubmissionOutcome, ladder, submit};
use self::store::{InMemoryReviewStore, ReviewStore};
use self::types::{ReviewOutcome, ReviewStats, ReviewStatus};

/// Summary used when a change request has nothing the model can review.
pub const NOTHING_TO_REVIEW: &str = "No reviewable text changes were found.";

/// Runs reviews against one VCS provider, one model and an optional store.
///
/// Holds no per-review state: anchors and outcomes live on the stack of
/// each `run_review` call, so one runner can serve concurrent reviews.
#[derive(Debug)]
pub struct ReviewRunner<V, M, S = InMemoryReviewStore> {
    vcs: V,
    model: M,
    store: Option<S>,
    cfg: ReviewConfig,
}

impl<V, M> ReviewRunner<V, M, InMemoryReviewStore> {
    /// Runner without persistence.
    pub fn new(vcs: V, model: M, cfg: ReviewConfig) -> Self {
        Self {
            vcs,
            model,
            store: None,
            cfg,
        }
    }
}

impl<V, M, S> ReviewRunner<V, M, S> {
    /// Attaches a store; its failures are logged, never fatal.
    pub fn with_store<S2>(self, store: S2) -> ReviewRunner<V, M, S2> {
        ReviewRunner {
            vcs: self.vcs,
            model: self.model,
            store: Some(store),
            cfg: self.cfg,
        }
    }

    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    pub fn store(&self) -> Option<&S> {
        self.store.as_ref()
    }

    pub fn config(&self) -> &ReviewConfig {
        &self.cfg
    }
}

impl<V, M, S> ReviewRunner<V, M, S>
where
    V: VcsProvider,
    M: ModelProvider,
    S: ReviewStore,
{
    /// Reviews one change request end to end.
    pub async fn run_review(
        &self,
        project: &str,
        request_id: u64,
        triggering_user: &str,
    ) -> ReviewOutcome {
        let id = ChangeRequestId {
            project: project.to_string(),
            iid: request_id,
        };
        let mut outcome = ReviewOutcome::new(project, request_id, triggering_user);
        info!(
            review_id = %outcome.id,
            project = %id.project,
            iid = id.iid,
            user = %triggering_user,
            dry_run = self.cfg.dry_run,
            "run_review started"
        );

        if let Some(store) = &self.store {
            if let Err(err) = store.create(&outcome).await {
                warn!(review_id = %outcome.id, error = %err, "failed to persist new review");
            }
        }

        outcome.transition(ReviewStatus::InProgress);
        self.persist(&outcome).await;

        match self.execute(&id, &mut outcome).await {
            Ok(()) => {
                outcome.transition(ReviewStatus::Completed);
                info!(
                    review_id = %outcome.id,
                    comments = outcome.comments.len(),
                    stats = %render::stats_line(&outcome.stats),
                    "run_review completed"
                );
            }
            Err(err) => {
                error!(review_id = %outcome.id, error = %err, "run_review failed");
                outcome.summary = Some(format!("Review failed: {err}"));
                outcome.transition(ReviewStatus::Failed);
            }
        }

        self.persist(&outcome).await;
        outcome
    }

    async fn execute(
        &self,
        id: &ChangeRequestId,
        outcome: &mut ReviewOutcome,
    ) -> Result<(), ReviewError> {
        let changed: ChangedFiles = self
            .vcs
            .fetch_changed_files(id)
            .await
            .map_err(|e| ReviewError::DiffFetch(e.to_string()))?;
        debug!(
            files = changed.files.len(),
            anchored = changed.anchors.is_present(),
            truncated = changed.is_truncated,
            "changes fetched"
        );
        if changed.is_truncated {
            warn!("provider truncated some diffs; those files are reviewed without lines");
        }

        if !changed.files.iter().any(|f| f.has_hunks()) {
            info!("nothing to review");
            outcome.summary = Some(NOTHING_TO_REVIEW.to_string());
            return Ok(());
        }

        let prompt = prompt::build_prompt(&changed.files, self.cfg.max_file_chars);
        debug!(prompt_len = prompt.len(), "prompt built");

        let raw = self.model.complete(&prompt).await?;
        debug!(response_len = raw.len(), "model answered");

        let normalized = normalize(&raw, &changed.files, &self.cfg.normalize_options())?;
        info!(
            outcome = ?normalized.outcome,
            kept = normalized.comments.len(),
            dropped = normalized.dropped,
            "model output normalized"
        );
        outcome.comments = normalized.comments;
        outcome.summary = Some(normalized.summary);

        if self.cfg.dry_run {
            info!("dry run: skipping cleanup and posting");
            return Ok(());
        }

        outcome.stats.deleted_previous = self.clear_previous(id).await;
        self.post_comments(id, &changed, outcome).await;

        let summary_body = render::summary_body(
            outcome.summary.as_deref().unwrap_or_default(),
            &outcome.comments,
            &outcome.triggered_by,
        );
        match self.vcs.submit_summary(id, &summary_body).await {
            Ok(()) => outcome.stats.summary_posted = true,
            Err(err) => warn!(error = %err, "failed to post review summary"),
        }

        Ok(())
    }

    /// Deletes earlier machine-authored comments; returns how many went away.
    async fn clear_previous(&self, id: &ChangeRequestId) -> usize {
        let existing = match self.vcs.fetch_existing_comments(id).await {
            Ok(c) => c,
            Err(err) => {
                warn!(error = %err, "could not list existing comments; skipping cleanup");
                return 0;
            }
        };

        let mut deleted = 0;
        for comment in existing.iter().filter(|c| render::is_machine_authored(&c.body)) {
            match self.vcs.delete_comment(id, comment).await {
                Ok(()) => deleted += 1,
                Err(err) => {
                    let err = ReviewError::CommentDeletion {
                        id: comment.id,
                        reason: err.to_string(),
                    };
                    warn!(error = %err, "skipping comment");
                }
            }
        }
        debug!(deleted, total = existing.len(), "previous review comments cleared");
        deleted
    }

    /// Places every comment in normalized order.
    async fn post_comments(
        &self,
        id: &ChangeRequestId,
        changed: &ChangedFiles,
        outcome: &mut ReviewOutcome,
    ) {
        let mut stats = ReviewStats::default();

        for comment in &outcome.comments {
            let file = changed.files.iter().find(|f| f.path == comment.file_path);
            let rungs = ladder(comment, &changed.anchors, file);

            match submit(&self.vcs, id, &changed.anchors, comment, &rungs).await {
                SubmissionOutcome::Positioned | SubmissionOutcome::PositionedBothSides => {
                    stats.posted_positional += 1
                }
                SubmissionOutcome::PlainNote => stats.posted_as_note += 1,
                SubmissionOutcome::Failed(_) => stats.failed += 1,
            }
        }

        outcome.stats.posted_positional = stats.posted_positional;
        outcome.stats.posted_as_note = stats.posted_as_note;
        outcome.stats.failed = stats.failed;
    }

    async fn persist(&self, outcome: &ReviewOutcome) {
        if let Some(store) = &self.store {
            if let Err(err) = store.update(outcome).await {
                warn!(review_id = %outcome.id, error = %err, "failed to persist review");
            }
        }
    }
}
