#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use git_context_engine::errors::{GitContextEngineProviderError, GitContextEngineResult, ReviewError};
use git_context_engine::git_providers::types::{
    ChangeRequestId, ChangedFiles, CommentKind, DiffAnchorContext, ExistingComment, FileChange,
    PositionPayload,
};
use git_context_engine::{ModelProvider, VcsProvider};

pub const DIFF: &str = "@@ -1,3 +1,4 @@\n fn main() {\n-    let x = 1;\n+    let x = compute();\n+    println!(\"{x}\");\n }";

pub fn anchors() -> DiffAnchorContext {
    DiffAnchorContext {
        base_sha: Some("base".into()),
        start_sha: Some("start".into()),
        head_sha: Some("head".into()),
    }
}

pub fn main_rs() -> FileChange {
    let mut f = FileChange::from_diff("src/main.rs".into(), None, Some(DIFF.into()));
    f.content = "fn main() {\n    let x = compute();\n    println!(\"{x}\");\n}\n".into();
    f
}

/// What a test VCS saw, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Fetch,
    ListComments,
    Delete(u64),
    Positioned { both_sides: bool, line: u32 },
    Note,
    Summary,
}

#[derive(Debug, Default)]
struct State {
    comments: Vec<ExistingComment>,
    next_id: u64,
    calls: Vec<Call>,
}

/// In-memory VCS with switchable failure modes.
#[derive(Debug, Default)]
pub struct FakeVcs {
    pub changed: ChangedFiles,
    pub reject_positional: bool,
    pub fail_fetch: bool,
    /// Plain notes whose body contains this text are rejected.
    pub fail_note: Option<&'static str>,
    /// Deleting the comment with this id is rejected.
    pub fail_delete: Option<u64>,
    state: Mutex<State>,
}

impl FakeVcs {
    pub fn new(changed: ChangedFiles) -> Self {
        Self {
            changed,
            state: Mutex::new(State {
                next_id: 100,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn with_comment(self, kind: CommentKind, body: &str) -> Self {
        {
            let mut s = self.state.lock().unwrap();
            let id = s.next_id;
            s.next_id += 1;
            s.comments.push(ExistingComment {
                id,
                kind,
                body: body.to_string(),
            });
        }
        self
    }

    pub fn comments(&self) -> Vec<ExistingComment> {
        self.state.lock().unwrap().comments.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn add(&self, kind: CommentKind, body: &str) {
        let mut s = self.state.lock().unwrap();
        let id = s.next_id;
        s.next_id += 1;
        s.comments.push(ExistingComment {
            id,
            kind,
            body: body.to_string(),
        });
    }
}

impl VcsProvider for FakeVcs {
    async fn fetch_changed_files(&self, _id: &ChangeRequestId) -> GitContextEngineResult<ChangedFiles> {
        self.record(Call::Fetch);
        if self.fail_fetch {
            return Err(GitContextEngineProviderError::Server(502).into());
        }
        Ok(self.changed.clone())
    }

    async fn fetch_existing_comments(
        &self,
        _id: &ChangeRequestId,
    ) -> GitContextEngineResult<Vec<ExistingComment>> {
        self.record(Call::ListComments);
        Ok(self.comments())
    }

    async fn delete_comment(
        &self,
        _id: &ChangeRequestId,
        comment: &ExistingComment,
    ) -> GitContextEngineResult<()> {
        self.record(Call::Delete(comment.id));
        if self.fail_delete == Some(comment.id) {
            return Err(GitContextEngineProviderError::Forbidden.into());
        }
        self.state.lock().unwrap().comments.retain(|c| c.id != comment.id);
        Ok(())
    }

    async fn submit_positioned_comment(
        &self,
        _id: &ChangeRequestId,
        _anchors: &DiffAnchorContext,
        position: &PositionPayload,
        body: &str,
    ) -> GitContextEngineResult<()> {
        self.record(Call::Positioned {
            both_sides: position.is_both_sides(),
            line: position.new_line,
        });
        if self.reject_positional {
            return Err(GitContextEngineProviderError::HttpStatus(400).into());
        }
        self.add(CommentKind::Inline, body);
        Ok(())
    }

    async fn submit_plain_note(&self, _id: &ChangeRequestId, body: &str) -> GitContextEngineResult<()> {
        self.record(Call::Note);
        if self.fail_note.is_some_and(|needle| body.contains(needle)) {
            return Err(GitContextEngineProviderError::Server(500).into());
        }
        self.add(CommentKind::Note, body);
        Ok(())
    }

    async fn submit_summary(&self, _id: &ChangeRequestId, body: &str) -> GitContextEngineResult<()> {
        self.record(Call::Summary);
        self.add(CommentKind::Note, body);
        Ok(())
    }
}

/// Model that replays queued answers.
#[derive(Debug, Default)]
pub struct FakeModel {
    answers: Mutex<VecDeque<Result<String, ReviewError>>>,
}

impl FakeModel {
    pub fn answering(answers: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().map(|a| Ok(a.to_string())).collect()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            answers: Mutex::new(VecDeque::from([Err(ReviewError::ModelCall(reason.to_string()))])),
        }
    }
}

impl ModelProvider for FakeModel {
    async fn complete(&self, _prompt: &str) -> Result<String, ReviewError> {
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ReviewError::ModelCall("no answer queued".into())))
    }
}
