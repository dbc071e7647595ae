//! Persistence seam for review records.

use std::collections::HashMap;
use std::future::Future;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::{GitContextEngineError, GitContextEngineResult};
use crate::review::types::ReviewOutcome;

/// Create/read/update of review records keyed by review id.
pub trait ReviewStore: Send + Sync {
    fn create(
        &self,
        outcome: &ReviewOutcome,
    ) -> impl Future<Output = GitContextEngineResult<()>> + Send;

    fn get(&self, id: Uuid) -> impl Future<Output = GitContextEngineResult<Option<ReviewOutcome>>> + Send;

    fn update(
        &self,
        outcome: &ReviewOutcome,
    ) -> impl Future<Output = GitContextEngineResult<()>> + Send;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryReviewStore {
    records: RwLock<HashMap<Uuid, ReviewOutcome>>,
}

impl InMemoryReviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl ReviewStore for InMemoryReviewStore {
    async fn create(&self, outcome: &ReviewOutcome) -> GitContextEngineResult<()> {
        let mut records = self.records.write().await;
        if records.contains_key(&outcome.id) {
            return Err(GitContextEngineError::Validation(format!(
                "review {} already exists",
                outcome.id
            )));
        }
        records.insert(outcome.id, outcome.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> GitContextEngineResult<Option<ReviewOutcome>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn update(&self, outcome: &ReviewOutcome) -> GitContextEngineResult<()> {
        let mut records = self.records.write().await;
        match records.get_mut(&outcome.id) {
            Some(slot) => {
                *slot = outcome.clone();
                Ok(())
            }
            None => Err(GitContextEngineError::Validation(format!(
                "review {} does not exist",
                outcome.id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::types::ReviewStatus;

    #[tokio::test]
    async fn create_then_update() {
        let store = InMemoryReviewStore::new();
        let mut outcome = ReviewOutcome::new("group/app", 3, "carol");
        store.create(&outcome).await.unwrap();
        assert!(store.create(&outcome).await.is_err());

        outcome.transition(ReviewStatus::InProgress);
        store.update(&outcome).await.unwrap();

        let stored = store.get(outcome.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReviewStatus::InProgress);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn update_unknown_fails() {
        let store = InMemoryReviewStore::new();
        let outcome = ReviewOutcome::new("group/app", 3, "carol");
        assert!(store.update(&outcome).await.is_err());
        assert!(store.get(outcome.id).await.unwrap().is_none());
    }
}
