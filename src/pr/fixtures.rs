//! In-memory `RepositoryClient` used by retriever and command tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Barrier;

use super::types::{ChangeKind, ChangedPath, PullRequestSummary};
use crate::azure::{AzureError, RepositoryClient};

#[derive(Default)]
pub struct FakeRepository {
    pub pull_requests: Vec<(u64, String)>,
    pub commits: HashMap<u64, Vec<String>>,
    pub changes: HashMap<String, Vec<ChangedPath>>,
    pub failing_commit: Option<String>,
    /// Every change listing waits here until all parties have arrived.
    pub barrier: Option<Arc<Barrier>>,
}

impl FakeRepository {
    pub fn with_pull_request(mut self, id: u64, title: &str, commits: &[&str]) -> Self {
        self.pull_requests.push((id, title.to_string()));
        self.commits
            .insert(id, commits.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn with_commit(mut self, commit_id: &str, changes: &[(&str, ChangeKind)]) -> Self {
        self.changes.insert(
            commit_id.to_string(),
            changes
                .iter()
                .map(|(path, kind)| ChangedPath::new(*path, *kind))
                .collect(),
        );
        self
    }

    fn failure(url: String) -> AzureError {
        AzureError::RequestFailed {
            url,
            status: Some(500),
            body: Some("boom".to_string()),
            reason: "HTTP 500".to_string(),
            source: None,
        }
    }
}

#[async_trait]
impl RepositoryClient for FakeRepository {
    async fn resolve_author_id(&self, email: &str) -> Result<String, AzureError> {
        Err(AzureError::NotFound {
            email: email.to_string(),
        })
    }

    async fn list_completed_pull_requests(
        &self,
        author_id: &str,
        _since: DateTime<Utc>,
    ) -> Result<Vec<PullRequestSummary>, AzureError> {
        Ok(self
            .pull_requests
            .iter()
            .map(|(id, title)| PullRequestSummary {
                id: *id,
                title: title.clone(),
                created_by: author_id.to_string(),
                changed_paths: Vec::new(),
            })
            .collect())
    }

    async fn list_commit_ids(&self, pull_request_id: u64) -> Result<Vec<String>, AzureError> {
        self.commits
            .get(&pull_request_id)
            .cloned()
            .ok_or_else(|| Self::failure(format!("/pullRequests/{pull_request_id}/commits")))
    }

    async fn list_changed_paths(&self, commit_id: &str) -> Result<Vec<ChangedPath>, AzureError> {
        // Yield so that sibling fetches interleave with this one.
        tokio::task::yield_now().await;
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        if self.failing_commit.as_deref() == Some(commit_id) {
            return Err(Self::failure(format!("/commits/{commit_id}/changes")));
        }
        Ok(self.changes.get(commit_id).cloned().unwrap_or_default())
    }
}
