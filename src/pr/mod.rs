pub mod components;
pub mod processor;
pub mod types;

#[cfg(test)]
pub(crate) mod fixtures;

pub use types::{ChangeKind, ChangedPath, PullRequestSummary};

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use tracing::{debug, info_span, instrument, Instrument};

use crate::azure::{AzureError, RepositoryClient};

/// List the author's completed pull requests since `since` and attach the
/// changed files of each one.
///
/// All pull requests are fetched concurrently, and so are the commits within
/// one pull request. The first failing fetch fails the whole retrieval; the
/// remaining in-flight fetches are dropped and nothing partial is returned.
#[instrument(skip(client))]
pub async fn retrieve_pull_requests(
    client: &dyn RepositoryClient,
    author_id: &str,
    since: DateTime<Utc>,
) -> Result<Vec<PullRequestSummary>, AzureError> {
    let mut pull_requests = client.list_completed_pull_requests(author_id, since).await?;
    debug!(count = pull_requests.len(), "listed completed pull requests");

    populate_changed_paths(client, &mut pull_requests).await?;
    Ok(pull_requests)
}

/// Fill `changed_paths` of every pull request. Assignment happens only once
/// every fetch has succeeded.
pub async fn populate_changed_paths(
    client: &dyn RepositoryClient,
    pull_requests: &mut [PullRequestSummary],
) -> Result<(), AzureError> {
    let ids: Vec<u64> = pull_requests.iter().map(|pr| pr.id).collect();
    let fetches = ids.iter().map(|&id| {
        changed_paths_for(client, id).instrument(info_span!("pull_request", id))
    });
    let all_paths = try_join_all(fetches).await?;

    for (pull_request, paths) in pull_requests.iter_mut().zip(all_paths) {
        pull_request.changed_paths = paths;
    }
    Ok(())
}

async fn changed_paths_for(
    client: &dyn RepositoryClient,
    pull_request_id: u64,
) -> Result<Vec<ChangedPath>, AzureError> {
    let commit_ids = client.list_commit_ids(pull_request_id).await?;
    let per_commit = try_join_all(commit_ids.iter().map(|id| client.list_changed_paths(id))).await?;

    let paths = merge_changed_paths(per_commit.into_iter().flatten());
    debug!(commits = commit_ids.len(), paths = paths.len(), "collected changed paths");
    Ok(paths)
}

/// Keep the first occurrence of each path, then sort by path.
///
/// When a path appears in several commits with different change kinds, the
/// kind of the first commit in listing order wins.
pub fn merge_changed_paths(changes: impl IntoIterator<Item = ChangedPath>) -> Vec<ChangedPath> {
    let mut seen = HashSet::new();
    let mut unique: Vec<ChangedPath> = changes
        .into_iter()
        .filter(|change| seen.insert(change.path.clone()))
        .collect();
    unique.sort_by(|a, b| a.path.cmp(&b.path));
    unique
}
