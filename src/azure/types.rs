use serde::{Deserialize, Serialize};

/// Identifies a single Azure DevOps Git repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryCoordinates {
    pub organization: String,
    /// Project id or project name
    pub project: String,
    pub repository_id: String,
}

impl RepositoryCoordinates {
    pub fn new(
        organization: impl Into<String>,
        project: impl Into<String>,
        repository_id: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            project: project.into(),
            repository_id: repository_id.into(),
        }
    }
}

// Wire payloads. Only the fields this tool reads are declared; serde ignores
// the rest of the upstream schema.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GitPullRequest {
    pub pull_request_id: u64,
    pub title: String,
    pub created_by: IdentityRef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IdentityRef {
    pub id: String,
    #[serde(default)]
    pub unique_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GitCommitRef {
    pub commit_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GitChange {
    #[serde(default)]
    pub change_type: String,
    pub item: GitItem,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GitItem {
    #[serde(default)]
    pub git_object_type: Option<String>,
    #[serde(default)]
    pub path: String,
}

impl GitItem {
    pub fn is_blob(&self) -> bool {
        self.git_object_type.as_deref() == Some("blob")
    }
}
