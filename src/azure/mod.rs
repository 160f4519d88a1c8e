pub mod types;

pub use types::RepositoryCoordinates;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::pr::types::{ChangeKind, ChangedPath, PullRequestSummary};
use types::{GitChange, GitCommitRef, GitPullRequest};

/// Every request is pinned to this REST API version.
pub const API_VERSION: &str = "7.1";
pub const DEFAULT_BASE_URL: &str = "https://dev.azure.com";

const MAX_BODY_CHARS: usize = 1000;

#[derive(Debug, Error)]
pub enum AzureError {
    #[error("Azure DevOps client is not configured: missing {0}")]
    Unconfigured(&'static str),

    #[error("Invalid Azure DevOps base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("GET {url} failed: {reason}")]
    RequestFailed {
        url: String,
        status: Option<u16>,
        body: Option<String>,
        reason: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Creator with email '{email}' was not found")]
    NotFound { email: String },
}

/// Read access to pull requests, commits and commit changes of one
/// repository. Implementations must be shareable across concurrent fetches.
#[async_trait]
pub trait RepositoryClient: Send + Sync {
    /// Find the stable identifier of the creator whose unique name equals
    /// `email` among all completed pull requests. Callers cache the result.
    async fn resolve_author_id(&self, email: &str) -> Result<String, AzureError>;

    /// Completed pull requests created by `author_id` on or after `since`,
    /// each with empty `changed_paths`.
    async fn list_completed_pull_requests(
        &self,
        author_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<PullRequestSummary>, AzureError>;

    /// Commit ids of a pull request in API order.
    async fn list_commit_ids(&self, pull_request_id: u64) -> Result<Vec<String>, AzureError>;

    /// File-level changes of a commit. Non-blob entries are dropped.
    async fn list_changed_paths(&self, commit_id: &str) -> Result<Vec<ChangedPath>, AzureError>;
}

/// `RepositoryClient` backed by the Azure DevOps Git REST API.
#[derive(Debug, Clone)]
pub struct AzureDevOpsClient {
    http: reqwest::Client,
    base_url: Url,
    coordinates: Option<RepositoryCoordinates>,
    access_token: Option<String>,
}

impl AzureDevOpsClient {
    pub fn new(
        base_url: &str,
        coordinates: Option<RepositoryCoordinates>,
        access_token: Option<String>,
    ) -> Result<Self, AzureError> {
        let base_url =
            Url::parse(base_url).map_err(|_| AzureError::InvalidBaseUrl(base_url.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(AzureError::InvalidBaseUrl(base_url.to_string()));
        }

        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            coordinates,
            access_token,
        })
    }

    /// Build `<base>/<org>/<project>/_apis/git/repositories/<repo>/<segments>`
    /// with the given query pairs and the pinned API version.
    fn endpoint_url(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, AzureError> {
        let coordinates = self
            .coordinates
            .as_ref()
            .ok_or(AzureError::Unconfigured("repository coordinates"))?;

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AzureError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend([
                coordinates.organization.as_str(),
                coordinates.project.as_str(),
                "_apis",
                "git",
                "repositories",
                coordinates.repository_id.as_str(),
            ])
            .extend(segments);

        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("api-version", API_VERSION);
        }

        Ok(url)
    }

    /// GET an endpoint and return the entities of its `value` (or `changes`)
    /// array. No retries: any failure is returned as `RequestFailed`.
    async fn get_entities<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, AzureError> {
        let url = self.endpoint_url(segments, query)?;
        let token = self
            .access_token
            .as_deref()
            .ok_or(AzureError::Unconfigured("access token"))?;

        debug!(url = %url, "sending GET request");
        let response = self
            .http
            .get(url.clone())
            .basic_auth("", Some(token))
            .send()
            .await
            .map_err(|e| AzureError::RequestFailed {
                url: url.to_string(),
                status: None,
                body: None,
                reason: format!("request could not be sent: {e}"),
                source: Some(e),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| AzureError::RequestFailed {
            url: url.to_string(),
            status: Some(status.as_u16()),
            body: None,
            reason: format!("response body could not be read: {e}"),
            source: Some(e),
        })?;

        if !status.is_success() {
            let body = truncate(&body);
            return Err(AzureError::RequestFailed {
                url: url.to_string(),
                reason: format!("HTTP {status}, body: {body}"),
                status: Some(status.as_u16()),
                body: Some(body),
                source: None,
            });
        }
        debug!(status = status.as_u16(), body_bytes = body.len(), "received response");

        parse_entities(url.as_str(), &body)
    }
}

#[async_trait]
impl RepositoryClient for AzureDevOpsClient {
    #[instrument(skip(self))]
    async fn resolve_author_id(&self, email: &str) -> Result<String, AzureError> {
        let pull_requests: Vec<GitPullRequest> = self
            .get_entities(&["pullrequests"], &[("searchCriteria.status", "completed")])
            .await?;
        debug!(scanned = pull_requests.len(), "scanning completed pull requests for creator");

        pull_requests
            .into_iter()
            .find(|pr| pr.created_by.unique_name == email)
            .map(|pr| pr.created_by.id)
            .ok_or_else(|| AzureError::NotFound {
                email: email.to_string(),
            })
    }

    #[instrument(skip(self))]
    async fn list_completed_pull_requests(
        &self,
        author_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<PullRequestSummary>, AzureError> {
        let min_time = since.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
        let pull_requests: Vec<GitPullRequest> = self
            .get_entities(
                &["pullrequests"],
                &[
                    ("searchCriteria.creatorId", author_id),
                    ("searchCriteria.minTime", min_time.as_str()),
                    ("searchCriteria.status", "completed"),
                ],
            )
            .await?;

        Ok(pull_requests
            .into_iter()
            .map(|pr| PullRequestSummary {
                id: pr.pull_request_id,
                title: pr.title,
                created_by: pr.created_by.id,
                changed_paths: Vec::new(),
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn list_commit_ids(&self, pull_request_id: u64) -> Result<Vec<String>, AzureError> {
        let id = pull_request_id.to_string();
        let commits: Vec<GitCommitRef> = self
            .get_entities(&["pullRequests", id.as_str(), "commits"], &[])
            .await?;
        Ok(commits.into_iter().map(|c| c.commit_id).collect())
    }

    #[instrument(skip(self))]
    async fn list_changed_paths(&self, commit_id: &str) -> Result<Vec<ChangedPath>, AzureError> {
        let changes: Vec<GitChange> = self
            .get_entities(&["commits", commit_id, "changes"], &[])
            .await?;
        Ok(changes
            .into_iter()
            .filter(|change| change.item.is_blob())
            .map(|change| {
                ChangedPath::new(change.item.path, ChangeKind::from_code(&change.change_type))
            })
            .collect())
    }
}

/// Extract the entity array from a response body. The array lives under
/// `value` for list endpoints and under `changes` for commit changes.
fn parse_entities<T: DeserializeOwned>(url: &str, body: &str) -> Result<Vec<T>, AzureError> {
    let malformed = |reason: String| AzureError::RequestFailed {
        url: url.to_string(),
        status: None,
        body: Some(truncate(body)),
        reason,
        source: None,
    };

    let data: Value = serde_json::from_str(body)
        .map_err(|e| malformed(format!("response body is not valid JSON: {e}")))?;

    let mut object = match data {
        Value::Object(object) => object,
        other => {
            return Err(malformed(format!(
                "response data must be an object, received {}",
                json_type(&other)
            )))
        }
    };

    let entities = match object.remove("value") {
        Some(value) if !value.is_null() => value,
        _ => object.remove("changes").ok_or_else(|| {
            malformed("response data must contain either \"value\" or \"changes\"".to_string())
        })?,
    };

    if !entities.is_array() {
        return Err(malformed(format!(
            "expected an array but received {}",
            json_type(&entities)
        )));
    }

    serde_json::from_value(entities)
        .map_err(|e| malformed(format!("unexpected entity shape: {e}")))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_BODY_CHARS) {
        Some((index, _)) => format!("{}...", &body[..index]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mockito::Matcher;

    const REPO_PATH: &str = "/contoso/sales/_apis/git/repositories/repo-1";
    // base64(":secret-pat")
    const AUTH_HEADER: &str = "Basic OnNlY3JldC1wYXQ=";

    fn client_for(server: &mockito::Server) -> AzureDevOpsClient {
        AzureDevOpsClient::new(
            &server.url(),
            Some(RepositoryCoordinates::new("contoso", "sales", "repo-1")),
            Some("secret-pat".to_string()),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_url_shape() {
        let client = AzureDevOpsClient::new(
            DEFAULT_BASE_URL,
            Some(RepositoryCoordinates::new("contoso", "Sales Team", "repo-1")),
            Some("pat".to_string()),
        )
        .unwrap();
        let url = client
            .endpoint_url(&["pullRequests", "42", "commits"], &[])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://dev.azure.com/contoso/Sales%20Team/_apis/git/repositories/repo-1/pullRequests/42/commits?api-version=7.1"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            AzureDevOpsClient::new("not a url", None, None),
            Err(AzureError::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            AzureDevOpsClient::new("mailto:dev@example.com", None, None),
            Err(AzureError::InvalidBaseUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_unconfigured_fails_before_network() {
        // Port 9 is discard; no request may be attempted either way.
        let no_coordinates =
            AzureDevOpsClient::new("http://127.0.0.1:9", None, Some("pat".to_string())).unwrap();
        assert!(matches!(
            no_coordinates.list_commit_ids(1).await,
            Err(AzureError::Unconfigured("repository coordinates"))
        ));

        let no_token = AzureDevOpsClient::new(
            "http://127.0.0.1:9",
            Some(RepositoryCoordinates::new("o", "p", "r")),
            None,
        )
        .unwrap();
        assert!(matches!(
            no_token.list_changed_paths("abc").await,
            Err(AzureError::Unconfigured("access token"))
        ));
    }

    #[tokio::test]
    async fn test_resolve_author_id_finds_first_match() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", format!("{REPO_PATH}/pullrequests").as_str())
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("searchCriteria.status".into(), "completed".into()),
                Matcher::UrlEncoded("api-version".into(), "7.1".into()),
            ]))
            .match_header("authorization", AUTH_HEADER)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "count": 3,
                    "value": [
                        {"pullRequestId": 1, "title": "a", "createdBy": {"id": "other", "uniqueName": "other@example.com"}},
                        {"pullRequestId": 2, "title": "b", "createdBy": {"id": "me-1", "uniqueName": "me@example.com"}},
                        {"pullRequestId": 3, "title": "c", "createdBy": {"id": "me-2", "uniqueName": "me@example.com"}}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let id = client.resolve_author_id("me@example.com").await.unwrap();
        assert_eq!(id, "me-1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_resolve_author_id_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", format!("{REPO_PATH}/pullrequests").as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"value": []}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .resolve_author_id("ghost@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AzureError::NotFound { ref email } if email == "ghost@example.com"));
    }

    #[tokio::test]
    async fn test_list_completed_pull_requests_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", format!("{REPO_PATH}/pullrequests").as_str())
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("searchCriteria.creatorId".into(), "me-1".into()),
                Matcher::UrlEncoded(
                    "searchCriteria.minTime".into(),
                    "2024-02-29T00:00:00.000Z".into(),
                ),
                Matcher::UrlEncoded("searchCriteria.status".into(), "completed".into()),
                Matcher::UrlEncoded("api-version".into(), "7.1".into()),
            ]))
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "value": [
                        {"pullRequestId": 101, "title": "User Story #101 login", "createdBy": {"id": "me-1"}}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let since = Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap();
        let prs = client_for(&server)
            .list_completed_pull_requests("me-1", since)
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(prs.len(), 1);
        assert_eq!(prs[0].id, 101);
        assert_eq!(prs[0].created_by, "me-1");
        assert!(prs[0].changed_paths.is_empty());
    }

    #[tokio::test]
    async fn test_list_commit_ids_preserves_order() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", format!("{REPO_PATH}/pullRequests/101/commits").as_str())
            .match_query(Matcher::UrlEncoded("api-version".into(), "7.1".into()))
            .with_status(200)
            .with_body(r#"{"count": 2, "value": [{"commitId": "ccc"}, {"commitId": "aaa"}]}"#)
            .create_async()
            .await;

        let ids = client_for(&server).list_commit_ids(101).await.unwrap();
        assert_eq!(ids, vec!["ccc".to_string(), "aaa".to_string()]);
    }

    #[tokio::test]
    async fn test_list_changed_paths_keeps_only_blobs() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", format!("{REPO_PATH}/commits/aaa/changes").as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "changeCounts": {"Edit": 2},
                    "changes": [
                        {"changeType": "edit", "item": {"gitObjectType": "tree", "path": "/force-app", "isFolder": true}},
                        {"changeType": "add", "item": {"gitObjectType": "blob", "path": "/force-app/main/default/classes/A.cls"}},
                        {"changeType": "rename", "item": {"gitObjectType": "blob", "path": "/README.md"}}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let paths = client_for(&server).list_changed_paths("aaa").await.unwrap();
        assert_eq!(
            paths,
            vec![
                ChangedPath::new("/force-app/main/default/classes/A.cls", ChangeKind::Added),
                ChangedPath::new("/README.md", ChangeKind::Unknown),
            ]
        );
    }

    #[tokio::test]
    async fn test_non_success_status_is_request_failed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", format!("{REPO_PATH}/pullRequests/5/commits").as_str())
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body("access denied")
            .create_async()
            .await;

        let err = client_for(&server).list_commit_ids(5).await.unwrap_err();
        match err {
            AzureError::RequestFailed {
                url, status, body, ..
            } => {
                assert!(url.contains("/pullRequests/5/commits"));
                assert_eq!(status, Some(401));
                assert_eq!(body.as_deref(), Some("access denied"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_array_field_is_request_failed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", format!("{REPO_PATH}/pullRequests/5/commits").as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"count": 0}"#)
            .create_async()
            .await;

        let err = client_for(&server).list_commit_ids(5).await.unwrap_err();
        assert!(matches!(err, AzureError::RequestFailed { status: None, .. }));
        assert!(err.to_string().contains("\"value\" or \"changes\""));
    }

    #[test]
    fn test_parse_entities_rejects_bad_shapes() {
        let not_json = parse_entities::<GitCommitRef>("u", "<html>");
        assert!(not_json.unwrap_err().to_string().contains("not valid JSON"));

        let not_object = parse_entities::<GitCommitRef>("u", "[1, 2]");
        assert!(not_object.unwrap_err().to_string().contains("received array"));

        let not_array = parse_entities::<GitCommitRef>("u", r#"{"value": "x"}"#);
        assert!(not_array.unwrap_err().to_string().contains("received string"));

        let null_value = parse_entities::<GitCommitRef>("u", r#"{"value": null}"#);
        assert!(null_value.is_err());
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "é".repeat(MAX_BODY_CHARS + 10);
        let truncated = truncate(&body);
        assert_eq!(truncated.chars().count(), MAX_BODY_CHARS + 3);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncate("short"), "short");
    }
}
