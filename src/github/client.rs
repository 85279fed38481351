use async_trait::async_trait;
use octocrab::{Octocrab, Page};
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::UpstreamApi;
use crate::error::UpstreamError;
use crate::models::{IssueComment, PullRequestSummary, RepositoryRef, StatusEntry};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const USER_AGENT: &str = concat!("pr-deployer/", env!("CARGO_PKG_VERSION"));
const PER_PAGE: u8 = 100;

/// GitHub API client for pull request, status and comment calls
pub struct GitHubClient {
    client: Octocrab,
    http: reqwest::Client,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ApiPullRequest {
    number: u64,
    merge_commit_sha: Option<String>,
    statuses_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiComment {
    id: u64,
    body: Option<String>,
}

#[derive(Debug, Serialize)]
struct ListParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'static str>,
    per_page: u8,
}

#[derive(Debug, Serialize)]
struct CommentBody<'a> {
    body: &'a str,
}

impl From<ApiPullRequest> for PullRequestSummary {
    fn from(pr: ApiPullRequest) -> Self {
        Self {
            number: pr.number,
            merge_commit_sha: pr.merge_commit_sha.unwrap_or_default(),
            statuses_url: pr.statuses_url,
        }
    }
}

impl From<ApiComment> for IssueComment {
    fn from(comment: ApiComment) -> Self {
        Self {
            id: comment.id,
            body: comment.body.unwrap_or_default(),
        }
    }
}

impl GitHubClient {
    /// Create a client against api.github.com with the given token
    pub fn new(token: &str) -> Result<Self, UpstreamError> {
        Self::with_base_uri(token, DEFAULT_API_BASE)
    }

    /// Create a client against another API root (GitHub Enterprise, test servers)
    pub fn with_base_uri(token: &str, api_base: &str) -> Result<Self, UpstreamError> {
        let client = Octocrab::builder()
            .personal_token(token.to_string())
            .base_uri(api_base)
            .map_err(|e| UpstreamError::Client {
                message: format!("invalid API base '{}': {}", api_base, e),
            })?
            .build()
            .map_err(|e| UpstreamError::Client {
                message: e.to_string(),
            })?;

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| UpstreamError::Client {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            http,
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl UpstreamApi for GitHubClient {
    #[instrument(skip(self), fields(repo = %repo))]
    async fn list_open_pull_requests(
        &self,
        repo: &RepositoryRef,
    ) -> Result<Vec<PullRequestSummary>, UpstreamError> {
        const OP: &str = "list pull requests";
        info!("Fetching open pull requests");

        let params = ListParams {
            state: Some("open"),
            per_page: PER_PAGE,
        };
        let page = self
            .client
            .get::<Page<ApiPullRequest>, _, _>(repo.pulls_path(), Some(&params))
            .await
            .map_err(|e| map_octocrab_error(OP, &e))?;

        let pulls: Vec<PullRequestSummary> = self
            .client
            .all_pages(page)
            .await
            .map_err(|e| map_octocrab_error(OP, &e))?
            .into_iter()
            .map(PullRequestSummary::from)
            .collect();

        debug!(count = pulls.len(), "Fetched open pull requests");

        Ok(pulls)
    }

    #[instrument(skip(self))]
    async fn list_statuses(&self, statuses_url: &str) -> Result<Vec<StatusEntry>, UpstreamError> {
        const OP: &str = "list statuses";

        // statuses_url is absolute, so it goes through reqwest rather than the
        // octocrab route builder.
        let response = self
            .http
            .get(statuses_url)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| UpstreamError::Network {
                operation: OP.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(OP, status.as_u16(), &body));
        }

        let entries: Vec<StatusEntry> =
            response.json().await.map_err(|e| UpstreamError::Decode {
                operation: OP.to_string(),
                message: e.to_string(),
            })?;

        debug!(count = entries.len(), "Fetched commit statuses");

        Ok(entries)
    }

    #[instrument(skip(self), fields(repo = %repo))]
    async fn list_issue_comments(
        &self,
        repo: &RepositoryRef,
        pr_number: u64,
    ) -> Result<Vec<IssueComment>, UpstreamError> {
        const OP: &str = "list issue comments";

        let params = ListParams {
            state: None,
            per_page: PER_PAGE,
        };
        let page = self
            .client
            .get::<Page<ApiComment>, _, _>(repo.issue_comments_path(pr_number), Some(&params))
            .await
            .map_err(|e| map_octocrab_error(OP, &e))?;

        let comments = self
            .client
            .all_pages(page)
            .await
            .map_err(|e| map_octocrab_error(OP, &e))?
            .into_iter()
            .map(IssueComment::from)
            .collect();

        Ok(comments)
    }

    #[instrument(skip(self, body), fields(repo = %repo))]
    async fn create_issue_comment(
        &self,
        repo: &RepositoryRef,
        pr_number: u64,
        body: &str,
    ) -> Result<IssueComment, UpstreamError> {
        info!("Posting PR comment");

        let comment: ApiComment = self
            .client
            .post(repo.issue_comments_path(pr_number), Some(&CommentBody { body }))
            .await
            .map_err(|e| map_octocrab_error("create issue comment", &e))?;

        debug!(comment_id = comment.id, "Comment posted");

        Ok(comment.into())
    }

    #[instrument(skip(self, body), fields(repo = %repo))]
    async fn update_issue_comment(
        &self,
        repo: &RepositoryRef,
        comment_id: u64,
        body: &str,
    ) -> Result<IssueComment, UpstreamError> {
        info!("Updating PR comment");

        let comment: ApiComment = self
            .client
            .patch(repo.comment_path(comment_id), Some(&CommentBody { body }))
            .await
            .map_err(|e| map_octocrab_error("update issue comment", &e))?;

        Ok(comment.into())
    }
}

fn is_auth_failure(status: u16) -> bool {
    matches!(status, 401 | 403)
}

fn is_rate_limit(status: u16, message: &str) -> bool {
    matches!(status, 403 | 429) && message.to_lowercase().contains("rate limit")
}

fn map_http_error(operation: &str, status: u16, message: &str) -> UpstreamError {
    let operation = operation.to_string();
    let message = if message.is_empty() {
        "unknown error".to_string()
    } else {
        message.to_string()
    };

    if is_rate_limit(status, &message) {
        UpstreamError::RateLimited { operation, message }
    } else if is_auth_failure(status) {
        UpstreamError::Authentication { operation, message }
    } else {
        UpstreamError::Api {
            operation,
            status,
            message,
        }
    }
}

fn map_octocrab_error(operation: &str, error: &octocrab::Error) -> UpstreamError {
    match error {
        octocrab::Error::GitHub { source, .. } => {
            map_http_error(operation, source.status_code.as_u16(), &source.message)
        }
        octocrab::Error::Http { .. }
        | octocrab::Error::Hyper { .. }
        | octocrab::Error::Service { .. } => UpstreamError::Network {
            operation: operation.to_string(),
            message: error.to_string(),
        },
        octocrab::Error::Serde { .. } | octocrab::Error::Json { .. } => UpstreamError::Decode {
            operation: operation.to_string(),
            message: error.to_string(),
        },
        _ => UpstreamError::Api {
            operation: operation.to_string(),
            status: 0,
            message: error.to_string(),
        },
    }
}
