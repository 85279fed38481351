pub mod client;
#[cfg(test)]
pub(crate) mod fake;

pub use client::GitHubClient;

use async_trait::async_trait;

use crate::error::UpstreamError;
use crate::models::{IssueComment, PullRequestSummary, RepositoryRef, StatusEntry};

/// The subset of the GitHub REST API the deployer talks to.
///
/// Implementations surface every transport, auth, throttling and decoding
/// failure as [`UpstreamError`] and never retry.
#[async_trait]
pub trait UpstreamApi: Send + Sync {
    /// List open pull requests, following pagination.
    async fn list_open_pull_requests(
        &self,
        repo: &RepositoryRef,
    ) -> Result<Vec<PullRequestSummary>, UpstreamError>;

    /// Fetch a commit's statuses from the pull request's `statuses_url`.
    ///
    /// GitHub documents the list as newest first.
    async fn list_statuses(&self, statuses_url: &str) -> Result<Vec<StatusEntry>, UpstreamError>;

    /// List every comment on the pull request's issue thread, in API order.
    async fn list_issue_comments(
        &self,
        repo: &RepositoryRef,
        pr_number: u64,
    ) -> Result<Vec<IssueComment>, UpstreamError>;

    async fn create_issue_comment(
        &self,
        repo: &RepositoryRef,
        pr_number: u64,
        body: &str,
    ) -> Result<IssueComment, UpstreamError>;

    /// Overwrite the body of an existing comment.
    async fn update_issue_comment(
        &self,
        repo: &RepositoryRef,
        comment_id: u64,
        body: &str,
    ) -> Result<IssueComment, UpstreamError>;
}
