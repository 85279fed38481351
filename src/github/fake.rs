//! In-memory `UpstreamApi` used by gate and ledger tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::UpstreamApi;
use crate::error::UpstreamError;
use crate::models::{IssueComment, PullRequestSummary, RepositoryRef, StatusEntry};

#[derive(Default)]
struct State {
    pulls: Vec<PullRequestSummary>,
    statuses: HashMap<String, Vec<StatusEntry>>,
    failing_statuses: HashSet<String>,
    comments: HashMap<u64, Vec<IssueComment>>,
    next_comment_id: u64,
    creates: usize,
    updates: usize,
}

#[derive(Default)]
pub(crate) struct FakeUpstream {
    state: Mutex<State>,
    /// Delay between reading and returning comments, widening race windows.
    list_delay: Option<Duration>,
}

impl FakeUpstream {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    pub(crate) fn add_pull(&self, number: u64, sha: &str, statuses: Vec<StatusEntry>) {
        let url = format!("https://fake/statuses/{}", number);
        let mut state = self.state.lock().unwrap();
        state.pulls.push(PullRequestSummary {
            number,
            merge_commit_sha: sha.to_string(),
            statuses_url: url.clone(),
        });
        state.statuses.insert(url, statuses);
    }

    pub(crate) fn fail_statuses_for(&self, number: u64) {
        let url = format!("https://fake/statuses/{}", number);
        self.state.lock().unwrap().failing_statuses.insert(url);
    }

    pub(crate) fn add_comment(&self, pr_number: u64, body: &str) -> u64 {
        let mut state = self.state.lock().unwrap();
        state.next_comment_id += 1;
        let id = state.next_comment_id;
        state.comments.entry(pr_number).or_default().push(IssueComment {
            id,
            body: body.to_string(),
        });
        id
    }

    pub(crate) fn comments(&self, pr_number: u64) -> Vec<IssueComment> {
        self.state
            .lock()
            .unwrap()
            .comments
            .get(&pr_number)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn creates(&self) -> usize {
        self.state.lock().unwrap().creates
    }

    pub(crate) fn updates(&self) -> usize {
        self.state.lock().unwrap().updates
    }
}

#[async_trait]
impl UpstreamApi for FakeUpstream {
    async fn list_open_pull_requests(
        &self,
        _repo: &RepositoryRef,
    ) -> Result<Vec<PullRequestSummary>, UpstreamError> {
        Ok(self.state.lock().unwrap().pulls.clone())
    }

    async fn list_statuses(&self, statuses_url: &str) -> Result<Vec<StatusEntry>, UpstreamError> {
        let state = self.state.lock().unwrap();
        if state.failing_statuses.contains(statuses_url) {
            return Err(UpstreamError::Api {
                operation: "list statuses".to_string(),
                status: 502,
                message: "Bad Gateway".to_string(),
            });
        }
        Ok(state.statuses.get(statuses_url).cloned().unwrap_or_default())
    }

    async fn list_issue_comments(
        &self,
        _repo: &RepositoryRef,
        pr_number: u64,
    ) -> Result<Vec<IssueComment>, UpstreamError> {
        let comments = self.comments(pr_number);
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(comments)
    }

    async fn create_issue_comment(
        &self,
        _repo: &RepositoryRef,
        pr_number: u64,
        body: &str,
    ) -> Result<IssueComment, UpstreamError> {
        let id = self.add_comment(pr_number, body);
        self.state.lock().unwrap().creates += 1;
        Ok(IssueComment {
            id,
            body: body.to_string(),
        })
    }

    async fn update_issue_comment(
        &self,
        _repo: &RepositoryRef,
        comment_id: u64,
        body: &str,
    ) -> Result<IssueComment, UpstreamError> {
        let mut state = self.state.lock().unwrap();
        state.updates += 1;
        let comment = state
            .comments
            .values_mut()
            .flat_map(|c| c.iter_mut())
            .find(|c| c.id == comment_id)
            .ok_or_else(|| UpstreamError::Api {
                operation: "update issue comment".to_string(),
                status: 404,
                message: "Not Found".to_string(),
            })?;
        comment.body = body.to_string();
        Ok(comment.clone())
    }
}
