use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info, instrument, warn};

use crate::error::UpstreamError;
use crate::github::UpstreamApi;
use crate::models::{
    NotDeployableReason, PullRequestRecord, PullRequestSummary, RepositoryRef, StatusEntry,
    StatusState, Verdict,
};

/// Decides which open pull requests have green checks.
pub struct StatusGate<A: UpstreamApi> {
    api: Arc<A>,
    max_concurrent_fetches: usize,
}

impl<A: UpstreamApi> StatusGate<A> {
    pub fn new(api: Arc<A>, max_concurrent_fetches: usize) -> Self {
        Self {
            api,
            max_concurrent_fetches: max_concurrent_fetches.max(1),
        }
    }

    /// List open pull requests and keep those whose latest status is `success`.
    ///
    /// Status fetches run concurrently but results keep the order upstream
    /// listed the pull requests in. Any failed fetch fails the whole run; no
    /// partial list is returned.
    #[instrument(skip(self), fields(repo = %repo))]
    pub async fn discover_deployable(
        &self,
        repo: &RepositoryRef,
    ) -> Result<Vec<PullRequestRecord>, UpstreamError> {
        let pulls = self.api.list_open_pull_requests(repo).await?;
        let total = pulls.len();

        let verdicts: Vec<(PullRequestSummary, Verdict)> = stream::iter(pulls)
            .map(|pull| async move {
                let entries = self.api.list_statuses(&pull.statuses_url).await?;
                let verdict = evaluate(&entries);
                Ok::<_, UpstreamError>((pull, verdict))
            })
            .buffered(self.max_concurrent_fetches)
            .try_collect()
            .await?;

        let deployable: Vec<PullRequestRecord> = verdicts
            .into_iter()
            .filter_map(|(pull, verdict)| match verdict {
                Verdict::Deployable => Some(PullRequestRecord {
                    number: pull.number,
                    head_commit_sha: pull.merge_commit_sha,
                    checks_passed: true,
                }),
                Verdict::NotDeployable(reason) => {
                    debug!(pr = pull.number, ?reason, "Pull request not deployable");
                    None
                }
            })
            .collect();

        info!(
            open = total,
            deployable = deployable.len(),
            "Discovery complete"
        );

        Ok(deployable)
    }
}

/// Decide deployability from a commit's status list.
///
/// Upstream returns statuses newest first, so the first entry is taken as the
/// latest. The ordering is checked against `created_at` and a violation is
/// logged, but the first entry is still used.
pub fn evaluate(entries: &[StatusEntry]) -> Verdict {
    let Some(latest) = entries.first() else {
        return Verdict::NotDeployable(NotDeployableReason::NoStatuses);
    };

    if let Some(newer) = entries.iter().find(|e| e.created_at > latest.created_at) {
        warn!(
            first = %latest.created_at,
            newer = %newer.created_at,
            "Status list is not newest-first; using first entry"
        );
    }

    match latest.state {
        StatusState::Success => Verdict::Deployable,
        state => Verdict::NotDeployable(NotDeployableReason::LatestState(state)),
    }
}
