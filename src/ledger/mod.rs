pub mod body;

pub use body::{LedgerBody, LedgerSnapshot, LEDGER_MARKER, NOT_INITIALIZED};

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::error::{DeployerError, DeployerResult, MalformedReason, UpstreamError};
use crate::github::UpstreamApi;
use crate::models::{IssueComment, LedgerComment, Provider, RepositoryRef};

/// Per-PR deployment ledger kept in a single issue comment.
///
/// The comment is the only store. Updates for one pull request are
/// serialized through a per-PR lock so a read-modify-write cycle never races
/// another update of the same comment; different pull requests proceed
/// concurrently.
pub struct DeploymentLedger<A: UpstreamApi> {
    api: Arc<A>,
    repo: RepositoryRef,
    locks: RwLock<HashMap<u64, Arc<Mutex<()>>>>,
}

impl<A: UpstreamApi> DeploymentLedger<A> {
    pub fn new(api: Arc<A>, repo: RepositoryRef) -> Self {
        Self {
            api,
            repo,
            locks: RwLock::new(HashMap::new()),
        }
    }

    pub fn repository(&self) -> &RepositoryRef {
        &self.repo
    }

    /// Find the PR's ledger comment.
    ///
    /// The first comment starting with the marker is authoritative. Later
    /// matches are left alone and reported as a warning.
    #[instrument(skip(self), fields(repo = %self.repo))]
    pub async fn locate(&self, pr_number: u64) -> Result<Option<LedgerComment>, UpstreamError> {
        let comments = self.api.list_issue_comments(&self.repo, pr_number).await?;
        Ok(first_ledger(pr_number, comments))
    }

    /// Read the per-provider values of the PR's ledger, if it has one.
    pub async fn read(&self, pr_number: u64) -> DeployerResult<Option<LedgerSnapshot>> {
        let Some(comment) = self.locate(pr_number).await? else {
            return Ok(None);
        };

        LedgerBody::parse(&comment.body)
            .and_then(|body| body.snapshot())
            .map(Some)
            .map_err(|reason| malformed(pr_number, comment.id, reason))
    }

    /// Set one provider's value, creating the ledger comment on first use.
    ///
    /// Only the target provider's line changes. A ledger missing that line is
    /// reported as malformed and not written.
    #[instrument(skip(self, value), fields(repo = %self.repo))]
    pub async fn ensure_and_update(
        &self,
        pr_number: u64,
        provider: Provider,
        value: &str,
    ) -> DeployerResult<LedgerComment> {
        validate_value(provider, value)?;

        let lock = self.pr_lock(pr_number).await;
        let _guard = lock.lock().await;

        let Some(existing) = self.locate(pr_number).await? else {
            let body = LedgerBody::initial(provider, value).to_string();
            let created = self
                .api
                .create_issue_comment(&self.repo, pr_number, &body)
                .await?;

            info!(comment_id = created.id, "Created ledger comment");

            return Ok(to_ledger(created));
        };

        let mut body = LedgerBody::parse(&existing.body)
            .map_err(|reason| malformed(pr_number, existing.id, reason))?;
        body.set_value(provider, value)
            .map_err(|reason| malformed(pr_number, existing.id, reason))?;

        let new_body = body.to_string();
        if new_body == existing.body {
            debug!(comment_id = existing.id, "Ledger already up to date");
            return Ok(existing);
        }

        let updated = self
            .api
            .update_issue_comment(&self.repo, existing.id, &new_body)
            .await?;

        info!(comment_id = updated.id, "Updated ledger comment");

        Ok(to_ledger(updated))
    }

    async fn pr_lock(&self, pr_number: u64) -> Arc<Mutex<()>> {
        {
            let locks = self.locks.read().await;
            if let Some(lock) = locks.get(&pr_number) {
                return lock.clone();
            }
        }

        let mut locks = self.locks.write().await;
        locks.entry(pr_number).or_default().clone()
    }
}

fn first_ledger(pr_number: u64, comments: Vec<IssueComment>) -> Option<LedgerComment> {
    let mut ledgers = comments
        .into_iter()
        .filter(|c| LedgerBody::is_ledger(&c.body));

    let first = ledgers.next()?;
    let duplicates: Vec<u64> = ledgers.map(|c| c.id).collect();
    if !duplicates.is_empty() {
        warn!(
            pr = pr_number,
            authoritative = first.id,
            ?duplicates,
            "Multiple ledger comments found, using the first"
        );
    }

    Some(to_ledger(first))
}

fn to_ledger(comment: IssueComment) -> LedgerComment {
    LedgerComment {
        id: comment.id,
        body: comment.body,
    }
}

fn malformed(pr_number: u64, comment_id: u64, reason: MalformedReason) -> DeployerError {
    warn!(pr = pr_number, comment_id, %reason, "Ledger comment is malformed");
    DeployerError::MalformedLedger {
        pr_number,
        comment_id,
        reason,
    }
}

fn validate_value(provider: Provider, value: &str) -> DeployerResult<()> {
    if value.trim().is_empty() {
        return Err(DeployerError::InvalidLedgerValue {
            provider,
            reason: "value is empty",
        });
    }
    if value.contains(['\n', '\r']) {
        return Err(DeployerError::InvalidLedgerValue {
            provider,
            reason: "value contains a line break",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::fake::FakeUpstream;
    use std::time::Duration;

    const PR: u64 = 42;

    fn ledger(api: &Arc<FakeUpstream>) -> DeploymentLedger<FakeUpstream> {
        DeploymentLedger::new(api.clone(), RepositoryRef::new("ograu", "prsfetcher"))
    }

    #[tokio::test]
    async fn test_locate_absent() {
        let api = Arc::new(FakeUpstream::new());
        api.add_comment(PR, "unrelated");

        assert_eq!(ledger(&api).locate(PR).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_locate_first_match_wins() {
        let api = Arc::new(FakeUpstream::new());
        api.add_comment(PR, "LGTM");
        let first = api.add_comment(PR, &LedgerBody::template().to_string());
        api.add_comment(PR, &LedgerBody::initial(Provider::Aws, "other").to_string());

        let found = ledger(&api).locate(PR).await.unwrap().unwrap();
        assert_eq!(found.id, first);
    }

    #[tokio::test]
    async fn test_first_update_creates_comment() {
        let api = Arc::new(FakeUpstream::new());
        let comment = ledger(&api)
            .ensure_and_update(PR, Provider::Aws, "https://example/aws-1")
            .await
            .unwrap();

        assert_eq!(api.creates(), 1);
        assert_eq!(api.updates(), 0);
        assert!(comment.body.starts_with(LEDGER_MARKER));
        assert!(comment.body.contains("\nAWS: https://example/aws-1\n"));
        assert!(comment.body.contains("\nAzure: Not initialized\n"));
        assert!(comment.body.contains("\nKVM: Not initialized\n"));
        assert_eq!(api.comments(PR), vec![IssueComment { id: comment.id, body: comment.body }]);
    }

    #[tokio::test]
    async fn test_update_changes_only_target_line() {
        let api = Arc::new(FakeUpstream::new());
        let ledger = ledger(&api);
        let first = ledger
            .ensure_and_update(PR, Provider::Aws, "https://example/aws-1")
            .await
            .unwrap();
        let second = ledger
            .ensure_and_update(PR, Provider::Azure, "success")
            .await
            .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(api.creates(), 1);
        assert_eq!(api.updates(), 1);

        let changed: Vec<(&str, &str)> = first
            .body
            .lines()
            .zip(second.body.lines())
            .filter(|(a, b)| a != b)
            .collect();
        assert_eq!(changed, vec![("Azure: Not initialized", "Azure: success")]);
    }

    #[tokio::test]
    async fn test_repeated_update_is_idempotent() {
        let api = Arc::new(FakeUpstream::new());
        let ledger = ledger(&api);
        let once = ledger
            .ensure_and_update(PR, Provider::Aws, "running")
            .await
            .unwrap();
        let twice = ledger
            .ensure_and_update(PR, Provider::Aws, "running")
            .await
            .unwrap();

        assert_eq!(once, twice);
        assert_eq!(api.comments(PR).len(), 1);
    }

    #[tokio::test]
    async fn test_updates_commute() {
        let api = Arc::new(FakeUpstream::new());
        let ledger = ledger(&api);

        ledger.ensure_and_update(1, Provider::Aws, "x").await.unwrap();
        let ab = ledger.ensure_and_update(1, Provider::Azure, "y").await.unwrap();

        ledger.ensure_and_update(2, Provider::Azure, "y").await.unwrap();
        let ba = ledger.ensure_and_update(2, Provider::Aws, "x").await.unwrap();

        assert_eq!(ab.body, ba.body);
    }

    #[tokio::test]
    async fn test_malformed_ledger_is_left_untouched() {
        let api = Arc::new(FakeUpstream::new());
        let text = "### App PR Deployer\nComment revision: 2\n\nAWS: Not initialized\nAzure: Not initialized\n";
        let id = api.add_comment(PR, text);

        let err = ledger(&api)
            .ensure_and_update(PR, Provider::Kvm, "success")
            .await
            .unwrap_err();

        assert_eq!(
            err,
            DeployerError::MalformedLedger {
                pr_number: PR,
                comment_id: id,
                reason: MalformedReason::MissingProvider(Provider::Kvm),
            }
        );
        assert_eq!(api.updates(), 0);
        assert_eq!(api.comments(PR)[0].body, text);
    }

    #[tokio::test]
    async fn test_rejects_multiline_value() {
        let api = Arc::new(FakeUpstream::new());
        let err = ledger(&api)
            .ensure_and_update(PR, Provider::Aws, "ok\nKVM: hijacked")
            .await
            .unwrap_err();

        assert!(matches!(err, DeployerError::InvalidLedgerValue { .. }));
        assert_eq!(api.creates(), 0);
    }

    #[tokio::test]
    async fn test_read_snapshot() {
        let api = Arc::new(FakeUpstream::new());
        let ledger = ledger(&api);
        assert_eq!(ledger.read(PR).await.unwrap(), None);

        ledger
            .ensure_and_update(PR, Provider::Kvm, "https://example/kvm-3")
            .await
            .unwrap();
        let snapshot = ledger.read(PR).await.unwrap().unwrap();

        assert_eq!(snapshot.get(Provider::Kvm), Some("https://example/kvm-3"));
        assert_eq!(snapshot.get(Provider::Aws), None);
    }

    #[tokio::test]
    async fn test_concurrent_updates_on_same_pr_all_land() {
        let api = Arc::new(FakeUpstream::new().with_list_delay(Duration::from_millis(20)));
        let ledger = Arc::new(ledger(&api));

        let handles: Vec<_> = [(Provider::Aws, "a"), (Provider::Azure, "b"), (Provider::Kvm, "c")]
            .into_iter()
            .map(|(provider, value)| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.ensure_and_update(PR, provider, value).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(api.creates(), 1);
        let comments = api.comments(PR);
        assert_eq!(comments.len(), 1);
        let snapshot = LedgerBody::parse(&comments[0].body).unwrap().snapshot().unwrap();
        assert_eq!(snapshot.get(Provider::Aws), Some("a"));
        assert_eq!(snapshot.get(Provider::Azure), Some("b"));
        assert_eq!(snapshot.get(Provider::Kvm), Some("c"));
    }
}
