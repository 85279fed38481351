use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Deployment target tracked in the ledger. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "AWS")]
    Aws,
    #[serde(rename = "Azure")]
    Azure,
    #[serde(rename = "KVM")]
    Kvm,
}

impl Provider {
    /// Ledger line order.
    pub const ALL: [Provider; 3] = [Provider::Aws, Provider::Azure, Provider::Kvm];

    /// Label used at the start of the provider's ledger line.
    pub fn label(self) -> &'static str {
        match self {
            Provider::Aws => "AWS",
            Provider::Azure => "Azure",
            Provider::Kvm => "KVM",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .into_iter()
            .find(|p| p.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown provider '{}', expected one of AWS, Azure, KVM", s))
    }
}

/// State of a single commit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusState {
    Success,
    Failure,
    Pending,
    Error,
    #[serde(other)]
    Unknown,
}

/// One entry from a commit's status list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub state: StatusState,
    pub created_at: DateTime<Utc>,
}

/// Open pull request as listed by upstream, before its checks are evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestSummary {
    pub number: u64,
    /// Empty while GitHub has not computed mergeability yet.
    pub merge_commit_sha: String,
    pub statuses_url: String,
}

/// A pull request whose latest status check is green.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequestRecord {
    pub number: u64,
    pub head_commit_sha: String,
    pub checks_passed: bool,
}

/// Outcome of evaluating a pull request's statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Deployable,
    NotDeployable(NotDeployableReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotDeployableReason {
    /// The head commit has no statuses at all.
    NoStatuses,
    /// The most recent status is something other than success.
    LatestState(StatusState),
}

/// Any comment on a pull request's issue thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueComment {
    pub id: u64,
    pub body: String,
}

/// An issue comment holding a PR's deployment ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerComment {
    pub id: u64,
    pub body: String,
}

/// Repository addressed as `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
}

impl RepositoryRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn pulls_path(&self) -> String {
        format!("/repos/{}/{}/pulls", self.owner, self.name)
    }

    pub fn issue_comments_path(&self, pr_number: u64) -> String {
        format!(
            "/repos/{}/{}/issues/{}/comments",
            self.owner, self.name, pr_number
        )
    }

    pub fn comment_path(&self, comment_id: u64) -> String {
        format!(
            "/repos/{}/{}/issues/comments/{}",
            self.owner, self.name, comment_id
        )
    }
}

impl FromStr for RepositoryRef {
    type Err = String;

    /// Parse owner and repo from "owner/repo" format
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [owner, name] if !owner.is_empty() && !name.is_empty() => {
                Ok(Self::new(*owner, *name))
            }
            _ => Err(format!(
                "Invalid repo format. Expected 'owner/repo', got: {}",
                s
            )),
        }
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
