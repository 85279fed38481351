pub mod config;
pub mod error;
pub mod github;
pub mod ledger;
pub mod models;
pub mod status_gate;

pub use config::Config;
pub use error::{DeployerError, DeployerResult, MalformedReason, UpstreamError};
pub use github::{GitHubClient, UpstreamApi};
pub use ledger::{DeploymentLedger, LedgerBody, LedgerSnapshot};
pub use models::*;
pub use status_gate::{evaluate, StatusGate};
