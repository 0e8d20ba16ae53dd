//! Capability interface over the remote repository host.
//!
//! The orchestration only talks to this trait, so any host that can read a
//! file, create a branch, write a file, open a pull request and close an issue
//! can stand in for GitHub. Tests use in-memory fakes.

use anyhow::Result;
use async_trait::async_trait;

use crate::issue::PullRequestDraft;

/// A file as stored on the remote, with the version token needed to update it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub path: String,
    pub content: String,
    pub sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRef {
    pub name: String,
    /// Commit the branch was created at.
    pub sha: String,
}

/// Content to write to `path` on `branch` as a single commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCommit {
    pub path: String,
    pub branch: String,
    pub message: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRef {
    pub sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedPullRequest {
    pub number: u64,
    pub html_url: String,
}

#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Read `path` at `git_ref`.
    ///
    /// Returns `Ok(None)` only when the file does not exist. Authentication,
    /// network and other API failures are errors.
    async fn read_file(
        &self,
        correlation_id: Option<&str>,
        path: &str,
        git_ref: &str,
    ) -> Result<Option<RemoteFile>>;

    /// Create branch `name` at the current tip of `from_branch`.
    ///
    /// Fails if `name` already exists.
    async fn create_branch(
        &self,
        correlation_id: Option<&str>,
        name: &str,
        from_branch: &str,
    ) -> Result<BranchRef>;

    /// Create a file that does not yet exist on the branch.
    async fn create_file(&self, correlation_id: Option<&str>, commit: &FileCommit)
        -> Result<CommitRef>;

    /// Replace an existing file; `sha` is the version token from [`RepositoryHost::read_file`].
    async fn update_file(
        &self,
        correlation_id: Option<&str>,
        commit: &FileCommit,
        sha: &str,
    ) -> Result<CommitRef>;

    async fn create_pull_request(
        &self,
        correlation_id: Option<&str>,
        draft: &PullRequestDraft,
    ) -> Result<OpenedPullRequest>;

    async fn close_issue(&self, correlation_id: Option<&str>, issue_number: u64) -> Result<()>;
}
