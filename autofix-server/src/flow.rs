//! The issue-to-pull-request sequence.
//!
//! Steps run strictly in order and stop at the first failure. Nothing is
//! retried or rolled back, so a failure after [`FlowStep::CreateBranch`]
//! leaves the branch (and possibly a commit or pull request) behind;
//! [`FlowError::completed`] says how far the run got.

use serde::Serialize;
use std::fmt;
use tracing::{error, info};

use autofix_core::{
    build_prompt, CodeGenerator, FileCommit, GenerationMode, Issue, Language, RepositoryHost,
};

use crate::mirror::LocalMirror;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStep {
    ReadFile,
    Generate,
    CreateBranch,
    CommitFile,
    OpenPullRequest,
    CloseIssue,
    WriteLocal,
}

impl fmt::Display for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowStep::ReadFile => "read_file",
            FlowStep::Generate => "generate",
            FlowStep::CreateBranch => "create_branch",
            FlowStep::CommitFile => "commit_file",
            FlowStep::OpenPullRequest => "open_pull_request",
            FlowStep::CloseIssue => "close_issue",
            FlowStep::WriteLocal => "write_local",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{step} failed: {cause:#}")]
pub struct FlowError {
    pub step: FlowStep,
    /// Steps that finished before `step` failed, in order.
    pub completed: Vec<FlowStep>,
    /// Set once the pull request exists, so a later failure still points at it.
    pub opened_pr_url: Option<String>,
    pub cause: anyhow::Error,
}

/// Fixed per-deployment parameters of the flow.
#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub target_file: String,
    pub base_branch: String,
    pub language: Language,
}

impl FlowSettings {
    pub fn new(target_file: impl Into<String>, base_branch: impl Into<String>) -> Self {
        let target_file = target_file.into();
        let language = Language::from_path(&target_file);
        Self {
            target_file,
            base_branch: base_branch.into(),
            language,
        }
    }
}

pub struct FlowContext<'a> {
    pub repository: &'a dyn RepositoryHost,
    pub generator: &'a dyn CodeGenerator,
    pub mirror: &'a LocalMirror,
    pub settings: &'a FlowSettings,
    pub correlation_id: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowOutcome {
    pub pr_url: String,
    pub pr_number: u64,
    pub branch: String,
    pub mode: GenerationMode,
    pub commit_sha: String,
}

#[derive(Default)]
struct Progress {
    completed: Vec<FlowStep>,
    opened_pr_url: Option<String>,
}

impl Progress {
    fn record<T>(&mut self, step: FlowStep, result: anyhow::Result<T>) -> Result<T, FlowError> {
        match result {
            Ok(value) => {
                self.completed.push(step);
                Ok(value)
            }
            Err(cause) => {
                error!(step = %step, "Step failed: {:#}", cause);
                Err(FlowError {
                    step,
                    completed: std::mem::take(&mut self.completed),
                    opened_pr_url: self.opened_pr_url.take(),
                    cause,
                })
            }
        }
    }
}

/// Generate code for `issue` and deliver it as a pull request.
pub async fn run_issue_flow(
    ctx: &FlowContext<'_>,
    issue: &Issue,
) -> Result<FlowOutcome, FlowError> {
    let settings = ctx.settings;
    let cid = ctx.correlation_id;
    let mut progress = Progress::default();

    info!(
        step = %FlowStep::ReadFile,
        issue = issue.number,
        "Reading {} at {}",
        settings.target_file,
        settings.base_branch
    );
    let current = progress.record(
        FlowStep::ReadFile,
        ctx.repository
            .read_file(cid, &settings.target_file, &settings.base_branch)
            .await,
    )?;

    let current_content = current.as_ref().map(|file| file.content.as_str());
    let mode = GenerationMode::for_current(current_content);
    let prompt = build_prompt(
        &settings.target_file,
        &settings.language,
        current_content,
        &issue.combined_text(),
    );

    info!(step = %FlowStep::Generate, issue = issue.number, mode = %mode, "Generating code");
    let code = progress.record(
        FlowStep::Generate,
        ctx.generator
            .generate_code(cid, &prompt, &settings.language)
            .await,
    )?;

    let branch_name = issue.branch_name();
    info!(
        step = %FlowStep::CreateBranch,
        issue = issue.number,
        "Creating branch {} from {}",
        branch_name,
        settings.base_branch
    );
    let branch = progress.record(
        FlowStep::CreateBranch,
        ctx.repository
            .create_branch(cid, &branch_name, &settings.base_branch)
            .await,
    )?;

    let commit = FileCommit {
        path: settings.target_file.clone(),
        branch: branch.name.clone(),
        message: issue.commit_message(),
        content: code.clone(),
    };
    info!(step = %FlowStep::CommitFile, issue = issue.number, mode = %mode, "Committing {}", commit.path);
    let commit_result = match &current {
        Some(existing) => ctx.repository.update_file(cid, &commit, &existing.sha).await,
        None => ctx.repository.create_file(cid, &commit).await,
    };
    let committed = progress.record(FlowStep::CommitFile, commit_result)?;

    let draft = issue.pull_request_draft(&settings.base_branch);
    info!(
        step = %FlowStep::OpenPullRequest,
        issue = issue.number,
        debugging_note = issue.looks_like_bug_report(),
        "Opening pull request"
    );
    let pull_request = progress.record(
        FlowStep::OpenPullRequest,
        ctx.repository.create_pull_request(cid, &draft).await,
    )?;
    progress.opened_pr_url = Some(pull_request.html_url.clone());

    info!(step = %FlowStep::CloseIssue, issue = issue.number, "Closing issue");
    progress.record(
        FlowStep::CloseIssue,
        ctx.repository.close_issue(cid, issue.number).await,
    )?;

    info!(
        step = %FlowStep::WriteLocal,
        issue = issue.number,
        "Writing {}",
        ctx.mirror.path().display()
    );
    progress.record(FlowStep::WriteLocal, ctx.mirror.write(&code).await)?;

    info!(
        issue = issue.number,
        pr = pull_request.number,
        "Issue handled: {}",
        pull_request.html_url
    );

    Ok(FlowOutcome {
        pr_url: pull_request.html_url,
        pr_number: pull_request.number,
        branch: branch.name,
        mode,
        commit_sha: committed.sha,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_step_names_are_snake_case() {
        assert_eq!(FlowStep::OpenPullRequest.to_string(), "open_pull_request");
        assert_eq!(
            serde_json::to_value(FlowStep::WriteLocal).unwrap(),
            serde_json::json!("write_local")
        );
    }

    #[test]
    fn test_progress_keeps_pull_request_url_after_it_opens() {
        let mut progress = Progress::default();
        progress.record(FlowStep::OpenPullRequest, Ok(())).unwrap();
        progress.opened_pr_url = Some("https://github.com/octo/game/pull/7".to_string());

        let err = progress
            .record::<()>(FlowStep::CloseIssue, Err(anyhow!("403 Forbidden")))
            .unwrap_err();
        assert_eq!(
            err.opened_pr_url.as_deref(),
            Some("https://github.com/octo/game/pull/7")
        );
    }

    #[test]
    fn test_settings_derive_language_from_target() {
        assert_eq!(FlowSettings::new("game.py", "main").language.name, "Python");
        assert_eq!(FlowSettings::new("README", "main").language, Language::GENERIC);
    }

    #[test]
    fn test_progress_reports_completed_steps_on_failure() {
        let mut progress = Progress::default();
        progress.record(FlowStep::ReadFile, Ok(())).unwrap();
        progress.record(FlowStep::Generate, Ok(())).unwrap();

        let err = progress
            .record::<()>(FlowStep::CreateBranch, Err(anyhow!("422 Reference already exists")))
            .unwrap_err();

        assert_eq!(err.step, FlowStep::CreateBranch);
        assert_eq!(err.completed, vec![FlowStep::ReadFile, FlowStep::Generate]);
        assert!(err.opened_pr_url.is_none());
        assert_eq!(
            err.to_string(),
            "create_branch failed: 422 Reference already exists"
        );
    }
}
