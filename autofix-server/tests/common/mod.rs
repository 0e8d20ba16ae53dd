#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use autofix_core::{
    BranchRef, CodeGenerator, CommitRef, FileCommit, OpenedPullRequest, PullRequestDraft,
    RemoteFile, RepositoryHost,
};
use autofix_server::{AppState, FlowSettings, FlowStep, LocalMirror};

/// A call made against [`FakeRepository`], in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ReadFile { path: String, git_ref: String },
    CreateBranch { name: String, from: String },
    CreateFile(FileCommit),
    UpdateFile { commit: FileCommit, sha: String },
    CreatePullRequest(PullRequestDraft),
    CloseIssue(u64),
}

#[derive(Default)]
pub struct FakeRepository {
    pub existing: Option<RemoteFile>,
    /// Make the adapter call belonging to this step fail.
    pub fail_at: Option<FlowStep>,
    calls: Mutex<Vec<Call>>,
}

impl FakeRepository {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_file(content: &str, sha: &str) -> Self {
        Self {
            existing: Some(RemoteFile {
                path: "game.py".to_string(),
                content: content.to_string(),
                sha: sha.to_string(),
            }),
            ..Self::default()
        }
    }

    pub fn failing_at(mut self, step: FlowStep) -> Self {
        self.fail_at = Some(step);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, call: Call, step: FlowStep) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail_at == Some(step) {
            Err(anyhow!("simulated {} failure", step))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RepositoryHost for FakeRepository {
    async fn read_file(
        &self,
        _correlation_id: Option<&str>,
        path: &str,
        git_ref: &str,
    ) -> Result<Option<RemoteFile>> {
        self.push(
            Call::ReadFile {
                path: path.to_string(),
                git_ref: git_ref.to_string(),
            },
            FlowStep::ReadFile,
        )?;
        Ok(self.existing.clone())
    }

    async fn create_branch(
        &self,
        _correlation_id: Option<&str>,
        name: &str,
        from_branch: &str,
    ) -> Result<BranchRef> {
        self.push(
            Call::CreateBranch {
                name: name.to_string(),
                from: from_branch.to_string(),
            },
            FlowStep::CreateBranch,
        )?;
        Ok(BranchRef {
            name: name.to_string(),
            sha: "base-tip".to_string(),
        })
    }

    async fn create_file(
        &self,
        _correlation_id: Option<&str>,
        commit: &FileCommit,
    ) -> Result<CommitRef> {
        self.push(Call::CreateFile(commit.clone()), FlowStep::CommitFile)?;
        Ok(CommitRef {
            sha: "created-commit".to_string(),
        })
    }

    async fn update_file(
        &self,
        _correlation_id: Option<&str>,
        commit: &FileCommit,
        sha: &str,
    ) -> Result<CommitRef> {
        self.push(
            Call::UpdateFile {
                commit: commit.clone(),
                sha: sha.to_string(),
            },
            FlowStep::CommitFile,
        )?;
        Ok(CommitRef {
            sha: "updated-commit".to_string(),
        })
    }

    async fn create_pull_request(
        &self,
        _correlation_id: Option<&str>,
        draft: &PullRequestDraft,
    ) -> Result<OpenedPullRequest> {
        self.push(Call::CreatePullRequest(draft.clone()), FlowStep::OpenPullRequest)?;
        Ok(OpenedPullRequest {
            number: 7,
            html_url: "https://github.com/octo/game/pull/7".to_string(),
        })
    }

    async fn close_issue(&self, _correlation_id: Option<&str>, issue_number: u64) -> Result<()> {
        self.push(Call::CloseIssue(issue_number), FlowStep::CloseIssue)
    }
}

/// Returns a scripted reply and remembers every prompt it was given.
pub struct FakeGenerator {
    reply: std::result::Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CodeGenerator for FakeGenerator {
    async fn complete(&self, _correlation_id: Option<&str>, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone().map_err(|message| anyhow!(message))
    }
}

pub struct Harness {
    pub repository: Arc<FakeRepository>,
    pub generator: Arc<FakeGenerator>,
    pub state: Arc<AppState>,
    pub dir: tempfile::TempDir,
}

impl Harness {
    pub fn new(repository: FakeRepository, generator: FakeGenerator) -> Self {
        Self::build(repository, generator, |dir| dir.join("game.py"))
    }

    /// The mirror path sits under a regular file, so the local write fails.
    pub fn with_blocked_mirror(repository: FakeRepository, generator: FakeGenerator) -> Self {
        Self::build(repository, generator, |dir| {
            let blocker = dir.join("blocker");
            std::fs::write(&blocker, "").unwrap();
            blocker.join("game.py")
        })
    }

    fn build(
        repository: FakeRepository,
        generator: FakeGenerator,
        mirror_path: impl FnOnce(&std::path::Path) -> std::path::PathBuf,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repository = Arc::new(repository);
        let generator = Arc::new(generator);
        let state = Arc::new(AppState {
            repository: repository.clone(),
            generator: generator.clone(),
            mirror: LocalMirror::new(mirror_path(dir.path())),
            settings: FlowSettings::new("game.py", "main"),
            recording_logger: None,
        });
        Self {
            repository,
            generator,
            state,
            dir,
        }
    }

    pub fn mirror_contents(&self) -> Option<String> {
        std::fs::read_to_string(self.state.mirror.path()).ok()
    }
}
