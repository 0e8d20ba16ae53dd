use anyhow::{Context, Result};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use autofix_core::{DEFAULT_GEMINI_API_URL, DEFAULT_MODEL};

use crate::github::{RepoSlug, DEFAULT_GITHUB_API_URL};

pub const DEFAULT_TARGET_FILE: &str = "game.py";
pub const DEFAULT_BASE_BRANCH: &str = "main";

#[derive(Clone)]
pub struct Config {
    pub github_token: String,
    pub google_api_key: String,
    pub repo: RepoSlug,
    /// Path of the generated file inside the repository.
    pub target_file: String,
    /// Where the generated file is mirrored after a successful run.
    /// Defaults to `<working dir>/<target_file>`.
    pub local_file_path: PathBuf,
    pub base_branch: String,
    pub gemini_model: String,
    pub github_api_url: String,
    pub gemini_api_url: String,
    pub port: u16,
    pub recording_enabled: bool,
    pub recording_log_path: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let working_dir = env::current_dir().context("Failed to determine working directory")?;
        Self::from_lookup(|key| env::var(key).ok(), &working_dir)
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F, working_dir: &Path) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| parse_optional(lookup(key));
        let required = |key: &str| {
            optional(key).with_context(|| format!("{} environment variable is required", key))
        };

        let github_token = required("GITHUB_TOKEN")?;
        let google_api_key = required("GOOGLE_API_KEY")?;

        let repo = required("REPO_NAME")?
            .parse::<RepoSlug>()
            .context("REPO_NAME must have the form owner/repo")?;

        let target_file =
            optional("TARGET_FILE").unwrap_or_else(|| DEFAULT_TARGET_FILE.to_string());

        let local_file_path = optional("LOCAL_FILE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| working_dir.join(&target_file));

        let base_branch =
            optional("BASE_BRANCH").unwrap_or_else(|| DEFAULT_BASE_BRANCH.to_string());

        let gemini_model = optional("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let github_api_url =
            optional("GITHUB_API_URL").unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string());

        let gemini_api_url =
            optional("GEMINI_API_URL").unwrap_or_else(|| DEFAULT_GEMINI_API_URL.to_string());

        let port = optional("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        let recording_enabled = optional("RECORDING_ENABLED")
            .and_then(|value| value.parse::<bool>().ok())
            .unwrap_or(false);

        let recording_log_path =
            optional("RECORDING_LOG_PATH").unwrap_or_else(|| "recordings.jsonl".to_string());

        Ok(Config {
            github_token,
            google_api_key,
            repo,
            target_file,
            local_file_path,
            base_branch,
            gemini_model,
            github_api_url,
            gemini_api_url,
            port,
            recording_enabled,
            recording_log_path,
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("github_token", &"[REDACTED]")
            .field("google_api_key", &"[REDACTED]")
            .field("repo", &self.repo)
            .field("target_file", &self.target_file)
            .field("local_file_path", &self.local_file_path)
            .field("base_branch", &self.base_branch)
            .field("gemini_model", &self.gemini_model)
            .field("github_api_url", &self.github_api_url)
            .field("gemini_api_url", &self.gemini_api_url)
            .field("port", &self.port)
            .field("recording_enabled", &self.recording_enabled)
            .field("recording_log_path", &self.recording_log_path)
            .finish()
    }
}

/// Missing, empty and whitespace-only values all count as unset.
pub fn parse_optional(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
