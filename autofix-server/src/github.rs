use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{Method, StatusCode};
use reqwest_middleware::{ClientWithMiddleware, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{error, info};
use url::Url;

use autofix_core::{
    BranchRef, CommitRef, FileCommit, OpenedPullRequest, PullRequestDraft, RemoteFile,
    RepositoryHost, ServiceType, CORRELATION_ID_HEADER,
};

use crate::recording::{instrumented_client, RecordingLogger};

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// `owner/repo` identifier of the target repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl FromStr for RepoSlug {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        match parts.as_slice() {
            [owner, name] if !owner.is_empty() && !name.is_empty() => Ok(Self {
                owner: owner.to_string(),
                name: name.to_string(),
            }),
            _ => Err(anyhow!("Invalid repository identifier '{}'", s)),
        }
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// GitHub REST client authenticated with a bearer token, scoped to one repository.
#[derive(Clone)]
pub struct GitHubClient {
    client: ClientWithMiddleware,
    token: String,
    repo: RepoSlug,
    api_url: String,
}

#[derive(Debug, Deserialize)]
struct FileContentsResponse {
    path: String,
    sha: String,
    #[serde(default)]
    content: String,
    encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitRefResponse {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Debug, Serialize)]
struct CreateRefRequest<'a> {
    #[serde(rename = "ref")]
    ref_name: String,
    sha: &'a str,
}

#[derive(Debug, Serialize)]
struct PutContentsRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PutContentsResponse {
    commit: GitObject,
}

#[derive(Debug, Serialize)]
struct CreatePullRequest<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
}

#[derive(Debug, Deserialize)]
struct PullRequestResponse {
    number: u64,
    html_url: String,
}

#[derive(Debug, Serialize)]
struct UpdateIssueRequest {
    state: &'static str,
}

impl GitHubClient {
    pub fn new(client: ClientWithMiddleware, token: String, repo: RepoSlug, api_url: String) -> Self {
        Self {
            client,
            token,
            repo,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// `{api}/repos/{owner}/{repo}/...` with every segment percent-encoded.
    /// A `/` inside a segment (a nested file path, a branch like `feat/x`)
    /// still separates path components.
    fn repo_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.api_url)
            .with_context(|| format!("Invalid GitHub API URL '{}'", self.api_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("GitHub API URL '{}' cannot be a base", self.api_url))?
            .pop_if_empty()
            .extend(["repos", self.repo.owner.as_str(), self.repo.name.as_str()])
            .extend(segments.iter().flat_map(|segment| segment.split('/')));
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, correlation_id: Option<&str>) -> RequestBuilder {
        let mut request_builder = self
            .client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github.v3+json");

        if let Some(cid) = correlation_id {
            request_builder = request_builder.header(CORRELATION_ID_HEADER, cid);
        }

        request_builder
    }

    fn json_request<T: Serialize>(
        &self,
        method: Method,
        url: Url,
        correlation_id: Option<&str>,
        body: &T,
    ) -> Result<RequestBuilder> {
        Ok(self
            .request(method, url, correlation_id)
            .body(serde_json::to_string(body)?)
            .header("Content-Type", "application/json"))
    }

    async fn get_branch_head(&self, correlation_id: Option<&str>, branch: &str) -> Result<String> {
        let url = self.repo_url(&["git", "ref", "heads", branch])?;

        let response = self
            .request(Method::GET, url, correlation_id)
            .send()
            .await
            .context("Failed to send branch ref request")?;

        if !response.status().is_success() {
            return Err(api_error(response, "fetching branch ref").await);
        }

        let ref_response: GitRefResponse = response
            .json()
            .await
            .context("Failed to parse branch ref response")?;
        Ok(ref_response.object.sha)
    }

    async fn put_contents(
        &self,
        correlation_id: Option<&str>,
        commit: &FileCommit,
        sha: Option<&str>,
    ) -> Result<CommitRef> {
        let url = self.repo_url(&["contents", &commit.path])?;
        let request_body = PutContentsRequest {
            message: &commit.message,
            content: general_purpose::STANDARD.encode(commit.content.as_bytes()),
            branch: &commit.branch,
            sha,
        };

        let response = self
            .json_request(Method::PUT, url, correlation_id, &request_body)?
            .send()
            .await
            .context("Failed to send file contents update")?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            let error_text = response.text().await.unwrap_or_default();
            error!(
                "File {} changed since it was read: {}",
                commit.path, error_text
            );
            return Err(anyhow!(
                "GitHub rejected the write to {}: version token is stale ({} - {})",
                commit.path,
                status,
                error_text
            ));
        }
        if !status.is_success() {
            return Err(api_error(response, "writing file").await);
        }

        let put_response: PutContentsResponse = response
            .json()
            .await
            .context("Failed to parse file contents update response")?;

        info!(
            "Committed {} to {} ({})",
            commit.path, commit.branch, put_response.commit.sha
        );
        Ok(CommitRef {
            sha: put_response.commit.sha,
        })
    }
}

#[async_trait]
impl RepositoryHost for GitHubClient {
    async fn read_file(
        &self,
        correlation_id: Option<&str>,
        path: &str,
        git_ref: &str,
    ) -> Result<Option<RemoteFile>> {
        let mut url = self.repo_url(&["contents", path])?;
        url.query_pairs_mut().append_pair("ref", git_ref);

        info!("Fetching file contents: {} at {}", path, git_ref);

        let response = self
            .request(Method::GET, url, correlation_id)
            .send()
            .await
            .context("Failed to send file contents request")?;

        if response.status() == StatusCode::NOT_FOUND {
            info!("File {} does not exist at {}", path, git_ref);
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(api_error(response, "fetching file").await);
        }

        let file_response: FileContentsResponse = response
            .json()
            .await
            .context("Failed to parse file contents response")?;

        match file_response.encoding.as_deref() {
            Some("base64") => {}
            other => {
                return Err(anyhow!(
                    "File {} is not available inline (encoding: {}); it may be too large for the contents API",
                    file_response.path,
                    other.unwrap_or("missing")
                ))
            }
        }

        let decoded = general_purpose::STANDARD
            .decode(file_response.content.replace('\n', ""))
            .context("Failed to decode base64 file content")?;
        let content = String::from_utf8(decoded).context("File content is not valid UTF-8")?;

        info!(
            "Successfully fetched file contents ({} bytes, sha {})",
            content.len(),
            file_response.sha
        );

        Ok(Some(RemoteFile {
            path: file_response.path,
            content,
            sha: file_response.sha,
        }))
    }

    async fn create_branch(
        &self,
        correlation_id: Option<&str>,
        name: &str,
        from_branch: &str,
    ) -> Result<BranchRef> {
        let base_sha = self.get_branch_head(correlation_id, from_branch).await?;
        let url = self.repo_url(&["git", "refs"])?;
        let request_body = CreateRefRequest {
            ref_name: format!("refs/heads/{}", name),
            sha: &base_sha,
        };

        info!("Creating branch {} from {} ({})", name, from_branch, base_sha);

        let response = self
            .json_request(Method::POST, url, correlation_id, &request_body)?
            .send()
            .await
            .context("Failed to send create ref request")?;

        let status = response.status();
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let error_text = response.text().await.unwrap_or_default();
            error!("Branch {} could not be created: {}", name, error_text);
            return Err(anyhow!(
                "Branch {} could not be created (it probably exists already): {} - {}",
                name,
                status,
                error_text
            ));
        }
        if !status.is_success() {
            return Err(api_error(response, "creating branch").await);
        }

        Ok(BranchRef {
            name: name.to_string(),
            sha: base_sha,
        })
    }

    async fn create_file(
        &self,
        correlation_id: Option<&str>,
        commit: &FileCommit,
    ) -> Result<CommitRef> {
        self.put_contents(correlation_id, commit, None).await
    }

    async fn update_file(
        &self,
        correlation_id: Option<&str>,
        commit: &FileCommit,
        sha: &str,
    ) -> Result<CommitRef> {
        self.put_contents(correlation_id, commit, Some(sha)).await
    }

    async fn create_pull_request(
        &self,
        correlation_id: Option<&str>,
        draft: &PullRequestDraft,
    ) -> Result<OpenedPullRequest> {
        let url = self.repo_url(&["pulls"])?;
        let request_body = CreatePullRequest {
            title: &draft.title,
            body: &draft.body,
            head: &draft.head,
            base: &draft.base,
        };

        info!(
            "Opening pull request {} -> {} in {}",
            draft.head, draft.base, self.repo
        );

        let response = self
            .json_request(Method::POST, url, correlation_id, &request_body)?
            .send()
            .await
            .context("Failed to send create pull request request")?;

        if !response.status().is_success() {
            return Err(api_error(response, "creating pull request").await);
        }

        let pr: PullRequestResponse = response
            .json()
            .await
            .context("Failed to parse pull request response")?;

        info!("Created PR #{}: {}", pr.number, pr.html_url);
        Ok(OpenedPullRequest {
            number: pr.number,
            html_url: pr.html_url,
        })
    }

    async fn close_issue(&self, correlation_id: Option<&str>, issue_number: u64) -> Result<()> {
        let url = self.repo_url(&["issues", &issue_number.to_string()])?;

        info!("Closing issue #{} in {}", issue_number, self.repo);

        let response = self
            .json_request(
                Method::PATCH,
                url,
                correlation_id,
                &UpdateIssueRequest { state: "closed" },
            )?
            .send()
            .await
            .context("Failed to send close issue request")?;

        if !response.status().is_success() {
            return Err(api_error(response, "closing issue").await);
        }

        Ok(())
    }
}

async fn api_error(response: reqwest::Response, action: &str) -> anyhow::Error {
    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();
    error!("GitHub API error {}: {} - {}", action, status, error_text);
    anyhow!("GitHub API error {}: {} - {}", action, status, error_text)
}

pub fn create_github_client(
    recording_logger: Option<RecordingLogger>,
) -> Result<ClientWithMiddleware> {
    instrumented_client(ServiceType::GitHub, recording_logger)
}
