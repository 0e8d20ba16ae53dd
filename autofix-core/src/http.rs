use anyhow::{Context, Result};

pub const USER_AGENT: &str = "autofix/0.1.0";

/// Plain HTTP client shared by the GitHub and Gemini adapters.
pub fn build_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to create HTTP client")
}
