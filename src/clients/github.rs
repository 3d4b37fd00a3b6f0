//! GitHub API client for release and repository-activity polling.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::ClientError;

const GITHUB_API_URL: &str = "https://api.github.com";

/// A published release of a tracked repository.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub html_url: String,
}

/// Tip commit of a repository's master branch.
#[derive(Debug, Clone)]
pub struct BranchHead {
    pub sha: String,
    pub message: String,
}

/// An open pull request on a tracked repository.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub html_url: String,
}

#[derive(Deserialize)]
struct BranchResponse {
    commit: CommitRef,
}

#[derive(Deserialize)]
struct CommitRef {
    sha: String,
    commit: CommitDetail,
}

#[derive(Deserialize)]
struct CommitDetail {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct Branch {
    name: String,
}

/// Repository signals the update and security monitors poll.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GithubSource: Send + Sync {
    /// Releases for `repo` ("owner/name"), newest first.
    async fn releases(&self, repo: &str) -> Result<Vec<Release>, ClientError>;
    /// Tip commit of the repository's master branch.
    async fn master_head(&self, repo: &str) -> Result<BranchHead, ClientError>;
    /// All branch names.
    async fn branches(&self, repo: &str) -> Result<Vec<String>, ClientError>;
    /// Open pull requests.
    async fn pulls(&self, repo: &str) -> Result<Vec<PullRequest>, ClientError>;
}

/// Live client over the GitHub REST API.
pub struct GithubClient {
    client: Client,
    api_url: String,
}

impl GithubClient {
    pub fn new() -> Result<Self, ClientError> {
        Self::with_api_url(GITHUB_API_URL.to_string())
    }

    /// Builds a client against a non-default API base, used in tests.
    pub fn with_api_url(api_url: String) -> Result<Self, ClientError> {
        // GitHub rejects requests that carry no User-Agent.
        let client = Client::builder()
            .user_agent("chainwatch")
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;
        Ok(Self { client, api_url })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, ClientError> {
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ClientError::Api(format!(
                "request to {} failed with status {}",
                url,
                response.status()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }
}

#[async_trait]
impl GithubSource for GithubClient {
    async fn releases(&self, repo: &str) -> Result<Vec<Release>, ClientError> {
        self.get_json(format!("{}/repos/{}/releases", self.api_url, repo))
            .await
    }

    async fn master_head(&self, repo: &str) -> Result<BranchHead, ClientError> {
        let response: BranchResponse = self
            .get_json(format!("{}/repos/{}/branches/master", self.api_url, repo))
            .await?;
        Ok(BranchHead {
            sha: response.commit.sha,
            message: response.commit.commit.message,
        })
    }

    async fn branches(&self, repo: &str) -> Result<Vec<String>, ClientError> {
        let branches: Vec<Branch> = self
            .get_json(format!("{}/repos/{}/branches", self.api_url, repo))
            .await?;
        Ok(branches.into_iter().map(|b| b.name).collect())
    }

    async fn pulls(&self, repo: &str) -> Result<Vec<PullRequest>, ClientError> {
        self.get_json(format!("{}/repos/{}/pulls", self.api_url, repo))
            .await
    }
}
