//! GitHub mirror
//!
//! Implements `RemoteMirror` over the GitHub REST API: the contents API for
//! reads and single-file updates, the git data API (blobs, trees, commits,
//! refs) for atomic multi-file commits.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::config::RemoteConfig;

use super::error::{RemoteError, RemoteResult};
use super::{Head, RemoteFile, RemoteMirror, TreeEntry};

const USER_AGENT: &str = concat!("pagewatch/", env!("CARGO_PKG_VERSION"));
const API_VERSION: &str = "2022-11-28";

/// Regular (non-executable) file mode in git trees
const FILE_MODE: &str = "100644";

/// Client for a snapshot mirror hosted in a GitHub repository
pub struct GitHubMirror {
    client: Client,
    api_url: String,
    contents: Url,
    owner: String,
    repo: String,
    branch: String,
    token: Option<String>,
}

impl GitHubMirror {
    pub fn new(remote: &RemoteConfig, token: Option<String>) -> RemoteResult<Self> {
        if !remote.is_complete() {
            return Err(RemoteError::NotConfigured(
                "set remote.owner and remote.repo (or GITHUB_OWNER / GITHUB_REPO)".to_string(),
            ));
        }

        let api_url = remote.api_url.trim_end_matches('/').to_string();
        let contents = Url::parse(&format!(
            "{}/repos/{}/{}/contents",
            api_url, remote.owner, remote.repo
        ))
        .map_err(|e| {
            RemoteError::NotConfigured(format!("invalid remote.api_url '{}': {}", api_url, e))
        })?;
        if contents.cannot_be_a_base() {
            return Err(RemoteError::NotConfigured(format!(
                "remote.api_url '{}' is not an http(s) URL",
                api_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(remote.timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            api_url,
            contents,
            owner: remote.owner.clone(),
            repo: remote.repo.clone(),
            branch: remote.branch.clone(),
            token,
        })
    }

    /// Build from config, reading the credential from the environment
    pub fn from_config(remote: &RemoteConfig) -> RemoteResult<Self> {
        Self::new(remote, RemoteConfig::token())
    }

    fn repo_url(&self, tail: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.api_url, self.owner, self.repo, tail)
    }

    /// Contents API URL for a repository path, each segment escaped
    fn contents_url(&self, path: &str) -> RemoteResult<Url> {
        let mut url = self.contents.clone();
        url.path_segments_mut()
            .map_err(|_| {
                RemoteError::NotConfigured(format!(
                    "remote.api_url '{}' cannot hold a path",
                    self.api_url
                ))
            })?
            .extend(path.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        match self.token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, operation: &str, request: RequestBuilder) -> RemoteResult<Response> {
        let response = self.authorized(request).send().await?;
        debug!("{} -> {}", operation, response.status());
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(operation: &str, response: Response) -> RemoteResult<T> {
        let response = check_status(operation, response).await?;
        response
            .json()
            .await
            .map_err(|e| RemoteError::malformed(operation, e))
    }

    async fn fetch_blob(&self, sha: &str) -> RemoteResult<Vec<u8>> {
        let operation = "fetch blob";
        let url = self.repo_url(&format!("git/blobs/{}", sha));
        let response = self.send(operation, self.client.get(&url)).await?;
        let blob: BlobResponse = Self::json(operation, response).await?;
        decode_base64(operation, &blob.content)
    }
}

#[async_trait]
impl RemoteMirror for GitHubMirror {
    fn describe(&self) -> String {
        format!("github:{}/{}@{}", self.owner, self.repo, self.branch)
    }

    async fn fetch(&self, path: &str) -> RemoteResult<Option<RemoteFile>> {
        let operation = "fetch file";
        let url = self.contents_url(path)?;
        let request = self.client.get(url).query(&[("ref", self.branch.as_str())]);
        let response = self.send(operation, request).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let file: ContentsResponse = Self::json(operation, response).await?;

        // Files over 1 MB come back without inline content
        let content = if file.encoding.as_deref() == Some("base64") && !file.content.is_empty() {
            decode_base64(operation, &file.content)?
        } else if file.size == 0 {
            Vec::new()
        } else {
            self.fetch_blob(&file.sha).await?
        };

        Ok(Some(RemoteFile {
            content,
            version: file.sha,
        }))
    }

    async fn head(&self) -> RemoteResult<Head> {
        let operation = "read branch head";
        let url = self.repo_url(&format!("git/ref/heads/{}", self.branch));
        let response = self.send(operation, self.client.get(&url)).await?;
        let reference: RefResponse = Self::json(operation, response).await?;

        let operation = "read head commit";
        let url = self.repo_url(&format!("git/commits/{}", reference.object.sha));
        let response = self.send(operation, self.client.get(&url)).await?;
        let commit: CommitResponse = Self::json(operation, response).await?;

        Ok(Head {
            commit: commit.sha,
            tree: commit.tree.sha,
        })
    }

    async fn create_blob(&self, content: &[u8]) -> RemoteResult<String> {
        let operation = "create blob";
        let body = json!({
            "content": BASE64.encode(content),
            "encoding": "base64",
        });
        let request = self.client.post(self.repo_url("git/blobs")).json(&body);
        let response = self.send(operation, request).await?;
        let created: ShaResponse = Self::json(operation, response).await?;
        Ok(created.sha)
    }

    async fn create_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> RemoteResult<String> {
        let operation = "create tree";
        let body = TreeRequest {
            base_tree,
            tree: entries
                .iter()
                .map(|entry| TreeItem {
                    path: &entry.path,
                    mode: FILE_MODE,
                    kind: "blob",
                    sha: &entry.blob,
                })
                .collect(),
        };
        let request = self.client.post(self.repo_url("git/trees")).json(&body);
        let response = self.send(operation, request).await?;
        let created: ShaResponse = Self::json(operation, response).await?;
        Ok(created.sha)
    }

    async fn create_commit(
        &self,
        message: &str,
        tree: &str,
        parent: &str,
    ) -> RemoteResult<String> {
        let operation = "create commit";
        let body = json!({
            "message": message,
            "tree": tree,
            "parents": [parent],
        });
        let request = self.client.post(self.repo_url("git/commits")).json(&body);
        let response = self.send(operation, request).await?;
        let created: ShaResponse = Self::json(operation, response).await?;
        Ok(created.sha)
    }

    async fn update_ref(&self, commit: &str) -> RemoteResult<()> {
        let operation = "update branch reference";
        let url = self.repo_url(&format!("git/refs/heads/{}", self.branch));
        let body = json!({ "sha": commit, "force": false });
        let response = self.send(operation, self.client.patch(&url).json(&body)).await?;

        // GitHub rejects a non-fast-forward update with 422
        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::conflict(format!(
                "branch '{}' moved: {}",
                self.branch, body
            )));
        }

        check_status(operation, response).await?;
        Ok(())
    }

    async fn put_file(
        &self,
        path: &str,
        content: &[u8],
        version: Option<&str>,
        message: &str,
    ) -> RemoteResult<String> {
        let operation = "replace file";
        let url = self.contents_url(path)?;
        let body = PutFileRequest {
            message,
            content: BASE64.encode(content),
            branch: &self.branch,
            sha: version,
        };
        let response = self.send(operation, self.client.put(url).json(&body)).await?;

        // 409: stale sha. 422: sha missing for an existing file
        if matches!(
            response.status(),
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY
        ) {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::conflict(format!("'{}' changed: {}", path, body)));
        }

        let updated: PutFileResponse = Self::json(operation, response).await?;
        Ok(updated.commit.sha)
    }
}

async fn check_status(operation: &str, response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(RemoteError::Unauthorized {
            status: status.as_u16(),
        });
    }

    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        operation: operation.to_string(),
        status: status.as_u16(),
        body,
    })
}

/// Decode GitHub's line-wrapped base64
fn decode_base64(operation: &str, content: &str) -> RemoteResult<Vec<u8>> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64
        .decode(compact.as_bytes())
        .map_err(|e| RemoteError::malformed(operation, e))
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct BlobResponse {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ShaResponse {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct RefResponse {
    object: ShaResponse,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
    tree: ShaResponse,
}

#[derive(Debug, Deserialize)]
struct PutFileResponse {
    commit: ShaResponse,
}

#[derive(Debug, Serialize)]
struct TreeRequest<'a> {
    base_tree: &'a str,
    tree: Vec<TreeItem<'a>>,
}

#[derive(Debug, Serialize)]
struct TreeItem<'a> {
    path: &'a str,
    mode: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    sha: &'a str,
}

#[derive(Debug, Serialize)]
struct PutFileRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}
