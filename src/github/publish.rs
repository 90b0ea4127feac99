//! Publishing through the git data API: blob, tree, commit, ref update

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{FetchError, GitHubClient};

#[derive(Deserialize)]
struct Sha {
    sha: String,
}

#[derive(Deserialize)]
struct BranchResponse {
    commit: BranchCommit,
}

#[derive(Deserialize)]
struct BranchCommit {
    sha: String,
    commit: CommitDetail,
}

#[derive(Deserialize)]
struct CommitDetail {
    tree: Sha,
}

#[derive(Serialize)]
struct TreeEntry<'a> {
    path: &'a str,
    mode: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    sha: &'a str,
}

/// Head of the publishing branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchHead {
    pub commit_sha: String,
    pub tree_sha: String,
}

impl GitHubClient {
    fn push_token(&self) -> Result<&str> {
        self.config
            .push_token
            .as_deref()
            .ok_or_else(|| anyhow!("GITHUB_PUSH_TOKEN is not configured"))
    }

    async fn git_json<T, B>(&self, method: reqwest::Method, path: &str, body: Option<&B>) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
        B: Serialize + ?Sized,
    {
        let url = format!("{}/{}", self.repo_url(), path);
        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let request = self.authorize(request, Some(self.push_token()?));
        let response = self
            .send(&url, request, false)
            .await?
            .ok_or_else(|| anyhow!("{} returned no content", url))?;
        let parsed = response
            .json::<T>()
            .await
            .map_err(|source| FetchError::Http { url, source })?;
        Ok(parsed)
    }

    /// Latest commit and tree of the configured branch
    pub async fn latest_commit(&self) -> Result<BranchHead> {
        let path = format!("branches/{}", self.config.branch);
        let data: BranchResponse = self
            .git_json(reqwest::Method::GET, &path, None::<&()>)
            .await?;
        Ok(BranchHead {
            commit_sha: data.commit.sha,
            tree_sha: data.commit.commit.tree.sha,
        })
    }

    /// Store file content as a blob
    pub async fn create_blob(&self, content: &str) -> Result<String> {
        let body = json!({ "content": content, "encoding": "utf-8" });
        let data: Sha = self
            .git_json(reqwest::Method::POST, "git/blobs", Some(&body))
            .await?;
        Ok(data.sha)
    }

    /// Create a tree that adds or replaces one regular file on top of `base_tree`
    pub async fn create_tree(&self, base_tree: &str, path: &str, blob_sha: &str) -> Result<String> {
        let body = json!({
            "base_tree": base_tree,
            "tree": [TreeEntry { path, mode: "100644", kind: "blob", sha: blob_sha }],
        });
        let data: Sha = self
            .git_json(reqwest::Method::POST, "git/trees", Some(&body))
            .await?;
        Ok(data.sha)
    }

    /// Create a commit with a single parent
    pub async fn create_commit(&self, parent: &str, tree: &str, message: &str) -> Result<String> {
        let body = json!({ "message": message, "tree": tree, "parents": [parent] });
        let data: Sha = self
            .git_json(reqwest::Method::POST, "git/commits", Some(&body))
            .await?;
        Ok(data.sha)
    }

    /// Move the branch to `commit_sha`
    pub async fn update_ref(&self, commit_sha: &str) -> Result<()> {
        let path = format!("git/refs/heads/{}", self.config.branch);
        let body = json!({ "sha": commit_sha });
        let _: serde_json::Value = self
            .git_json(reqwest::Method::PATCH, &path, Some(&body))
            .await?;
        Ok(())
    }

    /// Create or update one file on the branch, returning the new commit sha
    pub async fn publish_file(&self, path: &str, content: &str, message: &str) -> Result<String> {
        let commit = async {
            let head = self.latest_commit().await?;
            let blob = self.create_blob(content).await?;
            let tree = self.create_tree(&head.tree_sha, path, &blob).await?;
            let commit = self.create_commit(&head.commit_sha, &tree, message).await?;
            self.update_ref(&commit).await?;
            Ok::<_, anyhow::Error>(commit)
        }
        .await
        .with_context(|| format!("Failed to push {} to GitHub", path))?;

        tracing::info!("Successfully pushed {} to GitHub ({})", path, commit);
        Ok(commit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GitHubConfig;

    #[test]
    fn test_tree_entry_shape() {
        let entry = TreeEntry {
            path: "posts/a.mdx",
            mode: "100644",
            kind: "blob",
            sha: "abc",
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "blob");
        assert_eq!(value["mode"], "100644");
    }

    #[test]
    fn test_branch_response_parse() {
        let json = r#"{"name": "main", "commit": {"sha": "c1", "commit": {"tree": {"sha": "t1"}}}}"#;
        let data: BranchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(data.commit.sha, "c1");
        assert_eq!(data.commit.commit.tree.sha, "t1");
    }

    #[tokio::test]
    async fn test_publish_requires_push_token() {
        let config = GitHubConfig {
            owner: "octo".to_string(),
            repo: "content".to_string(),
            ..Default::default()
        };
        let client = GitHubClient::new(&config).unwrap();
        let err = client.create_blob("hello").await.unwrap_err();
        assert!(err.to_string().contains("GITHUB_PUSH_TOKEN"));
    }

    type RequestLog = std::sync::Arc<std::sync::Mutex<Vec<(String, String, serde_json::Value)>>>;

    /// Stand-in for the git data endpoints; records every request it sees
    async fn mock_git(fail_tree: bool) -> (GitHubClient, RequestLog) {
        use axum::extract::State;
        use axum::http::{Method, StatusCode, Uri};
        use axum::response::{IntoResponse, Response};
        use axum::{Json, Router};

        async fn record(
            State((log, fail_tree)): State<(RequestLog, bool)>,
            method: Method,
            uri: Uri,
            body: String,
        ) -> Response {
            let path = uri.path().trim_start_matches("/repos/octo/content/").to_string();
            let body = serde_json::from_str(&body).unwrap_or(serde_json::Value::Null);
            log.lock().unwrap().push((method.to_string(), path.clone(), body));

            match path.as_str() {
                "branches/main" => Json(json!({
                    "name": "main",
                    "commit": {"sha": "c1", "commit": {"tree": {"sha": "t1"}}}
                }))
                .into_response(),
                "git/blobs" => Json(json!({"sha": "b1"})).into_response(),
                "git/trees" if fail_tree => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "tree rejected").into_response()
                }
                "git/trees" => Json(json!({"sha": "t2"})).into_response(),
                "git/commits" => Json(json!({"sha": "c2"})).into_response(),
                "git/refs/heads/main" => Json(json!({"ref": "refs/heads/main"})).into_response(),
                _ => StatusCode::NOT_FOUND.into_response(),
            }
        }

        let log = RequestLog::default();
        let app = Router::new()
            .fallback(record)
            .with_state((log.clone(), fail_tree));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = GitHubConfig {
            api_url: format!("http://{}", addr),
            owner: "octo".to_string(),
            repo: "content".to_string(),
            push_token: Some("push".to_string()),
            ..Default::default()
        };
        (GitHubClient::new(&config).unwrap(), log)
    }

    #[tokio::test]
    async fn test_publish_file_chain() {
        let (client, log) = mock_git(false).await;
        let commit = client
            .publish_file("posts/a.mdx", "---\ntitle: A\n---\n", "Publish a.mdx")
            .await
            .unwrap();
        assert_eq!(commit, "c2");

        let log = log.lock().unwrap();
        let steps: Vec<(&str, &str)> = log.iter().map(|(m, p, _)| (m.as_str(), p.as_str())).collect();
        assert_eq!(
            steps,
            vec![
                ("GET", "branches/main"),
                ("POST", "git/blobs"),
                ("POST", "git/trees"),
                ("POST", "git/commits"),
                ("PATCH", "git/refs/heads/main"),
            ]
        );

        assert_eq!(log[1].2, json!({"content": "---\ntitle: A\n---\n", "encoding": "utf-8"}));
        assert_eq!(
            log[2].2,
            json!({
                "base_tree": "t1",
                "tree": [{"path": "posts/a.mdx", "mode": "100644", "type": "blob", "sha": "b1"}]
            })
        );
        assert_eq!(
            log[3].2,
            json!({"message": "Publish a.mdx", "tree": "t2", "parents": ["c1"]})
        );
        assert_eq!(log[4].2, json!({"sha": "c2"}));
    }

    #[tokio::test]
    async fn test_publish_stops_at_failed_step() {
        let (client, log) = mock_git(true).await;
        let err = client
            .publish_file("posts/a.mdx", "body", "Publish a.mdx")
            .await
            .unwrap_err();

        assert_eq!(
            format!("{:#}", err),
            "Failed to push posts/a.mdx to GitHub: Failed to fetch from GitHub API: HTTP 422"
        );
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 3);
        assert!(log.iter().all(|(_, path, _)| !path.starts_with("git/refs")));
    }
}
