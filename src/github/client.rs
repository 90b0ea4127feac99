//! GitHub contents API client

use async_trait::async_trait;
use base64::Engine;
use chrono::DateTime;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::{ContentStore, DirEntry, FetchError, RemoteFile};
use crate::config::GitHubConfig;

/// Characters escaped inside a single path segment
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

/// Client for one repository and branch
#[derive(Debug, Clone)]
pub struct GitHubClient {
    pub(super) http: Client,
    pub(super) config: GitHubConfig,
}

/// Response of the contents endpoint: a listing for directories, an object for files
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Listing(Vec<DirEntry>),
    File(FilePayload),
}

#[derive(Debug, Deserialize)]
struct FilePayload {
    path: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

/// Core API quota as reported by `/rate_limit`
#[derive(Debug, Clone, Serialize)]
pub struct RateLimit {
    pub limit: u64,
    pub remaining: u64,
    pub reset: String,
}

#[derive(Deserialize)]
struct RateLimitResponse {
    resources: RateLimitResources,
}

#[derive(Deserialize)]
struct RateLimitResources {
    core: RateLimitCore,
}

#[derive(Deserialize)]
struct RateLimitCore {
    limit: u64,
    remaining: u64,
    reset: i64,
}

impl GitHubClient {
    /// Create a client for the configured repository
    pub fn new(config: &GitHubConfig) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(concat!("gitpress/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| FetchError::Http {
                url: config.api_url.clone(),
                source,
            })?;
        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &GitHubConfig {
        &self.config
    }

    /// URL of the contents endpoint for a repository path
    pub fn contents_url(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| utf8_percent_encode(s, SEGMENT).to_string())
            .collect();
        format!(
            "{}/contents/{}?ref={}",
            self.repo_url(),
            encoded.join("/"),
            utf8_percent_encode(&self.config.branch, SEGMENT)
        )
    }

    pub(super) fn repo_url(&self) -> String {
        format!(
            "{}/repos/{}/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.owner,
            self.config.repo
        )
    }

    /// Attach the standard headers and the given token
    pub(super) fn authorize(&self, request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        let request = request.header(ACCEPT, GITHUB_ACCEPT);
        match token {
            Some(token) => request.header(AUTHORIZATION, format!("token {}", token)),
            None => request,
        }
    }

    /// Send a request and turn error statuses into [`FetchError`].
    ///
    /// A 404 yields `Ok(None)` when `optional` is set.
    pub(super) async fn send(
        &self,
        url: &str,
        request: RequestBuilder,
        optional: bool,
    ) -> Result<Option<Response>, FetchError> {
        let response = request.send().await.map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(Some(response));
        }
        if status == StatusCode::NOT_FOUND && optional {
            tracing::debug!("Not found: {}", url);
            return Ok(None);
        }

        let limited = rate_limit_error(status.as_u16(), response.headers());
        let body = response.text().await.unwrap_or_default();
        tracing::error!(
            "GitHub API error for URL: {}. Status: {}. Body: {}",
            url,
            status,
            body
        );
        Err(limited.unwrap_or(FetchError::Status {
            status: status.as_u16(),
            body,
        }))
    }

    async fn get_contents(&self, path: &str) -> Result<Option<ContentsResponse>, FetchError> {
        let url = self.contents_url(path);
        let request = self.authorize(
            self.http.get(&url),
            self.config.fetch_token.as_deref(),
        );
        let Some(response) = self.send(&url, request, true).await? else {
            return Ok(None);
        };
        let parsed = response
            .json::<ContentsResponse>()
            .await
            .map_err(|source| FetchError::Http { url, source })?;
        Ok(Some(parsed))
    }

    /// Query the core API quota
    pub async fn rate_limit(&self) -> Result<RateLimit, FetchError> {
        let url = format!("{}/rate_limit", self.config.api_url.trim_end_matches('/'));
        let request = self.authorize(
            self.http.get(&url),
            self.config.fetch_token.as_deref(),
        );
        let response = self
            .send(&url, request, false)
            .await?
            .ok_or_else(|| FetchError::Status {
                status: 404,
                body: String::new(),
            })?;
        let data: RateLimitResponse = response
            .json()
            .await
            .map_err(|source| FetchError::Http { url, source })?;
        let core = data.resources.core;
        Ok(RateLimit {
            limit: core.limit,
            remaining: core.remaining,
            reset: format_reset(core.reset),
        })
    }

    /// Report the remaining quota at debug level; failures are only logged
    async fn log_rate_limit(&self) {
        if !tracing::enabled!(tracing::Level::DEBUG) {
            return;
        }
        match self.rate_limit().await {
            Ok(limit) => tracing::debug!(
                "GitHub API rate limit: {}/{} remaining, resets at {} UTC",
                limit.remaining,
                limit.limit,
                limit.reset
            ),
            Err(e) => tracing::debug!("Could not read GitHub API rate limit: {}", e),
        }
    }
}

#[async_trait]
impl ContentStore for GitHubClient {
    async fn list_dir(&self, path: &str) -> Result<Option<Vec<DirEntry>>, FetchError> {
        match self.get_contents(path).await? {
            None => Ok(None),
            Some(ContentsResponse::Listing(entries)) => {
                self.log_rate_limit().await;
                Ok(Some(entries))
            }
            Some(ContentsResponse::File(_)) => {
                tracing::warn!("Expected a directory at {}, found a file", path);
                Ok(Some(Vec::new()))
            }
        }
    }

    async fn read_file(&self, path: &str) -> Result<Option<RemoteFile>, FetchError> {
        match self.get_contents(path).await? {
            None => Ok(None),
            Some(ContentsResponse::Listing(_)) => {
                tracing::warn!("Expected a file at {}, found a directory", path);
                Ok(None)
            }
            Some(ContentsResponse::File(file)) => {
                let Some(encoded) = file.content else {
                    tracing::warn!("Could not fetch content for {}", file.path);
                    return Ok(None);
                };
                if let Some(encoding) = file.encoding.as_deref() {
                    if encoding != "base64" {
                        return Err(FetchError::Decode {
                            path: file.path,
                            reason: format!("unsupported encoding {}", encoding),
                        });
                    }
                }
                let content = decode_content(&file.path, &encoded)?;
                Ok(Some(RemoteFile {
                    path: file.path,
                    content,
                }))
            }
        }
    }
}

/// Decode a base64 file body as returned by the contents API (wrapped at 60 columns)
pub fn decode_content(path: &str, encoded: &str) -> Result<String, FetchError> {
    let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| FetchError::Decode {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
    String::from_utf8(bytes).map_err(|e| FetchError::Decode {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

/// Detect an exhausted quota from a failed response
fn rate_limit_error(status: u16, headers: &HeaderMap) -> Option<FetchError> {
    let remaining = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok());
    if !matches!(status, 403 | 429) || remaining != Some("0") {
        return None;
    }
    let reset = headers
        .get("x-ratelimit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0);
    Some(FetchError::RateLimited {
        reset: format_reset(reset),
    })
}

fn format_reset(epoch_secs: i64) -> String {
    DateTime::from_timestamp(epoch_secs, 0)
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "an unknown time".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn client() -> GitHubClient {
        let config = GitHubConfig {
            owner: "octo".to_string(),
            repo: "content".to_string(),
            branch: "main".to_string(),
            ..Default::default()
        };
        GitHubClient::new(&config).unwrap()
    }

    #[test]
    fn test_contents_url() {
        let c = client();
        assert_eq!(
            c.contents_url("posts/hello world.mdx"),
            "https://api.github.com/repos/octo/content/contents/posts/hello%20world.mdx?ref=main"
        );
        assert_eq!(
            c.contents_url("/courses/"),
            "https://api.github.com/repos/octo/content/contents/courses?ref=main"
        );
    }

    #[test]
    fn test_decode_wrapped_base64() {
        // "---\ntitle: Hi\n---\nBody" split over lines like the API does
        let encoded = "LS0tCnRpdGxlOiBIaQot\nLS0KQm9keQ==\n";
        let decoded = decode_content("posts/hi.md", encoded).unwrap();
        assert_eq!(decoded, "---\ntitle: Hi\n---\nBody");
    }

    #[test]
    fn test_decode_invalid_base64() {
        let err = decode_content("posts/bad.md", "!!!").unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[test]
    fn test_rate_limit_detection() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("0"));

        let err = rate_limit_error(403, &headers).unwrap();
        assert_eq!(
            err.to_string(),
            "GitHub API rate limit exceeded. Resets at 00:00:00 UTC. Try again later."
        );

        // Plain 403 without an exhausted quota is not a rate limit
        let mut other = HeaderMap::new();
        other.insert("x-ratelimit-remaining", HeaderValue::from_static("42"));
        assert!(rate_limit_error(403, &other).is_none());
        assert!(rate_limit_error(500, &headers).is_none());
    }

    #[test]
    fn test_contents_response_shapes() {
        let file: ContentsResponse = serde_json::from_str(
            r#"{"type": "file", "name": "a.md", "path": "posts/a.md", "encoding": "base64", "content": "SGk="}"#,
        )
        .unwrap();
        assert!(matches!(file, ContentsResponse::File(_)));

        let listing: ContentsResponse =
            serde_json::from_str(r#"[{"type": "dir", "name": "x", "path": "posts/x"}]"#).unwrap();
        assert!(matches!(listing, ContentsResponse::Listing(ref v) if v.len() == 1));
    }

    /// Minimal stand-in for the contents and rate-limit endpoints
    async fn mock_api() -> String {
        use axum::extract::Path;
        use axum::http::StatusCode;
        use axum::response::IntoResponse;
        use axum::routing::get;
        use axum::{Json, Router};
        use serde_json::json;

        async fn contents(Path(path): Path<String>) -> axum::response::Response {
            match path.as_str() {
                "posts" => Json(json!([
                    {"type": "file", "name": "a.md", "path": "posts/a.md"},
                    {"type": "dir", "name": "drafts", "path": "posts/drafts"},
                    {"type": "symlink", "name": "link", "path": "posts/link"}
                ]))
                .into_response(),
                "posts/a.md" => Json(json!({
                    "type": "file",
                    "name": "a.md",
                    "path": "posts/a.md",
                    "encoding": "base64",
                    "content": "LS0tCnRpdGxlOiBIaQot\nLS0KQm9keQ==\n"
                }))
                .into_response(),
                "limited" => (
                    StatusCode::FORBIDDEN,
                    [("x-ratelimit-remaining", "0"), ("x-ratelimit-reset", "3600")],
                    "API rate limit exceeded",
                )
                    .into_response(),
                "boom" => (StatusCode::BAD_GATEWAY, "upstream").into_response(),
                _ => (StatusCode::NOT_FOUND, Json(json!({"message": "Not Found"}))).into_response(),
            }
        }

        async fn rate_limit() -> Json<serde_json::Value> {
            Json(json!({
                "resources": {"core": {"limit": 5000, "remaining": 4999, "reset": 0}}
            }))
        }

        let app = Router::new()
            .route("/repos/octo/content/contents/*path", get(contents))
            .route("/rate_limit", get(rate_limit));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn mock_client() -> GitHubClient {
        let config = GitHubConfig {
            api_url: mock_api().await,
            owner: "octo".to_string(),
            repo: "content".to_string(),
            fetch_token: Some("t0ken".to_string()),
            ..Default::default()
        };
        GitHubClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_list_and_read_over_http() {
        let c = mock_client().await;

        let entries = c.list_dir("posts").await.unwrap().unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].is_markdown());
        assert!(entries[1].is_dir());
        assert_eq!(entries[2].kind, super::super::EntryKind::Other);

        let file = c.read_file("posts/a.md").await.unwrap().unwrap();
        assert_eq!(file.content, "---\ntitle: Hi\n---\nBody");

        // A directory where a file was expected reads as missing
        assert!(c.read_file("posts").await.unwrap().is_none());
        assert!(c.read_file("posts/missing.md").await.unwrap().is_none());
        assert!(c.list_dir("nowhere").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_http_errors() {
        let c = mock_client().await;
        assert!(matches!(
            c.read_file("limited").await,
            Err(FetchError::RateLimited { .. })
        ));
        assert!(matches!(
            c.list_dir("boom").await,
            Err(FetchError::Status { status: 502, .. })
        ));
    }

    #[tokio::test]
    async fn test_rate_limit_endpoint() {
        let c = mock_client().await;
        let limit = c.rate_limit().await.unwrap();
        assert_eq!(limit.limit, 5000);
        assert_eq!(limit.remaining, 4999);
        assert_eq!(limit.reset, "00:00:00");
    }

    #[tokio::test]
    async fn test_listing_reports_rate_limit_when_debugging() {
        use axum::extract::State;
        use axum::http::StatusCode;
        use axum::routing::get;
        use axum::{Json, Router};
        use serde_json::json;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        async fn listing() -> Json<serde_json::Value> {
            Json(json!([{"type": "file", "name": "a.md", "path": "posts/a.md"}]))
        }

        async fn quota(State(hits): State<Arc<AtomicUsize>>) -> StatusCode {
            hits.fetch_add(1, Ordering::SeqCst);
            StatusCode::INTERNAL_SERVER_ERROR
        }

        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/repos/octo/content/contents/*path", get(listing))
            .route("/rate_limit", get(quota))
            .with_state(hits.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = GitHubConfig {
            api_url: format!("http://{}", addr),
            owner: "octo".to_string(),
            repo: "content".to_string(),
            ..Default::default()
        };
        let c = GitHubClient::new(&config).unwrap();

        // Quiet by default: no extra request
        assert_eq!(c.list_dir("posts").await.unwrap().unwrap().len(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        // A failing quota lookup does not fail the listing
        assert_eq!(c.list_dir("posts").await.unwrap().unwrap().len(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
