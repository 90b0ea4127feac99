//! Site configuration (gitpress.yml + environment)

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub description: String,
    /// Author used when a post does not name one
    pub default_author: String,
    /// Public base URL, used for absolute links and OAuth redirects
    pub base_url: String,

    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub highlight: HighlightConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "gitpress".to_string(),
            description: "Posts and courses served from GitHub".to_string(),
            default_author: "Aryan".to_string(),
            base_url: "http://localhost:3000".to_string(),
            github: GitHubConfig::default(),
            cache: CacheConfig::default(),
            highlight: HighlightConfig::default(),
            auth: AuthConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: SiteConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load the file if it exists, then apply process environment overrides
    pub fn resolve<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            tracing::debug!("Loading configuration from {:?}", path);
            Self::load(path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override fields from environment variables
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GITHUB_REPO_OWNER") {
            self.github.owner = v;
        }
        if let Some(v) = get("GITHUB_REPO_NAME") {
            self.github.repo = v;
        }
        if let Some(v) = get("GITHUB_BRANCH") {
            self.github.branch = v;
        }
        if let Some(v) = get("GITHUB_BLOG_PATH") {
            self.github.blog_path = v;
        }
        if let Some(v) = get("GITHUB_COURSE_PATH") {
            self.github.course_path = v;
        }
        if let Some(v) = get("GITHUB_PUSH_TOKEN") {
            self.github.push_token = Some(v);
        }
        if let Some(v) = get("GITHUB_FETCH_TOKEN").or_else(|| get("GITHUB_PAT")) {
            self.github.fetch_token = Some(v);
        }
        if self.github.fetch_token.is_none() {
            self.github.fetch_token = self.github.push_token.clone();
        }
        if let Some(v) = get("BLOG_REVALIDATE_SECONDS") {
            match v.parse() {
                Ok(secs) => self.cache.revalidate_seconds = secs,
                Err(_) => tracing::warn!("Ignoring invalid BLOG_REVALIDATE_SECONDS: {}", v),
            }
        }
        if let Some(v) = get("BASE_URL") {
            self.base_url = v;
        }
        if let (Some(id), Some(secret)) = (get("AUTH_GITHUB_ID"), get("AUTH_GITHUB_SECRET")) {
            self.auth.github = Some(OAuthCredentials {
                client_id: id,
                client_secret: secret,
            });
        }
        if let (Some(id), Some(secret)) = (get("AUTH_GOOGLE_ID"), get("AUTH_GOOGLE_SECRET")) {
            self.auth.google = Some(OAuthCredentials {
                client_id: id,
                client_secret: secret,
            });
        }
        if let Some(v) = get("AUTH_EDITORS") {
            self.auth.editors = v
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect();
        }
    }
}

/// Remote content repository
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub api_url: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub blog_path: String,
    pub course_path: String,
    #[serde(skip_serializing)]
    pub fetch_token: Option<String>,
    #[serde(skip_serializing)]
    pub push_token: Option<String>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            owner: String::new(),
            repo: String::new(),
            branch: "main".to_string(),
            blog_path: "posts".to_string(),
            course_path: "courses".to_string(),
            fetch_token: None,
            push_token: None,
        }
    }
}

impl GitHubConfig {
    /// Check that the repository coordinates are present
    pub fn validate(&self) -> Result<()> {
        if self.owner.trim().is_empty() || self.repo.trim().is_empty() {
            bail!("GitHub repository is not configured: set GITHUB_REPO_OWNER and GITHUB_REPO_NAME");
        }
        if self.fetch_token.is_none() {
            tracing::warn!(
                "GITHUB_FETCH_TOKEN or GITHUB_PAT not set. Using unauthenticated GitHub API requests, which have very low rate limits."
            );
        }
        Ok(())
    }
}

/// Remote content caching
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Revalidation window in seconds; 0 disables caching
    pub revalidate_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            revalidate_seconds: 3600,
        }
    }
}

/// Code highlighting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub theme: String,
    pub line_number: bool,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            theme: "base16-ocean.dark".to_string(),
            line_number: false,
        }
    }
}

/// Sign-in providers and sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub github: Option<OAuthCredentials>,
    pub google: Option<OAuthCredentials>,
    pub session_ttl_days: i64,
    /// GitHub logins or email addresses allowed to publish; empty means nobody
    pub editors: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            github: None,
            google: None,
            session_ttl_days: 30,
            editors: Vec::new(),
        }
    }
}

impl AuthConfig {
    /// Whether an account with this login or email may use the editor
    pub fn is_editor(&self, login: Option<&str>, email: Option<&str>) -> bool {
        let matches = |id: Option<&str>| {
            id.map(str::trim)
                .filter(|id| !id.is_empty())
                .is_some_and(|id| self.editors.iter().any(|e| e.trim().eq_ignore_ascii_case(id)))
        };
        matches(login) || matches(email)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthCredentials {
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
}

/// HTTP listener
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub ip: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: "localhost".to_string(),
            port: 3000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = SiteConfig::default();
        assert_eq!(config.default_author, "Aryan");
        assert_eq!(config.github.branch, "main");
        assert_eq!(config.github.blog_path, "posts");
        assert_eq!(config.cache.revalidate_seconds, 3600);
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
title: My Blog
default_author: Test User
github:
  owner: octo
  repo: content
  blog_path: blog
cache:
  revalidate_seconds: 60
"#;
        let config: SiteConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.title, "My Blog");
        assert_eq!(config.default_author, "Test User");
        assert_eq!(config.github.owner, "octo");
        assert_eq!(config.github.blog_path, "blog");
        assert_eq!(config.github.branch, "main");
        assert_eq!(config.cache.revalidate_seconds, 60);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("GITHUB_REPO_OWNER", "someone"),
            ("GITHUB_REPO_NAME", "site"),
            ("GITHUB_PAT", "pat-token"),
            ("BLOG_REVALIDATE_SECONDS", "120"),
            ("AUTH_GITHUB_ID", "id"),
            ("AUTH_GITHUB_SECRET", "secret"),
            ("AUTH_GOOGLE_ID", "only-id"),
        ]
        .into_iter()
        .collect();

        let mut config = SiteConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.github.owner, "someone");
        assert_eq!(config.github.repo, "site");
        assert_eq!(config.github.fetch_token.as_deref(), Some("pat-token"));
        assert_eq!(config.cache.revalidate_seconds, 120);
        assert!(config.auth.github.is_some());
        // Google needs both id and secret
        assert!(config.auth.google.is_none());
        assert!(config.github.validate().is_ok());
    }

    #[test]
    fn test_fetch_token_falls_back_to_push_token() {
        let mut config = SiteConfig::default();
        config.apply_env(|k| (k == "GITHUB_PUSH_TOKEN").then(|| "push".to_string()));
        assert_eq!(config.github.fetch_token.as_deref(), Some("push"));
        assert_eq!(config.github.push_token.as_deref(), Some("push"));
    }

    #[test]
    fn test_editors_allowlist() {
        let mut config = SiteConfig::default();
        assert!(!config.auth.is_editor(Some("octocat"), None));

        config.apply_env(|k| (k == "AUTH_EDITORS").then(|| " octocat, Ada@Example.com ,".to_string()));
        assert_eq!(config.auth.editors, vec!["octocat", "Ada@Example.com"]);
        assert!(config.auth.is_editor(Some("OctoCat"), None));
        assert!(config.auth.is_editor(None, Some("ada@example.com")));
        assert!(!config.auth.is_editor(Some("mallory"), Some("mallory@example.com")));
        assert!(!config.auth.is_editor(Some(""), None));
    }

    #[test]
    fn test_validate_requires_repo() {
        let config = SiteConfig::default();
        assert!(config.github.validate().is_err());
    }
}
