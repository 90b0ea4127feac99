//! gitpress: a blog and course site served from a GitHub repository
//!
//! Posts and lessons live as Markdown/MDX files in a content repository.
//! They are fetched through the GitHub contents API (or read from a local
//! checkout), cached with time-based revalidation, rendered to HTML and
//! served by an axum application with OAuth-gated editing.

pub mod auth;
pub mod cache;
pub mod commands;
pub mod config;
pub mod content;
pub mod github;
pub mod helpers;
pub mod server;
pub mod templates;

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use cache::RevalidatingStore;
use config::SiteConfig;
use content::{Blog, Courses, MarkdownRenderer};
use github::{join_path, ContentStore, GitHubClient, LocalStore, RateLimit};

/// Where content is read from and published to
#[derive(Debug, Clone)]
pub enum Backend {
    GitHub(Arc<GitHubClient>),
    Local(LocalStore),
}

/// The application: configuration, cached content store and renderer
pub struct Site {
    pub config: SiteConfig,
    backend: Backend,
    store: RevalidatingStore<Arc<dyn ContentStore>>,
    renderer: MarkdownRenderer,
}

impl Site {
    /// Serve content from the configured GitHub repository
    pub fn github(config: SiteConfig) -> Result<Self> {
        config.github.validate()?;
        let client = Arc::new(GitHubClient::new(&config.github)?);
        tracing::info!(
            "Reading content from {}/{}@{}",
            config.github.owner,
            config.github.repo,
            config.github.branch
        );
        Ok(Self::with_backend(config, Backend::GitHub(client)))
    }

    /// Serve content from a local checkout of the content repository
    pub fn local<P: AsRef<Path>>(config: SiteConfig, root: P) -> Self {
        let store = LocalStore::new(root);
        tracing::info!("Reading content from {:?}", store.root());
        Self::with_backend(config, Backend::Local(store))
    }

    pub fn with_backend(config: SiteConfig, backend: Backend) -> Self {
        let inner: Arc<dyn ContentStore> = match &backend {
            Backend::GitHub(client) => client.clone(),
            Backend::Local(store) => Arc::new(store.clone()),
        };
        let window = Duration::from_secs(config.cache.revalidate_seconds);
        let renderer =
            MarkdownRenderer::with_options(&config.highlight.theme, config.highlight.line_number);

        Self {
            config,
            backend,
            store: RevalidatingStore::new(inner, window),
            renderer,
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn store(&self) -> &RevalidatingStore<Arc<dyn ContentStore>> {
        &self.store
    }

    pub fn renderer(&self) -> &MarkdownRenderer {
        &self.renderer
    }

    pub fn blog(&self) -> Blog<'_> {
        Blog::new(
            &self.store,
            &self.renderer,
            &self.config.github.blog_path,
            &self.config.default_author,
        )
    }

    pub fn courses(&self) -> Courses<'_> {
        Courses::new(&self.store, &self.renderer, &self.config.github.course_path)
    }

    /// Write a post into the blog directory and drop stale cache entries.
    /// Returns the commit SHA, or the written path for a local checkout.
    pub async fn publish_post(&self, file_name: &str, content: &str) -> Result<String> {
        let path = join_path(&self.config.github.blog_path, file_name);
        let message = format!("Publish {}", file_name);

        let reference = match &self.backend {
            Backend::GitHub(client) => client.publish_file(&path, content, &message).await?,
            Backend::Local(store) => {
                store.write_file(&path, content).await?;
                path.clone()
            }
        };

        self.store.invalidate(&path);
        self.store.invalidate(&self.config.github.blog_path);
        tracing::info!("Published {} ({})", path, reference);
        Ok(reference)
    }

    /// API quota of the GitHub backend; a local checkout has none
    pub async fn rate_limit(&self) -> Result<Option<RateLimit>> {
        match &self.backend {
            Backend::GitHub(client) => Ok(Some(client.rate_limit().await?)),
            Backend::Local(_) => Ok(None),
        }
    }
}
