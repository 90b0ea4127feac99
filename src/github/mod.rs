//! Remote content store
//!
//! Content lives in a GitHub repository. [`GitHubClient`] reads it over the
//! contents API and can publish new files through the git data API;
//! [`LocalStore`] serves the same layout from a local checkout.

mod client;
mod local;
mod publish;

pub use client::{decode_content, GitHubClient, RateLimit};
pub use local::LocalStore;
pub use publish::BranchHead;

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while talking to the content store
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("GitHub API rate limit exceeded. Resets at {reset} UTC. Try again later.")]
    RateLimited { reset: String },

    #[error("Failed to fetch from GitHub API: HTTP {status}")]
    Status { status: u16, body: String },

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not decode {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Kind of a directory entry as reported by the contents API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    #[serde(other)]
    Other,
}

/// One item of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }

    /// A regular `.md` or `.mdx` file
    pub fn is_markdown(&self) -> bool {
        self.kind == EntryKind::File && is_markdown_name(&self.name)
    }
}

/// A decoded file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub path: String,
    pub content: String,
}

/// Read access to a content repository.
///
/// `Ok(None)` means the path does not exist; every other failure is an error.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn list_dir(&self, path: &str) -> Result<Option<Vec<DirEntry>>, FetchError>;

    async fn read_file(&self, path: &str) -> Result<Option<RemoteFile>, FetchError>;
}

#[async_trait]
impl<T: ContentStore + ?Sized> ContentStore for Arc<T> {
    async fn list_dir(&self, path: &str) -> Result<Option<Vec<DirEntry>>, FetchError> {
        (**self).list_dir(path).await
    }

    async fn read_file(&self, path: &str) -> Result<Option<RemoteFile>, FetchError> {
        (**self).read_file(path).await
    }
}

/// Whether a file name carries a Markdown or MDX extension
pub fn is_markdown_name(name: &str) -> bool {
    name.ends_with(".md") || name.ends_with(".mdx")
}

/// File name without its `.md`/`.mdx` extension
pub fn strip_markdown_ext(name: &str) -> &str {
    name.strip_suffix(".mdx")
        .or_else(|| name.strip_suffix(".md"))
        .unwrap_or(name)
}

/// Join repository path segments with `/`, skipping empty ones
pub fn join_path(base: &str, name: &str) -> String {
    let base = base.trim_matches('/');
    let name = name.trim_matches('/');
    match (base.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{}/{}", base, name),
    }
}
