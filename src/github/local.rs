//! Content store backed by a local checkout of the content repository

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

use super::{join_path, ContentStore, DirEntry, EntryKind, FetchError, RemoteFile};

/// Serves repository paths from a directory on disk
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a repository path below the root; paths escaping it resolve to nothing
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path.trim_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }

    /// Write a file, creating parent directories
    pub async fn write_file(&self, path: &str, content: &str) -> Result<(), FetchError> {
        let target = self.resolve(path).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("path escapes content root: {}", path),
            )
        })?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, content).await?;
        tracing::info!("Wrote {:?}", target);
        Ok(())
    }
}

#[async_trait]
impl ContentStore for LocalStore {
    async fn list_dir(&self, path: &str) -> Result<Option<Vec<DirEntry>>, FetchError> {
        let Some(dir) = self.resolve(path) else {
            return Ok(None);
        };
        let metadata = match fs::metadata(&dir).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_dir() {
            return Ok(Some(Vec::new()));
        }

        let mut entries = Vec::new();
        let mut reader = fs::read_dir(&dir).await?;
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let file_type = entry.file_type().await?;
            let kind = if file_type.is_dir() {
                EntryKind::Dir
            } else if file_type.is_file() {
                EntryKind::File
            } else {
                EntryKind::Other
            };
            entries.push(DirEntry {
                path: join_path(path, &name),
                name,
                kind,
            });
        }
        // The contents API lists entries by name
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Some(entries))
    }

    async fn read_file(&self, path: &str) -> Result<Option<RemoteFile>, FetchError> {
        let Some(file) = self.resolve(path) else {
            return Ok(None);
        };
        match fs::read_to_string(&file).await {
            Ok(content) => Ok(Some(RemoteFile {
                path: path.trim_matches('/').to_string(),
                content,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) if file.is_dir() => {
                tracing::warn!("Expected a file at {}, found a directory ({})", path, e);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
