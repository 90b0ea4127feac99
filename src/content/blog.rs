//! Blog posts read from the content repository

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;

use super::post::sort_newest_first;
use super::{ContentError, FrontMatter, MarkdownRenderer, Post, PostSummary};
use crate::github::{join_path, strip_markdown_ext, ContentStore, DirEntry};

/// Post files fetched at the same time while building a listing
const MAX_CONCURRENT_FETCHES: usize = 10;

/// A tag and the number of posts carrying it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub name: String,
    pub count: usize,
}

/// Posts under one directory of a content store
pub struct Blog<'a> {
    store: &'a dyn ContentStore,
    renderer: &'a MarkdownRenderer,
    path: &'a str,
    default_author: &'a str,
}

impl<'a> Blog<'a> {
    pub fn new(
        store: &'a dyn ContentStore,
        renderer: &'a MarkdownRenderer,
        path: &'a str,
        default_author: &'a str,
    ) -> Self {
        Self {
            store,
            renderer,
            path,
            default_author,
        }
    }

    /// All readable posts, newest first
    ///
    /// Files that cannot be fetched or whose front matter is broken are
    /// logged and left out. A failed directory listing yields no posts.
    pub async fn list_posts(&self) -> Vec<PostSummary> {
        let entries = match self.store.list_dir(self.path).await {
            Ok(Some(entries)) => entries,
            Ok(None) => {
                tracing::warn!("Blog directory '{}' does not exist", self.path);
                return Vec::new();
            }
            Err(e) => {
                tracing::error!("Failed to list blog directory '{}': {}", self.path, e);
                return Vec::new();
            }
        };

        let fetches: Vec<_> = entries
            .iter()
            .filter(|e| e.is_markdown())
            .map(|entry| self.summary(entry))
            .collect();
        let mut posts: Vec<PostSummary> = stream::iter(fetches)
            .buffer_unordered(MAX_CONCURRENT_FETCHES)
            .filter_map(|summary| async move { summary })
            .collect()
            .await;
        sort_newest_first(&mut posts);
        tracing::debug!("Loaded {} posts from '{}'", posts.len(), self.path);
        posts
    }

    async fn summary(&self, entry: &DirEntry) -> Option<PostSummary> {
        let file = match self.store.read_file(&entry.path).await {
            Ok(Some(file)) => file,
            Ok(None) => return None,
            Err(e) => {
                tracing::error!("Failed to fetch post {}: {}", entry.path, e);
                return None;
            }
        };
        let fm = match FrontMatter::parse(&file.content) {
            Ok((fm, _)) => fm,
            Err(e) => {
                tracing::error!("Skipping {}: {}", entry.path, e);
                return None;
            }
        };

        let mut summary =
            PostSummary::from_front_matter(strip_markdown_ext(&entry.name), &fm, self.default_author);
        if summary.category.is_empty() {
            summary.category = summary.tags.clone();
        }
        Some(summary)
    }

    /// A single post by slug; `.mdx` wins over `.md`
    pub async fn post(&self, slug: &str) -> Result<Option<Post>, ContentError> {
        if !is_valid_slug(slug) {
            return Ok(None);
        }

        for ext in ["mdx", "md"] {
            let path = join_path(self.path, &format!("{}.{}", slug, ext));
            let Some(file) = self.store.read_file(&path).await? else {
                continue;
            };

            let (fm, body) =
                FrontMatter::parse(&file.content).map_err(|source| ContentError::FrontMatter {
                    path: path.clone(),
                    source,
                })?;
            let content = self.renderer.render_or_fallback(body);

            return Ok(Some(Post {
                meta: PostSummary::from_front_matter(slug, &fm, self.default_author),
                content,
                raw: file.content.clone(),
                source: path,
            }));
        }

        tracing::debug!("No post named '{}' under '{}'", slug, self.path);
        Ok(None)
    }

    /// Posts carrying `tag`, compared case-insensitively
    pub async fn posts_by_tag(&self, tag: &str) -> Vec<PostSummary> {
        self.list_posts()
            .await
            .into_iter()
            .filter(|p| p.has_tag(tag))
            .collect()
    }

    /// Distinct lower-cased tags, most used first
    pub async fn tags(&self) -> Vec<TagCount> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for post in self.list_posts().await {
            for tag in &post.tags {
                *counts.entry(tag.to_lowercase()).or_default() += 1;
            }
        }

        let mut tags: Vec<TagCount> = counts
            .into_iter()
            .map(|(name, count)| TagCount { name, count })
            .collect();
        tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        tags
    }
}

/// Slugs address a single file directly under the blog directory
fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty() && !slug.starts_with('.') && !slug.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::LocalStore;
    use std::fs;
    use tempfile::TempDir;

    fn fixture(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (path, content) in files {
            let target = dir.path().join(path);
            fs::create_dir_all(target.parent().unwrap()).unwrap();
            fs::write(target, content).unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn test_list_posts_sorted_with_defaults() {
        let dir = fixture(&[
            ("posts/old.md", "---\ntitle: Old\ndate: 2023-01-01\ntags: [rust]\n---\nold"),
            ("posts/new.mdx", "---\ntitle: New\ndate: 2024-06-01\nauthor: Jane\n---\nnew"),
            ("posts/bare.md", "no front matter here"),
            ("posts/notes.txt", "ignored"),
        ]);
        let store = LocalStore::new(dir.path());
        let renderer = MarkdownRenderer::new();
        let blog = Blog::new(&store, &renderer, "posts", "Aryan");

        let posts = blog.list_posts().await;
        let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old", "bare"]);

        assert_eq!(posts[0].author, "Jane");
        assert_eq!(posts[2].title, "No Title");
        assert_eq!(posts[2].author, "Aryan");
        // Listings fall back to tags for the category
        assert_eq!(posts[1].category, vec!["rust".to_string()]);
    }

    #[tokio::test]
    async fn test_broken_front_matter_is_skipped_in_listing() {
        let dir = fixture(&[
            ("posts/good.md", "---\ntitle: Good\n---\nok"),
            ("posts/bad.md", "---\ntitle: [unclosed\n---\nbody"),
        ]);
        let store = LocalStore::new(dir.path());
        let renderer = MarkdownRenderer::new();
        let blog = Blog::new(&store, &renderer, "posts", "Aryan");

        let posts = blog.list_posts().await;
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, "good");

        assert!(matches!(
            blog.post("bad").await,
            Err(ContentError::FrontMatter { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_directory_lists_nothing() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        let renderer = MarkdownRenderer::new();
        let blog = Blog::new(&store, &renderer, "posts", "Aryan");
        assert!(blog.list_posts().await.is_empty());
        assert!(blog.tags().await.is_empty());
    }

    #[tokio::test]
    async fn test_post_prefers_mdx() {
        let dir = fixture(&[
            ("posts/hello.md", "---\ntitle: From MD\n---\nmd body"),
            ("posts/hello.mdx", "---\ntitle: From MDX\n---\n# Heading"),
        ]);
        let store = LocalStore::new(dir.path());
        let renderer = MarkdownRenderer::new();
        let blog = Blog::new(&store, &renderer, "posts", "Aryan");

        let post = blog.post("hello").await.unwrap().unwrap();
        assert_eq!(post.meta.title, "From MDX");
        assert_eq!(post.source, "posts/hello.mdx");
        assert!(post.content.contains("<h1>Heading</h1>"));
        assert!(post.raw.starts_with("---"));
    }

    #[tokio::test]
    async fn test_post_not_found() {
        let dir = fixture(&[("posts/a.md", "a")]);
        let store = LocalStore::new(dir.path());
        let renderer = MarkdownRenderer::new();
        let blog = Blog::new(&store, &renderer, "posts", "Aryan");

        assert!(blog.post("missing").await.unwrap().is_none());
        assert!(blog.post("../secret").await.unwrap().is_none());
        assert!(blog.post("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_render_failure_stays_inside_post() {
        let dir = fixture(&[("posts/x.mdx", "---\ntitle: X\n---\n<Callout>\n\nunclosed")]);
        let store = LocalStore::new(dir.path());
        let renderer = MarkdownRenderer::new();
        let blog = Blog::new(&store, &renderer, "posts", "Aryan");

        let post = blog.post("x").await.unwrap().unwrap();
        assert_eq!(post.meta.title, "X");
        assert!(post.content.contains(crate::content::RENDER_FALLBACK));
    }

    #[tokio::test]
    async fn test_tags() {
        let dir = fixture(&[
            ("posts/a.md", "---\ntags: [Rust, web]\ndate: 2024-01-01\n---\n"),
            ("posts/b.md", "---\ntags: rust\ndate: 2024-01-02\n---\n"),
        ]);
        let store = LocalStore::new(dir.path());
        let renderer = MarkdownRenderer::new();
        let blog = Blog::new(&store, &renderer, "posts", "Aryan");

        let tags = blog.tags().await;
        assert_eq!(
            tags,
            vec![
                TagCount { name: "rust".to_string(), count: 2 },
                TagCount { name: "web".to_string(), count: 1 },
            ]
        );

        let tagged = blog.posts_by_tag("RUST").await;
        let ids: Vec<&str> = tagged.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_non_ascii_tag_links_back_to_its_posts() {
        let dir = fixture(&[("posts/a.md", "---\ntags: [Ärger]\n---\n")]);
        let store = LocalStore::new(dir.path());
        let renderer = MarkdownRenderer::new();
        let blog = Blog::new(&store, &renderer, "posts", "Aryan");

        let tags = blog.tags().await;
        assert_eq!(tags[0].name, "ärger");
        assert_eq!(blog.posts_by_tag(&tags[0].name).await.len(), 1);
    }
}
