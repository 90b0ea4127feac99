//! Courses: one directory per course, lessons as Markdown/MDX files

use serde::Serialize;
use std::collections::HashMap;

use super::{ContentError, FrontMatter, MarkdownRenderer};
use crate::github::{strip_markdown_ext, ContentStore, DirEntry};

/// Files that describe their directory rather than being lessons
const INDEX_FILES: [&str; 3] = ["index.md", "index.mdx", "_index.md"];

/// A node of the course tree, mirroring the repository layout
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseFile {
    pub path: String,
    pub name: String,
    /// Raw document for lesson files
    pub content: Option<String>,
    /// Present for directories only
    pub children: Option<Vec<CourseFile>>,
    /// Front matter of the directory's index file
    pub index: Option<FrontMatter>,
}

impl CourseFile {
    pub fn is_dir(&self) -> bool {
        self.children.is_some()
    }

    /// Lesson files below this node, depth first
    pub fn lessons(&self) -> Vec<&CourseFile> {
        let mut out = Vec::new();
        collect_lessons(std::slice::from_ref(self), &mut out);
        out
    }
}

fn collect_lessons<'a>(nodes: &'a [CourseFile], out: &mut Vec<&'a CourseFile>) {
    for node in nodes {
        match &node.children {
            Some(children) => collect_lessons(children, out),
            None if node.content.is_some() => out.push(node),
            None => {}
        }
    }
}

/// Fetch a directory tree: one listing per directory and one read per
/// Markdown/MDX file. Other files are ignored. Failures are logged and
/// leave the affected subtree empty.
pub async fn fetch_tree(store: &dyn ContentStore, path: &str) -> Vec<CourseFile> {
    let mut listings: HashMap<String, Vec<DirEntry>> = HashMap::new();
    let mut contents: HashMap<String, Option<String>> = HashMap::new();
    let mut stack = vec![path.to_string()];

    while let Some(dir) = stack.pop() {
        if listings.contains_key(&dir) {
            continue;
        }

        let entries = match store.list_dir(&dir).await {
            Ok(Some(entries)) => entries,
            Ok(None) => {
                tracing::warn!("Course directory '{}' does not exist", dir);
                Vec::new()
            }
            Err(e) => {
                tracing::error!("Failed to fetch course content at '{}': {}", dir, e);
                Vec::new()
            }
        };

        for entry in &entries {
            if entry.is_dir() {
                stack.push(entry.path.clone());
            } else if entry.is_markdown() {
                let content = match store.read_file(&entry.path).await {
                    Ok(file) => file.map(|f| f.content),
                    Err(e) => {
                        tracing::error!("Failed to fetch lesson {}: {}", entry.path, e);
                        None
                    }
                };
                contents.insert(entry.path.clone(), content);
            }
        }
        listings.insert(dir, entries);
    }

    build_nodes(path, &mut listings, &mut contents)
}

/// Assemble fetched listings into nodes, in listing order
fn build_nodes(
    dir: &str,
    listings: &mut HashMap<String, Vec<DirEntry>>,
    contents: &mut HashMap<String, Option<String>>,
) -> Vec<CourseFile> {
    let entries = listings.remove(dir).unwrap_or_default();
    let mut nodes = Vec::new();

    for entry in entries {
        if entry.is_dir() {
            let children = build_nodes(&entry.path, listings, contents);
            let (index, children) = split_index(children);
            nodes.push(CourseFile {
                path: entry.path,
                name: entry.name,
                content: None,
                children: Some(children),
                index,
            });
        } else if entry.is_markdown() {
            nodes.push(CourseFile {
                content: contents.remove(&entry.path).flatten(),
                path: entry.path,
                name: entry.name,
                children: None,
                index: None,
            });
        }
    }
    nodes
}

/// Pull the index file out of a directory's children
fn split_index(children: Vec<CourseFile>) -> (Option<FrontMatter>, Vec<CourseFile>) {
    let mut index = None;
    let mut rest = Vec::with_capacity(children.len());

    for child in children {
        if !child.is_dir() && INDEX_FILES.contains(&child.name.as_str()) {
            if index.is_none() {
                index = child
                    .content
                    .as_deref()
                    .and_then(|raw| match FrontMatter::parse(raw) {
                        Ok((fm, _)) => Some(fm),
                        Err(e) => {
                            tracing::warn!("Ignoring index metadata in {}: {}", child.path, e);
                            None
                        }
                    });
            }
        } else {
            rest.push(child);
        }
    }
    (index, rest)
}

/// Listing view of a course
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseSummary {
    pub name: String,
    pub title: String,
    pub description: String,
    pub image: String,
    pub lesson_count: usize,
}

impl CourseSummary {
    fn from_node(node: &CourseFile) -> Self {
        let index = node.index.clone().unwrap_or_default();
        Self {
            name: node.name.clone(),
            title: index.title_or(&node.name),
            description: index.description.unwrap_or_default(),
            image: index.image.unwrap_or_default(),
            lesson_count: node.lessons().len(),
        }
    }
}

/// Lesson metadata shown on a course page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LessonSummary {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub date: String,
    pub image: String,
    pub duration: String,
    pub path: String,
}

impl LessonSummary {
    fn from_file(file: &CourseFile, fm: &FrontMatter) -> Self {
        let stem = strip_markdown_ext(&file.name);
        Self {
            slug: lesson_slug(file, fm),
            title: fm.title_or(stem),
            description: fm.description.clone().unwrap_or_default(),
            date: fm.date.clone().unwrap_or_default(),
            image: fm.image.clone().unwrap_or_default(),
            duration: fm.duration.clone().unwrap_or_default(),
            path: file.path.clone(),
        }
    }
}

fn lesson_slug(file: &CourseFile, fm: &FrontMatter) -> String {
    fm.slug
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| strip_markdown_ext(&file.name).to_string())
}

/// A course with its lessons in repository order
#[derive(Debug, Clone, Serialize)]
pub struct Course {
    #[serde(flatten)]
    pub summary: CourseSummary,
    pub lessons: Vec<LessonSummary>,
}

/// A rendered lesson
#[derive(Debug, Clone, Serialize)]
pub struct Lesson {
    pub course: String,
    pub slug: String,
    pub title: String,
    pub front_matter: FrontMatter,
    pub content: String,
    pub source: String,
}

/// Courses under one directory of a content store
pub struct Courses<'a> {
    store: &'a dyn ContentStore,
    renderer: &'a MarkdownRenderer,
    path: &'a str,
}

impl<'a> Courses<'a> {
    pub fn new(store: &'a dyn ContentStore, renderer: &'a MarkdownRenderer, path: &'a str) -> Self {
        Self {
            store,
            renderer,
            path,
        }
    }

    /// The whole course tree
    pub async fn tree(&self) -> Vec<CourseFile> {
        fetch_tree(self.store, self.path).await
    }

    /// Every course directory
    pub async fn list(&self) -> Vec<CourseSummary> {
        self.tree()
            .await
            .iter()
            .filter(|node| node.is_dir())
            .map(CourseSummary::from_node)
            .collect()
    }

    /// A course by directory name
    pub async fn course(&self, name: &str) -> Option<Course> {
        let tree = self.tree().await;
        let node = tree.iter().find(|n| n.is_dir() && n.name == name)?;

        let lessons = node
            .lessons()
            .into_iter()
            .map(|file| {
                let fm = file
                    .content
                    .as_deref()
                    .and_then(|raw| FrontMatter::parse(raw).ok())
                    .map(|(fm, _)| fm)
                    .unwrap_or_default();
                LessonSummary::from_file(file, &fm)
            })
            .collect();

        Some(Course {
            summary: CourseSummary::from_node(node),
            lessons,
        })
    }

    /// A lesson of one course, matched on its `slug` field or file stem
    pub async fn lesson(&self, course: &str, slug: &str) -> Result<Option<Lesson>, ContentError> {
        let tree = self.tree().await;
        let Some(node) = tree.iter().find(|n| n.is_dir() && n.name == course) else {
            return Ok(None);
        };
        self.render_lesson(course, &node.lessons(), slug)
    }

    /// A lesson anywhere in the course tree
    pub async fn find_lesson(&self, slug: &str) -> Result<Option<Lesson>, ContentError> {
        let tree = self.tree().await;
        for node in tree.iter().filter(|n| n.is_dir()) {
            if let Some(lesson) = self.render_lesson(&node.name, &node.lessons(), slug)? {
                return Ok(Some(lesson));
            }
        }
        Ok(None)
    }

    fn render_lesson(
        &self,
        course: &str,
        files: &[&CourseFile],
        slug: &str,
    ) -> Result<Option<Lesson>, ContentError> {
        for file in files {
            let Some(raw) = file.content.as_deref() else {
                continue;
            };
            let stem = strip_markdown_ext(&file.name);
            let parsed = FrontMatter::parse(raw);

            let matches = match &parsed {
                Ok((fm, _)) => lesson_slug(file, fm) == slug,
                Err(_) => stem == slug,
            };
            if !matches {
                continue;
            }

            let (fm, body) = parsed.map_err(|source| ContentError::FrontMatter {
                path: file.path.clone(),
                source,
            })?;
            return Ok(Some(Lesson {
                course: course.to_string(),
                slug: slug.to_string(),
                title: fm.title_or(stem),
                content: self.renderer.render_or_fallback(body),
                front_matter: fm,
                source: file.path.clone(),
            }));
        }
        Ok(None)
    }
}
