//! Content module - posts, courses and the render pipeline

mod blog;
mod course;
mod frontmatter;
mod markdown;
mod post;

use thiserror::Error;

use crate::github::FetchError;

pub use blog::{Blog, TagCount};
pub use course::{
    fetch_tree, Course, CourseFile, CourseSummary, Courses, Lesson, LessonSummary,
};
pub use frontmatter::{yaml_quote, FrontMatter, FrontMatterError};
pub use markdown::{MarkdownRenderer, RenderError, RENDER_FALLBACK};
pub use post::{sort_newest_first, Author, Post, PostSummary};

/// Errors surfaced while loading a single post or lesson
#[derive(Debug, Error)]
pub enum ContentError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to parse front-matter in {path}: {source}")]
    FrontMatter {
        path: String,
        #[source]
        source: FrontMatterError,
    },
}
