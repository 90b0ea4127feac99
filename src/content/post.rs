//! Post models

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::FrontMatter;
use crate::helpers::parse_date_string;

/// Post author: a plain name or a name with an avatar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Author {
    Name(String),
    Profile {
        name: String,
        #[serde(default)]
        avatar: Option<String>,
    },
}

impl Author {
    pub fn name(&self) -> &str {
        match self {
            Author::Name(name) => name,
            Author::Profile { name, .. } => name,
        }
    }

    pub fn avatar(&self) -> Option<&str> {
        match self {
            Author::Name(_) => None,
            Author::Profile { avatar, .. } => avatar.as_deref(),
        }
    }
}

/// Listing view of a post: metadata only
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostSummary {
    /// Slug (file name without `.md`/`.mdx`)
    pub id: String,
    pub title: String,
    pub date: String,
    pub author: String,
    pub avatar: Option<String>,
    pub description: String,
    pub image: String,
    pub tags: Vec<String>,
    pub category: Vec<String>,
}

impl PostSummary {
    /// Build from front matter, filling in documented defaults
    pub fn from_front_matter(id: &str, fm: &FrontMatter, default_author: &str) -> Self {
        let (author, avatar) = match &fm.author {
            Some(a) if !a.name().trim().is_empty() => {
                (a.name().to_string(), a.avatar().map(str::to_string))
            }
            _ => (default_author.to_string(), None),
        };
        Self {
            id: id.to_string(),
            title: fm.title_or("No Title"),
            date: fm.date.clone().unwrap_or_default(),
            author,
            avatar,
            description: fm.description.clone().unwrap_or_default(),
            image: fm.image.clone().unwrap_or_default(),
            tags: fm.tags.clone(),
            category: fm.category.clone(),
        }
    }

    /// Parsed date used for ordering
    pub fn parsed_date(&self) -> Option<NaiveDateTime> {
        parse_date_string(&self.date)
    }

    /// Case-insensitive tag match
    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.to_lowercase();
        self.tags.iter().any(|t| t.to_lowercase() == tag)
    }
}

/// Sort newest first; posts without a readable date go last
pub fn sort_newest_first(posts: &mut [PostSummary]) {
    posts.sort_by(|a, b| match (a.parsed_date(), b.parsed_date()) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.id.cmp(&b.id),
    });
}

/// A fully loaded post
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    #[serde(flatten)]
    pub meta: PostSummary,

    /// Rendered HTML content
    pub content: String,

    /// Raw document as stored, front matter included
    pub raw: String,

    /// Repository path the post was read from
    pub source: String,
}
