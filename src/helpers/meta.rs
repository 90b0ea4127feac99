//! Search-engine and social metadata for pages

use serde::Serialize;

use super::url::absolute_url;
use crate::content::Post;

/// Head metadata for one page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageMeta {
    pub title: String,
    pub description: String,
    pub keywords: String,
    pub open_graph: Option<OpenGraph>,
    pub twitter: Option<TwitterCard>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenGraph {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub published_time: String,
    pub authors: Vec<String>,
    pub image: Option<String>,
    pub image_alt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TwitterCard {
    pub card: String,
    pub title: String,
    pub description: String,
    pub creator: String,
    pub image: Option<String>,
}

impl PageMeta {
    /// Plain title/description pair
    pub fn simple(title: &str, description: &str) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            keywords: String::new(),
            open_graph: None,
            twitter: None,
        }
    }

    pub fn post_not_found() -> Self {
        Self::simple(
            "Post Not Found",
            "The requested blog post could not be found.",
        )
    }

    /// Article metadata for a post
    pub fn for_post(post: &Post, base_url: &str) -> Self {
        let meta = &post.meta;
        let description = if meta.description.trim().is_empty() {
            format!("Read \"{}\" by {}.", meta.title, meta.author)
        } else {
            meta.description.clone()
        };
        let keywords = if meta.tags.is_empty() {
            meta.title.split_whitespace().collect::<Vec<_>>().join(", ")
        } else {
            meta.tags.join(", ")
        };
        let image = absolute_url(base_url, &meta.image);
        let handle: String = meta.author.split_whitespace().collect();

        Self {
            title: meta.title.clone(),
            description: description.clone(),
            keywords,
            open_graph: Some(OpenGraph {
                title: meta.title.clone(),
                description: description.clone(),
                kind: "article".to_string(),
                published_time: meta.date.clone(),
                authors: vec![meta.author.clone()],
                image: image.clone(),
                image_alt: meta.title.clone(),
            }),
            twitter: Some(TwitterCard {
                card: if image.is_some() {
                    "summary_large_image".to_string()
                } else {
                    "summary".to_string()
                },
                title: meta.title.clone(),
                description,
                creator: format!("@{}", handle),
                image,
            }),
        }
    }
}
