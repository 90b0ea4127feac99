//! Create a new post

use anyhow::Result;
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};

use crate::content::yaml_quote;
use crate::Site;

/// Front matter and a placeholder body for a new post
pub fn scaffold(title: &str, author: &str, now: DateTime<Local>) -> String {
    format!(
        r#"---
title: {}
date: {}
author: {}
description: ""
tags: []
---

"#,
        yaml_quote(title),
        now.format("%Y-%m-%d"),
        yaml_quote(author)
    )
}

/// File name for a post titled `title`
pub fn file_name(title: &str) -> Result<String> {
    let slug = slug::slugify(title);
    if slug.is_empty() {
        anyhow::bail!("Cannot derive a file name from title {:?}", title);
    }
    Ok(format!("{}.mdx", slug))
}

/// Write a new post into `dir`
pub fn create_post(dir: &Path, title: &str, author: &str) -> Result<PathBuf> {
    let file_path = dir.join(file_name(title)?);

    // Check if file already exists
    if file_path.exists() {
        anyhow::bail!("File already exists: {:?}", file_path);
    }

    fs::create_dir_all(dir)?;
    fs::write(&file_path, scaffold(title, author, Local::now()))?;
    Ok(file_path)
}

/// Commit a new post straight to the content repository
pub async fn publish(site: &Site, title: &str) -> Result<()> {
    let name = file_name(title)?;
    let content = scaffold(title, &site.config.default_author, Local::now());
    let reference = site.publish_post(&name, &content).await?;
    println!("Published {} ({})", name, reference);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::FrontMatter;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_scaffold_parses() {
        let now = Local.with_ymd_and_hms(2024, 7, 1, 9, 30, 0).unwrap();
        let doc = scaffold(r#"Say "hi": a guide"#, "Aryan", now);
        let (fm, body) = FrontMatter::parse(&doc).unwrap();
        assert_eq!(fm.title.as_deref(), Some(r#"Say "hi": a guide"#));
        assert_eq!(fm.date.as_deref(), Some("2024-07-01"));
        assert!(fm.tags.is_empty());
        assert!(body.trim().is_empty());
    }

    #[test]
    fn test_create_post() {
        let dir = TempDir::new().unwrap();
        let path = create_post(dir.path(), "Hello World", "Aryan").unwrap();
        assert_eq!(path, dir.path().join("hello-world.mdx"));
        assert!(fs::read_to_string(&path).unwrap().contains(r#"author: "Aryan""#));

        // Refuse to overwrite
        assert!(create_post(dir.path(), "Hello World", "Aryan").is_err());
        assert!(file_name("!!!").is_err());
    }
}
