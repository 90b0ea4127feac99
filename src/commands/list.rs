//! List site content

use anyhow::Result;

use crate::Site;

/// Lines describing the content of one type
pub async fn lines(site: &Site, content_type: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();

    match content_type {
        "post" | "posts" => {
            let posts = site.blog().list_posts().await;
            out.push(format!("Posts ({}):", posts.len()));
            for post in posts {
                let date = post
                    .parsed_date()
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "----------".to_string());
                out.push(format!("  {} - {} [{}]", date, post.title, post.id));
            }
        }
        "tag" | "tags" => {
            let tags = site.blog().tags().await;
            out.push(format!("Tags ({}):", tags.len()));
            for tag in tags {
                out.push(format!("  {} ({})", tag.name, tag.count));
            }
        }
        "course" | "courses" => {
            let courses = site.courses().list().await;
            out.push(format!("Courses ({}):", courses.len()));
            for course in courses {
                out.push(format!(
                    "  {} - {} lesson(s) [{}]",
                    course.title, course.lesson_count, course.name
                ));
            }
        }
        _ => {
            anyhow::bail!(
                "Unknown type: {}. Available: post, tag, course",
                content_type
            );
        }
    }

    Ok(out)
}

/// List site content by type
pub async fn run(site: &Site, content_type: &str) -> Result<()> {
    for line in lines(site, content_type).await? {
        println!("{}", line);
    }
    Ok(())
}
