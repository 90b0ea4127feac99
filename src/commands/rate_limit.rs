//! Show the GitHub API quota

use anyhow::Result;

use crate::Site;

pub async fn run(site: &Site) -> Result<()> {
    match site.rate_limit().await? {
        Some(limit) => {
            println!("GitHub API rate limit");
            println!("  limit:     {}", limit.limit);
            println!("  remaining: {}", limit.remaining);
            println!("  resets at: {} UTC", limit.reset);
        }
        None => println!("Reading from a local checkout; no API quota applies."),
    }
    Ok(())
}
