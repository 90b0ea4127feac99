//! CLI subcommands

pub mod list;
pub mod new;
pub mod rate_limit;

use anyhow::Result;
use std::path::Path;

use crate::config::SiteConfig;
use crate::Site;

/// Open the site against a local checkout when one is given, else GitHub
pub fn open_site(config: SiteConfig, local: Option<&Path>) -> Result<Site> {
    match local {
        Some(root) => {
            if !root.is_dir() {
                anyhow::bail!("Content directory not found: {:?}", root);
            }
            Ok(Site::local(config, root))
        }
        None => Site::github(config),
    }
}
