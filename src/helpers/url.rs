//! URL helper functions

use url::Url;

/// Join a site path onto the base URL
///
/// # Examples
/// ```ignore
/// full_url_for("https://example.com/", "/blog/hello") // -> "https://example.com/blog/hello"
/// ```
pub fn full_url_for(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        format!("{}/", base)
    } else {
        format!("{}/{}", base, path)
    }
}

/// Resolve a possibly relative reference (an image path from front matter)
/// against the base URL. Empty references resolve to nothing.
pub fn absolute_url(base_url: &str, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }
    if let Ok(url) = Url::parse(reference) {
        return Some(url.to_string());
    }
    Url::parse(base_url)
        .and_then(|base| base.join(reference))
        .map(|url| url.to_string())
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_url_for() {
        assert_eq!(
            full_url_for("https://example.com/", "/blog/hello"),
            "https://example.com/blog/hello"
        );
        assert_eq!(full_url_for("https://example.com", ""), "https://example.com/");
    }

    #[test]
    fn test_absolute_url() {
        assert_eq!(
            absolute_url("http://localhost:3000", "/images/a.png").as_deref(),
            Some("http://localhost:3000/images/a.png")
        );
        assert_eq!(
            absolute_url("http://localhost:3000", "https://cdn.example.com/a.png").as_deref(),
            Some("https://cdn.example.com/a.png")
        );
        assert_eq!(absolute_url("http://localhost:3000", "  "), None);
    }
}
