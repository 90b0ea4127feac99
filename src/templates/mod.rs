//! Built-in site templates using the Tera template engine
//!
//! Templates are embedded in the binary. Autoescaping stays on for `.html`
//! templates; rendered Markdown is marked `| safe` where it is placed.

use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera};

use crate::auth::User;
use crate::config::SiteConfig;
use crate::helpers::{format_date, strip_html, truncate, PageMeta};

/// Template renderer with the embedded site templates
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Create a new renderer with all templates loaded
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();

        tera.add_raw_templates(vec![
            ("layout.html", include_str!("site/layout.html")),
            ("macros.html", include_str!("site/macros.html")),
            ("home.html", include_str!("site/home.html")),
            ("blog.html", include_str!("site/blog.html")),
            ("post.html", include_str!("site/post.html")),
            ("tag.html", include_str!("site/tag.html")),
            ("courses.html", include_str!("site/courses.html")),
            ("course.html", include_str!("site/course.html")),
            ("lesson.html", include_str!("site/lesson.html")),
            ("signin.html", include_str!("site/signin.html")),
            ("editor.html", include_str!("site/editor.html")),
            (
                "access_denied.html",
                include_str!("site/access_denied.html"),
            ),
            ("error.html", include_str!("site/error.html")),
            ("not_found.html", include_str!("site/not_found.html")),
        ])?;

        // Register custom filters
        tera.register_filter("strip_html", strip_html_filter);
        tera.register_filter("truncate_chars", truncate_chars_filter);
        tera.register_filter("date_format", date_format_filter);

        Ok(Self { tera })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(template_name, context)?)
    }
}

/// Context shared by every page: site settings, head metadata and the
/// signed-in user
pub fn page_context(config: &SiteConfig, meta: &PageMeta, user: Option<&User>) -> Context {
    let mut context = Context::new();
    context.insert("config", &ConfigData::from(config));
    context.insert("meta", meta);
    context.insert("user", &user);
    context
}

/// Site settings exposed to templates
#[derive(Debug, Clone, Serialize)]
pub struct ConfigData {
    pub title: String,
    pub description: String,
    pub url: String,
}

impl From<&SiteConfig> for ConfigData {
    fn from(config: &SiteConfig) -> Self {
        Self {
            title: config.title.clone(),
            description: config.description.clone(),
            url: config.base_url.clone(),
        }
    }
}

/// A sign-in option on the sign-in page
#[derive(Debug, Clone, Serialize)]
pub struct ProviderData {
    pub id: String,
    pub name: String,
}

/// Tera filter: strip HTML tags
fn strip_html_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("strip_html", "value", String, value);
    Ok(tera::Value::String(strip_html(&s)))
}

/// Tera filter: truncate by character count
fn truncate_chars_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("truncate_chars", "value", String, value);
    let length = match args.get("length") {
        Some(val) => tera::try_get_value!("truncate_chars", "length", usize, val),
        None => 150,
    };
    let omission = match args.get("omission") {
        Some(val) => Some(tera::try_get_value!(
            "truncate_chars",
            "omission",
            String,
            val
        )),
        None => None,
    };

    Ok(tera::Value::String(truncate(
        &s,
        length,
        omission.as_deref(),
    )))
}

/// Tera filter: format date string
fn date_format_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("date_format", "value", String, value);
    let format = match args.get("format") {
        Some(val) => tera::try_get_value!("date_format", "format", String, val),
        None => "YYYY-MM-DD".to_string(),
    };

    Ok(tera::Value::String(format_date(&s, &format)))
}
