//! Markdown/MDX rendering with syntax highlighting
//!
//! Bodies are parsed with pulldown-cmark (GFM, footnotes, math) and turned
//! into HTML. A few constructs are mapped to components the page scripts and
//! stylesheet know about:
//!
//! - `math`/`katex`/`latex` fences and `$…$`/`$$…$$` become `.math` elements
//!   holding the escaped TeX, typeset client-side by KaTeX;
//! - `mermaid` fences become `<pre class="mermaid">`;
//! - `<Callout type="…">` (MDX) and `<div class="callout-…">` become
//!   `<div class="callout callout-…">`.
//!
//! MDX `import`/`export` statements are dropped. Anything else, including
//! unknown fence languages and unknown JSX tags, passes through unchanged.

use lazy_static::lazy_static;
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use regex::{Captures, Regex};
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;
use thiserror::Error;

use crate::helpers::{error_paragraph, html_escape};

/// Shown in place of a body that could not be rendered
pub const RENDER_FALLBACK: &str =
    "Error rendering markdown content. Check server logs for details.";

/// Callout variants understood by the stylesheet
const CALLOUT_TYPES: [&str; 3] = ["info", "warning", "error"];

lazy_static! {
    static ref ESM_LINE: Regex = Regex::new(r"^(import|export)\s").unwrap();
    static ref CALLOUT_OPEN: Regex = Regex::new(r"<Callout\b([^>]*?)(/?)>").unwrap();
    static ref CALLOUT_CLOSE: Regex = Regex::new(r"</Callout\s*>").unwrap();
    static ref CALLOUT_TYPE: Regex =
        Regex::new(r#"type\s*=\s*(?:"([^"]*)"|'([^']*)'|\{\s*["']([^"']*)["']\s*\})"#).unwrap();
    static ref CALLOUT_DIV: Regex =
        Regex::new(r#"<div\s+class(?:Name)?\s*=\s*["']callout-([A-Za-z]+)["']\s*>"#).unwrap();
    static ref COMPONENT_LINE: Regex =
        Regex::new(r#"^\s*(<Callout\b[^>]*>|</Callout\s*>|<div\s+class(?:Name)?\s*=\s*["']callout-[A-Za-z]+["']\s*>)\s*$"#)
            .unwrap();
}

/// Failures that keep a body from rendering
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("highlight theme '{0}' is not available")]
    Theme(String),

    #[error("unbalanced <{0}> component: {1} opened, {2} closed")]
    UnbalancedComponent(&'static str, usize, usize),
}

/// What a fenced block turns into
#[derive(Debug, Clone, PartialEq)]
enum Fence {
    Math,
    Mermaid,
    Code(Option<String>),
}

impl Fence {
    fn from_kind(kind: &CodeBlockKind) -> Self {
        let lang = match kind {
            CodeBlockKind::Fenced(info) => info.split_whitespace().next().unwrap_or(""),
            CodeBlockKind::Indented => "",
        };
        match lang {
            "math" | "katex" | "latex" => Fence::Math,
            "mermaid" => Fence::Mermaid,
            "" => Fence::Code(None),
            other => Fence::Code(Some(other.to_string())),
        }
    }
}

/// Markdown renderer with syntax highlighting
pub struct MarkdownRenderer {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
    theme_name: String,
    line_numbers: bool,
}

impl MarkdownRenderer {
    /// Create a new markdown renderer
    pub fn new() -> Self {
        Self::with_options("base16-ocean.dark", false)
    }

    /// Create with custom settings
    pub fn with_options(theme: &str, line_numbers: bool) -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
            theme_name: theme.to_string(),
            line_numbers,
        }
    }

    /// Render a Markdown/MDX body to HTML
    pub fn render(&self, markdown: &str) -> Result<String, RenderError> {
        let source = prepare_mdx(markdown)?;

        // Front matter is split off before rendering, so no metadata blocks here
        let options = Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_SMART_PUNCTUATION
            | Options::ENABLE_HEADING_ATTRIBUTES
            | Options::ENABLE_MATH
            | Options::ENABLE_GFM;
        let parser = Parser::new_ext(&source, options);

        let mut events: Vec<Event> = Vec::new();
        let mut fence: Option<Fence> = None;
        let mut code = String::new();

        for event in parser {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    fence = Some(Fence::from_kind(&kind));
                    code.clear();
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some(f) = fence.take() {
                        let block = self.render_fence(&f, &code)?;
                        events.push(Event::Html(CowStr::from(block)));
                    }
                }
                Event::Text(text) if fence.is_some() => code.push_str(&text),
                Event::InlineMath(tex) => events.push(Event::InlineHtml(CowStr::from(format!(
                    r#"<span class="math math-inline">{}</span>"#,
                    html_escape(&tex)
                )))),
                Event::DisplayMath(tex) => events.push(Event::InlineHtml(CowStr::from(format!(
                    r#"<span class="math math-display">{}</span>"#,
                    html_escape(&tex)
                )))),
                Event::Html(raw) => events.push(Event::Html(CowStr::from(rewrite_components(&raw)))),
                Event::InlineHtml(raw) => {
                    events.push(Event::InlineHtml(CowStr::from(rewrite_components(&raw))))
                }
                other => events.push(other),
            }
        }

        let mut html_output = String::new();
        html::push_html(&mut html_output, events.into_iter());

        Ok(html_output)
    }

    /// Render, substituting an inline error message when rendering fails
    pub fn render_or_fallback(&self, markdown: &str) -> String {
        match self.render(markdown) {
            Ok(html) => html,
            Err(e) => {
                tracing::error!("Failed to render markdown/MDX: {}", e);
                error_paragraph(RENDER_FALLBACK)
            }
        }
    }

    fn render_fence(&self, fence: &Fence, code: &str) -> Result<String, RenderError> {
        match fence {
            Fence::Math => Ok(format!(
                r#"<div class="math math-display">{}</div>"#,
                html_escape(code.trim_end())
            )),
            Fence::Mermaid => Ok(format!(
                r#"<pre class="mermaid">{}</pre>"#,
                html_escape(code.trim_end())
            )),
            Fence::Code(lang) => self.highlight_code(code, lang.as_deref()),
        }
    }

    /// Highlight a code block
    fn highlight_code(&self, code: &str, lang: Option<&str>) -> Result<String, RenderError> {
        let lang = lang.unwrap_or("text");

        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| self.syntax_set.find_syntax_by_extension(lang))
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        let theme = self
            .theme_set
            .themes
            .get(&self.theme_name)
            .ok_or_else(|| RenderError::Theme(self.theme_name.clone()))?;

        let html = match highlighted_html_for_string(code, &self.syntax_set, syntax, theme) {
            Ok(highlighted) if self.line_numbers => self.add_line_numbers(&highlighted, lang),
            Ok(highlighted) => format!(
                r#"<pre><code class="language-{}">{}</code></pre>"#,
                lang, highlighted
            ),
            Err(_) => format!(
                r#"<pre><code class="language-{}">{}</code></pre>"#,
                lang,
                html_escape(code)
            ),
        };
        Ok(html)
    }

    /// Add line numbers to highlighted code
    fn add_line_numbers(&self, code: &str, lang: &str) -> String {
        let lines: Vec<&str> = code.lines().collect();

        let gutter = (1..=lines.len())
            .map(|n| format!(r#"<span class="line-number">{}</span>"#, n))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"<figure class="highlight {}"><table><tr><td class="gutter"><pre>{}</pre></td><td class="code"><pre>{}</pre></td></tr></table></figure>"#,
            lang,
            gutter,
            lines.join("\n")
        )
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop MDX import/export lines and give component tags their own blocks so
/// the Markdown between them is still parsed. Fenced code is left alone.
fn prepare_mdx(source: &str) -> Result<String, RenderError> {
    let mut out = String::with_capacity(source.len() + 16);
    let mut fence_marker: Option<String> = None;
    let mut opened = 0usize;
    let mut closed = 0usize;

    for line in source.lines() {
        let trimmed = line.trim_start();

        if let Some(marker) = &fence_marker {
            if closes_fence(trimmed, marker) {
                fence_marker = None;
            }
            out.push_str(line);
            out.push('\n');
            continue;
        }

        if let Some(marker) = fence_open(trimmed) {
            fence_marker = Some(marker);
            out.push_str(line);
            out.push('\n');
            continue;
        }

        if ESM_LINE.is_match(line) {
            continue;
        }

        opened += CALLOUT_OPEN
            .captures_iter(line)
            .filter(|c| c.get(2).map_or(true, |m| m.as_str().is_empty()))
            .count();
        closed += CALLOUT_CLOSE.find_iter(line).count();

        if COMPONENT_LINE.is_match(line) {
            out.push('\n');
            out.push_str(trimmed);
            out.push_str("\n\n");
        } else {
            out.push_str(line);
            out.push('\n');
        }
    }

    if opened != closed {
        return Err(RenderError::UnbalancedComponent("Callout", opened, closed));
    }
    Ok(out)
}

/// The marker opening a fenced code block (three or more backticks or tildes)
fn fence_open(trimmed: &str) -> Option<String> {
    let first = trimmed.chars().next()?;
    if first != '`' && first != '~' {
        return None;
    }
    let count = trimmed.chars().take_while(|c| *c == first).count();
    (count >= 3).then(|| first.to_string().repeat(count))
}

/// A closing fence uses the opening character at least as many times, alone on its line
fn closes_fence(trimmed: &str, marker: &str) -> bool {
    let Some(ch) = marker.chars().next() else {
        return false;
    };
    trimmed.starts_with(marker) && trimmed.trim_start_matches(ch).trim().is_empty()
}

/// Map component tags in raw HTML to plain HTML with callout classes
fn rewrite_components(raw: &str) -> String {
    let opened = CALLOUT_OPEN.replace_all(raw, |caps: &Captures| {
        let kind = callout_type(caps.get(1).map_or("", |m| m.as_str()));
        let self_closing = caps.get(2).is_some_and(|m| !m.as_str().is_empty());
        if self_closing {
            format!(r#"<div class="callout callout-{}"></div>"#, kind)
        } else {
            format!(r#"<div class="callout callout-{}">"#, kind)
        }
    });
    let closed = CALLOUT_CLOSE.replace_all(&opened, "</div>");
    CALLOUT_DIV
        .replace_all(&closed, |caps: &Captures| {
            format!(r#"<div class="callout callout-{}">"#, normalize_callout(&caps[1]))
        })
        .into_owned()
}

fn callout_type(attributes: &str) -> &'static str {
    let value = CALLOUT_TYPE
        .captures(attributes)
        .and_then(|c| c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3)))
        .map_or("", |m| m.as_str());
    normalize_callout(value)
}

fn normalize_callout(value: &str) -> &'static str {
    CALLOUT_TYPES
        .iter()
        .find(|t| t.eq_ignore_ascii_case(value))
        .copied()
        .unwrap_or("info")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_basic_markdown() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("# Hello World\n\nThis is a test.").unwrap();
        assert!(html.contains("<h1>Hello World</h1>"));
        assert!(html.contains("<p>This is a test.</p>"));
    }

    #[test]
    fn test_gfm_table_and_tasks() {
        let renderer = MarkdownRenderer::new();
        let html = renderer
            .render("| a | b |\n|---|---|\n| 1 | 2 |\n\n- [x] done\n")
            .unwrap();
        assert!(html.contains("<table>"));
        assert!(html.contains("checkbox"));
    }

    #[test]
    fn test_render_code_block() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("```rust\nfn main() {}\n```").unwrap();
        assert!(html.contains("language-rust"));
        assert!(html.contains("main"));
    }

    #[test]
    fn test_line_numbers() {
        let renderer = MarkdownRenderer::with_options("base16-ocean.dark", true);
        let html = renderer.render("```rust\nlet a = 1;\nlet b = 2;\n```").unwrap();
        assert!(html.contains(r#"<figure class="highlight rust">"#));
        assert!(html.contains(r#"<span class="line-number">2</span>"#));
    }

    #[test]
    fn test_unknown_fence_passes_through() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("```wat\n<x> & y\n```").unwrap();
        assert!(html.contains("language-wat"));
        assert!(html.contains("&lt;x&gt;"));
    }

    #[test]
    fn test_math_fence_and_inline() {
        let renderer = MarkdownRenderer::new();
        let html = renderer
            .render("```katex\nc = \\pm\\sqrt{a^2 + b^2}\n```\n\nInline $x < y$ and $$e^{i\\pi}$$.")
            .unwrap();
        assert!(html.contains(r#"<div class="math math-display">c = \pm\sqrt{a^2 + b^2}</div>"#));
        assert!(html.contains(r#"<span class="math math-inline">x &lt; y</span>"#));
        assert!(html.contains(r#"<span class="math math-display">e^{i\pi}</span>"#));
    }

    #[test]
    fn test_mermaid_fence() {
        let renderer = MarkdownRenderer::new();
        let html = renderer
            .render("```mermaid\ngraph TD\n    A[Hard] -->|Text| B(Round)\n```")
            .unwrap();
        assert!(html.contains(r#"<pre class="mermaid">graph TD"#));
        assert!(html.contains("--&gt;|Text|"));
    }

    #[test]
    fn test_mdx_callout() {
        let renderer = MarkdownRenderer::new();
        let html = renderer
            .render("<Callout type=\"warning\">\nCareful with **this**.\n</Callout>")
            .unwrap();
        assert!(html.contains(r#"<div class="callout callout-warning">"#));
        assert!(html.contains("<strong>this</strong>"));
        assert!(html.contains("</div>"));
        assert!(!html.contains("Callout"));
    }

    #[test]
    fn test_callout_type_defaults_to_info() {
        let renderer = MarkdownRenderer::new();
        let html = renderer
            .render("<Callout type=\"shout\">\n\nHey\n\n</Callout>\n\n<Callout>\n\nPlain\n\n</Callout>")
            .unwrap();
        assert_eq!(html.matches(r#"<div class="callout callout-info">"#).count(), 2);
    }

    #[test]
    fn test_callout_div() {
        let renderer = MarkdownRenderer::new();
        let html = renderer
            .render("<div class=\"callout-error\">\n\nBroken\n\n</div>")
            .unwrap();
        assert!(html.contains(r#"<div class="callout callout-error">"#));
    }

    #[test]
    fn test_unknown_jsx_passes_through() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("<Widget size=\"2\" />\n\ntext").unwrap();
        assert!(html.contains(r#"<Widget size="2" />"#));
    }

    #[test]
    fn test_esm_lines_dropped() {
        let renderer = MarkdownRenderer::new();
        let html = renderer
            .render("import Chart from './chart'\nexport const meta = {}\n\n# Title\n\n```js\nimport x from 'y'\n```")
            .unwrap();
        assert!(!html.contains("./chart"));
        assert!(!html.contains("export const"));
        // Code inside fences is untouched
        assert!(html.contains("import"));
    }

    #[test]
    fn test_callout_inside_code_is_literal() {
        let renderer = MarkdownRenderer::new();
        let html = renderer
            .render("```\n<Callout type=\"info\">\n```")
            .unwrap();
        assert!(html.contains("&lt;Callout"));
    }

    #[test]
    fn test_unbalanced_component_falls_back() {
        let renderer = MarkdownRenderer::new();
        assert!(matches!(
            renderer.render("<Callout type=\"info\">\n\nnever closed"),
            Err(RenderError::UnbalancedComponent("Callout", 1, 0))
        ));
        let html = renderer.render_or_fallback("<Callout>\n\noops");
        assert!(html.contains(RENDER_FALLBACK));
    }

    #[test]
    fn test_missing_theme_is_error() {
        let renderer = MarkdownRenderer::with_options("no-such-theme", false);
        assert!(matches!(
            renderer.render("```rust\nfn x() {}\n```"),
            Err(RenderError::Theme(_))
        ));
        // Bodies without code do not need a theme
        assert!(renderer.render("plain").is_ok());
    }
}
