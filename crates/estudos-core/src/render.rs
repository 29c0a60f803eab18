//! Markdown to HTML for assistant answers
//!
//! Answers come from a first-party backend, so this is not a general-purpose
//! sanitizer. It keeps the Markdown feature set (emphasis, code, lists, links,
//! tables) and turns anything else that would reach the page as live markup
//! into escaped text.

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};

const BLOCKED_SCHEMES: [&str; 3] = ["javascript:", "vbscript:", "data:"];

/// Render a Markdown answer to an HTML fragment
pub fn render(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);

    let events = Parser::new_ext(markdown, options).map(|event| match event {
        // Raw HTML is shown, never injected
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link { link_type, dest_url, title, id }) => Event::Start(Tag::Link {
            link_type,
            dest_url: neutralize_url(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image { link_type, dest_url, title, id }) => Event::Start(Tag::Image {
            link_type,
            dest_url: neutralize_url(dest_url),
            title,
            id,
        }),
        other => other,
    });

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}

fn neutralize_url(url: CowStr<'_>) -> CowStr<'_> {
    let lowered = url.trim_start().to_ascii_lowercase();
    if BLOCKED_SCHEMES.iter().any(|scheme| lowered.starts_with(scheme)) {
        CowStr::Borrowed("#")
    } else {
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bold() {
        assert_eq!(render("**hi**"), "<p><strong>hi</strong></p>\n");
    }

    #[test]
    fn test_emphasis_code_and_lists() {
        let html = render("*leia* o `capitulo`\n\n- um\n- dois\n");
        assert!(html.contains("<em>leia</em>"));
        assert!(html.contains("<code>capitulo</code>"));
        assert!(html.contains("<ul>"));
        assert!(html.contains("<li>dois</li>"));
    }

    #[test]
    fn test_links_are_kept() {
        let html = render("[docs](https://example.com/a)");
        assert!(html.contains(r#"<a href="https://example.com/a">docs</a>"#));
    }

    #[test]
    fn test_html_block_is_escaped() {
        let html = render("<script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_inline_html_is_escaped() {
        let html = render("texto <img src=x onerror=alert(1)> fim");
        assert!(!html.contains("<img"));
        assert!(html.contains("&lt;img"));
    }

    #[test]
    fn test_script_links_are_neutralized() {
        let html = render("[clique](javascript:alert(1))");
        assert!(html.contains(r##"href="#""##));
        assert!(!html.contains("javascript:"));

        let html = render("[x](JavaScript:alert(1))");
        assert!(!html.to_ascii_lowercase().contains("javascript:"));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(render(""), "");
    }
}
