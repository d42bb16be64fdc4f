//! Markdown to HTML conversion. Raw HTML in the input passes through
//! untouched, so pages can mix Markdown with hand-written markup.

use pulldown_cmark::{html, Options, Parser};

/// Converts `markdown` to HTML.
pub fn to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut output, Parser::new_ext(markdown, options));
    output
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_strong() {
        assert_eq!("<p><strong>hi</strong></p>\n", to_html("**hi**"));
    }

    #[test]
    fn test_raw_html_passes_through() {
        let html = to_html("<div class=\"cta\">Buy</div>\n\n*now*");
        assert!(html.contains("<div class=\"cta\">Buy</div>"));
        assert!(html.contains("<em>now</em>"));
    }

    #[test]
    fn test_tables() {
        let html = to_html("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<table>"));
    }
}
