//! HTML inspection for the script volume and content signals.
//!
//! `scraper::Html` is not `Send`, so documents are parsed and dropped inside
//! these synchronous helpers and only owned results cross an `.await`.

use scraper::{Html, Selector};

/// Script tags found on a page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptScan {
    /// Lines of every non-empty inline script body
    pub inline_lines: u64,

    /// `src` attributes in document order, capped
    pub sources: Vec<String>,
}

/// Collect inline script line counts and external script sources
pub fn scan_scripts(html: &str, max_sources: usize) -> ScriptScan {
    let selector = match Selector::parse("script") {
        Ok(selector) => selector,
        Err(_) => return ScriptScan::default(),
    };
    let document = Html::parse_document(html);
    let mut scan = ScriptScan::default();

    for script in document.select(&selector) {
        let body: String = script.text().collect();
        if !body.is_empty() {
            scan.inline_lines += line_count(&body);
        }

        if let Some(src) = script.value().attr("src") {
            let src = src.trim();
            if !src.is_empty() && scan.sources.len() < max_sources {
                scan.sources.push(src.to_string());
            }
        }
    }

    scan
}

/// Text nodes of the whole document, space-joined
pub fn document_text(html: &str) -> String {
    let document = Html::parse_document(html);
    document.root_element().text().collect::<Vec<_>>().join(" ")
}

/// Newline-delimited line count; a body without newlines is one line
pub fn line_count(body: &str) -> u64 {
    body.split('\n').count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html>
<head>
  <script>var a = 1;
var b = 2;</script>
  <script src="/static/app.js"></script>
  <script src="https://cdn.example.net/lib.js"></script>
  <script></script>
</head>
<body><p>Hello, World!</p><p>Second</p></body>
</html>"#;

    #[test]
    fn test_scan_scripts() {
        let scan = scan_scripts(PAGE, 10);

        assert_eq!(scan.inline_lines, 2);
        assert_eq!(
            scan.sources,
            vec!["/static/app.js", "https://cdn.example.net/lib.js"]
        );
    }

    #[test]
    fn test_scan_scripts_caps_sources() {
        let scan = scan_scripts(PAGE, 1);
        assert_eq!(scan.sources, vec!["/static/app.js"]);
    }

    #[test]
    fn test_document_text_keeps_words_apart() {
        let text = document_text(PAGE);
        assert!(text.contains("Hello, World!"));
        assert!(text.contains("Second"));
        assert!(!text.contains("World!Second"));
    }

    #[test]
    fn test_line_count() {
        assert_eq!(line_count("one"), 1);
        assert_eq!(line_count("one\ntwo\n"), 3);
    }

    #[test]
    fn test_not_html() {
        assert_eq!(scan_scripts("plain text", 5), ScriptScan::default());
        assert_eq!(document_text("plain text").trim(), "plain text");
    }
}
