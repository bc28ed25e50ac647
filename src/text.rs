use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use std::path::Path;
use tracing::debug;

use crate::error::{ConvertError, Result};
use crate::extract::Chapter;

const SKIPPED: [&str; 6] = ["head", "script", "style", "title", "noscript", "template"];
const BLOCKS: [&str; 27] = [
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption", "figure", "footer",
    "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "nav", "ol", "p", "pre", "section", "tr", "ul",
];

/// Plain-text paragraphs of one document item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: Option<String>,
    pub paragraphs: Vec<String>,
}

/// Strips markup from `html` and returns its non-blank paragraphs in document order.
///
/// Text nodes are concatenated; literal newlines, `<br>` and block element
/// boundaries all end a paragraph.
pub fn paragraphs(html: &str) -> Vec<String> {
    let parsed = Html::parse_document(html);
    let root = Selector::parse("body")
        .ok()
        .and_then(|selector| parsed.select(&selector).next())
        .unwrap_or_else(|| parsed.root_element());

    let mut raw = String::new();
    collect_text(root, &mut raw);

    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect()
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if SKIPPED.contains(&name) {
        return;
    }
    let block = BLOCKS.contains(&name);
    if block || name == "br" {
        out.push('\n');
    }
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, out);
                }
            }
            _ => {}
        }
    }
    if block {
        out.push('\n');
    }
}

/// Turns every chapter into a [`Section`], failing when the whole book has no text.
pub fn collect_sections(chapters: &[Chapter], source: &Path) -> Result<Vec<Section>> {
    let sections: Vec<Section> = chapters
        .iter()
        .map(|chapter| {
            let paragraphs = paragraphs(&chapter.html);
            debug!("{}: {} paragraphs", chapter.name, paragraphs.len());
            Section {
                title: chapter.title.clone(),
                paragraphs,
            }
        })
        .collect();

    if sections.iter().all(|section| section.paragraphs.is_empty()) {
        return Err(ConvertError::EmptyContent(source.to_path_buf()));
    }
    Ok(sections)
}

/// Greedy word wrap to at most `width` characters per line; over-long words are split.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        while word.len() > width {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        if word.is_empty() {
            continue;
        }

        let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
        if needed > width {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current_len += word.len();
        current.extend(word);
    }

    if current_len > 0 {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(html: &str) -> Chapter {
        Chapter {
            name: "c.xhtml".to_string(),
            html: html.to_string(),
            title: None,
        }
    }

    #[test]
    fn strips_markup_into_paragraphs() {
        let html = r#"<html><head><title>T</title><style>p { color: red }</style></head>
<body><h1>Chapter <em>One</em></h1><p>First   paragraph
continues here.</p><p>Second<br/>line</p><script>var x = 1;</script></body></html>"#;

        assert_eq!(
            paragraphs(html),
            vec!["Chapter One", "First paragraph", "continues here.", "Second", "line"]
        );
    }

    #[test]
    fn blank_paragraphs_are_dropped() {
        assert!(paragraphs("<html><body><p>   </p>\n\n<div>\t</div></body></html>").is_empty());
    }

    #[test]
    fn empty_book_is_an_error() {
        let chapters = vec![chapter("<body><p> </p></body>"), chapter("<body></body>")];
        let err = collect_sections(&chapters, Path::new("blank.epub")).unwrap_err();
        assert!(matches!(err, ConvertError::EmptyContent(_)));

        let err = collect_sections(&[], Path::new("none.epub")).unwrap_err();
        assert!(matches!(err, ConvertError::EmptyContent(_)));
    }

    #[test]
    fn one_non_empty_chapter_is_enough() {
        let chapters = vec![chapter("<body></body>"), chapter("<body><p>Text</p></body>")];
        let sections = collect_sections(&chapters, Path::new("b.epub")).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].paragraphs, vec!["Text"]);
    }

    #[test]
    fn wraps_on_word_boundaries() {
        assert_eq!(
            wrap("the quick brown fox jumps", 10),
            vec!["the quick", "brown fox", "jumps"]
        );
        assert_eq!(wrap("abcdefghijkl xy", 5), vec!["abcde", "fghij", "kl xy"]);
        assert!(wrap("   ", 10).is_empty());
    }
}
