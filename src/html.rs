use html_escape::encode_text;
use scraper::{Html, Selector};

use crate::container::Metadata;
use crate::extract::Chapter;

pub const PAGE_BREAK: &str = r#"<div class="page-break"></div>"#;

const STYLE: &str = r#"
    @page { size: A4; margin: 2cm; }
    body {
        font-family: Georgia, 'Times New Roman', serif;
        font-size: 12pt;
        line-height: 1.5;
        color: #111;
    }
    img, svg { max-width: 100%; height: auto; }
    h1, h2, h3 { page-break-after: avoid; }
    p { orphans: 2; widows: 2; }
    .page-break { page-break-after: always; break-after: page; }
    .title-page { text-align: center; padding-top: 30%; }
    .title-page h1 { font-size: 2.4em; font-weight: 300; margin-bottom: 0.5em; }
    .title-page .authors { font-size: 1.3em; opacity: 0.8; }
"#;

/// Builds the single HTML document handed to the browser.
///
/// Chapters keep container order; each contributes its `<body>` contents, followed
/// by a page break except after the last one.
pub fn assemble(metadata: &Metadata, chapters: &[Chapter]) -> String {
    let title = metadata.title.as_deref().unwrap_or("Untitled");
    let mut html = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<title>{}</title>\n<style>{}</style>\n</head>\n<body>\n",
        encode_text(title),
        STYLE
    );

    if let Some(title_page) = title_page(metadata) {
        html.push_str(&title_page);
        if !chapters.is_empty() {
            html.push_str(PAGE_BREAK);
            html.push('\n');
        }
    }

    for (index, chapter) in chapters.iter().enumerate() {
        if index > 0 {
            html.push_str(PAGE_BREAK);
            html.push('\n');
        }
        html.push_str("<section class=\"chapter\">\n");
        html.push_str(&body_content(&chapter.html));
        html.push_str("\n</section>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

/// Inner HTML of the document's `<body>`, or the whole input when there is none.
pub fn body_content(document: &str) -> String {
    let parsed = Html::parse_document(document);
    match Selector::parse("body") {
        Ok(selector) => parsed
            .select(&selector)
            .next()
            .map(|body| body.inner_html())
            .unwrap_or_else(|| document.to_string()),
        Err(_) => document.to_string(),
    }
}

fn title_page(metadata: &Metadata) -> Option<String> {
    let title = metadata.title.as_deref()?;
    let authors = if metadata.authors.is_empty() {
        String::new()
    } else {
        format!(
            "<div class=\"authors\">{}</div>",
            encode_text(&metadata.authors.join(", "))
        )
    };
    Some(format!(
        "<div class=\"title-page\"><h1>{}</h1>{}</div>\n",
        encode_text(title),
        authors
    ))
}
