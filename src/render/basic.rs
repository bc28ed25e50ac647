use anyhow::anyhow;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::path::Path;
use tracing::debug;

use crate::error::{ConvertError, Result};
use crate::extract::ExtractedBook;
use crate::pdf;
use crate::text::{self, Section};

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 72.0;
// Courier advances 600/1000 em per glyph.
const GLYPH_WIDTH: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Title,
    Body,
}

impl Style {
    fn font(&self) -> &'static str {
        match self {
            Self::Title => "F2",
            Self::Body => "F1",
        }
    }

    fn size(&self) -> f32 {
        match self {
            Self::Title => 16.0,
            Self::Body => 11.0,
        }
    }

    fn leading(&self) -> f32 {
        self.size() * 1.35
    }

    fn chars_per_line(&self) -> usize {
        ((PAGE_WIDTH - 2.0 * MARGIN) / (self.size() * GLYPH_WIDTH)) as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub style: Style,
    pub text: String,
    pub y: f32,
}

/// Bookmark pointing at the top of a chapter.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineEntry {
    pub title: String,
    pub page: usize,
    pub y: f32,
}

#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub pages: Vec<Vec<PlacedLine>>,
    pub outline: Vec<OutlineEntry>,
}

/// Cursor over a growing list of pages.
struct Pages {
    pages: Vec<Vec<PlacedLine>>,
    y: f32,
}

impl Pages {
    fn new() -> Self {
        Self {
            pages: vec![Vec::new()],
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn current_is_empty(&self) -> bool {
        self.pages.last().map_or(true, |page| page.is_empty())
    }

    fn break_page(&mut self) {
        if !self.current_is_empty() {
            self.pages.push(Vec::new());
        }
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn line(&mut self, style: Style, text: String) {
        let leading = style.leading();
        if self.y - leading < MARGIN {
            self.break_page();
        }
        self.y -= leading;
        if let Some(page) = self.pages.last_mut() {
            page.push(PlacedLine { style, text, y: self.y });
        }
    }

    fn gap(&mut self, amount: f32) {
        if !self.current_is_empty() {
            self.y -= amount;
        }
    }
}

/// Flows the book title and every section's paragraphs onto A4 pages.
///
/// Each section that produced text ends its page, so the next one starts fresh.
/// Titled sections get an outline entry at their first line.
pub fn layout(title: Option<&str>, sections: &[Section]) -> Layout {
    let mut pages = Pages::new();
    let mut outline = Vec::new();

    if let Some(title) = title {
        for line in text::wrap(title, Style::Title.chars_per_line()) {
            pages.line(Style::Title, line);
        }
        pages.gap(Style::Body.leading() * 2.0);
    }

    let body_width = Style::Body.chars_per_line();
    for section in sections.iter().filter(|s| !s.paragraphs.is_empty()) {
        if pages.y - Style::Body.leading() < MARGIN {
            pages.break_page();
        }
        if let Some(title) = &section.title {
            outline.push(OutlineEntry {
                title: title.clone(),
                page: pages.pages.len() - 1,
                y: pages.y,
            });
        }
        for paragraph in &section.paragraphs {
            for line in text::wrap(paragraph, body_width) {
                pages.line(Style::Body, line);
            }
            pages.gap(Style::Body.leading() * 0.5);
        }
        pages.break_page();
    }

    let mut pages = pages.pages;
    if pages.len() > 1 && pages.last().is_some_and(|page| page.is_empty()) {
        pages.pop();
    }
    Layout { pages, outline }
}

/// PDF text string in UTF-16BE with a byte order mark.
fn text_string(text: &str) -> Object {
    let mut bytes = vec![0xfe, 0xff];
    bytes.extend(text.encode_utf16().flat_map(u16::to_be_bytes));
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn add_outline(doc: &mut Document, entries: &[OutlineEntry], page_ids: &[ObjectId]) -> Option<ObjectId> {
    let entries: Vec<&OutlineEntry> = entries.iter().filter(|e| e.page < page_ids.len()).collect();
    if entries.is_empty() {
        return None;
    }

    let outlines_id = doc.new_object_id();
    let item_ids: Vec<ObjectId> = entries.iter().map(|_| doc.new_object_id()).collect();

    for (index, entry) in entries.iter().enumerate() {
        let mut item = dictionary! {
            "Title" => text_string(&entry.title),
            "Parent" => outlines_id,
            "Dest" => vec![
                page_ids[entry.page].into(),
                "XYZ".into(),
                Object::Null,
                entry.y.into(),
                Object::Null,
            ],
        };
        if index > 0 {
            item.set("Prev", item_ids[index - 1]);
        }
        if let Some(next) = item_ids.get(index + 1) {
            item.set("Next", *next);
        }
        doc.objects.insert(item_ids[index], Object::Dictionary(item));
    }

    doc.objects.insert(
        outlines_id,
        Object::Dictionary(dictionary! {
            "Type" => "Outlines",
            "First" => item_ids[0],
            "Last" => item_ids[item_ids.len() - 1],
            "Count" => item_ids.len() as i64,
        }),
    );
    Some(outlines_id)
}

/// Maps text onto WinAnsiEncoding bytes; characters outside it become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            ' '..='~' | '\u{a0}'..='\u{ff}' => c as u8,
            '€' => 0x80,
            '‚' => 0x82,
            'ƒ' => 0x83,
            '„' => 0x84,
            '…' => 0x85,
            '†' => 0x86,
            '‡' => 0x87,
            'ˆ' => 0x88,
            '‰' => 0x89,
            'Š' => 0x8a,
            '‹' => 0x8b,
            'Œ' => 0x8c,
            'Ž' => 0x8e,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '˜' => 0x98,
            '™' => 0x99,
            'š' => 0x9a,
            '›' => 0x9b,
            'œ' => 0x9c,
            'ž' => 0x9e,
            'Ÿ' => 0x9f,
            _ => b'?',
        })
        .collect()
}

fn build_document(title: Option<&str>, authors: &[String], layout: &Layout) -> anyhow::Result<Document> {
    let pages = &layout.pages;
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let body_font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let title_font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => body_font,
            "F2" => title_font,
        },
    });

    let mut page_ids = Vec::with_capacity(pages.len());
    for page in pages {
        let mut operations = Vec::with_capacity(page.len() * 5);
        for line in page {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new(
                "Tf",
                vec![Object::Name(line.style.font().as_bytes().to_vec()), line.style.size().into()],
            ));
            operations.push(Operation::new("Td", vec![MARGIN.into(), line.y.into()]));
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(&line.text), StringFormat::Literal)],
            ));
            operations.push(Operation::new("ET", vec![]));
        }

        let content = Content { operations };
        let encoded = content
            .encode()
            .map_err(|e| anyhow!("Failed to encode page content: {}", e))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id);
    }

    let count = page_ids.len() as i64;
    let kids: Vec<Object> = page_ids.iter().map(|id| Object::Reference(*id)).collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );

    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    };
    if let Some(outlines_id) = add_outline(&mut doc, &layout.outline, &page_ids) {
        catalog.set("Outlines", outlines_id);
        catalog.set("PageMode", "UseOutlines");
    }
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", catalog_id);

    let mut info = dictionary! {
        "Producer" => Object::string_literal("ebook2pdf"),
    };
    if let Some(title) = title {
        info.set("Title", Object::String(encode_win_ansi(title), StringFormat::Literal));
    }
    if !authors.is_empty() {
        info.set(
            "Author",
            Object::String(encode_win_ansi(&authors.join(", ")), StringFormat::Literal),
        );
    }
    let info_id = doc.add_object(info);
    doc.trailer.set("Info", info_id);

    doc.compress();
    Ok(doc)
}

/// Strips every chapter to plain text and writes it to `target` as paginated paragraphs.
pub async fn render(book: &ExtractedBook, source: &Path, target: &Path) -> Result<()> {
    let sections = text::collect_sections(&book.chapters, source)?;
    let title = book.metadata.title.as_deref();

    let layout = layout(title, &sections);
    debug!(
        "Laid out {} paragraphs on {} pages with {} bookmarks",
        sections.iter().map(|s| s.paragraphs.len()).sum::<usize>(),
        layout.pages.len(),
        layout.outline.len()
    );

    let mut document =
        build_document(title, &book.metadata.authors, &layout).map_err(|e| ConvertError::render("basic", e))?;
    pdf::save(&mut document, target)
        .await
        .map_err(|e| ConvertError::render("basic", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(paragraphs: &[&str]) -> Section {
        Section {
            title: None,
            paragraphs: paragraphs.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn titled(title: &str, paragraphs: &[&str]) -> Section {
        Section {
            title: Some(title.to_string()),
            ..section(paragraphs)
        }
    }

    #[test]
    fn each_section_starts_a_new_page() {
        let sections = vec![section(&["one"]), section(&[]), section(&["two", "three"])];
        let pages = layout(None, &sections).pages;

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].len(), 1);
        assert_eq!(pages[1].iter().map(|l| l.text.as_str()).collect::<Vec<_>>(), vec!["two", "three"]);
    }

    #[test]
    fn title_sits_above_the_first_section() {
        let pages = layout(Some("My Book"), &[section(&["body"])]).pages;

        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0][0].style, Style::Title);
        assert_eq!(pages[0][0].text, "My Book");
        assert!(pages[0][1].y < pages[0][0].y);
    }

    #[test]
    fn long_sections_overflow_onto_more_pages() {
        let paragraphs: Vec<String> = (0..200).map(|i| format!("Paragraph number {i}")).collect();
        let refs: Vec<&str> = paragraphs.iter().map(String::as_str).collect();
        let pages = layout(None, &[section(&refs)]).pages;

        assert!(pages.len() > 1);
        for page in &pages {
            for line in page {
                assert!(line.y >= MARGIN && line.y <= PAGE_HEIGHT - MARGIN);
            }
        }
    }

    #[test]
    fn win_ansi_mapping() {
        assert_eq!(encode_win_ansi("Café “quoted” — ok"), b"Caf\xe9 \x93quoted\x94 \x97 ok".to_vec());
        assert_eq!(encode_win_ansi("日本"), b"??".to_vec());
    }

    #[test]
    fn builds_a_loadable_document() {
        let layout = layout(Some("T"), &[section(&["hello (world)"]), section(&["again"])]);
        let mut doc = build_document(Some("T"), &["A".to_string()], &layout).unwrap();

        let mut data = Vec::new();
        doc.save_to(&mut data).unwrap();
        let loaded = Document::load_mem(&data).unwrap();
        assert_eq!(loaded.get_pages().len(), 2);
        assert!(loaded.catalog().unwrap().get(b"Outlines").is_err());
    }

    #[test]
    fn titled_sections_become_bookmarks() {
        let sections = vec![
            titled("Chapter One", &["first"]),
            titled("Empty", &[]),
            section(&["untitled"]),
            titled("Chapter Three", &["third"]),
        ];
        let layout = layout(Some("Book"), &sections);

        let outline: Vec<(&str, usize)> = layout.outline.iter().map(|e| (e.title.as_str(), e.page)).collect();
        assert_eq!(outline, vec![("Chapter One", 0), ("Chapter Three", 2)]);
        assert_eq!(layout.outline[1].y, PAGE_HEIGHT - MARGIN);
    }

    #[test]
    fn outline_is_written_to_the_catalog() {
        let layout = layout(None, &[titled("Über", &["a"]), titled("Two", &["b"])]);
        let mut doc = build_document(None, &[], &layout).unwrap();

        let mut data = Vec::new();
        doc.save_to(&mut data).unwrap();
        let loaded = Document::load_mem(&data).unwrap();
        let catalog = loaded.catalog().unwrap();
        assert_eq!(catalog.get(b"PageMode").unwrap().as_name().unwrap(), b"UseOutlines");

        let outlines_id = catalog.get(b"Outlines").unwrap().as_reference().unwrap();
        let outlines = loaded.get_dictionary(outlines_id).unwrap();
        assert_eq!(outlines.get(b"Count").unwrap().as_i64().unwrap(), 2);

        let first = loaded
            .get_dictionary(outlines.get(b"First").unwrap().as_reference().unwrap())
            .unwrap();
        let title = first.get(b"Title").unwrap().as_str().unwrap();
        assert_eq!(title, [0xfe, 0xff, 0x00, 0xdc, 0x00, b'b', 0x00, b'e', 0x00, b'r']);
        assert!(first.get(b"Next").is_ok());
    }
}
