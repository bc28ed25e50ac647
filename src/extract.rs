use lol_html::{element, rewrite_str, RewriteStrSettings};
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use url::Url;

use crate::container::{resolve_href, BookContainer, BookItem, Metadata};
use crate::error::{ConvertError, Result};

/// Temporary directory holding everything extracted for one run.
///
/// The directory and its contents are removed when the scope is dropped, which
/// covers early returns, errors and unwinding alike.
pub struct ExtractionScope {
    dir: TempDir,
}

impl ExtractionScope {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("ebook2pdf-").tempdir()?;
        debug!("Created extraction directory {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn images_dir(&self) -> PathBuf {
        self.dir.path().join("images")
    }
}

/// In-archive image path to extracted file path.
#[derive(Debug, Clone, Default)]
pub struct ImageMap {
    entries: BTreeMap<String, PathBuf>,
}

impl ImageMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, archive_path: impl Into<String>, extracted: impl Into<PathBuf>) {
        self.entries.insert(archive_path.into(), extracted.into());
    }

    pub fn get(&self, archive_path: &str) -> Option<&Path> {
        self.entries.get(archive_path).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A decoded document item ready for rendering.
#[derive(Debug, Clone)]
pub struct Chapter {
    /// Path of the document inside the archive.
    pub name: String,
    /// Full HTML with image references pointing at extracted files.
    pub html: String,
    pub title: Option<String>,
}

/// Everything pulled out of a container.
#[derive(Debug)]
pub struct ExtractedBook {
    pub metadata: Metadata,
    pub chapters: Vec<Chapter>,
    pub images: ImageMap,
}

/// Pulls documents and images out of `container`, writing images into `scope`.
pub fn extract(container: &BookContainer, scope: &ExtractionScope) -> Result<ExtractedBook> {
    let images_dir = scope.images_dir();
    fs::create_dir_all(&images_dir)?;

    let mut metadata = Metadata::default();
    let mut documents = Vec::new();
    let mut images = ImageMap::new();

    for item in container.items() {
        match item? {
            BookItem::Metadata(meta) => {
                for (key, value) in meta.pairs() {
                    debug!("Metadata {}: {}", key, value);
                }
                metadata = meta;
            }
            BookItem::Document { name, content } => {
                let html = decode_document(&name, &content)?;
                debug!("Decoded document {} ({} bytes)", name, content.len());
                documents.push((name, html));
            }
            BookItem::Image { name, content } => {
                let dest = images_dir.join(format!("{:04}_{}", images.len(), file_name(&name)));
                fs::write(&dest, &content)?;
                debug!("Extracted image {} -> {}", name, dest.display());
                images.insert(name, dest);
            }
        }
    }

    let chapters: Vec<Chapter> = documents
        .into_iter()
        .map(|(name, html)| {
            let html = rewrite_image_references(&html, &name, &images);
            let title = chapter_title(&html);
            Chapter { name, html, title }
        })
        .collect();

    info!("Extracted {} documents and {} images", chapters.len(), images.len());

    Ok(ExtractedBook {
        metadata,
        chapters,
        images,
    })
}

/// Decodes a document's bytes as UTF-8, ignoring a leading byte order mark.
pub fn decode_document(name: &str, content: &[u8]) -> Result<String> {
    let content = content.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(content);
    std::str::from_utf8(content)
        .map(str::to_string)
        .map_err(|source| ConvertError::Decode {
            name: name.to_string(),
            source,
        })
}

/// Points every `img`/`image` reference that resolves to an extracted image at its file URL.
///
/// Only the `src`, `href` and `xlink:href` attributes of `img`/`image` elements are
/// touched; text content and comments pass through unchanged.
pub fn rewrite_image_references(html: &str, document: &str, images: &ImageMap) -> String {
    if images.is_empty() {
        return html.to_string();
    }

    let target = |value: &str| {
        let path = resolve_href(document, &html_escape::decode_html_entities(value))?;
        let extracted = images.get(&path)?;
        let url = Url::from_file_path(extracted).ok()?;
        // Percent-encoded so the attribute value needs no entity escaping.
        Some(url.as_str().replace('&', "%26"))
    };

    let rewritten = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("*", |el| {
                let tag = el.tag_name();
                if tag != "img" && tag != "image" && !tag.ends_with(":image") {
                    return Ok(());
                }
                for attribute in ["src", "href", "xlink:href"] {
                    if let Some(url) = el.get_attribute(attribute).and_then(|value| target(&value)) {
                        el.set_attribute(attribute, &url)?;
                    }
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    );

    match rewritten {
        Ok(rewritten) => rewritten,
        Err(e) => {
            warn!("Could not rewrite image references in {}: {}", document, e);
            html.to_string()
        }
    }
}

fn chapter_title(html: &str) -> Option<String> {
    let parsed = Html::parse_document(html);
    for selector_str in ["h1", "h2", "h3", "title"] {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(element) = parsed.select(&selector).next() {
            let text = element.text().collect::<Vec<_>>().join(" ");
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

fn file_name(archive_path: &str) -> String {
    Path::new(archive_path)
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| "image.bin".to_string())
}
