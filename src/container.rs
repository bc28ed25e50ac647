use rbook::prelude::*;
use rbook::prelude::{ManifestEntry as _, Metadata as _};
use rbook::Epub;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use url::Url;

use crate::error::{ConvertError, Result};

/// Title/author style key-value data from the package metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub language: Option<String>,
    pub publisher: Option<String>,
}

impl Metadata {
    fn from_epub(epub: &Epub) -> Self {
        let meta = epub.metadata();
        Self {
            title: meta.title().map(|t| t.value().to_string()),
            authors: meta.creators().map(|c| c.value().to_string()).collect(),
            language: meta.languages().next().map(|l| l.value().to_string()),
            publisher: meta.publishers().next().map(|p| p.value().to_string()),
        }
    }

    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(title) = &self.title {
            pairs.push(("title", title.clone()));
        }
        for author in &self.authors {
            pairs.push(("creator", author.clone()));
        }
        if let Some(language) = &self.language {
            pairs.push(("language", language.clone()));
        }
        if let Some(publisher) = &self.publisher {
            pairs.push(("publisher", publisher.clone()));
        }
        pairs
    }
}

/// One entry enumerated out of the container.
#[derive(Debug, Clone)]
pub enum BookItem {
    Metadata(Metadata),
    /// An (X)HTML fragment; `name` is its path inside the archive.
    Document { name: String, content: Vec<u8> },
    /// An image; `name` is its path inside the archive.
    Image { name: String, content: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub id: String,
    /// Decoded path relative to the archive root.
    pub path: String,
    pub media_type: String,
}

impl ManifestEntry {
    fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }

    fn is_document(&self) -> bool {
        matches!(self.media_type.as_str(), "application/xhtml+xml" | "text/html")
    }
}

/// An opened EPUB, read through `rbook`.
pub struct BookContainer {
    path: PathBuf,
    epub: Epub,
    metadata: Metadata,
    manifest: Vec<ManifestEntry>,
    spine: Vec<String>,
}

impl BookContainer {
    pub fn open(path: &Path) -> Result<Self> {
        let epub = Epub::options()
            .strict(false)
            .open(path)
            .map_err(|e| ConvertError::container(path, e))?;

        let manifest: Vec<ManifestEntry> = epub
            .manifest()
            .entries()
            .map(|entry| ManifestEntry {
                id: entry.id().to_string(),
                path: archive_path(entry.href().as_str()),
                media_type: entry.media_type().to_string(),
            })
            .collect();
        if manifest.is_empty() {
            return Err(ConvertError::container(path, "package manifest is empty"));
        }

        let spine: Vec<String> = epub.spine().entries().map(|item| item.idref().to_string()).collect();
        let metadata = Metadata::from_epub(&epub);

        debug!(
            "Opened {} ({} manifest items, {} spine items)",
            path.display(),
            manifest.len(),
            spine.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            epub,
            metadata,
            manifest,
            spine,
        })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn image_count(&self) -> usize {
        self.manifest.iter().filter(|entry| entry.is_image()).count()
    }

    /// Enumerates the container: metadata, spine documents in spine order, then images in
    /// manifest order. Entries are read lazily as the iterator advances.
    pub fn items(&self) -> Items<'_> {
        let mut queue = Vec::new();

        for idref in &self.spine {
            match self.manifest.iter().position(|entry| &entry.id == idref) {
                Some(index) if self.manifest[index].is_document() => queue.push(index),
                Some(index) => debug!(
                    "Skipping spine item {} with media type {}",
                    idref, self.manifest[index].media_type
                ),
                None => warn!("Spine references unknown manifest item {}", idref),
            }
        }
        queue.extend(
            self.manifest
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.is_image())
                .map(|(index, _)| index),
        );

        Items {
            container: self,
            metadata_sent: false,
            queue: queue.into_iter(),
        }
    }

    fn read_entry(&self, entry: &ManifestEntry) -> Result<Vec<u8>> {
        let manifest = self.epub.manifest();
        let item = manifest
            .by_id(&entry.id)
            .ok_or_else(|| ConvertError::container(&self.path, format!("{}: missing from manifest", entry.path)))?;
        item.read_bytes()
            .map_err(|e| ConvertError::container(&self.path, format!("{}: {}", entry.path, e)))
    }
}

pub struct Items<'a> {
    container: &'a BookContainer,
    metadata_sent: bool,
    queue: std::vec::IntoIter<usize>,
}

impl Iterator for Items<'_> {
    type Item = Result<BookItem>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.metadata_sent {
            self.metadata_sent = true;
            return Some(Ok(BookItem::Metadata(self.container.metadata.clone())));
        }

        let entry = &self.container.manifest[self.queue.next()?];
        let item = self.container.read_entry(entry).map(|content| {
            let name = entry.path.clone();
            if entry.is_image() {
                BookItem::Image { name, content }
            } else {
                BookItem::Document { name, content }
            }
        });
        Some(item)
    }
}

/// Manifest hrefs come back absolute and percent-encoded; keys are decoded and root-relative.
fn archive_path(href: &str) -> String {
    let decoded = urlencoding::decode(href).map(|d| d.into_owned()).unwrap_or_else(|_| href.to_string());
    decoded.trim_start_matches('/').to_string()
}

/// Resolves `href` against the archive path `base` of the referencing file.
///
/// Returns the decoded archive path, or `None` for references leaving the archive
/// (`http:`, `data:` and the like). Query and fragment are dropped.
pub fn resolve_href(base: &str, href: &str) -> Option<String> {
    let root = Url::parse("file:///").ok()?;
    let base = root.join(base).ok()?;
    let target = base.join(href.trim()).ok()?;
    if target.scheme() != "file" || target.host().is_some() {
        return None;
    }
    let path = archive_path(target.path());
    (!path.is_empty()).then_some(path)
}
