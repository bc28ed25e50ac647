use anyhow::{anyhow, Result};
use lopdf::{Dictionary, Document, Object};
use std::path::Path;
use tokio::fs;
use tracing::debug;

use crate::request::{Direction, PageLayout};

pub async fn load(path: &Path) -> Result<Document> {
    let data = fs::read(path)
        .await
        .map_err(|e| anyhow!("Failed to read PDF file {}: {}", path.display(), e))?;

    Document::load_mem(&data).map_err(|e| anyhow!("Failed to parse PDF file {}: {}", path.display(), e))
}

pub async fn save(document: &mut Document, path: &Path) -> Result<()> {
    let mut data = Vec::new();
    document
        .save_to(&mut data)
        .map_err(|e| anyhow!("Failed to serialize PDF: {}", e))?;

    fs::write(path, data)
        .await
        .map_err(|e| anyhow!("Failed to write PDF to {}: {}", path.display(), e))
}

/// Number of pages in the PDF at `path`.
pub async fn page_count(path: &Path) -> Result<usize> {
    let document = load(path).await?;
    let pages = document.get_pages().len();
    debug!("Loaded PDF with {} pages from {}", pages, path.display());
    Ok(pages)
}

/// Writes `/PageLayout` and `/ViewerPreferences /Direction` into the document catalog.
pub fn apply_viewer_preferences(document: &mut Document, layout: PageLayout, direction: Direction) -> Result<()> {
    let root_id = document
        .trailer
        .get(b"Root")
        .and_then(|root| root.as_reference())
        .map_err(|e| anyhow!("PDF has no catalog: {}", e))?;

    let existing = match document.catalog().and_then(|catalog| catalog.get(b"ViewerPreferences")) {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        Ok(Object::Reference(id)) => document
            .get_object(*id)
            .and_then(|obj| obj.as_dict())
            .cloned()
            .unwrap_or_default(),
        _ => Dictionary::new(),
    };

    let mut preferences = existing;
    preferences.set("Direction", Object::Name(direction.as_pdf_name().as_bytes().to_vec()));

    let catalog = document
        .get_object_mut(root_id)
        .and_then(|obj| obj.as_dict_mut())
        .map_err(|e| anyhow!("PDF catalog is not a dictionary: {}", e))?;
    catalog.set("PageLayout", Object::Name(layout.as_pdf_name().as_bytes().to_vec()));
    catalog.set("ViewerPreferences", Object::Dictionary(preferences));

    debug!("Set page layout {} and direction {}", layout, direction);
    Ok(())
}

/// Loads `path`, applies the viewer preferences and writes it back in place.
pub async fn set_viewer_preferences(path: &Path, layout: PageLayout, direction: Direction) -> Result<()> {
    let mut document = load(path).await?;
    apply_viewer_preferences(&mut document, layout, direction)?;
    save(&mut document, path).await
}
