use anyhow::{anyhow, Result};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures_util::StreamExt;
use std::path::Path;
use tokio::fs;
use tracing::{debug, error, info};
use url::Url;

use crate::extract::{ExtractedBook, ExtractionScope};
use crate::html;

#[derive(Debug, Clone)]
pub struct PdfOptions {
    pub scale: f64,
    pub paper_width: f64,
    pub paper_height: f64,
    pub margin_top: f64,
    pub margin_right: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
}

impl Default for PdfOptions {
    fn default() -> Self {
        // A4 in inches; the stylesheet's @page rule provides the margins.
        Self {
            scale: 1.0,
            paper_width: 8.27,
            paper_height: 11.69,
            margin_top: 0.0,
            margin_right: 0.0,
            margin_bottom: 0.0,
            margin_left: 0.0,
        }
    }
}

impl PdfOptions {
    fn params(&self) -> PrintToPdfParams {
        PrintToPdfParams {
            print_background: Some(true),
            prefer_css_page_size: Some(true),
            scale: Some(self.scale),
            paper_width: Some(self.paper_width),
            paper_height: Some(self.paper_height),
            margin_top: Some(self.margin_top),
            margin_right: Some(self.margin_right),
            margin_bottom: Some(self.margin_bottom),
            margin_left: Some(self.margin_left),
            ..Default::default()
        }
    }
}

/// Assembles the book into one HTML file inside `scope` and prints it to `target` with Chromium.
pub async fn render(
    book: &ExtractedBook,
    scope: &ExtractionScope,
    chrome: &Path,
    no_sandbox: bool,
    target: &Path,
) -> Result<()> {
    let document = html::assemble(&book.metadata, &book.chapters);
    let document_path = scope.path().join("book.html");
    fs::write(&document_path, &document)
        .await
        .map_err(|e| anyhow!("Failed to write composite HTML: {}", e))?;
    debug!("Composite HTML written to {} ({} bytes)", document_path.display(), document.len());

    let url = Url::from_file_path(&document_path)
        .map_err(|_| anyhow!("Cannot build a file URL for {}", document_path.display()))?;

    let mut builder = BrowserConfig::builder().chrome_executable(chrome);
    if no_sandbox {
        builder = builder.no_sandbox();
    }
    let config = builder
        .build()
        .map_err(|e| anyhow!("Failed to create browser config: {}", e))?;

    let (mut browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|e| anyhow!("Failed to launch browser: {}", e))?;

    let handle = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if let Err(err) = h {
                // Only log if it's not a common websocket deserialization error
                let err_str = err.to_string();
                if !err_str.contains("data did not match any variant") && !err_str.contains("untagged enum Message") {
                    error!("Browser handler error: {}", err);
                } else {
                    debug!("Chrome protocol message ignored: {}", err);
                }
            }
        }
    });

    let result = print_document(&browser, &url, target, &PdfOptions::default()).await;

    browser.close().await.ok();
    handle.abort();

    result
}

async fn print_document(browser: &Browser, url: &Url, target: &Path, options: &PdfOptions) -> Result<()> {
    info!("Printing \"{}\" to PDF", url);

    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| anyhow!("Failed to create new page: {}", e))?;

    page.goto(url.as_str())
        .await
        .map_err(|e| anyhow!("Failed to navigate to {}: {}", url, e))?;

    page.wait_for_navigation()
        .await
        .map_err(|e| anyhow!("Failed to wait for navigation: {}", e))?;

    wait_for_images(&page).await?;

    let pdf_data = page
        .pdf(options.params())
        .await
        .map_err(|e| anyhow!("Failed to generate PDF: {}", e))?;

    if pdf_data.is_empty() {
        return Err(anyhow!("Browser returned an empty PDF"));
    }

    fs::write(target, pdf_data)
        .await
        .map_err(|e| anyhow!("Failed to write PDF to {}: {}", target.display(), e))?;

    Ok(())
}

async fn wait_for_images(page: &Page) -> Result<()> {
    let js_code = r#"
        Promise.all(Array.from(document.images)
            .filter(img => !img.complete)
            .map(img => new Promise(resolve => { img.onload = img.onerror = resolve; })))
            .then(() => true)
    "#;

    page.evaluate(js_code)
        .await
        .map_err(|e| anyhow!("Failed to wait for images: {}", e))?;

    Ok(())
}
