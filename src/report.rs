use colored::*;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

use crate::error::Result;
use crate::pdf;
use crate::render::Strategy;

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct ConversionReport {
    pub output: PathBuf,
    pub renderer: Strategy,
    pub title: Option<String>,
    pub size_bytes: u64,
    /// `None` when the input was not read through the container reader.
    pub image_count: Option<usize>,
    /// `None` when the PDF could not be introspected.
    pub page_count: Option<usize>,
}

impl ConversionReport {
    /// Stats the rendered file. Never modifies it.
    pub async fn inspect(
        output: &Path,
        renderer: Strategy,
        title: Option<String>,
        image_count: Option<usize>,
    ) -> Result<Self> {
        let size_bytes = fs::metadata(output).await?.len();

        let page_count = match pdf::page_count(output).await {
            Ok(pages) => Some(pages),
            Err(e) => {
                warn!("Skipping page count: {:#}", e);
                None
            }
        };

        Ok(Self {
            output: output.to_path_buf(),
            renderer,
            title,
            size_bytes,
            image_count,
            page_count,
        })
    }

    pub fn size_megabytes(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }

    pub fn print(&self) {
        println!(
            "{} {}",
            "✅ Conversion successful! Output saved to:".green(),
            self.output.display().to_string().blue()
        );
        println!("   Renderer:  {}", self.renderer);
        if let Some(title) = &self.title {
            println!("   Title:     {}", title);
        }
        println!(
            "   File size: {} bytes ({:.2} MB)",
            self.size_bytes,
            self.size_megabytes()
        );
        match self.image_count {
            Some(count) => println!("   Images:    {}", count),
            None => println!("   Images:    n/a"),
        }
        if let Some(pages) = self.page_count {
            println!("   Pages:     {}", pages);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreadable_pdf_skips_page_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        std::fs::write(&path, vec![b'x'; 2048]).unwrap();

        let report = ConversionReport::inspect(&path, Strategy::Fixed, None, None).await.unwrap();

        assert_eq!(report.size_bytes, 2048);
        assert_eq!(report.page_count, None);
        assert!((report.size_megabytes() - 2048.0 / 1048576.0).abs() < f64::EPSILON);
        assert_eq!(std::fs::read(&path).unwrap(), vec![b'x'; 2048]);
    }

    #[tokio::test]
    async fn missing_output_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ConversionReport::inspect(&dir.path().join("none.pdf"), Strategy::Basic, None, Some(0)).await;
        assert!(result.is_err());
    }
}
