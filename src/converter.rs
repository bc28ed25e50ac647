use colored::*;
use tracing::debug;

use crate::capabilities::Capabilities;
use crate::container::BookContainer;
use crate::error::Result;
use crate::extract::{self, ExtractionScope};
use crate::render::{self, RenderContext, Strategy};
use crate::report::ConversionReport;
use crate::request::{validate_input, BookFormat, ConversionRequest};

/// Runs one request through validation, extraction, the renderer tiers and reporting.
pub struct Converter {
    capabilities: Capabilities,
}

impl Converter {
    pub fn new(capabilities: Capabilities) -> Self {
        Self { capabilities }
    }

    pub async fn run(&self, request: &ConversionRequest) -> Result<ConversionReport> {
        let format = validate_input(&request.input, request.renderer)?;
        let output = request.output_path();
        let strategies = render::plan(request.renderer, format);
        debug!("Renderer tiers: {:?}", strategies);

        println!(
            "Converting {} to {}...",
            request.input.display().to_string().green(),
            output.display().to_string().blue()
        );
        println!("Page layout: {}", request.page_layout);
        println!("Reading direction: {}", request.direction);

        let needs_container = strategies.iter().any(Strategy::needs_container);

        let (strategy, title, image_count) = if needs_container {
            let container = BookContainer::open(&request.input)?;
            let scope = ExtractionScope::new()?;
            let book = extract::extract(&container, &scope)?;
            drop(container);

            let ctx = RenderContext {
                request,
                capabilities: &self.capabilities,
                book: Some(&book),
                scope: Some(&scope),
            };
            let strategy = render::render_chain(&strategies, &ctx, &output).await?;
            (strategy, book.metadata.title.clone(), Some(book.images.len()))
        } else {
            let (title, image_count) = match format {
                BookFormat::Epub => match BookContainer::open(&request.input) {
                    Ok(container) => (container.metadata().title.clone(), Some(container.image_count())),
                    Err(e) => {
                        debug!("Could not inspect container: {}", e);
                        (None, None)
                    }
                },
                BookFormat::Mobi => (None, None),
            };

            let ctx = RenderContext {
                request,
                capabilities: &self.capabilities,
                book: None,
                scope: None,
            };
            let strategy = render::render_chain(&strategies, &ctx, &output).await?;
            (strategy, title, image_count)
        };

        ConversionReport::inspect(&output, strategy, title, image_count).await
    }
}
