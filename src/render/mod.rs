//! Renderer tiers and the fallback chain that runs them.

pub mod basic;
pub mod enhanced;
pub mod fixed;

use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::capabilities::Capabilities;
use crate::error::{ConvertError, Result};
use crate::extract::{ExtractedBook, ExtractionScope};
use crate::pdf;
use crate::request::{BookFormat, ConversionRequest, RendererChoice};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// External fixed-layout converter.
    Fixed,
    /// Composite HTML printed by headless Chromium.
    Enhanced,
    /// Stripped text flowed into paragraphs.
    Basic,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Enhanced => "enhanced",
            Self::Basic => "basic",
        }
    }

    /// Whether this tier works from the extracted container contents.
    pub fn needs_container(&self) -> bool {
        !matches!(self, Self::Fixed)
    }

    async fn render(&self, ctx: &RenderContext<'_>, target: &Path) -> Result<()> {
        match self {
            Self::Fixed => {
                let python = ctx.capabilities.epub2pdf.as_deref().ok_or_else(|| {
                    ConvertError::MissingDependency("epub2pdf Python package (pip install epub2pdf)".to_string())
                })?;
                fixed::render(ctx.request, python, target)
                    .await
                    .map_err(|e| ConvertError::render(self.name(), e))
            }
            Self::Enhanced => {
                let chrome = ctx.capabilities.chromium.as_deref().ok_or_else(|| {
                    ConvertError::MissingDependency("Chromium/Chrome browser".to_string())
                })?;
                let (book, scope) = ctx.extracted()?;
                enhanced::render(book, scope, chrome, ctx.capabilities.no_sandbox, target)
                    .await
                    .map_err(|e| ConvertError::render(self.name(), e))
            }
            Self::Basic => {
                let (book, _) = ctx.extracted()?;
                basic::render(book, &ctx.request.input, target).await
            }
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered tiers for a validated request.
pub fn plan(choice: RendererChoice, format: BookFormat) -> Vec<Strategy> {
    match (choice, format) {
        (RendererChoice::Auto, BookFormat::Epub) => vec![Strategy::Enhanced, Strategy::Basic],
        (RendererChoice::Auto, BookFormat::Mobi) | (RendererChoice::Fixed, _) => vec![Strategy::Fixed],
        (RendererChoice::Enhanced, _) => vec![Strategy::Enhanced],
        (RendererChoice::Basic, _) => vec![Strategy::Basic],
    }
}

/// Inputs shared by every tier of one run.
pub struct RenderContext<'a> {
    pub request: &'a ConversionRequest,
    pub capabilities: &'a Capabilities,
    pub book: Option<&'a ExtractedBook>,
    pub scope: Option<&'a ExtractionScope>,
}

impl<'a> RenderContext<'a> {
    fn extracted(&self) -> Result<(&'a ExtractedBook, &'a ExtractionScope)> {
        match (self.book, self.scope) {
            (Some(book), Some(scope)) => Ok((book, scope)),
            _ => Err(ConvertError::Render {
                renderer: "pipeline",
                reason: "container contents were not extracted".to_string(),
            }),
        }
    }
}

/// Tries each tier once, in order, and persists the first successful result to `output`.
///
/// Every tier renders into a staging file next to `output`; a failed tier's
/// staging file is removed, so `output` only ever appears complete.
pub async fn render_chain(strategies: &[Strategy], ctx: &RenderContext<'_>, output: &Path) -> Result<Strategy> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let created: Vec<PathBuf> = dir
        .ancestors()
        .take_while(|d| !d.as_os_str().is_empty() && !d.exists())
        .map(Path::to_path_buf)
        .collect();
    fs::create_dir_all(&dir).await?;

    let result = run_tiers(strategies, ctx, &dir, output).await;
    if result.is_err() {
        // Deepest first; only directories this run created and left empty.
        for created_dir in &created {
            if let Err(e) = fs::remove_dir(created_dir).await {
                debug!("Leaving {} in place: {}", created_dir.display(), e);
            }
        }
    }
    result
}

/// Staging file in `dir`, created with the same mode `File::create` would give.
fn staging_file(dir: &Path) -> std::io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(".ebook2pdf-").suffix(".pdf");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        // Applied at creation, so the process umask still masks it.
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    builder.tempfile_in(dir)
}

async fn run_tiers(strategies: &[Strategy], ctx: &RenderContext<'_>, dir: &Path, output: &Path) -> Result<Strategy> {
    let mut last_error = None;
    for (index, strategy) in strategies.iter().enumerate() {
        info!("Rendering with the {} renderer", strategy);
        let staging = staging_file(dir)?;

        match strategy.render(ctx, staging.path()).await {
            Ok(()) => {
                if *strategy != Strategy::Fixed {
                    let request = ctx.request;
                    if let Err(e) =
                        pdf::set_viewer_preferences(staging.path(), request.page_layout, request.direction).await
                    {
                        warn!("Could not set page layout/direction: {:#}", e);
                    }
                }
                staging.persist(output).map_err(|e| ConvertError::Io(e.error))?;
                return Ok(*strategy);
            }
            Err(err) => {
                if let Some(next) = strategies.get(index + 1) {
                    debug!("{} renderer failed, falling back to {}: {}", strategy, next, err);
                }
                last_error = Some(err);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| ConvertError::Render {
        renderer: "pipeline",
        reason: "no renderer selected".to_string(),
    }))
}
