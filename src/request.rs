use clap::ValueEnum;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{ConvertError, Result};

/// Page layout written into the PDF catalog (`/PageLayout`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PageLayout {
    /// Single page display
    #[value(name = "SinglePage")]
    SinglePage,
    /// Enable scrolling
    #[value(name = "OneColumn")]
    OneColumn,
    /// Spread view
    #[value(name = "TwoPageLeft")]
    TwoPageLeft,
    /// Spread view with scrolling
    #[value(name = "TwoColumnLeft")]
    TwoColumnLeft,
    /// Separate cover, spread view
    #[default]
    #[value(name = "TwoPageRight")]
    TwoPageRight,
    /// Separate cover, scrolling spread view
    #[value(name = "TwoColumnRight")]
    TwoColumnRight,
}

impl PageLayout {
    pub fn as_pdf_name(&self) -> &'static str {
        match self {
            Self::SinglePage => "SinglePage",
            Self::OneColumn => "OneColumn",
            Self::TwoPageLeft => "TwoPageLeft",
            Self::TwoColumnLeft => "TwoColumnLeft",
            Self::TwoPageRight => "TwoPageRight",
            Self::TwoColumnRight => "TwoColumnRight",
        }
    }
}

impl fmt::Display for PageLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_pdf_name())
    }
}

/// Reading direction written into `/ViewerPreferences /Direction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Direction {
    /// Left binding
    #[value(name = "L2R")]
    L2R,
    /// Right binding
    #[default]
    #[value(name = "R2L")]
    R2L,
}

impl Direction {
    pub fn as_pdf_name(&self) -> &'static str {
        match self {
            Self::L2R => "L2R",
            Self::R2L => "R2L",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_pdf_name())
    }
}

/// Which renderer tiers a run may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RendererChoice {
    /// Enhanced with basic fallback for EPUB, fixed layout for MOBI/AZW
    #[default]
    Auto,
    /// Delegate to the external epub2pdf fixed-layout converter
    Fixed,
    /// HTML rendering through headless Chromium
    Enhanced,
    /// Plain text flowed into paragraphs
    Basic,
}

impl RendererChoice {
    /// Extensions (lowercase, with the leading dot) this choice can convert.
    pub fn supported_extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Auto | Self::Fixed => &[".epub", ".mobi", ".azw", ".azw3"],
            Self::Enhanced | Self::Basic => &[".epub"],
        }
    }
}

/// Container format of a validated input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookFormat {
    Epub,
    Mobi,
}

impl BookFormat {
    fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            ".epub" => Some(Self::Epub),
            ".mobi" | ".azw" | ".azw3" => Some(Self::Mobi),
            _ => None,
        }
    }
}

/// One invocation's worth of arguments. Immutable once built.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub page_layout: PageLayout,
    pub direction: Direction,
    pub renderer: RendererChoice,
}

impl ConversionRequest {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: None,
            page_layout: PageLayout::default(),
            direction: Direction::default(),
            renderer: RendererChoice::default(),
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_renderer(mut self, renderer: RendererChoice) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_layout(mut self, page_layout: PageLayout, direction: Direction) -> Self {
        self.page_layout = page_layout;
        self.direction = direction;
        self
    }

    pub fn output_path(&self) -> PathBuf {
        resolve_output_path(&self.input, self.output.as_deref())
    }
}

/// Checks that `path` exists and carries an extension `choice` can convert.
pub fn validate_input(path: &Path, choice: RendererChoice) -> Result<BookFormat> {
    if !path.exists() {
        return Err(ConvertError::FileNotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default();

    let supported = choice.supported_extensions();
    if !supported.contains(&extension.as_str()) {
        return Err(ConvertError::UnsupportedFormat {
            extension,
            supported: supported.to_vec(),
        });
    }

    BookFormat::from_extension(&extension).ok_or_else(|| ConvertError::UnsupportedFormat {
        extension,
        supported: supported.to_vec(),
    })
}

/// The explicit output path if given, otherwise the input with its extension swapped for `.pdf`.
pub fn resolve_output_path(input: &Path, output: Option<&Path>) -> PathBuf {
    match output {
        Some(path) => path.to_path_buf(),
        None => input.with_extension("pdf"),
    }
}
