//! # ebook2pdf
//!
//! A CLI utility to convert EPUB and MOBI/AZW e-books into PDF files.
//!
//! ## Renderers
//!
//! - **enhanced**: chapters are stitched into one HTML document with their images
//!   and printed by headless Chromium
//! - **basic**: plain text flowed into paginated paragraphs, no browser needed
//! - **fixed**: hands the book to the `epub2pdf` Python package, used for
//!   fixed-layout EPUB and MOBI/AZW/AZW3
//!
//! With the default `auto` renderer an EPUB is tried with enhanced first and
//! falls back to basic; MOBI-family files go to fixed.
//!
//! ## Usage
//!
//! ```bash
//! ebook2pdf book.epub
//! ebook2pdf comic.mobi -o comic.pdf -l SinglePage -d L2R
//! ebook2pdf --check-deps
//! ```

mod capabilities;
mod container;
mod converter;
mod error;
mod extract;
mod html;
mod pdf;
mod render;
mod report;
mod request;
mod text;

pub use capabilities::Capabilities;
pub use container::{BookContainer, Metadata};
pub use converter::Converter;
pub use error::{ConvertError, Result};
pub use extract::{extract, Chapter, ExtractedBook, ExtractionScope, ImageMap};
pub use render::Strategy;
pub use report::ConversionReport;
pub use request::{ConversionRequest, Direction, PageLayout, RendererChoice};
