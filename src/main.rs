use anyhow::Result;
use clap::Parser;
use colored::*;
use ebook2pdf::{Capabilities, ConversionRequest, Converter, Direction, PageLayout, RendererChoice};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AFTER_HELP: &str = "\
Examples:
  ebook2pdf book.epub
  ebook2pdf book.epub -o out/book.pdf -r basic
  ebook2pdf comic.mobi -l SinglePage -d L2R
  ebook2pdf --check-deps

Page layout options:
  SinglePage      Single page display
  OneColumn       Enable scrolling
  TwoPageLeft     Spread view
  TwoColumnLeft   Spread view with scrolling
  TwoPageRight    Separate cover, spread view (default)
  TwoColumnRight  Separate cover, scrolling spread view

Reading direction options:
  L2R             Left binding
  R2L             Right binding (default)";

#[derive(Parser)]
#[command(name = "ebook2pdf")]
#[command(about = "Convert EPUB and MOBI/AZW e-books into PDF files")]
#[command(version)]
#[command(after_help = AFTER_HELP)]
struct Args {
    /// E-book to convert (.epub, .mobi, .azw, .azw3)
    #[arg(required_unless_present = "check_deps")]
    input: Option<PathBuf>,

    /// Output PDF path (defaults to the input path with a .pdf extension)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Page layout written into the PDF
    #[arg(short = 'l', long = "page-layout", value_enum, default_value_t = PageLayout::default())]
    page_layout: PageLayout,

    /// Reading direction written into the PDF
    #[arg(short = 'd', long = "direction", value_enum, default_value_t = Direction::default())]
    direction: Direction,

    /// Renderer to use
    #[arg(short = 'r', long = "renderer", value_enum, default_value_t = RendererChoice::default())]
    renderer: RendererChoice,

    /// Show detailed progress, including why a renderer fell back
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Check that the required dependencies are installed, then exit
    #[arg(long = "check-deps")]
    check_deps: bool,

    /// Chrome/Chromium executable for the enhanced renderer
    #[arg(long = "chrome-path", env = "CHROME_PATH")]
    chrome_path: Option<PathBuf>,

    /// Launch Chrome without its sandbox (needed when running as root in containers)
    #[arg(long = "no-sandbox")]
    no_sandbox: bool,
}

fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "ebook2pdf=debug" } else { "ebook2pdf=info" };
    let filter = EnvFilter::from_default_env()
        .add_directive("chromiumoxide::conn=off".parse()?)
        .add_directive("chromiumoxide::handler=off".parse()?)
        .add_directive(level.parse()?);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging(args.verbose) {
        eprintln!("{}", format!("Failed to initialise logging: {:#}", e).yellow());
    }

    let capabilities = Capabilities::probe(args.chrome_path.as_deref(), args.no_sandbox);

    if args.check_deps {
        if capabilities.check(args.renderer) {
            println!("{}", "All required dependencies are installed!".green());
            process::exit(0);
        }
        println!("{}", "Some required dependencies are missing.".red());
        process::exit(1);
    }

    let Some(input) = args.input else {
        eprintln!("{}", "❌ No input file given".red());
        process::exit(1);
    };

    let mut request = ConversionRequest::new(input)
        .with_renderer(args.renderer)
        .with_layout(args.page_layout, args.direction);
    if let Some(output) = args.output {
        request = request.with_output(output);
    }

    let converter = Converter::new(capabilities);
    match converter.run(&request).await {
        Ok(report) => report.print(),
        Err(e) => {
            eprintln!("{}", format!("❌ Error during conversion: {}", e).red());
            process::exit(1);
        }
    }
}
