use colored::*;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use crate::request::RendererChoice;

const CHROME_EXECUTABLES: [&str; 5] = [
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];
const PYTHON_EXECUTABLES: [&str; 2] = ["python3", "python"];

/// What this machine can do, probed once at startup and handed to the pipeline.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    /// Chromium/Chrome executable used by the enhanced renderer.
    pub chromium: Option<PathBuf>,
    /// Python interpreter that can `import epub2pdf`, used by the fixed-layout renderer.
    pub epub2pdf: Option<PathBuf>,
    /// Pass `--no-sandbox` when launching Chromium.
    pub no_sandbox: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    ContainerReader,
    TextFlowPdf,
    PdfIntrospection,
    Chromium,
    Epub2Pdf,
}

impl Dependency {
    pub const ALL: [Dependency; 5] = [
        Self::ContainerReader,
        Self::TextFlowPdf,
        Self::PdfIntrospection,
        Self::Chromium,
        Self::Epub2Pdf,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::ContainerReader => "e-book container reader (zip, quick-xml)",
            Self::TextFlowPdf => "paragraph-flow PDF generator (lopdf)",
            Self::PdfIntrospection => "PDF page-count introspection (lopdf)",
            Self::Chromium => "Chromium/Chrome browser (enhanced renderer)",
            Self::Epub2Pdf => "epub2pdf Python package (fixed-layout renderer)",
        }
    }
}

/// One line of the dependency probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyStatus {
    pub dependency: Dependency,
    pub available: bool,
    pub required: bool,
    pub location: Option<PathBuf>,
}

impl Capabilities {
    /// Probes the system. `chrome_path` pins the browser instead of searching `PATH`.
    pub fn probe(chrome_path: Option<&Path>, no_sandbox: bool) -> Self {
        let chromium = match chrome_path {
            Some(path) if path.is_file() => Some(path.to_path_buf()),
            Some(path) => {
                debug!("Configured Chrome executable {} does not exist", path.display());
                None
            }
            None => discover_chromium(),
        };

        Self {
            chromium,
            epub2pdf: discover_epub2pdf(),
            no_sandbox,
        }
    }

    pub fn is_available(&self, dependency: Dependency) -> bool {
        match dependency {
            Dependency::ContainerReader | Dependency::TextFlowPdf | Dependency::PdfIntrospection => true,
            Dependency::Chromium => self.chromium.is_some(),
            Dependency::Epub2Pdf => self.epub2pdf.is_some(),
        }
    }

    pub fn statuses(&self, choice: RendererChoice) -> Vec<DependencyStatus> {
        let required = required_for(choice);
        Dependency::ALL
            .iter()
            .map(|&dependency| DependencyStatus {
                dependency,
                available: self.is_available(dependency),
                required: required.contains(&dependency),
                location: match dependency {
                    Dependency::Chromium => self.chromium.clone(),
                    Dependency::Epub2Pdf => self.epub2pdf.clone(),
                    _ => None,
                },
            })
            .collect()
    }

    /// Prints one line per dependency and returns whether every required one resolved.
    pub fn check(&self, choice: RendererChoice) -> bool {
        let statuses = self.statuses(choice);

        for status in &statuses {
            let kind = if status.required { "required" } else { "optional" };
            let location = status
                .location
                .as_ref()
                .map(|path| format!(" [{}]", path.display()))
                .unwrap_or_default();
            if status.available {
                println!("✅ {} ({}){}", status.dependency.label(), kind, location.blue());
            } else if status.required {
                println!("{}", format!("❌ {} ({}): not found", status.dependency.label(), kind).red());
            } else {
                println!("{}", format!("⚠️  {} ({}): not found", status.dependency.label(), kind).yellow());
            }
        }

        if !self.is_available(Dependency::Epub2Pdf) {
            print_epub2pdf_hint();
        }

        statuses.iter().all(|s| !s.required || s.available)
    }
}

/// Dependencies that must resolve for `choice` to be usable at all.
pub fn required_for(choice: RendererChoice) -> Vec<Dependency> {
    let mut required = vec![Dependency::ContainerReader, Dependency::TextFlowPdf];
    match choice {
        RendererChoice::Enhanced => required.push(Dependency::Chromium),
        RendererChoice::Fixed => required = vec![Dependency::Epub2Pdf],
        RendererChoice::Auto | RendererChoice::Basic => {}
    }
    required
}

pub fn print_epub2pdf_hint() {
    println!("To enable the fixed-layout renderer install epub2pdf using one of the following methods:");
    println!("  1. pip install epub2pdf");
    println!("  2. pip install git+https://github.com/mashu3/epub2pdf.git");
}

fn discover_chromium() -> Option<PathBuf> {
    for exe in CHROME_EXECUTABLES {
        if let Ok(path) = which::which(exe) {
            debug!("Found Chrome executable: {}", path.display());
            return Some(path);
        }
    }
    debug!("Chrome executable not found in PATH");
    None
}

fn discover_epub2pdf() -> Option<PathBuf> {
    for exe in PYTHON_EXECUTABLES {
        let Ok(python) = which::which(exe) else {
            continue;
        };
        let importable = Command::new(&python)
            .args(["-c", "import epub2pdf"])
            .output()
            .is_ok_and(|o| o.status.success());
        if importable {
            debug!("epub2pdf importable from {}", python.display());
            return Some(python);
        }
    }
    debug!("epub2pdf not importable from any Python interpreter");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare() -> Capabilities {
        Capabilities::default()
    }

    #[test]
    fn builtins_are_always_available() {
        let caps = bare();
        assert!(caps.is_available(Dependency::ContainerReader));
        assert!(caps.is_available(Dependency::TextFlowPdf));
        assert!(caps.is_available(Dependency::PdfIntrospection));
        assert!(!caps.is_available(Dependency::Chromium));
    }

    #[test]
    fn auto_and_basic_only_require_builtins() {
        assert!(bare().check(RendererChoice::Auto));
        assert!(bare().check(RendererChoice::Basic));
    }

    #[test]
    fn explicit_renderers_require_their_backend() {
        assert!(!bare().check(RendererChoice::Enhanced));
        assert!(!bare().check(RendererChoice::Fixed));

        let caps = Capabilities {
            chromium: Some(PathBuf::from("/usr/bin/chromium")),
            ..Default::default()
        };
        assert!(caps.check(RendererChoice::Enhanced));
    }

    #[test]
    fn statuses_cover_every_dependency() {
        let statuses = bare().statuses(RendererChoice::Fixed);
        assert_eq!(statuses.len(), Dependency::ALL.len());
        let epub2pdf = statuses.iter().find(|s| s.dependency == Dependency::Epub2Pdf).unwrap();
        assert!(epub2pdf.required);
        assert!(!epub2pdf.available);
    }

    #[test]
    fn missing_configured_chrome_is_unavailable() {
        let caps = Capabilities::probe(Some(Path::new("/nonexistent/chrome-binary")), false);
        assert!(caps.chromium.is_none());
    }
}
