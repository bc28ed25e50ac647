use anyhow::{anyhow, bail, Result};
use std::path::Path;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

use crate::request::ConversionRequest;

/// Hands the whole conversion to `python -m epub2pdf`, which understands fixed-layout
/// EPUB as well as MOBI/AZW/AZW3 and writes page layout and direction itself.
pub async fn render(request: &ConversionRequest, python: &Path, target: &Path) -> Result<()> {
    info!(
        "Delegating to epub2pdf (layout {}, direction {})",
        request.page_layout, request.direction
    );

    let mut command = Command::new(python);
    command
        .args(["-m", "epub2pdf"])
        .arg(&request.input)
        .arg("-o")
        .arg(target)
        .args(["-l", request.page_layout.as_pdf_name()])
        .args(["-d", request.direction.as_pdf_name()]);
    debug!("Running {:?}", command);

    let output = command
        .output()
        .await
        .map_err(|e| anyhow!("Failed to run {}: {}", python.display(), e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("epub2pdf exited with {}: {}", output.status, stderr.trim());
    }

    let written = fs::metadata(target).await.map(|m| m.len()).unwrap_or(0);
    if written == 0 {
        bail!("epub2pdf reported success but wrote no output to {}", target.display());
    }

    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn fake_python(dir: &Path, script: &str) -> std::path::PathBuf {
        let path = dir.join("python");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn passes_layout_and_direction_through() {
        let dir = tempfile::tempdir().unwrap();
        // $5 is the -o value; record the argument list into it.
        let python = fake_python(dir.path(), r#"echo "$@" > "$5""#);
        let target = dir.path().join("out.pdf");
        let request = ConversionRequest::new("comic.mobi");

        render(&request, &python, &target).await.unwrap();

        let args = std::fs::read_to_string(&target).unwrap();
        assert!(args.contains("-m epub2pdf comic.mobi -o"), "{args}");
        assert!(args.trim_end().ends_with("-l TwoPageRight -d R2L"), "{args}");
    }

    #[tokio::test]
    async fn failure_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let python = fake_python(dir.path(), "echo 'bad archive' >&2; exit 3");
        let target = dir.path().join("out.pdf");

        let err = render(&ConversionRequest::new("comic.mobi"), &python, &target)
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("bad archive"));
    }
}
