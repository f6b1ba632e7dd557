use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

use crate::source::OcrEngine;

/// OCR backend using poppler's `pdftoppm` to rasterize pages and the
/// `tesseract` CLI to recognize them.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    dpi: u32,
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self { dpi: 300 }
    }
}

impl TesseractOcr {
    /// Check whether both external tools can be launched.
    #[must_use]
    pub fn is_available() -> bool {
        ["pdftoppm", "tesseract"].iter().all(|tool| {
            Command::new(tool)
                .arg("-v")
                .output()
                .map(|o| o.status.success() || !o.stderr.is_empty())
                .unwrap_or(false)
        })
    }

    fn rasterize(
        &self,
        pdf_path: &Path,
        out_dir: &Path,
        max_pages: usize,
    ) -> io::Result<Vec<PathBuf>> {
        let prefix = out_dir.join("page");
        let output = Command::new("pdftoppm")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-l")
            .arg(max_pages.to_string())
            .arg("-png")
            .arg(pdf_path)
            .arg(&prefix)
            .output()?;
        if !output.status.success() {
            return Err(io::Error::other(format!(
                "pdftoppm exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let mut images = std::fs::read_dir(out_dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "png"))
            .collect::<Vec<_>>();
        // pdftoppm zero-pads page numbers, so lexical order is page order.
        images.sort();
        Ok(images)
    }

    fn recognize(image: &Path, language: &str) -> io::Result<String> {
        let output = Command::new("tesseract")
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(language)
            .output()?;
        if !output.status.success() {
            return Err(io::Error::other(format!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn run(&self, pdf_bytes: &[u8], language: &str, max_pages: usize) -> io::Result<String> {
        if max_pages == 0 {
            return Ok(String::new());
        }

        let work_dir = tempfile::tempdir()?;
        let pdf_path = work_dir.path().join("input.pdf");
        std::fs::write(&pdf_path, pdf_bytes)?;

        let images_dir = work_dir.path().join("pages");
        std::fs::create_dir(&images_dir)?;
        let images = self.rasterize(&pdf_path, &images_dir, max_pages)?;
        debug!(pages = images.len(), "rasterized PDF for OCR");

        let mut pages = Vec::with_capacity(images.len());
        for image in &images {
            pages.push(Self::recognize(image, language)?);
        }
        Ok(pages.join("\n"))
    }
}

impl OcrEngine for TesseractOcr {
    fn perform_ocr(&self, pdf_bytes: &[u8], language: &str, max_pages: usize) -> String {
        match self.run(pdf_bytes, language, max_pages) {
            Ok(text) => text,
            Err(error) => {
                warn!(%error, language, "tesseract OCR failed");
                String::new()
            }
        }
    }

    fn engine_name(&self) -> &str {
        "tesseract"
    }
}
