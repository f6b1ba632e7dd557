//! Capabilities the assembly pipeline draws its input from.
//!
//! Every source is best-effort: failures are logged by the implementation and
//! surface as empty output, never as errors.

use crate::model::PageTokens;

pub trait TokenSource: Send + Sync {
    /// Positioned tokens for at most `max_pages` pages. A page that fails to
    /// parse is skipped.
    fn extract_positioned_tokens(&self, pdf_bytes: &[u8], max_pages: usize) -> Vec<PageTokens>;
}

pub trait TextSource: Send + Sync {
    /// Newline-delimited digital text of at most `max_pages` pages.
    fn extract_text(&self, pdf_bytes: &[u8], max_pages: usize) -> String;
}

pub trait OcrEngine: Send + Sync {
    /// Recognized text of at most `max_pages` pages.
    fn perform_ocr(&self, pdf_bytes: &[u8], language: &str, max_pages: usize) -> String;

    /// Name used in logs and warnings.
    fn engine_name(&self) -> &str;
}

/// OCR engine for hosts without one; always yields no text.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOcr;

impl OcrEngine for NoOcr {
    fn perform_ocr(&self, _pdf_bytes: &[u8], _language: &str, _max_pages: usize) -> String {
        String::new()
    }

    fn engine_name(&self) -> &str {
        "none"
    }
}

/// Text source that ignores the PDF and returns fixed text. Used when the
/// caller already holds extracted text.
#[derive(Debug, Clone, Default)]
pub struct StaticText(pub String);

impl TextSource for StaticText {
    fn extract_text(&self, _pdf_bytes: &[u8], _max_pages: usize) -> String {
        self.0.clone()
    }
}

/// Token source that never yields geometry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTokens;

impl TokenSource for NoTokens {
    fn extract_positioned_tokens(&self, _pdf_bytes: &[u8], _max_pages: usize) -> Vec<PageTokens> {
        Vec::new()
    }
}
