mod assembly;
mod confidence;
mod error;
mod header;
mod jobs;
mod layout_detect;
mod model;
#[cfg(not(target_arch = "wasm32"))]
mod ocr;
mod options;
mod pdf_reader;
mod source;
mod table_parse;
mod text_pattern;
mod warning;
mod workbook;

use std::path::Path;

pub use assembly::{
    AssemblyReport, FALLBACK_CONFIDENCE, FALLBACK_HEADER, TablePipeline, assemble_text,
    fallback_table,
};
pub use error::{ExtractError, JobError};
pub use jobs::{InMemoryJobStore, JobRecord, JobStatus, JobStore, process_job};
pub use layout_detect::{detect_layout_tables, detect_page};
pub use model::{
    BoundingBox, ColumnBand, DetectionStrategy, ExtractedTable, PageTokens, Token,
};
#[cfg(not(target_arch = "wasm32"))]
pub use ocr::TesseractOcr;
pub use options::{
    DEFAULT_CONFIDENCE_FLOOR, DEFAULT_CONFIDENCE_THRESHOLD, DetectionConfig, PageSelection,
    ProcessingOptions, Sensitivity,
};
pub use pdf_reader::PdfSource;
pub use source::{NoOcr, NoTokens, OcrEngine, StaticText, TextSource, TokenSource};
pub use table_parse::{Separator, dominant_separator, split_cells};
pub use text_pattern::{detect_text_tables, is_table_like};
pub use warning::{ExtractWarning, WarningCode};
pub use workbook::{render_table_csv, sheet_file_name, write_workbook};

/// Reads `input_pdf` and runs the full detection cascade over it.
pub fn extract_tables_from_pdf(
    input_pdf: &Path,
    pages: Option<PageSelection>,
    options: &ProcessingOptions,
) -> Result<AssemblyReport, ExtractError> {
    let bytes = std::fs::read(input_pdf)?;
    extract_tables_from_bytes(&bytes, pages, options)
}

pub fn extract_tables_from_bytes(
    pdf_bytes: &[u8],
    pages: Option<PageSelection>,
    options: &ProcessingOptions,
) -> Result<AssemblyReport, ExtractError> {
    let mut source = PdfSource::new();
    if let Some(pages) = pages {
        source = source.with_pages(pages);
    }
    TablePipeline::for_pdf(source).assemble(pdf_bytes, options)
}
