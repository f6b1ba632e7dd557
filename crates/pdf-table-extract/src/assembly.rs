//! Orchestrates the detectors into a best-effort cascade:
//! layout geometry first, delimiter patterns second, a single-column table
//! of raw lines last.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ExtractError;
use crate::layout_detect::detect_layout_tables;
use crate::model::{BoundingBox, DetectionStrategy, ExtractedTable};
use crate::options::{DetectionConfig, ProcessingOptions};
use crate::pdf_reader::PdfSource;
use crate::source::{NoOcr, NoTokens, OcrEngine, StaticText, TextSource, TokenSource};
use crate::text_pattern::detect_text_tables_with_rejections;
use crate::warning::{ExtractWarning, WarningCode};

pub const FALLBACK_HEADER: &str = "Text";
pub const FALLBACK_CONFIDENCE: i32 = 80;
const FALLBACK_LINE_HEIGHT: f32 = 20.0;
const FALLBACK_WIDTH: f32 = 500.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyReport {
    pub tables: Vec<ExtractedTable>,
    pub strategy: DetectionStrategy,
    pub warnings: Vec<ExtractWarning>,
}

/// Single-column table holding every non-blank line of `text`.
#[must_use]
pub fn fallback_table(text: &str) -> ExtractedTable {
    let data = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| vec![line.to_string()])
        .collect::<Vec<_>>();

    #[allow(clippy::cast_precision_loss)]
    let height = (data.len() as f32 * FALLBACK_LINE_HEIGHT).max(FALLBACK_LINE_HEIGHT);

    ExtractedTable::new(
        0,
        vec![FALLBACK_HEADER.to_string()],
        data,
        FALLBACK_CONFIDENCE,
        BoundingBox {
            x: 0.0,
            y: 0.0,
            width: FALLBACK_WIDTH,
            height,
        },
    )
}

/// The detection pipeline with its injected sources.
pub struct TablePipeline {
    tokens: Box<dyn TokenSource>,
    text: Box<dyn TextSource>,
    ocr: Box<dyn OcrEngine>,
    config: DetectionConfig,
}

impl TablePipeline {
    pub fn new(tokens: impl TokenSource + 'static, text: impl TextSource + 'static) -> Self {
        Self {
            tokens: Box::new(tokens),
            text: Box::new(text),
            ocr: Box::new(NoOcr),
            config: DetectionConfig::default(),
        }
    }

    /// Pipeline reading both geometry and text from the PDF itself.
    #[must_use]
    pub fn for_pdf(source: PdfSource) -> Self {
        Self::new(source.clone(), source)
    }

    /// Pipeline over text that was extracted elsewhere.
    pub fn for_text(text: impl Into<String>) -> Self {
        Self::new(NoTokens, StaticText(text.into()))
    }

    #[must_use]
    pub fn with_ocr(mut self, ocr: impl OcrEngine + 'static) -> Self {
        self.ocr = Box::new(ocr);
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: DetectionConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Produces at least one table for any document with readable content.
    pub fn assemble(
        &self,
        pdf_bytes: &[u8],
        options: &ProcessingOptions,
    ) -> Result<AssemblyReport, ExtractError> {
        options.validate()?;

        let pages = self
            .tokens
            .extract_positioned_tokens(pdf_bytes, self.config.layout_page_limit);
        let layout_tables = detect_layout_tables(&pages, &self.config, options.confidence_floor);
        if !layout_tables.is_empty() {
            info!(tables = layout_tables.len(), "layout detection succeeded");
            return Ok(AssemblyReport {
                tables: layout_tables,
                strategy: DetectionStrategy::Layout,
                warnings: Vec::new(),
            });
        }
        debug!(pages = pages.len(), "no layout tables; falling back to text");

        let mut warnings = Vec::new();
        let text = self.combined_text(pdf_bytes, options, &mut warnings);
        let mut report = assemble_text(&text, options, warnings)?;
        if report.strategy == DetectionStrategy::TextPattern {
            report.warnings.push(ExtractWarning::new(
                WarningCode::TextPatternFallback,
                "no layout tables detected; tables were rebuilt from text delimiters",
            ));
        }
        Ok(report)
    }

    fn combined_text(
        &self,
        pdf_bytes: &[u8],
        options: &ProcessingOptions,
        warnings: &mut Vec<ExtractWarning>,
    ) -> String {
        let digital = self
            .text
            .extract_text(pdf_bytes, self.config.text_page_limit);
        let Some(language) = options.ocr_language.as_deref() else {
            return digital;
        };

        let ocr = self
            .ocr
            .perform_ocr(pdf_bytes, language, self.config.text_page_limit);
        if ocr.trim().is_empty() {
            warn!(engine = self.ocr.engine_name(), language, "OCR produced no text");
            warnings.push(ExtractWarning::new(
                WarningCode::OcrUnavailable,
                format!("OCR engine '{}' produced no text", self.ocr.engine_name()),
            ));
            return digital;
        }

        if digital.trim().is_empty() {
            ocr
        } else {
            format!("{digital}\n{ocr}")
        }
    }
}

/// Runs the text-pattern stage and, failing that, the single-column fallback.
pub fn assemble_text(
    text: &str,
    options: &ProcessingOptions,
    mut warnings: Vec<ExtractWarning>,
) -> Result<AssemblyReport, ExtractError> {
    if text.trim().is_empty() {
        return Err(ExtractError::NoReadableContent);
    }

    let (tables, rejected) = detect_text_tables_with_rejections(
        text,
        options.confidence_threshold,
        options.table_detection_sensitivity,
        options.confidence_floor,
    );
    warnings.extend(rejected.into_iter().map(|confidence| {
        ExtractWarning::new(
            WarningCode::BelowThreshold,
            format!(
                "discarded text table below confidence threshold {}",
                options.confidence_threshold
            ),
        )
        .with_confidence(confidence)
    }));

    if !tables.is_empty() {
        info!(tables = tables.len(), "text-pattern detection succeeded");
        return Ok(AssemblyReport {
            tables,
            strategy: DetectionStrategy::TextPattern,
            warnings,
        });
    }

    info!("no table structure detected; emitting single-column table");
    warnings.push(
        ExtractWarning::new(
            WarningCode::SingleColumnFallback,
            "no table structure detected; every text line was kept in one column",
        )
        .with_table_index(0),
    );
    Ok(AssemblyReport {
        tables: vec![fallback_table(text)],
        strategy: DetectionStrategy::Fallback,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::{FALLBACK_HEADER, TablePipeline, assemble_text, fallback_table};
    use crate::error::ExtractError;
    use crate::model::{DetectionStrategy, PageTokens, Token};
    use crate::options::{DetectionConfig, ProcessingOptions};
    use crate::source::{OcrEngine, StaticText, TokenSource};
    use crate::warning::WarningCode;

    struct FixedTokens(Vec<PageTokens>);

    impl TokenSource for FixedTokens {
        fn extract_positioned_tokens(&self, _pdf: &[u8], max_pages: usize) -> Vec<PageTokens> {
            self.0.iter().take(max_pages).cloned().collect()
        }
    }

    struct FixedOcr(&'static str);

    impl OcrEngine for FixedOcr {
        fn perform_ocr(&self, _pdf: &[u8], _language: &str, _max_pages: usize) -> String {
            self.0.to_string()
        }

        fn engine_name(&self) -> &str {
            "fixed"
        }
    }

    struct PageCapOcr(Arc<AtomicUsize>);

    impl OcrEngine for PageCapOcr {
        fn perform_ocr(&self, _pdf: &[u8], _language: &str, max_pages: usize) -> String {
            self.0.store(max_pages, Ordering::SeqCst);
            String::new()
        }

        fn engine_name(&self) -> &str {
            "page-cap"
        }
    }

    fn table_page(page_number: u32) -> PageTokens {
        let mut tokens = Vec::new();
        for (row, y) in [700.0_f32, 680.0, 660.0].into_iter().enumerate() {
            tokens.push(Token::new(format!("Item {row}"), 50.0, y));
            tokens.push(Token::new(format!("{}", row * 10), 200.0, y));
        }
        PageTokens {
            page_number,
            tokens,
        }
    }

    const PROSE: &str = "Hello there\nQuiet evening\nGood night";

    #[test]
    fn layout_tables_are_used_verbatim() {
        let pipeline = TablePipeline::new(
            FixedTokens(vec![table_page(1)]),
            StaticText("a | b | c\nd | e | f".to_string()),
        );
        let report = pipeline
            .assemble(b"%PDF", &ProcessingOptions::default())
            .expect("assembly should succeed");
        assert_eq!(report.strategy, DetectionStrategy::Layout);
        assert_eq!(report.tables.len(), 1);
    }

    #[test]
    fn layout_is_capped_to_the_page_limit() {
        let pages = (1..=12).map(table_page).collect::<Vec<_>>();
        let pipeline = TablePipeline::new(FixedTokens(pages), StaticText(String::new()));
        let report = pipeline
            .assemble(b"%PDF", &ProcessingOptions::default())
            .expect("assembly should succeed");
        assert_eq!(report.tables.len(), 10);
        assert_eq!(report.tables[9].table_index, 9);
    }

    #[test]
    fn falls_back_to_text_patterns() {
        let pipeline = TablePipeline::for_text(
            "Region | Sales Target | Actual Sales | Status\n\
             North America | $4,200,000 | $4,580,000 | Exceeded\n\
             Europe | $2,800,000 | $2,650,000 | Near Target",
        );
        let report = pipeline
            .assemble(b"", &ProcessingOptions::default())
            .expect("assembly should succeed");
        assert_eq!(report.strategy, DetectionStrategy::TextPattern);
        assert_eq!(report.tables[0].headers.len(), 4);
        assert!(
            report
                .warnings
                .iter()
                .any(|warning| warning.code == WarningCode::TextPatternFallback)
        );
    }

    #[test]
    fn prose_yields_exactly_one_text_column() {
        let report = TablePipeline::for_text(PROSE)
            .assemble(b"", &ProcessingOptions::default())
            .expect("assembly should succeed");
        assert_eq!(report.strategy, DetectionStrategy::Fallback);
        assert_eq!(report.tables.len(), 1);
        let table = &report.tables[0];
        assert_eq!(table.headers, vec![FALLBACK_HEADER]);
        assert_eq!(table.data.len(), 3);
        assert_eq!(table.confidence, 80);
        assert_eq!(table.bounding_box.height, 60.0);
    }

    #[test]
    fn fallback_height_has_a_minimum() {
        let table = fallback_table("   \n");
        assert!(table.data.is_empty());
        assert_eq!(table.bounding_box.height, 20.0);
    }

    #[test]
    fn empty_document_is_unreadable() {
        let result = TablePipeline::for_text("  \n ").assemble(b"", &ProcessingOptions::default());
        assert!(matches!(result, Err(ExtractError::NoReadableContent)));
    }

    #[test]
    fn ocr_text_is_used_when_digital_text_is_empty() {
        let options = ProcessingOptions {
            ocr_language: Some("eng".to_string()),
            ..ProcessingOptions::default()
        };
        let pipeline = TablePipeline::for_text("").with_ocr(FixedOcr("Name | Qty | Price\nPen | 3 | $1.50\nInk | 2 | $4.00"));
        let report = pipeline.assemble(b"", &options).expect("assembly should succeed");
        assert_eq!(report.strategy, DetectionStrategy::TextPattern);
        assert_eq!(report.tables[0].headers, vec!["Name", "Qty", "Price"]);
    }

    #[test]
    fn ocr_is_capped_to_the_text_page_limit() {
        let seen = Arc::new(AtomicUsize::new(0));
        let options = ProcessingOptions {
            ocr_language: Some("eng".to_string()),
            ..ProcessingOptions::default()
        };
        let pipeline = TablePipeline::for_text(PROSE)
            .with_ocr(PageCapOcr(Arc::clone(&seen)))
            .with_config(DetectionConfig {
                text_page_limit: 3,
                ..DetectionConfig::default()
            });

        let report = pipeline.assemble(b"", &options).expect("assembly should succeed");
        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert!(
            report
                .warnings
                .iter()
                .any(|warning| warning.code == WarningCode::OcrUnavailable)
        );
    }

    #[test]
    fn ocr_is_skipped_without_a_language() {
        let pipeline = TablePipeline::for_text(PROSE).with_ocr(FixedOcr("A | B | C\n1 | 2 | 3"));
        let report = pipeline
            .assemble(b"", &ProcessingOptions::default())
            .expect("assembly should succeed");
        assert_eq!(report.strategy, DetectionStrategy::Fallback);
    }

    #[test]
    fn reports_discarded_blocks() {
        let options = ProcessingOptions {
            confidence_threshold: 100,
            ..ProcessingOptions::default()
        };
        let report = assemble_text("alpha | beta\ngamma | delta", &options, Vec::new())
            .expect("assembly should succeed");
        assert_eq!(report.strategy, DetectionStrategy::Fallback);
        assert!(
            report
                .warnings
                .iter()
                .any(|warning| warning.code == WarningCode::BelowThreshold)
        );
    }

    #[test]
    fn every_output_row_matches_header_width() {
        let inputs = [
            PROSE,
            "Name | Age | City\nAlice | 30\nBob | 22 | Paris | extra",
            "x   y   z\n1   2\n3   4   5   6",
        ];
        for input in inputs {
            let report = assemble_text(input, &ProcessingOptions::default(), Vec::new())
                .expect("assembly should succeed");
            for table in &report.tables {
                assert!(table.data.iter().all(|row| row.len() == table.headers.len()));
                assert!(table.confidence <= 100);
            }
        }
    }
}
