//! Delimiter-based detection over plain text lines.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::confidence::text_confidence;
use crate::header::{is_text_header_row, split_header};
use crate::model::{BoundingBox, ExtractedTable};
use crate::options::Sensitivity;
use crate::table_parse::{dominant_separator, split_cells};

const LINE_HEIGHT: f32 = 20.0;
const COLUMN_WIDTH: f32 = 100.0;

fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("hardcoded line pattern is valid")
}

static LOW_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // two pipes with content between them
        pattern(r"\|[^|]*[^\s|][^|]*\|"),
        pattern(r"\t[^\t]*\S[^\t]*\t"),
    ]
});

static MEDIUM_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"[^\s|][ \t]*\|[ \t]*[^\s|]"),
        pattern(r"\S\t+\S"),
        pattern(r"\S {3,}\S"),
    ]
});

// Figures that read as amounts: currency, thousands groups, percentages or
// decimals. Bare digit runs are left out so page counters and dates stay prose.
static NUMBER_GROUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(
        r"[$€£¥₹₩]\s?\d[\d,]*(?:\.\d+)?|\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?%|\d+\.\d+",
    )
});

static HIGH_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"[|\t]"),
        pattern(r"\S {2,}\S"),
        pattern(r"\d+(?:\.\d+)?\s?%"),
        pattern(r"[$€£¥₹₩]\s?\d"),
    ]
});

fn any_match(patterns: &[Regex], line: &str) -> bool {
    patterns.iter().any(|re| re.is_match(line))
}

/// Whether `line` looks like a table row at the given sensitivity.
#[must_use]
pub fn is_table_like(line: &str, sensitivity: Sensitivity) -> bool {
    if any_match(&LOW_PATTERNS, line) {
        return true;
    }
    if sensitivity == Sensitivity::Low {
        return false;
    }

    if any_match(&MEDIUM_PATTERNS, line) || NUMBER_GROUP_RE.find_iter(line).count() >= 2 {
        return true;
    }
    if sensitivity == Sensitivity::Medium {
        return false;
    }

    any_match(&HIGH_PATTERNS, line) || line.split_whitespace().count() >= 3
}

/// Runs of consecutive table-like lines, with the index of their first line.
fn collect_blocks<'a>(lines: &[&'a str], sensitivity: Sensitivity) -> Vec<(usize, Vec<&'a str>)> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut start = 0;

    for (index, &line) in lines.iter().enumerate() {
        if is_table_like(line, sensitivity) {
            if current.is_empty() {
                start = index;
            }
            current.push(line);
            continue;
        }

        if current.len() >= 2 {
            blocks.push((start, std::mem::take(&mut current)));
        } else {
            current.clear();
        }
    }

    if current.len() >= 2 {
        blocks.push((start, current));
    }
    blocks
}

fn build_block_table(
    start: usize,
    block: &[&str],
    table_index: usize,
    confidence_floor: u8,
) -> Option<ExtractedTable> {
    let separator = dominant_separator(block);
    let rows = block
        .iter()
        .map(|line| split_cells(line, separator))
        .filter(|cells| cells.len() >= 2)
        .collect::<Vec<_>>();
    if rows.len() < 2 {
        debug!(start, "text block rejected: fewer than two valid rows");
        return None;
    }

    let raw_widths = rows.iter().map(Vec::len).collect::<Vec<_>>();
    let row_count = rows.len();
    let (headers, data, _) = split_header(rows, is_text_header_row);
    let width = headers.len();
    let data = crate::table_parse::normalize_rows(&data, width);
    let confidence = text_confidence(&headers, &data, &raw_widths, confidence_floor);

    #[allow(clippy::cast_precision_loss)]
    let bounding_box = BoundingBox {
        x: 0.0,
        y: start as f32 * LINE_HEIGHT,
        width: width as f32 * COLUMN_WIDTH,
        height: row_count as f32 * LINE_HEIGHT,
    };

    Some(ExtractedTable::new(
        table_index,
        headers,
        data,
        confidence,
        bounding_box,
    ))
}

/// Finds delimiter-structured tables in plain text. Candidates scoring below
/// `confidence_threshold` are dropped; survivors are numbered in order.
#[must_use]
pub fn detect_text_tables(
    text: &str,
    confidence_threshold: u8,
    sensitivity: Sensitivity,
    confidence_floor: u8,
) -> Vec<ExtractedTable> {
    detect_text_tables_with_rejections(text, confidence_threshold, sensitivity, confidence_floor).0
}

/// Like [`detect_text_tables`], also returning the confidences of candidates
/// that fell below the threshold.
pub(crate) fn detect_text_tables_with_rejections(
    text: &str,
    confidence_threshold: u8,
    sensitivity: Sensitivity,
    confidence_floor: u8,
) -> (Vec<ExtractedTable>, Vec<u8>) {
    let lines = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>();

    let mut tables = Vec::new();
    let mut rejected = Vec::new();
    for (start, block) in collect_blocks(&lines, sensitivity) {
        let Some(table) = build_block_table(start, &block, tables.len(), confidence_floor) else {
            continue;
        };
        if table.confidence < confidence_threshold {
            debug!(
                start,
                confidence = table.confidence,
                "text block below confidence threshold"
            );
            rejected.push(table.confidence);
            continue;
        }
        tables.push(table);
    }

    (tables, rejected)
}
