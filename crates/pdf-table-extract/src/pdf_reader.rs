use std::collections::BTreeMap;

use encoding_rs::{BIG5, UTF_16BE};
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use tracing::{debug, warn};

use crate::model::{PageTokens, Token};
use crate::options::{PageSelection, Sensitivity};
use crate::source::{TextSource, TokenSource};
use crate::text_pattern::is_table_like;

/// Reads tokens and text straight from the PDF with `lopdf` and
/// `pdf-extract`.
#[derive(Debug, Clone, Default)]
pub struct PdfSource {
    pages: Option<PageSelection>,
}

impl PdfSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.pages = Some(pages);
        self
    }

    /// Selected `(page number, object id)` pairs, capped at `max_pages`.
    fn selected_pages(&self, document: &Document, max_pages: usize) -> Vec<(u32, ObjectId)> {
        document
            .get_pages()
            .into_iter()
            .filter(|(page_no, _)| {
                self.pages
                    .as_ref()
                    .is_none_or(|selection| selection.contains(*page_no))
            })
            .take(max_pages)
            .collect()
    }
}

fn split_text_into_pages(raw_text: &str) -> Vec<String> {
    let mut pages = raw_text
        .split('\u{000C}')
        .map(str::to_string)
        .collect::<Vec<_>>();
    if pages.last().is_some_and(String::is_empty) {
        pages.pop();
    }
    pages
}

fn looks_decoding_broken(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }

    if text.contains("?Identity-H Unimplemented?") {
        return true;
    }

    let total = text.chars().count();
    let replacement = text.matches('\u{FFFD}').count();
    let control = text
        .chars()
        .filter(|ch| ch.is_control() && !matches!(ch, '\n' | '\r' | '\t'))
        .count();

    replacement * 8 > total || control * 5 > total
}

fn decode_pdf_bytes(encoding: Option<&str>, bytes: &[u8]) -> String {
    let decoded = Document::decode_text(encoding, bytes);
    if !looks_decoding_broken(&decoded) {
        return decoded;
    }

    if bytes.starts_with(&[0xFE, 0xFF]) || bytes.starts_with(&[0xFF, 0xFE]) {
        let bytes = if bytes.len() > 2 { &bytes[2..] } else { bytes };
        let (utf16, had_errors) = UTF_16BE.decode_without_bom_handling(bytes);
        if !had_errors && !utf16.is_empty() {
            return utf16.into_owned();
        }
    }

    if let Some(name) = encoding {
        let lower = name.to_ascii_lowercase();

        if lower.contains("utf16")
            || lower.contains("ucs2")
            || lower.contains("identity-h")
            || lower.contains("unicode")
        {
            let (utf16, had_errors) = UTF_16BE.decode_without_bom_handling(bytes);
            if !had_errors && !utf16.is_empty() {
                return utf16.into_owned();
            }
        }

        if lower.contains("big5") || lower.contains("b5") || lower.contains("eten") {
            let (big5, _, had_errors) = BIG5.decode(bytes);
            if !had_errors && !big5.is_empty() {
                return big5.into_owned();
            }
        }
    }

    String::from_utf8_lossy(bytes).to_string()
}

fn number(object: &Object) -> Option<f32> {
    match object {
        #[allow(clippy::cast_precision_loss)]
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        _ => None,
    }
}

fn numbers<const N: usize>(operands: &[Object]) -> Option<[f32; N]> {
    if operands.len() < N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, operand) in out.iter_mut().zip(operands) {
        *slot = number(operand)?;
    }
    Some(out)
}

fn show_text(operands: &[Object], encoding: Option<&str>) -> String {
    let mut text = String::new();
    for operand in operands {
        match operand {
            Object::String(bytes, _) => text.push_str(&decode_pdf_bytes(encoding, bytes)),
            Object::Array(items) => text.push_str(&show_text(items, encoding)),
            Object::Integer(kerning) if *kerning < -100 => text.push(' '),
            Object::Real(kerning) if *kerning < -100.0 => text.push(' '),
            _ => {}
        }
    }
    text
}

/// Text-space cursor. Only translation is tracked; scale and skew of the
/// text matrix are ignored.
#[derive(Debug, Clone, Copy, Default)]
struct TextCursor {
    line_x: f32,
    line_y: f32,
    x: f32,
    y: f32,
    leading: f32,
    font_size: f32,
}

impl TextCursor {
    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_x += tx;
        self.line_y += ty;
        self.x = self.line_x;
        self.y = self.line_y;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    fn set_origin(&mut self, x: f32, y: f32) {
        self.line_x = x;
        self.line_y = y;
        self.x = x;
        self.y = y;
    }

    /// Rough advance without font metrics: half an em per character.
    #[allow(clippy::cast_precision_loss)]
    fn advance(&mut self, text: &str) {
        self.x += text.chars().count() as f32 * self.font_size.max(1.0) * 0.5;
    }
}

fn page_encodings(document: &Document, page_id: ObjectId) -> BTreeMap<Vec<u8>, &str> {
    document
        .get_page_fonts(page_id)
        .into_iter()
        .map(|(name, font)| (name, font.get_font_encoding()))
        .collect()
}

pub(crate) fn extract_page_tokens(document: &Document, page_id: ObjectId) -> Option<Vec<Token>> {
    let raw_content = document.get_page_content(page_id).ok()?;
    let content = Content::decode(&raw_content).ok()?;
    let encodings = page_encodings(document, page_id);

    let mut tokens = Vec::new();
    let mut cursor = TextCursor::default();
    let mut encoding = None;

    for operation in &content.operations {
        let operands = operation.operands.as_slice();
        match operation.operator.as_str() {
            "BT" => {
                let leading = cursor.leading;
                let font_size = cursor.font_size;
                cursor = TextCursor {
                    leading,
                    font_size,
                    ..TextCursor::default()
                };
            }
            "Tf" => {
                if let Some(font_name) = operands.first().and_then(|operand| operand.as_name().ok())
                {
                    encoding = encodings.get(font_name).copied();
                }
                if let Some([size]) = operands.get(1..).and_then(numbers::<1>) {
                    cursor.font_size = size;
                }
            }
            "TL" => {
                if let Some([leading]) = numbers::<1>(operands) {
                    cursor.leading = leading;
                }
            }
            "Td" => {
                if let Some([tx, ty]) = numbers::<2>(operands) {
                    cursor.move_line(tx, ty);
                }
            }
            "TD" => {
                if let Some([tx, ty]) = numbers::<2>(operands) {
                    cursor.leading = -ty;
                    cursor.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some([_, _, _, _, e, f]) = numbers::<6>(operands) {
                    cursor.set_origin(e, f);
                }
            }
            "T*" => cursor.next_line(),
            "Tj" | "TJ" | "'" | "\"" => {
                if matches!(operation.operator.as_str(), "'" | "\"") {
                    cursor.next_line();
                }
                let shown = if operation.operator == "\"" {
                    show_text(operands.get(2..).unwrap_or_default(), encoding)
                } else {
                    show_text(operands, encoding)
                };
                if !shown.trim().is_empty() {
                    tokens.push(Token::new(shown.trim(), cursor.x, cursor.y));
                }
                cursor.advance(&shown);
            }
            _ => {}
        }
    }

    Some(tokens)
}

fn extract_text_from_page_content(document: &Document, page_id: ObjectId) -> Option<String> {
    let raw_content = document.get_page_content(page_id).ok()?;
    let content = Content::decode(&raw_content).ok()?;
    let encodings = page_encodings(document, page_id);

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut encoding = None;
    for operation in content.operations {
        match operation.operator.as_str() {
            "Tf" => {
                if let Some(font_name) = operation
                    .operands
                    .first()
                    .and_then(|operand| operand.as_name().ok())
                {
                    encoding = encodings.get(font_name).copied();
                }
            }
            "Tj" | "TJ" | "'" | "\"" => {
                current.push_str(&show_text(&operation.operands, encoding));
            }
            "T*" | "Td" | "TD" | "ET" => {
                if !current.trim().is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
            }
            _ => {}
        }
    }

    if !current.trim().is_empty() {
        lines.push(current);
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn extraction_quality_score(text: &str) -> i64 {
    if text.trim().is_empty() {
        return i64::MIN / 4;
    }

    let mut non_empty_lines = 0_i64;
    let mut table_like_lines = 0_i64;
    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        non_empty_lines += 1;
        if is_table_like(line, Sensitivity::Medium) {
            table_like_lines += 1;
        }
    }

    let broken_penalty = if looks_decoding_broken(text) { 800 } else { 0 };
    table_like_lines * 50 + non_empty_lines - broken_penalty
}

fn choose_best_text(candidates: Vec<String>) -> String {
    candidates
        .into_iter()
        .max_by_key(|text| extraction_quality_score(text))
        .unwrap_or_default()
}

impl TokenSource for PdfSource {
    fn extract_positioned_tokens(&self, pdf_bytes: &[u8], max_pages: usize) -> Vec<PageTokens> {
        let document = match Document::load_mem(pdf_bytes) {
            Ok(document) => document,
            Err(error) => {
                warn!(%error, "positioned token extraction failed to load PDF");
                return Vec::new();
            }
        };

        let mut pages = Vec::new();
        for (page_number, page_id) in self.selected_pages(&document, max_pages) {
            match extract_page_tokens(&document, page_id) {
                Some(tokens) => pages.push(PageTokens {
                    page_number,
                    tokens,
                }),
                None => debug!(page = page_number, "page content could not be decoded"),
            }
        }
        pages
    }
}

impl TextSource for PdfSource {
    fn extract_text(&self, pdf_bytes: &[u8], max_pages: usize) -> String {
        let document = match Document::load_mem(pdf_bytes) {
            Ok(document) => document,
            Err(error) => {
                warn!(%error, "text extraction failed to load PDF");
                return String::new();
            }
        };
        let page_count = document.get_pages().len();

        let extracted_pages = match pdf_extract::extract_text_from_mem(pdf_bytes) {
            Ok(text) => {
                let pages = split_text_into_pages(&text);
                (pages.len() == page_count).then_some(pages)
            }
            Err(error) => {
                debug!(%error, "pdf-extract failed; using content streams only");
                None
            }
        };

        let mut texts = Vec::new();
        for (page_number, page_id) in self.selected_pages(&document, max_pages) {
            let mut candidates = Vec::new();
            let index = usize::try_from(page_number.saturating_sub(1)).unwrap_or(usize::MAX);
            if let Some(text) = extracted_pages
                .as_ref()
                .and_then(|pages| pages.get(index).cloned())
                .filter(|text| !text.trim().is_empty())
            {
                candidates.push(text);
            }
            if let Some(text) = extract_text_from_page_content(&document, page_id) {
                candidates.push(text);
            }
            if let Some(text) = document
                .extract_text(&[page_number])
                .ok()
                .filter(|text| !text.trim().is_empty())
            {
                candidates.push(text);
            }

            let text = choose_best_text(candidates);
            if !text.trim().is_empty() {
                texts.push(text);
            }
        }

        texts.join("\n")
    }
}
