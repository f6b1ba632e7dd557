use serde::{Deserialize, Serialize};

/// A positioned run of glyphs taken from one page.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub text: String,
    pub x: f32,
    pub y: f32,
}

impl Token {
    #[must_use]
    pub fn new(text: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            text: text.into(),
            x,
            y,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageTokens {
    pub page_number: u32,
    pub tokens: Vec<Token>,
}

/// Tokens sharing an approximate baseline, ordered left to right.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Row {
    pub y: f32,
    pub tokens: Vec<Token>,
}

/// Half-open horizontal interval `[min_x, max_x)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnBand {
    pub min_x: f32,
    pub max_x: f32,
}

impl ColumnBand {
    #[must_use]
    pub fn contains(&self, x: f32) -> bool {
        x >= self.min_x && x < self.max_x
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedTable {
    pub table_index: usize,
    pub headers: Vec<String>,
    pub data: Vec<Vec<String>>,
    pub confidence: u8,
    pub bounding_box: BoundingBox,
}

impl ExtractedTable {
    /// Builds a table whose data rows all have exactly `headers.len()` cells.
    #[must_use]
    pub fn new(
        table_index: usize,
        headers: Vec<String>,
        data: Vec<Vec<String>>,
        confidence: i32,
        bounding_box: BoundingBox,
    ) -> Self {
        let width = headers.len();
        let data = crate::table_parse::normalize_rows(&data, width);
        let confidence = u8::try_from(confidence.clamp(0, 100)).unwrap_or(100);

        Self {
            table_index,
            headers,
            data,
            confidence,
            bounding_box,
        }
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.data.len()
    }
}

/// Which stage of the assembly cascade produced a document's tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStrategy {
    Layout,
    TextPattern,
    Fallback,
}

#[cfg(test)]
mod tests {
    use super::{BoundingBox, ColumnBand, ExtractedTable};

    #[test]
    fn new_table_pads_and_truncates_rows() {
        let table = ExtractedTable::new(
            0,
            vec!["a".to_string(), "b".to_string()],
            vec![
                vec!["1".to_string()],
                vec!["1".to_string(), "2".to_string(), "3".to_string()],
            ],
            75,
            BoundingBox::default(),
        );

        assert_eq!(table.data[0], vec!["1", ""]);
        assert_eq!(table.data[1], vec!["1", "2"]);
    }

    #[test]
    fn new_table_clamps_confidence() {
        let high = ExtractedTable::new(0, vec![], vec![], 140, BoundingBox::default());
        let low = ExtractedTable::new(0, vec![], vec![], -5, BoundingBox::default());
        assert_eq!(high.confidence, 100);
        assert_eq!(low.confidence, 0);
    }

    #[test]
    fn band_is_half_open() {
        let band = ColumnBand {
            min_x: 10.0,
            max_x: 50.0,
        };
        assert!(band.contains(10.0));
        assert!(band.contains(49.9));
        assert!(!band.contains(50.0));
    }

    #[test]
    fn serializes_in_camel_case() {
        let table = ExtractedTable::new(
            3,
            vec!["Text".to_string()],
            vec![vec!["x".to_string()]],
            80,
            BoundingBox::default(),
        );
        let json = serde_json::to_value(&table).expect("table should serialize");
        assert_eq!(json["tableIndex"], 3);
        assert!(json.get("boundingBox").is_some());
    }
}
