use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ExtractError;

pub const DEFAULT_CONFIDENCE_THRESHOLD: u8 = 70;
pub const DEFAULT_CONFIDENCE_FLOOR: u8 = 30;

/// How aggressively the text-pattern detector treats a line as table-like.
/// Each level accepts everything the stricter levels accept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Low,
    #[default]
    Medium,
    High,
}

impl FromStr for Sensitivity {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!(
                "unknown sensitivity '{other}', expected low, medium or high"
            )),
        }
    }
}

impl Display for Sensitivity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProcessingOptions {
    /// OCR only runs when a language is given.
    pub ocr_language: Option<String>,
    pub confidence_threshold: u8,
    pub table_detection_sensitivity: Sensitivity,
    /// Lower clamp applied to layout and text-pattern scores. Zero disables it.
    pub confidence_floor: u8,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            ocr_language: None,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            table_detection_sensitivity: Sensitivity::Medium,
            confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
        }
    }
}

impl ProcessingOptions {
    pub fn validate(&self) -> Result<(), ExtractError> {
        if self.confidence_threshold > 100 {
            return Err(ExtractError::InvalidOption(
                "confidence threshold must be within 0..=100".to_string(),
            ));
        }
        if self.confidence_floor > 100 {
            return Err(ExtractError::InvalidOption(
                "confidence floor must be within 0..=100".to_string(),
            ));
        }
        if self
            .ocr_language
            .as_deref()
            .is_some_and(|language| language.trim().is_empty())
        {
            return Err(ExtractError::InvalidOption(
                "OCR language cannot be blank".to_string(),
            ));
        }
        Ok(())
    }
}

/// Geometry and cost constants of the detectors.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionConfig {
    /// Max vertical distance between tokens on the same row.
    pub row_tolerance: f32,
    /// Horizontal gap that starts a new column band.
    pub column_gap: f32,
    pub min_bands: usize,
    pub max_bands: usize,
    pub layout_page_limit: usize,
    pub text_page_limit: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            row_tolerance: 3.0,
            column_gap: 20.0,
            min_bands: 2,
            max_bands: 12,
            layout_page_limit: 10,
            text_page_limit: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSelection {
    pages: BTreeSet<u32>,
}

impl PageSelection {
    #[must_use]
    pub fn contains(&self, page: u32) -> bool {
        self.pages.contains(&page)
    }
}

impl FromStr for PageSelection {
    type Err = ExtractError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = |message: String| ExtractError::InvalidPageSelection(message);
        let mut pages = BTreeSet::new();
        for token in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if let Some((start, end)) = token.split_once('-') {
                let start: u32 = start
                    .trim()
                    .parse()
                    .map_err(|_| invalid(format!("invalid page range start: '{start}'")))?;
                let end: u32 = end
                    .trim()
                    .parse()
                    .map_err(|_| invalid(format!("invalid page range end: '{end}'")))?;
                if start == 0 || end == 0 {
                    return Err(invalid("pages are 1-based".to_string()));
                }
                if end < start {
                    return Err(invalid(format!(
                        "invalid range '{token}': end is smaller than start"
                    )));
                }
                pages.extend(start..=end);
            } else {
                let page: u32 = token
                    .parse()
                    .map_err(|_| invalid(format!("invalid page number: '{token}'")))?;
                if page == 0 {
                    return Err(invalid("pages are 1-based".to_string()));
                }
                pages.insert(page);
            }
        }

        if pages.is_empty() {
            return Err(invalid("page selection cannot be empty".to_string()));
        }

        Ok(Self { pages })
    }
}
