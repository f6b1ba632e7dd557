//! Heuristic structure scores shared by both detectors.
//!
//! Scores are additive integers, not probabilities. Each path clamps its
//! result to `[floor, 100]` where the floor comes from
//! [`ProcessingOptions::confidence_floor`](crate::ProcessingOptions).

const LAYOUT_BASE: i32 = 60;
const TEXT_BASE: i32 = 50;

pub(crate) fn clamp_score(score: i32, floor: u8) -> i32 {
    score.clamp(i32::from(floor.min(100)), 100)
}

/// Layout grids: regular rows and more than one filled cell per row.
pub(crate) fn layout_confidence(headers: &[String], data: &[Vec<String>], floor: u8) -> i32 {
    let mut score = LAYOUT_BASE;

    if data.iter().all(|row| row.len() == headers.len()) {
        score += 20;
    }

    let filled = data
        .iter()
        .flatten()
        .filter(|cell| !cell.trim().is_empty())
        .count();
    if filled > data.len() {
        score += 10;
    }

    clamp_score(score, floor)
}

fn is_meaningful_header(header: &str) -> bool {
    let len = header.chars().count();
    let purely_numeric = header
        .chars()
        .all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | ',' | '-'));
    len > 2 && len < 30 && !purely_numeric
}

/// Text blocks. `raw_widths` are the per-row cell counts before padding;
/// `data` is already normalized to the header width.
pub(crate) fn text_confidence(
    headers: &[String],
    data: &[Vec<String>],
    raw_widths: &[usize],
    floor: u8,
) -> i32 {
    let mut score = f64::from(TEXT_BASE);

    if headers.len() >= 2 {
        score += 10.0;
    }
    if data.len() >= 2 {
        score += 10.0;
    }
    if raw_widths.iter().all(|width| *width == headers.len()) {
        score += 15.0;
    }

    if !headers.is_empty() {
        let meaningful = headers
            .iter()
            .filter(|header| is_meaningful_header(header))
            .count();
        score += 10.0 * meaningful as f64 / headers.len() as f64;
    }

    let has_figures = data
        .iter()
        .flatten()
        .any(|cell| cell.chars().any(|ch| ch.is_ascii_digit() || ch == '$' || ch == '%'));
    if has_figures {
        score += 10.0;
    }

    let total_cells = data.iter().map(Vec::len).sum::<usize>();
    if total_cells > 0 {
        let empty = data
            .iter()
            .flatten()
            .filter(|cell| cell.trim().is_empty())
            .count();
        score -= 30.0 * empty as f64 / total_cells as f64;
    }

    #[allow(clippy::cast_possible_truncation)]
    clamp_score(score.round() as i32, floor)
}
