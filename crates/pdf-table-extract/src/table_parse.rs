use std::sync::LazyLock;

use regex::Regex;

static SPACE_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" {2,}").expect("hardcoded space-run regex is valid"));

/// Cell delimiter candidates, in tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    Pipe,
    Tab,
    SpaceRun,
}

impl Separator {
    const ORDER: [Self; 3] = [Self::Pipe, Self::Tab, Self::SpaceRun];

    fn match_count(self, line: &str) -> usize {
        match self {
            Self::Pipe => line.matches('|').count(),
            Self::Tab => line.matches('\t').count(),
            Self::SpaceRun => SPACE_RUN_RE.find_iter(line).count(),
        }
    }
}

/// Picks the separator with the most matches over all lines; ties keep the
/// earlier candidate (pipe, then tab, then space run).
#[must_use]
pub fn dominant_separator<S: AsRef<str>>(lines: &[S]) -> Separator {
    let mut best = Separator::Pipe;
    let mut best_count = 0_usize;

    for separator in Separator::ORDER {
        let count = lines
            .iter()
            .map(|line| separator.match_count(line.as_ref()))
            .sum::<usize>();
        if count > best_count {
            best = separator;
            best_count = count;
        }
    }

    best
}

#[must_use]
pub fn split_cells(line: &str, separator: Separator) -> Vec<String> {
    match separator {
        Separator::Pipe => line
            .split('|')
            .map(str::trim)
            .filter(|cell| !cell.is_empty())
            .map(str::to_string)
            .collect(),
        Separator::Tab => line.split('\t').map(|cell| cell.trim().to_string()).collect(),
        Separator::SpaceRun => SPACE_RUN_RE
            .split(line.trim())
            .map(str::trim)
            .filter(|cell| !cell.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

pub(crate) fn normalize_rows(rows: &[Vec<String>], width: usize) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| {
            let mut out = row.clone();
            out.resize(width, String::new());
            out
        })
        .collect()
}

pub(crate) fn is_currency_symbol(ch: char) -> bool {
    matches!(ch, '$' | '€' | '£' | '¥' | '₹' | '₩')
}

/// True when the cell carries a digit, a currency symbol or a percent sign.
pub(crate) fn has_numeric_marker(cell: &str) -> bool {
    cell.chars()
        .any(|ch| ch.is_ascii_digit() || is_currency_symbol(ch) || ch == '%')
}
