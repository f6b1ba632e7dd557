use crate::table_parse::has_numeric_marker;

const HEADER_RATIO: f32 = 0.6;
const MAX_TEXT_HEADER_CHARS: usize = 20;

fn label_ratio(cells: &[String], is_label: impl Fn(&str) -> bool) -> f32 {
    if cells.is_empty() {
        return 0.0;
    }

    let labels = cells.iter().filter(|cell| is_label(cell)).count();
    labels as f32 / cells.len() as f32
}

/// Layout rows: a header cell carries no digit, currency symbol or percent sign.
pub(crate) fn is_layout_header_row(cells: &[String]) -> bool {
    label_ratio(cells, |cell| !has_numeric_marker(cell)) >= HEADER_RATIO
}

/// Text rows are held to a stricter standard: short, capitalized labels.
pub(crate) fn is_text_header_row(cells: &[String]) -> bool {
    label_ratio(cells, |cell| {
        !has_numeric_marker(cell)
            && cell.chars().count() < MAX_TEXT_HEADER_CHARS
            && cell.chars().next().is_some_and(char::is_uppercase)
    }) >= HEADER_RATIO
}

pub(crate) fn synthesized_headers(width: usize) -> Vec<String> {
    (1..=width).map(|index| format!("Column {index}")).collect()
}

/// Splits rows into headers and data, synthesizing `Column N` labels when the
/// first row does not pass `is_header`.
pub(crate) fn split_header(
    rows: Vec<Vec<String>>,
    is_header: impl Fn(&[String]) -> bool,
) -> (Vec<String>, Vec<Vec<String>>, bool) {
    let has_header = rows.first().is_some_and(|first| is_header(first));
    if has_header {
        let mut rows = rows.into_iter();
        let headers = rows.next().unwrap_or_default();
        return (headers, rows.collect(), true);
    }

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    (synthesized_headers(width), rows, false)
}

#[cfg(test)]
mod tests {
    use super::{is_layout_header_row, is_text_header_row, split_header, synthesized_headers};

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|cell| (*cell).to_string()).collect()
    }

    #[test]
    fn layout_header_tolerates_one_numeric_cell_in_three() {
        assert!(is_layout_header_row(&row(&["Product", "Revenue", "Growth %"])));
        assert!(!is_layout_header_row(&row(&["Widget", "$1,200", "12%"])));
    }

    #[test]
    fn text_header_requires_capitalized_short_labels() {
        assert!(is_text_header_row(&row(&["Region", "Sales Target", "Status"])));
        assert!(!is_text_header_row(&row(&["region", "sales", "status"])));
        assert!(!is_text_header_row(&row(&[
            "A very long descriptive header label",
            "Another extremely long label here",
        ])));
    }

    #[test]
    fn synthesizes_headers_to_widest_row() {
        let rows = vec![row(&["1", "2"]), row(&["3", "4", "5"])];
        let (headers, data, has_header) = split_header(rows, is_text_header_row);
        assert!(!has_header);
        assert_eq!(headers, synthesized_headers(3));
        assert_eq!(data.len(), 2);
    }
}
