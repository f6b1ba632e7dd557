//! Geometry-based detection over positioned tokens.
//!
//! One page yields at most one table: tokens are clustered into rows by y,
//! the distinct x positions are cut into column bands, and every token lands
//! in the cell at (row, first band containing its x).

use tracing::debug;

use crate::confidence::layout_confidence;
use crate::header::{is_layout_header_row, split_header};
use crate::model::{BoundingBox, ColumnBand, ExtractedTable, PageTokens, Row, Token};
use crate::options::DetectionConfig;

/// Groups tokens top to bottom. Each row is anchored at the y of its topmost
/// token and takes every later token within `tolerance` of that anchor, so
/// the grouping does not depend on the order the source emitted tokens in.
pub(crate) fn cluster_rows(tokens: &[Token], tolerance: f32) -> Vec<Row> {
    // PDF y grows upward, so the top row has the largest y.
    let mut ordered = tokens.iter().collect::<Vec<_>>();
    ordered.sort_by(|left, right| right.y.total_cmp(&left.y));

    let mut rows: Vec<Row> = Vec::new();
    for token in ordered {
        match rows
            .iter_mut()
            .find(|row| (row.y - token.y).abs() <= tolerance)
        {
            Some(row) => row.tokens.push(token.clone()),
            None => rows.push(Row {
                y: token.y,
                tokens: vec![token.clone()],
            }),
        }
    }

    for row in &mut rows {
        row.tokens.sort_by(|left, right| left.x.total_cmp(&right.x));
    }
    rows
}

/// Cuts the sorted distinct x positions wherever consecutive positions are
/// more than `gap` apart. Bands are contiguous; the last one extends `gap`
/// past the rightmost position.
pub(crate) fn derive_bands(tokens: &[Token], gap: f32) -> Vec<ColumnBand> {
    let mut xs = tokens.iter().map(|token| token.x).collect::<Vec<_>>();
    xs.sort_by(f32::total_cmp);
    xs.dedup();

    let Some((&first, rest)) = xs.split_first() else {
        return Vec::new();
    };

    let mut starts = vec![first];
    let mut previous = first;
    for &x in rest {
        if x - previous > gap {
            starts.push(x);
        }
        previous = x;
    }

    let end = previous + gap;
    starts
        .iter()
        .enumerate()
        .map(|(index, &min_x)| ColumnBand {
            min_x,
            max_x: starts.get(index + 1).copied().unwrap_or(end),
        })
        .collect()
}

/// First band in order whose half-open interval contains `x`.
pub(crate) fn band_index(bands: &[ColumnBand], x: f32) -> Option<usize> {
    bands.iter().position(|band| band.contains(x))
}

fn build_grid(rows: &[Row], bands: &[ColumnBand]) -> Vec<Vec<String>> {
    let mut grid = vec![vec![String::new(); bands.len()]; rows.len()];

    for (row_index, row) in rows.iter().enumerate() {
        for token in &row.tokens {
            let Some(column) = band_index(bands, token.x) else {
                continue;
            };
            let cell = &mut grid[row_index][column];
            if !cell.is_empty() {
                cell.push(' ');
            }
            cell.push_str(token.text.trim());
        }
    }

    grid
}

fn prune_grid(grid: Vec<Vec<String>>) -> Vec<Vec<String>> {
    let rows = grid
        .into_iter()
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
        .collect::<Vec<_>>();

    let width = rows.first().map_or(0, Vec::len);
    let keep = (0..width)
        .filter(|&column| rows.iter().any(|row| !row[column].trim().is_empty()))
        .collect::<Vec<_>>();

    rows.into_iter()
        .map(|row| keep.iter().map(|&column| row[column].clone()).collect())
        .collect()
}

fn token_bounds(tokens: &[Token]) -> BoundingBox {
    let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
    let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
    for token in tokens {
        min_x = min_x.min(token.x);
        min_y = min_y.min(token.y);
        max_x = max_x.max(token.x);
        max_y = max_y.max(token.y);
    }

    BoundingBox {
        x: min_x,
        y: min_y,
        width: max_x - min_x,
        height: max_y - min_y,
    }
}

/// Analyses one page. `None` means the page does not look tabular.
#[must_use]
pub fn detect_page(
    tokens: &[Token],
    config: &DetectionConfig,
    table_index: usize,
    confidence_floor: u8,
) -> Option<ExtractedTable> {
    let tokens = tokens
        .iter()
        .filter(|token| !token.text.trim().is_empty())
        .cloned()
        .collect::<Vec<_>>();
    if tokens.is_empty() {
        return None;
    }

    let bands = derive_bands(&tokens, config.column_gap);
    if !(config.min_bands..=config.max_bands).contains(&bands.len()) {
        debug!(bands = bands.len(), "page rejected: band count out of range");
        return None;
    }

    let rows = cluster_rows(&tokens, config.row_tolerance);
    let grid = prune_grid(build_grid(&rows, &bands));
    if grid.is_empty() || grid[0].is_empty() {
        return None;
    }

    let (headers, data, _) = split_header(grid, is_layout_header_row);
    let confidence = layout_confidence(&headers, &data, confidence_floor);

    Some(ExtractedTable::new(
        table_index,
        headers,
        data,
        confidence,
        token_bounds(&tokens),
    ))
}

/// Runs [`detect_page`] over every page, numbering tables across the document.
#[must_use]
pub fn detect_layout_tables(
    pages: &[PageTokens],
    config: &DetectionConfig,
    confidence_floor: u8,
) -> Vec<ExtractedTable> {
    let mut tables = Vec::new();
    for page in pages {
        if let Some(table) = detect_page(&page.tokens, config, tables.len(), confidence_floor) {
            debug!(
                page = page.page_number,
                rows = table.row_count(),
                columns = table.column_count(),
                "layout table detected"
            );
            tables.push(table);
        }
    }
    tables
}

#[cfg(test)]
mod tests {
    use super::{band_index, cluster_rows, derive_bands, detect_layout_tables, detect_page};
    use crate::model::{PageTokens, Token};
    use crate::options::DetectionConfig;

    fn line(y: f32, cells: &[(f32, &str)]) -> Vec<Token> {
        cells
            .iter()
            .map(|(x, text)| Token::new(*text, *x, y))
            .collect()
    }

    fn sales_page() -> Vec<Token> {
        [
            line(700.0, &[(50.0, "Product"), (200.0, "Revenue"), (350.0, "Growth %")]),
            line(680.0, &[(50.0, "Widget"), (200.0, "$1,200"), (350.0, "12%")]),
            line(660.0, &[(50.0, "Gadget"), (200.0, "$900"), (350.0, "4%")]),
        ]
        .concat()
    }

    #[test]
    fn clusters_rows_top_to_bottom_and_left_to_right() {
        let tokens = vec![
            Token::new("b", 100.0, 500.0),
            Token::new("low", 10.0, 400.0),
            Token::new("a", 10.0, 501.5),
        ];
        let rows = cluster_rows(&tokens, 3.0);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].y, 501.5);
        assert_eq!(rows[0].tokens[0].text, "a");
        assert_eq!(rows[0].tokens[1].text, "b");
        assert_eq!(rows[1].tokens[0].text, "low");
    }

    #[test]
    fn row_grouping_ignores_emission_order() {
        let texts = |rows: &[crate::model::Row]| {
            rows.iter()
                .map(|row| row.tokens.iter().map(|token| token.text.clone()).collect::<Vec<_>>())
                .collect::<Vec<_>>()
        };
        let top_down = vec![
            Token::new("ten", 0.0, 10.0),
            Token::new("seven", 20.0, 7.0),
            Token::new("four", 40.0, 4.0),
        ];
        let bottom_up = top_down.iter().rev().cloned().collect::<Vec<_>>();
        let shuffled = vec![top_down[0].clone(), top_down[2].clone(), top_down[1].clone()];

        let expected = texts(&cluster_rows(&top_down, 3.0));
        assert_eq!(expected, vec![vec!["ten", "seven"], vec!["four"]]);
        assert_eq!(texts(&cluster_rows(&bottom_up, 3.0)), expected);
        assert_eq!(texts(&cluster_rows(&shuffled, 3.0)), expected);
    }

    #[test]
    fn bands_are_contiguous_and_cover_every_position() {
        let tokens = line(0.0, &[(10.0, "a"), (25.0, "b"), (100.0, "c")]);
        let bands = derive_bands(&tokens, 20.0);
        assert_eq!(bands.len(), 2);
        assert_eq!(bands[0].max_x, bands[1].min_x);
        for token in &tokens {
            assert!(band_index(&bands, token.x).is_some());
        }
    }

    #[test]
    fn boundary_position_belongs_to_the_band_that_starts_there() {
        let tokens = line(0.0, &[(10.0, "a"), (100.0, "b")]);
        let bands = derive_bands(&tokens, 20.0);
        assert_eq!(band_index(&bands, 100.0), Some(1));
        assert_eq!(band_index(&bands, 99.9), Some(0));
    }

    #[test]
    fn detects_header_row_and_scores_full_grid() {
        let table = detect_page(&sales_page(), &DetectionConfig::default(), 0, 30)
            .expect("page should be tabular");
        assert_eq!(table.headers, vec!["Product", "Revenue", "Growth %"]);
        assert_eq!(table.data.len(), 2);
        assert_eq!(table.data[0], vec!["Widget", "$1,200", "12%"]);
        assert_eq!(table.confidence, 90);
    }

    #[test]
    fn synthesizes_headers_for_numeric_first_row() {
        let tokens = [
            line(700.0, &[(50.0, "2021"), (200.0, "$5")]),
            line(680.0, &[(50.0, "2022"), (200.0, "$7")]),
        ]
        .concat();
        let table =
            detect_page(&tokens, &DetectionConfig::default(), 0, 30).expect("table expected");
        assert_eq!(table.headers, vec!["Column 1", "Column 2"]);
        assert_eq!(table.data.len(), 2);
    }

    #[test]
    fn joins_tokens_in_the_same_cell_with_a_space() {
        let tokens = [
            line(700.0, &[(50.0, "North"), (60.0, "America"), (200.0, "Total")]),
            line(680.0, &[(50.0, "Europe"), (200.0, "12")]),
        ]
        .concat();
        let table =
            detect_page(&tokens, &DetectionConfig::default(), 0, 30).expect("table expected");
        assert_eq!(table.headers[0], "North America");
    }

    #[test]
    fn rejects_single_band_pages() {
        let tokens = [
            line(700.0, &[(50.0, "Just"), (55.0, "prose")]),
            line(680.0, &[(52.0, "more"), (60.0, "prose")]),
        ]
        .concat();
        assert!(detect_page(&tokens, &DetectionConfig::default(), 0, 30).is_none());
    }

    #[test]
    fn rejects_thirteen_band_pages() {
        let cells = (0..13_u8)
            .map(|index| (f32::from(index) * 50.0, "v"))
            .collect::<Vec<_>>();
        let thirteen = [line(700.0, &cells), line(680.0, &cells)].concat();
        assert!(detect_page(&thirteen, &DetectionConfig::default(), 0, 30).is_none());

        let twelve = [line(700.0, &cells[..12]), line(680.0, &cells[..12])].concat();
        assert!(detect_page(&twelve, &DetectionConfig::default(), 0, 30).is_some());
    }

    #[test]
    fn ignores_blank_tokens() {
        let mut tokens = sales_page();
        tokens.push(Token::new("   ", 900.0, 640.0));
        let table =
            detect_page(&tokens, &DetectionConfig::default(), 0, 30).expect("table expected");
        assert_eq!(table.column_count(), 3);
    }

    #[test]
    fn numbers_tables_across_pages() {
        let pages = vec![
            PageTokens {
                page_number: 1,
                tokens: sales_page(),
            },
            PageTokens {
                page_number: 2,
                tokens: vec![Token::new("prose", 50.0, 700.0)],
            },
            PageTokens {
                page_number: 3,
                tokens: sales_page(),
            },
        ];
        let tables = detect_layout_tables(&pages, &DetectionConfig::default(), 30);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].table_index, 0);
        assert_eq!(tables[1].table_index, 1);
    }
}
