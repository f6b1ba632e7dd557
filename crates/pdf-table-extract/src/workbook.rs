use std::io::Write;
use std::path::{Path, PathBuf};

use csv::WriterBuilder;

use crate::error::ExtractError;
use crate::model::ExtractedTable;

fn write_sheet<W: Write>(writer: W, table: &ExtractedTable, delimiter: u8) -> Result<W, ExtractError> {
    let mut writer = WriterBuilder::new().delimiter(delimiter).from_writer(writer);
    writer.write_record(&table.headers)?;
    for row in &table.data {
        writer.write_record(row)?;
    }
    writer.flush()?;

    writer
        .into_inner()
        .map_err(|error| ExtractError::Csv(error.into_error().into()))
}

/// Renders one table as a delimited sheet: a header record, then data rows.
pub fn render_table_csv(table: &ExtractedTable, delimiter: u8) -> Result<String, ExtractError> {
    let bytes = write_sheet(Vec::<u8>::new(), table, delimiter)?;
    String::from_utf8(bytes)
        .map_err(|error| ExtractError::InvalidOption(format!("invalid utf-8 csv output: {error}")))
}

#[must_use]
pub fn sheet_file_name(file_stem: &str, table: &ExtractedTable) -> String {
    format!("{file_stem}_table_{}.csv", table.table_index)
}

/// Writes one sheet per table into `dir`, returning the written paths in
/// table order.
pub fn write_workbook(
    dir: &Path,
    file_stem: &str,
    tables: &[ExtractedTable],
    delimiter: u8,
) -> Result<Vec<PathBuf>, ExtractError> {
    std::fs::create_dir_all(dir)?;

    let mut paths = Vec::with_capacity(tables.len());
    for table in tables {
        let path = dir.join(sheet_file_name(file_stem, table));
        let file = std::fs::File::create(&path)?;
        write_sheet(file, table, delimiter)?;
        paths.push(path);
    }
    Ok(paths)
}
