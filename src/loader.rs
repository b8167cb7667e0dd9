use crate::error::ReportError;
use crate::normalize::resolve_sheet_name;
use crate::types::{Cell, SheetTable};
#[cfg(test)]
use calamine::open_workbook_auto_from_rs;
use calamine::{open_workbook_auto, Data, Reader, Sheets};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use std::io::{Read, Seek};
use std::path::Path;
use tracing::debug;

/// Sheet name a CSV export is treated as.
const CSV_SHEET_NAME: &str = "summary";

/// Load the summary sheet of a workbook or CSV file as raw cells.
///
/// Header names are left untouched here; trimming is the normaliser's job.
pub fn load_summary_sheet(path: &Path) -> Result<SheetTable, ReportError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let table = match ext.as_str() {
        "csv" => {
            let file = std::fs::File::open(path)?;
            load_csv(file)?
        }
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook(open_workbook_auto(path)?)?,
        other => {
            return Err(ReportError::Configuration(format!(
                "unsupported input file type '{}' (expected .xlsx, .xls, .ods or .csv)",
                other
            )))
        }
    };
    debug!(
        sheet = %table.sheet_name,
        columns = table.columns.len(),
        rows = table.rows.len(),
        "loaded sheet"
    );
    Ok(table)
}

/// Load the summary sheet from an in-memory workbook.
#[cfg(test)]
pub fn load_workbook_bytes(bytes: Vec<u8>) -> Result<SheetTable, ReportError> {
    read_workbook(open_workbook_auto_from_rs(std::io::Cursor::new(bytes))?)
}

fn read_workbook<RS: Read + Seek>(mut workbook: Sheets<RS>) -> Result<SheetTable, ReportError> {
    let names = workbook.sheet_names();
    let sheet_name = resolve_sheet_name(&names)?;
    let range = workbook.worksheet_range(&sheet_name)?;

    // The range starts at the first non-empty cell, not at A1.
    let header_row = range.start().map(|(row, _)| row as usize + 1).unwrap_or(1);
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(SheetTable {
            sheet_name,
            ..SheetTable::default()
        });
    };
    let columns: Vec<String> = header
        .iter()
        .map(|c| convert_cell(c).as_text().unwrap_or_default())
        .collect();
    let width = columns.len();
    let mut data = Vec::new();
    let mut row_numbers = Vec::new();
    for (offset, row) in rows.enumerate() {
        let mut cells: Vec<Cell> = row.iter().take(width).map(convert_cell).collect();
        cells.resize(width, Cell::Empty);
        if cells.iter().all(Cell::is_empty) {
            continue;
        }
        data.push(cells);
        row_numbers.push(header_row + 1 + offset);
    }

    Ok(SheetTable {
        sheet_name,
        columns,
        rows: data,
        row_numbers,
    })
}

/// Read a CSV export; the whole file is the summary sheet.
pub fn load_csv<R: Read>(reader: R) -> Result<SheetTable, ReportError> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let columns: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let width = columns.len();
    let mut rows = Vec::new();
    let mut row_numbers = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(rows.len() + 2);
        let mut cells: Vec<Cell> = record
            .iter()
            .take(width)
            .map(|s| {
                if s.trim().is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(s.to_string())
                }
            })
            .collect();
        cells.resize(width, Cell::Empty);
        if !cells.iter().all(Cell::is_empty) {
            rows.push(cells);
            row_numbers.push(line);
        }
    }
    Ok(SheetTable {
        sheet_name: CSV_SHEET_NAME.to_string(),
        columns,
        rows,
        row_numbers,
    })
}

fn convert_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty => Cell::Empty,
        Data::String(s) if s.trim().is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) => Cell::Date(ndt.date()),
            None => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => s
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .map(Cell::Date)
            .unwrap_or_else(|| Cell::Text(s.clone())),
        Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(_) => Cell::Empty,
    }
}
