// Schema normalisation: sheet lookup, header cleanup, numeric coercion and
// day-first date parsing. Nothing here fails on a bad numeric cell; it just
// becomes missing.
use crate::error::ReportError;
use crate::types::{Cell, Column, SheetTable, UnitRow};
use crate::util::{parse_day_first_date, parse_f64_safe};
use chrono::{Datelike, Duration, NaiveDate};
use tracing::{debug, warn};

const SHEET_NAMES: [&str; 2] = ["summary", "Summary"];

/// Pick the summary sheet out of a workbook's sheet list.
///
/// Exact spellings win; otherwise any case variant of `summary` is accepted.
pub fn resolve_sheet_name(names: &[String]) -> Result<String, ReportError> {
    SHEET_NAMES
        .iter()
        .find_map(|want| names.iter().find(|n| n.as_str() == *want))
        .or_else(|| {
            names
                .iter()
                .find(|n| n.trim().eq_ignore_ascii_case(SHEET_NAMES[0]))
        })
        .cloned()
        .ok_or_else(|| ReportError::SheetNotFound {
            available: names.to_vec(),
        })
}

/// Trim headers, coerce numeric columns and parse the completion date column.
pub fn normalize(table: &mut SheetTable) -> Result<(), ReportError> {
    trim_headers(table);
    let degraded = coerce_numeric(table);
    if degraded > 0 {
        warn!(cells = degraded, "non-numeric cells in numeric columns treated as missing");
    }
    parse_dates(table)?;
    debug!(rows = table.rows.len(), "normalized sheet");
    Ok(())
}

pub fn trim_headers(table: &mut SheetTable) {
    for name in &mut table.columns {
        let trimmed = name.trim();
        if trimmed.len() != name.len() {
            *name = trimmed.to_string();
        }
    }
}

/// Turn every cell of the numeric columns into a number or `Empty`.
/// Returns how many non-blank cells could not be read as numbers.
pub fn coerce_numeric(table: &mut SheetTable) -> usize {
    let mut degraded = 0usize;
    for column in Column::NUMERIC {
        let Some(idx) = table.find_column(column) else {
            continue;
        };
        for row in &mut table.rows {
            let cell = &mut row[idx];
            let coerced = match cell {
                Cell::Empty => Cell::Empty,
                Cell::Number(n) if n.is_finite() => Cell::Number(*n),
                Cell::Text(s) => match parse_f64_safe(Some(s.as_str())) {
                    Some(v) => Cell::Number(v),
                    None if s.trim().is_empty() => Cell::Empty,
                    None => {
                        degraded += 1;
                        Cell::Empty
                    }
                },
                Cell::Number(_) | Cell::Date(_) => {
                    degraded += 1;
                    Cell::Empty
                }
            };
            *cell = coerced;
        }
    }
    degraded
}

/// Parse the Last Completion Date column day-first. Unlike numbers, a date
/// that cannot be read is an error naming the cell. So is a date the report
/// workbook cannot hold (before 1900 or after 9999).
pub fn parse_dates(table: &mut SheetTable) -> Result<(), ReportError> {
    let Some(idx) = table.find_column(Column::LastCompletionDate) else {
        return Ok(());
    };
    let column = table.columns[idx].clone();
    let sheet_rows: Vec<usize> = (0..table.rows.len()).map(|i| table.row_number(i)).collect();
    for (row, sheet_row) in table.rows.iter_mut().zip(sheet_rows) {
        let cell = &mut row[idx];
        if cell.is_empty() {
            *cell = Cell::Empty;
            continue;
        }
        let (parsed, raw) = match &*cell {
            Cell::Empty => continue,
            Cell::Text(s) => (parse_day_first_date(s), s.clone()),
            Cell::Number(serial) => (excel_serial_to_date(*serial), serial.to_string()),
            Cell::Date(d) => (Some(*d), d.format("%d-%m-%Y").to_string()),
        };
        let date = parsed
            .filter(in_workbook_range)
            .ok_or_else(|| ReportError::DateParse {
                column: column.clone(),
                row: sheet_row,
                value: raw,
            })?;
        *cell = Cell::Date(date);
    }
    Ok(())
}

/// Years an xlsx date cell can hold.
fn in_workbook_range(date: &NaiveDate) -> bool {
    (1900..=9999).contains(&date.year())
}

/// Serial day numbers in the 1900 date system (day 0 = 1899-12-30).
///
/// Serials below 61 fall before Excel's phantom 1900-02-29 and would land a
/// day early, so they are not accepted; 2 958 465 is 9999-12-31.
fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(61.0..2_958_466.0).contains(&serial) {
        return None;
    }
    let days = Duration::try_days(serial.trunc() as i64)?;
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(days)
}

/// Fail with `MissingColumn` unless every listed column is present.
pub fn require_columns(table: &SheetTable, columns: &[Column]) -> Result<(), ReportError> {
    match columns.iter().find(|c| table.find_column(**c).is_none()) {
        Some(c) => Err(ReportError::MissingColumn(c.label().to_string())),
        None => Ok(()),
    }
}

/// Read typed unit rows out of a normalised, filled table.
pub fn extract_rows(table: &SheetTable) -> Vec<UnitRow> {
    let text = |row: &[Cell], col: Option<usize>| col.and_then(|i| row[i].as_text());
    let num = |row: &[Cell], col: Option<usize>| col.and_then(|i| row[i].as_number());

    let location = table.find_column(Column::Location);
    let property = table.find_column(Column::Property);
    let configuration = table.find_column(Column::Configuration);
    let sqft = table.find_column(Column::CarpetAreaSqft);
    let sqmt = table.find_column(Column::CarpetAreaSqmt);
    let min_apr = table.find_column(Column::MinApr);
    let max_apr = table.find_column(Column::MaxApr);
    let average_apr = table.find_column(Column::AverageApr);
    let count = table.find_column(Column::CountOfProperty);
    let total = table.find_column(Column::TotalCount);
    let date = table.find_column(Column::LastCompletionDate);

    table
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| UnitRow {
            source_row: table.row_number(i),
            location: text(row, location),
            property: text(row, property),
            configuration: text(row, configuration),
            carpet_area_sqft: num(row, sqft),
            carpet_area_sqmt: num(row, sqmt),
            min_apr: num(row, min_apr),
            max_apr: num(row, max_apr),
            average_apr: num(row, average_apr),
            count_of_property: num(row, count),
            total_count: num(row, total),
            last_completion_date: date.and_then(|d| row[d].as_date()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: Vec<Vec<Cell>>) -> SheetTable {
        SheetTable {
            sheet_name: "summary".to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
            row_numbers: Vec::new(),
        }
    }

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    #[test]
    fn sheet_name_resolution() {
        let names = vec!["Data".to_string(), "SUMMARY".to_string()];
        assert_eq!(resolve_sheet_name(&names).unwrap(), "SUMMARY");
        let names = vec!["Summary".to_string(), "summary".to_string()];
        assert_eq!(resolve_sheet_name(&names).unwrap(), "summary");
        let err = resolve_sheet_name(&["Report".to_string()]).unwrap_err();
        assert!(matches!(err, ReportError::SheetNotFound { .. }));
        assert!(err.to_string().contains("Report"));
    }

    #[test]
    fn headers_are_trimmed_so_lookup_finds_them() {
        let mut t = table(&["  Property ", "Average of APR\t"], vec![]);
        assert!(t.find_column(Column::Property).is_some());
        trim_headers(&mut t);
        assert_eq!(t.columns, vec!["Property", "Average of APR"]);
    }

    #[test]
    fn bad_numeric_cells_become_missing() {
        let mut t = table(
            &["Property", "Average of APR", "Count of Property"],
            vec![
                vec![text("A"), text("1,200"), Cell::Number(2.0)],
                vec![text("B"), text("n/a"), text(" ")],
                vec![text("C"), Cell::Number(f64::NAN), text("3")],
            ],
        );
        let degraded = coerce_numeric(&mut t);
        assert_eq!(degraded, 2);
        assert_eq!(t.rows[0][1], Cell::Number(1200.0));
        assert_eq!(t.rows[1][1], Cell::Empty);
        assert_eq!(t.rows[1][2], Cell::Empty);
        assert_eq!(t.rows[2][2], Cell::Number(3.0));
        // text columns are left alone
        assert_eq!(t.rows[1][0], text("B"));
    }

    #[test]
    fn dates_parse_day_first() {
        let mut t = table(
            &["Last Completion Date"],
            vec![vec![text("28-08-2028")], vec![Cell::Empty], vec![Cell::Number(46_997.0)]],
        );
        parse_dates(&mut t).unwrap();
        assert_eq!(t.rows[0][0], Cell::Date(NaiveDate::from_ymd_opt(2028, 8, 28).unwrap()));
        assert_eq!(t.rows[1][0], Cell::Empty);
        assert_eq!(t.rows[2][0], Cell::Date(NaiveDate::from_ymd_opt(2028, 9, 1).unwrap()));
    }

    #[test]
    fn unparseable_date_names_the_cell() {
        let mut t = table(
            &["Last Completion Date"],
            vec![vec![text("01-01-2027")], vec![text("2027/13/45")]],
        );
        let err = parse_dates(&mut t).unwrap_err();
        match err {
            ReportError::DateParse { column, row, value } => {
                assert_eq!(column, "Last Completion Date");
                assert_eq!(row, 3);
                assert_eq!(value, "2027/13/45");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn date_errors_use_the_loaded_sheet_row() {
        let mut t = table(
            &["Last Completion Date"],
            vec![vec![text("01-01-2027")], vec![text("2028-31-12")]],
        );
        t.row_numbers = vec![2, 5];
        let err = parse_dates(&mut t).unwrap_err();
        assert!(matches!(err, ReportError::DateParse { row: 5, .. }));
    }

    #[test]
    fn out_of_range_serials_are_date_errors() {
        for serial in [1e15, -3.0, 1.0, 60.0, 2_958_466.0] {
            let mut t = table(&["Last Completion Date"], vec![vec![Cell::Number(serial)]]);
            let err = parse_dates(&mut t).unwrap_err();
            assert!(
                matches!(err, ReportError::DateParse { row: 2, .. }),
                "serial {serial} gave {err:?}"
            );
        }
        let mut t = table(
            &["Last Completion Date"],
            vec![vec![Cell::Number(61.0)], vec![Cell::Number(2_958_465.0)]],
        );
        parse_dates(&mut t).unwrap();
        assert_eq!(t.rows[0][0], Cell::Date(NaiveDate::from_ymd_opt(1900, 3, 1).unwrap()));
        assert_eq!(t.rows[1][0], Cell::Date(NaiveDate::from_ymd_opt(9999, 12, 31).unwrap()));
    }

    #[test]
    fn dates_before_1900_are_rejected() {
        let mut t = table(&["Last Completion Date"], vec![vec![text("31-12-1899")]]);
        assert!(matches!(parse_dates(&mut t), Err(ReportError::DateParse { .. })));
        let mut t = table(
            &["Last Completion Date"],
            vec![vec![Cell::Date(NaiveDate::from_ymd_opt(1850, 6, 1).unwrap())]],
        );
        assert!(matches!(parse_dates(&mut t), Err(ReportError::DateParse { .. })));
    }

    #[test]
    fn missing_required_column() {
        let t = table(&["Property"], vec![]);
        let err = require_columns(&t, &[Column::Property, Column::AverageApr]).unwrap_err();
        assert!(matches!(err, ReportError::MissingColumn(ref c) if c == "Average of APR"));
    }

    #[test]
    fn extract_reads_aliases_and_types() {
        let mut t = table(
            &["property", "Configurations", "Carpet Area (SQ.FT)", "Min APR", "Total Count"],
            vec![vec![text("Tower A"), text("2BHK"), text("450.4"), Cell::Number(9000.0), text("12")]],
        );
        normalize(&mut t).unwrap();
        let rows = extract_rows(&t);
        assert_eq!(rows.len(), 1);
        let r = &rows[0];
        assert_eq!(r.source_row, 2);
        assert_eq!(r.property.as_deref(), Some("Tower A"));
        assert_eq!(r.configuration.as_deref(), Some("2BHK"));
        assert_eq!(r.carpet_area_sqft, Some(450.4));
        assert_eq!(r.min_apr, Some(9000.0));
        assert_eq!(r.total_count, Some(12.0));
        assert_eq!(r.location, None);
    }
}
