// Fill-forward for columns left blank by merged cells in the source sheet.
use crate::error::ReportError;
use crate::types::{Cell, Column, SheetTable};
use tracing::debug;

/// Copy the nearest value above into every blank cell of each listed column,
/// in row order. Columns the sheet does not have are skipped.
///
/// A blank first row has nothing to copy from and is an error, since a
/// missing leading group key would corrupt every group below it.
/// Returns the number of cells filled.
pub fn fill_forward(table: &mut SheetTable, columns: &[Column]) -> Result<usize, ReportError> {
    let mut filled = 0usize;
    for &column in columns {
        let Some(idx) = table.find_column(column) else {
            continue;
        };
        let Some(first) = table.rows.first() else {
            continue;
        };
        if first[idx].is_empty() {
            return Err(ReportError::MissingLeadingValue(table.columns[idx].clone()));
        }
        filled += fill_column(&mut table.rows, idx);
    }
    debug!(cells = filled, "filled merged-cell gaps");
    Ok(filled)
}

/// Like [`fill_forward`], but blanks above the first value stay blank.
/// Used for columns that are shown but never grouped on.
pub fn fill_forward_lenient(table: &mut SheetTable, columns: &[Column]) -> usize {
    let mut filled = 0usize;
    for &column in columns {
        if let Some(idx) = table.find_column(column) {
            filled += fill_column(&mut table.rows, idx);
        }
    }
    debug!(cells = filled, "filled optional columns");
    filled
}

fn fill_column(rows: &mut [Vec<Cell>], idx: usize) -> usize {
    let mut filled = 0usize;
    let mut last: Option<Cell> = None;
    for row in rows.iter_mut() {
        if !row[idx].is_empty() {
            last = Some(row[idx].clone());
        } else if let Some(value) = &last {
            row[idx] = value.clone();
            filled += 1;
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn sheet(rows: Vec<Vec<Cell>>) -> SheetTable {
        SheetTable {
            sheet_name: "summary".to_string(),
            columns: vec!["Property".to_string(), "Total Count".to_string(), "Configuration".to_string()],
            rows,
            row_numbers: Vec::new(),
        }
    }

    #[test]
    fn blanks_take_nearest_value_above() {
        let mut t = sheet(vec![
            vec![text("Tower A"), Cell::Number(10.0), text("1BHK")],
            vec![Cell::Empty, Cell::Empty, text("2BHK")],
            vec![text("  "), Cell::Empty, Cell::Empty],
            vec![text("Tower B"), Cell::Number(4.0), text("3BHK")],
            vec![Cell::Empty, Cell::Empty, text("1BHK")],
        ]);
        let filled = fill_forward(&mut t, &[Column::Property, Column::TotalCount]).unwrap();
        assert_eq!(filled, 6);
        let props: Vec<_> = t.rows.iter().map(|r| r[0].clone()).collect();
        assert_eq!(
            props,
            vec![text("Tower A"), text("Tower A"), text("Tower A"), text("Tower B"), text("Tower B")]
        );
        assert_eq!(t.rows[2][1], Cell::Number(10.0));
        assert_eq!(t.rows[4][1], Cell::Number(4.0));
        // columns not listed are untouched
        assert_eq!(t.rows[2][2], Cell::Empty);
    }

    #[test]
    fn filling_a_full_column_changes_nothing() {
        let rows = vec![
            vec![text("A"), Cell::Number(1.0), text("x")],
            vec![text("B"), Cell::Number(2.0), text("y")],
        ];
        let mut t = sheet(rows.clone());
        assert_eq!(fill_forward(&mut t, &[Column::Property, Column::TotalCount]).unwrap(), 0);
        assert_eq!(t.rows, rows);
    }

    #[test]
    fn leading_blank_is_an_error() {
        let mut t = sheet(vec![
            vec![Cell::Empty, Cell::Number(1.0), text("x")],
            vec![text("A"), Cell::Number(1.0), text("x")],
        ]);
        let err = fill_forward(&mut t, &[Column::Property]).unwrap_err();
        assert!(matches!(err, ReportError::MissingLeadingValue(ref c) if c == "Property"));
    }

    #[test]
    fn absent_columns_and_empty_sheets_are_skipped() {
        let mut t = sheet(vec![vec![text("A"), Cell::Number(1.0), text("x")]]);
        assert_eq!(fill_forward(&mut t, &[Column::Location]).unwrap(), 0);
        let mut empty = sheet(vec![]);
        assert_eq!(fill_forward(&mut empty, &[Column::Property]).unwrap(), 0);
    }

    #[test]
    fn lenient_fill_keeps_leading_blanks() {
        let mut t = sheet(vec![
            vec![text("A"), Cell::Empty, text("x")],
            vec![text("A"), Cell::Number(3.0), text("x")],
            vec![text("A"), Cell::Empty, text("x")],
        ]);
        assert_eq!(fill_forward_lenient(&mut t, &[Column::TotalCount, Column::Location]), 1);
        assert_eq!(t.rows[0][1], Cell::Empty);
        assert_eq!(t.rows[2][1], Cell::Number(3.0));
    }
}
