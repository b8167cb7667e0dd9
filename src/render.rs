// xlsx rendering: a passthrough `summary` sheet and the styled `report` sheet.
use crate::error::ReportError;
use crate::types::{Cell, ReportTable, RowRun, SheetTable};
use chrono::Datelike;
use rust_xlsxwriter::{Color, ExcelDateTime, Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use tracing::debug;

/// Fill colours cycled over outer-key runs, in run order.
const PALETTE: [u32; 6] = [0xDDEBF7, 0xE2EFDA, 0xFFF2CC, 0xFCE4D6, 0xEDE7F6, 0xD9D9D9];

pub const SUMMARY_SHEET: &str = "summary";
pub const REPORT_SHEET: &str = "report";

fn header_format() -> Format {
    Format::new()
        .set_bold()
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_background_color(Color::RGB(0xBDD7EE))
}

fn cell_format(fill: u32) -> Format {
    Format::new()
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_background_color(Color::RGB(fill))
}

/// Render both sheets and return the workbook bytes.
pub fn write_report_workbook(
    summary: &SheetTable,
    report: &ReportTable,
    runs: &[RowRun],
) -> Result<Vec<u8>, ReportError> {
    let mut workbook = Workbook::new();

    let ws = workbook.add_worksheet();
    ws.set_name(SUMMARY_SHEET)?;
    write_summary_sheet(ws, summary)?;

    let ws = workbook.add_worksheet();
    ws.set_name(REPORT_SHEET)?;
    write_report_sheet(ws, report, runs)?;

    let bytes = workbook.save_to_buffer()?;
    debug!(bytes = bytes.len(), rows = report.rows.len(), runs = runs.len(), "rendered workbook");
    Ok(bytes)
}

fn write_summary_sheet(ws: &mut Worksheet, table: &SheetTable) -> Result<(), ReportError> {
    let bold = Format::new().set_bold();
    let date_fmt = Format::new().set_num_format("dd-mm-yyyy");
    for (c, name) in table.columns.iter().enumerate() {
        ws.write_string_with_format(0, c as u16, name, &bold)?;
    }
    for (r, row) in table.rows.iter().enumerate() {
        let r = (r + 1) as u32;
        for (c, cell) in row.iter().enumerate() {
            let c = c as u16;
            match cell {
                Cell::Empty => {}
                Cell::Text(s) => {
                    ws.write_string(r, c, s)?;
                }
                Cell::Number(n) => {
                    ws.write_number(r, c, *n)?;
                }
                Cell::Date(d) => {
                    let dt = ExcelDateTime::from_ymd(d.year() as u16, d.month() as u8, d.day() as u8)?;
                    ws.write_datetime_with_format(r, c, &dt, &date_fmt)?;
                }
            }
        }
    }
    ws.set_freeze_panes(1, 0)?;
    ws.autofit();
    Ok(())
}

/// Header row, then one row per report row. Each run of the outermost key
/// gets one merged cell in column 0 and one palette colour across its rows.
fn write_report_sheet(ws: &mut Worksheet, report: &ReportTable, runs: &[RowRun]) -> Result<(), ReportError> {
    let header = header_format();
    for (c, name) in report.headers.iter().enumerate() {
        ws.write_string_with_format(0, c as u16, name, &header)?;
    }

    for (run_idx, run) in runs.iter().enumerate() {
        let fmt = cell_format(PALETTE[run_idx % PALETTE.len()]);
        let first = (run.start + 1) as u32;
        let last = (run.end + 1) as u32;
        if first == last {
            ws.write_string_with_format(first, 0, &run.key, &fmt)?;
        } else {
            ws.merge_range(first, 0, last, 0, &run.key, &fmt)?;
        }

        for i in run.start..=run.end {
            let Some(row) = report.rows.get(i) else {
                continue;
            };
            let r = (i + 1) as u32;
            let mut c = 1u16;
            for key in row.keys.iter().skip(1) {
                ws.write_string_with_format(r, c, key, &fmt)?;
                c += 1;
            }
            ws.write_string_with_format(r, c, &row.carpet_area, &fmt)?;
            c += 1;
            let numbers = [
                row.min_apr,
                row.max_apr,
                row.average_apr,
                Some(row.count_of_property),
                row.total_count,
            ];
            for value in numbers {
                match value {
                    Some(n) => ws.write_number_with_format(r, c, n as f64, &fmt)?,
                    None => ws.write_blank(r, c, &fmt)?,
                };
                c += 1;
            }
        }
    }
    ws.set_freeze_panes(1, 0)?;
    ws.autofit();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::row_runs;
    use crate::types::FormattedRow;
    use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
    use chrono::NaiveDate;
    use std::io::Cursor;

    fn row(property: &str, config: &str, avg: Option<i64>) -> FormattedRow {
        FormattedRow {
            keys: vec![property.to_string(), config.to_string()],
            carpet_area: "430-470".to_string(),
            min_apr: Some(9000),
            max_apr: Some(11000),
            average_apr: avg,
            count_of_property: 3,
            total_count: Some(40),
        }
    }

    #[test]
    fn workbook_has_summary_and_report_sheets() {
        let summary = SheetTable {
            sheet_name: "Summary".to_string(),
            columns: vec!["Property".to_string(), "Last Completion Date".to_string()],
            rows: vec![vec![
                Cell::Text("Tower A".to_string()),
                Cell::Date(NaiveDate::from_ymd_opt(2028, 8, 28).unwrap()),
            ]],
            row_numbers: vec![2],
        };
        let report = ReportTable {
            headers: crate::config::PipelineConfig::default().report_headers(),
            rows: vec![row("Tower A", "1BHK", Some(133)), row("Tower A", "2BHK", None), row("Tower B", "1BHK", Some(7))],
        };
        let runs = row_runs(&report.rows);
        let bytes = write_report_workbook(&summary, &report, &runs).unwrap();

        let mut wb: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).unwrap();
        assert_eq!(wb.sheet_names(), vec!["summary".to_string(), "report".to_string()]);

        let sheet = wb.worksheet_range(REPORT_SHEET).unwrap();
        assert_eq!(sheet.get_value((0, 0)), Some(&Data::String("Property".to_string())));
        assert_eq!(sheet.get_value((1, 0)), Some(&Data::String("Tower A".to_string())));
        // second row of the Tower A run is covered by the merge
        assert!(matches!(sheet.get_value((2, 0)), None | Some(Data::Empty)));
        assert_eq!(sheet.get_value((3, 0)), Some(&Data::String("Tower B".to_string())));
        assert_eq!(sheet.get_value((1, 1)), Some(&Data::String("1BHK".to_string())));
        assert_eq!(sheet.get_value((1, 2)), Some(&Data::String("430-470".to_string())));
        assert_eq!(sheet.get_value((1, 5)), Some(&Data::Float(133.0)));
        assert!(matches!(sheet.get_value((2, 5)), None | Some(Data::Empty)));

        let summary_range = wb.worksheet_range(SUMMARY_SHEET).unwrap();
        assert_eq!(summary_range.get_value((1, 0)), Some(&Data::String("Tower A".to_string())));
    }
}
