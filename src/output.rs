use crate::error::ReportError;
use crate::types::ReportTable;
use serde::Serialize;
use std::path::Path;
use tabled::{builder::Builder, settings::Style};

pub fn write_csv(path: &Path, table: &ReportTable) -> Result<(), ReportError> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(&table.headers)?;
    for r in &table.rows {
        wtr.write_record(r.cells())?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ReportError> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), ReportError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Markdown rendering of the first `max_rows` rows, or `None` if there are none.
pub fn render_preview(table: &ReportTable, max_rows: usize) -> Option<String> {
    if table.rows.is_empty() {
        return None;
    }
    let mut builder = Builder::default();
    builder.push_record(table.headers.clone());
    for r in table.rows.iter().take(max_rows) {
        builder.push_record(r.cells());
    }
    let mut rendered = builder.build();
    rendered.with(Style::markdown());
    Some(rendered.to_string())
}

pub fn preview_table_rows(table: &ReportTable, max_rows: usize) {
    match render_preview(table, max_rows) {
        Some(s) => println!("{}\n", s),
        None => println!("(no rows)\n"),
    }
}
