// One report run: sheet in, workbook bytes out. Any error aborts the whole
// run and nothing partial is returned.
use crate::config::PipelineConfig;
use crate::error::ReportError;
use crate::fill::{fill_forward, fill_forward_lenient};
use crate::format::format_report;
use crate::loader::load_summary_sheet;
use crate::normalize::{extract_rows, normalize, require_columns};
use crate::render::write_report_workbook;
use crate::reports::{aggregate, row_runs};
use crate::types::{ReportTable, RunSummary, SheetTable, UnitRow};
use std::path::Path;
use tracing::info;

/// A loaded sheet after normalisation and fill-forward.
#[derive(Debug, Clone)]
pub struct PreparedSheet {
    pub source_file: String,
    pub table: SheetTable,
    pub rows: Vec<UnitRow>,
}

#[derive(Debug)]
pub struct GeneratedReport {
    pub table: ReportTable,
    pub workbook: Vec<u8>,
    pub summary: RunSummary,
}

/// Normalise, validate and fill a raw sheet.
pub fn prepare(
    mut table: SheetTable,
    source_file: &str,
    config: &PipelineConfig,
) -> Result<PreparedSheet, ReportError> {
    normalize(&mut table)?;
    require_columns(&table, &config.required_columns())?;
    fill_forward(&mut table, &config.fill_forward_columns())?;
    fill_forward_lenient(&mut table, &config.lenient_fill_columns());
    let rows = extract_rows(&table);
    Ok(PreparedSheet {
        source_file: source_file.to_string(),
        table,
        rows,
    })
}

pub fn load(path: &Path, config: &PipelineConfig) -> Result<PreparedSheet, ReportError> {
    let table = load_summary_sheet(path)?;
    prepare(table, &path.display().to_string(), config)
}

/// Aggregate, format and render a prepared sheet.
pub fn generate(prepared: &PreparedSheet, config: &PipelineConfig) -> Result<GeneratedReport, ReportError> {
    // Modes may have changed since the sheet was loaded.
    require_columns(&prepared.table, &config.required_columns())?;

    let aggregation = aggregate(&prepared.rows, config);
    let table = format_report(&aggregation.rows, config);
    let runs = row_runs(&table.rows);
    let workbook = write_report_workbook(&prepared.table, &table, &runs)?;

    let summary = RunSummary {
        source_file: prepared.source_file.clone(),
        sheet: prepared.table.sheet_name.clone(),
        rows_in: prepared.rows.len(),
        rows_dropped: aggregation.dropped,
        groups: table.rows.len(),
        units: table.rows.iter().map(|r| r.count_of_property).sum(),
        group_by: config.group_by.iter().map(|g| g.header().to_string()).collect(),
        average_mode: format!("{:?}", config.average).to_lowercase(),
        bucketing: config.bucketing.to_string(),
        runs,
    };
    info!(groups = summary.groups, rows = summary.rows_in, "report generated");
    Ok(GeneratedReport {
        table,
        workbook,
        summary,
    })
}

/// Load and generate in one step, for non-interactive runs.
pub fn run(path: &Path, config: &PipelineConfig) -> Result<GeneratedReport, ReportError> {
    let prepared = load(path, config)?;
    generate(&prepared, config)
}
