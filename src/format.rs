// Display formatting for aggregated rows.
//
// All rounding goes through `util::round_to_int` (halves away from zero), so
// the collapsed carpet-area string and the price columns agree at .5
// boundaries.
use crate::config::PipelineConfig;
use crate::types::{FormattedRow, KeyValue, ReportRow, ReportTable};
use crate::util::round_to_int;
use chrono::NaiveDate;

/// `"450"` when min and max round to the same integer, `"430-470"` otherwise,
/// and an empty string when the group has no area at all.
pub fn carpet_area_display(min: Option<f64>, max: Option<f64>) -> String {
    match (min.map(round_to_int), max.map(round_to_int)) {
        (Some(lo), Some(hi)) if lo == hi => lo.to_string(),
        (Some(lo), Some(hi)) => format!("{}-{}", lo, hi),
        (Some(v), None) | (None, Some(v)) => v.to_string(),
        (None, None) => String::new(),
    }
}

pub fn round_price(v: Option<f64>) -> Option<i64> {
    v.map(round_to_int)
}

/// `2028-08-01` -> `"Aug-28"`.
pub fn month_year(date: NaiveDate) -> String {
    date.format("%b-%y").to_string()
}

pub fn key_display(key: &KeyValue) -> String {
    match key {
        KeyValue::Text(s) => s.clone(),
        KeyValue::Date(d) => month_year(*d),
        KeyValue::Bucket(b) => b.to_string(),
    }
}

pub fn format_row(row: &ReportRow, config: &PipelineConfig) -> FormattedRow {
    let mut average_apr = round_price(row.average_apr);
    if config.zero_fill_average && average_apr.is_none() {
        average_apr = Some(0);
    }
    FormattedRow {
        keys: row.key.iter().map(key_display).collect(),
        carpet_area: carpet_area_display(row.min_carpet, row.max_carpet),
        min_apr: round_price(row.min_apr),
        max_apr: round_price(row.max_apr),
        average_apr,
        count_of_property: round_to_int(row.count_of_property),
        total_count: round_price(row.total_count),
    }
}

/// Format every aggregated row under the configured report headers.
pub fn format_report(rows: &[ReportRow], config: &PipelineConfig) -> ReportTable {
    ReportTable {
        headers: config.report_headers(),
        rows: rows.iter().map(|r| format_row(r, config)).collect(),
    }
}
