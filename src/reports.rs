use crate::config::{AreaUnit, AverageMode, Bucketing, GroupField, PipelineConfig, TotalCountMode};
use crate::types::{AreaBucket, FormattedRow, GroupKey, KeyValue, ReportRow, RowRun, UnitRow};
use crate::util::mean;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Edges of the named square-metre bins; everything from the last edge up is one open bin.
const NAMED_BIN_EDGES: [i64; 6] = [0, 40, 60, 80, 100, 150];

/// Result of grouping one sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    /// One row per distinct key, in ascending key order.
    pub rows: Vec<ReportRow>,
    /// Rows left out because a key column was still blank.
    pub dropped: usize,
}

#[derive(Default)]
struct Acc {
    rows: usize,
    min_carpet: Option<f64>,
    max_carpet: Option<f64>,
    min_apr: Option<f64>,
    max_apr: Option<f64>,
    apr_values: Vec<f64>,
    weighted_sum: f64,
    weight_sum: f64,
    count_sum: f64,
    total_first: Option<f64>,
    total_sum: Option<f64>,
}

fn fold_min(acc: Option<f64>, v: Option<f64>) -> Option<f64> {
    match (acc, v) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn fold_max(acc: Option<f64>, v: Option<f64>) -> Option<f64> {
    match (acc, v) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

impl Acc {
    fn push(&mut self, r: &UnitRow, carpet: Option<f64>) {
        self.rows += 1;
        self.min_carpet = fold_min(self.min_carpet, carpet);
        self.max_carpet = fold_max(self.max_carpet, carpet);
        self.min_apr = fold_min(self.min_apr, r.min_apr);
        self.max_apr = fold_max(self.max_apr, r.max_apr);
        if let Some(apr) = r.average_apr {
            self.apr_values.push(apr);
        }
        // Each row contributes apr * count before anything is divided.
        if let (Some(apr), Some(count)) = (r.average_apr, r.count_of_property) {
            self.weighted_sum += apr * count;
            self.weight_sum += count;
        }
        if let Some(count) = r.count_of_property {
            self.count_sum += count;
        }
        if self.total_first.is_none() {
            self.total_first = r.total_count;
        }
        if let Some(total) = r.total_count {
            self.total_sum = Some(self.total_sum.unwrap_or(0.0) + total);
        }
    }

    fn finish(self, key: GroupKey, config: &PipelineConfig) -> ReportRow {
        let average_apr = match config.average {
            AverageMode::Simple => mean(&self.apr_values),
            AverageMode::Weighted if self.weight_sum == 0.0 => None,
            AverageMode::Weighted => Some(self.weighted_sum / self.weight_sum),
        };
        let total_count = match config.total_count {
            TotalCountMode::First => self.total_first,
            TotalCountMode::Sum => self.total_sum,
        };
        ReportRow {
            key,
            rows: self.rows,
            min_carpet: self.min_carpet,
            max_carpet: self.max_carpet,
            min_apr: self.min_apr,
            max_apr: self.max_apr,
            average_apr,
            count_of_property: self.count_sum,
            total_count,
        }
    }
}

/// `[floor(v / width) * width, +width)`; negative or non-finite areas have no bucket.
pub fn fixed_width_bucket(value: f64, width: u32) -> Option<AreaBucket> {
    if !value.is_finite() || value < 0.0 || width == 0 {
        return None;
    }
    let w = f64::from(width);
    let lower = ((value / w).floor() * w) as i64;
    Some(AreaBucket {
        lower,
        upper: Some(lower + i64::from(width)),
    })
}

/// Named square-metre bins: 0-40, 40-60, 60-80, 80-100, 100-150, 150+.
pub fn named_bin(value: f64) -> Option<AreaBucket> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let last = NAMED_BIN_EDGES[NAMED_BIN_EDGES.len() - 1];
    if value >= last as f64 {
        return Some(AreaBucket { lower: last, upper: None });
    }
    NAMED_BIN_EDGES
        .windows(2)
        .find(|w| value >= w[0] as f64 && value < w[1] as f64)
        .map(|w| AreaBucket {
            lower: w[0],
            upper: Some(w[1]),
        })
}

fn bucket_for(r: &UnitRow, bucketing: Bucketing) -> Option<AreaBucket> {
    match bucketing {
        Bucketing::None => None,
        Bucketing::FixedWidth { width } => fixed_width_bucket(r.carpet_area_sqft?, width),
        Bucketing::NamedBins => named_bin(r.carpet_area_sqmt?),
    }
}

/// Build the group key for a row, or `None` if any component is blank.
fn group_key(r: &UnitRow, config: &PipelineConfig) -> Option<GroupKey> {
    let mut key = Vec::with_capacity(config.key_width());
    for field in &config.group_by {
        let part = match field {
            GroupField::Location => KeyValue::Text(r.location.clone()?),
            GroupField::Property => KeyValue::Text(r.property.clone()?),
            GroupField::Configuration => KeyValue::Text(r.configuration.clone()?),
            GroupField::LastCompletionDate => KeyValue::Date(r.last_completion_date?),
        };
        key.push(part);
    }
    if config.bucketing != Bucketing::None {
        key.push(KeyValue::Bucket(bucket_for(r, config.bucketing)?));
    }
    Some(key)
}

/// Group unit rows by the configured key and compute per-group aggregates.
///
/// Groups come out in ascending key order, so the same input always yields
/// the same rows in the same order.
pub fn aggregate(rows: &[UnitRow], config: &PipelineConfig) -> Aggregation {
    let mut groups: BTreeMap<GroupKey, Acc> = BTreeMap::new();
    let mut dropped = 0usize;
    for r in rows {
        let Some(key) = group_key(r, config) else {
            debug!(row = r.source_row, "blank group key");
            dropped += 1;
            continue;
        };
        let carpet = match config.area_unit {
            AreaUnit::Sqft => r.carpet_area_sqft,
            AreaUnit::Sqmt => r.carpet_area_sqmt,
        };
        groups.entry(key).or_default().push(r, carpet);
    }
    if dropped > 0 {
        warn!(rows = dropped, "rows with a blank group key were left out of the report");
    }
    let rows: Vec<ReportRow> = groups
        .into_iter()
        .map(|(key, acc)| acc.finish(key, config))
        .collect();
    debug!(
        groups = rows.len(),
        largest = rows.iter().map(|r| r.rows).max().unwrap_or(0),
        "aggregated groups"
    );
    Aggregation { rows, dropped }
}

/// Contiguous blocks of rows sharing the outermost key, in row order.
pub fn row_runs(rows: &[FormattedRow]) -> Vec<RowRun> {
    let mut runs: Vec<RowRun> = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let key = row.keys.first().cloned().unwrap_or_default();
        match runs.last_mut() {
            Some(run) if run.key == key => run.end = i,
            _ => runs.push(RowRun { key, start: i, end: i }),
        }
    }
    runs
}
