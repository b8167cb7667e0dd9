use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// One cell of a loaded sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(n) => n.is_nan(),
            Cell::Date(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
            // Integral numbers come back from workbooks as floats; "3" reads better than "3.0".
            Cell::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(format!("{}", *n as i64)),
            Cell::Number(n) if n.is_finite() => Some(n.to_string()),
            Cell::Number(_) => None,
            Cell::Date(d) => Some(d.format("%d-%m-%Y").to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            _ => None,
        }
    }
}

/// A sheet as a header row plus data rows. Every row has `columns.len()` cells.
#[derive(Debug, Clone, Default)]
pub struct SheetTable {
    pub sheet_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    /// 1-based sheet row of each entry in `rows`. Loaders skip blank rows, so
    /// this is not simply the index plus two.
    pub row_numbers: Vec<usize>,
}

impl SheetTable {
    /// Sheet row of `rows[i]`. Tables built without positions count from
    /// row 2, right under the header.
    pub fn row_number(&self, i: usize) -> usize {
        self.row_numbers.get(i).copied().unwrap_or(i + 2)
    }

    /// Case-insensitive lookup of the first column matching any alias.
    pub fn find_column(&self, column: Column) -> Option<usize> {
        column.aliases().iter().find_map(|alias| {
            self.columns
                .iter()
                .position(|c| c.trim().eq_ignore_ascii_case(alias))
        })
    }
}

/// The columns the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Location,
    Property,
    Configuration,
    CarpetAreaSqft,
    CarpetAreaSqmt,
    MinApr,
    MaxApr,
    AverageApr,
    MedianApr,
    CountOfProperty,
    TotalCount,
    LastCompletionDate,
}

impl Column {
    pub const NUMERIC: [Column; 8] = [
        Column::CarpetAreaSqft,
        Column::CarpetAreaSqmt,
        Column::MinApr,
        Column::MaxApr,
        Column::AverageApr,
        Column::MedianApr,
        Column::CountOfProperty,
        Column::TotalCount,
    ];

    /// Accepted header spellings; the first one is the canonical label.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Column::Location => &["Location"],
            Column::Property => &["Property"],
            Column::Configuration => &["Configuration", "Configurations"],
            Column::CarpetAreaSqft => &["Carpet Area(SQ.FT)", "Carpet Area (SQ.FT)"],
            Column::CarpetAreaSqmt => &["Carpet Area (SQ.MT)", "Carpet Area(SQ.MT)"],
            Column::MinApr => &["Min. APR", "Min APR"],
            Column::MaxApr => &["Max APR", "Max. APR"],
            Column::AverageApr => &["Average of APR", "Avg APR"],
            Column::MedianApr => &["Median of APR"],
            Column::CountOfProperty => &["Count of Property"],
            Column::TotalCount => &["Total Count"],
            Column::LastCompletionDate => &["Last Completion Date"],
        }
    }

    pub fn label(self) -> &'static str {
        self.aliases()[0]
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One listing record after normalisation and fill-forward.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitRow {
    /// 1-based row number in the source sheet (header is row 1).
    pub source_row: usize,
    pub location: Option<String>,
    pub property: Option<String>,
    pub configuration: Option<String>,
    pub carpet_area_sqft: Option<f64>,
    pub carpet_area_sqmt: Option<f64>,
    pub min_apr: Option<f64>,
    pub max_apr: Option<f64>,
    pub average_apr: Option<f64>,
    pub count_of_property: Option<f64>,
    pub total_count: Option<f64>,
    pub last_completion_date: Option<NaiveDate>,
}

/// Bin an area value falls into. `upper == None` is the open-ended last bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AreaBucket {
    pub lower: i64,
    pub upper: Option<i64>,
}

impl fmt::Display for AreaBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upper {
            Some(upper) => write!(f, "{}-{}", self.lower, upper),
            None => write!(f, "{}+", self.lower),
        }
    }
}

/// One component of a group key. Ordering is what sorts the report.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyValue {
    Text(String),
    Date(NaiveDate),
    Bucket(AreaBucket),
}

pub type GroupKey = Vec<KeyValue>;

/// Aggregates for one group, before display formatting.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub key: GroupKey,
    pub rows: usize,
    pub min_carpet: Option<f64>,
    pub max_carpet: Option<f64>,
    pub min_apr: Option<f64>,
    pub max_apr: Option<f64>,
    pub average_apr: Option<f64>,
    pub count_of_property: f64,
    pub total_count: Option<f64>,
}

/// A report row in display form, one string per key column.
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedRow {
    pub keys: Vec<String>,
    pub carpet_area: String,
    pub min_apr: Option<i64>,
    pub max_apr: Option<i64>,
    pub average_apr: Option<i64>,
    pub count_of_property: i64,
    pub total_count: Option<i64>,
}

impl FormattedRow {
    /// Cells in header order, missing values rendered blank.
    pub fn cells(&self) -> Vec<String> {
        let opt = |v: Option<i64>| v.map(|n| n.to_string()).unwrap_or_default();
        let mut out = self.keys.clone();
        out.push(self.carpet_area.clone());
        out.push(opt(self.min_apr));
        out.push(opt(self.max_apr));
        out.push(opt(self.average_apr));
        out.push(self.count_of_property.to_string());
        out.push(opt(self.total_count));
        out
    }
}

/// Header row plus formatted rows, ready for any writer.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportTable {
    pub headers: Vec<String>,
    pub rows: Vec<FormattedRow>,
}

/// A contiguous block of report rows sharing the outermost key.
/// `start` and `end` are inclusive indices into the report rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowRun {
    pub key: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub source_file: String,
    pub sheet: String,
    pub rows_in: usize,
    pub rows_dropped: usize,
    pub groups: usize,
    pub units: i64,
    pub group_by: Vec<String>,
    pub average_mode: String,
    pub bucketing: String,
    /// Merged outer-key blocks of the report sheet.
    pub runs: Vec<RowRun>,
}
