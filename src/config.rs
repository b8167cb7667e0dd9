// Pipeline modes and delivery settings.
//
// Everything a run needs is carried in these values and passed down by
// reference; nothing here is global.
use crate::error::ReportError;
use crate::types::Column;
use clap::ValueEnum;
use std::fmt;

/// A column that may be used as a grouping dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupField {
    Location,
    Property,
    LastCompletionDate,
    Configuration,
}

impl GroupField {
    pub fn parse(name: &str) -> Result<Self, ReportError> {
        let norm: String = name
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match norm.as_str() {
            "location" => Ok(GroupField::Location),
            "property" => Ok(GroupField::Property),
            "lastcompletiondate" | "completiondate" => Ok(GroupField::LastCompletionDate),
            "configuration" | "configurations" => Ok(GroupField::Configuration),
            _ => Err(ReportError::Configuration(format!(
                "unknown group-by column '{}' (expected location, property, last_completion_date or configuration)",
                name.trim()
            ))),
        }
    }

    /// Parse a comma separated list such as `property,configuration`.
    pub fn parse_list(list: &str) -> Result<Vec<Self>, ReportError> {
        let fields = list
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(GroupField::parse)
            .collect::<Result<Vec<_>, _>>()?;
        if fields.is_empty() {
            return Err(ReportError::Configuration(
                "at least one group-by column is required".to_string(),
            ));
        }
        for (i, f) in fields.iter().enumerate() {
            if fields[..i].contains(f) {
                return Err(ReportError::Configuration(format!(
                    "group-by column '{}' listed twice",
                    f.column()
                )));
            }
        }
        Ok(fields)
    }

    pub fn column(self) -> Column {
        match self {
            GroupField::Location => Column::Location,
            GroupField::Property => Column::Property,
            GroupField::LastCompletionDate => Column::LastCompletionDate,
            GroupField::Configuration => Column::Configuration,
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            GroupField::Configuration => "Configurations",
            other => other.column().label(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AverageMode {
    /// sum(apr * count) / sum(count)
    Weighted,
    /// plain mean of the per-row averages
    Simple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AreaUnit {
    Sqft,
    Sqmt,
}

impl AreaUnit {
    pub fn column(self) -> Column {
        match self {
            AreaUnit::Sqft => Column::CarpetAreaSqft,
            AreaUnit::Sqmt => Column::CarpetAreaSqmt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TotalCountMode {
    First,
    Sum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BucketKind {
    None,
    FixedWidth,
    NamedBins,
}

/// Extra innermost grouping dimension derived from an area value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bucketing {
    None,
    /// `[floor(v / width) * width, +width)` over square feet.
    FixedWidth { width: u32 },
    /// 0-40, 40-60, 60-80, 80-100, 100-150, 150+ over square metres.
    NamedBins,
}

impl Bucketing {
    pub fn from_kind(kind: BucketKind, width: u32) -> Result<Self, ReportError> {
        match kind {
            BucketKind::None => Ok(Bucketing::None),
            BucketKind::NamedBins => Ok(Bucketing::NamedBins),
            BucketKind::FixedWidth if width == 0 => Err(ReportError::Configuration(
                "bucket width must be greater than zero".to_string(),
            )),
            BucketKind::FixedWidth => Ok(Bucketing::FixedWidth { width }),
        }
    }

    pub fn source_column(self) -> Option<Column> {
        match self {
            Bucketing::None => None,
            Bucketing::FixedWidth { .. } => Some(Column::CarpetAreaSqft),
            Bucketing::NamedBins => Some(Column::CarpetAreaSqmt),
        }
    }

    pub fn header(self) -> Option<&'static str> {
        match self {
            Bucketing::None => None,
            Bucketing::FixedWidth { .. } => Some("Carpet Area Range (SQ.FT)"),
            Bucketing::NamedBins => Some("Carpet Area Range (SQ.MT)"),
        }
    }
}

impl fmt::Display for Bucketing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucketing::None => f.write_str("none"),
            Bucketing::FixedWidth { width } => write!(f, "fixed-width({})", width),
            Bucketing::NamedBins => f.write_str("named-bins"),
        }
    }
}

/// How one report is grouped, averaged and rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub group_by: Vec<GroupField>,
    pub average: AverageMode,
    pub bucketing: Bucketing,
    pub area_unit: AreaUnit,
    pub total_count: TotalCountMode,
    /// Render a missing average as 0 instead of leaving the cell blank.
    pub zero_fill_average: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            group_by: vec![GroupField::Property, GroupField::Configuration],
            average: AverageMode::Weighted,
            bucketing: Bucketing::None,
            area_unit: AreaUnit::Sqft,
            total_count: TotalCountMode::First,
            zero_fill_average: false,
        }
    }
}

impl PipelineConfig {
    /// Columns filled down when the sheet has them; a blank first row is an
    /// error. The completion date joins them only when it is a group key.
    pub fn fill_forward_columns(&self) -> Vec<Column> {
        let mut cols = vec![Column::Property, Column::Location, Column::TotalCount];
        if self.groups_by_date() {
            cols.push(Column::LastCompletionDate);
        }
        cols
    }

    /// Columns filled down below their first value, leading blanks allowed.
    pub fn lenient_fill_columns(&self) -> Vec<Column> {
        if self.groups_by_date() {
            Vec::new()
        } else {
            vec![Column::LastCompletionDate]
        }
    }

    fn groups_by_date(&self) -> bool {
        self.group_by.contains(&GroupField::LastCompletionDate)
    }

    /// Columns the sheet must have for this configuration.
    pub fn required_columns(&self) -> Vec<Column> {
        let mut cols: Vec<Column> = self.group_by.iter().map(|g| g.column()).collect();
        cols.push(self.area_unit.column());
        cols.push(Column::AverageApr);
        if self.average == AverageMode::Weighted {
            cols.push(Column::CountOfProperty);
        }
        if let Some(c) = self.bucketing.source_column() {
            cols.push(c);
        }
        let mut seen = Vec::new();
        cols.retain(|c| {
            if seen.contains(c) {
                false
            } else {
                seen.push(*c);
                true
            }
        });
        cols
    }

    /// Header row of the report sheet.
    pub fn report_headers(&self) -> Vec<String> {
        let mut headers: Vec<String> = self.group_by.iter().map(|g| g.header().to_string()).collect();
        if let Some(h) = self.bucketing.header() {
            headers.push(h.to_string());
        }
        let area = match self.area_unit {
            AreaUnit::Sqft => "Carpet Area (SQ.FT)",
            AreaUnit::Sqmt => "Carpet Area (SQ.MT)",
        };
        headers.push(area.to_string());
        headers.push("Min. APR".to_string());
        headers.push("Max APR".to_string());
        let avg = match self.average {
            AverageMode::Weighted => "Weighted Avg APR",
            AverageMode::Simple => "Avg APR",
        };
        headers.push(avg.to_string());
        headers.push("Count of Property".to_string());
        headers.push("Total Count".to_string());
        headers
    }

    pub fn key_width(&self) -> usize {
        self.group_by.len() + usize::from(self.bucketing != Bucketing::None)
    }
}

/// Outbound mail settings, supplied per run.
#[derive(Debug, Clone, PartialEq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    /// Domain appended to `first.last` recipient identifiers.
    pub recipient_domain: String,
}
