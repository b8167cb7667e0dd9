use thiserror::Error;

/// Every way a report run can fail.
///
/// The `Display` text is what the user sees, so each variant names the sheet,
/// column or cell it is about.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("sheet 'summary' not found (available: {})", .available.join(", "))]
    SheetNotFound { available: Vec<String> },

    #[error("required column '{0}' is missing from the summary sheet")]
    MissingColumn(String),

    #[error("cannot parse date '{value}' in column '{column}' at row {row} (expected DD-MM-YYYY)")]
    DateParse {
        column: String,
        row: usize,
        value: String,
    },

    #[error("column '{0}' has no value in its first row, nothing to fill down from")]
    MissingLeadingValue(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to deliver report: {0}")]
    DeliveryFailure(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("cannot read workbook: {0}")]
    WorkbookRead(#[from] calamine::Error),

    #[error("cannot write workbook: {0}")]
    WorkbookWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("cannot serialize summary: {0}")]
    Json(#[from] serde_json::Error),
}
