// Entry point and CLI flow.
//
// By default the binary runs an interactive menu:
// - [1] loads, normalises and fills the summary sheet, printing diagnostics,
// - [2] aggregates it into the report workbook (plus optional CSV/JSON),
// - [3] emails the last generated workbook.
// `--batch` runs the same steps once without prompts.
mod config;
mod delivery;
mod error;
mod fill;
mod format;
mod loader;
mod normalize;
mod output;
mod pipeline;
mod render;
mod reports;
mod types;
mod util;

use clap::{Args, Parser};
use config::{AreaUnit, AverageMode, BucketKind, Bucketing, GroupField, PipelineConfig, SmtpSettings, TotalCountMode};
use delivery::{send_report, SmtpMailer};
use error::ReportError;
use pipeline::{GeneratedReport, PreparedSheet};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "unit_report", version, about = "Aggregate a unit listing summary sheet into a grouped property report")]
struct Cli {
    /// Workbook (.xlsx/.xls/.ods) or CSV export containing the summary sheet.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Where to save the rendered report workbook.
    #[arg(short, long, default_value = "report.xlsx")]
    output: PathBuf,

    /// Also export the report rows as CSV.
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Also write a JSON run summary.
    #[arg(long)]
    json: Option<PathBuf>,

    /// Comma separated group key: location, property, last_completion_date, configuration.
    #[arg(long, default_value = "property,configuration")]
    group_by: String,

    #[arg(long, value_enum, default_value_t = AverageMode::Weighted)]
    average: AverageMode,

    #[arg(long, value_enum, default_value_t = BucketKind::None)]
    bucketing: BucketKind,

    /// Bucket width for `--bucketing fixed-width`.
    #[arg(long, default_value_t = 50)]
    bucket_width: u32,

    /// Area column shown as the carpet-area range.
    #[arg(long, value_enum, default_value_t = AreaUnit::Sqft)]
    area_unit: AreaUnit,

    #[arg(long, value_enum, default_value_t = TotalCountMode::First)]
    total_count: TotalCountMode,

    /// Show 0 instead of a blank cell when a group has no average.
    #[arg(long)]
    zero_fill_average: bool,

    /// Run load + generate (+ email with --recipient) once and exit.
    #[arg(long)]
    batch: bool,

    /// Recipient as `first.last` or a full address.
    #[arg(long)]
    recipient: Option<String>,

    #[command(flatten)]
    smtp: SmtpArgs,
}

#[derive(Debug, Args)]
struct SmtpArgs {
    #[arg(long, env = "REPORT_SMTP_HOST")]
    smtp_host: Option<String>,
    #[arg(long, env = "REPORT_SMTP_PORT", default_value_t = 587)]
    smtp_port: u16,
    #[arg(long, env = "REPORT_SMTP_USERNAME")]
    smtp_username: Option<String>,
    #[arg(long, env = "REPORT_SMTP_PASSWORD", hide_env_values = true)]
    smtp_password: Option<String>,
    #[arg(long, env = "REPORT_MAIL_FROM")]
    mail_from: Option<String>,
    #[arg(long, env = "REPORT_MAIL_FROM_NAME", default_value = "Property Reports")]
    mail_from_name: String,
    /// Domain appended to `first.last` recipients.
    #[arg(long, env = "REPORT_MAIL_DOMAIN")]
    mail_domain: Option<String>,
}

impl SmtpArgs {
    fn settings(&self) -> Result<SmtpSettings, ReportError> {
        fn need(value: &Option<String>, name: &str) -> Result<String, ReportError> {
            value
                .clone()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ReportError::Configuration(format!("{} is not set", name)))
        }
        Ok(SmtpSettings {
            host: need(&self.smtp_host, "SMTP host (--smtp-host / REPORT_SMTP_HOST)")?,
            port: self.smtp_port,
            username: need(&self.smtp_username, "SMTP username (--smtp-username / REPORT_SMTP_USERNAME)")?,
            password: need(&self.smtp_password, "SMTP password (--smtp-password / REPORT_SMTP_PASSWORD)")?,
            from_email: need(&self.mail_from, "sender address (--mail-from / REPORT_MAIL_FROM)")?,
            from_name: self.mail_from_name.clone(),
            recipient_domain: need(&self.mail_domain, "recipient domain (--mail-domain / REPORT_MAIL_DOMAIN)")?,
        })
    }
}

impl Cli {
    fn pipeline_config(&self) -> Result<PipelineConfig, ReportError> {
        Ok(PipelineConfig {
            group_by: GroupField::parse_list(&self.group_by)?,
            average: self.average,
            bucketing: Bucketing::from_kind(self.bucketing, self.bucket_width)?,
            area_unit: self.area_unit,
            total_count: self.total_count,
            zero_fill_average: self.zero_fill_average,
        })
    }
}

/// State of one interactive session: the loaded sheet and the last report.
#[derive(Default)]
struct Session {
    prepared: Option<PreparedSheet>,
    report: Option<GeneratedReport>,
}

/// Print `label` and read one trimmed line from stdin.
fn prompt(label: &str) -> String {
    print!("{}", label);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

fn read_choice() -> String {
    prompt("Enter choice: ")
}

/// Option [1]: load, normalise and fill the summary sheet.
fn handle_load(cli: &Cli, config: &PipelineConfig, session: &mut Session) -> Result<(), ReportError> {
    let path = match &cli.input {
        Some(p) => p.clone(),
        None => PathBuf::from(prompt("Path to summary file: ")),
    };
    let prepared = pipeline::load(&path, config)?;
    println!(
        "Processing sheet '{}'... ({} rows, {} columns)\n",
        prepared.table.sheet_name,
        util::format_int(prepared.rows.len()),
        util::format_int(prepared.table.columns.len())
    );
    session.prepared = Some(prepared);
    session.report = None;
    Ok(())
}

/// Option [2]: aggregate, save the workbook and optional exports, preview.
fn handle_generate(cli: &Cli, config: &PipelineConfig, session: &mut Session) -> Result<(), ReportError> {
    let Some(prepared) = &session.prepared else {
        println!("Error: No data loaded. Please load the file first (option 1).\n");
        return Ok(());
    };
    println!("Generating report...");
    let report = pipeline::generate(prepared, config)?;
    save_report(cli, &report)?;
    session.report = Some(report);
    Ok(())
}

/// Write the workbook plus any CSV/JSON exports, then print the preview.
fn save_report(cli: &Cli, report: &GeneratedReport) -> Result<(), ReportError> {
    output::write_bytes(&cli.output, &report.workbook)?;
    if let Some(path) = &cli.csv {
        output::write_csv(path, &report.table)?;
    }
    if let Some(path) = &cli.json {
        output::write_json(path, &report.summary)?;
    }

    println!(
        "Report: {} groups from {} rows ({} units)",
        util::format_int(report.summary.groups),
        util::format_int(report.summary.rows_in),
        util::format_int(report.summary.units)
    );
    if report.summary.rows_dropped > 0 {
        println!(
            "Note: {} rows skipped because a group column was blank.",
            util::format_int(report.summary.rows_dropped)
        );
    }
    println!();
    output::preview_table_rows(&report.table, 5);
    println!("(Full report saved to {})\n", cli.output.display());
    Ok(())
}

/// Option [3]: send the last generated workbook.
fn handle_email(cli: &Cli, session: &Session) -> Result<(), ReportError> {
    let Some(report) = &session.report else {
        println!("Error: No report generated yet (option 2).\n");
        return Ok(());
    };
    let recipient = match &cli.recipient {
        Some(r) => r.clone(),
        None => prompt("Recipient (first.last): "),
    };
    email_report(cli, &recipient, report, &cli.output)
}

fn email_report(cli: &Cli, recipient: &str, report: &GeneratedReport, saved: &Path) -> Result<(), ReportError> {
    let settings = cli.smtp.settings()?;
    let mailer = SmtpMailer::new(&settings)?;
    match send_report(&mailer, &settings, recipient, report.workbook.clone()) {
        Ok(to) => {
            println!("Report emailed to {}\n", to);
            Ok(())
        }
        Err(e) => {
            println!("The report is still available at {}", saved.display());
            Err(e)
        }
    }
}

fn run_batch(cli: &Cli, config: &PipelineConfig) -> Result<(), ReportError> {
    let Some(input) = &cli.input else {
        return Err(ReportError::Configuration("--batch needs --input".to_string()));
    };
    let report = pipeline::run(input, config)?;
    save_report(cli, &report)?;
    if let Some(recipient) = &cli.recipient {
        email_report(cli, recipient, &report, &cli.output)?;
    }
    Ok(())
}

fn run_menu(cli: &Cli, config: &PipelineConfig) {
    let mut session = Session::default();
    loop {
        println!("Property Report");
        println!("[1] Load the file");
        println!("[2] Generate Report");
        println!("[3] Email Report");
        println!("[4] Exit\n");
        let result = match read_choice().as_str() {
            "1" => handle_load(cli, config, &mut session),
            "2" => {
                println!();
                handle_generate(cli, config, &mut session)
            }
            "3" => handle_email(cli, &session),
            "4" => {
                println!("Exiting the program.");
                break;
            }
            _ => {
                println!("Invalid choice. Please enter 1, 2, 3 or 4.\n");
                Ok(())
            }
        };
        if let Err(e) = result {
            error!(error = %e, "step failed");
            eprintln!("Error: {}\n", e);
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match cli.pipeline_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    if cli.batch {
        if let Err(e) = run_batch(&cli, &config) {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
        return ExitCode::SUCCESS;
    }
    run_menu(&cli, &config);
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_builds_pipeline_config() {
        let cli = Cli::parse_from([
            "unit_report",
            "--group-by",
            "location,property",
            "--average",
            "simple",
            "--bucketing",
            "fixed-width",
            "--bucket-width",
            "100",
            "--total-count",
            "sum",
            "--zero-fill-average",
        ]);
        let cfg = cli.pipeline_config().unwrap();
        assert_eq!(cfg.group_by, vec![GroupField::Location, GroupField::Property]);
        assert_eq!(cfg.average, AverageMode::Simple);
        assert_eq!(cfg.bucketing, Bucketing::FixedWidth { width: 100 });
        assert_eq!(cfg.total_count, TotalCountMode::Sum);
        assert!(cfg.zero_fill_average);
    }

    #[test]
    fn unknown_group_by_rejected_at_startup() {
        let cli = Cli::parse_from(["unit_report", "--group-by", "tower"]);
        assert!(matches!(cli.pipeline_config(), Err(ReportError::Configuration(_))));
    }

    #[test]
    fn missing_smtp_settings_are_named() {
        let args = SmtpArgs {
            smtp_host: Some("smtp.example.com".to_string()),
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            mail_from: None,
            mail_from_name: "Reports".to_string(),
            mail_domain: None,
        };
        let err = args.settings().unwrap_err();
        assert!(err.to_string().contains("SMTP username"));
    }
}
