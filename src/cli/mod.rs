use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::Path;
use uuid::Uuid;

use crate::application::{AuthOutcome, LedgerService, SubmitOutcome, Submission};
use crate::config::{
    ADMIN_LOGIN_ENV_VAR, DATABASE_ENV_VAR, DEFAULT_DATABASE_PATH, LedgerConfig,
};
use crate::domain::{
    OperationType, PaymentRecord, RecordField, RecordFilter, RecordId, Session, format_cents,
    parse_cents,
};
use crate::io::{ExportFormat, export_file_name, write_records_csv, write_records_json};

mod shell;

pub use shell::split_line;

/// Tuition Ledger - student payment bookkeeping
#[derive(Parser)]
#[command(name = "tuition-ledger")]
#[command(about = "Record tuition payments, amend them, and export the ledger to a spreadsheet")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = DATABASE_ENV_VAR, default_value = DEFAULT_DATABASE_PATH)]
    pub database: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Record a payment
    Submit(SubmitArgs),

    /// Change the amount of an existing record and append a note
    Amend(AmendArgs),

    /// Look up all records for a student
    Query {
        /// Student name (exact match)
        student: String,
    },

    /// Show a single record
    Show {
        /// Record ID
        id: String,
    },

    /// Administrative commands (require the admin secret)
    Admin {
        /// Administrative secret (prompted for on stdin when not given)
        #[arg(short, long, env = ADMIN_LOGIN_ENV_VAR, hide_env_values = true)]
        secret: Option<String>,

        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start an interactive session
    Shell,
}

#[derive(Args, Clone)]
pub struct SubmitArgs {
    /// Student name
    pub student: String,

    /// Operation: InitialPayment, SupplementalPayment, Refund
    #[arg(short, long)]
    pub operation: OperationType,

    /// Course name
    #[arg(short, long)]
    pub course: String,

    /// Amount (e.g., "150.00" or "150")
    #[arg(short, long)]
    pub amount: String,

    /// Remarks
    #[arg(short, long, default_value = "")]
    pub remarks: String,
}

#[derive(Args, Clone)]
pub struct AmendArgs {
    /// Record ID
    pub id: String,

    /// New amount (e.g., "150.00")
    #[arg(short, long)]
    pub amount: String,

    /// Note appended to the remarks
    #[arg(short, long, default_value = "")]
    pub remarks: String,
}

#[derive(Args, Clone)]
pub struct FilterArgs {
    /// Field to filter on: operation, course, student
    #[arg(short, long)]
    pub field: RecordField,

    /// Value to match exactly
    pub value: String,
}

#[derive(Args, Clone)]
pub struct ExportArgs {
    /// Output file name (defaults to records_<date>_<time>)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Format: xlsx, csv, json
    #[arg(short, long, default_value = "xlsx")]
    pub format: ExportFormat,

    /// Only export records where this field...
    #[arg(long, requires = "value")]
    pub field: Option<RecordField>,

    /// ...equals this value
    #[arg(long, requires = "field")]
    pub value: Option<String>,
}

#[derive(Subcommand, Clone)]
pub enum AdminCommands {
    /// List every record
    List,

    /// List records matching a field value
    Filter(FilterArgs),

    /// Show the distinct values of a field
    Values {
        /// Field: operation, course, student
        field: RecordField,
    },

    /// Permanently delete a record
    Delete {
        /// Record ID
        id: String,
    },

    /// Export records to a file
    Export(ExportArgs),
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = LedgerConfig::from_env(&self.database)?;

        match self.command {
            Commands::Init => {
                LedgerService::init(&config.database_path, config.admin_secret.clone()).await?;
                println!("Database initialized: {}", config.database_path);
            }

            Commands::Submit(args) => {
                let service = LedgerService::from_config(&config).await?;
                let mut session = Session::new();
                run_submit(&service, &mut session, args).await?;
            }

            Commands::Amend(args) => {
                let service = LedgerService::from_config(&config).await?;
                let id = parse_record_id(&args.id)?;
                run_amend(&service, id, &args.amount, &args.remarks).await?;
            }

            Commands::Query { student } => {
                let service = LedgerService::from_config(&config).await?;
                run_query(&service, &student).await?;
            }

            Commands::Show { id } => {
                let service = LedgerService::from_config(&config).await?;
                let record = service.get_record(parse_record_id(&id)?).await?;
                print_record_detail(&record);
            }

            Commands::Admin { secret, command } => {
                let secret = match secret {
                    Some(secret) => secret,
                    None => prompt_secret()?,
                };
                let service = LedgerService::from_config(&config).await?;
                let mut session = Session::new();
                if service.authenticate(&mut session, &secret) == AuthOutcome::Denied {
                    anyhow::bail!("Incorrect secret, access denied");
                }
                run_admin_command(&service, &session, command).await?;
            }

            Commands::Shell => {
                let service = LedgerService::from_config(&config).await?;
                shell::run_shell(service).await?;
            }
        }

        Ok(())
    }
}

async fn run_submit(service: &LedgerService, session: &mut Session, args: SubmitArgs) -> Result<()> {
    let amount_cents =
        parse_cents(&args.amount).context("Invalid amount format. Use '150.00' or '150'")?;

    let outcome = service
        .submit_record(Submission {
            student_name: args.student,
            operation_type: args.operation,
            course_name: args.course,
            amount_cents,
            remarks: args.remarks,
        })
        .await?;

    match outcome {
        SubmitOutcome::Created(id) => {
            println!("Recorded payment: {} ({})", format_cents(amount_cents), id);
        }
        SubmitOutcome::DuplicateFound(id) => {
            let existing = service.get_record(id).await?;
            session.pending_amendment = Some(id);
            println!(
                "A {} record for {} / {} already exists ({}, amount {}).",
                existing.operation_type,
                existing.student_name,
                existing.course_name,
                existing.id,
                format_cents(existing.amount_cents)
            );
            println!("Nothing was recorded. Use `amend {} --amount <new>` to change it.", id);
        }
    }

    Ok(())
}

async fn run_amend(service: &LedgerService, id: RecordId, amount: &str, remarks: &str) -> Result<()> {
    let amount_cents = parse_cents(amount).context("Invalid amount format. Use '150.00' or '150'")?;
    let record = service.amend_record(id, amount_cents, remarks).await?;
    println!(
        "Amended {}: amount {}",
        record.id,
        format_cents(record.amount_cents)
    );
    println!("  Remarks: {}", record.remarks);
    Ok(())
}

async fn run_query(service: &LedgerService, student: &str) -> Result<()> {
    let records = service.query_by_student_name(student).await?;
    if records.is_empty() {
        println!("No records found for {}.", student);
    } else {
        println!("Records for {}:", student);
        print_records(&records);
    }
    Ok(())
}

async fn run_admin_command(
    service: &LedgerService,
    session: &Session,
    cmd: AdminCommands,
) -> Result<()> {
    match cmd {
        AdminCommands::List => {
            let records = service.list_records(session).await?;
            if records.is_empty() {
                println!("No records found.");
            } else {
                print_records(&records);
                println!("\n{} record(s)", records.len());
            }
        }

        AdminCommands::Filter(args) => {
            let filter = build_filter(args.field, &args.value);
            let records = service.filter_records(session, &filter).await?;
            if records.is_empty() {
                println!("No records where {} = {}.", filter.field, filter.value);
            } else {
                println!("Records where {} = {}:", filter.field, filter.value);
                print_records(&records);
            }
        }

        AdminCommands::Values { field } => {
            let values = service.distinct_values(session, field).await?;
            if values.is_empty() {
                println!("No values recorded for {}.", field);
            }
            for value in values {
                println!("{}", value);
            }
        }

        AdminCommands::Delete { id } => {
            let id = parse_record_id(&id)?;
            let record = service.delete_record(session, id).await?;
            println!(
                "Deleted record: {} - {} ({})",
                record.student_name, record.course_name, record.id
            );
        }

        AdminCommands::Export(args) => run_export(service, session, args).await?,
    }

    Ok(())
}

async fn run_export(service: &LedgerService, session: &Session, args: ExportArgs) -> Result<()> {
    let filter = match (args.field, args.value.as_deref()) {
        (Some(field), Some(value)) => Some(build_filter(field, value)),
        _ => None,
    };

    match args.format {
        ExportFormat::Xlsx => {
            let export = service
                .export_spreadsheet(session, filter.as_ref(), args.output.as_deref())
                .await?;
            std::fs::write(&export.file_name, &export.bytes)
                .with_context(|| format!("Failed to write {}", export.file_name))?;
            println!("Exported to {}", export.file_name);
        }

        format => {
            let records = match &filter {
                Some(filter) => service.filter_records(session, filter).await?,
                None => service.list_records(session).await?,
            };

            match args.output {
                Some(name) => {
                    let file_name = export_file_name(&name, format)
                        .with_context(|| format!("Invalid file name: {:?}", name))?;
                    let file = std::fs::File::create(Path::new(&file_name))
                        .with_context(|| format!("Failed to create {}", file_name))?;
                    let count = write_tabular(format, &records, file)?;
                    println!("Exported {} record(s) to {}", count, file_name);
                }
                None => {
                    write_tabular(format, &records, std::io::stdout().lock())?;
                }
            }
        }
    }

    Ok(())
}

fn write_tabular<W: std::io::Write>(
    format: ExportFormat,
    records: &[PaymentRecord],
    writer: W,
) -> Result<usize> {
    match format {
        ExportFormat::Csv => write_records_csv(records, writer),
        ExportFormat::Json => write_records_json(records, writer),
        ExportFormat::Xlsx => anyhow::bail!("xlsx is written through the spreadsheet export"),
    }
}

/// Operation filters accept any spelling the parser understands and are
/// matched against the stored canonical name.
fn build_filter(field: RecordField, value: &str) -> RecordFilter {
    match field {
        RecordField::OperationType => match OperationType::parse(value) {
            Some(op) => RecordFilter::new(field, op.as_str()),
            None => RecordFilter::new(field, value),
        },
        _ => RecordFilter::new(field, value),
    }
}

/// Ask for the secret on stderr and read one line from stdin, so it never
/// appears in the process arguments.
fn prompt_secret() -> Result<String> {
    let mut stderr = std::io::stderr().lock();
    write!(stderr, "Admin secret: ")?;
    stderr.flush()?;
    read_secret_line(std::io::stdin().lock())
}

fn read_secret_line<R: BufRead>(mut reader: R) -> Result<String> {
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .context("Failed to read the admin secret")?;
    if read == 0 {
        anyhow::bail!("No admin secret supplied");
    }
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

fn parse_record_id(id: &str) -> Result<RecordId> {
    Uuid::parse_str(id.trim()).context("Invalid record ID format (expected UUID)")
}

fn print_records(records: &[PaymentRecord]) {
    println!(
        "{:<36}  {:<16} {:<20} {:<16} {:>10}  REMARKS",
        "ID", "STUDENT", "OPERATION", "COURSE", "AMOUNT"
    );
    println!("{}", "-".repeat(112));
    for record in records {
        println!(
            "{:<36}  {:<16} {:<20} {:<16} {:>10}  {}",
            record.id,
            truncate(&record.student_name, 16),
            record.operation_type,
            truncate(&record.course_name, 16),
            format_cents(record.amount_cents),
            record.remarks
        );
    }
}

fn print_record_detail(record: &PaymentRecord) {
    println!("Record: {}", record.id);
    println!("  Student:   {}", record.student_name);
    println!("  Operation: {}", record.operation_type);
    println!("  Course:    {}", record.course_name);
    println!("  Amount:    {}", format_cents(record.amount_cents));
    if !record.remarks.is_empty() {
        println!("  Remarks:   {}", record.remarks);
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
