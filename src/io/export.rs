use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::borrow::Cow;
use std::io::Write;
use tracing::warn;
use xlsxwriter::Workbook;

use crate::domain::{PaymentRecord, cents_to_units, format_cents};

/// Column headers, in export order.
pub const EXPORT_HEADERS: [&str; 5] = [
    "Student Name",
    "Operation Type",
    "Course Name",
    "Amount",
    "Remarks",
];

pub const SHEET_NAME: &str = "Payment Records";

/// Longest text a spreadsheet cell can hold, in characters.
pub const MAX_CELL_CHARS: usize = 32_767;

pub const XLSX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Xlsx,
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "xlsx" | "excel" => Some(ExportFormat::Xlsx),
            "csv" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown export format '{}' (xlsx, csv, json)", s))
    }
}

/// A finished spreadsheet ready to be handed to the user.
#[derive(Debug, Clone)]
pub struct SpreadsheetExport {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Default export name for a given moment, e.g. `records_20240901_1000`.
pub fn default_export_name(now: DateTime<Utc>) -> String {
    format!("records_{}", now.format("%Y%m%d_%H%M"))
}

/// Normalize a caller-chosen file name: trimmed, non-empty, no path
/// separators, and ending in the format's extension.
pub fn export_file_name(name: &str, format: ExportFormat) -> Option<String> {
    let name = name.trim();
    if name.is_empty() || name.contains(['/', '\\']) {
        return None;
    }

    let suffix = format!(".{}", format.extension());
    if name.to_lowercase().ends_with(&suffix) {
        if name.len() == suffix.len() {
            return None;
        }
        Some(name.to_string())
    } else {
        Some(format!("{}{}", name, suffix))
    }
}

/// Serialize records into an xlsx document: a header row, then one row per
/// record in `(student, operation, course, amount, remarks)` order.
///
/// Text cells go through [`cell_text`], so an oversized remark is cut short
/// instead of failing the whole export.
///
/// Side effect: the writer only targets files, so the document is built in a
/// private temporary directory that is removed before returning. Nothing else
/// on disk is touched and the records are not modified.
pub fn records_to_xlsx(records: &[PaymentRecord]) -> Result<Vec<u8>> {
    let dir = tempfile::tempdir().context("Failed to create temporary directory")?;
    let path = dir.path().join("export.xlsx");
    let path_str = path
        .to_str()
        .context("Temporary export path is not valid UTF-8")?;

    let workbook =
        Workbook::new(path_str).map_err(|e| anyhow::anyhow!("Failed to create workbook: {}", e))?;

    {
        let mut sheet = workbook
            .add_worksheet(Some(SHEET_NAME))
            .map_err(|e| anyhow::anyhow!("Failed to add worksheet: {}", e))?;

        for (col, header) in EXPORT_HEADERS.iter().enumerate() {
            sheet
                .write_string(0, col as u16, header, None)
                .map_err(|e| anyhow::anyhow!("Failed to write header: {}", e))?;
        }

        for (idx, record) in records.iter().enumerate() {
            let row = (idx + 1) as u32;

            sheet
                .write_string(row, 0, &cell_text(&record.student_name), None)
                .map_err(|e| cell_error(row, record, e))?;
            sheet
                .write_string(row, 1, record.operation_type.as_str(), None)
                .map_err(|e| cell_error(row, record, e))?;
            sheet
                .write_string(row, 2, &cell_text(&record.course_name), None)
                .map_err(|e| cell_error(row, record, e))?;
            sheet
                .write_number(row, 3, cents_to_units(record.amount_cents), None)
                .map_err(|e| cell_error(row, record, e))?;
            sheet
                .write_string(row, 4, &cell_text(&record.remarks), None)
                .map_err(|e| cell_error(row, record, e))?;
        }
    }

    workbook
        .close()
        .map_err(|e| anyhow::anyhow!("Failed to finish workbook: {}", e))?;

    std::fs::read(&path).context("Failed to read back exported workbook")
}

/// Make text safe for a spreadsheet cell: NUL characters are dropped and
/// anything past [`MAX_CELL_CHARS`] is truncated.
pub fn cell_text(text: &str) -> Cow<'_, str> {
    let without_nul: Cow<'_, str> = if text.contains('\0') {
        Cow::Owned(text.replace('\0', ""))
    } else {
        Cow::Borrowed(text)
    };

    match without_nul.char_indices().nth(MAX_CELL_CHARS) {
        Some((cut, _)) => {
            warn!(
                chars = without_nul.chars().count(),
                "cell text truncated to {} characters", MAX_CELL_CHARS
            );
            Cow::Owned(without_nul[..cut].to_string())
        }
        None => without_nul,
    }
}

fn cell_error(row: u32, record: &PaymentRecord, e: impl std::fmt::Display) -> anyhow::Error {
    anyhow::anyhow!("Failed to write row {} ({}): {}", row, record.id, e)
}

/// Write records as CSV with the same columns as the spreadsheet.
pub fn write_records_csv<W: Write>(records: &[PaymentRecord], writer: W) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(EXPORT_HEADERS)?;

    for record in records {
        csv_writer.write_record([
            record.student_name.as_str(),
            record.operation_type.as_str(),
            record.course_name.as_str(),
            format_cents(record.amount_cents).as_str(),
            record.remarks.as_str(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(records.len())
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    id: String,
    student_name: &'a str,
    operation_type: &'a str,
    course_name: &'a str,
    amount: String,
    remarks: &'a str,
}

/// Write records as a pretty-printed JSON array.
pub fn write_records_json<W: Write>(records: &[PaymentRecord], mut writer: W) -> Result<usize> {
    let rows: Vec<JsonRecord<'_>> = records
        .iter()
        .map(|r| JsonRecord {
            id: r.id.to_string(),
            student_name: &r.student_name,
            operation_type: r.operation_type.as_str(),
            course_name: &r.course_name,
            amount: format_cents(r.amount_cents),
            remarks: &r.remarks,
        })
        .collect();

    serde_json::to_writer_pretty(&mut writer, &rows)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(rows.len())
}
