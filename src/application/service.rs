use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::{AdminSecret, LedgerConfig};
use crate::domain::{
    Cents, NaturalKey, OperationType, PaymentRecord, RecordField, RecordFilter, RecordId, Session,
};
use crate::io::{
    ExportFormat, SpreadsheetExport, default_export_name, export_file_name, records_to_xlsx,
};
use crate::storage::Repository;

use super::{AppError, AuthOutcome, SecretGate};

/// Application service holding every record rule: creation, duplicate
/// routing, amendment, the admin gate, filtering and export.
/// This is the only interface front ends (CLI, shell, HTTP) should use.
pub struct LedgerService {
    repo: Repository,
    gate: SecretGate,
}

/// A payment as entered on the submission form.
#[derive(Debug, Clone)]
pub struct Submission {
    pub student_name: String,
    pub operation_type: OperationType,
    pub course_name: String,
    pub amount_cents: Cents,
    pub remarks: String,
}

/// Result of a submission. A duplicate is a routing signal, not an error:
/// the caller should offer the amendment flow for the existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created(RecordId),
    DuplicateFound(RecordId),
}

impl LedgerService {
    /// Create a new ledger service with the given repository and secret.
    pub fn new(repo: Repository, secret: AdminSecret) -> Self {
        Self {
            repo,
            gate: SecretGate::new(secret),
        }
    }

    /// Initialize (or upgrade) the database at the given path.
    pub async fn init(database_path: &str, secret: AdminSecret) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo, secret))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str, secret: AdminSecret) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo, secret))
    }

    /// Connect using a loaded configuration.
    pub async fn from_config(config: &LedgerConfig) -> Result<Self, AppError> {
        Self::connect(&config.database_path, config.admin_secret.clone()).await
    }

    // ========================
    // Submission and amendment
    // ========================

    /// Record a payment unless one with the same student, course and
    /// operation already exists.
    pub async fn submit_record(&self, submission: Submission) -> Result<SubmitOutcome, AppError> {
        let student_name = submission.student_name.trim().to_string();
        let course_name = submission.course_name.trim().to_string();

        if student_name.is_empty() {
            return Err(AppError::EmptyField("Student name"));
        }
        if course_name.is_empty() {
            return Err(AppError::EmptyField("Course name"));
        }
        if submission.amount_cents <= 0 {
            return Err(AppError::InvalidAmount(
                "Amount must be greater than zero".to_string(),
            ));
        }

        let key = NaturalKey {
            student_name,
            course_name,
            operation_type: submission.operation_type,
        };

        if let Some(existing) = self.repo.find_by_natural_key(&key).await? {
            debug!(record_id = %existing.id, "duplicate submission routed to amendment");
            return Ok(SubmitOutcome::DuplicateFound(existing.id));
        }

        let record = PaymentRecord::new(
            key.student_name,
            key.operation_type,
            key.course_name,
            submission.amount_cents,
        )
        .with_remarks(submission.remarks);

        self.repo.insert_record(&record).await?;
        info!(
            record_id = %record.id,
            operation = %record.operation_type,
            "payment record created"
        );

        Ok(SubmitOutcome::Created(record.id))
    }

    /// Get a single record.
    pub async fn get_record(&self, id: RecordId) -> Result<PaymentRecord, AppError> {
        let record = self.repo.get_record(id).await?;
        debug!(record_id = %id, found = record.is_some(), "record lookup");
        record.ok_or(AppError::RecordNotFound(id))
    }

    /// Replace a record's amount and append a timestamped note to its remarks.
    pub async fn amend_record(
        &self,
        id: RecordId,
        new_amount_cents: Cents,
        additional_remarks: &str,
    ) -> Result<PaymentRecord, AppError> {
        self.amend_record_at(id, new_amount_cents, additional_remarks, Utc::now())
            .await
    }

    /// Amend a record, stamping the note with the given time.
    pub async fn amend_record_at(
        &self,
        id: RecordId,
        new_amount_cents: Cents,
        additional_remarks: &str,
        at: DateTime<Utc>,
    ) -> Result<PaymentRecord, AppError> {
        if new_amount_cents < 0 {
            return Err(AppError::InvalidAmount(
                "Amount must not be negative".to_string(),
            ));
        }

        let mut record = self.get_record(id).await?;
        record.amend(new_amount_cents, additional_remarks, at);

        if !self.repo.replace_record(&record).await? {
            return Err(AppError::RecordNotFound(id));
        }
        info!(record_id = %id, "payment record amended");

        Ok(record)
    }

    // ========================
    // Public queries
    // ========================

    /// All records for a student. An unknown name yields an empty list.
    pub async fn query_by_student_name(&self, name: &str) -> Result<Vec<PaymentRecord>, AppError> {
        let records = self
            .repo
            .list_records_where(RecordField::StudentName, name)
            .await?;
        debug!(student = name, rows = records.len(), "student query");
        Ok(records)
    }

    // ========================
    // Authentication
    // ========================

    pub fn authenticate(&self, session: &mut Session, supplied: &str) -> AuthOutcome {
        self.gate.authenticate(session, supplied)
    }

    /// Change the administrative secret for the rest of this process.
    pub fn change_secret(&mut self, old: &str, new: &str, confirm: &str) -> Result<(), AppError> {
        self.gate.change(old, new, confirm)
    }

    // ========================
    // Administrative view
    // ========================

    fn require_admin(session: &Session) -> Result<(), AppError> {
        if session.is_authenticated() {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    /// List every record.
    pub async fn list_records(&self, session: &Session) -> Result<Vec<PaymentRecord>, AppError> {
        Self::require_admin(session)?;
        let records = self.repo.list_records().await?;
        debug!(rows = records.len(), "records listed");
        Ok(records)
    }

    /// Records whose field exactly equals the filter value.
    pub async fn filter_records(
        &self,
        session: &Session,
        filter: &RecordFilter,
    ) -> Result<Vec<PaymentRecord>, AppError> {
        Self::require_admin(session)?;
        let records = self
            .repo
            .list_records_where(filter.field, &filter.value)
            .await?;
        debug!(
            field = %filter.field,
            value = %filter.value,
            rows = records.len(),
            "records filtered"
        );
        Ok(records)
    }

    /// Distinct values present for a field, for offering filter choices.
    pub async fn distinct_values(
        &self,
        session: &Session,
        field: RecordField,
    ) -> Result<Vec<String>, AppError> {
        Self::require_admin(session)?;
        let values = self.repo.distinct_values(field).await?;
        debug!(field = %field, count = values.len(), "distinct values listed");
        Ok(values)
    }

    /// Permanently delete a record, returning what was removed.
    pub async fn delete_record(
        &self,
        session: &Session,
        id: RecordId,
    ) -> Result<PaymentRecord, AppError> {
        Self::require_admin(session)?;
        let record = self.get_record(id).await?;

        if !self.repo.delete_record(id).await? {
            return Err(AppError::RecordNotFound(id));
        }
        info!(record_id = %id, "payment record deleted");

        Ok(record)
    }

    /// Build a spreadsheet of all records, or of the filtered subset.
    ///
    /// `file_name` defaults to `records_<YYYYMMDD_HHMM>`; `.xlsx` is appended
    /// when missing.
    pub async fn export_spreadsheet(
        &self,
        session: &Session,
        filter: Option<&RecordFilter>,
        file_name: Option<&str>,
    ) -> Result<SpreadsheetExport, AppError> {
        Self::require_admin(session)?;

        let requested = file_name
            .map(str::to_string)
            .unwrap_or_else(|| default_export_name(Utc::now()));
        let file_name = export_file_name(&requested, ExportFormat::Xlsx)
            .ok_or_else(|| AppError::InvalidFileName(requested.clone()))?;

        let records = match filter {
            Some(filter) => self.filter_records(session, filter).await?,
            None => self.list_records(session).await?,
        };

        let bytes = records_to_xlsx(&records).map_err(|e| AppError::Export(format!("{:#}", e)))?;
        info!(rows = records.len(), file = %file_name, "spreadsheet exported");

        Ok(SpreadsheetExport { file_name, bytes })
    }

    /// Number of stored records.
    pub async fn record_count(&self) -> Result<i64, AppError> {
        Ok(self.repo.count_records().await?)
    }
}
