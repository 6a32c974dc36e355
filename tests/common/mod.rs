// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use tempfile::TempDir;
use tuition_ledger::application::{AuthOutcome, LedgerService, SubmitOutcome, Submission};
use tuition_ledger::config::AdminSecret;
use tuition_ledger::domain::{Cents, OperationType, RecordId, Session};

pub const TEST_SECRET: &str = "s3cret";

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap(), AdminSecret::new(TEST_SECRET)?).await?;
    Ok((service, temp_dir))
}

pub fn submission(
    student: &str,
    operation: OperationType,
    course: &str,
    amount_cents: Cents,
    remarks: &str,
) -> Submission {
    Submission {
        student_name: student.to_string(),
        operation_type: operation,
        course_name: course.to_string(),
        amount_cents,
        remarks: remarks.to_string(),
    }
}

/// Submit a record that is expected to be new and return its id.
pub async fn create(
    service: &LedgerService,
    student: &str,
    operation: OperationType,
    course: &str,
    amount_cents: Cents,
) -> Result<RecordId> {
    match service
        .submit_record(submission(student, operation, course, amount_cents, ""))
        .await?
    {
        SubmitOutcome::Created(id) => Ok(id),
        SubmitOutcome::DuplicateFound(id) => anyhow::bail!("unexpected duplicate {}", id),
    }
}

/// A session that has passed the admin gate.
pub fn admin_session(service: &LedgerService) -> Session {
    let mut session = Session::new();
    assert_eq!(
        service.authenticate(&mut session, TEST_SECRET),
        AuthOutcome::Authenticated
    );
    session
}

/// Test fixture: a small ledger spanning every operation type
pub struct StandardRecords;

impl StandardRecords {
    /// Li Wei: initial + supplemental for Math, Zhang San: initial Piano + refund Piano,
    /// Chen Jing: initial Math.
    pub async fn create(service: &LedgerService) -> Result<Vec<RecordId>> {
        Ok(vec![
            create(service, "Li Wei", OperationType::InitialPayment, "Math", 120000).await?,
            create(service, "Li Wei", OperationType::SupplementalPayment, "Math", 30000).await?,
            create(service, "Zhang San", OperationType::InitialPayment, "Piano", 200000).await?,
            create(service, "Zhang San", OperationType::Refund, "Piano", 50000).await?,
            create(service, "Chen Jing", OperationType::InitialPayment, "Math", 120000).await?,
        ])
    }
}
