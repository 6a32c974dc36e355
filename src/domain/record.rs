use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type RecordId = Uuid;

/// Separator placed between an existing remark and an amendment note.
pub const REMARKS_SEPARATOR: &str = " | ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// First tuition payment for a course
    InitialPayment,
    /// Top-up on a course already paid for
    SupplementalPayment,
    /// Money returned to the student
    Refund,
}

impl OperationType {
    pub const ALL: [OperationType; 3] = [
        OperationType::InitialPayment,
        OperationType::SupplementalPayment,
        OperationType::Refund,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::InitialPayment => "InitialPayment",
            OperationType::SupplementalPayment => "SupplementalPayment",
            OperationType::Refund => "Refund",
        }
    }

    /// Parse an operation type, ignoring case and `-`/`_` separators, so
    /// "Refund", "refund", "initial-payment" and "INITIAL_PAYMENT" all work.
    pub fn parse(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_' && !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "initialpayment" | "initial" => Some(OperationType::InitialPayment),
            "supplementalpayment" | "supplemental" => Some(OperationType::SupplementalPayment),
            "refund" => Some(OperationType::Refund),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            format!(
                "unknown operation type '{}' (expected InitialPayment, SupplementalPayment or Refund)",
                s
            )
        })
    }
}

/// The triple used to detect duplicate submissions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub student_name: String,
    pub course_name: String,
    pub operation_type: OperationType,
}

/// One tuition payment event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: RecordId,
    pub student_name: String,
    pub operation_type: OperationType,
    pub course_name: String,
    pub amount_cents: Cents,
    pub remarks: String,
}

impl PaymentRecord {
    /// Create a record with a fresh identifier. Validation happens in the
    /// service before this is called.
    pub fn new(
        student_name: String,
        operation_type: OperationType,
        course_name: String,
        amount_cents: Cents,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_name,
            operation_type,
            course_name,
            amount_cents,
            remarks: String::new(),
        }
    }

    pub fn with_remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = remarks.into();
        self
    }

    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            student_name: self.student_name.clone(),
            course_name: self.course_name.clone(),
            operation_type: self.operation_type,
        }
    }

    /// Replace the amount and append a timestamped note to the remarks.
    pub fn amend(&mut self, new_amount_cents: Cents, additional_remarks: &str, at: DateTime<Utc>) {
        let note = amendment_note(additional_remarks, at);
        if self.remarks.is_empty() {
            self.remarks = note;
        } else {
            self.remarks.push_str(REMARKS_SEPARATOR);
            self.remarks.push_str(&note);
        }
        self.amount_cents = new_amount_cents;
    }
}

/// Build the note recorded for an amendment, e.g.
/// `amended 2024-09-01T10:00:00Z, late fee waived`.
pub fn amendment_note(additional_remarks: &str, at: DateTime<Utc>) -> String {
    format!(
        "amended {}, {}",
        at.to_rfc3339_opts(SecondsFormat::Secs, true),
        additional_remarks
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 1, 10, 0, 0).unwrap()
    }

    fn record() -> PaymentRecord {
        PaymentRecord::new(
            "Li Wei".into(),
            OperationType::InitialPayment,
            "Math".into(),
            12000,
        )
    }

    #[test]
    fn test_operation_type_parse() {
        for op in OperationType::ALL {
            assert_eq!(OperationType::parse(op.as_str()), Some(op));
        }
        assert_eq!(OperationType::parse("refund"), Some(OperationType::Refund));
        assert_eq!(
            OperationType::parse("supplemental-payment"),
            Some(OperationType::SupplementalPayment)
        );
        assert_eq!(
            OperationType::parse("INITIAL_PAYMENT"),
            Some(OperationType::InitialPayment)
        );
        assert_eq!(OperationType::parse("chargeback"), None);
    }

    #[test]
    fn test_amend_appends_to_existing_remarks() {
        let mut rec = record().with_remarks("first payment");
        rec.amend(15000, "late fee waived", at());

        assert_eq!(rec.amount_cents, 15000);
        assert_eq!(
            rec.remarks,
            "first payment | amended 2024-09-01T10:00:00Z, late fee waived"
        );
    }

    #[test]
    fn test_amend_on_empty_remarks_has_no_separator() {
        let mut rec = record();
        rec.amend(9000, "corrected", at());

        assert_eq!(rec.remarks, "amended 2024-09-01T10:00:00Z, corrected");
    }

    #[test]
    fn test_repeated_amendments_accumulate() {
        let mut rec = record();
        rec.amend(9000, "one", at());
        rec.amend(8000, "two", at());

        assert_eq!(rec.amount_cents, 8000);
        assert_eq!(rec.remarks.matches(REMARKS_SEPARATOR).count(), 1);
        assert!(rec.remarks.ends_with(", two"));
    }

    #[test]
    fn test_amend_keeps_identity() {
        let mut rec = record();
        let id = rec.id;
        let key = rec.natural_key();
        rec.amend(1, "x", at());
        assert_eq!(rec.id, id);
        assert_eq!(rec.natural_key(), key);
    }
}
