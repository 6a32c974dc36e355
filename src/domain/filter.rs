use serde::{Deserialize, Serialize};

use super::PaymentRecord;

/// Fields the administrative view can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    OperationType,
    CourseName,
    StudentName,
}

impl RecordField {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordField::OperationType => "operation",
            RecordField::CourseName => "course",
            RecordField::StudentName => "student",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "operation" | "operation_type" | "operationtype" | "type" => {
                Some(RecordField::OperationType)
            }
            "course" | "course_name" | "coursename" => Some(RecordField::CourseName),
            "student" | "student_name" | "studentname" | "name" => Some(RecordField::StudentName),
            _ => None,
        }
    }

    /// Column backing this field in the `records` table.
    pub fn column(&self) -> &'static str {
        match self {
            RecordField::OperationType => "operation",
            RecordField::CourseName => "item",
            RecordField::StudentName => "name",
        }
    }

    /// The field's value on a record, as it is compared and displayed.
    pub fn value_of<'a>(&self, record: &'a PaymentRecord) -> &'a str {
        match self {
            RecordField::OperationType => record.operation_type.as_str(),
            RecordField::CourseName => &record.course_name,
            RecordField::StudentName => &record.student_name,
        }
    }
}

impl std::fmt::Display for RecordField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
            .ok_or_else(|| format!("unknown field '{}' (expected operation, course or student)", s))
    }
}

/// Exact-match filter on a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFilter {
    pub field: RecordField,
    pub value: String,
}

impl RecordFilter {
    pub fn new(field: RecordField, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }

    pub fn matches(&self, record: &PaymentRecord) -> bool {
        self.field.value_of(record) == self.value
    }
}
