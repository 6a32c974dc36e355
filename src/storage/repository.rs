use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::{NaturalKey, OperationType, PaymentRecord, RecordField, RecordId};

use super::MIGRATION_001_INITIAL;

const RECORD_COLUMNS: &str = "id, name, operation, item, amount, remarks";

/// Repository for persisting and querying payment records.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations. Safe to run more than once.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Insert a new record.
    pub async fn insert_record(&self, record: &PaymentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO records (id, name, operation, item, amount, remarks)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.student_name)
        .bind(record.operation_type.as_str())
        .bind(&record.course_name)
        .bind(record.amount_cents)
        .bind(&record.remarks)
        .execute(&self.pool)
        .await
        .context("Failed to insert record")?;
        Ok(())
    }

    /// Overwrite every column of an existing record in one statement.
    /// Returns false when no row has the record's id.
    pub async fn replace_record(&self, record: &PaymentRecord) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE records
            SET name = ?, operation = ?, item = ?, amount = ?, remarks = ?
            WHERE id = ?
            "#,
        )
        .bind(&record.student_name)
        .bind(record.operation_type.as_str())
        .bind(&record.course_name)
        .bind(record.amount_cents)
        .bind(&record.remarks)
        .bind(record.id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to update record")?;

        Ok(result.rows_affected() > 0)
    }

    /// Get a record by ID.
    pub async fn get_record(&self, id: RecordId) -> Result<Option<PaymentRecord>> {
        let query = format!("SELECT {} FROM records WHERE id = ?", RECORD_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch record")?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    /// Look up the record holding a natural key, if any.
    pub async fn find_by_natural_key(&self, key: &NaturalKey) -> Result<Option<PaymentRecord>> {
        let query = format!(
            "SELECT {} FROM records WHERE name = ? AND item = ? AND operation = ?",
            RECORD_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(&key.student_name)
            .bind(&key.course_name)
            .bind(key.operation_type.as_str())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to look up record by natural key")?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    /// List all records in insertion order.
    pub async fn list_records(&self) -> Result<Vec<PaymentRecord>> {
        let query = format!("SELECT {} FROM records ORDER BY rowid", RECORD_COLUMNS);
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list records")?;

        rows.iter().map(Self::row_to_record).collect()
    }

    /// List records whose field exactly equals `value`, in insertion order.
    pub async fn list_records_where(
        &self,
        field: RecordField,
        value: &str,
    ) -> Result<Vec<PaymentRecord>> {
        let query = format!(
            "SELECT {} FROM records WHERE {} = ? ORDER BY rowid",
            RECORD_COLUMNS,
            field.column()
        );
        let rows = sqlx::query(&query)
            .bind(value)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to filter records by {}", field))?;

        rows.iter().map(Self::row_to_record).collect()
    }

    /// Distinct values of a field, in order of first appearance.
    pub async fn distinct_values(&self, field: RecordField) -> Result<Vec<String>> {
        let column = field.column();
        let query = format!(
            "SELECT {column} AS value FROM records GROUP BY {column} ORDER BY MIN(rowid)"
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to list distinct values of {}", field))?;

        Ok(rows.iter().map(|row| row.get("value")).collect())
    }

    /// Delete a record. Returns false when nothing was deleted.
    pub async fn delete_record(&self, id: RecordId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM records WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete record")?;

        Ok(result.rows_affected() > 0)
    }

    /// Count all records.
    pub async fn count_records(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM records")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count records")?;
        Ok(row.get("count"))
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<PaymentRecord> {
        let id_str: String = row.get("id");
        let operation_str: String = row.get("operation");

        Ok(PaymentRecord {
            id: Uuid::parse_str(&id_str).context("Invalid record ID")?,
            student_name: row.get("name"),
            operation_type: OperationType::parse(&operation_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid operation type: {}", operation_str))?,
            course_name: row.get("item"),
            amount_cents: row.get("amount"),
            remarks: row.get("remarks"),
        })
    }
}
