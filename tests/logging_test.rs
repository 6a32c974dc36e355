mod common;

use anyhow::Result;
use common::{StandardRecords, TEST_SECRET, admin_session, test_service};
use std::io;
use std::sync::{Arc, Mutex};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::util::SubscriberInitExt;
use tuition_ledger::domain::{RecordField, RecordFilter, Session};

/// Collects formatted log lines in memory.
#[derive(Clone, Default)]
struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl CaptureWriter {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture_debug_logs() -> (CaptureWriter, tracing::subscriber::DefaultGuard) {
    let writer = CaptureWriter::default();
    let make_writer = writer.clone();
    let guard = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .with_ansi(false)
        .with_writer(move || make_writer.clone())
        .finish()
        .set_default();
    (writer, guard)
}

#[tokio::test]
async fn test_lookups_are_logged_at_debug() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ids = StandardRecords::create(&service).await?;
    let session = admin_session(&service);

    let (logs, _guard) = capture_debug_logs();

    service.get_record(ids[0]).await?;
    service.query_by_student_name("Zhang San").await?;
    service.list_records(&session).await?;
    service
        .filter_records(&session, &RecordFilter::new(RecordField::CourseName, "Piano"))
        .await?;
    service
        .distinct_values(&session, RecordField::StudentName)
        .await?;

    let text = logs.contents();
    assert!(text.contains("record lookup"), "logs: {}", text);
    assert!(text.contains("found=true"));
    assert!(text.contains("student query"));
    assert!(text.contains("student=\"Zhang San\"") || text.contains("student=Zhang San"));
    assert!(text.contains("records listed"));
    assert!(text.contains("records filtered"));
    assert!(text.contains("distinct values listed"));
    assert!(text.contains("DEBUG"));
    Ok(())
}

#[tokio::test]
async fn test_secret_never_reaches_logs() -> Result<()> {
    let (mut service, _temp) = test_service().await?;
    let (logs, _guard) = capture_debug_logs();

    let mut session = Session::new();
    service.authenticate(&mut session, "wrong-guess");
    service.authenticate(&mut session, TEST_SECRET);
    service.change_secret(TEST_SECRET, "n3xt-secret", "n3xt-secret")?;

    let text = logs.contents();
    assert!(text.contains("administrative authentication denied"));
    assert!(text.contains("administrative session authenticated"));
    assert!(!text.contains(TEST_SECRET));
    assert!(!text.contains("wrong-guess"));
    assert!(!text.contains("n3xt-secret"));
    Ok(())
}
