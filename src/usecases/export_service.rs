//! Exports, deletion logs and "delete from file".
//!
//! Everything lands in `<data_dir>/output` with a timestamp in the name, so
//! repeated exports never overwrite each other.

use crate::adapters::export::{ExportFormat, records_to_csv, records_to_json};
use crate::domain::{ChatRecord, DomainError, ExportCategory};
use crate::usecases::bulk_delete::BatchReport;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Written after every bulk delete started from the CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeletionLog {
    pub timestamp: String,
    /// Category name or the file the ids came from.
    pub source: String,
    pub total_requested: usize,
    pub committed: usize,
    pub failed: usize,
    pub rolled_back: usize,
    pub errors: Vec<String>,
}

impl DeletionLog {
    pub fn from_report(source: &str, total_requested: usize, report: &BatchReport) -> Self {
        Self {
            timestamp: Local::now().to_rfc3339(),
            source: source.to_string(),
            total_requested,
            committed: report.committed,
            failed: report.failed,
            rolled_back: report.rolled_back,
            errors: report.errors(),
        }
    }
}

pub struct ExportService {
    output_dir: PathBuf,
}

impl ExportService {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Render records in the given format.
    pub fn render(records: &[ChatRecord], format: ExportFormat) -> Result<String, DomainError> {
        match format {
            ExportFormat::Json => {
                records_to_json(records).map_err(|e| DomainError::Export(e.to_string()))
            }
            ExportFormat::Csv => records_to_csv(records)
                .map_err(|e| DomainError::Export(format!("Failed to generate CSV: {}", e))),
        }
    }

    /// File name used for an export: `<category>_<YYYYmmdd_HHMMSS>.<ext>`.
    pub fn file_name(category: ExportCategory, format: ExportFormat) -> String {
        format!("{}_{}.{}", category, timestamp(), format.extension())
    }

    /// Write records to a new file and return its path.
    pub async fn export(
        &self,
        category: ExportCategory,
        records: &[ChatRecord],
        format: ExportFormat,
    ) -> Result<PathBuf, DomainError> {
        let body = Self::render(records, format)?;
        let path = self.output_dir.join(Self::file_name(category, format));
        self.write(&path, body).await?;
        info!(path = %path.display(), count = records.len(), %category, "exported");
        Ok(path)
    }

    pub async fn write_deletion_log(&self, log: &DeletionLog) -> Result<PathBuf, DomainError> {
        let json = serde_json::to_string_pretty(log).map_err(|e| DomainError::Export(e.to_string()))?;
        let path = self
            .output_dir
            .join(format!("deletion_log_{}.json", timestamp()));
        self.write(&path, json).await?;
        info!(path = %path.display(), committed = log.committed, failed = log.failed, "deletion log written");
        Ok(path)
    }

    async fn write(&self, path: &Path, body: String) -> Result<(), DomainError> {
        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| DomainError::Storage(format!("Failed to create output dir: {}", e)))?;
        fs::write(path, body)
            .await
            .map_err(|e| DomainError::Storage(format!("Failed to write {}: {}", path.display(), e)))
    }
}

/// Read chat ids back from an exported JSON file. Accepts an array of records
/// (anything with an `id`) or a bare array of ids.
pub async fn read_id_list(path: impl AsRef<Path>) -> Result<Vec<i64>, DomainError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .await
        .map_err(|e| DomainError::Storage(format!("Failed to read {}: {}", path.display(), e)))?;
    parse_id_list(&text)
}

fn parse_id_list(text: &str) -> Result<Vec<i64>, DomainError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| DomainError::InvalidRequest(format!("not JSON: {}", e)))?;
    let items = value
        .as_array()
        .ok_or_else(|| DomainError::InvalidRequest("expected a JSON array".into()))?;

    let mut ids = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let id = item
            .as_i64()
            .or_else(|| item.get("id").and_then(serde_json::Value::as_i64))
            .ok_or_else(|| DomainError::InvalidRequest(format!("entry {} has no numeric id", i)))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

fn timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, SpamBucket};
    use crate::usecases::bulk_delete::{DeleteOutcome, ItemOutcome};

    fn record(id: i64) -> ChatRecord {
        ChatRecord {
            id,
            chat_type: "channel".into(),
            title: format!("c{}", id),
            username: Some(format!("c{}", id)),
            members: Some(10),
            is_deleted: false,
            is_bot: false,
            is_scam: false,
            is_fake: false,
            is_verified: true,
        }
    }

    #[test]
    fn file_name_has_category_and_extension() {
        let name = ExportService::file_name(ExportCategory::Analysis(SpamBucket::NoMessages), ExportFormat::Csv);
        assert!(name.starts_with("no_messages_"));
        assert!(name.ends_with(".csv"));
        // no_messages_YYYYmmdd_HHMMSS.csv
        assert_eq!(name.len(), "no_messages_".len() + 15 + 4);
    }

    #[tokio::test]
    async fn export_then_read_ids_back() {
        let dir = tempfile::tempdir().unwrap();
        let svc = ExportService::new(dir.path().join("output"));
        let path = svc
            .export(
                ExportCategory::Category(Category::Channels),
                &[record(-100), record(-200)],
                ExportFormat::Json,
            )
            .await
            .unwrap();
        assert!(path.starts_with(dir.path().join("output")));
        assert_eq!(read_id_list(&path).await.unwrap(), vec![-100, -200]);
    }

    #[tokio::test]
    async fn csv_export_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let svc = ExportService::new(dir.path());
        let path = svc
            .export(ExportCategory::Groups, &[record(1)], ExportFormat::Csv)
            .await
            .unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.starts_with("id,type,title,username,members"));
        assert_eq!(text.lines().count(), 2);
    }

    #[tokio::test]
    async fn deletion_log_shape() {
        let dir = tempfile::tempdir().unwrap();
        let svc = ExportService::new(dir.path());
        let report = BatchReport {
            batch_id: 1,
            committed: 1,
            failed: 1,
            rolled_back: 0,
            items: vec![
                ItemOutcome {
                    id: 1,
                    title: "a".into(),
                    outcome: DeleteOutcome::Committed,
                },
                ItemOutcome {
                    id: 2,
                    title: "b".into(),
                    outcome: DeleteOutcome::DeleteFailed {
                        reason: "CHAT_ADMIN_REQUIRED".into(),
                    },
                },
            ],
        };
        let log = DeletionLog::from_report("spam", 2, &report);
        let path = svc.write_deletion_log(&log).await.unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("deletion_log_"));

        let back: DeletionLog = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, log);
        assert_eq!(back.errors, vec!["'b': CHAT_ADMIN_REQUIRED".to_string()]);
    }

    #[test]
    fn id_list_accepts_bare_ids_and_dedups() {
        assert_eq!(parse_id_list("[1, 2, 2, -3]").unwrap(), vec![1, 2, -3]);
        assert!(matches!(parse_id_list("{}"), Err(DomainError::InvalidRequest(_))));
        assert!(matches!(parse_id_list("[{\"title\": \"x\"}]"), Err(DomainError::InvalidRequest(_))));
    }
}
