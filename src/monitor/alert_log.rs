//! Append-only trigger alert log.

use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::trigger::TriggerAlert;
use crate::error::Result;

/// Line that ends each record.
const RECORD_DELIMITER: &str = "---";

/// Text file receiving one record per alert.
///
/// Appends are serialized so concurrent alerts never interleave.
#[derive(Debug)]
pub struct AlertLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl AlertLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, alert: &TriggerAlert) -> Result<()> {
        let entry = alert.format_log_entry();
        let _lock = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(entry.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// The last `limit` records, oldest first. A missing file has no records.
    pub async fn read_recent(path: &Path, limit: usize) -> Result<Vec<String>> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records: Vec<String> = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        for line in content.lines() {
            if line == RECORD_DELIMITER {
                push_record(&mut records, &current);
                current.clear();
            } else {
                current.push(line);
            }
        }
        push_record(&mut records, &current);
        let skip = records.len().saturating_sub(limit);
        Ok(records.into_iter().skip(skip).collect())
    }
}

fn push_record(records: &mut Vec<String>, lines: &[&str]) {
    let record = lines.join("\n");
    let record = record.trim();
    if !record.is_empty() {
        records.push(record.to_string());
    }
}
