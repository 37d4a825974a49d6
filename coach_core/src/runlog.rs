//! Execution journal for automation runs.
//!
//! Every run outcome is appended to a JSONL file with file locking, then
//! periodically rolled up into a CSV archive for long-term inspection.

use crate::Result;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

pub const RUN_LOG_FILE: &str = "automation-runs.jsonl";
pub const RUN_ARCHIVE_FILE: &str = "automation-runs.csv";

/// One automation run outcome.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExecutionRecord {
    pub automation_id: String,
    pub automation_name: String,
    pub ran_at: DateTime<Utc>,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    /// Actions the run attempted
    pub action_count: usize,
}

/// Journal sink trait for persisting run records
pub trait RunSink {
    fn append(&mut self, record: &ExecutionRecord) -> Result<()>;
}

/// JSONL-based run journal with file locking
pub struct JsonlRunLog {
    path: PathBuf,
}

impl JsonlRunLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Journal path inside a data directory.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(RUN_LOG_FILE))
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl RunSink for JsonlRunLog {
    fn append(&mut self, record: &ExecutionRecord) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(record)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        file.unlock()?;

        tracing::debug!(
            "Journaled run of automation {} (success={})",
            record.automation_id,
            record.success
        );
        Ok(())
    }
}

/// Read all run records from a journal file.
///
/// Unparsable lines are skipped with a warning rather than failing the
/// whole read.
pub fn read_records(path: &Path) -> Result<Vec<ExecutionRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<ExecutionRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Failed to parse run record at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} run records from journal", records.len());
    Ok(records)
}

/// A row in the CSV archive
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    automation_id: String,
    automation_name: String,
    ran_at: String,
    success: bool,
    error: Option<String>,
    action_count: usize,
}

impl From<&ExecutionRecord> for CsvRow {
    fn from(record: &ExecutionRecord) -> Self {
        CsvRow {
            automation_id: record.automation_id.clone(),
            automation_name: record.automation_name.clone(),
            ran_at: record.ran_at.to_rfc3339(),
            success: record.success,
            error: record.error.clone(),
            action_count: record.action_count,
        }
    }
}

/// Roll the journal into the CSV archive and rename the journal.
///
/// The CSV is fsynced before the journal is renamed to `.processed`, so a
/// crash between the two steps duplicates rows instead of losing them.
pub fn rollup_and_archive(journal_path: &Path, csv_path: &Path) -> Result<usize> {
    let records = read_records(journal_path)?;

    if records.is_empty() {
        tracing::info!("No run records to roll up");
        return Ok(0);
    }

    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;

    let needs_headers = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);

    for record in &records {
        writer.serialize(CsvRow::from(record))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    file.sync_all()?;

    tracing::info!("Wrote {} run records to CSV archive", records.len());

    let processed_path = journal_path.with_extension("jsonl.processed");
    std::fs::rename(journal_path, &processed_path)?;
    tracing::info!("Archived run journal to {:?}", processed_path);

    Ok(records.len())
}

/// Remove `.processed` journal files left behind by previous rollups.
pub fn cleanup_processed(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if let Some(extension) = path.extension() {
            if extension == "processed" {
                std::fs::remove_file(&path)?;
                tracing::debug!("Removed processed journal: {:?}", path);
                count += 1;
            }
        }
    }

    if count > 0 {
        tracing::info!("Cleaned up {} processed journal files", count);
    }

    Ok(count)
}
