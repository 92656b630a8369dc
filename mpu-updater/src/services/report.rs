//! Run reports
//!
//! Three artifacts per run: a human-readable summary (logged and returned),
//! a detail CSV with one line per outcome, and a JSON statistics snapshot.
//! Output files are created with `create_new`; an existing file is never
//! overwritten.

use crate::models::{RunStatistics, UpdateKind, UpdateOutcome};
use crate::services::batch_coordinator::BatchRun;
use chrono::{DateTime, Utc};
use mpu_common::time::file_timestamp;
use mpu_common::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// Failures listed in the summary
const SUMMARY_FAILURE_LIMIT: usize = 10;

pub const DETAIL_COLUMNS: [&str; 10] = [
    "spu_id",
    "product_id",
    "operation",
    "value",
    "sku_ids",
    "success",
    "code",
    "message",
    "request_id",
    "retry_count",
];

/// Files and summary produced for one run
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub summary: String,
    pub detail_path: PathBuf,
    pub stats_path: PathBuf,
}

/// Writes report files into one output directory
#[derive(Debug, Clone)]
pub struct ReportGenerator {
    output_dir: PathBuf,
    /// Prepended to file names (job runs use the job id)
    prefix: Option<String>,
}

impl ReportGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// File names for a run finishing at `at`
    pub fn file_names(&self, kind: UpdateKind, at: DateTime<Utc>) -> (PathBuf, PathBuf) {
        let stamp = file_timestamp(at);
        let prefix = self
            .prefix
            .as_deref()
            .map(|p| format!("{}_", p))
            .unwrap_or_default();
        (
            self.output_dir
                .join(format!("{}{}_update_report_{}.csv", prefix, kind, stamp)),
            self.output_dir
                .join(format!("{}{}_stats_{}.json", prefix, kind, stamp)),
        )
    }

    /// Write the detail CSV and statistics snapshot for a finished run
    pub fn generate(&self, run: &BatchRun) -> Result<BatchReport> {
        self.generate_at(run, Utc::now())
    }

    /// [`generate`](Self::generate) with an explicit timestamp
    ///
    /// Either both files are written or neither is left behind.
    pub fn generate_at(&self, run: &BatchRun, at: DateTime<Utc>) -> Result<BatchReport> {
        std::fs::create_dir_all(&self.output_dir)?;
        let (detail_path, stats_path) = self.file_names(run.update_kind, at);

        write_detail_csv(&detail_path, &run.outcomes)?;
        if let Err(e) = write_stats_json(&stats_path, &run.statistics) {
            if let Err(remove_err) = std::fs::remove_file(&detail_path) {
                tracing::warn!(
                    path = %detail_path.display(),
                    error = %remove_err,
                    "Failed to remove partial report"
                );
            }
            return Err(e);
        }

        let summary = build_summary(run.update_kind, &run.outcomes, &run.statistics);
        tracing::info!(
            detail = %detail_path.display(),
            stats = %stats_path.display(),
            "Reports saved"
        );

        Ok(BatchReport {
            summary,
            detail_path,
            stats_path,
        })
    }
}

fn create_new(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                Error::InvalidInput(format!("Report file already exists: {}", path.display()))
            } else {
                Error::Io(e)
            }
        })
}

/// One line per outcome, in the order given
pub fn write_detail_csv(path: &Path, outcomes: &[UpdateOutcome]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(create_new(path)?);
    writer.write_record(DETAIL_COLUMNS)?;

    for outcome in outcomes {
        let sku_ids = outcome.sku_ids.join(", ");
        let retry_count = outcome.retry_count.to_string();
        writer.write_record([
            outcome.spu_id.as_str(),
            outcome.product_id.as_str(),
            outcome.operation_label(),
            outcome.value.as_str(),
            sku_ids.as_str(),
            if outcome.success { "true" } else { "false" },
            outcome.code.as_str(),
            outcome.message.as_str(),
            outcome.request_id.as_deref().unwrap_or(""),
            retry_count.as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_stats_json(path: &Path, statistics: &RunStatistics) -> Result<()> {
    let mut file = create_new(path)?;
    serde_json::to_writer_pretty(&mut file, statistics)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Human-readable run summary
pub fn build_summary(kind: UpdateKind, outcomes: &[UpdateOutcome], stats: &RunStatistics) -> String {
    let title = format!("{} UPDATE SUMMARY", kind.as_str().to_uppercase());
    let mut lines = vec![
        "=".repeat(title.len()),
        format!("Total processed:     {}", stats.total_processed),
        format!("Successful:          {}", stats.successful),
        format!("Failed:              {}", stats.failed),
        format!("SKU updates:         {}", stats.sku_updates),
        format!("Direct updates:      {}", stats.direct_updates),
        format!("Update failures:     {}", stats.remote_failures),
        format!("Lookup failures:     {}", stats.lookup_failures),
        format!("Validation failures: {}", stats.validation_failures),
        format!("Processing failures: {}", stats.processing_failures),
        format!("Retries:             {}", stats.total_retries),
        format!("Rate limited:        {}", stats.rate_limited_attempts),
        format!("Success rate:        {}", stats.success_rate_display()),
    ];
    lines.insert(0, title);

    let failures: Vec<&UpdateOutcome> = outcomes.iter().filter(|o| !o.success).collect();
    if !failures.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "Failures (first {}):",
            SUMMARY_FAILURE_LIMIT.min(failures.len())
        ));
        lines.extend(
            failures
                .iter()
                .take(SUMMARY_FAILURE_LIMIT)
                .map(|outcome| format!("  row {}: {}", outcome.row_number, outcome)),
        );
        if failures.len() > SUMMARY_FAILURE_LIMIT {
            lines.push(format!(
                "  ... and {} more",
                failures.len() - SUMMARY_FAILURE_LIMIT
            ));
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}
