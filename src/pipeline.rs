// src/pipeline.rs

use anyhow::{Context, Result};
use duckdb::Connection;
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

use crate::config::{RunConfig, TransformOptions};
use crate::duck;
use crate::process::{self, RecordTransformer, RowIssue};
use crate::report::{self, CLEANED_EXPORT_FILE};

pub const RUN_SUMMARY_FILE: &str = "run_summary.json";

/// What a run did, written next to the reports and logged at the end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub rows_read: usize,
    pub rows_loaded: usize,
    pub rows_skipped: usize,
    pub rows_flagged: usize,
    pub pruned_columns: Vec<String>,
    pub skipped: Vec<RowIssue>,
    pub flagged: Vec<RowIssue>,
    pub cleaned_export: PathBuf,
    pub reports: Vec<PathBuf>,
}

impl RunSummary {
    pub fn log(&self) {
        info!(
            read = self.rows_read,
            loaded = self.rows_loaded,
            skipped = self.rows_skipped,
            flagged = self.rows_flagged,
            "run summary"
        );
        if self.rows_skipped > 0 {
            warn!(
                "{} row(s) skipped, see {} for details",
                self.rows_skipped, RUN_SUMMARY_FILE
            );
        }
        for path in &self.reports {
            info!(path = %path.display(), "report ready");
        }
    }
}

/// Extract, clean, load, report.
///
/// Reads `input`, replaces the `reviews` table behind `conn`, and writes the
/// reports, the cleaned export and the run summary into `output_dir`.
/// A missing required column fails before the store is touched.
#[tracing::instrument(
    level = "info",
    skip(conn, opts),
    fields(input = %input.display(), out = %output_dir.display())
)]
pub fn run(
    input: &Path,
    conn: &mut Connection,
    output_dir: &Path,
    opts: &TransformOptions,
) -> Result<RunSummary> {
    let table = process::load_reviews_csv(input)?;
    let cleaned = RecordTransformer::new(*opts)
        .transform(table)
        .with_context(|| format!("transforming {}", input.display()))?;

    let rows_loaded = duck::replace_reviews(conn, &cleaned.records)?;

    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;
    let cleaned_export = output_dir.join(CLEANED_EXPORT_FILE);
    report::write_cleaned_reviews(&cleaned_export, &cleaned.records)?;
    let reports = report::write_all_reports(conn, output_dir)?;

    let summary = RunSummary {
        rows_read: cleaned.rows_read,
        rows_loaded,
        rows_skipped: cleaned.skipped.len(),
        // a row can carry more than one flag
        rows_flagged: count_lines(&cleaned.flagged),
        pruned_columns: cleaned.pruned_columns,
        skipped: cleaned.skipped,
        flagged: cleaned.flagged,
        cleaned_export,
        reports,
    };

    let summary_path = output_dir.join(RUN_SUMMARY_FILE);
    let json = serde_json::to_string_pretty(&summary).context("serializing run summary")?;
    fs::write(&summary_path, json)
        .with_context(|| format!("writing {}", summary_path.display()))?;

    summary.log();
    Ok(summary)
}

/// Open the configured database and run the whole pipeline.
pub fn run_with_config(cfg: &RunConfig) -> Result<RunSummary> {
    cfg.validate()?;
    if let Some(parent) = cfg.database.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating database directory {}", parent.display()))?;
    }
    let mut conn = duck::open_disk_db(&cfg.database)?;
    run(
        &cfg.input,
        &mut conn,
        &cfg.output_dir,
        &cfg.transform_options(),
    )
}

fn count_lines(issues: &[RowIssue]) -> usize {
    let mut lines: Vec<usize> = issues.iter().map(|i| i.line).collect();
    lines.dedup();
    lines.len()
}
