// src/report/mod.rs

use anyhow::{Context, Result};
use csv::WriterBuilder;
use duckdb::Connection;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::process::transform::{CleanedReview, TARGET_COLUMNS};

/// File name of the cleaned-data export.
pub const CLEANED_EXPORT_FILE: &str = "cleaned_reviews.csv";

/// The three fixed aggregate reports run against `reviews`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Report {
    AverageScoreByIso,
    MaxScoreByAppsBoughtBucket,
    /// Grouped on the calendar day (first ten characters of `date`).
    AverageScoreByDay,
}

impl Report {
    pub const ALL: [Report; 3] = [
        Report::AverageScoreByIso,
        Report::MaxScoreByAppsBoughtBucket,
        Report::AverageScoreByDay,
    ];

    pub fn sql(self) -> &'static str {
        match self {
            Report::AverageScoreByIso => {
                "SELECT iso, AVG(score) AS AvgIsoScore FROM reviews \
                 GROUP BY iso ORDER BY iso;"
            }
            Report::MaxScoreByAppsBoughtBucket => {
                "SELECT apps_bought_bucket, MAX(score) AS MaxScore FROM reviews \
                 GROUP BY apps_bought_bucket ORDER BY apps_bought_bucket;"
            }
            Report::AverageScoreByDay => {
                "SELECT substr(\"date\", 1, 10) AS review_day, AVG(score) AS AvgDateScore FROM reviews \
                 GROUP BY review_day ORDER BY review_day;"
            }
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Report::AverageScoreByIso => "average_score_by_iso.tsv",
            Report::MaxScoreByAppsBoughtBucket => "max_score_by_apps_bought_bucket.tsv",
            Report::AverageScoreByDay => "average_score_by_day.tsv",
        }
    }

    /// Header row: group column, then the aggregate.
    pub fn headers(self) -> [&'static str; 2] {
        match self {
            Report::AverageScoreByIso => ["iso", "AvgIsoScore"],
            Report::MaxScoreByAppsBoughtBucket => ["apps_bought_bucket", "MaxScore"],
            Report::AverageScoreByDay => ["date", "AvgDateScore"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric {
    Average(f64),
    Maximum(i64),
}

impl Metric {
    /// Averages keep between one and four decimals: `4.5`, `3.0`, `3.3333`.
    pub fn render(&self) -> String {
        match *self {
            Metric::Maximum(v) => v.to_string(),
            Metric::Average(v) => {
                let s = format!("{:.4}", v);
                let trimmed = s.trim_end_matches('0');
                if trimmed.ends_with('.') {
                    format!("{}0", trimmed)
                } else {
                    trimmed.to_string()
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub group: String,
    pub value: Metric,
}

/// Run one report and return its rows, ordered by group.
pub fn query_report(conn: &Connection, report: Report) -> Result<Vec<ReportRow>> {
    let mut stmt = conn
        .prepare(report.sql())
        .with_context(|| format!("preparing {:?}", report))?;
    let rows = stmt
        .query_map([], |row| {
            let group: String = row.get(0)?;
            let value = match report {
                Report::MaxScoreByAppsBoughtBucket => Metric::Maximum(row.get(1)?),
                Report::AverageScoreByIso | Report::AverageScoreByDay => {
                    Metric::Average(row.get(1)?)
                }
            };
            Ok(ReportRow { group, value })
        })
        .with_context(|| format!("running {:?}", report))?
        .collect::<duckdb::Result<Vec<_>>>()
        .with_context(|| format!("reading rows of {:?}", report))?;
    Ok(rows)
}

/// Write one report as tab-separated text with a header row.
pub fn write_report(path: &Path, report: Report, rows: &[ReportRow]) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("creating report {}", path.display()))?;
    wtr.write_record(report.headers())?;
    for row in rows {
        wtr.write_record([row.group.as_str(), row.value.render().as_str()])?;
    }
    wtr.flush()
        .with_context(|| format!("flushing report {}", path.display()))?;
    Ok(())
}

/// Run every report and write each into `out_dir`. Returns the written paths.
#[tracing::instrument(level = "info", skip(conn), fields(out = %out_dir.display()))]
pub fn write_all_reports(conn: &Connection, out_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(Report::ALL.len());
    for report in Report::ALL {
        let rows = query_report(conn, report)?;
        let path = out_dir.join(report.file_name());
        write_report(&path, report, &rows)?;
        info!(report = ?report, groups = rows.len(), path = %path.display(), "wrote report");
        written.push(path);
    }
    Ok(written)
}

/// Write the cleaned rows as a comma-separated file in stored column order.
pub fn write_cleaned_reviews(path: &Path, records: &[CleanedReview]) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("creating cleaned export {}", path.display()))?;
    // header written by hand so an empty export still has one
    wtr.write_record(TARGET_COLUMNS)?;
    for r in records {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    info!(rows = records.len(), path = %path.display(), "wrote cleaned export");
    Ok(())
}
