// src/process/transform.rs

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{OutOfRangePolicy, TransformOptions};
use crate::error::ReviewError;
use crate::process::bucket::Bucketizer;
use crate::process::date_parser::{canonical_date, DateNormalizer};
use crate::process::utils::{clean_str, parse_float, parse_integer};
use crate::process::{RawTable, RowIssue};

/// Stored column order of the `reviews` table.
pub const TARGET_COLUMNS: [&str; 8] = [
    "title",
    "score",
    "iso",
    "date",
    "apps_bought",
    "money_spent",
    "apps_bought_bucket",
    "money_spent_bucket",
];

/// Input columns a run cannot do without.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "title",
    "score",
    "iso",
    "date",
    "apps_bought",
    "money_spent",
];

/// Input spelling → stored spelling.
const COLUMN_RENAMES: [(&str, &str); 1] = [("app_bought", "apps_bought")];

const DROPPED_COLUMNS: [&str; 1] = ["product_name"];

/// `money_spent` is stored as NUMERIC(18,3): three decimals, and the
/// magnitude has to stay below 10^15.
const MONEY_DECIMALS: i32 = 3;
const MONEY_LIMIT: f64 = 1e15;

/// One cleaned review, in stored column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanedReview {
    pub title: String,
    pub score: i32,
    pub iso: String,
    pub date: NaiveDate,
    pub apps_bought: i32,
    pub money_spent: f64,
    pub apps_bought_bucket: String,
    pub money_spent_bucket: String,
}

impl CleanedReview {
    pub fn date_text(&self) -> String {
        canonical_date(self.date)
    }
}

/// What became of a single input row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Clean(CleanedReview),
    /// Stored, but something was adjusted on the way in.
    Flagged(CleanedReview, Vec<ReviewError>),
    Skipped(ReviewError),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformOutput {
    pub records: Vec<CleanedReview>,
    pub skipped: Vec<RowIssue>,
    pub flagged: Vec<RowIssue>,
    pub rows_read: usize,
    pub pruned_columns: Vec<String>,
}

/// Positions of the required columns in the (pruned, renamed) raw table.
#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    title: usize,
    score: usize,
    iso: usize,
    date: usize,
    apps_bought: usize,
    money_spent: usize,
}

impl ColumnIndex {
    fn resolve(table: &RawTable) -> Result<Self, ReviewError> {
        let find = |name: &str| {
            table
                .column_index(name)
                .ok_or_else(|| ReviewError::MissingColumn {
                    column: name.to_string(),
                })
        };
        Ok(Self {
            title: find("title")?,
            score: find("score")?,
            iso: find("iso")?,
            date: find("date")?,
            apps_bought: find("apps_bought")?,
            money_spent: find("money_spent")?,
        })
    }
}

/// Turns the raw export into rows shaped like the `reviews` table.
#[derive(Debug, Clone)]
pub struct RecordTransformer {
    dates: DateNormalizer,
    apps_bought: Bucketizer,
    money_spent: Bucketizer,
    out_of_range: OutOfRangePolicy,
}

impl RecordTransformer {
    pub fn new(opts: TransformOptions) -> Self {
        Self {
            dates: DateNormalizer::new(opts.century_pivot),
            apps_bought: Bucketizer::apps_bought(),
            money_spent: Bucketizer::money_spent(),
            out_of_range: opts.out_of_range,
        }
    }

    /// Align the table with the target schema, then clean every row.
    ///
    /// A missing required column fails the whole call; anything wrong with
    /// an individual row ends up in `skipped` or `flagged`.
    #[tracing::instrument(level = "info", skip_all, fields(rows = table.rows.len()))]
    pub fn transform(&self, mut table: RawTable) -> Result<TransformOutput> {
        for (from, to) in COLUMN_RENAMES {
            if table.column_index(to).is_none() && table.rename_column(from, to) {
                debug!(from, to, "renamed column");
            }
        }

        let pruned_columns = table.prune_zero_columns(&REQUIRED_COLUMNS);
        if !pruned_columns.is_empty() {
            info!(columns = ?pruned_columns, "dropped all-zero columns");
        }

        for name in DROPPED_COLUMNS {
            table.drop_column(name);
        }

        let idx = ColumnIndex::resolve(&table)?;
        debug!(
            apps_bought = %self.apps_bought,
            money_spent = %self.money_spent,
            "bucket layout"
        );

        let mut out = TransformOutput {
            rows_read: table.rows.len() + table.rejected.len(),
            skipped: std::mem::take(&mut table.rejected),
            pruned_columns,
            ..Default::default()
        };

        for (i, row) in table.rows.iter().enumerate() {
            let line = table.line_of(i);
            match self.transform_row(row, &idx) {
                RowOutcome::Clean(record) => out.records.push(record),
                RowOutcome::Flagged(record, reasons) => {
                    for error in reasons {
                        warn!(line, %error, "flagged row");
                        out.flagged.push(RowIssue { line, error });
                    }
                    out.records.push(record);
                }
                RowOutcome::Skipped(error) => {
                    warn!(line, %error, "skipped row");
                    out.skipped.push(RowIssue { line, error });
                }
            }
        }

        out.skipped.sort_by_key(|issue| issue.line);

        info!(
            kept = out.records.len(),
            skipped = out.skipped.len(),
            flagged = out.flagged.len(),
            "transform finished"
        );
        Ok(out)
    }

    fn transform_row(&self, row: &[String], idx: &ColumnIndex) -> RowOutcome {
        let mut flags = Vec::new();
        match self.clean_row(row, idx, &mut flags) {
            Ok(record) if flags.is_empty() => RowOutcome::Clean(record),
            Ok(record) => RowOutcome::Flagged(record, flags),
            Err(e) => RowOutcome::Skipped(e),
        }
    }

    fn clean_row(
        &self,
        row: &[String],
        idx: &ColumnIndex,
        flags: &mut Vec<ReviewError>,
    ) -> Result<CleanedReview, ReviewError> {
        let cell = |i: usize| row.get(i).map(String::as_str).unwrap_or("");

        let score = integer_field("score", cell(idx.score))?;
        let apps_bought = integer_field("apps_bought", cell(idx.apps_bought))?;
        let money_spent = money_field(cell(idx.money_spent))?;

        let apps_bought_bucket =
            self.assign_bucket("apps_bought", &self.apps_bought, apps_bought as f64, flags)?;
        let money_spent_bucket =
            self.assign_bucket("money_spent", &self.money_spent, money_spent, flags)?;

        let date = self.dates.normalize(cell(idx.date))?;

        Ok(CleanedReview {
            // free text: a title may legitimately start and end with quotes
            title: cell(idx.title).trim().to_string(),
            score,
            iso: clean_str(cell(idx.iso)),
            date,
            apps_bought,
            money_spent,
            apps_bought_bucket,
            money_spent_bucket,
        })
    }

    fn assign_bucket(
        &self,
        column: &str,
        bucketizer: &Bucketizer,
        value: f64,
        flags: &mut Vec<ReviewError>,
    ) -> Result<String, ReviewError> {
        if let Some(label) = bucketizer.bucket(value).label() {
            return Ok(label);
        }
        let err = ReviewError::OutOfRangeValue {
            column: column.to_string(),
            value,
            min: bucketizer.min(),
            max: bucketizer.max(),
        };
        match self.out_of_range {
            OutOfRangePolicy::Clamp => match bucketizer.clamped(value).label() {
                Some(label) => {
                    flags.push(err);
                    Ok(label)
                }
                None => Err(err),
            },
            OutOfRangePolicy::Skip => Err(err),
        }
    }
}

/// Integer cell that fits the 32-bit INTEGER column.
fn integer_field(column: &str, raw: &str) -> Result<i32, ReviewError> {
    parse_integer(raw)
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| ReviewError::InvalidNumber {
            column: column.to_string(),
            value: raw.to_string(),
        })
}

/// Finite amount, rounded to the stored scale, that fits NUMERIC(18,3).
fn money_field(raw: &str) -> Result<f64, ReviewError> {
    let scale = 10f64.powi(MONEY_DECIMALS);
    parse_float(raw)
        .filter(|v| v.is_finite())
        .map(|v| (v * scale).round() / scale)
        .filter(|v| v.abs() < MONEY_LIMIT)
        .ok_or_else(|| ReviewError::InvalidNumber {
            column: "money_spent".into(),
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::read_reviews_csv;
    use std::io::Cursor;

    fn raw(csv: &str) -> RawTable {
        read_reviews_csv(Cursor::new(csv.to_string())).unwrap()
    }

    const HEADER: &str = "title,score,iso,date,app_bought,money_spent,product_name";

    #[test]
    fn cleans_a_well_formed_export() -> Result<()> {
        let csv = format!(
            "{HEADER},unused\n\
             Great app,5,US,15/01/99,10,25.5,reddit,0\n\
             Meh,3,CA,2005-06-01 00:00:00,100,500,reddit,0\n\
             Ok,4,US,17-05-02 12:00:00,45,120,reddit,0\n"
        );
        let out = RecordTransformer::new(TransformOptions::default()).transform(raw(&csv))?;

        assert_eq!(out.rows_read, 3);
        assert!(out.skipped.is_empty());
        assert!(out.flagged.is_empty());
        assert_eq!(out.pruned_columns, vec!["unused"]);

        let first = &out.records[0];
        assert_eq!(first.title, "Great app");
        assert_eq!(first.date_text(), "1999-01-15");
        assert_eq!(first.apps_bought, 10);
        assert_eq!(first.apps_bought_bucket, "[0-20]");
        assert_eq!(first.money_spent_bucket, "[0-50]");

        let second = &out.records[1];
        assert_eq!(second.date_text(), "2005-06-01");
        assert_eq!(second.apps_bought_bucket, "[80-100]");
        assert_eq!(second.money_spent_bucket, "[450-500]");

        assert_eq!(out.records[2].date_text(), "2017-05-02");
        assert_eq!(out.records[2].money_spent_bucket, "[100-150]");
        Ok(())
    }

    #[test]
    fn output_columns_match_target_schema() -> Result<()> {
        let csv = format!("{HEADER}\nt,4,US,15/01/99,1,1,p\n");
        let out = RecordTransformer::new(TransformOptions::default()).transform(raw(&csv))?;
        let json = serde_json::to_value(&out.records[0])?;
        let keys: Vec<&str> = json
            .as_object()
            .map(|o| o.keys().map(String::as_str).collect())
            .unwrap_or_default();
        for col in TARGET_COLUMNS {
            assert!(keys.contains(&col), "{} missing", col);
        }
        assert!(!keys.contains(&"product_name"));
        assert!(!keys.contains(&"app_bought"));
        Ok(())
    }

    #[test]
    fn unparseable_date_is_skipped_not_stored() -> Result<()> {
        let csv = format!("{HEADER}\nbad,4,US,not-a-date,1,1,p\ngood,5,US,15/01/99,1,1,p\n");
        let out = RecordTransformer::new(TransformOptions::default()).transform(raw(&csv))?;
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].title, "good");
        assert_eq!(
            out.skipped,
            vec![RowIssue {
                line: 2,
                error: ReviewError::UnparseableDate {
                    value: "not-a-date".into()
                }
            }]
        );
        Ok(())
    }

    #[test]
    fn out_of_range_skip_policy() -> Result<()> {
        let csv = format!("{HEADER}\nt,4,US,15/01/99,150,10,p\n");
        let out = RecordTransformer::new(TransformOptions::default()).transform(raw(&csv))?;
        assert!(out.records.is_empty());
        assert!(matches!(
            out.skipped[0].error,
            ReviewError::OutOfRangeValue { ref column, value, .. }
                if column == "apps_bought" && value == 150.0
        ));
        Ok(())
    }

    #[test]
    fn out_of_range_clamp_policy_flags() -> Result<()> {
        let opts = TransformOptions {
            out_of_range: OutOfRangePolicy::Clamp,
            ..TransformOptions::default()
        };
        let csv = format!("{HEADER}\nt,4,US,15/01/99,150,-3,p\n");
        let out = RecordTransformer::new(opts).transform(raw(&csv))?;
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].apps_bought, 150);
        assert_eq!(out.records[0].apps_bought_bucket, "[80-100]");
        assert_eq!(out.records[0].money_spent_bucket, "[0-50]");
        assert_eq!(out.flagged.len(), 2);
        assert!(out.skipped.is_empty());
        Ok(())
    }

    #[test]
    fn nan_money_is_skipped_even_when_clamping() -> Result<()> {
        let opts = TransformOptions {
            out_of_range: OutOfRangePolicy::Clamp,
            ..TransformOptions::default()
        };
        let csv = format!("{HEADER}\nt,4,US,15/01/99,1,NaN,p\n");
        let out = RecordTransformer::new(opts).transform(raw(&csv))?;
        assert!(out.records.is_empty());
        assert_eq!(out.skipped.len(), 1);
        Ok(())
    }

    #[test]
    fn bad_numbers_are_skipped() -> Result<()> {
        let csv = format!("{HEADER}\nt,five,US,15/01/99,1,1,p\nu,4,US,15/01/99,1,,p\n");
        let out = RecordTransformer::new(TransformOptions::default()).transform(raw(&csv))?;
        assert!(out.records.is_empty());
        assert_eq!(
            out.skipped[0].error,
            ReviewError::InvalidNumber {
                column: "score".into(),
                value: "five".into()
            }
        );
        assert_eq!(out.skipped[1].line, 3);
        Ok(())
    }

    #[test]
    fn score_beyond_32_bits_is_skipped() -> Result<()> {
        let csv = format!(
            "{HEADER}\nbig,3000000000,US,15/01/99,10,20,p\n\
             many,4,US,15/01/99,-3000000000,20,p\n\
             fine,4,US,15/01/99,10,20,p\n"
        );
        let out = RecordTransformer::new(TransformOptions::default()).transform(raw(&csv))?;
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].title, "fine");
        assert_eq!(
            out.skipped[0].error,
            ReviewError::InvalidNumber {
                column: "score".into(),
                value: "3000000000".into()
            }
        );
        assert!(matches!(
            out.skipped[1].error,
            ReviewError::InvalidNumber { ref column, .. } if column == "apps_bought"
        ));
        Ok(())
    }

    #[test]
    fn unstorable_money_is_skipped_even_when_clamping() -> Result<()> {
        let opts = TransformOptions {
            out_of_range: OutOfRangePolicy::Clamp,
            ..TransformOptions::default()
        };
        let csv = format!(
            "{HEADER}\nhuge,4,US,15/01/99,10,1e20,p\n\
             inf,4,US,15/01/99,10,inf,p\n\
             big,4,US,15/01/99,10,900000,p\n"
        );
        let out = RecordTransformer::new(opts).transform(raw(&csv))?;
        assert_eq!(out.skipped.len(), 2);
        assert!(out
            .skipped
            .iter()
            .all(|i| matches!(i.error, ReviewError::InvalidNumber { .. })));
        // representable, just above the top bucket: stored and flagged
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].money_spent, 900000.0);
        assert_eq!(out.records[0].money_spent_bucket, "[450-500]");
        assert_eq!(out.flagged.len(), 1);
        Ok(())
    }

    #[test]
    fn money_is_rounded_to_stored_scale() -> Result<()> {
        let csv = format!("{HEADER}\nt,4,US,15/01/99,1,12.34567,p\n");
        let out = RecordTransformer::new(TransformOptions::default()).transform(raw(&csv))?;
        assert_eq!(out.records[0].money_spent, 12.346);
        Ok(())
    }

    #[test]
    fn skipped_lines_account_for_multiline_titles() -> Result<()> {
        let csv = format!(
            "{HEADER}\n\"line one\nline two\nline three\",4,US,15/01/99,1,1,p\n\
             bad,4,US,not-a-date,1,1,p\n"
        );
        let out = RecordTransformer::new(TransformOptions::default()).transform(raw(&csv))?;
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.skipped[0].line, 5);
        Ok(())
    }

    #[test]
    fn quoted_title_text_is_preserved() -> Result<()> {
        let csv = format!(
            "{HEADER}\n\"\"\"Best\"\" app \"\"ever\"\"\",4,US,15/01/99,1,1,p\n"
        );
        let out = RecordTransformer::new(TransformOptions::default()).transform(raw(&csv))?;
        assert_eq!(out.records[0].title, "\"Best\" app \"ever\"");
        Ok(())
    }

    #[test]
    fn undecodable_rows_are_counted_as_skipped() -> Result<()> {
        let mut bytes = format!("{HEADER}\n").into_bytes();
        bytes.extend_from_slice(b"caf\xe9,4,US,15/01/99,1,1,p\n");
        bytes.extend_from_slice(b"good,4,US,not-a-date,1,1,p\n");
        let table = read_reviews_csv(Cursor::new(bytes))?;
        let out = RecordTransformer::new(TransformOptions::default()).transform(table)?;
        assert_eq!(out.rows_read, 2);
        assert!(out.records.is_empty());
        assert_eq!(out.skipped.len(), 2);
        assert_eq!(out.skipped[0].line, 2);
        assert_eq!(out.skipped[0].error, ReviewError::InvalidUtf8 { field: 0 });
        assert_eq!(out.skipped[1].line, 3);
        Ok(())
    }

    #[test]
    fn missing_column_fails_the_transform() {
        let csv = "title,score,date,app_bought,money_spent\nt,4,15/01/99,1,1\n";
        let err = RecordTransformer::new(TransformOptions::default())
            .transform(raw(csv))
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<ReviewError>(),
            Some(&ReviewError::MissingColumn {
                column: "iso".into()
            })
        );
    }

    #[test]
    fn all_zero_required_column_survives_pruning() -> Result<()> {
        let csv = format!("{HEADER}\nt,4,US,15/01/99,0,0,p\n");
        let out = RecordTransformer::new(TransformOptions::default()).transform(raw(&csv))?;
        assert!(out.pruned_columns.is_empty());
        assert_eq!(out.records[0].apps_bought_bucket, "[0-20]");
        assert_eq!(out.records[0].money_spent, 0.0);
        Ok(())
    }

    #[test]
    fn already_renamed_input_is_accepted() -> Result<()> {
        let csv = "title,score,iso,date,apps_bought,money_spent\nt,4,US,15/01/99,30,1\n";
        let out = RecordTransformer::new(TransformOptions::default()).transform(raw(csv))?;
        assert_eq!(out.records[0].apps_bought_bucket, "[20-40]");
        Ok(())
    }
}
