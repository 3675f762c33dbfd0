// src/config.rs

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Two-digit years below this resolve to the 2000s, the rest to the 1900s.
pub const DEFAULT_CENTURY_PIVOT: u8 = 69;

/// What to do with a bucketed value that falls outside the boundary list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutOfRangePolicy {
    /// Drop the row and count it as skipped.
    #[default]
    Skip,
    /// Pin the value into the nearest edge bucket and count the row as flagged.
    Clamp,
}

/// Knobs the transform stage needs; everything else is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformOptions {
    pub century_pivot: u8,
    pub out_of_range: OutOfRangePolicy,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            century_pivot: DEFAULT_CENTURY_PIVOT,
            out_of_range: OutOfRangePolicy::Skip,
        }
    }
}

/// Full run configuration, as read from YAML and then overridden by CLI flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Raw reviews CSV export.
    pub input: PathBuf,
    /// DuckDB database file holding the `reviews` table.
    pub database: PathBuf,
    /// Where the reports, cleaned export and run summary go.
    pub output_dir: PathBuf,
    pub century_pivot: u8,
    pub out_of_range: OutOfRangePolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("resources/reviews.csv"),
            database: PathBuf::from("db/reviews.duckdb"),
            output_dir: PathBuf::from("metrics"),
            century_pivot: DEFAULT_CENTURY_PIVOT,
            out_of_range: OutOfRangePolicy::Skip,
        }
    }
}

impl RunConfig {
    /// Load a YAML config file. Missing keys fall back to the defaults.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let cfg: RunConfig = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.century_pivot > 100 {
            bail!(
                "century_pivot must be between 0 and 100, got {}",
                self.century_pivot
            );
        }
        Ok(())
    }

    pub fn transform_options(&self) -> TransformOptions {
        TransformOptions {
            century_pivot: self.century_pivot,
            out_of_range: self.out_of_range,
        }
    }
}
