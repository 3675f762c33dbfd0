use anyhow::Result;
use clap::Parser;
use reviewetl::{pipeline, OutOfRangePolicy, RunConfig};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Clean an app-review CSV export, load it into DuckDB and write score reports"
)]
struct Args {
    /// YAML config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Raw reviews CSV
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// DuckDB database file
    #[arg(short, long)]
    database: Option<PathBuf>,
    /// Directory for reports, cleaned export and run summary
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
    /// Two-digit years below this are 20xx, the rest 19xx
    #[arg(long)]
    century_pivot: Option<u8>,
    /// What to do with apps_bought / money_spent outside the bucket range
    #[arg(long, value_enum)]
    out_of_range: Option<OutOfRangePolicy>,
}

impl Args {
    fn into_config(self) -> Result<RunConfig> {
        let mut cfg = match &self.config {
            Some(path) => RunConfig::from_yaml_file(path)?,
            None => RunConfig::default(),
        };
        if let Some(v) = self.input {
            cfg.input = v;
        }
        if let Some(v) = self.database {
            cfg.database = v;
        }
        if let Some(v) = self.output_dir {
            cfg.output_dir = v;
        }
        if let Some(v) = self.century_pivot {
            cfg.century_pivot = v;
        }
        if let Some(v) = self.out_of_range {
            cfg.out_of_range = v;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) resolve config ───────────────────────────────────────────
    let cfg = Args::parse().into_config()?;
    info!(
        input = %cfg.input.display(),
        database = %cfg.database.display(),
        output_dir = %cfg.output_dir.display(),
        century_pivot = cfg.century_pivot,
        out_of_range = ?cfg.out_of_range,
        "config"
    );

    // ─── 3) run ──────────────────────────────────────────────────────
    match pipeline::run_with_config(&cfg) {
        Ok(summary) => {
            info!(
                loaded = summary.rows_loaded,
                skipped = summary.rows_skipped,
                "all done"
            );
            Ok(())
        }
        Err(e) => {
            error!("run failed: {:#}", e);
            Err(e)
        }
    }
}
