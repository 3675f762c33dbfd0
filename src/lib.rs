pub mod config;
pub mod duck;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod report;

pub use config::{OutOfRangePolicy, RunConfig, TransformOptions};
pub use error::ReviewError;
pub use pipeline::{run, RunSummary};
