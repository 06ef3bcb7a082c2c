pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;

// Domain data shapes shared across stages
pub mod domain;

// Content digests used for deduplication
pub mod gateway;

pub mod pipeline;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, PipelineReport};
