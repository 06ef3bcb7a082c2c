// Data processing pipeline: ingestion, processing, storage, and archival

pub mod archive;
pub mod ingestion;
pub mod orchestrator;
pub mod processing;
pub mod storage;

pub use archive::archive;
pub use orchestrator::{Pipeline, PipelineReport};
