use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Unsupported file format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("File {} already processed (digest {digest}, archived at {})", path.display(), archived.display())]
    DuplicateFile {
        path: PathBuf,
        digest: String,
        archived: PathBuf,
    },

    #[error("Column mismatch detected: missing {missing:?}, extra {extra:?}")]
    SchemaMismatch {
        missing: BTreeSet<String>,
        extra: BTreeSet<String>,
    },

    #[error("Invalid schema definition: {0}")]
    SchemaDefinition(String),

    #[error("Error correcting type of column '{column}': {cause}")]
    TypeCoercion { column: String, cause: String },

    #[error("Cannot impute column '{column}': every value is null")]
    Imputation { column: String },

    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("I/O error ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("SQLite error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persistence failed: {}", failures.join("; "))]
    Persist { failures: Vec<String> },
}

impl PipelineError {
    /// Wrap an I/O error with a short description of what was being attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        PipelineError::Io {
            context: context.into(),
            source,
        }
    }

    /// Short stable label for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::UnsupportedFormat { .. } => "unsupported_format",
            PipelineError::DuplicateFile { .. } => "duplicate_file",
            PipelineError::SchemaMismatch { .. } => "schema_mismatch",
            PipelineError::SchemaDefinition(_) => "schema_definition",
            PipelineError::TypeCoercion { .. } => "type_coercion",
            PipelineError::Imputation { .. } => "imputation",
            PipelineError::Parse { .. } => "parse",
            PipelineError::Io { .. } => "io",
            PipelineError::Store(_) => "store",
            PipelineError::Csv(_) => "csv",
            PipelineError::Toml(_) => "toml",
            PipelineError::Config(_) => "config",
            PipelineError::Persist { .. } => "persist",
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
