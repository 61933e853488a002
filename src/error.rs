use std::num::ParseIntError;
use thiserror::Error;

/// Result type for ring pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while building or running a pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// No stages in pipeline
    #[error("Cannot start pipeline with no stages")]
    NoStages,

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A worker thread panicked or could not be spawned
    #[error("Thread error: {0}")]
    ThreadError(String),

    /// A console line that is neither an integer nor the exit command
    #[error("only integers are accepted, got {line:?}")]
    MalformedInput {
        line: String,
        #[source]
        source: ParseIntError,
    },
}
