//! Pipeline error kinds.

use crate::settings::{Provider, Role};

/// Errors that abort a pipeline run.
///
/// QA failures are not errors; they are reported in the QA summary text.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Missing key, unknown provider name, unreadable settings file.
    /// Always raised before any model call.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{role} call to {provider} failed")]
    ModelCall {
        role: Role,
        provider: Provider,
        #[source]
        source: anyhow::Error,
    },

    /// Developer output did not pass the compile-check.
    #[error("generated code failed syntax validation:\n{output}")]
    SyntaxValidation { output: String },

    #[error("I/O error")]
    Io(#[source] anyhow::Error),
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        PipelineError::Configuration(msg.into())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::Io(e.into())
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
