//! Error types for ludusavi-restic

use thiserror::Error;

/// Main error type for ludusavi-restic operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unexpected {context} output: {source}")]
    Schema {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Environment not set up: {0}")]
    Config(String),

    #[error("Could not find {program}")]
    ExecutableNotFound { program: String, hint: String },

    #[error("{program} exited with {}: {stderr}", exit_label(.code))]
    CommandFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl Error {
    /// Remediation shown to the user below the error message, if any.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Error::Config(_) => Some("Copy .env.example to .env and edit it"),
            Error::ExecutableNotFound { hint, .. } => Some(hint),
            _ => None,
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// Result type alias for ludusavi-restic operations
pub type Result<T> = std::result::Result<T, Error>;
