use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::core::model::{EngineId, VerificationResult};

/// Per-image failures surfaced to callers.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("source image not found: {}", path.display())]
    SourceNotFound { path: PathBuf },
    #[error("unsupported source format '{extension}' for {}", path.display())]
    UnsupportedSourceFormat { path: PathBuf, extension: String },
    #[error("no OCR engines available for {source_id}")]
    NoEnginesAvailable {
        source_id: String,
        result: Box<VerificationResult>,
    },
    #[error("verification cancelled before {} started", path.display())]
    Cancelled { path: PathBuf },
    #[error("invalid configuration: {message}")]
    Config { message: String },
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error while {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl VerifyError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// The empty, zero-confidence result attached to the failure, if any.
    pub fn result(&self) -> Option<&VerificationResult> {
        match self {
            VerifyError::NoEnginesAvailable { result, .. } => Some(result),
            _ => None,
        }
    }
}

/// Why one adapter could not produce a reading. Always folded into a failed
/// `EngineReading`; never returned from the pipeline.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{engine} not configured: {detail}")]
    MissingCredentials { engine: EngineId, detail: String },
    #[error("connection failed: {0}")]
    Network(String),
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("{provider} API error {status}: {message}")]
    Http {
        provider: &'static str,
        status: u16,
        message: String,
    },
    #[error("{provider} API error: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },
    #[error("malformed response: {0}")]
    Parse(String),
    #[error("unsupported file type: {0}")]
    Unsupported(String),
    #[error("file too large: {size_mb:.1}MB (max {max_mb}MB)")]
    TooLarge { size_mb: f64, max_mb: u64 },
    #[error("could not read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("adapter panicked: {0}")]
    Panicked(String),
}
