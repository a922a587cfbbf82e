use std::path::PathBuf;

use crate::core::error::VerifyError;
use crate::core::model::VerificationResult;
use crate::export::{write_artifact, Destination, Exporter};

/// Writes the consensus text, nothing else.
#[derive(Debug, Clone)]
pub struct TextExporter {
    destination: Destination,
}

impl TextExporter {
    pub fn new(out_dir: PathBuf) -> Self {
        Self {
            destination: Destination::Dir(out_dir),
        }
    }

    pub fn to_file(path: PathBuf) -> Self {
        Self {
            destination: Destination::File(path),
        }
    }
}

impl Exporter for TextExporter {
    fn export(&self, result: &VerificationResult) -> Result<PathBuf, VerifyError> {
        let path = self.destination.resolve(&result.source, "txt");
        write_artifact(&path, &result.consensus_text)?;
        Ok(path)
    }
}
