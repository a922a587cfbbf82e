use std::path::PathBuf;

use crate::core::error::VerifyError;
use crate::core::model::VerificationResult;
use crate::export::report::VerificationReport;
use crate::export::{write_artifact, Destination, Exporter};

#[derive(Debug, Clone)]
pub struct ReportExporter {
    destination: Destination,
    include_text: bool,
}

impl ReportExporter {
    pub fn new(out_dir: PathBuf) -> Self {
        Self {
            destination: Destination::Dir(out_dir),
            include_text: false,
        }
    }

    pub fn to_file(path: PathBuf) -> Self {
        Self {
            destination: Destination::File(path),
            include_text: false,
        }
    }

    /// Embeds the consensus text in the report.
    pub fn with_text(mut self, include_text: bool) -> Self {
        self.include_text = include_text;
        self
    }

    pub fn render(&self, result: &VerificationResult) -> Result<String, VerifyError> {
        let mut report = VerificationReport::from_result(result);
        if self.include_text {
            report = report.with_consensus_text(result.consensus_text.clone());
        }
        serde_json::to_string_pretty(&report)
            .map_err(|e| VerifyError::json(format!("serializing report for {}", result.source), e))
    }
}

impl Exporter for ReportExporter {
    fn export(&self, result: &VerificationResult) -> Result<PathBuf, VerifyError> {
        let path = self.destination.resolve(&result.source, "json");
        write_artifact(&path, &self.render(result)?)?;
        Ok(path)
    }
}
