pub mod json_export;
pub mod report;
pub mod text_export;

use std::path::{Path, PathBuf};

use crate::core::error::VerifyError;
use crate::core::model::VerificationResult;

pub use json_export::ReportExporter;
pub use report::VerificationReport;
pub use text_export::TextExporter;

pub trait Exporter {
    /// Writes one artifact for `result` and returns where it landed.
    fn export(&self, result: &VerificationResult) -> Result<PathBuf, VerifyError>;
}

/// Output location: a directory receiving `<stem>.<ext>` or one explicit file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Dir(PathBuf),
    File(PathBuf),
}

impl Destination {
    pub(crate) fn resolve(&self, source: &str, extension: &str) -> PathBuf {
        match self {
            Destination::File(path) => path.clone(),
            Destination::Dir(dir) => {
                let stem = Path::new(source)
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_else(|| source.to_string());
                dir.join(format!("{stem}.{extension}"))
            }
        }
    }
}

pub(crate) fn write_artifact(path: &Path, contents: &str) -> Result<(), VerifyError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| VerifyError::io(format!("creating {}", parent.display()), e))?;
    }
    std::fs::write(path, contents)
        .map_err(|e| VerifyError::io(format!("writing {}", path.display()), e))
}
