use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::core::error::{EngineError, VerifyError};

/// Extensions any adapter can submit, with the MIME type sent upstream.
pub const SUPPORTED_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
    ("tiff", "image/tiff"),
    ("tif", "image/tiff"),
    ("pdf", "application/pdf"),
];

/// Extensions picked up when scanning a batch directory.
pub const BATCH_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tiff", "tif"];

// Vision LLM endpoints only accept these; anything else is sent as JPEG.
const LLM_MEDIA_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

pub fn mime_type_for(path: &Path) -> Option<&'static str> {
    let ext = extension_of(path);
    SUPPORTED_TYPES
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map(|(_, mime)| *mime)
}

pub fn is_batch_candidate(path: &Path) -> bool {
    path.is_file() && BATCH_EXTENSIONS.contains(&extension_of(path).as_str())
}

/// A source image whose format has been validated before any engine runs.
#[derive(Debug, Clone)]
pub struct SourceImage {
    path: PathBuf,
    mime_type: &'static str,
}

impl SourceImage {
    pub fn open(path: &Path) -> Result<Self, VerifyError> {
        let mime_type = mime_type_for(path).ok_or_else(|| VerifyError::UnsupportedSourceFormat {
            path: path.to_path_buf(),
            extension: extension_of(path),
        })?;
        if !path.is_file() {
            return Err(VerifyError::SourceNotFound {
                path: path.to_path_buf(),
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
            mime_type,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    pub fn llm_media_type(&self) -> &'static str {
        if LLM_MEDIA_TYPES.contains(&self.mime_type) {
            self.mime_type
        } else {
            "image/jpeg"
        }
    }

    pub fn size_bytes(&self) -> Result<u64, EngineError> {
        Ok(fs::metadata(&self.path)?.len())
    }

    pub fn base64(&self) -> Result<String, EngineError> {
        let bytes = fs::read(&self.path)?;
        Ok(STANDARD.encode(bytes))
    }
}
