pub mod claude;
pub mod docai;
pub mod gpt;
pub mod http;
pub mod registry;
pub mod vision;

pub use claude::ClaudeClient;
pub use docai::{DocumentAiClient, DocumentAiConfig};
pub use gpt::GptClient;
pub use registry::EngineRegistry;
pub use vision::VisionClient;

use crate::core::error::EngineError;
use crate::core::model::{EngineId, EngineReading};
use crate::core::source::SourceImage;

/// Vision LLMs give no score of their own.
pub const LLM_CONFIDENCE: f64 = 0.9;

pub const ARCHIVAL_TRANSCRIPTION_PROMPT: &str = "You are reading handwritten text from an archival document image.

TASK: Transcribe EXACTLY what is written in the image.

CRITICAL RULES:
1. Report ONLY what you can see written - no interpretation
2. Preserve the author's spelling, grammar, and punctuation exactly
3. If a word is unclear, write [unclear]
4. If text is illegible, write [illegible]
5. Do NOT guess, fill in, or \"fix\" anything
6. Do NOT add explanations or commentary
7. Preserve line breaks and paragraph structure

OUTPUT: Provide ONLY the transcribed text, nothing else.";

#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    pub text: String,
    pub confidence: f64,
}

/// One recognition engine behind a uniform capability.
pub trait EngineAdapter: Send + Sync {
    fn id(&self) -> EngineId;

    fn recognize(&self, image: &SourceImage) -> Result<Recognition, EngineError>;

    /// Never fails: any error becomes an unsuccessful reading.
    fn attempt(&self, image: &SourceImage) -> EngineReading {
        match self.recognize(image) {
            Ok(recognition) => {
                EngineReading::succeeded(self.id(), recognition.text, recognition.confidence)
            }
            Err(err) => EngineReading::failed(self.id(), err),
        }
    }
}

pub(crate) fn reject_pdf(image: &SourceImage) -> Result<(), EngineError> {
    if image.mime_type() == "application/pdf" {
        return Err(EngineError::Unsupported(image.mime_type().to_string()));
    }
    Ok(())
}
