use std::time::Duration;

use serde_json::{json, Value};

use crate::core::error::EngineError;
use crate::core::model::EngineId;
use crate::core::source::SourceImage;
use crate::ocr::http::{join_url, ProviderClient};
use crate::ocr::{reject_pdf, EngineAdapter, Recognition, ARCHIVAL_TRANSCRIPTION_PROMPT, LLM_CONFIDENCE};

pub const ANTHROPIC_API_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-20250514";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 8192;
const PROVIDER: &str = "Anthropic";

/// Claude vision transcription through the Messages API.
#[derive(Debug, Clone)]
pub struct ClaudeClient {
    api_key: String,
    model: String,
    base_url: String,
    client: ProviderClient,
}

impl ClaudeClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, EngineError> {
        Ok(Self {
            api_key,
            model: DEFAULT_CLAUDE_MODEL.to_string(),
            base_url: ANTHROPIC_API_URL.to_string(),
            client: ProviderClient::new(PROVIDER, timeout)?,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request_body(&self, media_type: &str, data: String) -> Value {
        json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{
                "role": "user",
                "content": [
                    {
                        "type": "image",
                        "source": { "type": "base64", "media_type": media_type, "data": data }
                    },
                    { "type": "text", "text": ARCHIVAL_TRANSCRIPTION_PROMPT }
                ]
            }]
        })
    }
}

impl EngineAdapter for ClaudeClient {
    fn id(&self) -> EngineId {
        EngineId::Claude
    }

    fn recognize(&self, image: &SourceImage) -> Result<Recognition, EngineError> {
        reject_pdf(image)?;
        let body = self.request_body(image.llm_media_type(), image.base64()?);
        let request = self
            .client
            .http()
            .post(join_url(&self.base_url, "/v1/messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);
        let response = self.client.post_json(request, &body)?;
        parse_response(&response)
    }
}

pub(crate) fn parse_response(response: &Value) -> Result<Recognition, EngineError> {
    let block = response
        .pointer("/content/0")
        .ok_or_else(|| EngineError::Parse("response has no content".into()))?;
    if block.get("type").and_then(Value::as_str) != Some("text") {
        return Err(EngineError::Parse("first content block is not text".into()));
    }
    let text = block
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    Ok(Recognition {
        text,
        confidence: LLM_CONFIDENCE,
    })
}
