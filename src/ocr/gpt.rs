use std::time::Duration;

use serde_json::{json, Value};

use crate::core::error::EngineError;
use crate::core::model::EngineId;
use crate::core::source::SourceImage;
use crate::ocr::http::{join_url, ProviderClient};
use crate::ocr::{reject_pdf, EngineAdapter, Recognition, ARCHIVAL_TRANSCRIPTION_PROMPT, LLM_CONFIDENCE};

pub const OPENAI_API_URL: &str = "https://api.openai.com";
pub const DEFAULT_GPT_MODEL: &str = "gpt-4o";
const MAX_TOKENS: u32 = 8192;
const PROVIDER: &str = "OpenAI";

#[derive(Debug, Clone)]
pub struct GptClient {
    api_key: String,
    model: String,
    base_url: String,
    client: ProviderClient,
}

impl GptClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, EngineError> {
        Ok(Self {
            api_key,
            model: DEFAULT_GPT_MODEL.to_string(),
            base_url: OPENAI_API_URL.to_string(),
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

    fn request_body(&self, media_type: &str, data: &str) -> Value {
        json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{
                "role": "user",
                "content": [
                    {
                        "type": "image_url",
                        "image_url": { "url": format!("data:{media_type};base64,{data}") }
                    },
                    { "type": "text", "text": ARCHIVAL_TRANSCRIPTION_PROMPT }
                ]
            }]
        })
    }
}

impl EngineAdapter for GptClient {
    fn id(&self) -> EngineId {
        EngineId::Gpt
    }

    fn recognize(&self, image: &SourceImage) -> Result<Recognition, EngineError> {
        reject_pdf(image)?;
        let body = self.request_body(image.llm_media_type(), &image.base64()?);
        let request = self
            .client
            .http()
            .post(join_url(&self.base_url, "/v1/chat/completions"))
            .bearer_auth(&self.api_key);
        let response = self.client.post_json(request, &body)?;
        parse_response(&response)
    }
}

pub(crate) fn parse_response(response: &Value) -> Result<Recognition, EngineError> {
    let content = response
        .pointer("/choices/0/message/content")
        .ok_or_else(|| EngineError::Parse("response has no choices".into()))?;
    // A refusal comes back with null content.
    let text = content.as_str().unwrap_or_default().trim().to_string();
    Ok(Recognition {
        text,
        confidence: LLM_CONFIDENCE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn parses_first_choice() {
        let recognition = parse_response(&json!({
            "choices": [{ "message": { "role": "assistant", "content": "\nI am well.\n" } }]
        }))
        .unwrap();
        assert_eq!(recognition.text, "I am well.");
        assert_eq!(recognition.confidence, LLM_CONFIDENCE);
        assert!(parse_response(&json!({ "choices": [] })).is_err());
    }

    #[test]
    fn sends_bearer_token_and_data_url() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer sk-openai")
                .body_contains("\"model\":\"gpt-4o\"")
                .body_contains("data:image/png;base64,");
            then.status(200).json_body(json!({
                "choices": [{ "message": { "content": "Dear Mother" } }]
            }));
        });

        let client = GptClient::new("sk-openai".into(), Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.base_url());
        let file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        std::fs::write(file.path(), b"pixels").unwrap();
        let image = SourceImage::open(file.path()).unwrap();
        let reading = client.attempt(&image);

        mock.assert();
        assert_eq!(reading.text, "Dear Mother");
    }

    #[test]
    fn pdf_is_rejected() {
        let client = GptClient::new("k".into(), Duration::from_secs(1)).unwrap();
        let file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        let image = SourceImage::open(file.path()).unwrap();
        assert!(!client.attempt(&image).success());
    }
}
