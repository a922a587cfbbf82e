use std::time::Duration;

use serde_json::{json, Value};

use crate::core::error::EngineError;
use crate::core::model::EngineId;
use crate::core::source::SourceImage;
use crate::ocr::http::{join_url, ProviderClient};
use crate::ocr::{reject_pdf, EngineAdapter, Recognition};

pub const VISION_API_URL: &str = "https://vision.googleapis.com";
const PROVIDER: &str = "Vision";

/// Google Cloud Vision `DOCUMENT_TEXT_DETECTION`.
#[derive(Debug, Clone)]
pub struct VisionClient {
    api_key: String,
    base_url: String,
    language_hints: Vec<String>,
    client: ProviderClient,
}

impl VisionClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, EngineError> {
        Ok(Self {
            api_key,
            base_url: VISION_API_URL.to_string(),
            language_hints: Vec::new(),
            client: ProviderClient::new(PROVIDER, timeout)?,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_language_hints(mut self, hints: Vec<String>) -> Self {
        self.language_hints = hints;
        self
    }

    fn request_body(&self, content: String) -> Value {
        let mut request = json!({
            "image": { "content": content },
            "features": [{ "type": "DOCUMENT_TEXT_DETECTION", "maxResults": 1 }]
        });
        if !self.language_hints.is_empty() {
            request["imageContext"] = json!({ "languageHints": self.language_hints });
        }
        json!({ "requests": [request] })
    }
}

impl EngineAdapter for VisionClient {
    fn id(&self) -> EngineId {
        EngineId::Vision
    }

    fn recognize(&self, image: &SourceImage) -> Result<Recognition, EngineError> {
        reject_pdf(image)?;
        let body = self.request_body(image.base64()?);
        let url = join_url(&self.base_url, "/v1/images:annotate");
        let request = self
            .client
            .http()
            .post(url)
            .query(&[("key", self.api_key.as_str())]);
        let response = self.client.post_json(request, &body)?;
        parse_response(&response)
    }
}

/// Text is the full annotation; confidence is the mean block confidence.
pub(crate) fn parse_response(response: &Value) -> Result<Recognition, EngineError> {
    let Some(first) = response
        .get("responses")
        .and_then(Value::as_array)
        .and_then(|responses| responses.first())
    else {
        return Ok(Recognition {
            text: String::new(),
            confidence: 0.0,
        });
    };

    if let Some(error) = first.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(EngineError::Provider {
            provider: PROVIDER,
            message,
        });
    }

    let annotation = first.get("fullTextAnnotation");
    let text = annotation
        .and_then(|a| a.get("text"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let confidences: Vec<f64> = annotation
        .and_then(|a| a.get("pages"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|page| page.get("blocks").and_then(Value::as_array))
        .flatten()
        .filter_map(|block| block.get("confidence").and_then(Value::as_f64))
        .collect();

    Ok(Recognition {
        text,
        confidence: mean(&confidences),
    })
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
