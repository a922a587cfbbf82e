use std::time::Duration;

use serde_json::{json, Value};

use crate::config::{Credentials, DEFAULT_MAX_INLINE_BYTES};
use crate::core::error::EngineError;
use crate::core::model::EngineId;
use crate::core::source::SourceImage;
use crate::ocr::http::{join_url, ProviderClient};
use crate::ocr::vision::mean;
use crate::ocr::{EngineAdapter, Recognition};

const PROVIDER: &str = "Document AI";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentAiConfig {
    pub project_id: String,
    pub location: String,
    pub processor_id: String,
}

impl DocumentAiConfig {
    pub fn from_credentials(credentials: &Credentials) -> Result<Self, EngineError> {
        let missing = |detail: &str| EngineError::MissingCredentials {
            engine: EngineId::DocAi,
            detail: detail.to_string(),
        };
        Ok(Self {
            project_id: credentials
                .docai_project_id
                .clone()
                .ok_or_else(|| missing("DOCUMENTAI_PROJECT_ID not set"))?,
            location: credentials
                .docai_location
                .clone()
                .unwrap_or_else(|| "us".to_string()),
            processor_id: credentials
                .docai_processor_id
                .clone()
                .ok_or_else(|| missing("DOCUMENTAI_PROCESSOR_ID not set"))?,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("https://{}-documentai.googleapis.com", self.location)
    }

    pub fn processor_name(&self) -> String {
        format!(
            "projects/{}/locations/{}/processors/{}",
            self.project_id, self.location, self.processor_id
        )
    }
}

/// Where the bearer token comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessToken {
    Static(String),
    /// Fetched per call from the GCE metadata server.
    Metadata,
}

/// Google Cloud Document AI OCR processor, inline document upload.
#[derive(Debug, Clone)]
pub struct DocumentAiClient {
    config: DocumentAiConfig,
    token: AccessToken,
    base_url: String,
    metadata_url: String,
    metadata_timeout: Duration,
    max_inline_bytes: u64,
    language_hints: Vec<String>,
    client: ProviderClient,
}

impl DocumentAiClient {
    pub fn new(
        config: DocumentAiConfig,
        token: AccessToken,
        timeout: Duration,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            base_url: config.endpoint(),
            config,
            token,
            metadata_url: METADATA_TOKEN_URL.to_string(),
            metadata_timeout: METADATA_TIMEOUT,
            max_inline_bytes: DEFAULT_MAX_INLINE_BYTES,
            language_hints: Vec::new(),
            client: ProviderClient::new(PROVIDER, timeout)?,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_metadata_url(mut self, url: impl Into<String>) -> Self {
        self.metadata_url = url.into();
        self
    }

    pub fn with_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = timeout;
        self
    }

    pub fn with_max_inline_bytes(mut self, bytes: u64) -> Self {
        self.max_inline_bytes = bytes;
        self
    }

    pub fn with_language_hints(mut self, hints: Vec<String>) -> Self {
        self.language_hints = hints;
        self
    }

    fn access_token(&self) -> Result<String, EngineError> {
        match &self.token {
            AccessToken::Static(token) => Ok(token.clone()),
            AccessToken::Metadata => {
                let request = self
                    .client
                    .http()
                    .get(&self.metadata_url)
                    .header("Metadata-Flavor", "Google")
                    .timeout(self.metadata_timeout);
                let response = self.client.get_json(request).map_err(|err| match err {
                    EngineError::Timeout(_) => EngineError::Timeout(self.metadata_timeout),
                    other => other,
                })?;
                response
                    .get("access_token")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| EngineError::Parse("metadata token response lacks access_token".into()))
            }
        }
    }

    fn request_body(&self, content: String, mime_type: &str) -> Value {
        let mut body = json!({
            "rawDocument": { "content": content, "mimeType": mime_type },
            "processOptions": {
                "ocrConfig": {
                    "enableNativePdfParsing": true,
                    "enableImageQualityScores": true
                }
            }
        });
        if !self.language_hints.is_empty() {
            body["processOptions"]["ocrConfig"]["hints"] =
                json!({ "languageHints": self.language_hints });
        }
        body
    }
}

impl EngineAdapter for DocumentAiClient {
    fn id(&self) -> EngineId {
        EngineId::DocAi
    }

    fn recognize(&self, image: &SourceImage) -> Result<Recognition, EngineError> {
        let size = image.size_bytes()?;
        if size > self.max_inline_bytes {
            return Err(EngineError::TooLarge {
                size_mb: size as f64 / 1024.0 / 1024.0,
                max_mb: self.max_inline_bytes / 1024 / 1024,
            });
        }

        let body = self.request_body(image.base64()?, image.mime_type());
        let token = self.access_token()?;
        let url = join_url(
            &self.base_url,
            &format!("/v1/{}:process", self.config.processor_name()),
        );
        let response = self
            .client
            .post_json(self.client.http().post(url).bearer_auth(token), &body)?;
        parse_response(&response)
    }
}

/// Text is the document text; confidence is the mean page confidence.
pub(crate) fn parse_response(response: &Value) -> Result<Recognition, EngineError> {
    let document = response
        .get("document")
        .ok_or_else(|| EngineError::Parse("response has no document".into()))?;
    let text = document
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let confidences: Vec<f64> = document
        .get("pages")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|page| page.get("confidence").and_then(Value::as_f64))
        .collect();
    Ok(Recognition {
        text,
        confidence: mean(&confidences),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn config() -> DocumentAiConfig {
        DocumentAiConfig {
            project_id: "archive-123".into(),
            location: "eu".into(),
            processor_id: "abc".into(),
        }
    }

    fn image() -> (tempfile::NamedTempFile, SourceImage) {
        let file = tempfile::Builder::new().suffix(".tif").tempfile().unwrap();
        std::fs::write(file.path(), vec![0u8; 2048]).unwrap();
        let image = SourceImage::open(file.path()).unwrap();
        (file, image)
    }

    #[test]
    fn config_requires_project_and_processor() {
        let err = DocumentAiConfig::from_credentials(&Credentials::default()).unwrap_err();
        assert!(err.to_string().contains("DOCUMENTAI_PROJECT_ID"));

        let creds = Credentials {
            docai_project_id: Some("p".into()),
            docai_processor_id: Some("x".into()),
            ..Credentials::default()
        };
        let config = DocumentAiConfig::from_credentials(&creds).unwrap();
        assert_eq!(config.location, "us");
        assert_eq!(config.endpoint(), "https://us-documentai.googleapis.com");
        assert_eq!(config.processor_name(), "projects/p/locations/us/processors/x");
    }

    #[test]
    fn parses_document_text_and_page_confidence() {
        let recognition = parse_response(&json!({
            "document": {
                "text": "12 maja 1943",
                "pages": [{ "confidence": 0.95 }, { "confidence": 0.85 }]
            }
        }))
        .unwrap();
        assert_eq!(recognition.text, "12 maja 1943");
        assert!((recognition.confidence - 0.9).abs() < 1e-9);
        assert!(parse_response(&json!({})).is_err());
    }

    #[test]
    fn posts_inline_document_with_bearer_token() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/projects/archive-123/locations/eu/processors/abc:process")
                .header("authorization", "Bearer tok")
                .body_contains("image/tiff");
            then.status(200).json_body(json!({
                "document": { "text": "Dear Mother", "pages": [{ "confidence": 0.97 }] }
            }));
        });

        let client = DocumentAiClient::new(config(), AccessToken::Static("tok".into()), Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.base_url());
        let (_file, image) = image();
        let reading = client.attempt(&image);

        mock.assert();
        assert_eq!(reading.text, "Dear Mother");
        assert!((reading.confidence - 0.97).abs() < 1e-9);
    }

    #[test]
    fn fetches_token_from_metadata_server() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/token")
                .header("Metadata-Flavor", "Google");
            then.status(200)
                .json_body(json!({ "access_token": "meta-tok", "expires_in": 3599 }));
        });
        let process = server.mock(|when, then| {
            when.method(POST).header("authorization", "Bearer meta-tok");
            then.status(200).json_body(json!({ "document": { "text": "ok" } }));
        });

        let client = DocumentAiClient::new(config(), AccessToken::Metadata, Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.base_url())
            .with_metadata_url(server.url("/token"));
        let (_file, image) = image();
        assert_eq!(client.attempt(&image).text, "ok");
        process.assert();
    }

    #[test]
    fn slow_metadata_server_reports_its_own_timeout() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/token");
            then.status(200)
                .delay(Duration::from_millis(1500))
                .json_body(json!({ "access_token": "late" }));
        });

        let client = DocumentAiClient::new(config(), AccessToken::Metadata, Duration::from_secs(30))
            .unwrap()
            .with_base_url(server.base_url())
            .with_metadata_url(server.url("/token"))
            .with_metadata_timeout(Duration::from_millis(200));
        let (_file, image) = image();

        match client.recognize(&image) {
            Err(EngineError::Timeout(elapsed)) => assert_eq!(elapsed, Duration::from_millis(200)),
            other => panic!("expected a metadata timeout, got {other:?}"),
        }
    }

    #[test]
    fn oversized_document_fails_before_upload() {
        let client = DocumentAiClient::new(config(), AccessToken::Static("t".into()), Duration::from_secs(1))
            .unwrap()
            .with_base_url("http://127.0.0.1:9")
            .with_max_inline_bytes(1024);
        let (_file, image) = image();
        let reading = client.attempt(&image);
        assert!(!reading.success());
        assert!(reading.error.unwrap().starts_with("file too large"));
    }
}
