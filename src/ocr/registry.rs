use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{Credentials, VerifierConfig};
use crate::core::error::EngineError;
use crate::core::model::EngineId;
use crate::ocr::docai::AccessToken;
use crate::ocr::{ClaudeClient, DocumentAiClient, DocumentAiConfig, EngineAdapter, GptClient, VisionClient};

/// The adapters available for a run, in configured order.
#[derive(Default)]
pub struct EngineRegistry {
    adapters: Vec<Arc<dyn EngineAdapter>>,
    disabled: Vec<(EngineId, EngineError)>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds one adapter per configured engine. An engine whose credentials
    /// are missing is disabled with a warning and the rest still run.
    pub fn from_config(config: &VerifierConfig, credentials: &Credentials) -> Self {
        let mut registry = Self::new();
        for &engine in &config.engines {
            match build_adapter(engine, config, credentials) {
                Ok(adapter) => {
                    info!(engine = %engine, "engine enabled");
                    registry.register(adapter);
                }
                Err(err) => {
                    warn!(engine = %engine, error = %err, "engine disabled");
                    registry.disabled.push((engine, err));
                }
            }
        }
        registry
    }

    /// Adds an adapter, replacing any already registered under the same id.
    pub fn register(&mut self, adapter: Arc<dyn EngineAdapter>) {
        let id = adapter.id();
        match self.adapters.iter().position(|a| a.id() == id) {
            Some(idx) => self.adapters[idx] = adapter,
            None => self.adapters.push(adapter),
        }
        self.disabled.retain(|(engine, _)| *engine != id);
    }

    pub fn adapters(&self) -> &[Arc<dyn EngineAdapter>] {
        &self.adapters
    }

    pub fn disabled(&self) -> &[(EngineId, EngineError)] {
        &self.disabled
    }

    pub fn engines(&self) -> Vec<EngineId> {
        self.adapters.iter().map(|a| a.id()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn into_adapters(self) -> Vec<Arc<dyn EngineAdapter>> {
        self.adapters
    }
}

fn build_adapter(
    engine: EngineId,
    config: &VerifierConfig,
    credentials: &Credentials,
) -> Result<Arc<dyn EngineAdapter>, EngineError> {
    let settings = config.settings(engine);
    let timeout = config.timeout_for(engine);
    let missing = |detail: &str| EngineError::MissingCredentials {
        engine,
        detail: detail.to_string(),
    };

    let adapter: Arc<dyn EngineAdapter> = match engine {
        EngineId::DocAi => {
            let docai = DocumentAiConfig::from_credentials(credentials)?;
            let token = match &credentials.docai_access_token {
                Some(token) => AccessToken::Static(token.clone()),
                None => AccessToken::Metadata,
            };
            let mut client = DocumentAiClient::new(docai, token, timeout)?
                .with_max_inline_bytes(config.max_inline_bytes)
                .with_language_hints(config.language_hints.clone());
            if let Some(url) = &settings.base_url {
                client = client.with_base_url(url.clone());
            }
            Arc::new(client)
        }
        EngineId::Vision => {
            let key = credentials
                .google_api_key
                .clone()
                .ok_or_else(|| missing("GOOGLE_API_KEY not set"))?;
            let mut client =
                VisionClient::new(key, timeout)?.with_language_hints(config.language_hints.clone());
            if let Some(url) = &settings.base_url {
                client = client.with_base_url(url.clone());
            }
            Arc::new(client)
        }
        EngineId::Claude => {
            let key = credentials
                .anthropic_api_key
                .clone()
                .ok_or_else(|| missing("ANTHROPIC_API_KEY not set"))?;
            let mut client = ClaudeClient::new(key, timeout)?;
            if let Some(model) = &settings.model {
                client = client.with_model(model.clone());
            }
            if let Some(url) = &settings.base_url {
                client = client.with_base_url(url.clone());
            }
            Arc::new(client)
        }
        EngineId::Gpt => {
            let key = credentials
                .openai_api_key
                .clone()
                .ok_or_else(|| missing("OPENAI_API_KEY not set"))?;
            let mut client = GptClient::new(key, timeout)?;
            if let Some(model) = &settings.model {
                client = client.with_model(model.clone());
            }
            if let Some(url) = &settings.base_url {
                client = client.with_base_url(url.clone());
            }
            Arc::new(client)
        }
    };
    Ok(adapter)
}
