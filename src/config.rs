use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::VerifyError;
use crate::core::model::EngineId;

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_ENGINE_TIMEOUT_SECS: u64 = 120;
pub const DOCAI_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_DISAGREEMENT_CAP: usize = 50;
pub const DEFAULT_OVERRIDE_THRESHOLD: f64 = 0.8;
pub const DEFAULT_MAX_INLINE_BYTES: u64 = 20 * 1024 * 1024;

/// Per-engine endpoint overrides, mostly useful for proxies and tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Immutable verifier configuration, fixed at construction time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct VerifierConfig {
    /// Enabled engines in adapter order.
    pub engines: Vec<EngineId>,
    /// Size of the shared pool; caps concurrent engine calls across all images.
    pub workers: usize,
    /// Document AI gets a longer timeout while this stays at its default.
    pub engine_timeout_secs: u64,
    pub disagreement_cap: usize,
    pub trusted_override_threshold: f64,
    pub max_inline_bytes: u64,
    pub language_hints: Vec<String>,
    pub docai: EngineSettings,
    pub vision: EngineSettings,
    pub claude: EngineSettings,
    pub gpt: EngineSettings,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            engines: EngineId::ALL.to_vec(),
            workers: DEFAULT_WORKERS,
            engine_timeout_secs: DEFAULT_ENGINE_TIMEOUT_SECS,
            disagreement_cap: DEFAULT_DISAGREEMENT_CAP,
            trusted_override_threshold: DEFAULT_OVERRIDE_THRESHOLD,
            max_inline_bytes: DEFAULT_MAX_INLINE_BYTES,
            language_hints: Vec::new(),
            docai: EngineSettings::default(),
            vision: EngineSettings::default(),
            claude: EngineSettings::default(),
            gpt: EngineSettings::default(),
        }
    }
}

impl VerifierConfig {
    pub fn load(path: &Path) -> Result<Self, VerifyError> {
        let data = fs::read_to_string(path)
            .map_err(|e| VerifyError::io(format!("reading {}", path.display()), e))?;
        Self::from_toml(&data)
    }

    pub fn from_toml(data: &str) -> Result<Self, VerifyError> {
        let config: Self = toml::from_str(data).map_err(|e| VerifyError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), VerifyError> {
        if self.workers == 0 {
            return Err(VerifyError::config("workers must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.trusted_override_threshold) {
            return Err(VerifyError::config(
                "trusted_override_threshold must be within [0, 1]",
            ));
        }
        for (idx, engine) in self.engines.iter().enumerate() {
            if self.engines[..idx].contains(engine) {
                return Err(VerifyError::config(format!("engine '{engine}' listed twice")));
            }
        }
        Ok(())
    }

    pub fn settings(&self, engine: EngineId) -> &EngineSettings {
        match engine {
            EngineId::DocAi => &self.docai,
            EngineId::Vision => &self.vision,
            EngineId::Claude => &self.claude,
            EngineId::Gpt => &self.gpt,
        }
    }

    pub fn timeout_for(&self, engine: EngineId) -> Duration {
        let secs = self.settings(engine).timeout_secs.unwrap_or(match engine {
            EngineId::DocAi if self.engine_timeout_secs == DEFAULT_ENGINE_TIMEOUT_SECS => {
                DOCAI_TIMEOUT_SECS
            }
            _ => self.engine_timeout_secs,
        });
        Duration::from_secs(secs)
    }

    pub fn priority(&self) -> EnginePriority {
        EnginePriority::from_configured(&self.engines)
    }
}

/// Fixed engine ranking: dedicated OCR before vision LLMs, configured order
/// within a class. Unconfigured engines rank last within their class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnginePriority {
    order: Vec<EngineId>,
}

impl EnginePriority {
    pub fn from_configured(engines: &[EngineId]) -> Self {
        let mut order: Vec<EngineId> = Vec::with_capacity(EngineId::ALL.len());
        for engine in engines {
            if !order.contains(engine) {
                order.push(*engine);
            }
        }
        for engine in EngineId::ALL {
            if !order.contains(&engine) {
                order.push(engine);
            }
        }
        order.sort_by_key(|engine| engine.class());
        Self { order }
    }

    pub fn order(&self) -> &[EngineId] {
        &self.order
    }

    pub fn rank(&self, engine: EngineId) -> usize {
        self.order
            .iter()
            .position(|candidate| *candidate == engine)
            .unwrap_or(self.order.len())
    }

    pub fn sort_by_engine<T>(&self, items: &mut [T], engine_of: impl Fn(&T) -> EngineId) {
        items.sort_by_key(|item| self.rank(engine_of(item)));
    }
}

impl Default for EnginePriority {
    fn default() -> Self {
        Self::from_configured(&EngineId::ALL)
    }
}

/// Credentials resolved from the environment. Absent values disable the
/// matching engine instead of failing the run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    pub google_api_key: Option<String>,
    pub docai_project_id: Option<String>,
    pub docai_location: Option<String>,
    pub docai_processor_id: Option<String>,
    pub docai_access_token: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            google_api_key: get("GOOGLE_API_KEY"),
            docai_project_id: get("DOCUMENTAI_PROJECT_ID"),
            docai_location: get("DOCUMENTAI_LOCATION"),
            docai_processor_id: get("DOCUMENTAI_PROCESSOR_ID"),
            docai_access_token: get("DOCUMENTAI_ACCESS_TOKEN"),
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            openai_api_key: get("OPENAI_API_KEY"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_enables_all_engines() {
        let config = VerifierConfig::default();
        assert_eq!(config.engines, EngineId::ALL.to_vec());
        assert_eq!(config.disagreement_cap, 50);
        assert_eq!(config.timeout_for(EngineId::Claude), Duration::from_secs(120));
        assert_eq!(config.timeout_for(EngineId::DocAi), Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_toml_with_overrides() {
        let config = VerifierConfig::from_toml(
            r#"
            engines = ["vision", "claude"]
            workers = 2
            language_hints = ["pl", "yi"]

            [claude]
            model = "claude-opus-4-1"
            timeout_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.engines, vec![EngineId::Vision, EngineId::Claude]);
        assert_eq!(config.workers, 2);
        assert_eq!(config.claude.model.as_deref(), Some("claude-opus-4-1"));
        assert_eq!(config.timeout_for(EngineId::Claude), Duration::from_secs(30));
        assert_eq!(config.trusted_override_threshold, 0.8);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(VerifierConfig::from_toml("workers = 0").is_err());
        assert!(VerifierConfig::from_toml("trusted_override_threshold = 1.5").is_err());
        assert!(VerifierConfig::from_toml(r#"engines = ["gpt", "gpt"]"#).is_err());
        assert!(VerifierConfig::from_toml(r#"engines = ["tesseract"]"#).is_err());
        assert!(VerifierConfig::from_toml("unknown_key = 1").is_err());
    }

    #[test]
    fn priority_puts_dedicated_ocr_first_and_keeps_configured_order() {
        let priority = EnginePriority::from_configured(&[
            EngineId::Gpt,
            EngineId::Vision,
            EngineId::Claude,
            EngineId::DocAi,
        ]);
        assert_eq!(
            priority.order(),
            &[EngineId::Vision, EngineId::DocAi, EngineId::Gpt, EngineId::Claude]
        );
        assert_eq!(priority.rank(EngineId::Vision), 0);
    }

    #[test]
    fn unconfigured_engines_rank_last_within_their_class() {
        let priority = EnginePriority::from_configured(&[EngineId::Gpt, EngineId::Vision]);
        assert_eq!(
            priority.order(),
            &[EngineId::Vision, EngineId::DocAi, EngineId::Gpt, EngineId::Claude]
        );
    }

    #[test]
    fn unconfigured_ocr_engine_still_outranks_configured_llm() {
        let priority = EnginePriority::from_configured(&[EngineId::Claude]);
        assert!(priority.rank(EngineId::DocAi) < priority.rank(EngineId::Claude));
        assert!(priority.rank(EngineId::Vision) < priority.rank(EngineId::Claude));
        assert_eq!(
            priority.order(),
            &[EngineId::DocAi, EngineId::Vision, EngineId::Claude, EngineId::Gpt]
        );
    }

    #[test]
    fn lowered_engine_timeout_applies_to_docai() {
        let config = VerifierConfig::from_toml("engine_timeout_secs = 60").unwrap();
        assert_eq!(config.timeout_for(EngineId::DocAi), Duration::from_secs(60));
        assert_eq!(config.timeout_for(EngineId::Vision), Duration::from_secs(60));

        let config = VerifierConfig::from_toml(
            r#"
            engine_timeout_secs = 60

            [docai]
            timeout_secs = 90
            "#,
        )
        .unwrap();
        assert_eq!(config.timeout_for(EngineId::DocAi), Duration::from_secs(90));
    }

    #[test]
    fn credentials_ignore_blank_values() {
        let creds = Credentials::from_lookup(|key| match key {
            "GOOGLE_API_KEY" => Some("abc".to_string()),
            "OPENAI_API_KEY" => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(creds.google_api_key.as_deref(), Some("abc"));
        assert!(creds.openai_api_key.is_none());
        assert!(creds.anthropic_api_key.is_none());
    }
}
