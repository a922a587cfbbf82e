use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::core::confidence::round4;
use crate::core::model::{ConsensusDecision, EngineId, PairAgreement, VerificationResult};

/// JSON audit report handed to archival reviewers.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VerificationReport {
    pub source_file: String,
    pub models_used: Vec<EngineId>,
    pub overall_confidence: f64,
    pub total_words: usize,
    pub high_confidence: usize,
    pub medium_confidence: usize,
    pub low_confidence: usize,
    pub disagreement_count: usize,
    /// Engine name to `{success, chars, confidence, error}`, in attempt order.
    pub engine_status: Map<String, Value>,
    pub pair_agreement: Vec<AgreementEntry>,
    pub disagreements: Vec<DisagreementEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consensus_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AgreementEntry {
    pub engines: [EngineId; 2],
    pub agreement: f64,
    pub matched: usize,
    pub compared: usize,
    pub drift_from: Option<usize>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DisagreementEntry {
    pub position: usize,
    /// Every aligned engine's token; empty when that engine's reading ended earlier.
    pub readings: Map<String, Value>,
    pub chosen: Option<String>,
    pub agreement: String,
    pub tier: String,
    pub reason: String,
}

impl VerificationReport {
    pub fn from_result(result: &VerificationResult) -> Self {
        let engine_status = result
            .readings
            .iter()
            .map(|reading| {
                let status = json!({
                    "success": reading.success(),
                    "chars": reading.text.chars().count(),
                    "confidence": round4(reading.confidence),
                    "error": reading.error,
                });
                (reading.engine.to_string(), status)
            })
            .collect();

        Self {
            source_file: result.source.clone(),
            models_used: result.engines.clone(),
            overall_confidence: round4(result.overall_confidence),
            total_words: result.total_positions,
            high_confidence: result.counts.high,
            medium_confidence: result.counts.medium,
            low_confidence: result.counts.low,
            disagreement_count: result.total_disagreements,
            engine_status,
            pair_agreement: result.pair_agreement.iter().map(AgreementEntry::from).collect(),
            disagreements: result.disagreements.iter().map(DisagreementEntry::from).collect(),
            consensus_text: None,
        }
    }

    pub fn with_consensus_text(mut self, text: impl Into<String>) -> Self {
        self.consensus_text = Some(text.into());
        self
    }
}

impl From<&PairAgreement> for AgreementEntry {
    fn from(pair: &PairAgreement) -> Self {
        Self {
            engines: pair.engines,
            agreement: round4(pair.ratio()),
            matched: pair.matched,
            compared: pair.compared,
            drift_from: pair.drift_from,
        }
    }
}

impl From<&ConsensusDecision> for DisagreementEntry {
    fn from(decision: &ConsensusDecision) -> Self {
        let readings = decision
            .readings
            .cells
            .iter()
            .map(|(engine, token)| (engine.to_string(), Value::from(token.as_str())))
            .collect();
        Self {
            position: decision.position,
            readings,
            chosen: decision.chosen.clone(),
            agreement: decision.agreement(),
            tier: decision.tier.as_str().to_string(),
            reason: decision.rationale.to_string(),
        }
    }
}
