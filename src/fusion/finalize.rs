use crate::config::{EnginePriority, DEFAULT_DISAGREEMENT_CAP, DEFAULT_OVERRIDE_THRESHOLD};
use crate::core::confidence::{exceeds_threshold, overall_confidence};
use crate::core::model::{
    ConsensusDecision, EngineClass, EngineId, EngineReading, TierCounts, VerificationResult,
};
use crate::fusion::align::Aligner;
use crate::fusion::compare::pair_agreement;
use crate::fusion::resolve::decide;
use crate::fusion::tokenize::tokenize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssemblyPolicy {
    pub trusted_override_threshold: f64,
    pub disagreement_cap: usize,
}

impl Default for AssemblyPolicy {
    fn default() -> Self {
        Self {
            trusted_override_threshold: DEFAULT_OVERRIDE_THRESHOLD,
            disagreement_cap: DEFAULT_DISAGREEMENT_CAP,
        }
    }
}

/// Builds the result for one image from every attempted engine's reading.
pub fn assemble(
    source: &str,
    readings: Vec<EngineReading>,
    aligner: &dyn Aligner,
    priority: &EnginePriority,
    policy: &AssemblyPolicy,
) -> VerificationResult {
    let mut successful: Vec<&EngineReading> = readings.iter().filter(|r| r.success()).collect();
    priority.sort_by_engine(&mut successful, |r| r.engine);

    match successful.as_slice() {
        [] => VerificationResult::empty(source, readings),
        [only] => single_reading(source, only.text.clone(), only.confidence, readings),
        _ => {
            let texts: Vec<(EngineId, &str)> =
                successful.iter().map(|r| (r.engine, r.text.as_str())).collect();
            let trusted = successful
                .iter()
                .find(|r| r.engine.class() == EngineClass::DedicatedOcr)
                .map(|r| r.text.clone());
            let rows = aligner.align(&texts);
            let decisions: Vec<ConsensusDecision> =
                rows.iter().map(|row| decide(row, priority)).collect();
            let mut result = from_decisions(source, decisions, trusted, readings, policy);
            result.pair_agreement = pair_agreement(&rows);
            for pair in &result.pair_agreement {
                if let Some(position) = pair.drift_from {
                    tracing::debug!(
                        source,
                        engines = %format!("{}/{}", pair.engines[0], pair.engines[1]),
                        position,
                        "readings drift out of alignment"
                    );
                }
            }
            result
        }
    }
}

// A lone reading is used verbatim, but nothing corroborates it, so every
// position counts as low.
fn single_reading(
    source: &str,
    text: String,
    confidence: f64,
    readings: Vec<EngineReading>,
) -> VerificationResult {
    let positions = tokenize(&text).len();
    let mut result = VerificationResult::empty(source, readings);
    result.consensus_text = text;
    result.overall_confidence = confidence;
    result.total_positions = positions;
    result.counts = TierCounts {
        low: positions,
        ..TierCounts::default()
    };
    result
}

fn from_decisions(
    source: &str,
    decisions: Vec<ConsensusDecision>,
    trusted_text: Option<String>,
    readings: Vec<EngineReading>,
    policy: &AssemblyPolicy,
) -> VerificationResult {
    let mut counts = TierCounts::default();
    let mut words: Vec<String> = Vec::with_capacity(decisions.len());
    let mut disagreements = Vec::new();
    let mut total_disagreements = 0;
    let total_positions = decisions.len();

    for decision in decisions {
        counts.record(decision.tier);

        let word = decision.chosen.clone().or_else(|| {
            decision
                .readings
                .votes()
                .next()
                .map(|(_, token)| token.to_string())
        });
        words.extend(word);

        if decision.readings.is_disagreement() {
            total_disagreements += 1;
            if disagreements.len() < policy.disagreement_cap {
                disagreements.push(decision);
            }
        }
    }

    let confidence = overall_confidence(&counts);
    let consensus_text = match trusted_text {
        Some(text) if exceeds_threshold(confidence, policy.trusted_override_threshold) => text,
        _ => words.join(" "),
    };

    let mut result = VerificationResult::empty(source, readings);
    result.consensus_text = consensus_text;
    result.overall_confidence = confidence;
    result.total_positions = total_positions;
    result.counts = counts;
    result.disagreements = disagreements;
    result.total_disagreements = total_disagreements;
    result
}
