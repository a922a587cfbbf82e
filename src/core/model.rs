use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum EngineClass {
    DedicatedOcr,
    VisionLlm,
}

impl EngineClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineClass::DedicatedOcr => "dedicated-ocr",
            EngineClass::VisionLlm => "vision-llm",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum EngineId {
    DocAi,
    Vision,
    Claude,
    Gpt,
}

impl EngineId {
    pub const ALL: [EngineId; 4] = [EngineId::DocAi, EngineId::Vision, EngineId::Claude, EngineId::Gpt];

    pub fn class(&self) -> EngineClass {
        match self {
            EngineId::DocAi | EngineId::Vision => EngineClass::DedicatedOcr,
            EngineId::Claude | EngineId::Gpt => EngineClass::VisionLlm,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineId::DocAi => "docai",
            EngineId::Vision => "vision",
            EngineId::Claude => "claude",
            EngineId::Gpt => "gpt",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            EngineId::DocAi => "Document AI",
            EngineId::Vision => "Vision API",
            EngineId::Claude => "Claude Vision",
            EngineId::Gpt => "GPT Vision",
        }
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "docai" => Ok(EngineId::DocAi),
            "vision" => Ok(EngineId::Vision),
            "claude" => Ok(EngineId::Claude),
            "gpt" => Ok(EngineId::Gpt),
            other => Err(format!(
                "unknown engine '{other}' (valid: docai, vision, claude, gpt)"
            )),
        }
    }
}

/// One engine's answer for one image. Never mutated after the adapter returns it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineReading {
    pub engine: EngineId,
    pub text: String,
    pub confidence: f64,
    pub error: Option<String>,
}

impl EngineReading {
    pub fn succeeded(engine: EngineId, text: String, confidence: f64) -> Self {
        Self {
            engine,
            text,
            confidence: confidence.clamp(0.0, 1.0),
            error: None,
        }
    }

    pub fn failed(engine: EngineId, error: impl fmt::Display) -> Self {
        Self {
            engine,
            text: String::new(),
            confidence: 0.0,
            error: Some(error.to_string()),
        }
    }

    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub index: usize,
}

/// Per-engine tokens at one shared position. Cells keep engine priority order;
/// an empty token means the engine's sequence ended before this position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlignmentRow {
    pub position: usize,
    pub cells: Vec<(EngineId, String)>,
}

impl AlignmentRow {
    pub fn get(&self, engine: EngineId) -> Option<&str> {
        self.cells
            .iter()
            .find(|(id, _)| *id == engine)
            .map(|(_, token)| token.as_str())
    }

    pub fn votes(&self) -> impl Iterator<Item = (EngineId, &str)> {
        self.cells
            .iter()
            .filter(|(_, token)| !token.is_empty())
            .map(|(id, token)| (*id, token.as_str()))
    }

    pub fn distinct_tokens(&self) -> usize {
        let mut seen: Vec<&str> = Vec::new();
        for (_, token) in self.votes() {
            if !seen.contains(&token) {
                seen.push(token);
            }
        }
        seen.len()
    }

    pub fn is_disagreement(&self) -> bool {
        self.distinct_tokens() > 1
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    High,
    Medium,
    Low,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::High => "high",
            Tier::Medium => "medium",
            Tier::Low => "low",
        }
    }
}

/// Why a position landed in its tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rationale {
    NoReadings,
    Unanimous { voters: usize },
    Majority { engines: Vec<EngineId> },
    OcrAgree,
    LlmAgree,
    SplitVote,
    NoConsensus,
}

impl fmt::Display for Rationale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rationale::NoReadings => f.write_str("no readings"),
            Rationale::Unanimous { voters } => write!(f, "all {voters} models agree"),
            Rationale::Majority { engines } => {
                let names = engines
                    .iter()
                    .map(EngineId::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "majority agreement ({names})")
            }
            Rationale::OcrAgree => f.write_str("OCR engines agree, LLMs differ"),
            Rationale::LlmAgree => f.write_str("LLMs agree, OCR engines differ"),
            Rationale::SplitVote => f.write_str("split vote – majority wins"),
            Rationale::NoConsensus => f.write_str("no consensus – flagged for human review"),
        }
    }
}

impl Serialize for Rationale {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConsensusDecision {
    pub position: usize,
    pub readings: AlignmentRow,
    pub chosen: Option<String>,
    pub agreeing: usize,
    pub voters: usize,
    pub tier: Tier,
    pub rationale: Rationale,
}

impl ConsensusDecision {
    pub fn agreement(&self) -> String {
        format!("{}/{}", self.agreeing, self.voters)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl TierCounts {
    pub fn record(&mut self, tier: Tier) {
        match tier {
            Tier::High => self.high += 1,
            Tier::Medium => self.medium += 1,
            Tier::Low => self.low += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }
}

/// How closely two engines' aligned tokens track each other.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PairAgreement {
    pub engines: [EngineId; 2],
    /// Positions where both engines read the same token.
    pub matched: usize,
    /// Positions where at least one of the two has a token.
    pub compared: usize,
    /// Where one reading slid a word out of step and never recovered.
    pub drift_from: Option<usize>,
}

impl PairAgreement {
    pub fn ratio(&self) -> f64 {
        if self.compared == 0 {
            0.0
        } else {
            self.matched as f64 / self.compared as f64
        }
    }
}

/// Terminal artifact for one image.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VerificationResult {
    pub source: String,
    pub engines: Vec<EngineId>,
    pub consensus_text: String,
    pub overall_confidence: f64,
    pub total_positions: usize,
    pub counts: TierCounts,
    /// Capped, in position order.
    pub disagreements: Vec<ConsensusDecision>,
    /// Uncapped number of disagreeing positions.
    pub total_disagreements: usize,
    /// Every pair of successful engines, in priority order.
    pub pair_agreement: Vec<PairAgreement>,
    pub readings: Vec<EngineReading>,
}

impl VerificationResult {
    pub fn empty(source: impl Into<String>, readings: Vec<EngineReading>) -> Self {
        Self {
            source: source.into(),
            engines: readings.iter().map(|r| r.engine).collect(),
            consensus_text: String::new(),
            overall_confidence: 0.0,
            total_positions: 0,
            counts: TierCounts::default(),
            disagreements: Vec::new(),
            total_disagreements: 0,
            pair_agreement: Vec::new(),
            readings,
        }
    }

    pub fn reading(&self, engine: EngineId) -> Option<&EngineReading> {
        self.readings.iter().find(|r| r.engine == engine)
    }

    pub fn successful(&self) -> impl Iterator<Item = &EngineReading> {
        self.readings.iter().filter(|r| r.success())
    }
}
