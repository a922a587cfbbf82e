pub mod align;
pub mod compare;
pub mod finalize;
pub mod resolve;
pub mod tokenize;

use crate::config::{EnginePriority, VerifierConfig};
use crate::core::model::{EngineReading, VerificationResult};
use align::{Aligner, PositionalAligner};
use finalize::{assemble, AssemblyPolicy};

pub trait ConsensusEngine: Send + Sync {
    fn arbitrate(&self, source: &str, readings: Vec<EngineReading>) -> VerificationResult;
}

pub struct SimpleConsensusEngine {
    aligner: Box<dyn Aligner>,
    priority: EnginePriority,
    policy: AssemblyPolicy,
}

impl SimpleConsensusEngine {
    pub fn new(priority: EnginePriority, policy: AssemblyPolicy) -> Self {
        Self {
            aligner: Box::new(PositionalAligner::new()),
            priority,
            policy,
        }
    }

    pub fn from_config(config: &VerifierConfig) -> Self {
        Self::new(
            config.priority(),
            AssemblyPolicy {
                trusted_override_threshold: config.trusted_override_threshold,
                disagreement_cap: config.disagreement_cap,
            },
        )
    }

    pub fn with_aligner(mut self, aligner: Box<dyn Aligner>) -> Self {
        self.aligner = aligner;
        self
    }
}

impl Default for SimpleConsensusEngine {
    fn default() -> Self {
        Self::new(EnginePriority::default(), AssemblyPolicy::default())
    }
}

impl ConsensusEngine for SimpleConsensusEngine {
    fn arbitrate(&self, source: &str, readings: Vec<EngineReading>) -> VerificationResult {
        assemble(
            source,
            readings,
            self.aligner.as_ref(),
            &self.priority,
            &self.policy,
        )
    }
}
