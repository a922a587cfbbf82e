pub mod config;
pub mod core;
pub mod export;
pub mod fusion;
pub mod ocr;
pub mod pipeline;

pub use config::{Credentials, VerifierConfig};
pub use core::error::{EngineError, VerifyError};
pub use core::model::{EngineId, EngineReading, Tier, VerificationResult};
pub use pipeline::{BatchOutcome, CancelToken, Verifier};
