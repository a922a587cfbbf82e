use crate::core::model::TierCounts;

/// Fraction of positions classified `high`; zero when there are no positions.
pub fn overall_confidence(counts: &TierCounts) -> f64 {
    let total = counts.total();
    if total == 0 {
        return 0.0;
    }
    counts.high as f64 / total as f64
}

pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Whether a certified result may fall back to a trusted engine's raw text.
pub fn exceeds_threshold(confidence: f64, threshold: f64) -> bool {
    confidence > threshold
}
