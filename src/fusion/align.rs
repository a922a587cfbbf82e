use crate::core::model::{AlignmentRow, EngineId};
use crate::fusion::tokenize::tokenize;

/// Merges per-engine readings into one positional table.
pub trait Aligner: Send + Sync {
    /// `texts` arrive in engine priority order; every row keeps that order.
    fn align(&self, texts: &[(EngineId, &str)]) -> Vec<AlignmentRow>;
}

/// Fixed-offset alignment: token `i` of every engine lands in row `i`.
///
/// Cheap and adequate while engines agree on word count. One inserted or
/// dropped word shifts every later row for that engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct PositionalAligner;

impl PositionalAligner {
    pub fn new() -> Self {
        Self
    }
}

impl Aligner for PositionalAligner {
    fn align(&self, texts: &[(EngineId, &str)]) -> Vec<AlignmentRow> {
        let tokenized: Vec<(EngineId, Vec<String>)> = texts
            .iter()
            .map(|(engine, text)| {
                let words = tokenize(text).into_iter().map(|t| t.text).collect();
                (*engine, words)
            })
            .collect();

        let max_len = tokenized.iter().map(|(_, words)| words.len()).max().unwrap_or(0);

        (0..max_len)
            .map(|position| AlignmentRow {
                position,
                cells: tokenized
                    .iter()
                    .map(|(engine, words)| {
                        (*engine, words.get(position).cloned().unwrap_or_default())
                    })
                    .collect(),
            })
            .collect()
    }
}
