use crate::core::model::{AlignmentRow, EngineId, PairAgreement};

/// Shortest mismatched tail that can count as drift.
pub const MIN_DRIFT_RUN: usize = 3;

/// Token agreement for every pair of engines present in the aligned rows.
/// Pairs follow the cell order of the rows.
pub fn pair_agreement(rows: &[AlignmentRow]) -> Vec<PairAgreement> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    let engines: Vec<EngineId> = first.cells.iter().map(|(engine, _)| *engine).collect();

    let mut pairs = Vec::new();
    for (i, &a) in engines.iter().enumerate() {
        for &b in &engines[i + 1..] {
            pairs.push(compare_pair(rows, a, b));
        }
    }
    pairs
}

fn compare_pair(rows: &[AlignmentRow], a: EngineId, b: EngineId) -> PairAgreement {
    let tokens: Vec<(usize, &str, &str)> = rows
        .iter()
        .map(|row| (row.position, row.get(a).unwrap_or(""), row.get(b).unwrap_or("")))
        .filter(|(_, x, y)| !(x.is_empty() && y.is_empty()))
        .collect();

    let mut matched = 0;
    let mut tail_start = None;
    for (i, (_, x, y)) in tokens.iter().enumerate() {
        if x == y {
            matched += 1;
            tail_start = None;
        } else if tail_start.is_none() {
            tail_start = Some(i);
        }
    }

    let drift_from = tail_start
        .filter(|&start| is_shifted(&tokens[start..]))
        .map(|start| tokens[start].0);

    PairAgreement {
        engines: [a, b],
        matched,
        compared: tokens.len(),
        drift_from,
    }
}

/// True when most of a mismatched tail lines up again once one side moves
/// by a single word.
fn is_shifted(tail: &[(usize, &str, &str)]) -> bool {
    if tail.len() < MIN_DRIFT_RUN {
        return false;
    }
    let shifted = tail
        .windows(2)
        .filter(|pair| {
            let (_, a0, b0) = pair[0];
            let (_, a1, b1) = pair[1];
            (!a1.is_empty() && a1 == b0) || (!b1.is_empty() && b1 == a0)
        })
        .count();
    shifted * 2 >= tail.len() - 1
}
