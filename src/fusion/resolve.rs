use crate::config::EnginePriority;
use crate::core::model::{AlignmentRow, ConsensusDecision, EngineClass, EngineId, Rationale, Tier};

/// Votes on one alignment row.
///
/// Unanimity or three matching engines is `high`. A pair out of three or more
/// voters is `medium`, with the dedicated OCR engines getting the final say when
/// they agree among themselves. Anything weaker is `low` and left unchosen.
pub fn decide(row: &AlignmentRow, priority: &EnginePriority) -> ConsensusDecision {
    let mut valid: Vec<(EngineId, &str)> = row.votes().collect();
    priority.sort_by_engine(&mut valid, |(engine, _)| *engine);
    let total = valid.len();

    let Some((word, count)) = plurality(&valid) else {
        return ConsensusDecision {
            position: row.position,
            readings: row.clone(),
            chosen: None,
            agreeing: 0,
            voters: 0,
            tier: Tier::Low,
            rationale: Rationale::NoReadings,
        };
    };

    let (chosen, tier, rationale) = if count == total {
        (Some(word), Tier::High, Rationale::Unanimous { voters: total })
    } else if count >= 3 {
        let engines = valid
            .iter()
            .filter(|(_, token)| *token == word)
            .map(|(engine, _)| *engine)
            .collect();
        (Some(word), Tier::High, Rationale::Majority { engines })
    } else if count == 2 && total >= 3 {
        let (chosen, rationale) = break_tie(&valid, word);
        (Some(chosen), Tier::Medium, rationale)
    } else {
        (None, Tier::Low, Rationale::NoConsensus)
    };

    tracing::debug!(
        position = row.position,
        chosen = chosen.unwrap_or("-"),
        agreement = %format!("{count}/{total}"),
        tier = tier.as_str(),
        "position decided"
    );

    ConsensusDecision {
        position: row.position,
        readings: row.clone(),
        chosen: chosen.map(str::to_string),
        agreeing: count,
        voters: total,
        tier,
        rationale,
    }
}

/// Most frequent token. Ties go to the token first seen in priority order.
fn plurality<'a>(valid: &[(EngineId, &'a str)]) -> Option<(&'a str, usize)> {
    let mut counts: Vec<(&'a str, usize)> = Vec::new();
    for &(_, token) in valid {
        match counts.iter_mut().find(|(word, _)| *word == token) {
            Some((_, count)) => *count += 1,
            None => counts.push((token, 1)),
        }
    }

    let mut best: Option<(&'a str, usize)> = None;
    for (word, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((word, count));
        }
    }
    best
}

fn break_tie<'a>(valid: &[(EngineId, &'a str)], plurality_word: &'a str) -> (&'a str, Rationale) {
    let votes_of = |class: EngineClass| -> Vec<&'a str> {
        valid
            .iter()
            .filter(|(engine, _)| engine.class() == class)
            .map(|(_, token)| *token)
            .collect()
    };

    if let Some(word) = unanimous(&votes_of(EngineClass::DedicatedOcr)) {
        return (word, Rationale::OcrAgree);
    }
    match unanimous(&votes_of(EngineClass::VisionLlm)) {
        Some(word) if word == plurality_word => (plurality_word, Rationale::LlmAgree),
        _ => (plurality_word, Rationale::SplitVote),
    }
}

fn unanimous<'a>(votes: &[&'a str]) -> Option<&'a str> {
    let first = *votes.first()?;
    votes.iter().all(|vote| *vote == first).then_some(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(EngineId, &str)]) -> AlignmentRow {
        AlignmentRow {
            position: 7,
            cells: cells.iter().map(|(id, t)| (*id, t.to_string())).collect(),
        }
    }

    fn decide_default(cells: &[(EngineId, &str)]) -> ConsensusDecision {
        decide(&row(cells), &EnginePriority::default())
    }

    use EngineId::{Claude, DocAi, Gpt, Vision};

    #[test]
    fn all_empty_is_no_readings() {
        let d = decide_default(&[(DocAi, ""), (Claude, "")]);
        assert_eq!(d.chosen, None);
        assert_eq!(d.tier, Tier::Low);
        assert_eq!(d.agreement(), "0/0");
        assert_eq!(d.rationale, Rationale::NoReadings);
    }

    #[test]
    fn unanimous_vote_is_high() {
        let d = decide_default(&[(DocAi, "the"), (Vision, "the"), (Claude, "the"), (Gpt, "the")]);
        assert_eq!(d.chosen.as_deref(), Some("the"));
        assert_eq!(d.tier, Tier::High);
        assert_eq!(d.agreement(), "4/4");
        assert_eq!(d.rationale.to_string(), "all 4 models agree");
    }

    #[test]
    fn padding_does_not_vote() {
        let d = decide_default(&[(DocAi, "war"), (Vision, ""), (Claude, "war")]);
        assert_eq!(d.tier, Tier::High);
        assert_eq!(d.agreement(), "2/2");
    }

    #[test]
    fn three_of_four_is_majority() {
        let d = decide_default(&[(DocAi, "letter"), (Vision, "letter"), (Claude, "letter"), (Gpt, "latter")]);
        assert_eq!(d.chosen.as_deref(), Some("letter"));
        assert_eq!(d.tier, Tier::High);
        assert_eq!(d.agreement(), "3/4");
        assert_eq!(
            d.rationale,
            Rationale::Majority {
                engines: vec![DocAi, Vision, Claude]
            }
        );
    }

    #[test]
    fn class_split_prefers_ocr_engines() {
        let d = decide_default(&[(DocAi, "the"), (Vision, "the"), (Claude, "teh"), (Gpt, "teh")]);
        assert_eq!(d.chosen.as_deref(), Some("the"));
        assert_eq!(d.tier, Tier::Medium);
        assert_eq!(d.agreement(), "2/4");
        assert!(d.rationale.to_string().contains("OCR engines agree, LLMs differ"));
    }

    #[test]
    fn lone_ocr_vote_outranks_llm_pair() {
        let d = decide_default(&[(DocAi, "sent"), (Claude, "send"), (Gpt, "send")]);
        assert_eq!(d.chosen.as_deref(), Some("sent"));
        assert_eq!(d.tier, Tier::Medium);
        assert_eq!(d.rationale, Rationale::OcrAgree);
        assert_eq!(d.agreement(), "2/3");
    }

    #[test]
    fn llm_agreement_matching_plurality() {
        let d = decide_default(&[(DocAi, "home"), (Vision, "horne"), (Claude, "hone"), (Gpt, "hone")]);
        assert_eq!(d.chosen.as_deref(), Some("hone"));
        assert_eq!(d.tier, Tier::Medium);
        assert_eq!(d.rationale, Rationale::LlmAgree);
    }

    #[test]
    fn mixed_pair_is_split_vote() {
        let d = decide_default(&[(DocAi, "may"), (Vision, "mag"), (Claude, "may"), (Gpt, "war")]);
        assert_eq!(d.chosen.as_deref(), Some("may"));
        assert_eq!(d.tier, Tier::Medium);
        assert_eq!(d.rationale.to_string(), "split vote – majority wins");
    }

    #[test]
    fn llm_pair_not_matching_plurality_is_split_vote() {
        let d = decide_default(&[(DocAi, "a"), (Vision, "b"), (Claude, "a"), (Gpt, "b")]);
        assert_eq!(d.chosen.as_deref(), Some("a"));
        assert_eq!(d.rationale, Rationale::SplitVote);
    }

    #[test]
    fn all_distinct_is_flagged() {
        let d = decide_default(&[(DocAi, "cat"), (Vision, "cot"), (Claude, "cut")]);
        assert_eq!(d.chosen, None);
        assert_eq!(d.tier, Tier::Low);
        assert_eq!(d.agreement(), "1/3");
        assert_eq!(d.rationale.to_string(), "no consensus – flagged for human review");
    }

    #[test]
    fn two_voters_disagreeing_is_low() {
        let d = decide_default(&[(Vision, "one"), (Gpt, "won")]);
        assert_eq!(d.chosen, None);
        assert_eq!(d.tier, Tier::Low);
    }

    #[test]
    fn ties_follow_priority_order() {
        let row = row(&[(Gpt, "b"), (Claude, "a")]);
        let mut valid: Vec<_> = row.votes().collect();
        EnginePriority::from_configured(&[Claude, Gpt]).sort_by_engine(&mut valid, |(e, _)| *e);
        assert_eq!(plurality(&valid), Some(("a", 1)));
        EnginePriority::from_configured(&[Gpt, Claude]).sort_by_engine(&mut valid, |(e, _)| *e);
        assert_eq!(plurality(&valid), Some(("b", 1)));
    }

    #[test]
    fn decisions_are_deterministic() {
        let cells = [(DocAi, "x"), (Vision, "y"), (Claude, "y"), (Gpt, "x")];
        assert_eq!(decide_default(&cells), decide_default(&cells));
    }
}
