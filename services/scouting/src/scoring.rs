//! Per-record player score
//!
//! ```text
//! A = games * weight
//! B = titles * weight * 10
//! C = ((wins * 3 + draws) / (games * 3)) * A      (0 when games == 0)
//! score = round_half_even(A + B + C)
//! ```
//!
//! `weight` comes from the competitions table. A competition that is not
//! listed there scores with weight 0. Negative weights are taken as given.

use crate::error::UnresolvedReference;
use crate::join::KeyIndex;
use crate::schema::{col, Competition, GameRecord};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreTerms {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub score: i64,
}

/// Game record with its resolved weight and score terms.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredEvent {
    pub record: GameRecord,
    pub weight: f64,
    /// False when the competition had no entry in the weights table.
    pub weight_resolved: bool,
    pub terms: ScoreTerms,
}

impl ScoredEvent {
    pub fn score(&self) -> i64 {
        self.terms.score
    }
}

pub fn score_terms(games: f64, titles: f64, wins: f64, draws: f64, weight: f64) -> ScoreTerms {
    let a = games * weight;
    let b = titles * weight * 10.0;
    let c = if games > 0.0 {
        ((wins * 3.0 + draws) / (games * 3.0)) * a
    } else {
        0.0
    };
    ScoreTerms {
        a,
        b,
        c,
        score: (a + b + c).round_ties_even() as i64,
    }
}

pub fn score_events(events: &[GameRecord], weights: &[Competition]) -> Vec<ScoredEvent> {
    let table = KeyIndex::build(weights, |c| c.competition_key.as_str());
    events
        .iter()
        .map(|record| {
            let resolved = table.get(record.competition.as_deref());
            let weight = resolved.map_or(0.0, |c| c.weight);
            ScoredEvent {
                record: record.clone(),
                weight,
                weight_resolved: resolved.is_some(),
                terms: score_terms(record.games, record.titles, record.wins, record.draws, weight),
            }
        })
        .collect()
}

/// Competitions that were scored with a zero weight because they are missing
/// from the weights table.
pub fn unresolved_competitions(scored: &[ScoredEvent]) -> Vec<UnresolvedReference> {
    let mut found: Vec<UnresolvedReference> = Vec::new();
    let mut seen = HashSet::new();
    for row in scored.iter().filter(|s| !s.weight_resolved) {
        let key = row.record.competition.as_deref().unwrap_or_default();
        let reference = UnresolvedReference::new(GameRecord::TABLE, col::COMPETITION, key);
        if seen.insert(reference.clone()) {
            found.push(reference);
        }
    }
    found
}
