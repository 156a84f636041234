//! Player score table and per-player views built on scored game records

use crate::aggregate::{aggregate, DimValue, Dimension, Metric};
use crate::error::Result;
use crate::join::KeyIndex;
use crate::ranking::rank_overall;
use crate::schema::{Competition, Entity, GameRecord};
use crate::scoring::{score_events, ScoredEvent};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerScore {
    pub rank: u32,
    pub entity_id: String,
    pub name: Option<String>,
    pub role: Option<String>,
    pub cohort_year: Option<i64>,
    pub total_score: i64,
    pub total_games: f64,
    pub titles: f64,
    /// Distinct competitions the player has records in.
    pub competitions: usize,
}

/// One row per player with game records, best total score first.
///
/// Players are matched to the register by id only. Players in the register
/// without any game record do not appear.
pub fn player_score_table(
    games: &[GameRecord],
    entities: &[Entity],
    weights: &[Competition],
) -> Result<Vec<PlayerScore>> {
    let scored = score_events(games, weights);
    let totals = aggregate(&scored, &[Dimension::EntityId], Metric::Score)?;
    let ranking = rank_overall(&totals);

    let register = KeyIndex::build(entities, |e| e.entity_id.as_str());
    let mut per_player: HashMap<&str, (f64, f64, HashSet<Option<&str>>, Option<&str>)> = HashMap::new();
    for row in &scored {
        let r = &row.record;
        let entry = per_player
            .entry(r.entity_id.as_str())
            .or_insert_with(|| (0.0, 0.0, HashSet::new(), None));
        entry.0 += r.games;
        entry.1 += r.titles;
        entry.2.insert(r.competition.as_deref());
        if entry.3.is_none() {
            entry.3 = r.name.as_deref();
        }
    }

    let mut table = Vec::with_capacity(ranking.rows.len());
    for row in &ranking.rows {
        let entity_id = match row.subject.first() {
            Some(Some(DimValue::Text(id))) => id.as_str(),
            _ => continue,
        };
        let Some((total_games, titles, competitions, event_name)) = per_player.get(entity_id) else {
            continue;
        };
        let entity = register.get(Some(entity_id));
        table.push(PlayerScore {
            rank: row.rank,
            entity_id: entity_id.to_string(),
            name: event_name
                .map(str::to_string)
                .or_else(|| entity.map(|e| e.name.clone())),
            role: entity.and_then(|e| e.role.clone()),
            cohort_year: entity.and_then(|e| e.cohort_year),
            total_score: row.value.round() as i64,
            total_games: *total_games,
            titles: *titles,
            competitions: competitions.iter().filter(|c| c.is_some()).count(),
        });
    }
    Ok(table)
}

/// Filters the score table the way the ranking screen does; ranks stay the
/// overall ones. `top_n == 0` keeps everything.
pub fn filter_score_table(
    table: &[PlayerScore],
    cohort_year: Option<i64>,
    role: Option<&str>,
    top_n: usize,
) -> Vec<PlayerScore> {
    let rows = table
        .iter()
        .filter(|p| cohort_year.map_or(true, |year| p.cohort_year == Some(year)))
        .filter(|p| role.map_or(true, |r| p.role.as_deref() == Some(r)))
        .cloned();
    if top_n > 0 {
        rows.take(top_n).collect()
    } else {
        rows.collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerCard {
    pub entity_id: String,
    pub total_score: i64,
    pub overall_rank: u32,
    /// Position among players of the same cohort year.
    pub cohort_rank: Option<u32>,
    /// Position among players with the same role, across all cohorts.
    pub role_rank: Option<u32>,
}

/// Ranks of one player within the full score table, or `None` when the
/// player has no game records.
pub fn player_card(table: &[PlayerScore], entity_id: &str) -> Option<PlayerCard> {
    let player = table.iter().find(|p| p.entity_id == entity_id)?;

    let cohort_rank = player.cohort_year.and_then(|year| {
        position_among(table, entity_id, |p| p.cohort_year == Some(year))
    });
    let role_rank = player
        .role
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .and_then(|role| position_among(table, entity_id, |p| p.role.as_deref().map(str::trim) == Some(role)));

    Some(PlayerCard {
        entity_id: player.entity_id.clone(),
        total_score: player.total_score,
        overall_rank: player.rank,
        cohort_rank,
        role_rank,
    })
}

fn position_among(table: &[PlayerScore], entity_id: &str, same_group: impl Fn(&PlayerScore) -> bool) -> Option<u32> {
    table
        .iter()
        .filter(|p| same_group(p))
        .position(|p| p.entity_id == entity_id)
        .map(|i| i as u32 + 1)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompetitionSummary {
    pub competition: Option<String>,
    pub participations: f64,
    pub titles: f64,
    pub games: f64,
    pub wins: f64,
    pub draws: f64,
    pub losses: f64,
    pub score: i64,
}

/// Per-competition totals for one player, highest score first.
pub fn competition_summary(scored: &[ScoredEvent], entity_id: &str) -> Vec<CompetitionSummary> {
    let mut by_competition: BTreeMap<Option<&str>, CompetitionSummary> = BTreeMap::new();
    for row in scored.iter().filter(|s| s.record.entity_id == entity_id) {
        let r = &row.record;
        let entry = by_competition
            .entry(r.competition.as_deref())
            .or_insert_with(|| CompetitionSummary {
                competition: r.competition.clone(),
                participations: 0.0,
                titles: 0.0,
                games: 0.0,
                wins: 0.0,
                draws: 0.0,
                losses: 0.0,
                score: 0,
            });
        entry.participations += r.participations;
        entry.titles += r.titles;
        entry.games += r.games;
        entry.wins += r.wins;
        entry.draws += r.draws;
        entry.losses += r.losses;
        entry.score += row.score();
    }

    let mut out: Vec<CompetitionSummary> = by_competition.into_values().collect();
    // Stable sort keeps competition order for equal scores.
    out.sort_by(|a, b| b.score.cmp(&a.score));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entity(id: &str, role: &str, year: i64) -> Entity {
        Entity {
            entity_id: id.to_string(),
            name: format!("Player {}", id),
            origin_group_key: None,
            cohort_year: Some(year),
            role: Some(role.to_string()),
            status: None,
            link: None,
        }
    }

    fn make_game(id: &str, competition: &str, games: f64, titles: f64, wins: f64) -> GameRecord {
        GameRecord {
            competition: Some(competition.to_string()),
            entity_id: id.to_string(),
            name: None,
            participations: 1.0,
            titles,
            games,
            wins,
            draws: 0.0,
            losses: games - wins,
        }
    }

    fn make_weights() -> Vec<Competition> {
        vec![
            Competition { competition_key: "Cup".to_string(), weight: 2.0 },
            Competition { competition_key: "League".to_string(), weight: 1.0 },
        ]
    }

    fn make_table() -> Vec<PlayerScore> {
        let entities = vec![
            make_entity("1", "Forward", 2004),
            make_entity("2", "Forward", 2005),
            make_entity("3", "Keeper", 2004),
            make_entity("4", "Keeper", 2004),
        ];
        let games = vec![
            make_game("1", "Cup", 10.0, 0.0, 0.0),   // 20
            make_game("1", "League", 10.0, 0.0, 0.0), // 10
            make_game("2", "League", 50.0, 0.0, 0.0), // 50
            make_game("3", "Cup", 5.0, 0.0, 0.0),    // 10
            make_game("9", "Cup", 1.0, 0.0, 0.0),    // 2, not in register
        ];
        player_score_table(&games, &entities, &make_weights()).unwrap()
    }

    #[test]
    fn test_score_table_orders_and_totals() {
        let table = make_table();
        let ids: Vec<&str> = table.iter().map(|p| p.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1", "3", "9"]);
        assert_eq!(table[1].total_score, 30);
        assert_eq!(table[1].competitions, 2);
        assert_eq!(table[1].total_games, 20.0);
        assert_eq!(table[1].name.as_deref(), Some("Player 1"));
        assert_eq!(table[3].role, None);
        assert_eq!(table.iter().map(|p| p.rank).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_filter_keeps_overall_rank() {
        let table = make_table();
        let keepers = filter_score_table(&table, Some(2004), Some("Keeper"), 0);
        assert_eq!(keepers.len(), 1);
        assert_eq!(keepers[0].rank, 3);
        assert_eq!(filter_score_table(&table, None, None, 2).len(), 2);
    }

    #[test]
    fn test_player_card_ranks() {
        let table = make_table();
        let card = player_card(&table, "3").unwrap();
        assert_eq!(card.overall_rank, 3);
        assert_eq!(card.cohort_rank, Some(2));
        assert_eq!(card.role_rank, Some(1));

        assert!(player_card(&table, "4").is_none());
    }

    #[test]
    fn test_competition_summary() {
        let games = vec![
            make_game("1", "League", 10.0, 0.0, 10.0),
            make_game("1", "Cup", 10.0, 1.0, 0.0),
            make_game("1", "League", 2.0, 0.0, 0.0),
            make_game("2", "Cup", 99.0, 0.0, 0.0),
        ];
        let scored = score_events(&games, &make_weights());
        let summary = competition_summary(&scored, "1");

        assert_eq!(summary.len(), 2);
        // Cup: 20 + 20 + 0 = 40; League: (10 + 0 + 10) + 2 = 22
        assert_eq!(summary[0].competition.as_deref(), Some("Cup"));
        assert_eq!(summary[0].score, 40);
        assert_eq!(summary[1].score, 22);
        assert_eq!(summary[1].games, 12.0);
        assert_eq!(summary[1].wins, 10.0);
    }
}
