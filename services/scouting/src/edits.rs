//! Whole-table replacement helpers for edited player data
//!
//! Tables are never patched in place: an edit produces a new table that the
//! caller persists (or not) as a whole. Concurrent editors are the caller's
//! problem; the last table written wins.

use crate::schema::{Entity, GameRecord};

/// New games table with every record of `entity` replaced by `edited`.
///
/// Edited rows with an empty competition are discarded. Missing ids and
/// names are filled in from `entity`. Records of other players keep their
/// order and come first.
pub fn replace_entity_games(all: &[GameRecord], entity: &Entity, edited: &[GameRecord]) -> Vec<GameRecord> {
    let kept = all
        .iter()
        .filter(|g| g.entity_id != entity.entity_id)
        .cloned();

    let replaced = edited
        .iter()
        .filter(|g| g.competition.as_deref().is_some_and(|c| !c.trim().is_empty()))
        .map(|g| {
            let mut row = g.clone();
            if row.entity_id.trim().is_empty() {
                row.entity_id = entity.entity_id.clone();
            }
            if row.name.as_deref().map_or(true, |n| n.trim().is_empty()) {
                row.name = Some(entity.name.clone());
            }
            row
        });

    kept.chain(replaced).collect()
}

/// New register with the status of `entity_id` set to `status`.
pub fn set_entity_status(entities: &[Entity], entity_id: &str, status: &str) -> Vec<Entity> {
    entities
        .iter()
        .map(|e| {
            if e.entity_id == entity_id {
                Entity {
                    status: Some(status.to_string()),
                    ..e.clone()
                }
            } else {
                e.clone()
            }
        })
        .collect()
}
