//! Left-outer joins between players, clubs and appearances
//!
//! All joins are keyed on natural keys and keep every left-hand row exactly
//! once. When a key appears more than once on the right-hand side the first
//! occurrence (in input order) wins; later duplicates are ignored. This is a
//! known limitation of natural-key sources and is not reported.

use crate::error::UnresolvedReference;
use crate::schema::{col, Appearance, Entity, Group};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// First-occurrence lookup over a right-hand table.
pub struct KeyIndex<'a, T> {
    rows: HashMap<&'a str, &'a T>,
}

impl<'a, T> KeyIndex<'a, T> {
    pub fn build(rows: &'a [T], key: impl Fn(&'a T) -> &'a str) -> Self {
        let mut index = HashMap::with_capacity(rows.len());
        for row in rows {
            index.entry(key(row)).or_insert(row);
        }
        Self { rows: index }
    }

    pub fn get(&self, key: Option<&str>) -> Option<&'a T> {
        key.and_then(|k| self.rows.get(k).copied())
    }
}

/// Player plus the country of the club that developed them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedEntity {
    pub entity: Entity,
    pub origin_country: Option<String>,
}

/// Appearance joined with player metadata. The appearance's own `name` wins
/// when it has one; otherwise the register's name is used.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedEvent {
    pub event: Appearance,
    pub name: Option<String>,
    pub origin_group_key: Option<String>,
    pub origin_country: Option<String>,
    pub cohort_year: Option<i64>,
    pub role: Option<String>,
}

/// Appearance with both the origin club's and the current club's country.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedEvent {
    pub competition: Option<String>,
    pub period: Option<i64>,
    pub entity_id: String,
    pub name: Option<String>,
    pub current_group_key: Option<String>,
    pub minutes: f64,
    pub origin_group_key: Option<String>,
    pub cohort_year: Option<i64>,
    pub role: Option<String>,
    pub origin_country: Option<String>,
    pub current_country: Option<String>,
}

pub fn join_entities_groups(entities: &[Entity], groups: &[Group]) -> Vec<EnrichedEntity> {
    let clubs = KeyIndex::build(groups, |g| g.group_key.as_str());
    entities
        .iter()
        .map(|entity| EnrichedEntity {
            entity: entity.clone(),
            origin_country: clubs
                .get(entity.origin_group_key.as_deref())
                .and_then(|g| g.country.clone()),
        })
        .collect()
}

pub fn join_events(events: &[Appearance], entities: &[EnrichedEntity]) -> Vec<JoinedEvent> {
    let players = KeyIndex::build(entities, |e| e.entity.entity_id.as_str());
    events
        .iter()
        .map(|event| {
            let player = players.get(Some(event.entity_id.as_str()));
            JoinedEvent {
                event: event.clone(),
                name: event
                    .name
                    .clone()
                    .or_else(|| player.map(|p| p.entity.name.clone())),
                origin_group_key: player.and_then(|p| p.entity.origin_group_key.clone()),
                origin_country: player.and_then(|p| p.origin_country.clone()),
                cohort_year: player.and_then(|p| p.entity.cohort_year),
                role: player.and_then(|p| p.entity.role.clone()),
            }
        })
        .collect()
}

/// Second join against the clubs table, this time on the current club. The
/// looked-up club key only drives the match and never reaches the output.
pub fn attach_current_group_country(joined: &[JoinedEvent], groups: &[Group]) -> Vec<EnrichedEvent> {
    let clubs = KeyIndex::build(groups, |g| g.group_key.as_str());
    joined
        .iter()
        .map(|row| {
            let event = &row.event;
            EnrichedEvent {
                competition: event.competition.clone(),
                period: event.period,
                entity_id: event.entity_id.clone(),
                name: row.name.clone(),
                current_group_key: event.current_group_key.clone(),
                minutes: event.minutes,
                origin_group_key: row.origin_group_key.clone(),
                cohort_year: row.cohort_year,
                role: row.role.clone(),
                origin_country: row.origin_country.clone(),
                current_country: clubs
                    .get(event.current_group_key.as_deref())
                    .and_then(|g| g.country.clone()),
            }
        })
        .collect()
}

/// Full enrichment: players → origin club, appearances → players, then
/// appearances → current club. Never fails; unmatched keys become nulls.
pub fn build_enriched(entities: &[Entity], groups: &[Group], events: &[Appearance]) -> Vec<EnrichedEvent> {
    let enriched_entities = join_entities_groups(entities, groups);
    let joined = join_events(events, &enriched_entities);
    attach_current_group_country(&joined, groups)
}

/// Keys that found no match in any of the three joins, deduplicated and in
/// first-seen order.
pub fn unresolved_references(
    entities: &[Entity],
    groups: &[Group],
    events: &[Appearance],
) -> Vec<UnresolvedReference> {
    let clubs = KeyIndex::build(groups, |g| g.group_key.as_str());
    let players = KeyIndex::build(entities, |e| e.entity_id.as_str());
    let mut found = Vec::new();
    let mut seen = HashSet::new();
    let mut push = |reference: UnresolvedReference| {
        if seen.insert(reference.clone()) {
            found.push(reference);
        }
    };

    for entity in entities {
        if let Some(key) = entity.origin_group_key.as_deref() {
            if clubs.get(Some(key)).is_none() {
                push(UnresolvedReference::new(Entity::TABLE, col::ORIGIN_GROUP_KEY, key));
            }
        }
    }
    for event in events {
        if players.get(Some(event.entity_id.as_str())).is_none() {
            push(UnresolvedReference::new(Appearance::TABLE, col::ENTITY_ID, &event.entity_id));
        }
        if let Some(key) = event.current_group_key.as_deref() {
            if clubs.get(Some(key)).is_none() {
                push(UnresolvedReference::new(Appearance::TABLE, col::CURRENT_GROUP_KEY, key));
            }
        }
    }
    found
}
