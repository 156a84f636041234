//! Canonical records for the scouting sources
//!
//! Each source table gets one typed record. Source headers are the display
//! names used in the club spreadsheets; the canonical names below are the
//! only ones the rest of the engine depends on.

use crate::error::Result;
use crate::normalize::{
    key_column, metric_column, optional_metric_column, optional_text_column, ordinal_column,
    text_column, ColumnKind, ColumnSpec, Record, TableLayout,
};
use polars::prelude::DataFrame;
use serde::Serialize;

/// Canonical column names.
pub mod col {
    pub const ENTITY_ID: &str = "entity_id";
    pub const NAME: &str = "name";
    pub const ORIGIN_GROUP_KEY: &str = "origin_group_key";
    pub const COHORT_YEAR: &str = "cohort_year";
    pub const ROLE: &str = "role";
    pub const STATUS: &str = "status";
    pub const LINK: &str = "link";

    pub const GROUP_KEY: &str = "group_key";
    pub const COUNTRY: &str = "country";

    pub const COMPETITION: &str = "competition";
    pub const PERIOD: &str = "period";
    pub const CURRENT_GROUP_KEY: &str = "current_group_key";
    pub const MINUTES: &str = "minutes";

    pub const PARTICIPATIONS: &str = "participations";
    pub const TITLES: &str = "titles";
    pub const GAMES: &str = "games";
    pub const WINS: &str = "wins";
    pub const DRAWS: &str = "draws";
    pub const LOSSES: &str = "losses";

    pub const COMPETITION_KEY: &str = "competition_key";
    pub const WEIGHT: &str = "weight";

    pub const ORIGIN_COUNTRY: &str = "origin_country";
    pub const CURRENT_COUNTRY: &str = "current_country";
}

/// A player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub entity_id: String,
    pub name: String,
    /// Natural key of the club that developed the player.
    pub origin_group_key: Option<String>,
    pub cohort_year: Option<i64>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub link: Option<String>,
}

impl Entity {
    pub const TABLE: &'static str = "entities";

    const RENAME: [(&'static str, &'static str); 7] = [
        ("ID", col::ENTITY_ID),
        ("Jogador", col::NAME),
        ("Clube Revelador", col::ORIGIN_GROUP_KEY),
        ("Ano", col::COHORT_YEAR),
        ("Posição", col::ROLE),
        ("Status", col::STATUS),
        ("Link", col::LINK),
    ];

    /// Player register without an origin club, as kept next to the games
    /// sheet.
    pub fn roster_layout() -> TableLayout {
        TableLayout::new(
            Self::TABLE,
            &Self::RENAME,
            vec![
                ColumnSpec::required(col::ENTITY_ID, ColumnKind::Text),
                ColumnSpec::required(col::NAME, ColumnKind::Text),
                ColumnSpec::optional(col::ORIGIN_GROUP_KEY, ColumnKind::Text),
                ColumnSpec::optional(col::COHORT_YEAR, ColumnKind::Ordinal),
                ColumnSpec::optional(col::ROLE, ColumnKind::Text),
                ColumnSpec::optional(col::STATUS, ColumnKind::Text),
                ColumnSpec::optional(col::LINK, ColumnKind::Text),
            ],
        )
    }
}

impl Record for Entity {
    fn layout() -> TableLayout {
        let mut layout = Self::roster_layout();
        layout.columns[2] = ColumnSpec::required(col::ORIGIN_GROUP_KEY, ColumnKind::Text);
        layout
    }

    fn from_frame(df: &DataFrame) -> Result<Vec<Self>> {
        let t = Self::TABLE;
        let ids = key_column(df, t, col::ENTITY_ID)?;
        let names = key_column(df, t, col::NAME)?;
        let origins = optional_text_column(df, t, col::ORIGIN_GROUP_KEY)?;
        let cohorts = ordinal_column(df, t, col::COHORT_YEAR)?;
        let roles = optional_text_column(df, t, col::ROLE)?;
        let statuses = optional_text_column(df, t, col::STATUS)?;
        let links = optional_text_column(df, t, col::LINK)?;

        Ok((0..df.height())
            .map(|i| Entity {
                entity_id: ids[i].clone(),
                name: names[i].clone(),
                origin_group_key: origins[i].clone(),
                cohort_year: cohorts[i],
                role: roles[i].clone(),
                status: statuses[i].clone(),
                link: links[i].clone(),
            })
            .collect())
    }
}

/// A club.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub group_key: String,
    pub country: Option<String>,
}

impl Group {
    pub const TABLE: &'static str = "groups";
}

impl Record for Group {
    fn layout() -> TableLayout {
        TableLayout::new(
            Self::TABLE,
            &[("Clube", col::GROUP_KEY), ("País", col::COUNTRY)],
            vec![
                ColumnSpec::required(col::GROUP_KEY, ColumnKind::Text),
                ColumnSpec::required(col::COUNTRY, ColumnKind::Text),
            ],
        )
    }

    fn from_frame(df: &DataFrame) -> Result<Vec<Self>> {
        let keys = key_column(df, Self::TABLE, col::GROUP_KEY)?;
        let countries = text_column(df, Self::TABLE, col::COUNTRY)?;
        Ok(keys
            .into_iter()
            .zip(countries)
            .map(|(group_key, country)| Group { group_key, country })
            .collect())
    }
}

/// Minutes a player logged in one competition and year, for the club they were
/// registered with at the time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Appearance {
    pub competition: Option<String>,
    pub period: Option<i64>,
    pub entity_id: String,
    pub name: Option<String>,
    pub current_group_key: Option<String>,
    pub minutes: f64,
}

impl Appearance {
    pub const TABLE: &'static str = "appearances";
}

impl Record for Appearance {
    fn layout() -> TableLayout {
        TableLayout::new(
            Self::TABLE,
            &[
                ("Campeonato", col::COMPETITION),
                ("Ano", col::PERIOD),
                ("Jogador", col::NAME),
                ("ID", col::ENTITY_ID),
                ("Clube", col::CURRENT_GROUP_KEY),
                ("Minutos", col::MINUTES),
            ],
            vec![
                ColumnSpec::required(col::COMPETITION, ColumnKind::Text),
                ColumnSpec::required(col::PERIOD, ColumnKind::Ordinal),
                ColumnSpec::required(col::ENTITY_ID, ColumnKind::Text),
                ColumnSpec::required(col::CURRENT_GROUP_KEY, ColumnKind::Text),
                ColumnSpec::required(col::MINUTES, ColumnKind::Metric),
                ColumnSpec::optional(col::NAME, ColumnKind::Text),
            ],
        )
    }

    fn from_frame(df: &DataFrame) -> Result<Vec<Self>> {
        let t = Self::TABLE;
        let competitions = text_column(df, t, col::COMPETITION)?;
        let periods = ordinal_column(df, t, col::PERIOD)?;
        let ids = key_column(df, t, col::ENTITY_ID)?;
        let names = optional_text_column(df, t, col::NAME)?;
        let current = text_column(df, t, col::CURRENT_GROUP_KEY)?;
        let minutes = metric_column(df, t, col::MINUTES)?;

        Ok((0..df.height())
            .map(|i| Appearance {
                competition: competitions[i].clone(),
                period: periods[i],
                entity_id: ids[i].clone(),
                name: names[i].clone(),
                current_group_key: current[i].clone(),
                minutes: minutes[i],
            })
            .collect())
    }
}

/// Aggregate results of one player in one competition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameRecord {
    pub competition: Option<String>,
    pub entity_id: String,
    pub name: Option<String>,
    pub participations: f64,
    pub titles: f64,
    pub games: f64,
    pub wins: f64,
    pub draws: f64,
    pub losses: f64,
}

impl GameRecord {
    pub const TABLE: &'static str = "games";
}

impl Record for GameRecord {
    fn layout() -> TableLayout {
        TableLayout::new(
            Self::TABLE,
            &[
                ("Competição", col::COMPETITION),
                ("ID", col::ENTITY_ID),
                ("Jogador", col::NAME),
                ("Participações", col::PARTICIPATIONS),
                ("Títulos", col::TITLES),
                ("Jogos", col::GAMES),
                ("Vitórias", col::WINS),
                ("Empates", col::DRAWS),
                ("Derrotas", col::LOSSES),
            ],
            vec![
                ColumnSpec::required(col::COMPETITION, ColumnKind::Text),
                ColumnSpec::required(col::ENTITY_ID, ColumnKind::Text),
                ColumnSpec::required(col::TITLES, ColumnKind::Metric),
                ColumnSpec::required(col::GAMES, ColumnKind::Metric),
                ColumnSpec::required(col::WINS, ColumnKind::Metric),
                ColumnSpec::required(col::DRAWS, ColumnKind::Metric),
                ColumnSpec::optional(col::NAME, ColumnKind::Text),
                ColumnSpec::optional(col::PARTICIPATIONS, ColumnKind::Metric),
                ColumnSpec::optional(col::LOSSES, ColumnKind::Metric),
            ],
        )
    }

    fn from_frame(df: &DataFrame) -> Result<Vec<Self>> {
        let t = Self::TABLE;
        let competitions = text_column(df, t, col::COMPETITION)?;
        let ids = key_column(df, t, col::ENTITY_ID)?;
        let names = optional_text_column(df, t, col::NAME)?;
        let participations = optional_metric_column(df, t, col::PARTICIPATIONS)?;
        let titles = metric_column(df, t, col::TITLES)?;
        let games = metric_column(df, t, col::GAMES)?;
        let wins = metric_column(df, t, col::WINS)?;
        let draws = metric_column(df, t, col::DRAWS)?;
        let losses = optional_metric_column(df, t, col::LOSSES)?;

        Ok((0..df.height())
            .map(|i| GameRecord {
                competition: competitions[i].clone(),
                entity_id: ids[i].clone(),
                name: names[i].clone(),
                participations: participations[i],
                titles: titles[i],
                games: games[i],
                wins: wins[i],
                draws: draws[i],
                losses: losses[i],
            })
            .collect())
    }
}

/// Prestige weight of a competition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Competition {
    pub competition_key: String,
    pub weight: f64,
}

impl Competition {
    pub const TABLE: &'static str = "competitions";
}

impl Record for Competition {
    fn layout() -> TableLayout {
        TableLayout::new(
            Self::TABLE,
            &[("Competição", col::COMPETITION_KEY), ("Pontuação", col::WEIGHT)],
            vec![
                ColumnSpec::required(col::COMPETITION_KEY, ColumnKind::Text),
                ColumnSpec::required(col::WEIGHT, ColumnKind::Metric),
            ],
        )
    }

    fn from_frame(df: &DataFrame) -> Result<Vec<Self>> {
        let keys = key_column(df, Self::TABLE, col::COMPETITION_KEY)?;
        let weights = metric_column(df, Self::TABLE, col::WEIGHT)?;
        Ok(keys
            .into_iter()
            .zip(weights)
            .map(|(competition_key, weight)| Competition { competition_key, weight })
            .collect())
    }
}
