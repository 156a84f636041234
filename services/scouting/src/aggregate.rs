//! Group-by-and-sum over enriched or scored rows

use crate::error::{EngineError, Result};
use crate::join::EnrichedEvent;
use crate::scoring::ScoredEvent;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// A column rows can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Competition,
    Period,
    EntityId,
    Name,
    OriginGroup,
    OriginCountry,
    CurrentGroup,
    CurrentCountry,
    Role,
    CohortYear,
}

impl Dimension {
    pub const ALL: [Dimension; 10] = [
        Dimension::Competition,
        Dimension::Period,
        Dimension::EntityId,
        Dimension::Name,
        Dimension::OriginGroup,
        Dimension::OriginCountry,
        Dimension::CurrentGroup,
        Dimension::CurrentCountry,
        Dimension::Role,
        Dimension::CohortYear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Competition => "competition",
            Dimension::Period => "period",
            Dimension::EntityId => "entity_id",
            Dimension::Name => "name",
            Dimension::OriginGroup => "origin_group",
            Dimension::OriginCountry => "origin_country",
            Dimension::CurrentGroup => "current_group",
            Dimension::CurrentCountry => "current_country",
            Dimension::Role => "role",
            Dimension::CohortYear => "cohort_year",
        }
    }

    /// Header used when the dimension is written out.
    pub fn display_name(&self) -> &'static str {
        match self {
            Dimension::Competition => "Campeonato",
            Dimension::Period => "Ano",
            Dimension::EntityId => "ID Jogador",
            Dimension::Name => "Nome Jogador",
            Dimension::OriginGroup => "Clube Revelador",
            Dimension::OriginCountry => "pais_clube_revelador",
            Dimension::CurrentGroup => "Clube Atual",
            Dimension::CurrentCountry => "pais_clube_atual",
            Dimension::Role => "Posição",
            Dimension::CohortYear => "Ano Cadastro",
        }
    }

    /// Whether values of this dimension are whole numbers rather than text.
    pub fn is_ordinal(&self) -> bool {
        matches!(self, Dimension::Period | Dimension::CohortYear)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Dimension::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| format!("unknown dimension '{}'", s))
    }
}

/// A column rows can be summed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Minutes,
    Score,
    Games,
    Titles,
    Wins,
    Draws,
    Losses,
    Participations,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::Minutes,
        Metric::Score,
        Metric::Games,
        Metric::Titles,
        Metric::Wins,
        Metric::Draws,
        Metric::Losses,
        Metric::Participations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Minutes => "minutes",
            Metric::Score => "score",
            Metric::Games => "games",
            Metric::Titles => "titles",
            Metric::Wins => "wins",
            Metric::Draws => "draws",
            Metric::Losses => "losses",
            Metric::Participations => "participations",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Metric::Minutes => "Minutos",
            Metric::Score => "Pontuacao",
            Metric::Games => "Jogos",
            Metric::Titles => "Títulos",
            Metric::Wins => "Vitórias",
            Metric::Draws => "Empates",
            Metric::Losses => "Derrotas",
            Metric::Participations => "Participações",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown metric '{}'", s))
    }
}

/// One value of a dimension. Ordinals sort numerically, text lexically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum DimValue {
    Int(i64),
    Text(String),
}

impl fmt::Display for DimValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimValue::Int(v) => write!(f, "{}", v),
            DimValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for DimValue {
    fn from(value: &str) -> Self {
        DimValue::Text(value.to_string())
    }
}

impl From<i64> for DimValue {
    fn from(value: i64) -> Self {
        DimValue::Int(value)
    }
}

/// A dimension tuple; `None` is a null cell and groups with other nulls.
pub type DimKey = Vec<Option<DimValue>>;

/// Rows that expose named dimensions and metrics.
pub trait Dimensional {
    const TABLE: &'static str;
    const DIMENSIONS: &'static [Dimension];
    const METRICS: &'static [Metric];

    /// Only called with a dimension listed in `DIMENSIONS`.
    fn dimension(&self, dim: Dimension) -> Option<DimValue>;

    /// Only called with a metric listed in `METRICS`.
    fn metric(&self, metric: Metric) -> f64;
}

fn text(value: &Option<String>) -> Option<DimValue> {
    value.as_deref().map(DimValue::from)
}

impl Dimensional for EnrichedEvent {
    const TABLE: &'static str = "enriched";
    const DIMENSIONS: &'static [Dimension] = &Dimension::ALL;
    const METRICS: &'static [Metric] = &[Metric::Minutes];

    fn dimension(&self, dim: Dimension) -> Option<DimValue> {
        match dim {
            Dimension::Competition => text(&self.competition),
            Dimension::Period => self.period.map(DimValue::Int),
            Dimension::EntityId => Some(DimValue::from(self.entity_id.as_str())),
            Dimension::Name => text(&self.name),
            Dimension::OriginGroup => text(&self.origin_group_key),
            Dimension::OriginCountry => text(&self.origin_country),
            Dimension::CurrentGroup => text(&self.current_group_key),
            Dimension::CurrentCountry => text(&self.current_country),
            Dimension::Role => text(&self.role),
            Dimension::CohortYear => self.cohort_year.map(DimValue::Int),
        }
    }

    fn metric(&self, _metric: Metric) -> f64 {
        self.minutes
    }
}

impl Dimensional for ScoredEvent {
    const TABLE: &'static str = "scored";
    const DIMENSIONS: &'static [Dimension] =
        &[Dimension::Competition, Dimension::EntityId, Dimension::Name];
    const METRICS: &'static [Metric] = &[
        Metric::Score,
        Metric::Games,
        Metric::Titles,
        Metric::Wins,
        Metric::Draws,
        Metric::Losses,
        Metric::Participations,
    ];

    fn dimension(&self, dim: Dimension) -> Option<DimValue> {
        match dim {
            Dimension::Competition => text(&self.record.competition),
            Dimension::EntityId => Some(DimValue::from(self.record.entity_id.as_str())),
            Dimension::Name => text(&self.record.name),
            _ => None,
        }
    }

    fn metric(&self, metric: Metric) -> f64 {
        let r = &self.record;
        match metric {
            Metric::Score => self.terms.score as f64,
            Metric::Games => r.games,
            Metric::Titles => r.titles,
            Metric::Wins => r.wins,
            Metric::Draws => r.draws,
            Metric::Losses => r.losses,
            Metric::Participations => r.participations,
            Metric::Minutes => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedRow {
    pub key: DimKey,
    pub value: f64,
    /// Number of source rows folded into this one.
    pub rows: usize,
}

/// Result of [`aggregate`]: the grouping it was built with plus one row per
/// distinct dimension tuple, in first-seen order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregated {
    pub dims: Vec<Dimension>,
    pub metric: Metric,
    pub rows: Vec<AggregatedRow>,
}

impl Aggregated {
    pub fn position(&self, dim: Dimension) -> Option<usize> {
        self.dims.iter().position(|d| *d == dim)
    }

    pub fn total(&self) -> f64 {
        self.rows.iter().map(|r| r.value).sum()
    }
}

pub fn aggregate<R: Dimensional>(rows: &[R], dims: &[Dimension], metric: Metric) -> Result<Aggregated> {
    if let Some(dim) = dims.iter().find(|d| !R::DIMENSIONS.contains(d)) {
        return Err(EngineError::schema(R::TABLE, dim.as_str()));
    }
    if !R::METRICS.contains(&metric) {
        return Err(EngineError::schema(R::TABLE, metric.as_str()));
    }

    let mut slots: HashMap<DimKey, usize> = HashMap::new();
    let mut out: Vec<AggregatedRow> = Vec::new();
    for row in rows {
        let key: DimKey = dims.iter().map(|d| row.dimension(*d)).collect();
        let value = row.metric(metric);
        match slots.get(&key) {
            Some(&slot) => {
                out[slot].value += value;
                out[slot].rows += 1;
            }
            None => {
                slots.insert(key.clone(), out.len());
                out.push(AggregatedRow { key, value, rows: 1 });
            }
        }
    }

    Ok(Aggregated {
        dims: dims.to_vec(),
        metric,
        rows: out,
    })
}
