//! Output frames and CSV writing for engine results
//!
//! Frames use the display headers of the source sheets so a written table can
//! be opened next to the originals. The enriched table can be read back with
//! [`Record`], and rollups with [`aggregated_from_frame`].

use crate::aggregate::{Aggregated, AggregatedRow, DimKey, DimValue, Dimension, Metric};
use crate::error::Result;
use crate::join::EnrichedEvent;
use crate::normalize::{
    key_column, metric_column, normalize, optional_metric_column, optional_text_column, ordinal_column,
    text_column, ColumnKind, ColumnSpec, Record, TableLayout,
};
use crate::profile::{CompetitionSummary, PlayerScore};
use crate::ranking::{Ranking, TopShare};
use crate::schema::col;
use polars::prelude::*;
use std::path::Path;

pub const RANK_COLUMN: &str = "Rank";
pub const DELTA_COLUMN: &str = "Δ Posição";
pub const COUNT_COLUMN: &str = "Registros";

const ENRICHED_TABLE: &str = "enriched";

impl Record for EnrichedEvent {
    fn layout() -> TableLayout {
        TableLayout::new(
            ENRICHED_TABLE,
            &[
                (Dimension::Competition.display_name(), col::COMPETITION),
                (Dimension::Period.display_name(), col::PERIOD),
                (Dimension::Name.display_name(), col::NAME),
                (Dimension::EntityId.display_name(), col::ENTITY_ID),
                (Dimension::CurrentGroup.display_name(), col::CURRENT_GROUP_KEY),
                (Metric::Minutes.display_name(), col::MINUTES),
                (Dimension::OriginGroup.display_name(), col::ORIGIN_GROUP_KEY),
                (Dimension::OriginCountry.display_name(), col::ORIGIN_COUNTRY),
                (Dimension::CurrentCountry.display_name(), col::CURRENT_COUNTRY),
                (Dimension::Role.display_name(), col::ROLE),
                (Dimension::CohortYear.display_name(), col::COHORT_YEAR),
            ],
            vec![
                ColumnSpec::required(col::COMPETITION, ColumnKind::Text),
                ColumnSpec::required(col::PERIOD, ColumnKind::Ordinal),
                ColumnSpec::required(col::ENTITY_ID, ColumnKind::Text),
                ColumnSpec::required(col::CURRENT_GROUP_KEY, ColumnKind::Text),
                ColumnSpec::required(col::MINUTES, ColumnKind::Metric),
                ColumnSpec::optional(col::NAME, ColumnKind::Text),
                ColumnSpec::optional(col::ORIGIN_GROUP_KEY, ColumnKind::Text),
                ColumnSpec::optional(col::ORIGIN_COUNTRY, ColumnKind::Text),
                ColumnSpec::optional(col::CURRENT_COUNTRY, ColumnKind::Text),
                ColumnSpec::optional(col::ROLE, ColumnKind::Text),
                ColumnSpec::optional(col::COHORT_YEAR, ColumnKind::Ordinal),
            ],
        )
    }

    fn from_frame(df: &DataFrame) -> Result<Vec<Self>> {
        let t = ENRICHED_TABLE;
        let competitions = text_column(df, t, col::COMPETITION)?;
        let periods = ordinal_column(df, t, col::PERIOD)?;
        let ids = key_column(df, t, col::ENTITY_ID)?;
        let names = optional_text_column(df, t, col::NAME)?;
        let current = text_column(df, t, col::CURRENT_GROUP_KEY)?;
        let minutes = metric_column(df, t, col::MINUTES)?;
        let origin = optional_text_column(df, t, col::ORIGIN_GROUP_KEY)?;
        let origin_country = optional_text_column(df, t, col::ORIGIN_COUNTRY)?;
        let current_country = optional_text_column(df, t, col::CURRENT_COUNTRY)?;
        let roles = optional_text_column(df, t, col::ROLE)?;
        let cohorts = ordinal_column(df, t, col::COHORT_YEAR)?;

        Ok((0..df.height())
            .map(|i| EnrichedEvent {
                competition: competitions[i].clone(),
                period: periods[i],
                entity_id: ids[i].clone(),
                name: names[i].clone(),
                current_group_key: current[i].clone(),
                minutes: minutes[i],
                origin_group_key: origin[i].clone(),
                cohort_year: cohorts[i],
                role: roles[i].clone(),
                origin_country: origin_country[i].clone(),
                current_country: current_country[i].clone(),
            })
            .collect())
    }
}

/// The joined appearance table, one row per appearance.
pub fn enriched_to_frame(rows: &[EnrichedEvent]) -> Result<DataFrame> {
    let competition: Vec<Option<&str>> = rows.iter().map(|r| r.competition.as_deref()).collect();
    let period: Vec<Option<i64>> = rows.iter().map(|r| r.period).collect();
    let name: Vec<Option<&str>> = rows.iter().map(|r| r.name.as_deref()).collect();
    let entity_id: Vec<&str> = rows.iter().map(|r| r.entity_id.as_str()).collect();
    let current: Vec<Option<&str>> = rows.iter().map(|r| r.current_group_key.as_deref()).collect();
    let minutes: Vec<f64> = rows.iter().map(|r| r.minutes).collect();
    let origin: Vec<Option<&str>> = rows.iter().map(|r| r.origin_group_key.as_deref()).collect();
    let origin_country: Vec<Option<&str>> = rows.iter().map(|r| r.origin_country.as_deref()).collect();
    let current_country: Vec<Option<&str>> = rows.iter().map(|r| r.current_country.as_deref()).collect();
    let role: Vec<Option<&str>> = rows.iter().map(|r| r.role.as_deref()).collect();
    let cohort: Vec<Option<i64>> = rows.iter().map(|r| r.cohort_year).collect();

    Ok(DataFrame::new(vec![
        Series::new(Dimension::Competition.display_name(), competition),
        Series::new(Dimension::Period.display_name(), period),
        Series::new(Dimension::Name.display_name(), name),
        Series::new(Dimension::EntityId.display_name(), entity_id),
        Series::new(Dimension::CurrentGroup.display_name(), current),
        Series::new(Metric::Minutes.display_name(), minutes),
        Series::new(Dimension::OriginGroup.display_name(), origin),
        Series::new(Dimension::OriginCountry.display_name(), origin_country),
        Series::new(Dimension::CurrentCountry.display_name(), current_country),
        Series::new(Dimension::Role.display_name(), role),
        Series::new(Dimension::CohortYear.display_name(), cohort),
    ])?)
}

fn dim_series<'a>(dim: Dimension, values: impl Iterator<Item = Option<&'a DimValue>>) -> Series {
    if dim.is_ordinal() {
        let column: Vec<Option<i64>> = values
            .map(|v| match v {
                Some(DimValue::Int(i)) => Some(*i),
                Some(DimValue::Text(s)) => s.parse().ok(),
                None => None,
            })
            .collect();
        Series::new(dim.display_name(), column)
    } else {
        let column: Vec<Option<String>> = values.map(|v| v.map(DimValue::to_string)).collect();
        Series::new(dim.display_name(), column)
    }
}

/// One column per grouping dimension, then the metric. `with_counts` adds
/// the number of source rows behind each group.
pub fn aggregated_to_frame(aggregated: &Aggregated, with_counts: bool) -> Result<DataFrame> {
    let mut columns: Vec<Series> = aggregated
        .dims
        .iter()
        .enumerate()
        .map(|(i, dim)| dim_series(*dim, aggregated.rows.iter().map(|r| r.key[i].as_ref())))
        .collect();

    let values: Vec<f64> = aggregated.rows.iter().map(|r| r.value).collect();
    columns.push(Series::new(aggregated.metric.display_name(), values));

    if with_counts {
        let counts: Vec<u64> = aggregated.rows.iter().map(|r| r.rows as u64).collect();
        columns.push(Series::new(COUNT_COLUMN, counts));
    }

    Ok(DataFrame::new(columns)?)
}

/// Read a rollup written by [`aggregated_to_frame`] back into a table keyed
/// by `dims`. Cells that do not parse follow the usual rules: metrics read
/// as zero and ordinals as null. Without a count column every row counts
/// as one.
pub fn aggregated_from_frame(raw: &DataFrame, dims: &[Dimension], metric: Metric) -> Result<Aggregated> {
    let mut columns: Vec<ColumnSpec> = dims
        .iter()
        .map(|dim| {
            let kind = if dim.is_ordinal() { ColumnKind::Ordinal } else { ColumnKind::Text };
            ColumnSpec::required(dim.display_name(), kind)
        })
        .collect();
    columns.push(ColumnSpec::required(metric.display_name(), ColumnKind::Metric));
    columns.push(ColumnSpec::optional(COUNT_COLUMN, ColumnKind::Metric));

    let table = "aggregated";
    let layout = TableLayout::new(table, &[], columns);
    let df = normalize(raw, &layout)?.frame;

    let mut keys: Vec<Vec<Option<DimValue>>> = Vec::with_capacity(dims.len());
    for dim in dims {
        let column: Vec<Option<DimValue>> = if dim.is_ordinal() {
            ordinal_column(&df, table, dim.display_name())?
                .into_iter()
                .map(|v| v.map(DimValue::Int))
                .collect()
        } else {
            text_column(&df, table, dim.display_name())?
                .into_iter()
                .map(|v| v.map(DimValue::Text))
                .collect()
        };
        keys.push(column);
    }
    let values = metric_column(&df, table, metric.display_name())?;
    let counts = optional_metric_column(&df, table, COUNT_COLUMN)?;

    let rows = (0..df.height())
        .map(|i| AggregatedRow {
            key: keys.iter().map(|column| column[i].clone()).collect(),
            value: values[i],
            rows: if counts[i] > 0.0 { counts[i] as usize } else { 1 },
        })
        .collect();

    Ok(Aggregated {
        dims: dims.to_vec(),
        metric,
        rows,
    })
}

/// Partition, period and subject columns, then the value, rank and movement.
pub fn ranking_to_frame(ranking: &Ranking) -> Result<DataFrame> {
    let mut columns = Vec::new();
    if let Some(dim) = ranking.partition {
        columns.push(dim_series(dim, ranking.rows.iter().map(|r| r.partition.as_ref())));
    }
    if let Some(dim) = ranking.period {
        columns.push(dim_series(dim, ranking.rows.iter().map(|r| r.period.as_ref())));
    }
    for (i, dim) in ranking.subject.iter().enumerate() {
        columns.push(dim_series(*dim, ranking.rows.iter().map(|r| r.subject[i].as_ref())));
    }

    let values: Vec<f64> = ranking.rows.iter().map(|r| r.value).collect();
    let ranks: Vec<u32> = ranking.rows.iter().map(|r| r.rank).collect();
    let deltas: Vec<Option<i64>> = ranking.rows.iter().map(|r| r.delta).collect();
    columns.push(Series::new(ranking.metric.display_name(), values));
    columns.push(Series::new(RANK_COLUMN, ranks));
    columns.push(Series::new(DELTA_COLUMN, deltas));

    Ok(DataFrame::new(columns)?)
}

fn subject_label(subject: &DimKey) -> String {
    subject
        .iter()
        .map(|v| v.as_ref().map(DimValue::to_string).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(" / ")
}

/// One row per partition and period with the leaders joined by `;`.
pub fn top_share_to_frame(
    shares: &[TopShare],
    partition: Dimension,
    period: Dimension,
    metric: Metric,
) -> Result<DataFrame> {
    let leaders: Vec<String> = shares
        .iter()
        .map(|s| {
            s.leaders
                .iter()
                .map(|(subject, _)| subject_label(subject))
                .collect::<Vec<_>>()
                .join("; ")
        })
        .collect();
    let top: Vec<f64> = shares
        .iter()
        .map(|s| s.leaders.iter().map(|(_, v)| v).sum())
        .collect();
    let total: Vec<f64> = shares.iter().map(|s| s.total).collect();
    let share: Vec<f64> = shares.iter().map(|s| s.share_pct).collect();

    Ok(DataFrame::new(vec![
        dim_series(partition, shares.iter().map(|s| s.partition.as_ref())),
        dim_series(period, shares.iter().map(|s| s.period.as_ref())),
        Series::new("Líderes", leaders),
        Series::new(&format!("{} Top", metric.display_name()), top),
        Series::new(&format!("{} Total", metric.display_name()), total),
        Series::new("% Top", share),
    ])?)
}

pub fn player_scores_to_frame(table: &[PlayerScore]) -> Result<DataFrame> {
    let rank: Vec<u32> = table.iter().map(|p| p.rank).collect();
    let name: Vec<Option<&str>> = table.iter().map(|p| p.name.as_deref()).collect();
    let entity_id: Vec<&str> = table.iter().map(|p| p.entity_id.as_str()).collect();
    let role: Vec<Option<&str>> = table.iter().map(|p| p.role.as_deref()).collect();
    let cohort: Vec<Option<i64>> = table.iter().map(|p| p.cohort_year).collect();
    let score: Vec<i64> = table.iter().map(|p| p.total_score).collect();
    let games: Vec<f64> = table.iter().map(|p| p.total_games).collect();
    let titles: Vec<f64> = table.iter().map(|p| p.titles).collect();
    let competitions: Vec<u64> = table.iter().map(|p| p.competitions as u64).collect();

    Ok(DataFrame::new(vec![
        Series::new(RANK_COLUMN, rank),
        Series::new("Jogador", name),
        Series::new("ID", entity_id),
        Series::new("Posição", role),
        Series::new("Ano", cohort),
        Series::new("Pontuacao_Total", score),
        Series::new("Total_Jogos", games),
        Series::new("Titulos", titles),
        Series::new("Competicoes", competitions),
    ])?)
}

pub fn competition_summary_to_frame(summary: &[CompetitionSummary]) -> Result<DataFrame> {
    let competition: Vec<Option<&str>> = summary.iter().map(|s| s.competition.as_deref()).collect();
    let participations: Vec<f64> = summary.iter().map(|s| s.participations).collect();
    let titles: Vec<f64> = summary.iter().map(|s| s.titles).collect();
    let games: Vec<f64> = summary.iter().map(|s| s.games).collect();
    let wins: Vec<f64> = summary.iter().map(|s| s.wins).collect();
    let draws: Vec<f64> = summary.iter().map(|s| s.draws).collect();
    let losses: Vec<f64> = summary.iter().map(|s| s.losses).collect();
    let score: Vec<i64> = summary.iter().map(|s| s.score).collect();

    Ok(DataFrame::new(vec![
        Series::new(Dimension::Competition.display_name(), competition),
        Series::new(Metric::Participations.display_name(), participations),
        Series::new(Metric::Titles.display_name(), titles),
        Series::new(Metric::Games.display_name(), games),
        Series::new(Metric::Wins.display_name(), wins),
        Series::new(Metric::Draws.display_name(), draws),
        Series::new(Metric::Losses.display_name(), losses),
        Series::new(Metric::Score.display_name(), score),
    ])?)
}

/// Render a frame as CSV text with a header row.
pub fn to_csv_string(df: &mut DataFrame) -> anyhow::Result<String> {
    let mut buf: Vec<u8> = Vec::new();
    CsvWriter::new(&mut buf).include_header(true).finish(df)?;
    Ok(String::from_utf8(buf)?)
}

/// Write a frame to `path` as CSV, creating parent directories as needed.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let mut file = std::fs::File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;

    tracing::info!("Wrote {} rows to {:?}", df.height(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::ingest::read_csv;
    use crate::ingest::read_csv_bytes;
    use crate::normalize::load_records;
    use crate::ranking::{rank_partitions, top_share};
    use std::collections::HashMap;

    fn make_event(comp: &str, year: i64, id: &str, origin: &str, minutes: f64) -> EnrichedEvent {
        EnrichedEvent {
            competition: Some(comp.to_string()),
            period: Some(year),
            entity_id: id.to_string(),
            name: Some(format!("Player {}", id)),
            current_group_key: Some("Current FC".to_string()),
            minutes,
            origin_group_key: Some(origin.to_string()),
            cohort_year: None,
            role: Some("Forward".to_string()),
            origin_country: Some("Brazil".to_string()),
            current_country: None,
        }
    }

    fn make_events() -> Vec<EnrichedEvent> {
        vec![
            make_event("Serie A", 2021, "007", "Santos", 90.0),
            make_event("Serie A", 2021, "8", "Flamengo", 120.5),
            make_event("Serie A", 2022, "007", "Santos", 300.0),
            make_event("Serie A", 2022, "8", "Flamengo", 45.0),
        ]
    }

    #[test]
    fn test_enriched_frame_headers() {
        let df = enriched_to_frame(&make_events()).unwrap();
        assert_eq!(df.height(), 4);
        assert_eq!(
            df.get_column_names(),
            vec![
                "Campeonato",
                "Ano",
                "Nome Jogador",
                "ID Jogador",
                "Clube Atual",
                "Minutos",
                "Clube Revelador",
                "pais_clube_revelador",
                "pais_clube_atual",
                "Posição",
                "Ano Cadastro",
            ]
        );
    }

    #[test]
    fn test_enriched_csv_reads_back() {
        let events = make_events();
        let mut df = enriched_to_frame(&events).unwrap();
        let csv = to_csv_string(&mut df).unwrap();

        let raw = read_csv_bytes(csv.as_bytes()).unwrap();
        let loaded = load_records::<EnrichedEvent>(&raw, &HashMap::new()).unwrap();
        assert!(loaded.warnings.is_empty());
        assert_eq!(loaded.rows, events);
        assert_eq!(loaded.rows[0].entity_id, "007");
    }

    #[test]
    fn test_rollup_file_reads_back() {
        let events = make_events();
        let dims = [Dimension::Competition, Dimension::Period, Dimension::OriginGroup];
        let rollup = aggregate(&events, &dims, Metric::Minutes).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("rollup.csv");
        let mut df = aggregated_to_frame(&rollup, true).unwrap();
        write_csv(&mut df, &path).unwrap();

        let raw = read_csv(&path).unwrap();
        let back = aggregated_from_frame(&raw, &dims, Metric::Minutes).unwrap();
        assert_eq!(back, rollup);
    }

    #[test]
    fn test_rollup_without_counts() {
        let rollup = aggregate(&make_events(), &[Dimension::EntityId], Metric::Minutes).unwrap();
        let df = aggregated_to_frame(&rollup, false).unwrap();
        assert_eq!(df.get_column_names(), vec!["ID Jogador", "Minutos"]);

        let back = aggregated_from_frame(&df, &[Dimension::EntityId], Metric::Minutes).unwrap();
        assert!(back.rows.iter().all(|r| r.rows == 1));
        assert_eq!(back.total(), rollup.total());
    }

    #[test]
    fn test_rollup_missing_dimension_column() {
        let rollup = aggregate(&make_events(), &[Dimension::EntityId], Metric::Minutes).unwrap();
        let df = aggregated_to_frame(&rollup, false).unwrap();
        let err = aggregated_from_frame(&df, &[Dimension::Role], Metric::Minutes).unwrap_err();
        assert!(err.to_string().contains("Posição"));
    }

    #[test]
    fn test_ranking_frame() {
        let dims = [Dimension::Competition, Dimension::Period, Dimension::OriginGroup];
        let rollup = aggregate(&make_events(), &dims, Metric::Minutes).unwrap();
        let ranking = rank_partitions(&rollup, Dimension::Competition, Dimension::Period).unwrap();
        let df = ranking_to_frame(&ranking).unwrap();

        assert_eq!(
            df.get_column_names(),
            vec!["Campeonato", "Ano", "Clube Revelador", "Minutos", "Rank", "Δ Posição"]
        );
        let deltas: Vec<Option<i64>> = df.column(DELTA_COLUMN).unwrap().i64().unwrap().into_iter().collect();
        // 2021: Flamengo 1, Santos 2. 2022: Santos 1 (+1), Flamengo 2 (-1).
        assert_eq!(deltas, vec![None, None, Some(1), Some(-1)]);
    }

    #[test]
    fn test_top_share_frame() {
        let dims = [Dimension::Competition, Dimension::Period, Dimension::OriginGroup];
        let rollup = aggregate(&make_events(), &dims, Metric::Minutes).unwrap();
        let shares = top_share(&rollup, Dimension::Competition, Dimension::Period, 1).unwrap();
        let df = top_share_to_frame(&shares, Dimension::Competition, Dimension::Period, Metric::Minutes).unwrap();

        assert_eq!(df.height(), 2);
        let leaders: Vec<Option<&str>> = df.column("Líderes").unwrap().str().unwrap().into_iter().collect();
        // Newest period first.
        assert_eq!(leaders, vec![Some("Santos"), Some("Flamengo")]);
    }
}
