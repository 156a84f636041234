//! Scouting analytics CLI
//!
//! Usage:
//!   scouting enriched --out out/enriched.csv
//!   scouting rollup --by competition,period,origin_country --metric minutes
//!   scouting rollup --by origin_group --year 2021,2022 --origin-country Brasil
//!   scouting rankings --partition competition --period period --subject origin_group --top 10
//!   scouting rankings --subject origin_group --only Santos
//!   scouting top-share --subject origin_group --n 5
//!   scouting scores --cohort 2004 --role Atacante
//!   scouting player --id 007 --json

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use polars::prelude::DataFrame;
use serde::Serialize;
use std::path::{Path, PathBuf};

use scouting::{
    aggregate::{aggregate, Aggregated, DimKey, DimValue, Dimension, Metric},
    config::Config,
    filter::{filter_rows, RowFilter},
    ingest::{load_appearance_sources, load_score_sources, SourceCache},
    outputs::{
        aggregated_to_frame, competition_summary_to_frame, enriched_to_frame, player_scores_to_frame,
        ranking_to_frame, to_csv_string, top_share_to_frame, write_csv,
    },
    profile::{competition_summary, filter_score_table, player_card, player_score_table},
    ranking::{rank_partitions, top_share},
};

#[derive(Parser)]
#[command(name = "scouting")]
#[command(about = "Minutes, rankings and scores for youth-development players")]
struct Cli {
    #[arg(long, global = true, default_value = "config/scouting.toml")]
    config: PathBuf,
    /// Print JSON lines instead of CSV
    #[arg(long, global = true)]
    json: bool,
    /// Write CSV to this file instead of stdout
    #[arg(long, global = true)]
    out: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

/// Restrict the rows before aggregating. Each flag takes a comma-separated
/// list; omitted flags do not restrict.
#[derive(Args)]
struct FilterArgs {
    #[arg(long, value_delimiter = ',')]
    year: Vec<i64>,
    #[arg(long, value_delimiter = ',')]
    competition: Vec<String>,
    #[arg(long, value_delimiter = ',')]
    origin_country: Vec<String>,
    #[arg(long, value_delimiter = ',')]
    current_country: Vec<String>,
}

impl FilterArgs {
    fn to_filter(&self) -> RowFilter {
        let text = |values: &[String]| values.iter().map(|v| DimValue::from(v.trim())).collect::<Vec<_>>();
        RowFilter::new()
            .select(Dimension::Period, self.year.iter().copied().map(DimValue::Int))
            .select(Dimension::Competition, text(&self.competition))
            .select(Dimension::OriginCountry, text(&self.origin_country))
            .select(Dimension::CurrentCountry, text(&self.current_country))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Appearances joined with player and club registers
    Enriched,
    /// Sum a metric over any set of dimensions
    Rollup {
        #[arg(long, value_delimiter = ',', required = true)]
        by: Vec<Dimension>,
        #[arg(long, default_value = "minutes")]
        metric: Metric,
        /// Add the number of source rows per group
        #[arg(long)]
        counts: bool,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Rank subjects per partition and period, with rank movement
    Rankings {
        #[arg(long, default_value = "competition")]
        partition: Dimension,
        #[arg(long, default_value = "period")]
        period: Dimension,
        #[arg(long, value_delimiter = ',', default_value = "origin_group")]
        subject: Vec<Dimension>,
        #[arg(long, default_value = "minutes")]
        metric: Metric,
        /// Keep ranks 1..=N of every slice; 0 keeps all. Defaults to the config value.
        #[arg(long)]
        top: Option<usize>,
        /// Keep only this subject, one value per subject dimension
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Share of each period's total held by the top N subjects
    TopShare {
        #[arg(long, default_value = "competition")]
        partition: Dimension,
        #[arg(long, default_value = "period")]
        period: Dimension,
        #[arg(long, value_delimiter = ',', default_value = "origin_group")]
        subject: Vec<Dimension>,
        #[arg(long, default_value = "minutes")]
        metric: Metric,
        #[arg(long)]
        n: Option<usize>,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Weighted player score table
    Scores {
        #[arg(long)]
        cohort: Option<i64>,
        #[arg(long)]
        role: Option<String>,
        /// 0 keeps all
        #[arg(long, default_value = "0")]
        top: usize,
    },
    /// Ranks and per-competition totals of one player
    Player {
        #[arg(long)]
        id: String,
    },
}

struct Output {
    json: bool,
    out: Option<PathBuf>,
}

impl Output {
    fn emit<T: Serialize>(&self, mut df: DataFrame, rows: &[T]) -> Result<()> {
        if self.json {
            for row in rows {
                println!("{}", serde_json::to_string(row)?);
            }
            return Ok(());
        }
        match &self.out {
            Some(path) => write_csv(&mut df, path),
            None => {
                print!("{}", to_csv_string(&mut df)?);
                Ok(())
            }
        }
    }
}

/// Minutes come from the enriched appearances; every other metric from the
/// scored games sheet. `filter` is applied before grouping, so ranks built on
/// the result only see the kept rows.
fn load_rollup(
    config: &Config,
    cache: &mut SourceCache,
    dims: &[Dimension],
    metric: Metric,
    filter: &RowFilter,
) -> Result<Aggregated> {
    let aggregated = if metric == Metric::Minutes {
        let sources = load_appearance_sources(config, cache)?;
        let rows = filter_rows(&sources.enriched(), filter)?;
        aggregate(&rows, dims, metric)?
    } else {
        let sources = load_score_sources(config, cache)?;
        let rows = filter_rows(&sources.scored(), filter)
            .with_context(|| format!("{} rows cannot be filtered that way", metric))?;
        aggregate(&rows, dims, metric)?
    };
    if !filter.is_empty() {
        tracing::info!("Filtered on {:?}", filter.dimensions().collect::<Vec<_>>());
    }
    tracing::info!("Aggregated {} groups by {:?}", aggregated.rows.len(), dims);
    Ok(aggregated)
}

fn subject_key(subject: &[Dimension], values: &[String]) -> Result<DimKey> {
    if subject.len() != values.len() {
        anyhow::bail!(
            "--only takes {} values (one per subject dimension), got {}",
            subject.len(),
            values.len()
        );
    }
    subject
        .iter()
        .zip(values)
        .map(|(dim, raw)| {
            if dim.is_ordinal() {
                let value: i64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("'{}' is not a valid {}", raw, dim))?;
                Ok(Some(DimValue::Int(value)))
            } else {
                Ok(Some(DimValue::from(raw.as_str())))
            }
        })
        .collect()
}

fn run_enriched(config: &Config, output: &Output) -> Result<()> {
    let sources = load_appearance_sources(config, &mut SourceCache::new())?;
    for reference in sources.unresolved() {
        tracing::debug!("Unresolved: {}", reference);
    }
    let rows = sources.enriched();
    output.emit(enriched_to_frame(&rows)?, &rows)
}

fn run_rollup(
    config: &Config,
    output: &Output,
    by: &[Dimension],
    metric: Metric,
    counts: bool,
    filter: &RowFilter,
) -> Result<()> {
    let aggregated = load_rollup(config, &mut SourceCache::new(), by, metric, filter)?;
    output.emit(aggregated_to_frame(&aggregated, counts)?, &aggregated.rows)
}

#[allow(clippy::too_many_arguments)]
fn run_rankings(
    config: &Config,
    output: &Output,
    partition: Dimension,
    period: Dimension,
    subject: &[Dimension],
    metric: Metric,
    top: Option<usize>,
    only: &[String],
    filter: &RowFilter,
) -> Result<()> {
    let dims: Vec<Dimension> = [partition, period].into_iter().chain(subject.iter().copied()).collect();
    let aggregated = load_rollup(config, &mut SourceCache::new(), &dims, metric, filter)?;

    let mut ranking = rank_partitions(&aggregated, partition, period)?;
    if !only.is_empty() {
        ranking = ranking.for_subject(&subject_key(&ranking.subject, only)?);
    }
    let top = top.unwrap_or(config.ranking.top_n);
    if top > 0 {
        ranking = ranking.top_n(top);
    }
    tracing::info!("Ranked {} rows", ranking.rows.len());
    output.emit(ranking_to_frame(&ranking)?, &ranking.rows)
}

#[allow(clippy::too_many_arguments)]
fn run_top_share(
    config: &Config,
    output: &Output,
    partition: Dimension,
    period: Dimension,
    subject: &[Dimension],
    metric: Metric,
    n: Option<usize>,
    filter: &RowFilter,
) -> Result<()> {
    let dims: Vec<Dimension> = [partition, period].into_iter().chain(subject.iter().copied()).collect();
    let aggregated = load_rollup(config, &mut SourceCache::new(), &dims, metric, filter)?;

    let n = n.unwrap_or(config.ranking.top_share_n);
    let shares = top_share(&aggregated, partition, period, n)?;
    output.emit(top_share_to_frame(&shares, partition, period, metric)?, &shares)
}

fn run_scores(config: &Config, output: &Output, cohort: Option<i64>, role: Option<&str>, top: usize) -> Result<()> {
    let sources = load_score_sources(config, &mut SourceCache::new())?;
    let table = player_score_table(&sources.games, &sources.roster, &sources.competitions)?;
    let table = filter_score_table(&table, cohort, role, top);
    tracing::info!("Score table has {} players", table.len());
    output.emit(player_scores_to_frame(&table)?, &table)
}

fn run_player(config: &Config, output: &Output, id: &str) -> Result<()> {
    let sources = load_score_sources(config, &mut SourceCache::new())?;
    let table = player_score_table(&sources.games, &sources.roster, &sources.competitions)?;
    let card = player_card(&table, id).with_context(|| format!("Player {} has no game records", id))?;

    if output.json {
        println!("{}", serde_json::to_string(&card)?);
    } else {
        eprintln!(
            "Player {}: score {} | overall #{} | cohort #{} | role #{}",
            card.entity_id,
            card.total_score,
            card.overall_rank,
            rank_label(card.cohort_rank),
            rank_label(card.role_rank),
        );
    }

    let summary = competition_summary(&sources.scored(), id);
    output.emit(competition_summary_to_frame(&summary)?, &summary)
}

fn rank_label(rank: Option<u32>) -> String {
    rank.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(Path::new(&cli.config))?;
    let output = Output {
        json: cli.json,
        out: cli.out,
    };

    match cli.command {
        Commands::Enriched => run_enriched(&config, &output)?,
        Commands::Rollup { by, metric, counts, filter } => {
            run_rollup(&config, &output, &by, metric, counts, &filter.to_filter())?
        }
        Commands::Rankings { partition, period, subject, metric, top, only, filter } => {
            run_rankings(&config, &output, partition, period, &subject, metric, top, &only, &filter.to_filter())?
        }
        Commands::TopShare { partition, period, subject, metric, n, filter } => {
            run_top_share(&config, &output, partition, period, &subject, metric, n, &filter.to_filter())?
        }
        Commands::Scores { cohort, role, top } => run_scores(&config, &output, cohort, role.as_deref(), top)?,
        Commands::Player { id } => run_player(&config, &output, &id)?,
    }

    Ok(())
}
