//! Dense rankings per partition and period, with rank movement
//!
//! Rows of an [`Aggregated`] table are split by a partition dimension (e.g.
//! competition) and a period dimension (e.g. year). Every other dimension of
//! the table forms the ranked subject. Within a slice, subjects are ordered
//! by value descending and then by subject key ascending, with the entity id
//! compared first when it is part of the subject. Equal values never share a
//! rank and the order never depends on input order.
//!
//! Movement (`delta`) compares a subject's rank with its rank in the most
//! recent earlier period in which the same subject was ranked inside the same
//! partition. Periods without data are skipped, never synthesized. A positive
//! delta means the subject climbed.

use crate::aggregate::{Aggregated, AggregatedRow, DimKey, DimValue, Dimension, Metric};
use crate::error::{EngineError, Result};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingRow {
    pub partition: Option<DimValue>,
    pub period: Option<DimValue>,
    pub subject: DimKey,
    pub value: f64,
    pub rank: u32,
    /// `previous rank - rank`; `None` when the subject has no earlier rank.
    pub delta: Option<i64>,
}

/// Ranked rows ordered by partition, period and rank.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranking {
    pub metric: Metric,
    pub partition: Option<Dimension>,
    pub period: Option<Dimension>,
    /// Dimensions making up [`RankingRow::subject`], in table order.
    pub subject: Vec<Dimension>,
    pub rows: Vec<RankingRow>,
}

impl Ranking {
    /// Keep ranks `1..=n` of every slice. Ranks and deltas are untouched.
    pub fn top_n(&self, n: usize) -> Ranking {
        self.filtered(|row| (row.rank as usize) <= n)
    }

    /// Keep one subject's rows. Ranks and deltas are untouched.
    pub fn for_subject(&self, subject: &DimKey) -> Ranking {
        self.filtered(|row| &row.subject == subject)
    }

    fn filtered(&self, keep: impl Fn(&RankingRow) -> bool) -> Ranking {
        Ranking {
            metric: self.metric,
            partition: self.partition,
            period: self.period,
            subject: self.subject.clone(),
            rows: self.rows.iter().filter(|row| keep(row)).cloned().collect(),
        }
    }
}

/// Rank every (partition, period) slice of `aggregated` by its metric.
///
/// Rows with a null period cannot be placed in time and are left out.
pub fn rank_partitions(aggregated: &Aggregated, partition: Dimension, period: Dimension) -> Result<Ranking> {
    let partition_at = locate(aggregated, partition)?;
    let period_at = locate(aggregated, period)?;
    Ok(rank_slices(aggregated, Some((partition, partition_at)), Some((period, period_at))))
}

/// Rank the whole table as one slice. Deltas are always `None`.
pub fn rank_overall(aggregated: &Aggregated) -> Ranking {
    rank_slices(aggregated, None, None)
}

/// Rank within each value of `partition`, without periods.
pub fn rank_within(aggregated: &Aggregated, partition: Dimension) -> Result<Ranking> {
    let partition_at = locate(aggregated, partition)?;
    Ok(rank_slices(aggregated, Some((partition, partition_at)), None))
}

fn locate(aggregated: &Aggregated, dim: Dimension) -> Result<usize> {
    aggregated
        .position(dim)
        .ok_or_else(|| EngineError::schema("aggregated", dim.as_str()))
}

type Slices<'a> = BTreeMap<Option<DimValue>, BTreeMap<Option<DimValue>, Vec<&'a AggregatedRow>>>;

fn rank_slices(
    aggregated: &Aggregated,
    partition: Option<(Dimension, usize)>,
    period: Option<(Dimension, usize)>,
) -> Ranking {
    let fixed: Vec<usize> = partition.iter().chain(period.iter()).map(|(_, at)| *at).collect();
    let subject_at: Vec<usize> = (0..aggregated.dims.len()).filter(|i| !fixed.contains(i)).collect();
    // Same columns as the subject, with the entity id moved to the front.
    let mut tie_at = subject_at.clone();
    tie_at.sort_by_key(|&i| aggregated.dims[i] != Dimension::EntityId);

    let mut slices: Slices = BTreeMap::new();
    for row in &aggregated.rows {
        let partition_value = partition.and_then(|(_, at)| row.key[at].clone());
        let period_value = match period {
            Some((_, at)) => match &row.key[at] {
                Some(value) => Some(value.clone()),
                None => continue,
            },
            None => None,
        };
        slices
            .entry(partition_value)
            .or_default()
            .entry(period_value)
            .or_default()
            .push(row);
    }

    let mut out = Vec::new();
    for (partition_value, periods) in slices {
        // Last rank seen for each subject in this partition, walking forward in time.
        let mut last_rank: HashMap<DimKey, u32> = HashMap::new();
        for (period_value, rows) in periods {
            let subjects: Vec<DimKey> = rows.iter().map(|r| subject_key(r, &subject_at)).collect();
            let ties: Vec<DimKey> = rows.iter().map(|r| subject_key(r, &tie_at)).collect();
            let mut order: Vec<usize> = (0..rows.len()).collect();
            order.sort_by(|&a, &b| compare(rows[a].value, &ties[a], rows[b].value, &ties[b]));

            let mut ranked = Vec::with_capacity(order.len());
            for (position, &i) in order.iter().enumerate() {
                let rank = position as u32 + 1;
                let subject = subjects[i].clone();
                let delta = last_rank
                    .get(&subject)
                    .map(|previous| i64::from(*previous) - i64::from(rank));
                ranked.push(RankingRow {
                    partition: partition_value.clone(),
                    period: period_value.clone(),
                    subject,
                    value: rows[i].value,
                    rank,
                    delta,
                });
            }

            for row in &ranked {
                last_rank.insert(row.subject.clone(), row.rank);
            }
            out.extend(ranked);
        }
    }

    Ranking {
        metric: aggregated.metric,
        partition: partition.map(|(dim, _)| dim),
        period: period.map(|(dim, _)| dim),
        subject: subject_at.iter().map(|&i| aggregated.dims[i]).collect(),
        rows: out,
    }
}

fn subject_key(row: &AggregatedRow, subject_at: &[usize]) -> DimKey {
    subject_at.iter().map(|&i| row.key[i].clone()).collect()
}

fn compare(a_value: f64, a_subject: &DimKey, b_value: f64, b_subject: &DimKey) -> Ordering {
    b_value
        .total_cmp(&a_value)
        .then_with(|| a_subject.cmp(b_subject))
}

/// Top-N leaders of one period and the share of the period total they hold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopShare {
    pub partition: Option<DimValue>,
    pub period: Option<DimValue>,
    /// `(subject, value)` for ranks `1..=n`, best first.
    pub leaders: Vec<(DimKey, f64)>,
    pub total: f64,
    /// Percentage of `total` held by the leaders; 0 when the total is 0.
    pub share_pct: f64,
}

/// Per partition (ascending) and period (newest first), the top `n` subjects
/// and the share of the period's total they account for.
pub fn top_share(aggregated: &Aggregated, partition: Dimension, period: Dimension, n: usize) -> Result<Vec<TopShare>> {
    let ranking = rank_partitions(aggregated, partition, period)?;

    let mut slices: BTreeMap<Option<DimValue>, BTreeMap<Option<DimValue>, Vec<&RankingRow>>> = BTreeMap::new();
    for row in &ranking.rows {
        slices
            .entry(row.partition.clone())
            .or_default()
            .entry(row.period.clone())
            .or_default()
            .push(row);
    }

    let mut out = Vec::new();
    for (partition_value, periods) in slices {
        for (period_value, rows) in periods.into_iter().rev() {
            let total: f64 = rows.iter().map(|r| r.value).sum();
            let leaders: Vec<(DimKey, f64)> = rows
                .iter()
                .filter(|r| (r.rank as usize) <= n)
                .map(|r| (r.subject.clone(), r.value))
                .collect();
            let top: f64 = leaders.iter().map(|(_, v)| v).sum();
            let share_pct = if total > 0.0 { top / total * 100.0 } else { 0.0 };
            out.push(TopShare {
                partition: partition_value.clone(),
                period: period_value,
                leaders,
                total,
                share_pct,
            });
        }
    }
    Ok(out)
}
