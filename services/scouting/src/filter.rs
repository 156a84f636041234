//! Row filters applied before aggregation
//!
//! Each selection restricts one dimension to a set of accepted values. An
//! empty set means no restriction. A row whose value is null never passes an
//! active selection. Ranks computed after filtering come from the filtered
//! population only.

use crate::aggregate::{DimValue, Dimension, Dimensional};
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowFilter {
    selections: Vec<(Dimension, Vec<DimValue>)>,
}

impl RowFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict `dim` to `values`. Calling again for the same dimension
    /// replaces the earlier selection.
    pub fn select(mut self, dim: Dimension, values: impl IntoIterator<Item = DimValue>) -> Self {
        let values: Vec<DimValue> = values.into_iter().collect();
        self.selections.retain(|(d, _)| *d != dim);
        if !values.is_empty() {
            self.selections.push((dim, values));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    pub fn dimensions(&self) -> impl Iterator<Item = Dimension> + '_ {
        self.selections.iter().map(|(dim, _)| *dim)
    }

    pub fn matches<R: Dimensional>(&self, row: &R) -> bool {
        self.selections
            .iter()
            .all(|(dim, accepted)| row.dimension(*dim).map_or(false, |v| accepted.contains(&v)))
    }
}

/// Keep the rows that pass every selection, in input order.
///
/// Fails when a selection names a dimension the rows do not carry, instead of
/// silently dropping every row.
pub fn filter_rows<R: Dimensional + Clone>(rows: &[R], filter: &RowFilter) -> Result<Vec<R>> {
    if let Some(dim) = filter.dimensions().find(|d| !R::DIMENSIONS.contains(d)) {
        return Err(EngineError::schema(R::TABLE, dim.as_str()));
    }
    Ok(rows.iter().filter(|row| filter.matches(*row)).cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{aggregate, Metric};
    use crate::join::EnrichedEvent;
    use crate::ranking::rank_partitions;
    use crate::schema::GameRecord;
    use crate::scoring::score_events;

    fn make_row(period: Option<i64>, competition: &str, origin: Option<&str>, current: Option<&str>) -> EnrichedEvent {
        EnrichedEvent {
            competition: Some(competition.to_string()),
            period,
            entity_id: "1".to_string(),
            name: None,
            current_group_key: Some("C".to_string()),
            minutes: 90.0,
            origin_group_key: Some("O".to_string()),
            cohort_year: None,
            role: None,
            origin_country: origin.map(str::to_string),
            current_country: current.map(str::to_string),
        }
    }

    fn text(values: &[&str]) -> Vec<DimValue> {
        values.iter().map(|v| DimValue::from(*v)).collect()
    }

    #[test]
    fn test_empty_filter_keeps_everything() {
        let rows = vec![
            make_row(Some(2021), "Cup", None, None),
            make_row(None, "League", Some("Brazil"), None),
        ];
        assert_eq!(filter_rows(&rows, &RowFilter::new()).unwrap(), rows);
    }

    #[test]
    fn test_selections_combine() {
        let rows = vec![
            make_row(Some(2021), "Cup", Some("Brazil"), Some("Spain")),
            make_row(Some(2022), "Cup", Some("Brazil"), Some("Spain")),
            make_row(Some(2021), "League", Some("Brazil"), Some("Spain")),
            make_row(Some(2021), "Cup", Some("Chile"), Some("Spain")),
            make_row(Some(2021), "Cup", Some("Brazil"), Some("Italy")),
        ];
        let filter = RowFilter::new()
            .select(Dimension::Period, [DimValue::Int(2021)])
            .select(Dimension::Competition, text(&["Cup"]))
            .select(Dimension::OriginCountry, text(&["Brazil"]))
            .select(Dimension::CurrentCountry, text(&["Spain"]));

        let kept = filter_rows(&rows, &filter).unwrap();
        assert_eq!(kept, vec![rows[0].clone()]);
    }

    #[test]
    fn test_null_fails_active_selection() {
        let rows = vec![
            make_row(Some(2021), "Cup", None, None),
            make_row(None, "Cup", Some("Brazil"), None),
            make_row(Some(2021), "Cup", Some("Brazil"), None),
        ];
        let by_country = RowFilter::new().select(Dimension::OriginCountry, text(&["Brazil"]));
        assert_eq!(filter_rows(&rows, &by_country).unwrap().len(), 2);

        let by_year = by_country.select(Dimension::Period, [DimValue::Int(2021)]);
        assert_eq!(filter_rows(&rows, &by_year).unwrap(), vec![rows[2].clone()]);
    }

    #[test]
    fn test_empty_selection_clears_dimension() {
        let filter = RowFilter::new()
            .select(Dimension::Competition, text(&["Cup"]))
            .select(Dimension::Competition, Vec::new());
        assert!(filter.is_empty());
    }

    #[test]
    fn test_ranks_come_from_filtered_population() {
        let mut rows = Vec::new();
        for (club, country, minutes) in [("A", "Brazil", 100.0), ("B", "Chile", 500.0), ("C", "Brazil", 50.0)] {
            let mut row = make_row(Some(2021), "Cup", Some(country), None);
            row.origin_group_key = Some(club.to_string());
            row.minutes = minutes;
            rows.push(row);
        }
        let filter = RowFilter::new().select(Dimension::OriginCountry, text(&["Brazil"]));
        let kept = filter_rows(&rows, &filter).unwrap();

        let dims = [Dimension::Competition, Dimension::Period, Dimension::OriginGroup];
        let ranking = rank_partitions(
            &aggregate(&kept, &dims, Metric::Minutes).unwrap(),
            Dimension::Competition,
            Dimension::Period,
        )
        .unwrap();
        let ranks: Vec<(u32, Option<DimValue>)> = ranking.rows.iter().map(|r| (r.rank, r.subject[0].clone())).collect();
        assert_eq!(ranks, vec![(1, Some(DimValue::from("A"))), (2, Some(DimValue::from("C")))]);
    }

    #[test]
    fn test_unknown_dimension_rejected() {
        let games = vec![GameRecord {
            competition: Some("Cup".to_string()),
            entity_id: "1".to_string(),
            name: None,
            participations: 1.0,
            titles: 0.0,
            games: 1.0,
            wins: 0.0,
            draws: 0.0,
            losses: 1.0,
        }];
        let scored = score_events(&games, &[]);

        let by_competition = RowFilter::new().select(Dimension::Competition, text(&["Cup"]));
        assert_eq!(filter_rows(&scored, &by_competition).unwrap().len(), 1);

        let by_year = RowFilter::new().select(Dimension::Period, [DimValue::Int(2021)]);
        assert!(filter_rows(&scored, &by_year).is_err());
    }
}
