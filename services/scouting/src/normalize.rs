//! Normalize raw source frames into the canonical schema
//!
//! A raw frame is whatever the CSV reader produced (ideally every column read
//! as text). Normalizing strips spreadsheet index columns, renames display
//! headers to canonical names, rejects frames missing required columns and
//! coerces every known column to its canonical type. Typed records are then
//! read out of the canonical frame through [`Record::from_frame`].

use crate::error::{EngineError, ParseWarning, Result};
use polars::prelude::*;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// How a canonical column is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Kept as text, never parsed (identifiers, names, keys).
    Text,
    /// Decimal metric; unparsable cells become `0.0` and raise a [`ParseWarning`].
    Metric,
    /// Whole-number scalar such as a year; unparsable cells become null.
    Ordinal,
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub required: bool,
}

impl ColumnSpec {
    pub const fn required(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind, required: true }
    }

    pub const fn optional(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind, required: false }
    }
}

/// Source-to-canonical mapping for one table.
#[derive(Debug, Clone)]
pub struct TableLayout {
    pub table: String,
    /// `(source header, canonical name)` pairs, applied in order.
    pub rename: Vec<(String, String)>,
    pub columns: Vec<ColumnSpec>,
}

impl TableLayout {
    pub fn new(table: &str, rename: &[(&str, &str)], columns: Vec<ColumnSpec>) -> Self {
        Self {
            table: table.to_string(),
            rename: rename
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            columns,
        }
    }

    /// Layer caller-supplied header mappings over the defaults. An override
    /// for a canonical name replaces the default source header for it.
    pub fn with_renames(mut self, overrides: &HashMap<String, String>) -> Self {
        let mut extra: Vec<(&String, &String)> = overrides.iter().collect();
        extra.sort();
        for (from, to) in extra {
            self.rename.retain(|(_, canonical)| canonical != to);
            self.rename.push((from.clone(), to.clone()));
        }
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// A canonical frame plus the cells that were zero-filled on the way.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub frame: DataFrame,
    pub warnings: Vec<ParseWarning>,
}

/// Typed view over a canonical frame.
pub trait Record: Sized {
    fn layout() -> TableLayout;

    fn from_frame(df: &DataFrame) -> Result<Vec<Self>>;
}

/// Records read from one source, with the parse warnings raised for it.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub rows: Vec<T>,
    pub warnings: Vec<ParseWarning>,
}

/// Normalize `raw` with the record's default layout plus `overrides`, then
/// read typed rows out of it.
pub fn load_records<T: Record>(
    raw: &DataFrame,
    overrides: &HashMap<String, String>,
) -> Result<Loaded<T>> {
    load_with_layout(raw, &T::layout().with_renames(overrides), T::from_frame)
}

pub fn load_with_layout<T>(
    raw: &DataFrame,
    layout: &TableLayout,
    read: impl Fn(&DataFrame) -> Result<Vec<T>>,
) -> Result<Loaded<T>> {
    let normalized = normalize(raw, layout)?;
    let rows = read(&normalized.frame)?;
    Ok(Loaded {
        rows,
        warnings: normalized.warnings,
    })
}

fn index_column_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(Unnamed.*|\s*)$").expect("static pattern"))
}

/// True for headers written by spreadsheet tools for a saved row index.
pub fn is_index_column(name: &str) -> bool {
    index_column_pattern().is_match(name)
}

pub fn normalize(raw: &DataFrame, layout: &TableLayout) -> Result<Normalized> {
    let keep: Vec<String> = raw
        .get_column_names()
        .into_iter()
        .filter(|name| !is_index_column(name))
        .map(str::to_string)
        .collect();
    let mut df = raw.select(keep)?;

    for (from, to) in &layout.rename {
        if from == to || !has_column(&df, from) {
            continue;
        }
        df.rename(from, to)?;
    }

    if let Some(missing) = layout
        .columns
        .iter()
        .find(|spec| spec.required && !has_column(&df, spec.name))
    {
        return Err(EngineError::schema(&layout.table, missing.name));
    }

    let mut warnings = Vec::new();
    for spec in &layout.columns {
        if !has_column(&df, spec.name) {
            continue;
        }
        let text = df.column(spec.name)?.cast(&DataType::String)?;
        let text = text.str()?;
        let coerced = match spec.kind {
            ColumnKind::Text => Series::new(spec.name, text.into_iter().collect::<Vec<_>>()),
            ColumnKind::Metric => {
                let mut values = Vec::with_capacity(text.len());
                for (row, cell) in text.into_iter().enumerate() {
                    let value = match cell {
                        None => 0.0,
                        Some(raw) if raw.trim().is_empty() => 0.0,
                        Some(raw) => parse_decimal(raw).unwrap_or_else(|| {
                            warnings.push(warning(layout, spec, row, raw));
                            0.0
                        }),
                    };
                    values.push(value);
                }
                Series::new(spec.name, values)
            }
            ColumnKind::Ordinal => {
                let mut values = Vec::with_capacity(text.len());
                for (row, cell) in text.into_iter().enumerate() {
                    let value = match cell {
                        Some(raw) if !raw.trim().is_empty() => {
                            let parsed = parse_ordinal(raw);
                            if parsed.is_none() {
                                warnings.push(warning(layout, spec, row, raw));
                            }
                            parsed
                        }
                        _ => None,
                    };
                    values.push(value);
                }
                Series::new(spec.name, values)
            }
        };
        df.with_column(coerced)?;
    }

    Ok(Normalized { frame: df, warnings })
}

fn warning(layout: &TableLayout, spec: &ColumnSpec, row: usize, raw: &str) -> ParseWarning {
    ParseWarning {
        table: layout.table.clone(),
        column: spec.name.to_string(),
        row,
        raw: raw.to_string(),
    }
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| *c == name)
}

/// Parse a decimal written with either `.` or `,` as separator.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().replace(',', ".").parse().ok()?;
    value.is_finite().then_some(value)
}

/// Lossy metric parse: anything unparsable is zero.
pub fn parse_metric(raw: &str) -> f64 {
    parse_decimal(raw).unwrap_or(0.0)
}

/// Years and similar scalars may arrive as `2021.0`; round to the nearest integer.
pub fn parse_ordinal(raw: &str) -> Option<i64> {
    parse_decimal(raw).map(|v| v.round() as i64)
}

// Readers over canonical frames. Required columns were checked by `normalize`,
// but frames can also be built by hand, so absence is still a schema error.

pub(crate) fn text_column(df: &DataFrame, table: &str, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| EngineError::schema(table, name))?;
    let column = column.cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|cell| cell.map(str::to_string))
        .collect())
}

pub(crate) fn optional_text_column(df: &DataFrame, table: &str, name: &str) -> Result<Vec<Option<String>>> {
    if has_column(df, name) {
        text_column(df, table, name)
    } else {
        Ok(vec![None; df.height()])
    }
}

pub(crate) fn key_column(df: &DataFrame, table: &str, name: &str) -> Result<Vec<String>> {
    Ok(text_column(df, table, name)?
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect())
}

pub(crate) fn metric_column(df: &DataFrame, table: &str, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| EngineError::schema(table, name))?;
    let column = column.cast(&DataType::Float64)?;
    Ok(column
        .f64()?
        .into_iter()
        .map(|cell| cell.unwrap_or(0.0))
        .collect())
}

pub(crate) fn optional_metric_column(df: &DataFrame, table: &str, name: &str) -> Result<Vec<f64>> {
    if has_column(df, name) {
        metric_column(df, table, name)
    } else {
        Ok(vec![0.0; df.height()])
    }
}

pub(crate) fn ordinal_column(df: &DataFrame, table: &str, name: &str) -> Result<Vec<Option<i64>>> {
    if !has_column(df, name) {
        return Ok(vec![None; df.height()]);
    }
    let column = df.column(name)?.cast(&DataType::Int64)?;
    Ok(column.i64()?.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_layout() -> TableLayout {
        TableLayout::new(
            "appearances",
            &[("ID", "entity_id"), ("Minutos", "minutes"), ("Ano", "period")],
            vec![
                ColumnSpec::required("entity_id", ColumnKind::Text),
                ColumnSpec::required("minutes", ColumnKind::Metric),
                ColumnSpec::optional("period", ColumnKind::Ordinal),
            ],
        )
    }

    fn make_raw() -> DataFrame {
        DataFrame::new(vec![
            Series::new("Unnamed: 0", &["0", "1", "2"]),
            Series::new("ID", &["007", "12", "A9"]),
            Series::new("Minutos", &["90", "45,5", "n/a"]),
            Series::new("Ano", &["2021", "2022.0", ""]),
            Series::new("Clube", &["X", "Y", "Z"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_index_columns_dropped_and_renamed() {
        let normalized = normalize(&make_raw(), &make_layout()).unwrap();
        let names = normalized.frame.get_column_names();
        assert_eq!(names, vec!["entity_id", "minutes", "period", "Clube"]);
    }

    #[test]
    fn test_ids_stay_text() {
        let normalized = normalize(&make_raw(), &make_layout()).unwrap();
        let ids = key_column(&normalized.frame, "appearances", "entity_id").unwrap();
        assert_eq!(ids, vec!["007", "12", "A9"]);
    }

    #[test]
    fn test_metric_zero_fallback_reports_warning() {
        let normalized = normalize(&make_raw(), &make_layout()).unwrap();
        let minutes = metric_column(&normalized.frame, "appearances", "minutes").unwrap();
        assert_eq!(minutes, vec![90.0, 45.5, 0.0]);
        assert_eq!(normalized.warnings.len(), 1);
        assert_eq!(normalized.warnings[0].row, 2);
        assert_eq!(normalized.warnings[0].raw, "n/a");
    }

    #[test]
    fn test_ordinal_rounds_and_keeps_nulls() {
        let normalized = normalize(&make_raw(), &make_layout()).unwrap();
        let periods = ordinal_column(&normalized.frame, "appearances", "period").unwrap();
        assert_eq!(periods, vec![Some(2021), Some(2022), None]);
    }

    #[test]
    fn test_missing_required_column_is_schema_error() {
        let raw = DataFrame::new(vec![Series::new("ID", &["1"])]).unwrap();
        let err = normalize(&raw, &make_layout()).unwrap_err();
        match err {
            EngineError::Schema { table, column } => {
                assert_eq!(table, "appearances");
                assert_eq!(column, "minutes");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rename_override_replaces_default_header() {
        let mut overrides = HashMap::new();
        overrides.insert("Mins".to_string(), "minutes".to_string());
        let layout = make_layout().with_renames(&overrides);
        let raw = DataFrame::new(vec![
            Series::new("ID", &["1"]),
            Series::new("Mins", &["10"]),
        ])
        .unwrap();
        let normalized = normalize(&raw, &layout).unwrap();
        let minutes = metric_column(&normalized.frame, "appearances", "minutes").unwrap();
        assert_eq!(minutes, vec![10.0]);
    }

    #[test]
    fn test_parse_metric_zero_fallback_is_idempotent() {
        for raw in ["12,5", "7", "-3.25", "abc", "", "NaN", "1.234,5"] {
            let once = parse_metric(raw);
            let twice = parse_metric(&once.to_string());
            assert_eq!(once, twice, "input {raw:?}");
        }
        assert_eq!(parse_metric("abc"), 0.0);
        assert_eq!(parse_metric("1.234,5"), 0.0);
        assert_eq!(parse_metric("12,5"), 12.5);
    }

    #[test]
    fn test_is_index_column() {
        assert!(is_index_column("Unnamed: 0"));
        assert!(is_index_column("Unnamed"));
        assert!(is_index_column(""));
        assert!(!is_index_column("ID"));
    }
}
