//! Source sheet loading: CSV files to typed tables
//!
//! Every column is read as text and typed later by the table layouts, so ids
//! such as `007` keep their leading zeros. Parsed tables are cached by a
//! SHA-256 fingerprint of the file bytes; an edited file is parsed again, an
//! untouched one is not.

use crate::config::Config;
use crate::error::{ParseWarning, UnresolvedReference};
use crate::join::{build_enriched, unresolved_references, EnrichedEvent};
use crate::normalize::{load_records, load_with_layout, Loaded, Record};
use crate::schema::{Appearance, Competition, Entity, GameRecord, Group};
use crate::scoring::{score_events, unresolved_competitions, ScoredEvent};
use anyhow::{Context, Result};
use polars::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// SHA-256 of `bytes`, hex encoded.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Parse CSV bytes with a header row, keeping every column as text.
pub fn read_csv_bytes(bytes: &[u8]) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
        .finish()
        .context("Failed to parse CSV")?;
    Ok(df)
}

pub fn read_csv(path: &Path) -> Result<DataFrame> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    read_csv_bytes(&bytes).with_context(|| format!("Failed to parse {:?}", path))
}

struct CachedFrame {
    fingerprint: String,
    frame: DataFrame,
}

/// Raw frames by path, reparsed only when the file content changes.
#[derive(Default)]
pub struct SourceCache {
    frames: HashMap<PathBuf, CachedFrame>,
    parses: usize,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, path: &Path) -> Result<DataFrame> {
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
        let digest = fingerprint(&bytes);

        if let Some(cached) = self.frames.get(path) {
            if cached.fingerprint == digest {
                tracing::debug!("Cache hit for {:?}", path);
                return Ok(cached.frame.clone());
            }
        }

        let frame = read_csv_bytes(&bytes).with_context(|| format!("Failed to parse {:?}", path))?;
        self.parses += 1;
        tracing::debug!("Parsed {:?} ({} rows, {})", path, frame.height(), &digest[..12]);
        self.frames.insert(
            path.to_path_buf(),
            CachedFrame {
                fingerprint: digest,
                frame: frame.clone(),
            },
        );
        Ok(frame)
    }

    /// Number of times a file was actually parsed.
    pub fn parses(&self) -> usize {
        self.parses
    }

    pub fn invalidate(&mut self, path: &Path) {
        self.frames.remove(path);
    }
}

fn report(table: &str, path: &Path, rows: usize, warnings: &[ParseWarning]) {
    tracing::info!("Loaded {} {} rows from {:?}", rows, table, path);
    if !warnings.is_empty() {
        tracing::warn!("{} unparsable cells in {}, read as zero or null", warnings.len(), table);
        for w in warnings.iter().take(5) {
            tracing::debug!("{}", w);
        }
    }
}

fn load_table<T: Record>(
    cache: &mut SourceCache,
    path: &Path,
    overrides: &HashMap<String, String>,
) -> Result<Loaded<T>> {
    let raw = cache.load(path)?;
    let loaded = load_records::<T>(&raw, overrides).with_context(|| format!("Invalid table {:?}", path))?;
    report(&T::layout().table, path, loaded.rows.len(), &loaded.warnings);
    Ok(loaded)
}

/// Player register, club register and minutes sheet.
#[derive(Debug, Clone)]
pub struct AppearanceSources {
    pub entities: Vec<Entity>,
    pub groups: Vec<Group>,
    pub appearances: Vec<Appearance>,
    pub warnings: Vec<ParseWarning>,
}

impl AppearanceSources {
    pub fn enriched(&self) -> Vec<EnrichedEvent> {
        build_enriched(&self.entities, &self.groups, &self.appearances)
    }

    pub fn unresolved(&self) -> Vec<UnresolvedReference> {
        unresolved_references(&self.entities, &self.groups, &self.appearances)
    }
}

pub fn load_appearance_sources(config: &Config, cache: &mut SourceCache) -> Result<AppearanceSources> {
    let entities: Loaded<Entity> = load_table(
        cache,
        &config.source_path(&config.sources.entities),
        &config.columns.entities,
    )?;
    let groups: Loaded<Group> = load_table(
        cache,
        &config.source_path(&config.sources.groups),
        &config.columns.groups,
    )?;
    let appearances: Loaded<Appearance> = load_table(
        cache,
        &config.source_path(&config.sources.appearances),
        &config.columns.appearances,
    )?;

    let sources = AppearanceSources {
        warnings: [entities.warnings, groups.warnings, appearances.warnings].concat(),
        entities: entities.rows,
        groups: groups.rows,
        appearances: appearances.rows,
    };
    let unresolved = sources.unresolved();
    if !unresolved.is_empty() {
        tracing::warn!("{} keys did not resolve to a register row", unresolved.len());
    }
    Ok(sources)
}

/// Player roster, games sheet and competition weights.
#[derive(Debug, Clone)]
pub struct ScoreSources {
    pub roster: Vec<Entity>,
    pub games: Vec<GameRecord>,
    pub competitions: Vec<Competition>,
    pub warnings: Vec<ParseWarning>,
}

impl ScoreSources {
    pub fn scored(&self) -> Vec<ScoredEvent> {
        score_events(&self.games, &self.competitions)
    }
}

pub fn load_score_sources(config: &Config, cache: &mut SourceCache) -> Result<ScoreSources> {
    let sources = &config.sources;
    let roster_file = sources.roster.as_deref().context("No roster sheet configured")?;
    let games_file = sources.games.as_deref().context("No games sheet configured")?;
    let competitions_file = sources
        .competitions
        .as_deref()
        .context("No competitions sheet configured")?;

    let roster_path = config.source_path(roster_file);
    let raw = cache.load(&roster_path)?;
    let roster = load_with_layout(
        &raw,
        &Entity::roster_layout().with_renames(&config.columns.entities),
        Entity::from_frame,
    )
    .with_context(|| format!("Invalid table {:?}", roster_path))?;
    report(Entity::TABLE, &roster_path, roster.rows.len(), &roster.warnings);

    let games: Loaded<GameRecord> = load_table(cache, &config.source_path(games_file), &config.columns.games)?;
    let competitions: Loaded<Competition> = load_table(
        cache,
        &config.source_path(competitions_file),
        &config.columns.competitions,
    )?;

    let loaded = ScoreSources {
        warnings: [roster.warnings, games.warnings, competitions.warnings].concat(),
        roster: roster.rows,
        games: games.rows,
        competitions: competitions.rows,
    };
    let unresolved = unresolved_competitions(&loaded.scored());
    if !unresolved.is_empty() {
        tracing::warn!("{} competitions have no weight and score zero", unresolved.len());
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnsConfig, RankingConfig, SourcesConfig};
    use std::fs;

    fn make_config(dir: &Path) -> Config {
        Config {
            data_dir: dir.to_string_lossy().to_string(),
            sources: SourcesConfig {
                entities: "jogadores.csv".to_string(),
                groups: "clubes.csv".to_string(),
                appearances: "minutos.csv".to_string(),
                roster: Some("cadastro.csv".to_string()),
                games: Some("jogos.csv".to_string()),
                competitions: Some("competicoes.csv".to_string()),
            },
            columns: ColumnsConfig::default(),
            ranking: RankingConfig::default(),
        }
    }

    fn write_sources(dir: &Path) {
        fs::write(
            dir.join("jogadores.csv"),
            "Unnamed: 0,ID,Jogador,Clube Revelador,Ano,Posição,Status,Link\n\
             0,007,Ana,Santos,2004.0,Atacante,Ativo,\n\
             1,8,Bia,Boca,2005,Goleira,Ativo,\n",
        )
        .unwrap();
        fs::write(dir.join("clubes.csv"), "Clube,País\nSantos,Brasil\nBoca,Argentina\n").unwrap();
        fs::write(
            dir.join("minutos.csv"),
            "Campeonato,Ano,Jogador,ID,Clube,Minutos\n\
             Serie A,2021,Ana,007,Boca,\"90,5\"\n\
             Serie A,2021,Bia,8,Lazio,abc\n\
             Serie A,2022,Zoe,99,Santos,10\n",
        )
        .unwrap();
        fs::write(
            dir.join("cadastro.csv"),
            "ID,Jogador,Ano,Posição,Status\n007,Ana,2004,Atacante,Ativo\n",
        )
        .unwrap();
        fs::write(
            dir.join("jogos.csv"),
            "Competição,ID,Jogador,Participações,Títulos,Jogos,Vitórias,Empates,Derrotas\n\
             Libertadores,007,Ana,1,1,10,5,2,3\n\
             Amistoso,007,Ana,1,0,4,4,0,0\n",
        )
        .unwrap();
        fs::write(dir.join("competicoes.csv"), "Competição,Pontuação\nLibertadores,5\n").unwrap();
    }

    #[test]
    fn test_read_csv_keeps_text() {
        let df = read_csv_bytes(b"ID,Minutos\n007,90\n").unwrap();
        let ids: Vec<Option<&str>> = df.column("ID").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(ids, vec![Some("007")]);
        assert_eq!(df.column("Minutos").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_fingerprint_is_stable() {
        assert_eq!(fingerprint(b"abc"), fingerprint(b"abc"));
        assert_ne!(fingerprint(b"abc"), fingerprint(b"abd"));
        assert_eq!(fingerprint(b"").len(), 64);
    }

    #[test]
    fn test_cache_reparses_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clubes.csv");
        fs::write(&path, "Clube,País\nSantos,Brasil\n").unwrap();

        let mut cache = SourceCache::new();
        assert_eq!(cache.load(&path).unwrap().height(), 1);
        assert_eq!(cache.load(&path).unwrap().height(), 1);
        assert_eq!(cache.parses(), 1);

        fs::write(&path, "Clube,País\nSantos,Brasil\nBoca,Argentina\n").unwrap();
        assert_eq!(cache.load(&path).unwrap().height(), 2);
        assert_eq!(cache.parses(), 2);

        cache.invalidate(&path);
        cache.load(&path).unwrap();
        assert_eq!(cache.parses(), 3);
    }

    #[test]
    fn test_load_appearance_sources() {
        let dir = tempfile::tempdir().unwrap();
        write_sources(dir.path());
        let config = make_config(dir.path());

        let mut cache = SourceCache::new();
        let sources = load_appearance_sources(&config, &mut cache).unwrap();
        assert_eq!(sources.entities.len(), 2);
        assert_eq!(sources.entities[0].entity_id, "007");
        assert_eq!(sources.entities[0].cohort_year, Some(2004));
        assert_eq!(sources.appearances[0].minutes, 90.5);
        assert_eq!(sources.appearances[1].minutes, 0.0);
        assert_eq!(sources.warnings.len(), 1);
        assert_eq!(sources.warnings[0].raw, "abc");

        let enriched = sources.enriched();
        assert_eq!(enriched.len(), 3);
        assert_eq!(enriched[0].origin_country.as_deref(), Some("Brasil"));
        assert_eq!(enriched[0].current_country.as_deref(), Some("Argentina"));
        assert_eq!(enriched[2].origin_group_key, None);

        let unresolved: Vec<String> = sources.unresolved().iter().map(|u| u.key.clone()).collect();
        assert!(unresolved.contains(&"99".to_string()));
        assert!(unresolved.contains(&"Lazio".to_string()));
    }

    #[test]
    fn test_load_score_sources() {
        let dir = tempfile::tempdir().unwrap();
        write_sources(dir.path());
        let config = make_config(dir.path());

        let mut cache = SourceCache::new();
        let sources = load_score_sources(&config, &mut cache).unwrap();
        assert_eq!(sources.roster.len(), 1);
        assert_eq!(sources.roster[0].origin_group_key, None);

        let scored = sources.scored();
        // 10 * 5 + 1 * 5 * 10 + (15 + 2) / 30 * 50 = 128.33
        assert_eq!(scored[0].score(), 128);
        assert_eq!(scored[1].score(), 0);
        assert!(!scored[1].weight_resolved);
    }

    #[test]
    fn test_missing_scores_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = make_config(dir.path());
        config.sources.games = None;

        let err = load_score_sources(&config, &mut SourceCache::new()).unwrap_err();
        assert!(err.to_string().contains("games"));
    }
}
