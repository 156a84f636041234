use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub data_dir: String,
    pub sources: SourcesConfig,
    #[serde(default)]
    pub columns: ColumnsConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
}

/// File names of the source sheets, relative to `data_dir`.
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_entities")]
    pub entities: String,
    #[serde(default = "default_groups")]
    pub groups: String,
    #[serde(default = "default_appearances")]
    pub appearances: String,
    /// Player register kept next to the games sheet; it has no origin club.
    #[serde(default)]
    pub roster: Option<String>,
    #[serde(default)]
    pub games: Option<String>,
    #[serde(default)]
    pub competitions: Option<String>,
}

/// Extra `source header = canonical name` mappings per table, layered over
/// the built-in ones.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ColumnsConfig {
    #[serde(default)]
    pub entities: HashMap<String, String>,
    #[serde(default)]
    pub groups: HashMap<String, String>,
    #[serde(default)]
    pub appearances: HashMap<String, String>,
    #[serde(default)]
    pub games: HashMap<String, String>,
    #[serde(default)]
    pub competitions: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_top_share_n")]
    pub top_share_n: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            top_share_n: default_top_share_n(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config from {:?}", path.as_ref()))?;
        let config: Config = toml::from_str(&content)
            .context("Failed to parse config TOML")?;
        Ok(config)
    }

    pub fn source_path(&self, file_name: &str) -> PathBuf {
        Path::new(&self.data_dir).join(file_name)
    }
}

fn default_entities() -> String {
    "jogadores.csv".to_string()
}

fn default_groups() -> String {
    "clubes.csv".to_string()
}

fn default_appearances() -> String {
    "minutos.csv".to_string()
}

fn default_top_n() -> usize {
    10
}

fn default_top_share_n() -> usize {
    5
}
