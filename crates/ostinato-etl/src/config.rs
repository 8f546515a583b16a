use anyhow::{Context, Result};
use confyg::{env, Confygery};
use ostinato_search::ScoreMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Configuration for ostinato.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (OSTINATO_* prefix)
/// 3. Config file (~/.config/ostinato/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the SQLite database holding imported segment metadata.
    ///
    /// Can be set via:
    /// - CLI: --db /path/to/db
    /// - ENV: OSTINATO_DATABASE_PATH
    /// - Config: database_path = "/path/to/db"
    /// - Default: ~/.local/share/ostinato/ostinato.db
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,

    /// Path of the persisted similarity index.
    ///
    /// Can be set via:
    /// - CLI: --index /path/to/segments.index.json
    /// - ENV: OSTINATO_INDEX_PATH
    /// - Default: ~/.local/share/ostinato/segments.index.json
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Description corpus CSV (`id`, `description` columns).
    #[serde(default)]
    pub corpus_path: Option<PathBuf>,

    /// Segment metadata CSV (ComMU `commu_meta.csv` layout).
    #[serde(default)]
    pub metadata_path: Option<PathBuf>,

    /// Root of the MIDI tree: `<midi_root>/<partition>/raw/<id>.mid`.
    #[serde(default)]
    pub midi_root: Option<PathBuf>,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_db_path(),
            index_path: default_index_path(),
            corpus_path: None,
            metadata_path: None,
            midi_root: None,
            embedding: EmbeddingConfig::default(),
            query: QueryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Which embedding backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Feature hashing; no model files.
    #[default]
    Hashing,
    /// Local transformer model (requires the `fastembed` feature).
    FastEmbed,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hashing => f.write_str("hashing"),
            Self::FastEmbed => f.write_str("fastembed"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hashing" => Ok(Self::Hashing),
            "fastembed" => Ok(Self::FastEmbed),
            other => Err(format!(
                "unknown embedding provider '{other}' (expected 'hashing' or 'fastembed')"
            )),
        }
    }
}

/// `[embedding]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: ProviderKind,
    /// Model name for the `fastembed` provider.
    pub model: String,
    /// Vector dimension for the `hashing` provider.
    pub dimension: usize,
    pub batch_size: usize,
    /// Where `fastembed` caches downloaded models.
    pub cache_path: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: "all-minilm-l6-v2".to_string(),
            dimension: 384,
            batch_size: 64,
            cache_path: None,
        }
    }
}

/// `[query]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub top_k: usize,
    pub score_mode: ScoreMode,
    /// Zero disables the timeout.
    pub embed_timeout_ms: u64,
    /// Zero disables the timeout.
    pub introspect_timeout_ms: u64,
}

impl QueryConfig {
    #[must_use]
    pub fn embed_timeout(&self) -> Option<Duration> {
        (self.embed_timeout_ms > 0).then(|| Duration::from_millis(self.embed_timeout_ms))
    }

    #[must_use]
    pub fn introspect_timeout(&self) -> Option<Duration> {
        (self.introspect_timeout_ms > 0).then(|| Duration::from_millis(self.introspect_timeout_ms))
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            score_mode: ScoreMode::default(),
            embed_timeout_ms: 10_000,
            introspect_timeout_ms: 5_000,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `ostinato_search=debug`.
    pub level: String,
    pub coloured: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            coloured: true,
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for config file at: ~/.config/ostinato/config.toml
    /// Reads environment variables with OSTINATO_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path();

        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("ostinato");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build().context("Failed to build configuration")?;

        Ok(config)
    }

    /// Load configuration, then apply the global `--db` / `--index` flags.
    pub fn load_with_overrides(db_path: Option<PathBuf>, index_path: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::load()?;
        if let Some(db_path) = db_path {
            config.database_path = db_path;
        }
        if let Some(index_path) = index_path {
            config.index_path = index_path;
        }
        Ok(config)
    }

    /// Pipeline state database, kept next to the metadata database.
    #[must_use]
    pub fn pipeline_state_path(&self) -> PathBuf {
        self.database_path
            .parent()
            .map(|p| p.join("pipeline.db"))
            .unwrap_or_else(|| PathBuf::from("pipeline.db"))
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ostinato")
}

/// Returns: ~/.local/share/ostinato/ostinato.db (or platform equivalent)
fn default_db_path() -> PathBuf {
    data_dir().join("ostinato.db")
}

/// Returns: ~/.local/share/ostinato/segments.index.json (or platform equivalent)
fn default_index_path() -> PathBuf {
    data_dir().join("segments.index.json")
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/ostinato/config.toml
/// - macOS: ~/Library/Application Support/ostinato/config.toml
/// - Windows: %APPDATA%\ostinato\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ostinato")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# Ostinato Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (OSTINATO_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Description corpus: CSV with at least `id` and `description` columns
#corpus_path = "data/midi_descriptions.csv"

# Segment metadata: ComMU metadata CSV (id, audio_key, bpm, genre,
# track_role, inst, split_data, ...)
#metadata_path = "data/commu_meta.csv"

# Root of the MIDI tree; files live at <midi_root>/<split>/raw/<id>.mid
#midi_root = "data/commu_midi"

# SQLite database holding imported metadata
#
# Can also be set via:
# - CLI: ostinato --db /custom/path.db status
# - Environment: OSTINATO_DATABASE_PATH=/custom/path.db
#
# Default: Platform-specific data directory
#database_path = "/path/to/custom/ostinato.db"

# Persisted similarity index
#
# Can also be set via:
# - CLI: ostinato --index /custom/segments.index.json search "..."
# - Environment: OSTINATO_INDEX_PATH=/custom/segments.index.json
#index_path = "/path/to/custom/segments.index.json"

[embedding]
# "hashing" (no model files) or "fastembed" (local transformer model,
# needs a build with the `fastembed` feature)
provider = "hashing"
model = "all-minilm-l6-v2"
dimension = 384
batch_size = 64
#cache_path = "/path/to/model/cache"

[query]
top_k = 5
# "legacy": 1 - squared distance; "cosine": exact cosine similarity
score_mode = "legacy"
# Zero disables a timeout
embed_timeout_ms = 10000
introspect_timeout_ms = 5000

[logging]
# RUST_LOG, when set, takes precedence
level = "info"
coloured = true
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(&config_path, example_config()).context("Failed to write config file")?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.database_path.as_os_str().is_empty());
        assert!(config.index_path.ends_with("segments.index.json"));
        assert!(config.corpus_path.is_none());
        assert_eq!(config.embedding.provider, ProviderKind::Hashing);
        assert_eq!(config.query.top_k, 5);
        assert_eq!(config.query.score_mode, ScoreMode::Legacy);
    }

    #[test]
    fn test_example_config_parses() {
        let parsed: Config = toml_from_example();
        assert_eq!(parsed.embedding, EmbeddingConfig::default());
        assert_eq!(parsed.query, QueryConfig::default());
        assert_eq!(parsed.logging, LoggingConfig::default());
    }

    fn toml_from_example() -> Config {
        let mut builder = Confygery::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, example_config()).unwrap();
        builder.add_file(path.to_str().unwrap()).unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_timeouts() {
        let mut query = QueryConfig::default();
        assert_eq!(query.embed_timeout(), Some(Duration::from_secs(10)));
        query.introspect_timeout_ms = 0;
        assert!(query.introspect_timeout().is_none());
    }

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("FastEmbed".parse::<ProviderKind>().unwrap(), ProviderKind::FastEmbed);
        assert!("openai".parse::<ProviderKind>().is_err());
        assert_eq!(ProviderKind::Hashing.to_string(), "hashing");
    }

    #[test]
    fn test_config_load() {
        // Should not fail even if config file doesn't exist
        let result = Config::load();
        assert!(result.is_ok());
    }

    #[test]
    fn test_config_with_overrides() {
        let custom_db = PathBuf::from("/tmp/test.db");
        let config = Config::load_with_overrides(Some(custom_db.clone()), None).unwrap();
        assert_eq!(config.database_path, custom_db);
        assert_eq!(config.pipeline_state_path(), PathBuf::from("/tmp/pipeline.db"));
    }
}
