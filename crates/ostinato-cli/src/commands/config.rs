use anyhow::{Context, Result};
use ostinato_etl::{config, Config, ProviderKind};
use ostinato_search::ScoreMode;
use std::str::FromStr;
use toml_edit::{DocumentMut, Item};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Text,
    Integer,
    Bool,
    Provider,
    ScoreMode,
}

/// Every settable key, dotted for keys inside a table.
const KEYS: &[(&str, Kind)] = &[
    ("database_path", Kind::Text),
    ("index_path", Kind::Text),
    ("corpus_path", Kind::Text),
    ("metadata_path", Kind::Text),
    ("midi_root", Kind::Text),
    ("embedding.provider", Kind::Provider),
    ("embedding.model", Kind::Text),
    ("embedding.dimension", Kind::Integer),
    ("embedding.batch_size", Kind::Integer),
    ("embedding.cache_path", Kind::Text),
    ("query.top_k", Kind::Integer),
    ("query.score_mode", Kind::ScoreMode),
    ("query.embed_timeout_ms", Kind::Integer),
    ("query.introspect_timeout_ms", Kind::Integer),
    ("logging.level", Kind::Text),
    ("logging.coloured", Kind::Bool),
];

fn lookup(key: &str) -> Result<Kind> {
    KEYS.iter()
        .find(|(name, _)| *name == key)
        .map(|(_, kind)| *kind)
        .ok_or_else(|| {
            let valid: Vec<&str> = KEYS.iter().map(|(name, _)| *name).collect();
            anyhow::anyhow!("Unknown config key: {}\n\nValid keys: {}", key, valid.join(", "))
        })
}

/// The effective value of `key`, rendered for display.
fn effective_value(config: &Config, key: &str) -> Result<String> {
    let tree = serde_json::to_value(config)?;
    let value = key
        .split('.')
        .try_fold(&tree, |node, part| node.get(part))
        .with_context(|| format!("No value for {key}"))?;

    Ok(match value {
        serde_json::Value::Null => String::from("<not set>"),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

fn typed_item(kind: Kind, key: &str, raw: &str) -> Result<Item> {
    let item = match kind {
        Kind::Text => toml_edit::value(raw),
        Kind::Integer => {
            let n: i64 = raw
                .parse()
                .with_context(|| format!("{key} expects an integer, got {raw:?}"))?;
            anyhow::ensure!(n >= 0, "{key} must not be negative");
            toml_edit::value(n)
        }
        Kind::Bool => {
            let b: bool = raw
                .parse()
                .with_context(|| format!("{key} expects true or false, got {raw:?}"))?;
            toml_edit::value(b)
        }
        Kind::Provider => {
            let provider = ProviderKind::from_str(raw).map_err(|e| anyhow::anyhow!(e))?;
            toml_edit::value(provider.to_string())
        }
        Kind::ScoreMode => {
            let mode = ScoreMode::from_str(raw).map_err(|e| anyhow::anyhow!(e))?;
            toml_edit::value(mode.as_str())
        }
    };
    Ok(item)
}

/// Set `key` in the TOML text `contents`, keeping comments and layout.
fn apply_setting(contents: &str, key: &str, raw: &str) -> Result<String> {
    let kind = lookup(key)?;
    let item = typed_item(kind, key, raw)?;

    let mut doc: DocumentMut = contents.parse().context("Config file is not valid TOML")?;
    let (table, field) = match key.split_once('.') {
        Some((section, field)) => {
            let table = doc
                .entry(section)
                .or_insert(toml_edit::table())
                .as_table_mut()
                .with_context(|| format!("`{section}` in the config file is not a table"))?;
            (table, field)
        }
        None => (doc.as_table_mut(), key),
    };
    table.insert(field, item);

    Ok(doc.to_string())
}

/// Show the current effective configuration.
pub fn show_config(config: &Config) -> Result<()> {
    println!("Current Configuration");
    println!("=====================\n");

    let config_path = config::config_file_path();
    println!("Config file: {}", config_path.display());
    let exists = config_path.exists();
    println!("File exists: {}\n", if exists { "yes" } else { "no (using defaults)" });

    println!("Settings:");
    for (key, _) in KEYS {
        println!("  {}: {}", key, effective_value(config, key)?);
    }

    println!("\nPriority: CLI args > ENV vars (OSTINATO_*) > Config file > Defaults");

    Ok(())
}

/// Get a specific config value, or the whole file without a key.
pub fn get_config(config: &Config, key: Option<String>) -> Result<()> {
    if let Some(key) = key {
        lookup(&key)?;
        println!("{}", effective_value(config, &key)?);
    } else {
        let config_path = config::config_file_path();

        if config_path.exists() {
            let contents =
                std::fs::read_to_string(&config_path).context("Failed to read config file")?;
            print!("{}", contents);
        } else {
            println!("Config file does not exist: {}", config_path.display());
            println!("\nRun 'ostinato config init' to create it.");
        }
    }

    Ok(())
}

/// Set a config value.
pub fn set_config(key: &str, value: &str) -> Result<()> {
    let config_path = config::config_file_path();

    config::ensure_config_file()?;

    let contents = std::fs::read_to_string(&config_path).context("Failed to read config file")?;
    let updated = apply_setting(&contents, key, value)?;

    std::fs::write(&config_path, &updated).context("Failed to write config file")?;

    if let Err(e) = Config::load() {
        std::fs::write(&config_path, contents).context("Failed to restore config file")?;
        return Err(e.context(format!("Rejected {key} = {value}; config file left unchanged")));
    }

    println!("✓ Updated {} = {}", key, value);
    println!("  in {}", config_path.display());

    Ok(())
}

/// Show the config file path.
pub fn show_path() -> Result<()> {
    println!("{}", config::config_file_path().display());
    Ok(())
}

/// Show example configuration.
pub fn show_example() -> Result<()> {
    print!("{}", config::example_config());
    Ok(())
}

/// Initialize config file with defaults.
pub fn init_config() -> Result<()> {
    let created = config::ensure_config_file()?;
    let config_path = config::config_file_path();

    if created {
        println!("✓ Created config file: {}", config_path.display());
        println!("\nEdit this file to configure ostinato.");
    } else {
        println!("Config file already exists: {}", config_path.display());
    }

    Ok(())
}
