use anyhow::{Context, Result};
use ostinato_core::{MetadataStore, MetadataTable, MidiLayout, SqliteMetadataStore};
use ostinato_etl::{embedding_provider, Config, MidiFileIntrospector};
use ostinato_search::{
    validate_top_k, EngineGate, MetadataStatus, MidiSource, MidiStatus, QueryEngine, ScoreMode,
    SearchResult,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug)]
pub struct SearchArgs {
    pub query: String,
    pub top_k: Option<i64>,
    pub score_mode: Option<ScoreMode>,
    pub midi_root: Option<PathBuf>,
    pub metadata: Option<PathBuf>,
    pub json: bool,
}

pub async fn run_search(config: &Config, args: SearchArgs) -> Result<()> {
    let requested = args
        .top_k
        .unwrap_or_else(|| i64::try_from(config.query.top_k).unwrap_or(i64::MAX));
    let top_k = validate_top_k(requested)?;

    let metadata = metadata_store(config, args.metadata.as_ref())?;
    let midi = args
        .midi_root
        .or_else(|| config.midi_root.clone())
        .map(|root| MidiSource::new(MidiLayout::new(root), Arc::new(MidiFileIntrospector::new())));
    if midi.is_none() {
        log::warn!("No midi_root configured; results will not include MIDI details");
    }
    let score_mode = args.score_mode.unwrap_or(config.query.score_mode);

    let provider = embedding_provider(&config.embedding)?;
    let gate = EngineGate::new();
    gate.load(&config.index_path, provider, |engine| {
        configure(engine, config, metadata, midi, score_mode)
    })
    .await
    .with_context(|| format!("Failed to load index {}", config.index_path.display()))?;

    let results = gate.get_similar_segments(&args.query, top_k).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No matching segments.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        print_result(i + 1, result);
    }

    Ok(())
}

fn metadata_store(
    config: &Config,
    csv_override: Option<&PathBuf>,
) -> Result<Option<Arc<dyn MetadataStore>>> {
    if let Some(csv_path) = csv_override {
        let table = MetadataTable::from_csv_path(csv_path)
            .with_context(|| format!("Failed to read metadata CSV {}", csv_path.display()))?;
        log::debug!("Loaded {} metadata rows from {}", table.len(), csv_path.display());
        return Ok(Some(Arc::new(table)));
    }

    if config.database_path.exists() {
        let store = SqliteMetadataStore::open(&config.database_path)
            .context("Failed to open metadata database")?;
        return Ok(Some(Arc::new(store)));
    }

    log::warn!(
        "No metadata database at {}; run `ostinato import` first",
        config.database_path.display()
    );
    Ok(None)
}

fn configure(
    engine: QueryEngine,
    config: &Config,
    metadata: Option<Arc<dyn MetadataStore>>,
    midi: Option<MidiSource>,
    score_mode: ScoreMode,
) -> QueryEngine {
    let mut engine = engine.with_score_mode(score_mode).without_timeouts();
    if let Some(timeout) = config.query.embed_timeout() {
        engine = engine.with_embed_timeout(timeout);
    }
    if let Some(timeout) = config.query.introspect_timeout() {
        engine = engine.with_introspect_timeout(timeout);
    }
    if let Some(store) = metadata {
        engine = engine.with_metadata(store);
    }
    if let Some(source) = midi {
        engine = engine.with_midi(source);
    }
    engine
}

fn print_result(rank: usize, result: &SearchResult) {
    println!("\nResult {rank} (similarity: {:.2}):", result.similarity());
    println!("  Description: {}", result.hit.description);
    println!("  ID: {}", result.id());

    match &result.metadata {
        MetadataStatus::Found(record) => {
            println!("  Genre: {}", record.genre);
            println!("  Instrument: {}", record.instrument);
            println!("  Role: {}", record.track_role);
            println!("  Key: {}", record.key);
            println!("  Tempo: {} BPM", record.tempo_bpm);
        }
        MetadataStatus::Missing => println!("  Metadata: not found"),
        MetadataStatus::Failed { error } => println!("  Metadata: unavailable ({error})"),
    }

    match &result.midi {
        MidiStatus::Inspected { path, info } => {
            println!("  Duration: {:.2} s", info.duration_secs);
            println!("  MIDI tempo: {:.1} BPM", info.tempo_bpm);
            if info.instruments.is_empty() {
                println!("  Instruments: none");
            } else {
                println!("  Instruments: {}", info.instruments.join(", "));
            }
            if info.has_drums {
                println!("  Drums: yes");
            }
            println!("  Path: {}", path.display());
        }
        MidiStatus::Failed { path, error } => {
            println!("  Path: {}", path.display());
            println!("  MIDI: {error}");
        }
        MidiStatus::Unresolved => {}
    }
}
