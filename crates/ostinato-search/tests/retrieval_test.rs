//! End-to-end retrieval properties: build, persist, load, query, enrich.
//!
//! Everything runs on the hashing provider, so no model download is
//! needed and rankings are reproducible.

use std::sync::Arc;

use ostinato_core::{CorpusEntry, MetadataRecord, MetadataTable};
use ostinato_search::{
    validate_top_k, BuildError, EmbeddingProvider, EngineGate, HashingEmbeddingProvider,
    IndexBuilder, LoadError, MetadataStatus, MidiStatus, QueryEngine, QueryError, SegmentIndex,
};
use tempfile::TempDir;

fn provider() -> Arc<dyn EmbeddingProvider> {
    Arc::new(HashingEmbeddingProvider::default())
}

fn corpus() -> Vec<CorpusEntry> {
    vec![
        CorpusEntry::new("commu00001", "calm piano ballad in a minor"),
        CorpusEntry::new("commu00002", "upbeat jazz drums with swing"),
        CorpusEntry::new("commu00003", "dark cinematic string ensemble riff"),
        CorpusEntry::new("commu00004", "bright acoustic guitar strumming"),
        CorpusEntry::new("commu00005", "slow ambient synth pad"),
        CorpusEntry::new("commu00006", "energetic rock bass line"),
    ]
}

async fn engine_for(corpus: &[CorpusEntry]) -> QueryEngine {
    let index = IndexBuilder::new(provider()).build(corpus).await.unwrap();
    QueryEngine::new(Arc::new(index), provider()).unwrap()
}

#[tokio::test]
async fn test_build_co_indexes_every_row() {
    let corpus = corpus();
    let index = IndexBuilder::new(provider()).build(&corpus).await.unwrap();

    assert_eq!(index.len(), corpus.len());
    assert_eq!(index.manifest().entry_count, corpus.len());
    for (position, row) in corpus.iter().enumerate() {
        let entry = index.entry(position).unwrap();
        assert_eq!(entry.position, position);
        assert_eq!(*entry.id, row.id);
        assert_eq!(entry.description, row.description);
        assert!(index.vector(position).is_some());
    }
    assert!(index.vector(corpus.len()).is_none());
}

#[tokio::test]
async fn test_rebuild_gives_identical_rankings() {
    let first = engine_for(&corpus()).await;
    let second = engine_for(&corpus()).await;

    for query in ["quiet piano", "drums", "cinematic strings", "synth"] {
        let a: Vec<_> = first
            .search(query, 6)
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.id)
            .collect();
        let b: Vec<_> = second
            .search(query, 6)
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.id)
            .collect();
        assert_eq!(a, b, "rankings differ for '{query}'");
    }
}

#[tokio::test]
async fn test_self_query_ranks_first() {
    let corpus = corpus();
    let engine = engine_for(&corpus).await;

    for (position, row) in corpus.iter().enumerate() {
        let hits = engine.search(&row.description, 3).await.unwrap();
        assert_eq!(hits[0].position, position);
        assert_eq!(hits[0].id, row.id);
        assert!((hits[0].similarity - 1.0).abs() < 1e-5);
        assert!(hits.iter().all(|h| h.similarity <= hits[0].similarity));
    }
}

#[tokio::test]
async fn test_top_k_beyond_corpus_is_clamped() {
    let engine = engine_for(&corpus()).await;
    let hits = engine.search("piano", 100).await.unwrap();
    assert_eq!(hits.len(), corpus().len());
}

#[tokio::test]
async fn test_similarity_is_non_increasing() {
    let engine = engine_for(&corpus()).await;
    let hits = engine.search("slow calm piano pad", 6).await.unwrap();
    assert!(hits
        .windows(2)
        .all(|pair| pair[0].similarity >= pair[1].similarity));
}

#[tokio::test]
async fn test_piano_query_prefers_piano_description() {
    let corpus = vec![
        CorpusEntry::new("a", "calm piano ballad"),
        CorpusEntry::new("b", "upbeat jazz drums"),
    ];
    let engine = engine_for(&corpus).await;

    let hits = engine.search("a quiet piano piece", 1).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id.as_str(), "a");
}

#[tokio::test]
async fn test_invalid_top_k_rejected() {
    assert!(matches!(validate_top_k(0), Err(QueryError::InvalidTopK(0))));
    assert!(matches!(
        validate_top_k(-5),
        Err(QueryError::InvalidTopK(-5))
    ));

    let engine = engine_for(&corpus()).await;
    assert!(matches!(
        engine.search("piano", 0).await,
        Err(QueryError::InvalidTopK(0))
    ));
}

#[tokio::test]
async fn test_missing_metadata_degrades() {
    let table = MetadataTable::from_records(vec![MetadataRecord::new("commu00001", "train")
        .with_genre("newage")
        .with_instrument("acoustic_piano")]);
    let engine = engine_for(&corpus())
        .await
        .with_metadata(Arc::new(table));

    let results = engine
        .get_similar_segments("upbeat jazz drums with swing", 2)
        .await
        .unwrap();

    let drums = &results[0];
    assert_eq!(drums.id().as_str(), "commu00002");
    assert_eq!(drums.hit.description, "upbeat jazz drums with swing");
    assert!(drums.similarity() > 0.99);
    assert_eq!(drums.metadata, MetadataStatus::Missing);
    assert_eq!(drums.midi, MidiStatus::Unresolved);
}

#[tokio::test]
async fn test_unrelated_query_still_ranks() {
    let engine = engine_for(&corpus()).await;
    let hits = engine.search("zzzz", 2).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits[0].similarity >= hits[1].similarity);
}

#[tokio::test]
async fn test_persisted_index_serves_same_results() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("segments.index.json");
    let built = IndexBuilder::new(provider())
        .build_to_path(&corpus(), &path)
        .await
        .unwrap();

    let loaded = SegmentIndex::load(&path).unwrap();
    assert_eq!(loaded.manifest(), built.manifest());

    let from_memory = QueryEngine::new(Arc::new(built), provider()).unwrap();
    let from_disk = QueryEngine::new(Arc::new(loaded), provider()).unwrap();

    let a = from_memory.search("guitar", 3).await.unwrap();
    let b = from_disk.search("guitar", 3).await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_failed_persist_keeps_destination_clean() {
    let dir = TempDir::new().unwrap();
    let occupied = dir.path().join("segments.index.json");
    std::fs::create_dir(&occupied).unwrap();

    let err = IndexBuilder::new(provider())
        .build_to_path(&corpus(), &occupied)
        .await
        .unwrap_err();
    assert!(matches!(err, BuildError::Persist { .. }));

    let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(leftovers.len(), 1);
}

#[tokio::test]
async fn test_truncated_artifact_refused() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("segments.index.json");
    IndexBuilder::new(provider())
        .build_to_path(&corpus(), &path)
        .await
        .unwrap();

    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    let gate = EngineGate::new();
    let err = gate.load(&path, provider(), |e| e).await.unwrap_err();
    assert!(matches!(err, LoadError::Parse { .. }));
    assert!(matches!(
        gate.search("piano", 1).await,
        Err(QueryError::NotReady)
    ));
}

#[tokio::test]
async fn test_concurrent_queries_share_one_engine() {
    let gate = EngineGate::new();
    gate.publish(engine_for(&corpus()).await).unwrap();

    let handles: Vec<_> = ["piano", "drums", "strings", "guitar", "synth", "bass"]
        .into_iter()
        .map(|query| {
            let gate = gate.clone();
            tokio::spawn(async move { gate.search(query, 1).await })
        })
        .collect();

    for handle in handles {
        let hits = handle.await.unwrap().unwrap();
        assert_eq!(hits.len(), 1);
    }
}
