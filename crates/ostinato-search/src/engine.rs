//! Online query path: embed, search, convert, enrich.
//!
//! A [`QueryEngine`] holds one resident [`SegmentIndex`] and serves any
//! number of concurrent queries against it. Enrichment never fails a
//! query: a missing metadata row or an unreadable MIDI file is reported
//! inside the affected [`SearchResult`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use ostinato_core::{
    IntrospectionError, MetadataRecord, MetadataStore, MidiInfo, MidiIntrospector, MidiLayout,
    SegmentId,
};
use serde::{Deserialize, Serialize};

use crate::artifact::SegmentIndex;
use crate::embedding::EmbeddingProvider;
use crate::error::{EmbeddingError, LoadError, QueryError};
use crate::vector::l2_normalize;

/// How a squared L2 distance between unit vectors becomes a score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMode {
    /// `1 − d`, i.e. `2·cos θ − 1`. Matches scores produced by earlier
    /// tooling; negative for unrelated texts.
    #[default]
    Legacy,
    /// `1 − d/2`, exactly `cos θ`.
    Cosine,
}

impl ScoreMode {
    #[must_use]
    pub fn similarity(self, distance: f32) -> f32 {
        match self {
            Self::Legacy => 1.0 - distance,
            Self::Cosine => 1.0 - distance / 2.0,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Cosine => "cosine",
        }
    }
}

impl fmt::Display for ScoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoreMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "cosine" => Ok(Self::Cosine),
            other => Err(format!(
                "unknown score mode '{other}' (expected 'legacy' or 'cosine')"
            )),
        }
    }
}

/// A raw search hit, resolved to its id and description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub position: usize,
    pub id: SegmentId,
    pub description: String,
    pub similarity: f32,
    pub distance: f32,
}

/// Outcome of the metadata join for one hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetadataStatus {
    Found(MetadataRecord),
    /// The store has no row for this id.
    Missing,
    /// The store could not be read.
    Failed { error: String },
}

/// Outcome of MIDI introspection for one hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MidiStatus {
    Inspected { path: PathBuf, info: MidiInfo },
    Failed {
        path: PathBuf,
        error: IntrospectionError,
    },
    /// No file could be located: no metadata row, a blank partition, or
    /// no MIDI source configured.
    Unresolved,
}

/// A search hit plus everything the engine could learn about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub hit: SearchHit,
    pub metadata: MetadataStatus,
    pub midi: MidiStatus,
}

impl SearchResult {
    #[must_use]
    pub fn id(&self) -> &SegmentId {
        &self.hit.id
    }

    #[must_use]
    pub fn similarity(&self) -> f32 {
        self.hit.similarity
    }

    #[must_use]
    pub fn record(&self) -> Option<&MetadataRecord> {
        match &self.metadata {
            MetadataStatus::Found(record) => Some(record),
            _ => None,
        }
    }

    #[must_use]
    pub fn midi_info(&self) -> Option<&MidiInfo> {
        match &self.midi {
            MidiStatus::Inspected { info, .. } => Some(info),
            _ => None,
        }
    }

    #[must_use]
    pub fn midi_path(&self) -> Option<&Path> {
        match &self.midi {
            MidiStatus::Inspected { path, .. } | MidiStatus::Failed { path, .. } => Some(path),
            MidiStatus::Unresolved => None,
        }
    }
}

/// Where MIDI files live and how to read them.
#[derive(Debug, Clone)]
pub struct MidiSource {
    pub layout: MidiLayout,
    pub introspector: Arc<dyn MidiIntrospector>,
}

impl MidiSource {
    pub fn new(layout: MidiLayout, introspector: Arc<dyn MidiIntrospector>) -> Self {
        Self {
            layout,
            introspector,
        }
    }
}

/// Check a caller-supplied result count.
pub fn validate_top_k(top_k: i64) -> Result<usize, QueryError> {
    match usize::try_from(top_k) {
        Ok(k) if k > 0 => Ok(k),
        _ => Err(QueryError::InvalidTopK(top_k)),
    }
}

/// Serves text queries against one loaded index.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    index: Arc<SegmentIndex>,
    provider: Arc<dyn EmbeddingProvider>,
    metadata: Option<Arc<dyn MetadataStore>>,
    midi: Option<MidiSource>,
    score_mode: ScoreMode,
    embed_timeout: Option<Duration>,
    introspect_timeout: Option<Duration>,
}

impl QueryEngine {
    pub const DEFAULT_EMBED_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_INTROSPECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Create an engine; `provider` must be the one the index was built with.
    pub fn new(
        index: Arc<SegmentIndex>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, LoadError> {
        let manifest = index.manifest();
        if manifest.provider != provider.name() || manifest.dimension != provider.dimension() {
            return Err(LoadError::ProviderMismatch {
                index_provider: manifest.provider.clone(),
                index_dimension: manifest.dimension,
                provider: provider.name().to_string(),
                dimension: provider.dimension(),
            });
        }

        Ok(Self {
            index,
            provider,
            metadata: None,
            midi: None,
            score_mode: ScoreMode::default(),
            embed_timeout: Some(Self::DEFAULT_EMBED_TIMEOUT),
            introspect_timeout: Some(Self::DEFAULT_INTROSPECT_TIMEOUT),
        })
    }

    #[must_use]
    pub fn with_metadata(mut self, store: Arc<dyn MetadataStore>) -> Self {
        self.metadata = Some(store);
        self
    }

    #[must_use]
    pub fn with_midi(mut self, source: MidiSource) -> Self {
        self.midi = Some(source);
        self
    }

    #[must_use]
    pub fn with_score_mode(mut self, mode: ScoreMode) -> Self {
        self.score_mode = mode;
        self
    }

    #[must_use]
    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_introspect_timeout(mut self, timeout: Duration) -> Self {
        self.introspect_timeout = Some(timeout);
        self
    }

    /// Let embedding and introspection run unbounded.
    #[must_use]
    pub fn without_timeouts(mut self) -> Self {
        self.embed_timeout = None;
        self.introspect_timeout = None;
        self
    }

    #[must_use]
    pub fn index(&self) -> &Arc<SegmentIndex> {
        &self.index
    }

    #[must_use]
    pub fn score_mode(&self) -> ScoreMode {
        self.score_mode
    }

    /// The `top_k` segments whose descriptions are closest to `query_text`,
    /// most similar first.
    ///
    /// `top_k` beyond the index size is clamped. Rejects blank text and a
    /// zero `top_k` before embedding anything.
    pub async fn search(
        &self,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, QueryError> {
        if query_text.trim().is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        if top_k == 0 {
            return Err(QueryError::InvalidTopK(0));
        }

        let query = self.embed_query(query_text).await?;
        let neighbors = self.index.search(&query, top_k)?;

        let hits = neighbors
            .into_iter()
            .filter_map(|neighbor| {
                let entry = self.index.entry(neighbor.position)?;
                Some(SearchHit {
                    position: neighbor.position,
                    id: entry.id.clone(),
                    description: entry.description.to_string(),
                    similarity: self.score_mode.similarity(neighbor.distance),
                    distance: neighbor.distance,
                })
            })
            .collect::<Vec<_>>();

        log::debug!("Query '{}' matched {} segments", query_text, hits.len());
        Ok(hits)
    }

    /// [`search`](Self::search), then join each hit to its metadata row and
    /// MIDI file.
    ///
    /// Hits are enriched concurrently; the result order is the search
    /// order.
    pub async fn get_similar_segments(
        &self,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, QueryError> {
        let hits = self.search(query_text, top_k).await?;
        Ok(join_all(hits.into_iter().map(|hit| self.enrich(hit))).await)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, QueryError> {
        let pending = self.provider.embed(text);
        let embedded = match self.embed_timeout {
            Some(limit) => tokio::time::timeout(limit, pending)
                .await
                .map_err(|_| EmbeddingError::TimedOut(limit))?,
            None => pending.await,
        };
        let mut vector = embedded?;

        let expected = self.index.dimension();
        if vector.len() != expected {
            return Err(EmbeddingError::Dimension {
                provider: self.provider.name().to_string(),
                expected,
                got: vector.len(),
            }
            .into());
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(EmbeddingError::NonFinite {
                provider: self.provider.name().to_string(),
            }
            .into());
        }
        if !l2_normalize(&mut vector) {
            log::debug!("Query '{text}' embeds to a zero vector");
        }
        Ok(vector)
    }

    async fn enrich(&self, hit: SearchHit) -> SearchResult {
        let metadata = self.lookup_metadata(&hit.id).await;
        let midi = match (&metadata, &self.midi) {
            (MetadataStatus::Found(record), Some(source)) => {
                self.introspect(source, &hit.id, &record.partition).await
            }
            _ => MidiStatus::Unresolved,
        };
        SearchResult {
            hit,
            metadata,
            midi,
        }
    }

    /// Store lookups may block on disk, so they run off the async workers.
    async fn lookup_metadata(&self, id: &SegmentId) -> MetadataStatus {
        let Some(store) = &self.metadata else {
            return MetadataStatus::Missing;
        };
        let store = Arc::clone(store);
        let task_id = id.clone();
        let looked_up = match tokio::task::spawn_blocking(move || store.get(&task_id)).await {
            Ok(looked_up) => looked_up,
            Err(e) => {
                log::warn!("Metadata lookup for {id} did not complete: {e}");
                return MetadataStatus::Failed {
                    error: e.to_string(),
                };
            }
        };
        match looked_up {
            Ok(Some(record)) => MetadataStatus::Found(record),
            Ok(None) => {
                log::debug!("No metadata row for {id}");
                MetadataStatus::Missing
            }
            Err(e) => {
                log::warn!("Metadata lookup for {id} failed: {e}");
                MetadataStatus::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn introspect(&self, source: &MidiSource, id: &SegmentId, partition: &str) -> MidiStatus {
        let Some(path) = source.layout.path_for(id, partition) else {
            return MidiStatus::Unresolved;
        };

        let introspector = Arc::clone(&source.introspector);
        let task_path = path.clone();
        let task = tokio::task::spawn_blocking(move || introspector.inspect(&task_path));

        let joined = match self.introspect_timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    log::warn!("Introspection of {} timed out", path.display());
                    return MidiStatus::Failed {
                        error: IntrospectionError::TimedOut { path: path.clone() },
                        path,
                    };
                }
            },
            None => task.await,
        };

        match joined {
            Ok(Ok(info)) => MidiStatus::Inspected { path, info },
            Ok(Err(error)) => {
                log::warn!("{error}");
                MidiStatus::Failed { path, error }
            }
            Err(e) => MidiStatus::Failed {
                error: IntrospectionError::Other {
                    path: path.clone(),
                    message: e.to_string(),
                },
                path,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::IndexBuilder;
    use crate::embedding::HashingEmbeddingProvider;
    use async_trait::async_trait;
    use ostinato_core::{CorpusEntry, MetadataTable};

    #[derive(Debug)]
    struct StubIntrospector;

    impl MidiIntrospector for StubIntrospector {
        fn inspect(&self, path: &Path) -> Result<MidiInfo, IntrospectionError> {
            if path.to_string_lossy().contains("broken") {
                return Err(IntrospectionError::Malformed {
                    path: path.to_path_buf(),
                    message: "bad header".to_string(),
                });
            }
            if path.to_string_lossy().contains("slow") {
                std::thread::sleep(Duration::from_millis(300));
            }
            Ok(MidiInfo {
                duration_secs: 8.0,
                tempo_bpm: 72.0,
                instruments: vec!["Acoustic Grand Piano".to_string()],
                has_drums: false,
            })
        }
    }

    #[derive(Debug)]
    struct StalledProvider;

    #[async_trait]
    impl EmbeddingProvider for StalledProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![1.0; 384])
        }

        fn dimension(&self) -> usize {
            384
        }

        fn name(&self) -> &str {
            "hashing-v1-384"
        }
    }

    async fn engine() -> QueryEngine {
        let corpus = vec![
            CorpusEntry::new("a", "calm piano ballad"),
            CorpusEntry::new("b", "upbeat jazz drums"),
            CorpusEntry::new("broken", "calm piano ballad with a broken file"),
        ];
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbeddingProvider::default());
        let index = IndexBuilder::new(Arc::clone(&provider))
            .build(&corpus)
            .await
            .unwrap();
        QueryEngine::new(Arc::new(index), provider).unwrap()
    }

    #[test]
    fn test_score_modes() {
        assert_eq!(ScoreMode::Legacy.similarity(0.0), 1.0);
        assert_eq!(ScoreMode::Legacy.similarity(2.0), -1.0);
        assert_eq!(ScoreMode::Cosine.similarity(2.0), 0.0);
        assert_eq!(ScoreMode::Cosine.similarity(1.0), 0.5);
        assert_eq!("Cosine".parse::<ScoreMode>().unwrap(), ScoreMode::Cosine);
        assert!("euclid".parse::<ScoreMode>().is_err());
    }

    #[test]
    fn test_validate_top_k() {
        assert_eq!(validate_top_k(3).unwrap(), 3);
        assert!(matches!(validate_top_k(0), Err(QueryError::InvalidTopK(0))));
        assert!(matches!(
            validate_top_k(-2),
            Err(QueryError::InvalidTopK(-2))
        ));
    }

    #[tokio::test]
    async fn test_provider_mismatch_refused() {
        let engine = engine().await;
        let err = QueryEngine::new(
            Arc::clone(engine.index()),
            Arc::new(HashingEmbeddingProvider::new(64)),
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::ProviderMismatch { .. }));
    }

    #[tokio::test]
    async fn test_blank_query_rejected() {
        let engine = engine().await;
        assert!(matches!(
            engine.search("   ", 3).await,
            Err(QueryError::EmptyQuery)
        ));
        assert!(matches!(
            engine.search("piano", 0).await,
            Err(QueryError::InvalidTopK(0))
        ));
    }

    #[tokio::test]
    async fn test_cosine_mode_scores_self_match_as_one() {
        let engine = engine().await.with_score_mode(ScoreMode::Cosine);
        let hits = engine.search("upbeat jazz drums", 1).await.unwrap();
        assert_eq!(hits[0].id.as_str(), "b");
        assert!((hits[0].similarity - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_no_stores_configured() {
        let engine = engine().await;
        let results = engine.get_similar_segments("piano", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results
            .iter()
            .all(|r| r.metadata == MetadataStatus::Missing && r.midi == MidiStatus::Unresolved));
    }

    #[tokio::test]
    async fn test_enrichment_statuses() {
        let table = MetadataTable::from_records(vec![
            MetadataRecord::new("a", "train").with_genre("newage"),
            MetadataRecord::new("broken", "val"),
        ]);
        let engine = engine()
            .await
            .with_metadata(Arc::new(table))
            .with_midi(MidiSource::new(
                MidiLayout::new("/data/commu_midi"),
                Arc::new(StubIntrospector),
            ));

        let results = engine
            .get_similar_segments("calm piano ballad", 3)
            .await
            .unwrap();
        let by_id = |id: &str| results.iter().find(|r| r.id().as_str() == id).unwrap();

        let a = by_id("a");
        assert_eq!(a.record().unwrap().genre, "newage");
        assert_eq!(a.midi_info().unwrap().tempo_bpm, 72.0);
        assert_eq!(
            a.midi_path().unwrap(),
            Path::new("/data/commu_midi/train/raw/a.mid")
        );

        let broken = by_id("broken");
        assert!(broken.record().is_some());
        assert!(matches!(
            broken.midi,
            MidiStatus::Failed {
                error: IntrospectionError::Malformed { .. },
                ..
            }
        ));

        let b = by_id("b");
        assert_eq!(b.metadata, MetadataStatus::Missing);
        assert_eq!(b.midi, MidiStatus::Unresolved);
    }

    /// A store whose every lookup blocks the calling thread.
    #[derive(Debug)]
    struct SlowStore {
        inner: MetadataTable,
    }

    impl MetadataStore for SlowStore {
        fn get(&self, id: &SegmentId) -> ostinato_core::Result<Option<MetadataRecord>> {
            std::thread::sleep(Duration::from_millis(300));
            self.inner.get(id)
        }
    }

    #[tokio::test]
    async fn test_blocking_lookups_run_concurrently() {
        let store = SlowStore {
            inner: MetadataTable::from_records(vec![
                MetadataRecord::new("a", "train").with_genre("newage"),
                MetadataRecord::new("b", "train").with_genre("jazz"),
            ]),
        };
        let engine = engine().await.with_metadata(Arc::new(store));

        let started = std::time::Instant::now();
        let results = engine
            .get_similar_segments("calm piano ballad", 3)
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert_eq!(results.len(), 3);
        assert_eq!(
            results
                .iter()
                .filter(|r| r.record().is_some())
                .count(),
            2
        );
        assert!(elapsed < Duration::from_millis(800), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn test_enrichment_keeps_search_order() {
        let engine = engine()
            .await
            .with_metadata(Arc::new(MetadataTable::new()));
        let hits = engine.search("calm piano ballad", 3).await.unwrap();
        let results = engine
            .get_similar_segments("calm piano ballad", 3)
            .await
            .unwrap();

        let hit_ids: Vec<_> = hits.iter().map(|h| h.id.clone()).collect();
        let result_ids: Vec<_> = results.iter().map(|r| r.id().clone()).collect();
        assert_eq!(hit_ids, result_ids);
    }

    #[tokio::test]
    async fn test_introspection_timeout() {
        let engine = engine()
            .await
            .with_metadata(Arc::new(MetadataTable::from_records(vec![
                MetadataRecord::new("a", "slow"),
            ])))
            .with_midi(MidiSource::new(
                MidiLayout::new("/data"),
                Arc::new(StubIntrospector),
            ))
            .with_introspect_timeout(Duration::from_millis(20));

        let results = engine
            .get_similar_segments("calm piano ballad", 1)
            .await
            .unwrap();
        assert!(matches!(
            results[0].midi,
            MidiStatus::Failed {
                error: IntrospectionError::TimedOut { .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_embed_timeout() {
        let base = engine().await;
        let engine = QueryEngine::new(Arc::clone(base.index()), Arc::new(StalledProvider))
            .unwrap()
            .with_embed_timeout(Duration::from_millis(20));

        let err = engine.search("piano", 1).await.unwrap_err();
        assert!(matches!(
            err,
            QueryError::Embedding(EmbeddingError::TimedOut(_))
        ));
    }

    #[tokio::test]
    async fn test_result_json_shape() {
        let engine = engine()
            .await
            .with_metadata(Arc::new(MetadataTable::new()));
        let results = engine.get_similar_segments("jazz", 1).await.unwrap();
        let json = serde_json::to_value(&results[0]).unwrap();

        assert_eq!(json["id"], "b");
        assert!(json["similarity"].is_number());
        assert_eq!(json["metadata"]["status"], "missing");
        assert_eq!(json["midi"]["status"], "unresolved");
    }
}
