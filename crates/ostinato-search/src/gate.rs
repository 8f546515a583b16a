//! One-shot readiness gate between loading and serving.
//!
//! Until an engine is published, fail-fast calls return
//! [`QueryError::NotReady`] and [`EngineGate::engine`] waits. Once
//! published the engine is never replaced.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;

use crate::artifact::SegmentIndex;
use crate::embedding::EmbeddingProvider;
use crate::engine::{QueryEngine, SearchHit, SearchResult};
use crate::error::{LoadError, QueryError};

/// Shared handle to the engine a process serves. Clones share one gate.
#[derive(Debug, Clone)]
pub struct EngineGate {
    tx: Arc<watch::Sender<Option<Arc<QueryEngine>>>>,
}

impl Default for EngineGate {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineGate {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Open the gate with `engine`. Fails if an engine was already
    /// published.
    pub fn publish(&self, engine: QueryEngine) -> Result<Arc<QueryEngine>, LoadError> {
        let engine = Arc::new(engine);
        let published = self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                false
            } else {
                *slot = Some(Arc::clone(&engine));
                true
            }
        });

        if published {
            let manifest = engine.index().manifest();
            log::info!(
                "Serving index {} ({} segments)",
                manifest.build_id,
                manifest.entry_count
            );
            Ok(engine)
        } else {
            Err(LoadError::AlreadyLoaded)
        }
    }

    /// Load the index at `path` off the async runtime, build an engine
    /// around it, and publish it. `configure` attaches stores and options.
    ///
    /// On any load error the gate stays closed.
    pub async fn load<F>(
        &self,
        path: impl Into<PathBuf>,
        provider: Arc<dyn EmbeddingProvider>,
        configure: F,
    ) -> Result<Arc<QueryEngine>, LoadError>
    where
        F: FnOnce(QueryEngine) -> QueryEngine,
    {
        if self.is_ready() {
            return Err(LoadError::AlreadyLoaded);
        }

        let path = path.into();
        let task_path = path.clone();
        let index = tokio::task::spawn_blocking(move || SegmentIndex::load(&task_path))
            .await
            .map_err(|e| LoadError::Io {
                path,
                source: std::io::Error::other(e),
            })??;

        let engine = configure(QueryEngine::new(Arc::new(index), provider)?);
        self.publish(engine)
    }

    /// The published engine, or `NotReady`.
    pub fn try_engine(&self) -> Result<Arc<QueryEngine>, QueryError> {
        self.tx
            .borrow()
            .as_ref()
            .map(Arc::clone)
            .ok_or(QueryError::NotReady)
    }

    /// Wait until an engine is published.
    pub async fn engine(&self) -> Result<Arc<QueryEngine>, QueryError> {
        let mut rx = self.tx.subscribe();
        let slot = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| QueryError::NotReady)?;
        slot.as_ref().map(Arc::clone).ok_or(QueryError::NotReady)
    }

    pub async fn search(&self, query_text: &str, top_k: usize) -> Result<Vec<SearchHit>, QueryError> {
        self.try_engine()?.search(query_text, top_k).await
    }

    pub async fn get_similar_segments(
        &self,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, QueryError> {
        self.try_engine()?
            .get_similar_segments(query_text, top_k)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::IndexBuilder;
    use crate::embedding::HashingEmbeddingProvider;
    use crate::engine::ScoreMode;
    use ostinato_core::CorpusEntry;

    fn corpus() -> Vec<CorpusEntry> {
        vec![
            CorpusEntry::new("a", "calm piano ballad"),
            CorpusEntry::new("b", "upbeat jazz drums"),
        ]
    }

    fn provider() -> Arc<dyn EmbeddingProvider> {
        Arc::new(HashingEmbeddingProvider::default())
    }

    async fn engine() -> QueryEngine {
        let index = IndexBuilder::new(provider()).build(&corpus()).await.unwrap();
        QueryEngine::new(Arc::new(index), provider()).unwrap()
    }

    #[tokio::test]
    async fn test_not_ready_fails_fast() {
        let gate = EngineGate::new();
        assert!(!gate.is_ready());
        assert!(matches!(gate.try_engine(), Err(QueryError::NotReady)));
        assert!(matches!(
            gate.search("piano", 1).await,
            Err(QueryError::NotReady)
        ));
        assert!(matches!(
            gate.get_similar_segments("piano", 1).await,
            Err(QueryError::NotReady)
        ));
    }

    #[tokio::test]
    async fn test_publish_once() {
        let gate = EngineGate::new();
        gate.publish(engine().await).unwrap();
        assert!(gate.is_ready());
        assert_eq!(gate.search("piano", 1).await.unwrap().len(), 1);

        let err = gate.publish(engine().await).unwrap_err();
        assert!(matches!(err, LoadError::AlreadyLoaded));
    }

    #[tokio::test]
    async fn test_waiters_released_on_publish() {
        let gate = EngineGate::new();
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.engine().await.map(|e| e.index().len()) })
        };

        tokio::task::yield_now().await;
        gate.publish(engine().await).unwrap();

        assert_eq!(waiter.await.unwrap().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segments.index.json");
        IndexBuilder::new(provider())
            .build_to_path(&corpus(), &path)
            .await
            .unwrap();

        let gate = EngineGate::new();
        let engine = gate
            .load(&path, provider(), |e| e.with_score_mode(ScoreMode::Cosine))
            .await
            .unwrap();
        assert_eq!(engine.score_mode(), ScoreMode::Cosine);
        assert!(gate.is_ready());
    }

    #[tokio::test]
    async fn test_failed_load_keeps_gate_closed() {
        let dir = tempfile::tempdir().unwrap();
        let gate = EngineGate::new();

        let err = gate
            .load(dir.path().join("missing.json"), provider(), |e| e)
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
        assert!(!gate.is_ready());
    }

    #[tokio::test]
    async fn test_load_refuses_other_provider() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segments.index.json");
        IndexBuilder::new(provider())
            .build_to_path(&corpus(), &path)
            .await
            .unwrap();

        let gate = EngineGate::new();
        let err = gate
            .load(&path, Arc::new(HashingEmbeddingProvider::new(32)), |e| e)
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::ProviderMismatch { .. }));
        assert!(!gate.is_ready());
    }
}
