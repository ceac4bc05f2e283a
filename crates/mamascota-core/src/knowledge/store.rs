//! Knowledge Base Store: loads the static collections once and serves them read-only.

use super::entries::KnowledgeBase;
use super::source::KnowledgeSource;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Owns the three static collections. The first `load` reads the source; concurrent first
/// callers share that single in-flight load, later callers get the cached value.
pub struct KnowledgeBaseStore {
    source: Option<Box<dyn KnowledgeSource>>,
    cache: OnceCell<Arc<KnowledgeBase>>,
}

impl KnowledgeBaseStore {
    pub fn new(source: impl KnowledgeSource + 'static) -> Self {
        Self {
            source: Some(Box::new(source)),
            cache: OnceCell::new(),
        }
    }

    /// Store that is already loaded with `kb`; no source is ever read.
    pub fn preloaded(kb: KnowledgeBase) -> Self {
        Self {
            source: None,
            cache: OnceCell::new_with(Some(Arc::new(kb))),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.cache.initialized()
    }

    /// Never fails: an unreadable or malformed source yields the empty knowledge base.
    pub async fn load(&self) -> Arc<KnowledgeBase> {
        self.cache
            .get_or_init(|| async { Arc::new(self.read_source().await) })
            .await
            .clone()
    }

    async fn read_source(&self) -> KnowledgeBase {
        let Some(source) = self.source.as_ref() else {
            return KnowledgeBase::default();
        };
        match source.read().await {
            Ok(document) => {
                let kb = KnowledgeBase::from_value(&document);
                info!(
                    algorithms = kb.algorithms.len(),
                    clinical_details = kb.clinical_details.len(),
                    breed_risks = kb.breed_risks.len(),
                    "Knowledge base loaded from {}",
                    source.describe()
                );
                kb
            }
            Err(e) => {
                warn!(
                    "Knowledge base unavailable ({}): {} - continuing with empty collections",
                    source.describe(),
                    e
                );
                KnowledgeBase::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::source::{FileSource, KnowledgeError};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        reads: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl KnowledgeSource for CountingSource {
        fn describe(&self) -> String {
            "counting".into()
        }

        async fn read(&self) -> Result<Value, KnowledgeError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Ok(json!({ "algorithms": [{ "nivelUsuario": "familiar" }] }))
        }
    }

    #[tokio::test]
    async fn concurrent_first_loads_share_one_read() {
        let reads = Arc::new(AtomicUsize::new(0));
        let store = Arc::new(KnowledgeBaseStore::new(CountingSource {
            reads: Arc::clone(&reads),
        }));
        assert!(!store.is_loaded());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.load().await.algorithms.len() })
            })
            .collect();
        for h in handles {
            assert_eq!(h.await.unwrap(), 1);
        }
        store.load().await;
        assert_eq!(reads.load(Ordering::SeqCst), 1);
        assert!(store.is_loaded());
    }

    #[tokio::test]
    async fn missing_file_degrades_to_empty() {
        let store = KnowledgeBaseStore::new(FileSource::new("/definitely/not/here.json"));
        assert!(store.load().await.is_empty());
        assert!(store.is_loaded());
    }

    #[tokio::test]
    async fn malformed_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = KnowledgeBaseStore::new(FileSource::new(&path));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn file_source_reads_collections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.json");
        std::fs::write(
            &path,
            r#"{"algorithms":[{"nivelUsuario":"familiar"}],"clinicalDetails":[{"especie":"gato"}],"breedRisks":[]}"#,
        )
        .unwrap();
        let kb = KnowledgeBaseStore::new(FileSource::new(&path)).load().await;
        assert_eq!(kb.algorithms.len(), 1);
        assert_eq!(kb.clinical_details.len(), 1);
    }

    #[tokio::test]
    async fn preloaded_store_is_ready() {
        let store = KnowledgeBaseStore::preloaded(KnowledgeBase::default());
        assert!(store.is_loaded());
        assert!(store.load().await.is_empty());
    }
}
