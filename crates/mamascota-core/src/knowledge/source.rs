//! Where the knowledge base comes from: a JSON file on disk or an in-memory value.

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;

/// Errors raised while reading a knowledge source. They never escape `KnowledgeBaseStore::load`.
#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    #[error("knowledge base not readable at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("knowledge base is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Raw knowledge-base document provider.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// Human-readable origin for logs.
    fn describe(&self) -> String;

    /// Read the raw JSON document.
    async fn read(&self) -> Result<Value, KnowledgeError>;
}

/// JSON file on disk (the bundled `data/knowledge_base.json` in production).
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl KnowledgeSource for FileSource {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    async fn read(&self) -> Result<Value, KnowledgeError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| KnowledgeError::Io {
                path: self.path.clone(),
                source,
            })?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// In-memory document: embedded data or test fixtures.
pub struct StaticSource {
    document: Value,
}

impl StaticSource {
    pub fn new(document: Value) -> Self {
        Self { document }
    }
}

#[async_trait]
impl KnowledgeSource for StaticSource {
    fn describe(&self) -> String {
        "in-memory document".to_string()
    }

    async fn read(&self) -> Result<Value, KnowledgeError> {
        Ok(self.document.clone())
    }
}
