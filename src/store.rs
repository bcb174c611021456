//! Persistence boundary for uploaded documents and their previews.
//!
//! Documents and previews are keyed independently: a document id comes from
//! [`ResumeStore::put_document`], a preview is stored under whatever id the
//! caller picks (usually the review id).

use crate::document::{Document, PreviewImage};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A document as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub id: String,
    pub media_type: String,
    pub bytes: Arc<[u8]>,
    /// Unix epoch milliseconds.
    pub created_at_ms: u64,
}

/// Blob storage for documents and previews.
#[async_trait]
pub trait ResumeStore: Send + Sync {
    /// Store `document` under a fresh id and return it.
    async fn put_document(&self, document: &Document) -> Result<String, StoreError>;

    async fn get_document(&self, id: &str) -> Result<Option<StoredDocument>, StoreError>;

    /// Deleting an absent id is not an error.
    async fn delete_document(&self, id: &str) -> Result<(), StoreError>;

    /// Store `preview` under `id`, replacing any previous one.
    async fn put_preview(&self, id: &str, preview: &PreviewImage) -> Result<(), StoreError>;

    async fn get_preview(&self, id: &str) -> Result<Option<PreviewImage>, StoreError>;

    async fn delete_preview(&self, id: &str) -> Result<(), StoreError>;
}

/// [`ResumeStore`] held in process memory.
#[derive(Debug, Default)]
pub struct MemoryResumeStore {
    documents: RwLock<HashMap<String, StoredDocument>>,
    previews: RwLock<HashMap<String, PreviewImage>>,
}

impl MemoryResumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn document_count(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn preview_count(&self) -> usize {
        self.previews.read().await.len()
    }

    /// Drop every document and preview.
    pub async fn clear(&self) {
        self.documents.write().await.clear();
        self.previews.write().await.clear();
    }
}

#[async_trait]
impl ResumeStore for MemoryResumeStore {
    async fn put_document(&self, document: &Document) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let stored = StoredDocument {
            id: id.clone(),
            media_type: document.media_type().to_string(),
            bytes: document.shared_bytes(),
            created_at_ms: crate::limiter::now_ms(),
        };
        self.documents.write().await.insert(id.clone(), stored);
        Ok(id)
    }

    async fn get_document(&self, id: &str) -> Result<Option<StoredDocument>, StoreError> {
        Ok(self.documents.read().await.get(id).cloned())
    }

    async fn delete_document(&self, id: &str) -> Result<(), StoreError> {
        self.documents.write().await.remove(id);
        Ok(())
    }

    async fn put_preview(&self, id: &str, preview: &PreviewImage) -> Result<(), StoreError> {
        if id.is_empty() {
            return Err(StoreError::Backend("preview id is required".into()));
        }
        self.previews
            .write()
            .await
            .insert(id.to_string(), preview.clone());
        Ok(())
    }

    async fn get_preview(&self, id: &str) -> Result<Option<PreviewImage>, StoreError> {
        Ok(self.previews.read().await.get(id).cloned())
    }

    async fn delete_preview(&self, id: &str) -> Result<(), StoreError> {
        self.previews.write().await.remove(id);
        Ok(())
    }
}
