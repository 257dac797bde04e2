//! Document persistence for anchor and overlay records.

use std::hash::Hash;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::model::{Anchor, AnchorId, Overlay, OverlayId};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("document {0} already exists")]
    Conflict(String),
    #[error("document {0} does not exist")]
    Missing(String),
    #[error("backend failure: {0}")]
    Backend(String),
}

/// A record with a stable identifier.
pub trait Document: Clone + Send + Sync + 'static {
    type Id: Copy + Eq + Hash + std::fmt::Display + Send + Sync + 'static;

    fn id(&self) -> Self::Id;
}

impl Document for Anchor {
    type Id = AnchorId;

    fn id(&self) -> AnchorId {
        self.id
    }
}

impl Document for Overlay {
    type Id = OverlayId;

    fn id(&self) -> OverlayId {
        self.id
    }
}

/// Keyed document storage.
pub trait DocumentStore<D: Document>: Send + Sync {
    /// Insert a new document. Fails if the id is taken.
    fn save(&self, document: &D) -> Result<(), StoreError>;

    fn get(&self, id: D::Id) -> Result<Option<D>, StoreError>;

    /// Replace an existing document. Fails if it does not exist.
    fn update(&self, document: &D) -> Result<(), StoreError>;

    /// Remove a document, returning whether it existed.
    fn delete(&self, id: D::Id) -> Result<bool, StoreError>;
}

/// Process-local store.
pub struct MemoryStore<D: Document> {
    documents: DashMap<D::Id, D>,
}

impl<D: Document> MemoryStore<D> {
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl<D: Document> Default for MemoryStore<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Document> DocumentStore<D> for MemoryStore<D> {
    fn save(&self, document: &D) -> Result<(), StoreError> {
        match self.documents.entry(document.id()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(document.id().to_string())),
            Entry::Vacant(slot) => {
                slot.insert(document.clone());
                Ok(())
            }
        }
    }

    fn get(&self, id: D::Id) -> Result<Option<D>, StoreError> {
        Ok(self.documents.get(&id).map(|d| d.value().clone()))
    }

    fn update(&self, document: &D) -> Result<(), StoreError> {
        match self.documents.get_mut(&document.id()) {
            Some(mut existing) => {
                *existing = document.clone();
                Ok(())
            }
            None => Err(StoreError::Missing(document.id().to_string())),
        }
    }

    fn delete(&self, id: D::Id) -> Result<bool, StoreError> {
        Ok(self.documents.remove(&id).is_some())
    }
}
