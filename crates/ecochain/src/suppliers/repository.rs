use serde::{Deserialize, Serialize};

use super::domain::{
    EcoScores, InvalidTransition, RecommendationLabel, SupplierId, SupplierProfile,
    SupplierRecord,
};

/// Durable supplier table. Every stage transition is exactly one call on this trait.
pub trait SupplierStore: Send + Sync {
    /// Persist a new `Registered` record. The store assigns the identifier.
    fn insert(&self, profile: SupplierProfile) -> Result<SupplierRecord, StoreError>;
    fn attach_images(&self, id: &SupplierId, image_urls: Vec<String>) -> Result<(), StoreError>;
    fn fetch(&self, id: &SupplierId) -> Result<Option<SupplierRecord>, StoreError>;
    fn list(&self) -> Result<Vec<SupplierRecord>, StoreError>;
    /// Embedded records with no overall score, newest identifier first.
    fn pending_scoring(&self, limit: usize) -> Result<Vec<SupplierRecord>, StoreError>;
    fn update_embedding(&self, id: &SupplierId, embedding: Vec<f32>) -> Result<(), StoreError>;
    /// One write for a whole batch of score groups.
    fn update_scores_batch(&self, updates: &[ScoreUpdate]) -> Result<(), StoreError>;
    fn update_recommendation(
        &self,
        id: &SupplierId,
        label: RecommendationLabel,
    ) -> Result<(), StoreError>;
}

/// Score group destined for one supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreUpdate {
    pub supplier_id: SupplierId,
    pub scores: EcoScores,
}

/// Store failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("supplier {0} not found")]
    NotFound(SupplierId),
    #[error("supplier already exists")]
    Conflict,
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error("supplier store unavailable: {0}")]
    Unavailable(String),
}

/// Remote text embedding model.
pub trait EmbeddingService: Send + Sync {
    fn embed(&self, content: &str) -> Result<Vec<f32>, EmbeddingError>;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding service unavailable: {0}")]
    Unavailable(String),
    #[error("embedding has {got} dimensions, models expect {expected}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("embedding component {index} is not a finite number")]
    NonFinite { index: usize },
}

/// Object storage for product images. Returns the public URL of the stored blob.
pub trait ImageStorage: Send + Sync {
    fn upload(
        &self,
        blob_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<String, ImageStorageError>;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ImageStorageError {
    #[error("image storage unavailable: {0}")]
    Unavailable(String),
    #[error("image '{0}' has no supported extension")]
    UnsupportedImage(String),
}
