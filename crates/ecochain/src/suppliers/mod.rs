//! Supplier onboarding and the eco score pipeline.
//!
//! A supplier moves `Registered -> Embedded -> Scored -> Recommended`. Feature preparation and
//! model inference live in [`scoring`]; [`SupplierPipeline`] sequences the stages against the
//! injected store, embedding service, and image storage.

pub mod domain;
pub mod images;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    EcoScores, ImageUpload, InvalidTransition, NewSupplier, PipelineProgress, PipelineStage,
    RecommendationLabel, SubScores, SupplierId, SupplierProfile, SupplierRecord,
    SupplierStatusView, ValidationError,
};
pub use repository::{
    EmbeddingError, EmbeddingService, ImageStorage, ImageStorageError, ScoreUpdate, StoreError,
    SupplierStore,
};
pub use router::supplier_router;
pub use scoring::{
    ArtifactError, Recommendation, ScoringError, ScoringModels, CATEGORICAL_COLUMNS,
};
pub use service::{
    BatchFailureView, BatchOutcome, BatchSummary, PipelineError, StageFailure, SupplierPipeline,
};
