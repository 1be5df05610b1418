use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{
    NewSupplier, PipelineStage, RecommendationLabel, SupplierId, SupplierRecord, ValidationError,
};
use super::images;
use super::repository::{
    EmbeddingError, EmbeddingService, ImageStorage, ImageStorageError, ScoreUpdate, StoreError,
    SupplierStore,
};
use super::scoring::{FeatureMatrix, Recommendation, ScoringError, ScoringModels};

/// Orchestrates `Registered -> Embedded -> Scored -> Recommended` for each supplier.
///
/// Every transition is a single store write. A failed stage leaves the record at the last stage
/// it reached; [`SupplierPipeline::advance`] picks up from there.
pub struct SupplierPipeline<S, E, I> {
    store: Arc<S>,
    embeddings: Arc<E>,
    images: Arc<I>,
    models: Arc<ScoringModels>,
}

impl<S, E, I> SupplierPipeline<S, E, I>
where
    S: SupplierStore + 'static,
    E: EmbeddingService + 'static,
    I: ImageStorage + 'static,
{
    pub fn new(
        store: Arc<S>,
        embeddings: Arc<E>,
        images: Arc<I>,
        models: Arc<ScoringModels>,
    ) -> Self {
        Self {
            store,
            embeddings,
            images,
            models,
        }
    }

    pub fn models(&self) -> &ScoringModels {
        &self.models
    }

    /// Validate a submission, persist it, and upload its images.
    pub fn register(&self, submission: NewSupplier) -> Result<SupplierRecord, PipelineError> {
        let (profile, uploads) = submission.validate()?;
        let mut record = self.store.insert(profile)?;
        let supplier_id = record.supplier_id.clone();
        info!(supplier_id = %supplier_id, images = uploads.len(), "supplier registered");

        if uploads.is_empty() {
            return Ok(record);
        }

        let mut image_urls = Vec::with_capacity(uploads.len());
        for (index, upload) in uploads.iter().enumerate() {
            let url = self
                .upload_image(&supplier_id, index + 1, &upload.file_name, &upload.bytes)
                .map_err(|error| fail(&supplier_id, PipelineStage::Registered, error.into()))?;
            image_urls.push(url);
        }

        self.store
            .attach_images(&supplier_id, image_urls.clone())
            .map_err(|error| fail(&supplier_id, PipelineStage::Registered, error.into()))?;
        record.image_urls = image_urls;
        Ok(record)
    }

    fn upload_image(
        &self,
        supplier_id: &SupplierId,
        position: usize,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, ImageStorageError> {
        let unsupported = || ImageStorageError::UnsupportedImage(file_name.to_string());
        let blob = images::blob_name(supplier_id, position, file_name).ok_or_else(unsupported)?;
        let content_type = images::content_type_for(file_name).ok_or_else(unsupported)?;
        let location = self
            .images
            .upload(&blob, content_type.essence_str(), bytes)?;
        debug!(supplier_id = %supplier_id, blob = %blob, "image uploaded");
        Ok(images::public_url(&location).unwrap_or(location))
    }

    /// `Registered -> Embedded`.
    pub fn embed(&self, supplier_id: &SupplierId) -> Result<SupplierRecord, PipelineError> {
        let record = self.fetch(supplier_id)?;
        self.embed_record(record)
    }

    fn embed_record(&self, mut record: SupplierRecord) -> Result<SupplierRecord, PipelineError> {
        let stage = PipelineStage::Embedded;
        let supplier_id = record.supplier_id.clone();
        expect_stage(&record, PipelineStage::Registered, stage)?;

        let content = record.profile.embedding_content();
        let embedding = self
            .embeddings
            .embed(&content)
            .map_err(|error| fail(&supplier_id, stage, error.into()))?;

        let expected = self.models.embedding_dimension();
        if embedding.len() != expected {
            let error = EmbeddingError::DimensionMismatch {
                expected,
                got: embedding.len(),
            };
            return Err(fail(&supplier_id, stage, error.into()));
        }
        if let Some(index) = embedding.iter().position(|value| !value.is_finite()) {
            let error = EmbeddingError::NonFinite { index };
            return Err(fail(&supplier_id, stage, error.into()));
        }

        self.store
            .update_embedding(&supplier_id, embedding.clone())
            .map_err(|error| fail(&supplier_id, stage, error.into()))?;
        record
            .apply_embedding(embedding)
            .map_err(|error| fail(&supplier_id, stage, StoreError::from(error).into()))?;

        info!(supplier_id = %supplier_id, stage = %stage, "supplier embedded");
        Ok(record)
    }

    /// Score a batch of embedded suppliers with one model call and one store write.
    ///
    /// Failures stay with the record that caused them; the rest of the batch still lands.
    pub fn score(&self, supplier_ids: &[SupplierId]) -> Result<BatchOutcome, PipelineError> {
        let mut outcome = BatchOutcome::default();
        let mut records = Vec::with_capacity(supplier_ids.len());
        for supplier_id in supplier_ids {
            match self.fetch(supplier_id) {
                Ok(record) => records.push(record),
                Err(error) => outcome.failed.push(error),
            }
        }

        let mut eligible = Vec::with_capacity(records.len());
        for record in records {
            match expect_stage(&record, PipelineStage::Embedded, PipelineStage::Scored) {
                Ok(()) => eligible.push(record),
                Err(error) => outcome.failed.push(error),
            }
        }

        let scored = self.score_records(eligible);
        outcome.scored.extend(scored.scored);
        outcome.failed.extend(scored.failed);
        Ok(outcome)
    }

    /// Score up to `limit` pending suppliers, newest identifier first.
    pub fn score_pending(&self, limit: usize) -> Result<BatchOutcome, PipelineError> {
        let pending = self.store.pending_scoring(limit)?;
        info!(pending = pending.len(), limit, "scoring pending suppliers");
        Ok(self.score_records(pending))
    }

    fn score_records(&self, records: Vec<SupplierRecord>) -> BatchOutcome {
        let stage = PipelineStage::Scored;
        let mut outcome = BatchOutcome::default();
        if records.is_empty() {
            return outcome;
        }

        let width = self.models.feature_width();
        let mut matrix = FeatureMatrix::new(width);
        let mut prepared = Vec::with_capacity(records.len());
        for record in records {
            let pushed = self
                .models
                .prepare(&record)
                .and_then(|features| matrix.push(features).map_err(ScoringError::from));
            match pushed {
                Ok(()) => prepared.push(record),
                Err(error) => {
                    outcome
                        .failed
                        .push(fail(&record.supplier_id, stage, error.into()));
                }
            }
        }

        if prepared.is_empty() {
            return outcome;
        }

        let rows = match self.models.score_batch(&matrix) {
            Ok(rows) => rows,
            Err(error) => {
                outcome.failed.extend(prepared.iter().map(|record| {
                    fail(&record.supplier_id, stage, error.clone().into())
                }));
                return outcome;
            }
        };

        let mut ready = Vec::with_capacity(prepared.len());
        for (record, row) in prepared.into_iter().zip(rows) {
            match row {
                Ok(scores) => ready.push((record, scores)),
                Err(error) => {
                    outcome
                        .failed
                        .push(fail(&record.supplier_id, stage, error.into()));
                }
            }
        }

        if ready.is_empty() {
            return outcome;
        }

        let updates: Vec<ScoreUpdate> = ready
            .iter()
            .map(|(record, scores)| ScoreUpdate {
                supplier_id: record.supplier_id.clone(),
                scores: *scores,
            })
            .collect();

        if let Err(error) = self.store.update_scores_batch(&updates) {
            outcome.failed.extend(ready.iter().map(|(record, _)| {
                fail(&record.supplier_id, stage, error.clone().into())
            }));
            return outcome;
        }

        for (mut record, scores) in ready {
            match record.apply_scores(scores) {
                Ok(()) => {
                    info!(
                        supplier_id = %record.supplier_id,
                        stage = %stage,
                        overall = scores.overall,
                        "supplier scored"
                    );
                    outcome.scored.push(record);
                }
                Err(error) => {
                    let supplier_id = record.supplier_id.clone();
                    outcome
                        .failed
                        .push(fail(&supplier_id, stage, StoreError::from(error).into()));
                }
            }
        }

        outcome
    }

    fn score_one(&self, record: SupplierRecord) -> Result<SupplierRecord, PipelineError> {
        let mut outcome = self.score_records(vec![record]);
        if let Some(error) = outcome.failed.pop() {
            return Err(error);
        }
        outcome
            .scored
            .pop()
            .ok_or_else(|| PipelineError::Store(StoreError::Unavailable("empty batch".into())))
    }

    /// `Scored -> Recommended`, derived from the persisted overall score.
    pub fn recommend(&self, supplier_id: &SupplierId) -> Result<SupplierRecord, PipelineError> {
        let record = self.fetch(supplier_id)?;
        self.recommend_record(record)
    }

    fn recommend_record(
        &self,
        mut record: SupplierRecord,
    ) -> Result<SupplierRecord, PipelineError> {
        let stage = PipelineStage::Recommended;
        let supplier_id = record.supplier_id.clone();
        expect_stage(&record, PipelineStage::Scored, stage)?;

        let overall = record.overall_score().ok_or_else(|| {
            fail(
                &supplier_id,
                stage,
                StageFailure::OutOfOrder {
                    current: record.stage(),
                    expected: PipelineStage::Scored,
                },
            )
        })?;
        let label = RecommendationLabel::from(Recommendation::derive(overall));

        self.store
            .update_recommendation(&supplier_id, label)
            .map_err(|error| fail(&supplier_id, stage, error.into()))?;
        record
            .apply_label(label)
            .map_err(|error| fail(&supplier_id, stage, StoreError::from(error).into()))?;

        info!(
            supplier_id = %supplier_id,
            stage = %stage,
            overall,
            recommendation = label.label(),
            "supplier recommended"
        );
        Ok(record)
    }

    /// Run every remaining stage from wherever the record currently sits.
    pub fn advance(&self, supplier_id: &SupplierId) -> Result<SupplierRecord, PipelineError> {
        let mut record = self.fetch(supplier_id)?;
        loop {
            record = match record.stage() {
                PipelineStage::Registered => self.embed_record(record)?,
                PipelineStage::Embedded => self.score_one(record)?,
                PipelineStage::Scored => self.recommend_record(record)?,
                PipelineStage::Recommended => return Ok(record),
            };
        }
    }

    /// Register a submission and drive it through to a recommendation.
    pub fn onboard(&self, submission: NewSupplier) -> Result<SupplierRecord, PipelineError> {
        let record = self.register(submission)?;
        self.advance(&record.supplier_id)
    }

    /// Recompute scores and recommendation for an already scored supplier.
    pub fn rescore(&self, supplier_id: &SupplierId) -> Result<SupplierRecord, PipelineError> {
        let record = self.fetch(supplier_id)?;
        if record.stage() < PipelineStage::Scored {
            return Err(fail(
                supplier_id,
                PipelineStage::Scored,
                StageFailure::OutOfOrder {
                    current: record.stage(),
                    expected: PipelineStage::Scored,
                },
            ));
        }
        info!(supplier_id = %supplier_id, previous = %record.stage(), "rescoring supplier");
        let record = self.score_one(record)?;
        self.recommend_record(record)
    }

    pub fn get(&self, supplier_id: &SupplierId) -> Result<SupplierRecord, PipelineError> {
        self.fetch(supplier_id)
    }

    pub fn list(&self) -> Result<Vec<SupplierRecord>, PipelineError> {
        Ok(self.store.list()?)
    }

    fn fetch(&self, supplier_id: &SupplierId) -> Result<SupplierRecord, PipelineError> {
        self.store
            .fetch(supplier_id)?
            .ok_or_else(|| PipelineError::NotFound(supplier_id.clone()))
    }
}

fn expect_stage(
    record: &SupplierRecord,
    expected: PipelineStage,
    attempted: PipelineStage,
) -> Result<(), PipelineError> {
    let current = record.stage();
    if current == expected {
        Ok(())
    } else {
        Err(fail(
            &record.supplier_id,
            attempted,
            StageFailure::OutOfOrder { current, expected },
        ))
    }
}

fn fail(supplier_id: &SupplierId, stage: PipelineStage, source: StageFailure) -> PipelineError {
    warn!(supplier_id = %supplier_id, stage = %stage, error = %source, "pipeline stage failed");
    PipelineError::StageFailed {
        supplier_id: supplier_id.clone(),
        stage,
        source,
    }
}

/// Result of a batch scoring call.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub scored: Vec<SupplierRecord>,
    pub failed: Vec<PipelineError>,
}

impl BatchOutcome {
    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            scored: self
                .scored
                .iter()
                .map(|record| record.supplier_id.clone())
                .collect(),
            failed: self.failed.iter().map(BatchFailureView::from).collect(),
        }
    }
}

/// Serializable view of a [`BatchOutcome`].
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub scored: Vec<SupplierId>,
    pub failed: Vec<BatchFailureView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchFailureView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_id: Option<SupplierId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<PipelineStage>,
    pub error: String,
}

impl From<&PipelineError> for BatchFailureView {
    fn from(error: &PipelineError) -> Self {
        Self {
            supplier_id: error.supplier_id().cloned(),
            stage: error.stage(),
            error: error.to_string(),
        }
    }
}

/// Cause of a failed stage.
#[derive(Debug, thiserror::Error)]
pub enum StageFailure {
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Images(#[from] ImageStorageError),
    #[error("supplier is {current}, expected {expected}")]
    OutOfOrder {
        current: PipelineStage,
        expected: PipelineStage,
    },
}

/// Error raised by the supplier pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("supplier {0} not found")]
    NotFound(SupplierId),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("supplier {supplier_id} failed at stage {stage}: {source}")]
    StageFailed {
        supplier_id: SupplierId,
        stage: PipelineStage,
        #[source]
        source: StageFailure,
    },
}

impl PipelineError {
    pub fn supplier_id(&self) -> Option<&SupplierId> {
        match self {
            Self::NotFound(id) | Self::StageFailed { supplier_id: id, .. } => Some(id),
            Self::Store(StoreError::NotFound(id)) => Some(id),
            _ => None,
        }
    }

    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
