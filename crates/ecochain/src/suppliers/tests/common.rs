use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::suppliers::domain::{
    ImageUpload, NewSupplier, PipelineProgress, RecommendationLabel, SupplierId, SupplierProfile,
    SupplierRecord,
};
use crate::suppliers::repository::{
    EmbeddingError, EmbeddingService, ImageStorage, ImageStorageError, ScoreUpdate, StoreError,
    SupplierStore,
};
use crate::suppliers::scoring::{
    CategoricalColumn, EncodingTables, FeatureMatrix, LinearRegressor, ModelError, Regressor,
    RowPredictions, ScoringModels,
};
use crate::suppliers::{supplier_router, SupplierPipeline};

pub(super) const TEST_DIMENSION: usize = 4;

pub(super) fn encoders() -> EncodingTables {
    let column = |name: &str, categories: &[&str]| CategoricalColumn {
        name: name.to_string(),
        categories: categories.iter().map(|value| value.to_string()).collect(),
    };
    EncodingTables::new(vec![
        column("country", &["Brazil", "Germany", "India", "Kenya"]),
        column(
            "region",
            &[
                "Africa",
                "Asia",
                "Europe",
                "North America",
                "South America",
                "Oceania",
            ],
        ),
        column(
            "partnership_status",
            &["Active", "Under Review", "Pending", "Inactive"],
        ),
        column("risk_level", &["Low", "Medium", "High"]),
    ])
    .expect("valid encoder layout")
}

/// carbon = 100 - 30 * risk, water = 40 + 4 * premium, waste = 90 - 10 * partnership,
/// social = 80 + 10 * embedding[0].
pub(super) fn subscore_model(dimension: usize) -> LinearRegressor {
    let width = 7 + dimension;
    let row = |entries: &[(usize, f64)]| {
        let mut weights = vec![0.0; width];
        for (index, weight) in entries {
            weights[*index] = *weight;
        }
        weights
    };
    LinearRegressor::new(
        vec![
            row(&[(3, -30.0)]),
            row(&[(5, 4.0)]),
            row(&[(2, -10.0)]),
            row(&[(7, 10.0)]),
        ],
        vec![100.0, 40.0, 90.0, 80.0],
    )
    .expect("valid sub-score model")
}

pub(super) fn overall_model() -> LinearRegressor {
    LinearRegressor::new(vec![vec![0.25; 4]], vec![0.0]).expect("valid overall model")
}

pub(super) fn models(dimension: usize) -> ScoringModels {
    ScoringModels::from_parts(
        encoders(),
        Arc::new(subscore_model(dimension)),
        Arc::new(overall_model()),
    )
    .expect("models chain together")
}

/// Regressor wrapper that records how often inference ran.
pub(super) struct CountingRegressor {
    inner: LinearRegressor,
    calls: AtomicUsize,
}

impl CountingRegressor {
    pub(super) fn new(inner: LinearRegressor) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Regressor for CountingRegressor {
    fn input_width(&self) -> usize {
        self.inner.input_width()
    }

    fn output_width(&self) -> usize {
        self.inner.output_width()
    }

    fn predict(&self, inputs: &FeatureMatrix) -> Result<RowPredictions, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.predict(inputs)
    }
}

pub(super) fn submission(name: &str) -> NewSupplier {
    NewSupplier {
        supplier_name: name.to_string(),
        country: "Kenya".to_string(),
        region: "Africa".to_string(),
        product_category: "Textiles".to_string(),
        sub_category: "Organic Cotton".to_string(),
        certifications: vec!["GOTS".to_string(), "Fair Trade".to_string()],
        partnership_status: "Active".to_string(),
        annual_volume: Some(250_000),
        cost_premium: Some(10.0),
        risk_level: "Low".to_string(),
        last_audit: NaiveDate::from_ymd_opt(2024, 3, 15).expect("valid date"),
        audit_summary: "No major findings".to_string(),
        images: Vec::new(),
    }
}

pub(super) fn image(file_name: &str) -> ImageUpload {
    ImageUpload {
        file_name: file_name.to_string(),
        bytes: vec![0x89, 0x50, 0x4e, 0x47],
    }
}

pub(super) fn profile(
    country: &str,
    risk_level: &str,
    partnership: &str,
    premium: f64,
) -> SupplierProfile {
    SupplierProfile {
        supplier_name: format!("{country} {risk_level} supplier"),
        country: country.to_string(),
        region: "Africa".to_string(),
        product_category: "Textiles".to_string(),
        sub_category: "Organic Cotton".to_string(),
        certification: "GOTS".to_string(),
        partnership_status: partnership.to_string(),
        annual_volume: 120_000,
        cost_premium: premium,
        risk_level: risk_level.to_string(),
        last_audit: "2024-03-15".to_string(),
        audit_summary: "Routine audit".to_string(),
    }
}

pub(super) fn embedded_record(sequence: u64, profile: SupplierProfile) -> SupplierRecord {
    SupplierRecord {
        supplier_id: SupplierId::from_sequence(sequence),
        profile,
        image_urls: Vec::new(),
        progress: PipelineProgress::Embedded {
            embedding: vec![0.0; TEST_DIMENSION],
        },
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryStore {
    pub(super) records: Arc<Mutex<BTreeMap<SupplierId, SupplierRecord>>>,
    score_writes: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub(super) fn seed(&self, record: SupplierRecord) {
        self.records
            .lock()
            .expect("store mutex poisoned")
            .insert(record.supplier_id.clone(), record);
    }

    pub(super) fn get(&self, id: &SupplierId) -> SupplierRecord {
        self.records
            .lock()
            .expect("store mutex poisoned")
            .get(id)
            .cloned()
            .expect("record present")
    }

    pub(super) fn score_writes(&self) -> usize {
        self.score_writes.load(Ordering::SeqCst)
    }

    fn modify<F>(&self, id: &SupplierId, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut SupplierRecord) -> Result<(), StoreError>,
    {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        let record = guard
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        change(record)
    }
}

impl SupplierStore for MemoryStore {
    fn insert(&self, profile: SupplierProfile) -> Result<SupplierRecord, StoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        let next = guard
            .keys()
            .filter_map(SupplierId::sequence)
            .max()
            .unwrap_or(0)
            + 1;
        let record = SupplierRecord::registered(SupplierId::from_sequence(next), profile);
        guard.insert(record.supplier_id.clone(), record.clone());
        Ok(record)
    }

    fn attach_images(&self, id: &SupplierId, image_urls: Vec<String>) -> Result<(), StoreError> {
        self.modify(id, |record| {
            record.image_urls = image_urls;
            Ok(())
        })
    }

    fn fetch(&self, id: &SupplierId) -> Result<Option<SupplierRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .expect("store mutex poisoned")
            .get(id)
            .cloned())
    }

    fn list(&self) -> Result<Vec<SupplierRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .expect("store mutex poisoned")
            .values()
            .cloned()
            .collect())
    }

    fn pending_scoring(&self, limit: usize) -> Result<Vec<SupplierRecord>, StoreError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        let mut pending: Vec<SupplierRecord> = guard
            .values()
            .filter(|record| matches!(record.progress, PipelineProgress::Embedded { .. }))
            .cloned()
            .collect();
        pending.sort_by_key(|record| std::cmp::Reverse(record.supplier_id.sequence()));
        pending.truncate(limit);
        Ok(pending)
    }

    fn update_embedding(&self, id: &SupplierId, embedding: Vec<f32>) -> Result<(), StoreError> {
        self.modify(id, |record| Ok(record.apply_embedding(embedding)?))
    }

    fn update_scores_batch(&self, updates: &[ScoreUpdate]) -> Result<(), StoreError> {
        self.score_writes.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.records.lock().expect("store mutex poisoned");
        for update in updates {
            let record = guard
                .get_mut(&update.supplier_id)
                .ok_or_else(|| StoreError::NotFound(update.supplier_id.clone()))?;
            record.apply_scores(update.scores)?;
        }
        Ok(())
    }

    fn update_recommendation(
        &self,
        id: &SupplierId,
        label: RecommendationLabel,
    ) -> Result<(), StoreError> {
        self.modify(id, |record| Ok(record.apply_label(label)?))
    }
}

pub(super) struct UnavailableStore;

impl SupplierStore for UnavailableStore {
    fn insert(&self, _profile: SupplierProfile) -> Result<SupplierRecord, StoreError> {
        Err(StoreError::Unavailable("warehouse offline".to_string()))
    }

    fn attach_images(&self, _id: &SupplierId, _urls: Vec<String>) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("warehouse offline".to_string()))
    }

    fn fetch(&self, _id: &SupplierId) -> Result<Option<SupplierRecord>, StoreError> {
        Err(StoreError::Unavailable("warehouse offline".to_string()))
    }

    fn list(&self) -> Result<Vec<SupplierRecord>, StoreError> {
        Err(StoreError::Unavailable("warehouse offline".to_string()))
    }

    fn pending_scoring(&self, _limit: usize) -> Result<Vec<SupplierRecord>, StoreError> {
        Err(StoreError::Unavailable("warehouse offline".to_string()))
    }

    fn update_embedding(&self, _id: &SupplierId, _embedding: Vec<f32>) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("warehouse offline".to_string()))
    }

    fn update_scores_batch(&self, _updates: &[ScoreUpdate]) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("warehouse offline".to_string()))
    }

    fn update_recommendation(
        &self,
        _id: &SupplierId,
        _label: RecommendationLabel,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("warehouse offline".to_string()))
    }
}

/// Returns a zero vector of the configured length.
pub(super) struct StaticEmbedder {
    pub(super) dimension: usize,
    calls: AtomicUsize,
}

impl StaticEmbedder {
    pub(super) fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingService for StaticEmbedder {
    fn embed(&self, _content: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![0.0; self.dimension])
    }
}

/// Returns the same vector for every call.
pub(super) struct FixedEmbedder(pub(super) Vec<f32>);

impl EmbeddingService for FixedEmbedder {
    fn embed(&self, _content: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.0.clone())
    }
}

pub(super) struct FailingEmbedder;

impl EmbeddingService for FailingEmbedder {
    fn embed(&self, _content: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Unavailable("quota exceeded".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryImages {
    uploads: Mutex<Vec<(String, String)>>,
}

impl MemoryImages {
    pub(super) fn uploads(&self) -> Vec<(String, String)> {
        self.uploads.lock().expect("image mutex poisoned").clone()
    }
}

impl ImageStorage for MemoryImages {
    fn upload(
        &self,
        blob_name: &str,
        content_type: &str,
        _bytes: &[u8],
    ) -> Result<String, ImageStorageError> {
        self.uploads
            .lock()
            .expect("image mutex poisoned")
            .push((blob_name.to_string(), content_type.to_string()));
        Ok(format!("gs://test-bucket/{blob_name}"))
    }
}

pub(super) struct FailingImages;

impl ImageStorage for FailingImages {
    fn upload(
        &self,
        _blob_name: &str,
        _content_type: &str,
        _bytes: &[u8],
    ) -> Result<String, ImageStorageError> {
        Err(ImageStorageError::Unavailable("bucket missing".to_string()))
    }
}

pub(super) type TestPipeline = SupplierPipeline<MemoryStore, StaticEmbedder, MemoryImages>;

pub(super) struct Harness {
    pub(super) pipeline: TestPipeline,
    pub(super) store: Arc<MemoryStore>,
    pub(super) embedder: Arc<StaticEmbedder>,
    pub(super) images: Arc<MemoryImages>,
}

pub(super) fn harness() -> Harness {
    let store = Arc::new(MemoryStore::default());
    let embedder = Arc::new(StaticEmbedder::new(TEST_DIMENSION));
    let images = Arc::new(MemoryImages::default());
    let pipeline = SupplierPipeline::new(
        store.clone(),
        embedder.clone(),
        images.clone(),
        Arc::new(models(TEST_DIMENSION)),
    );
    Harness {
        pipeline,
        store,
        embedder,
        images,
    }
}

pub(super) fn router_with(pipeline: TestPipeline) -> axum::Router {
    supplier_router(Arc::new(pipeline))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
