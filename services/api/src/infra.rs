use ecochain::suppliers::scoring::{CategoricalColumn, EncodingTables, LinearRegressor};
use ecochain::suppliers::{
    ArtifactError, EmbeddingError, EmbeddingService, ImageStorage, ImageStorageError,
    PipelineProgress, RecommendationLabel, ScoreUpdate, ScoringModels, StoreError, SupplierId,
    SupplierProfile, SupplierRecord, SupplierStore,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemorySupplierStore {
    records: Arc<Mutex<BTreeMap<SupplierId, SupplierRecord>>>,
}

impl InMemorySupplierStore {
    pub(crate) fn from_records(records: Vec<SupplierRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.supplier_id.clone(), record))
            .collect();
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<SupplierId, SupplierRecord>>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Unavailable("supplier mutex poisoned".to_string()))
    }

    fn modify<F>(&self, id: &SupplierId, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut SupplierRecord) -> Result<(), StoreError>,
    {
        let mut guard = self.lock()?;
        let record = guard
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        change(record)
    }
}

impl SupplierStore for InMemorySupplierStore {
    fn insert(&self, profile: SupplierProfile) -> Result<SupplierRecord, StoreError> {
        let mut guard = self.lock()?;
        let next = guard
            .keys()
            .filter_map(SupplierId::sequence)
            .max()
            .unwrap_or(0)
            + 1;
        let record = SupplierRecord::registered(SupplierId::from_sequence(next), profile);
        if guard.contains_key(&record.supplier_id) {
            return Err(StoreError::Conflict);
        }
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
        let guard = self.lock()?;
        Ok(guard.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<SupplierRecord>, StoreError> {
        let guard = self.lock()?;
        Ok(guard.values().cloned().collect())
    }

    fn pending_scoring(&self, limit: usize) -> Result<Vec<SupplierRecord>, StoreError> {
        let guard = self.lock()?;
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
        let mut guard = self.lock()?;
        let mut staged: BTreeMap<SupplierId, SupplierRecord> = BTreeMap::new();
        for update in updates {
            let mut record = match staged.remove(&update.supplier_id) {
                Some(record) => record,
                None => guard
                    .get(&update.supplier_id)
                    .cloned()
                    .ok_or_else(|| StoreError::NotFound(update.supplier_id.clone()))?,
            };
            record.apply_scores(update.scores)?;
            staged.insert(record.supplier_id.clone(), record);
        }
        guard.extend(staged);
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

/// Deterministic stand-in for the remote text embedding model: each word lands in a bucket
/// picked by its hash, and the vector is L2-normalized.
#[derive(Debug, Clone)]
pub(crate) struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub(crate) fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl EmbeddingService for HashingEmbedder {
    fn embed(&self, content: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.dimension == 0 {
            return Err(EmbeddingError::Unavailable(
                "embedding dimension is zero".to_string(),
            ));
        }

        let mut embedding = vec![0.0_f32; self.dimension];
        for word in content.split_whitespace() {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0xcbf2_9ce4_8422_2325_u64, |acc, byte| {
                    (acc ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
                });
            let bucket = (hash % self.dimension as u64) as usize;
            embedding[bucket] += 1.0;
        }

        let norm = embedding.iter().map(|value| value * value).sum::<f32>().sqrt();
        if norm > 0.0 {
            embedding.iter_mut().for_each(|value| *value /= norm);
        }
        Ok(embedding)
    }
}

/// Keeps uploaded images in memory and hands back `gs://` locations.
#[derive(Debug, Default)]
pub(crate) struct InMemoryImageStorage {
    bucket: String,
    blobs: Mutex<BTreeMap<String, (String, usize)>>,
}

impl InMemoryImageStorage {
    pub(crate) fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            blobs: Mutex::new(BTreeMap::new()),
        }
    }

    pub(crate) fn blob_count(&self) -> usize {
        self.blobs.lock().map_or(0, |blobs| blobs.len())
    }
}

impl ImageStorage for InMemoryImageStorage {
    fn upload(
        &self,
        blob_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<String, ImageStorageError> {
        if bytes.is_empty() {
            return Err(ImageStorageError::UnsupportedImage(blob_name.to_string()));
        }
        self.blobs
            .lock()
            .map_err(|_| ImageStorageError::Unavailable("image mutex poisoned".to_string()))?
            .insert(blob_name.to_string(), (content_type.to_string(), bytes.len()));
        Ok(format!("gs://{}/{}", self.bucket, blob_name))
    }
}

const DEMO_COUNTRIES: [&str; 8] = [
    "Bangladesh",
    "Brazil",
    "China",
    "Germany",
    "India",
    "Kenya",
    "Mexico",
    "Vietnam",
];
const DEMO_REGIONS: [&str; 6] = [
    "Africa",
    "Asia",
    "Europe",
    "North America",
    "South America",
    "Oceania",
];
const DEMO_PARTNERSHIP: [&str; 4] = ["Active", "Under Review", "Pending", "Inactive"];
const DEMO_RISK: [&str; 3] = ["Low", "Medium", "High"];

/// Built-in linear artifacts for the demo walkthrough.
///
/// Carbon and social drop with risk, waste drops as the partnership weakens, and water rises
/// with the cost premium. The first two embedding components nudge water and social.
pub(crate) fn demo_models(embedding_dimension: usize) -> Result<ScoringModels, ArtifactError> {
    let column = |name: &str, categories: &[&str]| CategoricalColumn {
        name: name.to_string(),
        categories: categories.iter().map(|value| value.to_string()).collect(),
    };
    let encoders = EncodingTables::new(vec![
        column("country", &DEMO_COUNTRIES),
        column("region", &DEMO_REGIONS),
        column("partnership_status", &DEMO_PARTNERSHIP),
        column("risk_level", &DEMO_RISK),
    ])?;

    let width = 7 + embedding_dimension;
    let row = |entries: &[(usize, f64)]| {
        let mut weights = vec![0.0; width];
        for (index, weight) in entries {
            if let Some(slot) = weights.get_mut(*index) {
                *slot = *weight;
            }
        }
        weights
    };

    let subscores = LinearRegressor::new(
        vec![
            row(&[(3, -15.0)]),
            row(&[(5, 2.0), (7, 5.0)]),
            row(&[(2, -8.0)]),
            row(&[(3, -5.0), (8, 10.0)]),
        ],
        vec![95.0, 60.0, 90.0, 75.0],
    )
    .map_err(ArtifactError::Layout)?;
    let overall = LinearRegressor::new(vec![vec![0.3, 0.2, 0.2, 0.3]], vec![0.0])
        .map_err(ArtifactError::Layout)?;

    ScoringModels::from_parts(encoders, Arc::new(subscores), Arc::new(overall))
}
