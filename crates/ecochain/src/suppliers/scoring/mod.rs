//! Feature preparation, eco score prediction, and recommendation derivation.
//!
//! [`ScoringModels`] owns the three frozen artifacts (categorical encoder, sub-score model,
//! overall model). It is loaded once and shared behind an `Arc`; nothing mutates it after load.

mod features;
mod models;
mod recommendation;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use features::{
    feature_width, normalize_audit_date, prepare, scalar_width, CategoricalColumn,
    EncoderArtifact, EncodingTables, FeatureMatrix, FeatureVector, CATEGORICAL_COLUMNS,
    DATE_FEATURE_COUNT, NUMERIC_SCALAR_COUNT,
};
pub use models::{LinearRegressor, ModelError, Regressor, RegressorArtifact, RowPredictions};
pub use recommendation::{Recommendation, NEUTRAL_FROM, PREFERRED_ABOVE};

use super::domain::{EcoScores, SubScores, SupplierRecord};

pub const ENCODER_FILE: &str = "encoder.json";
pub const SUBSCORES_FILE: &str = "subscores.json";
pub const ECOSCORE_FILE: &str = "ecoscore.json";

/// Failure while turning a supplier into scores.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("{column} value '{value}' is not in the trained vocabulary")]
    Encoding { column: &'static str, value: String },
    #[error("last_audit '{value}' does not normalize to a numeric date")]
    MalformedDate { value: String },
    #[error("supplier has no embedding")]
    MissingEmbedding,
    #[error("model inference failed: {0}")]
    ModelInference(#[from] ModelError),
}

/// Failure while loading model artifacts. Fatal for the scoring paths.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid model artifact {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("model artifacts are inconsistent: {0}")]
    Layout(String),
}

/// Encoder plus the two chained regressors.
#[derive(Clone)]
pub struct ScoringModels {
    encoders: EncodingTables,
    subscores: Arc<dyn Regressor>,
    overall: Arc<dyn Regressor>,
}

impl std::fmt::Debug for ScoringModels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringModels")
            .field("categorical_columns", &self.encoders.width())
            .field("feature_width", &self.subscores.input_width())
            .finish()
    }
}

impl ScoringModels {
    /// Load `encoder.json`, `subscores.json`, and `ecoscore.json` from `dir`.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self, ArtifactError> {
        let dir = dir.as_ref();
        let encoders: EncodingTables = read_artifact(&dir.join(ENCODER_FILE))?;
        let subscores: RegressorArtifact = read_artifact(&dir.join(SUBSCORES_FILE))?;
        let overall: RegressorArtifact = read_artifact(&dir.join(ECOSCORE_FILE))?;

        let subscores = subscores.into_regressor().map_err(ArtifactError::Layout)?;
        let overall = overall.into_regressor().map_err(ArtifactError::Layout)?;

        let models = Self::from_parts(encoders, Arc::from(subscores), Arc::from(overall))?;
        tracing::info!(
            model_dir = %dir.display(),
            feature_width = models.feature_width(),
            embedding_dimension = models.embedding_dimension(),
            "scoring models loaded"
        );
        Ok(models)
    }

    /// Assemble models and check that their shapes chain together.
    pub fn from_parts(
        encoders: EncodingTables,
        subscores: Arc<dyn Regressor>,
        overall: Arc<dyn Regressor>,
    ) -> Result<Self, ArtifactError> {
        if subscores.input_width() <= scalar_width() {
            return Err(ArtifactError::Layout(format!(
                "sub-score model takes {} features, fewer than the {} scalar features plus an embedding",
                subscores.input_width(),
                scalar_width()
            )));
        }
        if subscores.output_width() != SubScores::COUNT {
            return Err(ArtifactError::Layout(format!(
                "sub-score model produces {} outputs, expected {}",
                subscores.output_width(),
                SubScores::COUNT
            )));
        }
        if overall.input_width() != SubScores::COUNT || overall.output_width() != 1 {
            return Err(ArtifactError::Layout(format!(
                "overall model maps {} inputs to {} outputs, expected {} to 1",
                overall.input_width(),
                overall.output_width(),
                SubScores::COUNT
            )));
        }

        Ok(Self {
            encoders,
            subscores,
            overall,
        })
    }

    pub fn encoders(&self) -> &EncodingTables {
        &self.encoders
    }

    pub fn feature_width(&self) -> usize {
        self.subscores.input_width()
    }

    /// Embedding length the sub-score model was trained on.
    pub fn embedding_dimension(&self) -> usize {
        self.feature_width() - scalar_width()
    }

    pub fn prepare(&self, record: &SupplierRecord) -> Result<FeatureVector, ScoringError> {
        prepare(record, &self.encoders)
    }

    pub fn predict_subscores(&self, features: &FeatureVector) -> Result<SubScores, ScoringError> {
        let matrix = FeatureMatrix::from_rows(features.len(), [features.clone()])?;
        self.predict_subscores_batch(&matrix)?
            .pop()
            .unwrap_or_else(|| {
                Err(ModelError::Backend("sub-score model returned no rows".into()).into())
            })
    }

    pub fn predict_overall(&self, subscores: &SubScores) -> Result<f64, ScoringError> {
        self.predict_overall_batch(std::slice::from_ref(subscores))?
            .pop()
            .unwrap_or_else(|| {
                Err(ModelError::Backend("overall model returned no rows".into()).into())
            })
    }

    /// One vectorized sub-score call over every row of `features`.
    ///
    /// The outer error fails the whole batch; each row carries its own result.
    pub fn predict_subscores_batch(
        &self,
        features: &FeatureMatrix,
    ) -> Result<Vec<Result<SubScores, ScoringError>>, ScoringError> {
        let rows = self.subscores.predict(features)?;
        check_row_count(rows.len(), features.rows())?;
        Ok(rows
            .into_iter()
            .map(|row| -> Result<SubScores, ScoringError> {
                let row = row?;
                let values: [f64; SubScores::COUNT] =
                    row.try_into().map_err(|row: Vec<f64>| ModelError::ShapeMismatch {
                        expected: SubScores::COUNT,
                        got: row.len(),
                    })?;
                Ok(SubScores::from_array(values))
            })
            .collect())
    }

    /// One vectorized overall-score call over a batch of sub-scores.
    pub fn predict_overall_batch(
        &self,
        subscores: &[SubScores],
    ) -> Result<Vec<Result<f64, ScoringError>>, ScoringError> {
        let matrix = FeatureMatrix::from_rows(
            SubScores::COUNT,
            subscores
                .iter()
                .map(|scores| FeatureVector::from(scores.to_array().to_vec())),
        )?;
        let rows = self.overall.predict(&matrix)?;
        check_row_count(rows.len(), subscores.len())?;
        Ok(rows
            .into_iter()
            .map(|row| -> Result<f64, ScoringError> {
                match row?.as_slice() {
                    [overall] => Ok(*overall),
                    other => Err(ModelError::ShapeMismatch {
                        expected: 1,
                        got: other.len(),
                    }
                    .into()),
                }
            })
            .collect())
    }

    /// Sub-scores then overall score for a whole batch. Output rows line up with input rows;
    /// a row that fails either model fails alone.
    pub fn score_batch(
        &self,
        features: &FeatureMatrix,
    ) -> Result<Vec<Result<EcoScores, ScoringError>>, ScoringError> {
        let subscores = self.predict_subscores_batch(features)?;
        let ready: Vec<SubScores> = subscores
            .iter()
            .filter_map(|row| row.as_ref().ok().copied())
            .collect();
        let mut overall_rows = self.predict_overall_batch(&ready)?.into_iter();

        Ok(subscores
            .into_iter()
            .map(|row| -> Result<EcoScores, ScoringError> {
                let sub_scores = row?;
                let overall = overall_rows.next().unwrap_or_else(|| {
                    Err(ModelError::Backend("overall model dropped a row".into()).into())
                })?;
                Ok(EcoScores {
                    sub_scores,
                    overall,
                })
            })
            .collect())
    }
}

fn check_row_count(got: usize, expected: usize) -> Result<(), ModelError> {
    if got == expected {
        Ok(())
    } else {
        Err(ModelError::Backend(format!(
            "model returned {got} rows for {expected} inputs"
        )))
    }
}

fn read_artifact<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let raw = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
