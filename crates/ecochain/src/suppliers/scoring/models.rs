use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::features::FeatureMatrix;

/// Frozen, externally trained regression model. Implementations are pure functions of their
/// input and safe to share across threads.
pub trait Regressor: Send + Sync {
    fn input_width(&self) -> usize;
    fn output_width(&self) -> usize;

    /// Predict every row of `inputs` in one call. Output rows line up with input rows.
    ///
    /// The outer error rejects the whole batch (wrong width); a bad row only fails its own slot.
    fn predict(&self, inputs: &FeatureMatrix) -> Result<RowPredictions, ModelError>;
}

/// Per-row model output.
pub type RowPredictions = Vec<Result<Vec<f64>, ModelError>>;

/// Failure raised by a model during inference.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("feature width mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: usize, got: usize },
    #[error("model produced a non-finite value for row {row}")]
    NonFinite { row: usize },
    #[error("{0}")]
    Backend(String),
}

/// Multi-output linear model exported as `y = W x + b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegressor {
    /// One coefficient row per output.
    pub coefficients: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
}

impl LinearRegressor {
    pub fn new(coefficients: Vec<Vec<f64>>, intercepts: Vec<f64>) -> Result<Self, String> {
        let model = Self {
            coefficients,
            intercepts,
        };
        model.check_shape()?;
        Ok(model)
    }

    pub(crate) fn check_shape(&self) -> Result<(), String> {
        if self.coefficients.is_empty() {
            return Err("linear model has no outputs".to_string());
        }
        if self.coefficients.len() != self.intercepts.len() {
            return Err(format!(
                "{} coefficient rows but {} intercepts",
                self.coefficients.len(),
                self.intercepts.len()
            ));
        }
        let width = self.coefficients[0].len();
        if width == 0 {
            return Err("linear model has zero input width".to_string());
        }
        if self.coefficients.iter().any(|row| row.len() != width) {
            return Err("coefficient rows differ in width".to_string());
        }
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> Vec<f64> {
        self.coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(weights, intercept)| {
                weights
                    .iter()
                    .zip(row)
                    .fold(*intercept, |acc, (weight, value)| acc + weight * value)
            })
            .collect()
    }
}

impl Regressor for LinearRegressor {
    fn input_width(&self) -> usize {
        self.coefficients.first().map_or(0, Vec::len)
    }

    fn output_width(&self) -> usize {
        self.coefficients.len()
    }

    fn predict(&self, inputs: &FeatureMatrix) -> Result<RowPredictions, ModelError> {
        let expected = self.input_width();
        if inputs.width() != expected || expected == 0 {
            return Err(ModelError::ShapeMismatch {
                expected,
                got: inputs.width(),
            });
        }

        Ok((0..inputs.rows())
            .into_par_iter()
            .map(|row| -> Result<Vec<f64>, ModelError> {
                let values = inputs.row(row).ok_or(ModelError::ShapeMismatch {
                    expected,
                    got: 0,
                })?;
                let outputs = self.predict_row(values);
                if outputs.iter().all(|value| value.is_finite()) {
                    Ok(outputs)
                } else {
                    Err(ModelError::NonFinite { row })
                }
            })
            .collect())
    }
}

/// Serialized regressor, tagged by model family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegressorArtifact {
    Linear(LinearRegressor),
}

impl RegressorArtifact {
    pub(crate) fn into_regressor(self) -> Result<Box<dyn Regressor>, String> {
        match self {
            Self::Linear(model) => {
                model.check_shape()?;
                Ok(Box::new(model))
            }
        }
    }
}
