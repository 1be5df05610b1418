use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::super::domain::SupplierRecord;
use super::models::ModelError;
use super::{ArtifactError, ScoringError};

/// Categorical columns in the order the encoder and models were trained on.
pub const CATEGORICAL_COLUMNS: [&str; 4] = ["country", "region", "partnership_status", "risk_level"];

/// `annual_volume`, `cost_premium`.
pub const NUMERIC_SCALAR_COUNT: usize = 2;

/// Encoded `last_audit`.
pub const DATE_FEATURE_COUNT: usize = 1;

/// Trained vocabulary of one categorical column. A value's code is its index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub name: String,
    pub categories: Vec<String>,
}

/// On-disk shape of `encoder.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderArtifact {
    pub columns: Vec<CategoricalColumn>,
}

/// Ordinal encoders for the categorical columns, loaded once and shared read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "EncoderArtifact", into = "EncoderArtifact")]
pub struct EncodingTables {
    columns: Vec<CategoricalColumn>,
    codes: Vec<HashMap<String, usize>>,
}

impl EncodingTables {
    pub fn new(columns: Vec<CategoricalColumn>) -> Result<Self, ArtifactError> {
        let names: Vec<&str> = columns.iter().map(|column| column.name.as_str()).collect();
        if names != CATEGORICAL_COLUMNS {
            return Err(ArtifactError::Layout(format!(
                "encoder columns {names:?} do not match {CATEGORICAL_COLUMNS:?}"
            )));
        }

        let mut codes = Vec::with_capacity(columns.len());
        for column in &columns {
            let mut lookup = HashMap::with_capacity(column.categories.len());
            for (code, category) in column.categories.iter().enumerate() {
                if lookup.insert(category.clone(), code).is_some() {
                    return Err(ArtifactError::Layout(format!(
                        "duplicate category '{category}' in column {}",
                        column.name
                    )));
                }
            }
            codes.push(lookup);
        }

        Ok(Self { columns, codes })
    }

    pub fn columns(&self) -> &[CategoricalColumn] {
        &self.columns
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Ordinal code of `value` in `column`. Unseen values are an error, never a default.
    pub fn encode(&self, column: usize, value: &str) -> Result<f64, ScoringError> {
        self.codes
            .get(column)
            .and_then(|lookup| lookup.get(value))
            .map(|code| *code as f64)
            .ok_or_else(|| ScoringError::Encoding {
                column: CATEGORICAL_COLUMNS.get(column).copied().unwrap_or("unknown"),
                value: value.to_string(),
            })
    }
}

impl TryFrom<EncoderArtifact> for EncodingTables {
    type Error = ArtifactError;

    fn try_from(artifact: EncoderArtifact) -> Result<Self, Self::Error> {
        Self::new(artifact.columns)
    }
}

impl From<EncodingTables> for EncoderArtifact {
    fn from(tables: EncodingTables) -> Self {
        Self {
            columns: tables.columns,
        }
    }
}

/// Model input for one supplier, in the frozen training order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// Features before the embedding block.
pub const fn scalar_width() -> usize {
    CATEGORICAL_COLUMNS.len() + NUMERIC_SCALAR_COUNT + DATE_FEATURE_COUNT
}

/// Total model input width for a given embedding dimension.
pub const fn feature_width(embedding_dimension: usize) -> usize {
    scalar_width() + embedding_dimension
}

/// `[country, region, partnership_status, risk_level, annual_volume, cost_premium,
/// last_audit, embedding...]`.
pub fn prepare(
    record: &SupplierRecord,
    encoders: &EncodingTables,
) -> Result<FeatureVector, ScoringError> {
    let profile = &record.profile;
    let embedding = record
        .progress
        .embedding()
        .ok_or(ScoringError::MissingEmbedding)?;

    let categorical = [
        profile.country.as_str(),
        profile.region.as_str(),
        profile.partnership_status.as_str(),
        profile.risk_level.as_str(),
    ];

    let mut features = Vec::with_capacity(feature_width(embedding.len()));
    for (column, value) in categorical.into_iter().enumerate() {
        features.push(encoders.encode(column, value)?);
    }
    features.push(profile.annual_volume as f64);
    features.push(profile.cost_premium);
    features.push(normalize_audit_date(&profile.last_audit)? as f64);
    features.extend(embedding.iter().map(|component| f64::from(*component)));

    Ok(FeatureVector(features))
}

/// `"2024-03-15"` becomes `20240315`.
pub fn normalize_audit_date(raw: &str) -> Result<i64, ScoringError> {
    let digits: String = raw.trim().chars().filter(|ch| *ch != '-').collect();
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(ScoringError::MalformedDate {
            value: raw.to_string(),
        });
    }
    digits.parse().map_err(|_| ScoringError::MalformedDate {
        value: raw.to_string(),
    })
}

/// Row-major batch of equal-width feature vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    width: usize,
    values: Vec<f64>,
}

impl FeatureMatrix {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            values: Vec::new(),
        }
    }

    pub fn from_rows<I>(width: usize, rows: I) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = FeatureVector>,
    {
        let mut matrix = Self::new(width);
        for row in rows {
            matrix.push(row)?;
        }
        Ok(matrix)
    }

    pub fn push(&mut self, row: FeatureVector) -> Result<(), ModelError> {
        if row.len() != self.width {
            return Err(ModelError::ShapeMismatch {
                expected: self.width,
                got: row.len(),
            });
        }
        self.values.extend(row.into_inner());
        Ok(())
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn rows(&self) -> usize {
        if self.width == 0 {
            0
        } else {
            self.values.len() / self.width
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        let start = index.checked_mul(self.width)?;
        self.values.get(start..start + self.width)
    }
}
