use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for stored suppliers. Assigned by the store, never by callers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplierId(pub String);

impl SupplierId {
    pub const PREFIX: &'static str = "SUP";

    pub fn from_sequence(sequence: u64) -> Self {
        Self(format!("{}{sequence}", Self::PREFIX))
    }

    /// Numeric suffix of a `SUP<n>` identifier.
    pub fn sequence(&self) -> Option<u64> {
        self.0.strip_prefix(Self::PREFIX)?.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SupplierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operator submission for a new supplier, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSupplier {
    pub supplier_name: String,
    pub country: String,
    pub region: String,
    pub product_category: String,
    #[serde(default)]
    pub sub_category: String,
    pub certifications: Vec<String>,
    pub partnership_status: String,
    pub annual_volume: Option<u64>,
    pub cost_premium: Option<f64>,
    pub risk_level: String,
    pub last_audit: NaiveDate,
    pub audit_summary: String,
    #[serde(default)]
    pub images: Vec<ImageUpload>,
}

/// Raw image attached to a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl NewSupplier {
    /// Check required fields and produce the stored profile plus the images to upload.
    pub fn validate(self) -> Result<(SupplierProfile, Vec<ImageUpload>), ValidationError> {
        require("supplier_name", &self.supplier_name)?;
        require("country", &self.country)?;
        require("region", &self.region)?;
        require("product_category", &self.product_category)?;
        require("sub_category", &self.sub_category)?;
        require("partnership_status", &self.partnership_status)?;
        require("risk_level", &self.risk_level)?;
        require("audit_summary", &self.audit_summary)?;

        let certifications: Vec<&str> = self
            .certifications
            .iter()
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .collect();
        if certifications.is_empty() {
            return Err(ValidationError::MissingField("certifications"));
        }

        let annual_volume = self
            .annual_volume
            .ok_or(ValidationError::MissingField("annual_volume"))?;
        let cost_premium = self
            .cost_premium
            .ok_or(ValidationError::MissingField("cost_premium"))?;
        if !cost_premium.is_finite() {
            return Err(ValidationError::InvalidNumber("cost_premium"));
        }

        for image in &self.images {
            if super::images::content_type_for(&image.file_name).is_none() {
                return Err(ValidationError::UnsupportedImage {
                    file_name: image.file_name.clone(),
                });
            }
        }

        let profile = SupplierProfile {
            supplier_name: self.supplier_name.trim().to_string(),
            country: self.country.trim().to_string(),
            region: self.region.trim().to_string(),
            product_category: self.product_category.trim().to_string(),
            sub_category: self.sub_category.trim().to_string(),
            certification: certifications.join(", "),
            partnership_status: self.partnership_status.trim().to_string(),
            annual_volume,
            cost_premium,
            risk_level: self.risk_level.trim().to_string(),
            last_audit: self.last_audit.format("%Y-%m-%d").to_string(),
            audit_summary: self.audit_summary.trim().to_string(),
        };

        Ok((profile, self.images))
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(())
    }
}

/// Rejected submission.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("required field '{0}' is missing")]
    MissingField(&'static str),
    #[error("field '{0}' must be a finite number")]
    InvalidNumber(&'static str),
    #[error("image '{file_name}' must be a png, jpg, or jpeg file")]
    UnsupportedImage { file_name: String },
}

/// Stored supplier attributes. Everything the scoring pipeline reads lives here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierProfile {
    pub supplier_name: String,
    pub country: String,
    pub region: String,
    pub product_category: String,
    pub sub_category: String,
    pub certification: String,
    pub partnership_status: String,
    pub annual_volume: u64,
    pub cost_premium: f64,
    pub risk_level: String,
    /// `YYYY-MM-DD` as stored; imported rows are not re-validated.
    pub last_audit: String,
    pub audit_summary: String,
}

impl SupplierProfile {
    /// Free-text content handed to the embedding service.
    pub fn embedding_content(&self) -> String {
        format!(
            "Category: {}; Sub-category: {}; Certification: {}; Audit: {}",
            self.product_category, self.sub_category, self.certification, self.audit_summary
        )
    }
}

/// The four component scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub carbon: f64,
    pub water: f64,
    pub waste: f64,
    pub social: f64,
}

impl SubScores {
    pub const COUNT: usize = 4;

    /// Model order: carbon, water, waste, social.
    pub fn to_array(self) -> [f64; Self::COUNT] {
        [self.carbon, self.water, self.waste, self.social]
    }

    pub fn from_array(values: [f64; Self::COUNT]) -> Self {
        let [carbon, water, waste, social] = values;
        Self {
            carbon,
            water,
            waste,
            social,
        }
    }
}

/// Sub-scores and overall score, always persisted together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EcoScores {
    #[serde(flatten)]
    pub sub_scores: SubScores,
    pub overall: f64,
}

/// Persisted "current stage" marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Registered,
    Embedded,
    Scored,
    Recommended,
}

impl PipelineStage {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Registered => "Registered",
            Self::Embedded => "Embedded",
            Self::Scored => "Scored",
            Self::Recommended => "Recommended",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Display vocabulary for recommendations. Scoring only ever produces Preferred, Neutral,
/// and Avoid; Under Review and Caution arrive through other paths (imports, manual edits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecommendationLabel {
    Preferred,
    Neutral,
    #[serde(rename = "Under Review")]
    UnderReview,
    Caution,
    Avoid,
}

impl RecommendationLabel {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Preferred => "Preferred",
            Self::Neutral => "Neutral",
            Self::UnderReview => "Under Review",
            Self::Caution => "Caution",
            Self::Avoid => "Avoid",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "preferred" => Some(Self::Preferred),
            "neutral" => Some(Self::Neutral),
            "under review" => Some(Self::UnderReview),
            "caution" => Some(Self::Caution),
            "avoid" => Some(Self::Avoid),
            _ => None,
        }
    }

    pub const fn needs_review(self) -> bool {
        matches!(self, Self::UnderReview | Self::Caution)
    }
}

/// Where a supplier sits in the scoring pipeline, with the data each stage has produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum PipelineProgress {
    Registered,
    Embedded {
        embedding: Vec<f32>,
    },
    Scored {
        embedding: Vec<f32>,
        scores: EcoScores,
    },
    Recommended {
        embedding: Vec<f32>,
        scores: EcoScores,
        label: RecommendationLabel,
    },
}

impl PipelineProgress {
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::Registered => PipelineStage::Registered,
            Self::Embedded { .. } => PipelineStage::Embedded,
            Self::Scored { .. } => PipelineStage::Scored,
            Self::Recommended { .. } => PipelineStage::Recommended,
        }
    }

    pub fn embedding(&self) -> Option<&[f32]> {
        match self {
            Self::Registered => None,
            Self::Embedded { embedding }
            | Self::Scored { embedding, .. }
            | Self::Recommended { embedding, .. } => Some(embedding),
        }
    }

    pub fn scores(&self) -> Option<&EcoScores> {
        match self {
            Self::Scored { scores, .. } | Self::Recommended { scores, .. } => Some(scores),
            _ => None,
        }
    }

    pub fn label(&self) -> Option<RecommendationLabel> {
        match self {
            Self::Recommended { label, .. } => Some(*label),
            _ => None,
        }
    }
}

/// Stage change the record cannot make from where it currently is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot move from {from} to {to}")]
pub struct InvalidTransition {
    pub from: PipelineStage,
    pub to: PipelineStage,
}

/// Stored supplier: identity, attributes, image links, and pipeline progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierRecord {
    pub supplier_id: SupplierId,
    pub profile: SupplierProfile,
    #[serde(default)]
    pub image_urls: Vec<String>,
    pub progress: PipelineProgress,
}

impl SupplierRecord {
    pub fn registered(supplier_id: SupplierId, profile: SupplierProfile) -> Self {
        Self {
            supplier_id,
            profile,
            image_urls: Vec::new(),
            progress: PipelineProgress::Registered,
        }
    }

    pub fn stage(&self) -> PipelineStage {
        self.progress.stage()
    }

    pub fn scores(&self) -> Option<&EcoScores> {
        self.progress.scores()
    }

    pub fn overall_score(&self) -> Option<f64> {
        self.scores().map(|scores| scores.overall)
    }

    pub fn label(&self) -> Option<RecommendationLabel> {
        self.progress.label()
    }

    /// `Registered -> Embedded`.
    pub fn apply_embedding(&mut self, embedding: Vec<f32>) -> Result<(), InvalidTransition> {
        match self.progress {
            PipelineProgress::Registered => {
                self.progress = PipelineProgress::Embedded { embedding };
                Ok(())
            }
            _ => Err(InvalidTransition {
                from: self.stage(),
                to: PipelineStage::Embedded,
            }),
        }
    }

    /// `Embedded -> Scored`. A scored or recommended record may be re-scored; that drops the
    /// previously derived label.
    pub fn apply_scores(&mut self, scores: EcoScores) -> Result<(), InvalidTransition> {
        let progress = std::mem::replace(&mut self.progress, PipelineProgress::Registered);
        match progress {
            PipelineProgress::Embedded { embedding }
            | PipelineProgress::Scored { embedding, .. }
            | PipelineProgress::Recommended { embedding, .. } => {
                self.progress = PipelineProgress::Scored { embedding, scores };
                Ok(())
            }
            PipelineProgress::Registered => Err(InvalidTransition {
                from: PipelineStage::Registered,
                to: PipelineStage::Scored,
            }),
        }
    }

    /// `Scored -> Recommended`.
    pub fn apply_label(&mut self, label: RecommendationLabel) -> Result<(), InvalidTransition> {
        let progress = std::mem::replace(&mut self.progress, PipelineProgress::Registered);
        match progress {
            PipelineProgress::Scored { embedding, scores } => {
                self.progress = PipelineProgress::Recommended {
                    embedding,
                    scores,
                    label,
                };
                Ok(())
            }
            other => {
                let from = other.stage();
                self.progress = other;
                Err(InvalidTransition {
                    from,
                    to: PipelineStage::Recommended,
                })
            }
        }
    }

    pub fn status_view(&self) -> SupplierStatusView {
        SupplierStatusView {
            supplier_id: self.supplier_id.clone(),
            supplier_name: self.profile.supplier_name.clone(),
            stage: self.stage(),
            stage_label: self.stage().label(),
            scores: self.scores().copied(),
            recommendation: self.label().map(RecommendationLabel::label),
            image_urls: self.image_urls.clone(),
        }
    }
}

/// Public view of a supplier's pipeline state.
#[derive(Debug, Clone, Serialize)]
pub struct SupplierStatusView {
    pub supplier_id: SupplierId,
    pub supplier_name: String,
    pub stage: PipelineStage,
    pub stage_label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<EcoScores>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub image_urls: Vec<String>,
}
