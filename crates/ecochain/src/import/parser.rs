use std::io::Read;

use serde::{Deserialize, Deserializer};

use crate::suppliers::images::public_url;
use crate::suppliers::{
    EcoScores, PipelineProgress, RecommendationLabel, SubScores, SupplierId, SupplierProfile,
    SupplierRecord,
};

/// Row that could not be turned into a supplier record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RowRejection {
    pub(crate) line: u64,
    pub(crate) reason: String,
}

pub(crate) enum ParseFailure {
    Csv(csv::Error),
    Row(RowRejection),
}

impl From<csv::Error> for ParseFailure {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

pub(crate) fn parse_records<R: Read>(reader: R) -> Result<Vec<SupplierRecord>, ParseFailure> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut records = Vec::new();

    for raw in csv_reader.records() {
        let raw = raw?;
        let line = raw.position().map_or(0, |position| position.line());
        let row: SupplierRow = raw.deserialize(Some(&headers))?;
        let record = row
            .into_record()
            .map_err(|reason| ParseFailure::Row(RowRejection { line, reason }))?;
        records.push(record);
    }

    Ok(records)
}

#[derive(Debug, Deserialize)]
struct SupplierRow {
    supplier_id: String,
    supplier_name: String,
    country: String,
    region: String,
    product_category: String,
    #[serde(default)]
    sub_category: String,
    #[serde(default)]
    certification: String,
    partnership_status: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    annual_volume: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    cost_premium: Option<String>,
    risk_level: String,
    last_audit: String,
    #[serde(default)]
    audit_summary: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    image_url: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    text_embedding: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    carbon_score: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    water_score: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    waste_score: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    social_score: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    total_eco_score: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    recommendation: Option<String>,
}

impl SupplierRow {
    fn into_record(self) -> Result<SupplierRecord, String> {
        if self.supplier_id.is_empty() {
            return Err("supplier_id is empty".to_string());
        }

        let progress = self.progress()?;
        let image_urls = self
            .image_url
            .as_deref()
            .map(split_image_urls)
            .unwrap_or_default();

        let annual_volume = match self.annual_volume.as_deref() {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| format!("annual_volume '{raw}' is not a whole number"))?,
            None => return Err("annual_volume is missing".to_string()),
        };
        let cost_premium = match self.cost_premium.as_deref() {
            Some(raw) => parse_number("cost_premium", raw)?,
            None => return Err("cost_premium is missing".to_string()),
        };

        Ok(SupplierRecord {
            supplier_id: SupplierId(self.supplier_id),
            profile: SupplierProfile {
                supplier_name: self.supplier_name,
                country: self.country,
                region: self.region,
                product_category: self.product_category,
                sub_category: self.sub_category,
                certification: self.certification,
                partnership_status: self.partnership_status,
                annual_volume,
                cost_premium,
                risk_level: self.risk_level,
                last_audit: self.last_audit,
                audit_summary: self.audit_summary,
            },
            image_urls,
            progress,
        })
    }

    fn progress(&self) -> Result<PipelineProgress, String> {
        let embedding = self
            .text_embedding
            .as_deref()
            .map(parse_embedding)
            .transpose()?;
        let scores = self.scores()?;
        let label = self
            .recommendation
            .as_deref()
            .map(|raw| {
                RecommendationLabel::parse(raw).ok_or_else(|| format!("unknown recommendation '{raw}'"))
            })
            .transpose()?;

        match (embedding, scores, label) {
            (None, None, None) => Ok(PipelineProgress::Registered),
            (Some(embedding), None, None) => Ok(PipelineProgress::Embedded { embedding }),
            (Some(embedding), Some(scores), None) => Ok(PipelineProgress::Scored { embedding, scores }),
            (Some(embedding), Some(scores), Some(label)) => Ok(PipelineProgress::Recommended {
                embedding,
                scores,
                label,
            }),
            (None, Some(_), _) => Err("scores present without text_embedding".to_string()),
            (_, None, Some(_)) => Err("recommendation present without scores".to_string()),
        }
    }

    fn scores(&self) -> Result<Option<EcoScores>, String> {
        let columns = [
            ("carbon_score", self.carbon_score.as_deref()),
            ("water_score", self.water_score.as_deref()),
            ("waste_score", self.waste_score.as_deref()),
            ("social_score", self.social_score.as_deref()),
            ("total_eco_score", self.total_eco_score.as_deref()),
        ];
        let present = columns.iter().filter(|(_, value)| value.is_some()).count();
        if present == 0 {
            return Ok(None);
        }
        if present < columns.len() {
            let missing: Vec<&str> = columns
                .iter()
                .filter(|(_, value)| value.is_none())
                .map(|(name, _)| *name)
                .collect();
            return Err(format!("partial score group, missing {}", missing.join(", ")));
        }

        let mut values = [0.0; 5];
        for (slot, (name, raw)) in values.iter_mut().zip(columns) {
            *slot = parse_number(name, raw.unwrap_or_default())?;
        }
        let [carbon, water, waste, social, overall] = values;
        Ok(Some(EcoScores {
            sub_scores: SubScores {
                carbon,
                water,
                waste,
                social,
            },
            overall,
        }))
    }
}

fn parse_number(column: &str, raw: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| format!("{column} '{raw}' is not a number"))
}

fn parse_embedding(raw: &str) -> Result<Vec<f32>, String> {
    let trimmed = raw.trim_matches(|ch| ch == '[' || ch == ']');
    trimmed
        .split(|ch: char| ch.is_whitespace() || ch == ',')
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<f32>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| format!("text_embedding component '{part}' is not a number"))
        })
        .collect::<Result<Vec<_>, _>>()
        .and_then(|embedding| {
            if embedding.is_empty() {
                Err("text_embedding is empty".to_string())
            } else {
                Ok(embedding)
            }
        })
}

fn split_image_urls(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(|url| public_url(url).unwrap_or_else(|| url.to_string()))
        .collect()
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
