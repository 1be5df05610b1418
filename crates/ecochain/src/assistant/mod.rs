//! Natural-language questions about the supplier table.
//!
//! A classifier picks between free-form generation and a vector-search backed answer. The
//! backend itself (warehouse-hosted models) sits behind [`AssistantBackend`].

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

const VECTOR_SEARCH_KEYWORD: &str = "VECTOR_SEARCH";

/// Answer path chosen for a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryRoute {
    Generate,
    VectorSearch,
}

impl QueryRoute {
    /// Only an explicit `VECTOR_SEARCH` verdict selects vector search; anything else, including
    /// a missing verdict, generates.
    pub fn from_classification(verdict: Option<&str>) -> Self {
        match verdict {
            Some(raw) if raw.trim().eq_ignore_ascii_case(VECTOR_SEARCH_KEYWORD) => {
                Self::VectorSearch
            }
            _ => Self::Generate,
        }
    }
}

/// Remote models answering supplier questions.
pub trait AssistantBackend: Send + Sync {
    fn classify(&self, prompt: &str) -> Result<String, AssistantError>;
    fn generate(&self, prompt: &str) -> Result<String, AssistantError>;
    fn vector_search(&self, prompt: &str) -> Result<String, AssistantError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssistantError {
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("assistant backend failed: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssistantReply {
    pub route: QueryRoute,
    pub text: String,
}

pub struct SupplierAssistant<B> {
    backend: Arc<B>,
}

impl<B> SupplierAssistant<B>
where
    B: AssistantBackend + 'static,
{
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub fn route(&self, prompt: &str) -> QueryRoute {
        let verdict = match self.backend.classify(prompt) {
            Ok(verdict) => Some(verdict),
            Err(error) => {
                warn!(error = %error, "prompt classification failed, falling back to generation");
                None
            }
        };
        QueryRoute::from_classification(verdict.as_deref())
    }

    pub fn answer(&self, prompt: &str) -> Result<AssistantReply, AssistantError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(AssistantError::EmptyPrompt);
        }

        let route = self.route(prompt);
        info!(route = ?route, "answering supplier question");
        let raw = match route {
            QueryRoute::Generate => self.backend.generate(prompt)?,
            QueryRoute::VectorSearch => self.backend.vector_search(prompt)?,
        };

        Ok(AssistantReply {
            route,
            text: clean_response(&raw),
        })
    }
}

/// Drop markdown emphasis and heading markers, then trim.
pub fn clean_response(raw: &str) -> String {
    raw.chars()
        .filter(|ch| !matches!(ch, '*' | '#'))
        .collect::<String>()
        .trim()
        .to_string()
}
