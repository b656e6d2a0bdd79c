use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EnrichmentResult {
    pub term: String,
    pub image_url: Option<String>,
    pub explanation: Option<String>,
}

impl EnrichmentResult {
    pub fn empty(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            image_url: None,
            explanation: None,
        }
    }
}

#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    UnsupportedOrCorruptImage,
    ModelUnavailable,
    InferenceFailed,
}

/// What the presentation layer sees of a session's pipeline.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineSnapshot {
    Idle,
    Loading,
    Ready {
        predictions: Vec<Prediction>,
        enrichments: Vec<EnrichmentResult>,
    },
    Failed {
        kind: FailureKind,
        message: String,
    },
}

#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelState {
    NotLoaded,
    Loading,
    Ready,
    Unavailable,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ModelStatusResponse {
    pub state: ModelState,
    pub loaded_at: Option<String>,
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SessionCreated {
    pub session_id: Uuid,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ErrorResponse {
    pub error: String,
}
