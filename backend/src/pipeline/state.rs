use shared::{EnrichmentResult, FailureKind, PipelineSnapshot, Prediction};

use crate::imaging::DecodeError;
use crate::model::ModelError;

/// Failures that end a prediction request. Enrichment problems never show up
/// here; they only leave fields of a ready result empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("The selected file could not be read as an image: {0}")]
    UnsupportedOrCorruptImage(String),
    #[error("The classification model is unavailable: {0}")]
    ModelUnavailable(String),
    #[error("Classification failed: {0}")]
    InferenceFailed(String),
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::UnsupportedOrCorruptImage(_) => FailureKind::UnsupportedOrCorruptImage,
            PipelineError::ModelUnavailable(_) => FailureKind::ModelUnavailable,
            PipelineError::InferenceFailed(_) => FailureKind::InferenceFailed,
        }
    }
}

impl From<DecodeError> for PipelineError {
    fn from(err: DecodeError) -> Self {
        PipelineError::UnsupportedOrCorruptImage(err.to_string())
    }
}

impl From<ModelError> for PipelineError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Unavailable(reason) => PipelineError::ModelUnavailable(reason),
            ModelError::InferenceFailed(reason) => PipelineError::InferenceFailed(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    Loading,
    Ready {
        predictions: Vec<Prediction>,
        enrichments: Vec<EnrichmentResult>,
    },
    Failed(PipelineError),
}

impl PipelineState {
    pub fn is_loading(&self) -> bool {
        matches!(self, PipelineState::Loading)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Ready { .. } | PipelineState::Failed(_))
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        match self {
            PipelineState::Idle => PipelineSnapshot::Idle,
            PipelineState::Loading => PipelineSnapshot::Loading,
            PipelineState::Ready {
                predictions,
                enrichments,
            } => PipelineSnapshot::Ready {
                predictions: predictions.clone(),
                enrichments: enrichments.clone(),
            },
            PipelineState::Failed(err) => PipelineSnapshot::Failed {
                kind: err.kind(),
                message: err.to_string(),
            },
        }
    }
}
