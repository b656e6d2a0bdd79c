use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::imaging::DecodedImage;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Model file not found: {}", .0.display())]
    MissingArtifact(PathBuf),
    #[error("Failed to download model: {0}")]
    Download(#[from] reqwest::Error),
    #[error("Fetching the model timed out after {0:?}")]
    Timeout(Duration),
    #[error("Model checksum mismatch: expected {expected}, got {actual}")]
    Checksum { expected: String, actual: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid label file: {0}")]
    Labels(String),
    #[error("Label table has {labels} entries but the model outputs {classes} classes")]
    LabelMismatch { labels: usize, classes: usize },
    #[error("Classifier backend error: {0}")]
    Backend(String),
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Preprocessing error: {0}")]
    Preprocessing(String),
    #[error("Model error: {0}")]
    Model(String),
    #[error("Model produced {scores} scores for {labels} labels")]
    OutputSize { scores: usize, labels: usize },
    #[error("Model produced a non-finite score for class {0}")]
    NonFinite(usize),
}

/// A loaded model that maps one decoded image to per-class scores.
///
/// Implementations run on a blocking thread and must be safe to call from
/// several requests at once.
pub trait Classifier: Send + Sync {
    /// Number of output classes, when the backend can tell without running.
    fn num_classes(&self) -> Option<usize>;

    fn scores(&self, image: &DecodedImage) -> Result<Vec<f32>, InferenceError>;
}

/// Builds a [`Classifier`] from weights already on local disk. Blocking.
pub trait ModelLoader: Send + Sync {
    fn load(&self, weights: &Path) -> Result<Box<dyn Classifier>, LoadError>;
}

/// Stand-in backend for builds without a compiled-in inference engine.
pub struct UnsupportedBackend;

impl ModelLoader for UnsupportedBackend {
    fn load(&self, _weights: &Path) -> Result<Box<dyn Classifier>, LoadError> {
        Err(LoadError::Backend(
            "this build has no inference backend; rebuild with `--features torch`".to_string(),
        ))
    }
}

#[cfg(feature = "torch")]
pub fn default_loader() -> Arc<dyn ModelLoader> {
    Arc::new(super::torch::TorchScriptLoader::new(tch::Device::cuda_if_available()))
}

#[cfg(not(feature = "torch"))]
pub fn default_loader() -> Arc<dyn ModelLoader> {
    log::warn!("Built without the `torch` feature, classification will be unavailable");
    Arc::new(UnsupportedBackend)
}
