use chrono::{DateTime, Utc};
use log::{error, info};
use shared::{ModelState, ModelStatusResponse, Prediction};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;

use super::backend::{Classifier, LoadError, ModelLoader};
use super::labels::Labels;
use super::ranking::top_k;
use super::source::ModelSource;
use crate::imaging::DecodedImage;

pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("Model unavailable: {0}")]
    Unavailable(String),
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub source: ModelSource,
    pub labels_path: PathBuf,
    pub cache_dir: PathBuf,
    pub top_k: usize,
    /// Upper bound on resolving the weights, download included.
    pub download_timeout: Duration,
}

/// A loaded classifier and its label table. Clones share the same model.
#[derive(Clone)]
pub struct ModelHandle {
    classifier: Arc<dyn Classifier>,
    labels: Arc<Labels>,
    loaded_at: DateTime<Utc>,
}

impl ModelHandle {
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn same_model(&self, other: &ModelHandle) -> bool {
        Arc::ptr_eq(&self.classifier, &other.classifier)
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("classes", &self.labels.len())
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelStatus {
    NotLoaded,
    Loading,
    Ready { loaded_at: DateTime<Utc> },
    Unavailable(String),
}

impl ModelStatus {
    pub fn to_response(&self) -> ModelStatusResponse {
        let (state, loaded_at, error) = match self {
            ModelStatus::NotLoaded => (ModelState::NotLoaded, None, None),
            ModelStatus::Loading => (ModelState::Loading, None, None),
            ModelStatus::Ready { loaded_at } => {
                (ModelState::Ready, Some(loaded_at.to_rfc3339()), None)
            }
            ModelStatus::Unavailable(reason) => {
                (ModelState::Unavailable, None, Some(reason.clone()))
            }
        };
        ModelStatusResponse {
            state,
            loaded_at,
            error,
        }
    }
}

/// Process-wide owner of the classification model.
///
/// The model is loaded on first use. Concurrent first callers share one
/// load, and the outcome (handle or failure reason) is kept for the life of
/// the process.
pub struct ModelProvider {
    settings: ModelSettings,
    loader: Arc<dyn ModelLoader>,
    http: reqwest::Client,
    handle: OnceCell<Result<ModelHandle, String>>,
    loading: AtomicBool,
}

impl ModelProvider {
    pub fn new(settings: ModelSettings, loader: Arc<dyn ModelLoader>, http: reqwest::Client) -> Self {
        Self {
            settings,
            loader,
            http,
            handle: OnceCell::new(),
            loading: AtomicBool::new(false),
        }
    }

    pub async fn ensure_loaded(&self) -> Result<ModelHandle, ModelError> {
        self.handle
            .get_or_init(|| self.load())
            .await
            .clone()
            .map_err(ModelError::Unavailable)
    }

    /// Runs the forward pass off the async threads and keeps the top-K classes.
    pub async fn classify(
        &self,
        handle: &ModelHandle,
        image: DecodedImage,
    ) -> Result<Vec<Prediction>, ModelError> {
        let classifier = Arc::clone(&handle.classifier);
        let scores = tokio::task::spawn_blocking(move || classifier.scores(&image))
            .await
            .map_err(|e| ModelError::InferenceFailed(format!("inference task failed: {}", e)))?
            .map_err(|e| ModelError::InferenceFailed(e.to_string()))?;

        top_k(&scores, &handle.labels, self.settings.top_k)
            .map_err(|e| ModelError::InferenceFailed(e.to_string()))
    }

    pub fn status(&self) -> ModelStatus {
        match self.handle.get() {
            Some(Ok(handle)) => ModelStatus::Ready {
                loaded_at: handle.loaded_at,
            },
            Some(Err(reason)) => ModelStatus::Unavailable(reason.clone()),
            None if self.loading.load(Ordering::SeqCst) => ModelStatus::Loading,
            None => ModelStatus::NotLoaded,
        }
    }

    async fn load(&self) -> Result<ModelHandle, String> {
        let _flag = LoadingFlag::raise(&self.loading);
        info!("Loading classification model from {:?}", self.settings.source);

        match self.try_load().await {
            Ok(handle) => {
                info!("Model ready with {} classes", handle.labels.len());
                Ok(handle)
            }
            Err(e) => {
                error!("Failed to load model: {}", e);
                Err(e.to_string())
            }
        }
    }

    async fn try_load(&self) -> Result<ModelHandle, LoadError> {
        let limit = self.settings.download_timeout;
        let weights = tokio::time::timeout(
            limit,
            self.settings
                .source
                .materialize(&self.http, &self.settings.cache_dir),
        )
        .await
        .map_err(|_| LoadError::Timeout(limit))??;
        let labels = Labels::load(&self.settings.labels_path).await?;

        let loader = Arc::clone(&self.loader);
        let classifier = tokio::task::spawn_blocking(move || loader.load(&weights))
            .await
            .map_err(|e| LoadError::Backend(format!("loader task failed: {}", e)))??;

        if let Some(classes) = classifier.num_classes() {
            if classes != labels.len() {
                return Err(LoadError::LabelMismatch {
                    labels: labels.len(),
                    classes,
                });
            }
        }

        Ok(ModelHandle {
            classifier: Arc::from(classifier),
            labels: Arc::new(labels),
            loaded_at: Utc::now(),
        })
    }
}

struct LoadingFlag<'a>(&'a AtomicBool);

impl<'a> LoadingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for LoadingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
