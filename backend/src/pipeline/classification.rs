use log::{debug, error, info, warn};
use shared::{EnrichmentResult, Prediction};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::state::{PipelineError, PipelineState};
use crate::enrichment::EnrichmentClient;
use crate::imaging::{ImageDecoder, UploadRejected, UploadedImage};
use crate::model::ModelProvider;

/// The shared services every pipeline is built from.
#[derive(Clone)]
pub struct PipelineComponents {
    pub decoder: ImageDecoder,
    pub model: Arc<ModelProvider>,
    pub enricher: EnrichmentClient,
    pub max_upload_bytes: usize,
}

#[derive(Debug)]
pub enum PredictOutcome {
    Started(PredictionTicket),
    NoImageSelected,
    AlreadyLoading,
}

/// Resolves to the terminal state of one started prediction.
#[derive(Debug)]
pub struct PredictionTicket(JoinHandle<PipelineState>);

impl PredictionTicket {
    pub async fn wait(self) -> PipelineState {
        self.0.await.unwrap_or_else(|e| {
            PipelineState::Failed(PipelineError::InferenceFailed(format!(
                "prediction task failed: {}",
                e
            )))
        })
    }
}

/// One session's decode → classify → enrich state machine.
///
/// State moves `Idle → Loading → Ready | Failed`. Only one prediction runs at
/// a time; a predict intent that arrives while `Loading` is ignored.
/// Observers follow the state through [`ClassificationPipeline::subscribe`].
pub struct ClassificationPipeline {
    components: PipelineComponents,
    selected: Mutex<Option<UploadedImage>>,
    state: watch::Sender<PipelineState>,
}

impl ClassificationPipeline {
    pub fn new(components: PipelineComponents) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        Self {
            components,
            selected: Mutex::new(None),
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> PipelineState {
        self.state.borrow().clone()
    }

    pub fn has_selection(&self) -> bool {
        self.selection().is_some()
    }

    /// Replaces the selected image. Invalid uploads are rejected without
    /// touching the state. A finished result is cleared back to `Idle`; an
    /// in-flight prediction is left to finish.
    pub fn select_image(
        &self,
        bytes: impl Into<Arc<[u8]>>,
        mime_type: &str,
    ) -> Result<(), UploadRejected> {
        let upload = UploadedImage::new(bytes, mime_type, self.components.max_upload_bytes)
            .inspect_err(|e| warn!("Rejected upload: {}", e))?;

        info!("Image selected ({}, {} bytes)", upload.mime_type(), upload.len());
        *self.selection() = Some(upload);

        self.state.send_if_modified(|state| {
            if state.is_terminal() {
                *state = PipelineState::Idle;
                true
            } else {
                false
            }
        });
        Ok(())
    }

    /// Starts a prediction for the selected image.
    ///
    /// The work runs on its own task, so the session always leaves `Loading`
    /// even if the caller stops waiting.
    pub fn request_prediction(self: &Arc<Self>) -> PredictOutcome {
        let Some(upload) = self.selection().clone() else {
            debug!("Predict requested without a selected image");
            return PredictOutcome::NoImageSelected;
        };

        let entered = self.state.send_if_modified(|state| {
            if state.is_loading() {
                false
            } else {
                *state = PipelineState::Loading;
                true
            }
        });
        if !entered {
            debug!("Predict requested while a prediction is in flight, ignoring");
            return PredictOutcome::AlreadyLoading;
        }

        let pipeline = Arc::clone(self);
        let components = self.components.clone();
        let handle = tokio::spawn(async move {
            let terminal = match tokio::spawn(run_prediction(components, upload)).await {
                Ok(Ok((predictions, enrichments))) => PipelineState::Ready {
                    predictions,
                    enrichments,
                },
                Ok(Err(e)) => {
                    warn!("Prediction failed: {}", e);
                    PipelineState::Failed(e)
                }
                Err(e) => {
                    error!("Prediction task aborted: {}", e);
                    PipelineState::Failed(PipelineError::InferenceFailed(format!(
                        "prediction task failed: {}",
                        e
                    )))
                }
            };
            pipeline.state.send_replace(terminal.clone());
            terminal
        });

        PredictOutcome::Started(PredictionTicket(handle))
    }

    fn selection(&self) -> MutexGuard<'_, Option<UploadedImage>> {
        self.selected.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run_prediction(
    components: PipelineComponents,
    upload: UploadedImage,
) -> Result<(Vec<Prediction>, Vec<EnrichmentResult>), PipelineError> {
    let decoder = components.decoder.clone();
    let image = tokio::task::spawn_blocking(move || decoder.decode(&upload))
        .await
        .map_err(|e| {
            PipelineError::UnsupportedOrCorruptImage(format!("decoder task failed: {}", e))
        })??;
    debug!("Decoded {}x{} image", image.width, image.height);

    let handle = components.model.ensure_loaded().await?;
    let predictions = components.model.classify(&handle, image).await?;
    info!(
        "Predictions: {}",
        predictions
            .iter()
            .map(|p| format!("{} ({:.1}%)", p.label, p.confidence * 100.0))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let enrichments = components.enricher.enrich_all(&predictions).await;
    Ok((predictions, enrichments))
}
