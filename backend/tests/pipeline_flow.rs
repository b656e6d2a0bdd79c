mod common;

use common::{FakeLoader, FakeServices, components, png_bytes};
use nirikshaka::imaging::UploadRejected;
use nirikshaka::pipeline::{ClassificationPipeline, PipelineError, PipelineState, PredictOutcome};
use shared::EnrichmentResult;
use std::sync::Arc;
use std::time::Duration;

fn started(outcome: PredictOutcome) -> nirikshaka::pipeline::PredictionTicket {
    match outcome {
        PredictOutcome::Started(ticket) => ticket,
        other => panic!("expected the prediction to start, got {:?}", other),
    }
}

#[tokio::test]
async fn cat_photo_is_classified_and_enriched() {
    let loader = FakeLoader::with_scores(&common::CAT_SCORES);
    let services = Arc::new(FakeServices::cats());
    let (parts, _dir) = components(loader.clone(), services.clone());
    let pipeline = Arc::new(ClassificationPipeline::new(parts));

    pipeline.select_image(png_bytes(), "image/jpeg").unwrap();
    let terminal = started(pipeline.request_prediction()).wait().await;

    let (predictions, enrichments) = match terminal {
        PipelineState::Ready {
            predictions,
            enrichments,
        } => (predictions, enrichments),
        other => panic!("expected ready state, got {:?}", other),
    };

    let labels: Vec<_> = predictions.iter().map(|p| p.label.as_str()).collect();
    assert_eq!(labels, ["tabby, tabby cat", "Egyptian cat", "lynx, catamount"]);
    assert_eq!(predictions[0].confidence, 0.82);
    assert!(predictions.windows(2).all(|w| w[0].confidence >= w[1].confidence));

    let terms: Vec<_> = enrichments.iter().map(|e| e.term.as_str()).collect();
    assert_eq!(terms, ["tabby", "Egyptian cat", "lynx"]);
    assert_eq!(
        enrichments[1],
        EnrichmentResult {
            term: "Egyptian cat".into(),
            image_url: Some("https://images.example/mau-small.jpg".into()),
            explanation: None,
        }
    );
    assert!(enrichments[0].explanation.is_some() && enrichments[2].explanation.is_some());

    assert_eq!(pipeline.state(), PipelineState::Ready { predictions, enrichments });
    assert_eq!(loader.loads(), 1);
}

#[tokio::test]
async fn image_search_outage_degrades_only_the_photo() {
    let mut services = FakeServices::cats();
    services.photos.clear();
    let (parts, _dir) = components(FakeLoader::with_scores(&common::CAT_SCORES), Arc::new(services));
    let pipeline = Arc::new(ClassificationPipeline::new(parts));

    pipeline.select_image(png_bytes(), "image/png").unwrap();
    let terminal = started(pipeline.request_prediction()).wait().await;

    let enrichments = match terminal {
        PipelineState::Ready { enrichments, .. } => enrichments,
        other => panic!("enrichment failures must not fail the pipeline, got {:?}", other),
    };
    assert_eq!(enrichments.len(), 3);
    assert!(enrichments.iter().all(|e| e.image_url.is_none()));
    assert_eq!(
        enrichments[0].explanation.as_deref(),
        Some("A tabby is any domestic cat with a coat featuring stripes.")
    );
}

#[tokio::test]
async fn model_load_failure_fails_without_enrichment() {
    let loader = FakeLoader::failing_load("weights download refused");
    let services = Arc::new(FakeServices::cats());
    let (parts, _dir) = components(loader.clone(), services.clone());
    let pipeline = Arc::new(ClassificationPipeline::new(parts));

    pipeline.select_image(png_bytes(), "image/png").unwrap();
    let terminal = started(pipeline.request_prediction()).wait().await;

    assert!(matches!(
        &terminal,
        PipelineState::Failed(PipelineError::ModelUnavailable(reason)) if reason.contains("refused")
    ));
    assert_eq!(services.total_calls(), 0);

    // A later attempt reports the same failure without reloading.
    let again = started(pipeline.request_prediction()).wait().await;
    assert_eq!(again, terminal);
    assert_eq!(loader.loads(), 1);
}

#[tokio::test]
async fn inference_failure_fails_without_enrichment() {
    let services = Arc::new(FakeServices::cats());
    let (parts, _dir) = components(FakeLoader::failing_inference("CUDA out of memory"), services.clone());
    let pipeline = Arc::new(ClassificationPipeline::new(parts));

    pipeline.select_image(png_bytes(), "image/png").unwrap();
    let terminal = started(pipeline.request_prediction()).wait().await;

    assert!(matches!(terminal, PipelineState::Failed(PipelineError::InferenceFailed(_))));
    assert_eq!(services.total_calls(), 0);
}

#[tokio::test]
async fn panicking_inference_still_leaves_loading() {
    let loader = FakeLoader::panicking_inference();
    let services = Arc::new(FakeServices::cats());
    let (parts, _dir) = components(loader.clone(), services.clone());
    let pipeline = Arc::new(ClassificationPipeline::new(parts));

    pipeline.select_image(png_bytes(), "image/png").unwrap();
    let terminal = started(pipeline.request_prediction()).wait().await;

    assert!(matches!(
        terminal,
        PipelineState::Failed(PipelineError::InferenceFailed(_))
    ));
    assert_eq!(pipeline.state(), terminal);
    assert_eq!(loader.classify_calls(), 1);
    assert_eq!(services.total_calls(), 0);

    // The session accepts the next request instead of reporting it busy.
    assert!(matches!(pipeline.request_prediction(), PredictOutcome::Started(_)));
}

#[tokio::test]
async fn corrupt_image_fails_before_the_model_loads() {
    let loader = FakeLoader::with_scores(&common::CAT_SCORES);
    let (parts, _dir) = components(loader.clone(), Arc::new(FakeServices::cats()));
    let pipeline = Arc::new(ClassificationPipeline::new(parts));

    pipeline
        .select_image(b"GIF89a but not really".to_vec(), "image/gif")
        .unwrap();
    let terminal = started(pipeline.request_prediction()).wait().await;

    assert!(matches!(
        terminal,
        PipelineState::Failed(PipelineError::UnsupportedOrCorruptImage(_))
    ));
    assert_eq!(loader.loads(), 0);
}

#[tokio::test]
async fn non_image_upload_is_rejected_without_state_change() {
    let (parts, _dir) = components(
        FakeLoader::with_scores(&common::CAT_SCORES),
        Arc::new(FakeServices::cats()),
    );
    let pipeline = Arc::new(ClassificationPipeline::new(parts));
    let mut updates = pipeline.subscribe();

    let err = pipeline
        .select_image(b"%PDF-1.7".to_vec(), "application/pdf")
        .unwrap_err();

    assert_eq!(err, UploadRejected::NotAnImage("application/pdf".into()));
    assert_eq!(pipeline.state(), PipelineState::Idle);
    assert!(!pipeline.has_selection());
    assert!(!updates.has_changed().unwrap());
    assert!(matches!(pipeline.request_prediction(), PredictOutcome::NoImageSelected));
}

#[tokio::test]
async fn predict_without_selection_is_a_no_op() {
    let loader = FakeLoader::with_scores(&common::CAT_SCORES);
    let (parts, _dir) = components(loader.clone(), Arc::new(FakeServices::cats()));
    let pipeline = Arc::new(ClassificationPipeline::new(parts));

    assert!(matches!(pipeline.request_prediction(), PredictOutcome::NoImageSelected));
    assert_eq!(pipeline.state(), PipelineState::Idle);
    assert_eq!(loader.loads(), 0);
}

#[tokio::test]
async fn predict_while_loading_is_ignored() {
    let loader = FakeLoader::with_scores(&common::CAT_SCORES);
    let services = Arc::new(FakeServices::cats().with_delay(Duration::from_millis(100)));
    let (parts, _dir) = components(loader.clone(), services.clone());
    let pipeline = Arc::new(ClassificationPipeline::new(parts));
    pipeline.select_image(png_bytes(), "image/png").unwrap();

    let mut updates = pipeline.subscribe();
    let observer = tokio::spawn(async move {
        let mut seen = Vec::new();
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            let terminal = state.is_terminal();
            seen.push(state);
            if terminal {
                break;
            }
        }
        seen
    });

    let ticket = started(pipeline.request_prediction());
    assert!(matches!(pipeline.request_prediction(), PredictOutcome::AlreadyLoading));
    assert!(matches!(pipeline.request_prediction(), PredictOutcome::AlreadyLoading));
    assert!(pipeline.state().is_loading());

    let terminal = ticket.wait().await;
    assert!(matches!(terminal, PipelineState::Ready { .. }));

    let seen = observer.await.unwrap();
    assert_eq!(seen.iter().filter(|s| s.is_terminal()).count(), 1);
    assert_eq!(seen.last(), Some(&terminal));

    assert_eq!(loader.classify_calls(), 1);
    assert_eq!(services.image_calls.lock().unwrap().len(), 3);
    assert_eq!(services.summary_calls.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn new_selection_resets_a_finished_result() {
    let (parts, _dir) = components(
        FakeLoader::with_scores(&common::CAT_SCORES),
        Arc::new(FakeServices::cats()),
    );
    let pipeline = Arc::new(ClassificationPipeline::new(parts));

    pipeline.select_image(png_bytes(), "image/png").unwrap();
    let first = started(pipeline.request_prediction()).wait().await;
    assert!(first.is_terminal());

    pipeline.select_image(png_bytes(), "image/png").unwrap();
    assert_eq!(pipeline.state(), PipelineState::Idle);

    let second = started(pipeline.request_prediction()).wait().await;
    assert_eq!(pipeline.state(), second);
}

#[tokio::test]
async fn failed_result_can_be_retried_with_a_new_image() {
    let (parts, _dir) = components(
        FakeLoader::with_scores(&common::CAT_SCORES),
        Arc::new(FakeServices::cats()),
    );
    let pipeline = Arc::new(ClassificationPipeline::new(parts));

    pipeline.select_image(b"not an image".to_vec(), "image/png").unwrap();
    let failed = started(pipeline.request_prediction()).wait().await;
    assert!(matches!(failed, PipelineState::Failed(_)));

    pipeline.select_image(png_bytes(), "image/png").unwrap();
    let ready = started(pipeline.request_prediction()).wait().await;
    assert!(matches!(ready, PipelineState::Ready { .. }));
}

#[tokio::test]
async fn selecting_during_loading_keeps_the_request_running() {
    let services = Arc::new(FakeServices::cats().with_delay(Duration::from_millis(100)));
    let (parts, _dir) = components(FakeLoader::with_scores(&common::CAT_SCORES), services);
    let pipeline = Arc::new(ClassificationPipeline::new(parts));

    pipeline.select_image(png_bytes(), "image/png").unwrap();
    let ticket = started(pipeline.request_prediction());

    pipeline.select_image(png_bytes(), "image/webp").unwrap();
    assert!(pipeline.state().is_loading());

    let terminal = ticket.wait().await;
    assert!(matches!(terminal, PipelineState::Ready { .. }));
    assert_eq!(pipeline.state(), terminal);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sessions_share_one_model_load() {
    let loader = FakeLoader::with_scores(&common::CAT_SCORES);
    let (parts, _dir) = components(loader.clone(), Arc::new(FakeServices::cats()));

    let tickets: Vec<_> = (0..4)
        .map(|_| {
            let pipeline = Arc::new(ClassificationPipeline::new(parts.clone()));
            pipeline.select_image(png_bytes(), "image/png").unwrap();
            started(pipeline.request_prediction())
        })
        .collect();

    for ticket in tickets {
        assert!(matches!(ticket.wait().await, PipelineState::Ready { .. }));
    }
    assert_eq!(loader.loads(), 1);
    assert_eq!(loader.classify_calls(), 4);
}
