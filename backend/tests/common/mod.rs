#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use nirikshaka::enrichment::{EnrichmentClient, ImageSearch, LookupError, SummarySource};
use nirikshaka::imaging::{DecodedImage, ImageDecoder, PreprocessingConfig};
use nirikshaka::model::{
    Classifier, InferenceError, LoadError, ModelLoader, ModelProvider, ModelSettings, ModelSource,
};
use nirikshaka::pipeline::PipelineComponents;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// ImageNet-style labels in class order.
pub const LABELS: &str = "goldfish, Carassius auratus\ntabby, tabby cat\nEgyptian cat\nlynx, catamount\ntiger cat\n";

/// Scores for a cat photo: tabby, then Egyptian cat, then lynx.
pub const CAT_SCORES: [f32; 5] = [0.001, 0.82, 0.11, 0.03, 0.02];

pub fn png_bytes() -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 24, Rgb([120, 90, 60])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
    buf
}

pub struct FakeClassifier {
    scores: Result<Vec<f32>, String>,
    panics: bool,
    calls: Arc<AtomicUsize>,
}

impl Classifier for FakeClassifier {
    fn num_classes(&self) -> Option<usize> {
        self.scores.as_ref().ok().map(Vec::len)
    }

    fn scores(&self, _image: &DecodedImage) -> Result<Vec<f32>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panics {
            panic!("forward pass blew up");
        }
        self.scores.clone().map_err(InferenceError::Model)
    }
}

#[derive(Default)]
pub struct FakeLoader {
    pub loads: AtomicUsize,
    pub classify_calls: Arc<AtomicUsize>,
    load_error: Option<String>,
    scores: Option<Result<Vec<f32>, String>>,
    panic_in_inference: bool,
}

impl FakeLoader {
    pub fn with_scores(scores: &[f32]) -> Arc<Self> {
        Arc::new(Self {
            scores: Some(Ok(scores.to_vec())),
            ..Default::default()
        })
    }

    pub fn failing_load(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            load_error: Some(reason.to_string()),
            ..Default::default()
        })
    }

    pub fn failing_inference(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            scores: Some(Err(reason.to_string())),
            ..Default::default()
        })
    }

    pub fn panicking_inference() -> Arc<Self> {
        Arc::new(Self {
            scores: Some(Ok(CAT_SCORES.to_vec())),
            panic_in_inference: true,
            ..Default::default()
        })
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn classify_calls(&self) -> usize {
        self.classify_calls.load(Ordering::SeqCst)
    }
}

impl ModelLoader for FakeLoader {
    fn load(&self, _weights: &Path) -> Result<Box<dyn Classifier>, LoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.load_error {
            return Err(LoadError::Backend(reason.clone()));
        }
        Ok(Box::new(FakeClassifier {
            scores: self.scores.clone().unwrap_or_else(|| Ok(CAT_SCORES.to_vec())),
            panics: self.panic_in_inference,
            calls: Arc::clone(&self.classify_calls),
        }))
    }
}

/// Canned lookups keyed by term; unknown terms fail like a 404.
#[derive(Default)]
pub struct FakeServices {
    pub photos: HashMap<String, String>,
    pub extracts: HashMap<String, String>,
    pub delay: Duration,
    pub image_calls: Mutex<Vec<String>>,
    pub summary_calls: Mutex<Vec<String>>,
}

impl FakeServices {
    pub fn cats() -> Self {
        let photos = [
            ("tabby", "https://images.example/tabby-small.jpg"),
            ("Egyptian cat", "https://images.example/mau-small.jpg"),
            ("lynx", "https://images.example/lynx-small.jpg"),
        ];
        // No article for "Egyptian cat": that summary lookup 404s.
        let extracts = [
            ("tabby", "A tabby is any domestic cat with a coat featuring stripes."),
            ("lynx", "A lynx is any of the four species within the medium-sized wild cat genus Lynx."),
        ];
        Self {
            photos: photos
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            extracts: extracts
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn total_calls(&self) -> usize {
        self.image_calls.lock().unwrap().len() + self.summary_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ImageSearch for FakeServices {
    async fn first_image(&self, term: &str) -> Result<String, LookupError> {
        self.image_calls.lock().unwrap().push(term.to_string());
        tokio::time::sleep(self.delay).await;
        self.photos.get(term).cloned().ok_or(LookupError::NoResults)
    }
}

#[async_trait]
impl SummarySource for FakeServices {
    async fn summary(&self, term: &str) -> Result<String, LookupError> {
        self.summary_calls.lock().unwrap().push(term.to_string());
        self.extracts.get(term).cloned().ok_or(LookupError::NotFound)
    }
}

/// Pipeline components over fakes. Keep the returned `TempDir` alive.
pub fn components(loader: Arc<FakeLoader>, services: Arc<FakeServices>) -> (PipelineComponents, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let weights = dir.path().join("net.pt");
    std::fs::write(&weights, b"torchscript").unwrap();
    let labels_path = dir.path().join("labels.txt");
    std::fs::write(&labels_path, LABELS).unwrap();

    let model = ModelProvider::new(
        ModelSettings {
            source: ModelSource::Local(weights),
            labels_path,
            cache_dir: dir.path().join("cache"),
            top_k: 3,
            download_timeout: Duration::from_secs(5),
        },
        loader,
        reqwest::Client::new(),
    );
    let enricher = EnrichmentClient::new(services.clone(), services, Duration::from_secs(5));

    let components = PipelineComponents {
        decoder: ImageDecoder::new(PreprocessingConfig::default()),
        model: Arc::new(model),
        enricher,
        max_upload_bytes: 1024 * 1024,
    };
    (components, dir)
}
