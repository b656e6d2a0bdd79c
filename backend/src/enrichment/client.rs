use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, warn};
use reqwest::StatusCode;
use shared::{EnrichmentResult, Prediction};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::term::enrichment_term;
use super::unsplash::UnsplashClient;
use super::wikipedia::WikipediaClient;

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("No API credential configured")]
    MissingCredential,
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid lookup URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Service responded with status {0}")]
    Status(StatusCode),
    #[error("Rate limited by service")]
    RateLimited,
    #[error("Not found")]
    NotFound,
    #[error("No results")]
    NoResults,
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    #[error("Image lookup failed for {term:?}: {source}")]
    ImageLookupFailed { term: String, source: LookupError },
    #[error("Summary lookup failed for {term:?}: {source}")]
    SummaryLookupFailed { term: String, source: LookupError },
}

/// Finds one representative photo for a free-text term.
#[async_trait]
pub trait ImageSearch: Send + Sync {
    async fn first_image(&self, term: &str) -> Result<String, LookupError>;
}

/// Finds a short encyclopedic summary for a term.
#[async_trait]
pub trait SummarySource: Send + Sync {
    async fn summary(&self, term: &str) -> Result<String, LookupError>;
}

#[derive(Clone)]
pub struct EnrichmentSettings {
    pub unsplash_access_key: Option<String>,
    pub unsplash_api_url: Url,
    pub wikipedia_api_url: Url,
    pub timeout: Duration,
}

impl fmt::Debug for EnrichmentSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrichmentSettings")
            .field(
                "unsplash_access_key",
                &self.unsplash_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("unsplash_api_url", &self.unsplash_api_url.as_str())
            .field("wikipedia_api_url", &self.wikipedia_api_url.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Fetches a photo and a summary per term from two independent services.
///
/// A failed lookup only blanks its own field of the [`EnrichmentResult`];
/// nothing is retried.
#[derive(Clone)]
pub struct EnrichmentClient {
    images: Arc<dyn ImageSearch>,
    summaries: Arc<dyn SummarySource>,
    timeout: Duration,
}

impl EnrichmentClient {
    pub fn new(
        images: Arc<dyn ImageSearch>,
        summaries: Arc<dyn SummarySource>,
        timeout: Duration,
    ) -> Self {
        Self {
            images,
            summaries,
            timeout,
        }
    }

    pub fn from_settings(settings: &EnrichmentSettings, http: reqwest::Client) -> Self {
        if settings.unsplash_access_key.is_none() {
            warn!("UNSPLASH_ACCESS_KEY is not set, results will have no photos");
        }
        let images = UnsplashClient::new(
            http.clone(),
            settings.unsplash_api_url.clone(),
            settings.unsplash_access_key.clone(),
        );
        let summaries = WikipediaClient::new(http, settings.wikipedia_api_url.clone());
        Self::new(Arc::new(images), Arc::new(summaries), settings.timeout)
    }

    pub async fn enrich(&self, term: &str) -> EnrichmentResult {
        let (image, summary) = tokio::join!(self.lookup_image(term), self.lookup_summary(term));

        let image_url = image.map_err(|e| warn!("{}", e)).ok();
        let explanation = summary.map_err(|e| warn!("{}", e)).ok();
        debug!(
            "Enriched {:?}: image={}, summary={}",
            term,
            image_url.is_some(),
            explanation.is_some()
        );

        EnrichmentResult {
            term: term.to_string(),
            image_url,
            explanation,
        }
    }

    /// Enriches every prediction concurrently and returns once all of them
    /// have settled, in prediction order.
    pub async fn enrich_all(&self, predictions: &[Prediction]) -> Vec<EnrichmentResult> {
        join_all(
            predictions
                .iter()
                .map(|prediction| self.enrich(enrichment_term(&prediction.label))),
        )
        .await
    }

    pub async fn lookup_image(&self, term: &str) -> Result<String, EnrichmentError> {
        with_timeout(self.timeout, self.images.first_image(term))
            .await
            .map_err(|source| EnrichmentError::ImageLookupFailed {
                term: term.to_string(),
                source,
            })
    }

    pub async fn lookup_summary(&self, term: &str) -> Result<String, EnrichmentError> {
        with_timeout(self.timeout, self.summaries.summary(term))
            .await
            .map_err(|source| EnrichmentError::SummaryLookupFailed {
                term: term.to_string(),
                source,
            })
    }
}

async fn with_timeout<T>(
    limit: Duration,
    lookup: impl Future<Output = Result<T, LookupError>>,
) -> Result<T, LookupError> {
    tokio::time::timeout(limit, lookup)
        .await
        .map_err(|_| LookupError::Timeout(limit))?
}

pub(crate) fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LookupError> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::NOT_FOUND => Err(LookupError::NotFound),
        StatusCode::TOO_MANY_REQUESTS => Err(LookupError::RateLimited),
        status => Err(LookupError::Status(status)),
    }
}
