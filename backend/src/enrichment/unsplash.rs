use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use url::Url;

use super::client::{ImageSearch, LookupError, check_status};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    urls: PhotoUrls,
}

#[derive(Debug, Deserialize)]
struct PhotoUrls {
    small: String,
}

/// Photo search against the Unsplash API.
#[derive(Clone)]
pub struct UnsplashClient {
    http: reqwest::Client,
    api_url: Url,
    access_key: Option<String>,
}

impl UnsplashClient {
    pub fn new(http: reqwest::Client, api_url: Url, access_key: Option<String>) -> Self {
        Self {
            http,
            api_url,
            access_key: access_key.filter(|key| !key.trim().is_empty()),
        }
    }

    fn search_url(&self, term: &str) -> Result<Url, LookupError> {
        let mut url = Url::parse(&format!(
            "{}/search/photos",
            self.api_url.as_str().trim_end_matches('/')
        ))?;
        url.query_pairs_mut()
            .append_pair("query", term)
            .append_pair("per_page", "1");
        Ok(url)
    }
}

#[async_trait]
impl ImageSearch for UnsplashClient {
    async fn first_image(&self, term: &str) -> Result<String, LookupError> {
        let access_key = self
            .access_key
            .as_deref()
            .ok_or(LookupError::MissingCredential)?;

        let response = self
            .http
            .get(self.search_url(term)?)
            .header(AUTHORIZATION, format!("Client-ID {}", access_key))
            .header("Accept-Version", "v1")
            .send()
            .await?;
        let body: SearchResponse = check_status(response)?.json().await?;

        body.results
            .into_iter()
            .next()
            .map(|photo| photo.urls.small)
            .ok_or(LookupError::NoResults)
    }
}
