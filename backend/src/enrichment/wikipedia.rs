use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use super::client::{LookupError, SummarySource, check_status};

#[derive(Debug, Deserialize)]
struct PageSummary {
    #[serde(default)]
    extract: Option<String>,
}

/// Page summaries from the Wikipedia REST API.
#[derive(Clone)]
pub struct WikipediaClient {
    http: reqwest::Client,
    api_url: Url,
}

impl WikipediaClient {
    pub fn new(http: reqwest::Client, api_url: Url) -> Self {
        Self { http, api_url }
    }

    /// The term becomes one path segment, with spaces written as underscores
    /// the way page titles are.
    fn summary_url(&self, term: &str) -> Result<Url, LookupError> {
        let title = term.trim().replace(' ', "_");
        Ok(Url::parse(&format!(
            "{}/page/summary/{}",
            self.api_url.as_str().trim_end_matches('/'),
            urlencoding::encode(&title)
        ))?)
    }
}

#[async_trait]
impl SummarySource for WikipediaClient {
    async fn summary(&self, term: &str) -> Result<String, LookupError> {
        let response = self.http.get(self.summary_url(term)?).send().await?;
        let page: PageSummary = check_status(response)?.json().await?;

        page.extract
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(LookupError::NotFound)
    }
}
