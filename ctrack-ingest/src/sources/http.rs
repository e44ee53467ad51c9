//! HTTP feed source
//!
//! Fetches feed bodies over HTTP(S) with a shared `reqwest` client.

use async_trait::async_trait;
use ctrack_common::config::SourcesConfig;
use std::time::Duration;

use super::{Feed, FeedSource, FetchError};

const USER_AGENT: &str = concat!("ctrack/", env!("CARGO_PKG_VERSION"));

/// Fetches the four feeds from their configured URLs
pub struct HttpFeedSource {
    http_client: reqwest::Client,
    sources: SourcesConfig,
}

impl HttpFeedSource {
    pub fn new(sources: SourcesConfig, timeout: Duration) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            sources,
        })
    }

    fn url(&self, feed: Feed) -> &str {
        match feed {
            Feed::StateDaily => &self.sources.state_daily_url,
            Feed::CountryDaily => &self.sources.country_daily_url,
            Feed::CountryVaccinations => &self.sources.country_vaccinations_url,
            Feed::StateVaccinations => &self.sources.state_vaccinations_url,
        }
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, feed: Feed) -> Result<String, FetchError> {
        let url = self.url(feed);
        if url.trim().is_empty() {
            return Err(FetchError::Unconfigured(feed.name().to_string()));
        }

        tracing::debug!(feed = %feed, url = %url, "Fetching feed");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(FetchError::Status(status.as_u16(), error_text));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))?;

        tracing::info!(feed = %feed, bytes = body.len(), "Fetched feed");

        Ok(body)
    }
}
