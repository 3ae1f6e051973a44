//! Latest-CVEs API fetcher

use super::CveFetcher;
use crate::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Fetches the latest vulnerability batch from a CIRCL-style API.
pub struct HttpCveFetcher {
    client: reqwest::Client,
    api_url: String,
}

impl HttpCveFetcher {
    pub fn new(api_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_url: api_url.into(),
        }
    }
}

#[async_trait]
impl CveFetcher for HttpCveFetcher {
    async fn fetch_latest(&self) -> Result<Vec<serde_json::Value>> {
        let response = self
            .client
            .get(&self.api_url)
            .send()
            .await
            .map_err(super::request_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!(
                "{} answered {}",
                self.api_url, status
            )));
        }
        let batch: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| Error::MalformedData(format!("invalid CVE payload: {}", e)))?;
        Ok(batch)
    }
}
