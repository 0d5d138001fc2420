use anyhow::Result;
use async_trait::async_trait;
use civic_core::error::BoxError;
use civic_core::fetch::{FetchResponse, Fetcher};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Plain GET over reqwest; non-2xx statuses are returned, not raised.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("ompnet/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, BoxError> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        debug!(url, status, bytes = text.len(), "fetched");
        Ok(FetchResponse { status, text })
    }
}
