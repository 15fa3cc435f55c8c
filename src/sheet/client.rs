use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::SheetError;
use crate::sheet::parse::{parse_snapshot, robust_parse_json};
use crate::sheet::{DataSource, SheetSnapshot, WriteRequest};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// HTTP client for the spreadsheet script endpoint.
pub struct SheetClient {
    client: Client,
    url: String,
    retries: u32,
    retry_delay: Duration,
}

impl SheetClient {
    pub fn new(cfg: &Config) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            url: cfg.script_url.clone(),
            retries: cfg.fetch_retries,
            retry_delay: Duration::from_millis(cfg.retry_delay_ms),
        }
    }

    async fn fetch_once(&self) -> Result<SheetSnapshot, SheetError> {
        // Cache-buster; the script host caches GETs aggressively
        let resp = self
            .client
            .get(&self.url)
            .query(&[("v", Utc::now().timestamp_millis().to_string())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SheetError::Status(status.as_u16()));
        }

        let text = resp.text().await?;
        let data = robust_parse_json(&text)?;
        Ok(parse_snapshot(&data))
    }

    /// Fetch with a fixed number of retries and a constant delay.
    pub async fn fetch_snapshot(&self) -> Result<SheetSnapshot, SheetError> {
        let mut attempt = 0;
        loop {
            match self.fetch_once().await {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    debug!("Sheet fetch failed ({}), retry {}/{}", e, attempt, self.retries);
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    warn!("Sheet fetch gave up after {} retries: {}", self.retries, e);
                    return Err(e);
                }
            }
        }
    }

    pub async fn write(&self, request: &WriteRequest) -> Result<(), SheetError> {
        let body = serde_json::to_string(request)?;
        self.client
            .post(&self.url)
            .header("Content-Type", "text/plain")
            .body(body)
            .send()
            .await?;
        debug!("Sheet write {} {} sent", request.target, request.action);
        Ok(())
    }
}

#[async_trait]
impl DataSource for SheetClient {
    async fn fetch_snapshot(&self) -> Result<SheetSnapshot, SheetError> {
        self.fetch_snapshot().await
    }

    async fn write(&self, request: &WriteRequest) -> Result<(), SheetError> {
        self.write(request).await
    }
}
