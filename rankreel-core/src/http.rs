use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::{
    aggregation::{Aggregation, AggregationClient, AggregationRequest},
    error::AggregationError,
};

/// Pre-aggregated logins endpoint.
pub const AGGREGATED_PATH: &str = "api/public/login_aggregated";
/// Raw top-N endpoint, for servers without continuous queries.
pub const TOPS_PATH: &str = "api/public/login_top";

/// Connection settings for the HTTP aggregation client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub base_url: String,
    pub path: String,
    pub timeout_secs: u64,
    pub max_tries: u32,
    pub backoff_ms: u64,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        HttpSettings {
            base_url: "http://localhost:8080".to_string(),
            path: AGGREGATED_PATH.to_string(),
            timeout_secs: 60,
            max_tries: 3,
            backoff_ms: 1000,
            user: None,
            password: None,
        }
    }
}

impl HttpSettings {
    pub fn url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }
}

/// Aggregation client talking to the stats server over HTTP.
pub struct HttpAggregationClient {
    client: Client,
    settings: HttpSettings,
    url: String,
}

impl HttpAggregationClient {
    pub fn new(settings: HttpSettings) -> Result<Self, AggregationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        let url = settings.url();
        Ok(HttpAggregationClient {
            client,
            settings,
            url,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_once(&self, request: &AggregationRequest) -> Result<Aggregation, AggregationError> {
        let mut builder = self.client.get(&self.url).query(request);
        if let Some(user) = &self.settings.user {
            builder = builder.basic_auth(user, self.settings.password.as_ref());
        }
        let response = builder.send().await?;
        if response.status() != StatusCode::OK {
            return Err(AggregationError::Status {
                status: response.status().as_u16(),
            });
        }
        let body: Value = response.json().await?;
        Aggregation::from_json(body)
    }
}

#[async_trait]
impl AggregationClient for HttpAggregationClient {
    /// Fetch with retry and exponential backoff. Malformed bodies are not retried.
    async fn fetch(&self, request: &AggregationRequest) -> Result<Aggregation, AggregationError> {
        let max_tries = self.settings.max_tries.max(1);
        let mut sleep_millis = self.settings.backoff_ms;
        let mut attempt = 1;
        loop {
            debug!("GET {} for {} (attempt {})", self.url, request.label(), attempt);
            match self.fetch_once(request).await {
                Ok(aggregation) => return Ok(aggregation),
                Err(err @ AggregationError::ResponseParse(_)) => return Err(err),
                Err(err) if attempt >= max_tries => return Err(err),
                Err(err) => {
                    warn!(
                        "Attempt {}/{}: fetching {} failed: {}",
                        attempt,
                        max_tries,
                        request.label(),
                        err
                    );
                }
            }
            tokio::time::sleep(Duration::from_millis(sleep_millis)).await;
            sleep_millis *= 2;
            attempt += 1;
        }
    }
}
