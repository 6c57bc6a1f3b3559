use crate::config::GeocoderConfig;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Canadian address lookup backed by OpenCage.
#[derive(Clone)]
pub struct Geocoder {
    client: Client,
    config: GeocoderConfig,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<Value>,
}

impl Geocoder {
    pub fn new(config: GeocoderConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    /// Returns the provider's `results`; any failure yields an empty list.
    pub async fn search(&self, query: &str) -> Vec<Value> {
        match self.fetch(query).await {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(error = %e, "Address lookup failed");
                Vec::new()
            }
        }
    }

    async fn fetch(&self, query: &str) -> Result<Vec<Value>, reqwest::Error> {
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("q", query),
                ("countrycode", "ca"),
                ("key", self.config.api_key.expose_secret().as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body: GeocodeResponse = response.json().await?;
        tracing::debug!(results = body.results.len(), "Address lookup completed");
        Ok(body.results)
    }
}
