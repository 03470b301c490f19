use crate::config::SourceConfig;
use crate::source::{CityRecord, CitySource};
use color_eyre::{eyre::eyre, Result};
use futures::future::{BoxFuture, FutureExt};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// HTTP client for the city list endpoint
#[derive(Clone)]
pub struct HttpCitySource {
  client: reqwest::Client,
  url: Url,
}

impl HttpCitySource {
  pub fn new(config: &SourceConfig) -> Result<Self> {
    let url = Url::parse(&config.url)
      .map_err(|e| eyre!("Invalid source url {}: {}", config.url, e))?;

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client, url })
  }

  /// Download and decode the full city list
  pub async fn get_cities(&self) -> Result<Vec<CityRecord>> {
    debug!(url = %self.url, "fetching city list");

    let response = self
      .client
      .get(self.url.clone())
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch cities from {}: {}", self.url, e))?;

    let status = response.status();
    if !status.is_success() {
      return Err(eyre!("City source {} returned status {}", self.url, status));
    }

    let cities: Vec<CityRecord> = response
      .json()
      .await
      .map_err(|e| eyre!("Failed to decode city list: {}", e))?;

    info!(count = cities.len(), "fetched city list");
    Ok(cities)
  }
}

impl CitySource for HttpCitySource {
  fn fetch_cities(&self) -> BoxFuture<'_, Result<Vec<CityRecord>>> {
    self.get_cities().boxed()
  }
}
