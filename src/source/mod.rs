//! Remote source of the full city list.

pub mod api_types;
mod client;

use color_eyre::Result;
use futures::future::BoxFuture;

pub use api_types::CityRecord;
pub use client::HttpCitySource;

/// A collaborator that fetches the complete city list in one go.
///
/// Implementations are stateless from the cache's point of view and may be
/// shared freely.
pub trait CitySource: Send + Sync {
  fn fetch_cities(&self) -> BoxFuture<'_, Result<Vec<CityRecord>>>;
}
