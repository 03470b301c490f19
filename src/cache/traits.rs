//! Core traits and types for the city cache.

use color_eyre::Result;

use super::filter;
use crate::city::City;

/// Predicate, sort and limit for a store query.
///
/// Results are always ordered by `(name, country)` ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityQuery {
  /// Lower-cased name prefix, empty matches every name
  pub prefix: String,
  pub favorites_only: bool,
  pub limit: usize,
}

impl CityQuery {
  /// Query without any predicate
  pub fn all(limit: usize) -> Self {
    Self {
      prefix: String::new(),
      favorites_only: false,
      limit,
    }
  }

  pub fn new(prefix: &str, favorites_only: bool, limit: usize) -> Self {
    Self {
      prefix: prefix.to_lowercase(),
      favorites_only,
      limit,
    }
  }

  pub fn matches(&self, city: &City) -> bool {
    filter::matches(city, &self.prefix, self.favorites_only)
  }
}

/// Trait for persisted city storage backends.
///
/// The cache is the only writer. Inserts are staged and become visible to
/// `count` and `fetch_sorted` after `commit`.
pub trait CityStore: Send + Sync {
  /// Number of committed records.
  fn count(&self) -> Result<usize>;

  /// Stage a record for the next commit.
  fn insert(&self, city: &City) -> Result<()>;

  /// Persist all staged records.
  fn commit(&self) -> Result<()>;

  /// Query records matching `query`, sorted and limited.
  fn fetch_sorted(&self, query: &CityQuery) -> Result<Vec<City>>;

  /// Update the favorite flag of a committed record.
  fn set_favorite(&self, id: i64, value: bool) -> Result<()>;

  /// Whether a bootstrap ran to completion against this store.
  fn is_bootstrapped(&self) -> Result<bool>;

  /// Record that a bootstrap ran to completion.
  fn mark_bootstrapped(&self) -> Result<()>;
}

/// Bootstrap sub-state of the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
  /// Nothing loaded yet
  #[default]
  Empty,
  /// First-time load in flight, progress in percent
  Loading { progress: u8 },
  /// Store populated, searches are served locally
  Ready,
}

impl LoadState {
  pub fn is_loading(&self) -> bool {
    matches!(self, LoadState::Loading { .. })
  }

  pub fn progress(&self) -> u8 {
    match self {
      LoadState::Empty => 0,
      LoadState::Loading { progress } => *progress,
      LoadState::Ready => 100,
    }
  }
}

/// Everything an observer of the cache can see.
#[derive(Debug, Clone, Default)]
pub struct CacheSnapshot {
  pub results: Vec<City>,
  pub load: LoadState,
}
