//! Search-and-sync cache that sits between the UI and the city stores.

use color_eyre::Result;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::filter;
use super::traits::{CacheSnapshot, CityQuery, CityStore, LoadState};
use crate::city::City;
use crate::source::CitySource;

/// Progress reported once the remote fetch has returned.
const FETCHED_PROGRESS: u8 = 2;

/// How many inserts run between yields back to the runtime.
const INSERT_YIELD_INTERVAL: usize = 500;

/// Progress after inserting record `index` of `total`.
///
/// The first 2% stand for the completed fetch, the remaining 98% are spread
/// over the inserts.
fn insert_progress(index: usize, total: usize) -> u8 {
  let share = (index + 1) * 98 / total.max(1);
  (FETCHED_PROGRESS as usize + share).min(100) as u8
}

#[derive(Debug, Default)]
struct Session {
  /// Last applied, lower-cased search prefix
  term: String,
  show_only_favorites: bool,
}

/// City cache with a one-time network bootstrap.
///
/// The first `ensure_loaded` on an empty store fetches every city from the
/// source, persists them and reports progress; afterwards all reads are
/// served by the store. Observers follow results and load progress through
/// [`CityCache::subscribe`].
pub struct CityCache<S: CityStore, R: CitySource> {
  store: Arc<S>,
  source: Arc<R>,
  max_results: usize,
  /// Held for the whole bootstrap so only one runs at a time
  bootstrap: tokio::sync::Mutex<()>,
  session: Mutex<Session>,
  state: watch::Sender<CacheSnapshot>,
}

impl<S: CityStore, R: CitySource> CityCache<S, R> {
  pub fn new(store: S, source: R) -> Self {
    let (state, _) = watch::channel(CacheSnapshot::default());
    Self {
      store: Arc::new(store),
      source: Arc::new(source),
      max_results: 50,
      bootstrap: tokio::sync::Mutex::new(()),
      session: Mutex::new(Session::default()),
      state,
    }
  }

  /// Cap the number of cities in any result set.
  pub fn with_max_results(mut self, max_results: usize) -> Self {
    self.max_results = max_results;
    self
  }

  /// Receive a notification on every change of results or load state.
  pub fn subscribe(&self) -> watch::Receiver<CacheSnapshot> {
    self.state.subscribe()
  }

  pub fn results(&self) -> Vec<City> {
    self.state.borrow().results.clone()
  }

  pub fn load_state(&self) -> LoadState {
    self.state.borrow().load
  }

  pub fn is_first_time_loading(&self) -> bool {
    self.load_state().is_loading()
  }

  pub fn load_progress(&self) -> u8 {
    self.load_state().progress()
  }

  pub fn show_only_favorites(&self) -> bool {
    self.session().show_only_favorites
  }

  pub fn current_search_term(&self) -> String {
    self.session().term.clone()
  }

  pub fn max_results(&self) -> usize {
    self.max_results
  }

  #[cfg(test)]
  pub fn store(&self) -> &S {
    &self.store
  }

  fn session(&self) -> MutexGuard<'_, Session> {
    self.session.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Make sure the store is populated, fetching from the source at most once.
  ///
  /// On a populated store this only refreshes the results from the store.
  /// Errors from the source or the store are returned unchanged; the load
  /// state then stays `Loading` until a retry succeeds.
  pub async fn ensure_loaded(&self) -> Result<()> {
    let _bootstrap = self.bootstrap.lock().await;

    if self.store.is_bootstrapped()? {
      let results = self.store.fetch_sorted(&CityQuery::all(self.max_results))?;
      debug!(count = results.len(), "serving cities from local store");
      self.state.send_modify(|s| {
        s.results = results;
        s.load = LoadState::Ready;
      });
      return Ok(());
    }

    let leftover = self.store.count()?;
    if leftover > 0 {
      warn!(
        leftover,
        "store holds cities from an incomplete load, fetching again"
      );
    }

    info!("first-time load, fetching cities from source");
    self.publish_progress(0);

    let records = self.source.fetch_cities().await?;
    let cities: Vec<City> = records.into_iter().map(City::from).collect();
    self.publish_progress(FETCHED_PROGRESS);

    let total = cities.len();
    for (index, city) in cities.iter().enumerate() {
      self.store.insert(city)?;
      self.publish_progress(insert_progress(index, total));

      // Let queued searches run (and bail out) while we insert
      if (index + 1) % INSERT_YIELD_INTERVAL == 0 {
        tokio::task::yield_now().await;
      }
    }

    self.store.commit()?;
    self.store.mark_bootstrapped()?;

    // Leftover rows may carry favorites the fresh records do not know about
    let results = if leftover > 0 {
      self.store.fetch_sorted(&CityQuery::all(self.max_results))?
    } else {
      filter::sort_and_limit(cities, self.max_results)
    };
    self.state.send_modify(|s| {
      s.results = results;
      s.load = LoadState::Ready;
    });

    info!(count = total, "first-time load complete");
    Ok(())
  }

  /// Replace the results with cities whose name starts with `term`.
  ///
  /// Ignored while the first-time load is running. Store failures degrade to
  /// an empty result set.
  pub fn search(&self, term: &str) {
    if self.is_first_time_loading() {
      debug!(term, "search ignored during first-time load");
      return;
    }

    let term = term.to_lowercase();
    let favorites_only = {
      let mut session = self.session();
      session.term.clone_from(&term);
      session.show_only_favorites
    };

    let query = CityQuery::new(&term, favorites_only, self.max_results);
    let results = match self.store.fetch_sorted(&query) {
      Ok(results) => results,
      Err(e) => {
        warn!(error = %e, term = %term, "city search failed");
        Vec::new()
      }
    };

    self.state.send_modify(|s| s.results = results);
  }

  /// Toggle the favorites-only filter and re-run the current search.
  pub fn set_show_only_favorites(&self, value: bool) {
    self.session().show_only_favorites = value;
    let term = self.current_search_term();
    self.search(&term);
  }

  /// Persist a favorite flag and refresh the results.
  ///
  /// If the store rejects the change the results are left as they were.
  pub fn set_favorite(&self, city: &City, value: bool) -> Result<()> {
    if let Err(e) = self.store.set_favorite(city.id, value) {
      warn!(error = %e, id = city.id, "failed to persist favorite");
      return Err(e);
    }

    let term = self.current_search_term();
    self.search(&term);
    Ok(())
  }

  fn publish_progress(&self, progress: u8) {
    let next = LoadState::Loading { progress };
    self.state.send_if_modified(|s| {
      if s.load == next {
        false
      } else {
        s.load = next;
        true
      }
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{MemoryStore, SqliteStore};
  use crate::city::Coord;
  use crate::source::api_types::{CityRecord, CoordRecord};
  use color_eyre::eyre::eyre;
  use futures::future::{BoxFuture, FutureExt};
  use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
  use tokio::sync::Notify;

  fn record(id: i64, name: &str, country: &str) -> CityRecord {
    CityRecord {
      id,
      name: name.to_string(),
      country: country.to_string(),
      coord: CoordRecord {
        lat: 100.0,
        lon: 100.0,
      },
    }
  }

  fn document_cities() -> Vec<CityRecord> {
    vec![
      record(1, "Alabama", "US"),
      record(2, "Albuquerque", "US"),
      record(3, "Anaheim", "US"),
      record(4, "Arizona", "US"),
      record(5, "Sydney", "AU"),
    ]
  }

  /// Source returning canned records, counting calls.
  #[derive(Clone, Default)]
  struct FakeSource {
    records: Vec<CityRecord>,
    calls: Arc<AtomicUsize>,
    /// Number of upcoming calls that fail
    failures: Arc<AtomicUsize>,
    /// When set, each fetch waits for a notification
    gate: Option<Arc<Notify>>,
  }

  impl FakeSource {
    fn with(records: Vec<CityRecord>) -> Self {
      Self {
        records,
        ..Default::default()
      }
    }

    fn failing(self, times: usize) -> Self {
      self.failures.store(times, Ordering::SeqCst);
      self
    }

    fn gated(mut self, gate: Arc<Notify>) -> Self {
      self.gate = Some(gate);
      self
    }
  }

  impl CitySource for FakeSource {
    fn fetch_cities(&self) -> BoxFuture<'_, Result<Vec<CityRecord>>> {
      async move {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
          gate.notified().await;
        }
        if self.failures.load(Ordering::SeqCst) > 0 {
          self.failures.fetch_sub(1, Ordering::SeqCst);
          return Err(eyre!("network unreachable"));
        }
        Ok(self.records.clone())
      }
      .boxed()
    }
  }

  /// Memory store that counts commits and can be told to fail.
  #[derive(Default)]
  struct TestStore {
    inner: MemoryStore,
    commits: AtomicUsize,
    fail_queries: AtomicBool,
    fail_favorites: AtomicBool,
  }

  impl CityStore for TestStore {
    fn count(&self) -> Result<usize> {
      self.inner.count()
    }

    fn insert(&self, city: &City) -> Result<()> {
      self.inner.insert(city)
    }

    fn commit(&self) -> Result<()> {
      self.commits.fetch_add(1, Ordering::SeqCst);
      self.inner.commit()
    }

    fn fetch_sorted(&self, query: &CityQuery) -> Result<Vec<City>> {
      if self.fail_queries.load(Ordering::SeqCst) {
        return Err(eyre!("disk I/O error"));
      }
      self.inner.fetch_sorted(query)
    }

    fn set_favorite(&self, id: i64, value: bool) -> Result<()> {
      if self.fail_favorites.load(Ordering::SeqCst) {
        return Err(eyre!("database is locked"));
      }
      self.inner.set_favorite(id, value)
    }

    fn is_bootstrapped(&self) -> Result<bool> {
      self.inner.is_bootstrapped()
    }

    fn mark_bootstrapped(&self) -> Result<()> {
      self.inner.mark_bootstrapped()
    }
  }

  fn names(cities: &[City]) -> Vec<String> {
    cities.iter().map(|c| c.name.clone()).collect()
  }

  async fn loaded_cache(records: Vec<CityRecord>) -> CityCache<TestStore, FakeSource> {
    let cache = CityCache::new(TestStore::default(), FakeSource::with(records));
    cache.ensure_loaded().await.unwrap();
    cache
  }

  #[test]
  fn test_insert_progress() {
    assert_eq!(insert_progress(0, 1), 100);
    assert_eq!(insert_progress(0, 98), 3);
    assert_eq!(insert_progress(48, 98), 51);
    assert_eq!(insert_progress(97, 98), 100);
    assert_eq!(insert_progress(0, 1000), 2);

    let steps: Vec<u8> = (0..7).map(|i| insert_progress(i, 7)).collect();
    assert!(steps.windows(2).all(|w| w[0] <= w[1]));
  }

  #[tokio::test]
  async fn test_load_populates_results() {
    let cache = loaded_cache(vec![record(2, "City B", "CB"), record(1, "City A", "CA")]).await;

    let results = cache.results();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].display_title(), "City A, CA");
    assert_eq!(results[1].display_title(), "City B, CB");
    assert_eq!(cache.load_state(), LoadState::Ready);
    assert_eq!(cache.load_progress(), 100);
    assert!(!cache.is_first_time_loading());
  }

  #[tokio::test]
  async fn test_max_results_limits_first_load() {
    let cache = CityCache::new(
      TestStore::default(),
      FakeSource::with(vec![
        record(2, "CityB", "CountryB"),
        record(1, "CityA", "CountryA"),
      ]),
    )
    .with_max_results(1);
    cache.ensure_loaded().await.unwrap();

    let results = cache.results();
    assert_eq!(cache.max_results(), 1);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "citya");
    assert_eq!(cache.store().count().unwrap(), 2);
  }

  #[tokio::test]
  async fn test_fetch_failure_propagates() {
    let cache = CityCache::new(
      TestStore::default(),
      FakeSource::with(document_cities()).failing(1),
    );

    let err = cache.ensure_loaded().await.unwrap_err();
    assert_eq!(err.to_string(), "network unreachable");
    assert!(cache.results().is_empty());
    assert!(cache.is_first_time_loading());
    assert_eq!(cache.store().count().unwrap(), 0);
  }

  #[tokio::test]
  async fn test_retry_after_failure_loads() {
    let source = FakeSource::with(document_cities()).failing(1);
    let calls = Arc::clone(&source.calls);
    let cache = CityCache::new(TestStore::default(), source);

    assert!(cache.ensure_loaded().await.is_err());
    cache.ensure_loaded().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.results().len(), 5);
    assert_eq!(cache.load_state(), LoadState::Ready);
  }

  #[tokio::test]
  async fn test_ensure_loaded_is_idempotent() {
    let source = FakeSource::with(document_cities());
    let calls = Arc::clone(&source.calls);
    let cache = CityCache::new(TestStore::default(), source);

    cache.ensure_loaded().await.unwrap();
    cache.ensure_loaded().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.store().commits.load(Ordering::SeqCst), 1);
    assert_eq!(cache.store().count().unwrap(), 5);
    assert_eq!(cache.results().len(), 5);
  }

  #[tokio::test]
  async fn test_incomplete_load_is_fetched_again_without_duplicates() {
    let store = TestStore::default();
    store.insert(&City::new(1, "Alabama", "US", Coord { lat: 0.0, lon: 0.0 })).unwrap();
    store.commit().unwrap();
    store.set_favorite(1, true).unwrap();

    let source = FakeSource::with(document_cities());
    let calls = Arc::clone(&source.calls);
    let cache = CityCache::new(store, source);
    cache.ensure_loaded().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.store().count().unwrap(), 5);

    cache.set_show_only_favorites(true);
    assert_eq!(names(&cache.results()), vec!["alabama"]);
  }

  #[tokio::test]
  async fn test_resumed_load_publishes_stored_favorites() {
    let store = TestStore::default();
    store.insert(&City::new(1, "Alabama", "US", Coord { lat: 0.0, lon: 0.0 })).unwrap();
    store.commit().unwrap();
    store.set_favorite(1, true).unwrap();

    let cache = CityCache::new(store, FakeSource::with(document_cities()));
    cache.ensure_loaded().await.unwrap();

    let results = cache.results();
    assert_eq!(results.len(), 5);
    assert_eq!(results[0].name, "alabama");
    assert!(results[0].is_favorite);
    assert!(results[1..].iter().all(|c| !c.is_favorite));
    assert_eq!(cache.load_state(), LoadState::Ready);
  }

  #[tokio::test]
  async fn test_search_by_prefix() {
    let cache = loaded_cache(document_cities()).await;

    cache.search("A");
    assert_eq!(cache.results().len(), 4);

    cache.search("s");
    assert_eq!(names(&cache.results()), vec!["sydney"]);
    assert_eq!(cache.results()[0].display_title(), "Sydney, AU");

    cache.search("Al");
    assert_eq!(names(&cache.results()), vec!["alabama", "albuquerque"]);
    assert_eq!(cache.current_search_term(), "al");

    cache.search("Alb");
    assert_eq!(names(&cache.results()), vec!["albuquerque"]);

    cache.search("888494");
    assert!(cache.results().is_empty());

    cache.search("");
    assert_eq!(cache.results().len(), 5);
  }

  #[tokio::test]
  async fn test_results_respect_cap_and_order() {
    let records: Vec<CityRecord> = (0..120)
      .map(|i| {
        let name = format!("town {:03}", (i * 37) % 120);
        let country = if i % 2 == 0 { "ZZ" } else { "AA" };
        record(i, &name, country)
      })
      .collect();
    let cache = CityCache::new(TestStore::default(), FakeSource::with(records))
      .with_max_results(30);
    cache.ensure_loaded().await.unwrap();

    for term in ["", "town", "town 0", "town 11"] {
      cache.search(term);
      let results = cache.results();
      assert!(results.len() <= 30);
      assert!(results
        .windows(2)
        .all(|w| filter::compare(&w[0], &w[1]) != std::cmp::Ordering::Greater));
    }

    cache.search("");
    assert_eq!(cache.results().len(), 30);
  }

  #[tokio::test]
  async fn test_favorites_filter() {
    let cache = loaded_cache(document_cities()).await;
    let results = cache.results();
    cache.set_favorite(&results[1], true).unwrap();
    cache.set_favorite(&results[4], true).unwrap();

    cache.set_show_only_favorites(true);
    assert!(cache.show_only_favorites());
    assert_eq!(names(&cache.results()), vec!["albuquerque", "sydney"]);
    assert!(cache.results().iter().all(|c| c.is_favorite));

    cache.search("s");
    assert_eq!(names(&cache.results()), vec!["sydney"]);

    // Un-favoriting while filtered drops the city from view
    let sydney = cache.results()[0].clone();
    cache.set_favorite(&sydney, false).unwrap();
    assert!(cache.results().is_empty());

    cache.set_show_only_favorites(false);
    assert_eq!(names(&cache.results()), vec!["sydney"]);
  }

  #[tokio::test]
  async fn test_favorite_persist_failure_keeps_results() {
    let cache = loaded_cache(document_cities()).await;
    cache.set_show_only_favorites(true);
    assert!(cache.results().is_empty());

    cache.store().fail_favorites.store(true, Ordering::SeqCst);
    let alabama = City::new(1, "Alabama", "US", Coord { lat: 0.0, lon: 0.0 });
    assert!(cache.set_favorite(&alabama, true).is_err());
    assert!(cache.results().is_empty());
  }

  #[tokio::test]
  async fn test_query_failure_degrades_to_empty() {
    let cache = loaded_cache(document_cities()).await;
    assert_eq!(cache.results().len(), 5);

    cache.store().fail_queries.store(true, Ordering::SeqCst);
    cache.search("al");
    assert!(cache.results().is_empty());
  }

  #[tokio::test]
  async fn test_search_is_noop_during_first_load() {
    let gate = Arc::new(Notify::new());
    let cache = Arc::new(CityCache::new(
      TestStore::default(),
      FakeSource::with(document_cities()).gated(Arc::clone(&gate)),
    ));
    let mut rx = cache.subscribe();

    let task = {
      let cache = Arc::clone(&cache);
      tokio::spawn(async move { cache.ensure_loaded().await })
    };

    rx.wait_for(|s| s.load.is_loading()).await.unwrap();
    assert!(cache.is_first_time_loading());

    cache.search("x");
    cache.set_show_only_favorites(true);
    assert!(cache.results().is_empty());
    assert_eq!(cache.current_search_term(), "");

    gate.notify_one();
    task.await.unwrap().unwrap();

    assert_eq!(cache.results().len(), 5);
    cache.search("x");
    assert_eq!(cache.current_search_term(), "x");
  }

  #[tokio::test]
  async fn test_concurrent_loads_fetch_once() {
    let gate = Arc::new(Notify::new());
    let source = FakeSource::with(document_cities()).gated(Arc::clone(&gate));
    let calls = Arc::clone(&source.calls);
    let cache = Arc::new(CityCache::new(TestStore::default(), source));

    let tasks: Vec<_> = (0..3)
      .map(|_| {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { cache.ensure_loaded().await })
      })
      .collect();

    tokio::task::yield_now().await;
    gate.notify_one();
    for task in tasks {
      task.await.unwrap().unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.store().commits.load(Ordering::SeqCst), 1);
    assert_eq!(cache.store().count().unwrap(), 5);
  }

  #[tokio::test]
  async fn test_subscribers_see_changes() {
    let cache = loaded_cache(document_cities()).await;
    let mut rx = cache.subscribe();
    assert!(!rx.has_changed().unwrap());

    cache.search("ar");
    assert!(rx.has_changed().unwrap());
    let snapshot = rx.borrow_and_update().clone();
    assert_eq!(names(&snapshot.results), vec!["arizona"]);
    assert_eq!(snapshot.load, LoadState::Ready);
  }

  #[tokio::test]
  async fn test_sqlite_backed_cache_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cities.db");

    {
      let store = SqliteStore::open(Some(&path)).unwrap();
      let cache = CityCache::new(store, FakeSource::with(document_cities()));
      cache.ensure_loaded().await.unwrap();
      let sydney = cache.results()[4].clone();
      cache.set_favorite(&sydney, true).unwrap();
    }

    let source = FakeSource::with(Vec::new());
    let calls = Arc::clone(&source.calls);
    let cache = CityCache::new(SqliteStore::open(Some(&path)).unwrap(), source);
    cache.ensure_loaded().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(cache.results().len(), 5);
    cache.set_show_only_favorites(true);
    assert_eq!(names(&cache.results()), vec!["sydney"]);
  }

  #[tokio::test]
  async fn test_empty_source_still_completes() {
    let source = FakeSource::with(Vec::new());
    let calls = Arc::clone(&source.calls);
    let cache = CityCache::new(TestStore::default(), source);

    cache.ensure_loaded().await.unwrap();
    cache.ensure_loaded().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.load_state(), LoadState::Ready);
    assert!(cache.results().is_empty());
  }
}
