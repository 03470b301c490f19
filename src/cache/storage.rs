//! City store implementations: SQLite on disk, and a plain in-memory list.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::filter;
use super::traits::{CityQuery, CityStore};
use crate::city::{City, Coord};

const BOOTSTRAP_KEY: &str = "bootstrapped_at";

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
  mutex.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
}

/// Store that keeps everything in memory.
/// Used when persistence is disabled; contents are lost on exit.
#[derive(Default)]
pub struct MemoryStore {
  cities: Mutex<Vec<City>>,
  pending: Mutex<Vec<City>>,
  bootstrapped: AtomicBool,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl CityStore for MemoryStore {
  fn count(&self) -> Result<usize> {
    Ok(lock(&self.cities)?.len())
  }

  fn insert(&self, city: &City) -> Result<()> {
    lock(&self.pending)?.push(city.clone());
    Ok(())
  }

  fn commit(&self) -> Result<()> {
    let pending = std::mem::take(&mut *lock(&self.pending)?);
    let mut cities = lock(&self.cities)?;

    for city in pending {
      match cities.iter_mut().find(|c| c.id == city.id) {
        // Keep the favorite flag of an already stored record
        Some(existing) => {
          let is_favorite = existing.is_favorite;
          *existing = city;
          existing.is_favorite = is_favorite;
        }
        None => cities.push(city),
      }
    }

    Ok(())
  }

  fn fetch_sorted(&self, query: &CityQuery) -> Result<Vec<City>> {
    let cities = lock(&self.cities)?;
    Ok(filter::apply(cities.iter(), query))
  }

  fn set_favorite(&self, id: i64, value: bool) -> Result<()> {
    let mut cities = lock(&self.cities)?;
    let city = cities
      .iter_mut()
      .find(|c| c.id == id)
      .ok_or_else(|| eyre!("No city with id {}", id))?;
    city.is_favorite = value;
    Ok(())
  }

  fn is_bootstrapped(&self) -> Result<bool> {
    Ok(self.bootstrapped.load(Ordering::SeqCst))
  }

  fn mark_bootstrapped(&self) -> Result<()> {
    self.bootstrapped.store(true, Ordering::SeqCst);
    Ok(())
  }
}

/// SQLite-based city store.
pub struct SqliteStore {
  conn: Mutex<Connection>,
  pending: Mutex<Vec<City>>,
}

impl SqliteStore {
  /// Open (or create) the store at `path`, or at the default location.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open city database at {}: {}", path.display(), e))?;

    debug!(path = %path.display(), "opened city database");
    Self::with_connection(conn)
  }

  /// Open a private in-memory database.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let store = Self {
      conn: Mutex::new(conn),
      pending: Mutex::new(Vec::new()),
    };
    store.run_migrations()?;
    Ok(store)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("cityscope").join("cities.db"))
  }

  /// Run database migrations for the city tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = lock(&self.conn)?;

    conn
      .execute_batch(CITY_SCHEMA)
      .map_err(|e| eyre!("Failed to run city migrations: {}", e))?;

    Ok(())
  }

  /// When the last complete bootstrap finished, if ever.
  pub fn bootstrapped_at(&self) -> Result<Option<DateTime<Utc>>> {
    let conn = lock(&self.conn)?;

    let value: Option<String> = conn
      .query_row(
        "SELECT value FROM meta WHERE key = ?",
        params![BOOTSTRAP_KEY],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read bootstrap marker: {}", e))?;

    value
      .map(|s| {
        DateTime::parse_from_rfc3339(&s)
          .map(|dt| dt.with_timezone(&Utc))
          .map_err(|e| eyre!("Failed to parse bootstrap marker '{}': {}", s, e))
      })
      .transpose()
  }
}

/// Schema for the city tables.
const CITY_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cities (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    country TEXT NOT NULL,
    lat REAL NOT NULL,
    lon REAL NOT NULL,
    is_favorite INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_cities_name_country ON cities(name, country);

-- Key/value bookkeeping (bootstrap marker)
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

fn city_from_row(row: &Row<'_>) -> rusqlite::Result<City> {
  Ok(City {
    id: row.get(0)?,
    name: row.get(1)?,
    country: row.get(2)?,
    coord: Coord {
      lat: row.get(3)?,
      lon: row.get(4)?,
    },
    is_favorite: row.get(5)?,
  })
}

impl CityStore for SqliteStore {
  fn count(&self) -> Result<usize> {
    let conn = lock(&self.conn)?;

    let count: i64 = conn
      .query_row("SELECT COUNT(*) FROM cities", [], |row| row.get(0))
      .map_err(|e| eyre!("Failed to count cities: {}", e))?;

    Ok(count as usize)
  }

  fn insert(&self, city: &City) -> Result<()> {
    lock(&self.pending)?.push(city.clone());
    Ok(())
  }

  fn commit(&self) -> Result<()> {
    let pending = std::mem::take(&mut *lock(&self.pending)?);
    if pending.is_empty() {
      return Ok(());
    }

    let mut conn = lock(&self.conn)?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    {
      // Upsert keeps is_favorite of rows that already exist
      let mut stmt = tx
        .prepare(
          "INSERT INTO cities (id, name, country, lat, lon, is_favorite)
           VALUES (?, ?, ?, ?, ?, ?)
           ON CONFLICT(id) DO UPDATE SET
             name = excluded.name,
             country = excluded.country,
             lat = excluded.lat,
             lon = excluded.lon",
        )
        .map_err(|e| eyre!("Failed to prepare insert: {}", e))?;

      for city in &pending {
        stmt
          .execute(params![
            city.id,
            city.name,
            city.country,
            city.coord.lat,
            city.coord.lon,
            city.is_favorite
          ])
          .map_err(|e| eyre!("Failed to store city {}: {}", city.id, e))?;
      }
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    debug!(count = pending.len(), "committed cities");
    Ok(())
  }

  fn fetch_sorted(&self, query: &CityQuery) -> Result<Vec<City>> {
    let conn = lock(&self.conn)?;

    // substr keeps '%' and '_' in the term literal, unlike LIKE
    let mut stmt = conn
      .prepare_cached(
        "SELECT id, name, country, lat, lon, is_favorite FROM cities
         WHERE (?1 = '' OR substr(name, 1, length(?1)) = ?1)
           AND (?2 = 0 OR is_favorite = 1)
         ORDER BY name, country
         LIMIT ?3",
      )
      .map_err(|e| eyre!("Failed to prepare city query: {}", e))?;

    let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
    let cities = stmt
      .query_map(
        params![query.prefix, query.favorites_only, limit],
        city_from_row,
      )
      .map_err(|e| eyre!("Failed to query cities: {}", e))?
      .collect::<rusqlite::Result<Vec<City>>>()
      .map_err(|e| eyre!("Failed to read city row: {}", e))?;

    Ok(cities)
  }

  fn set_favorite(&self, id: i64, value: bool) -> Result<()> {
    let conn = lock(&self.conn)?;

    let updated = conn
      .execute(
        "UPDATE cities SET is_favorite = ? WHERE id = ?",
        params![value, id],
      )
      .map_err(|e| eyre!("Failed to update favorite for city {}: {}", id, e))?;

    if updated == 0 {
      return Err(eyre!("No city with id {}", id));
    }

    Ok(())
  }

  fn is_bootstrapped(&self) -> Result<bool> {
    Ok(self.bootstrapped_at()?.is_some())
  }

  fn mark_bootstrapped(&self) -> Result<()> {
    let conn = lock(&self.conn)?;

    conn
      .execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES (?, ?)",
        params![BOOTSTRAP_KEY, Utc::now().to_rfc3339()],
      )
      .map_err(|e| eyre!("Failed to write bootstrap marker: {}", e))?;

    Ok(())
  }
}
