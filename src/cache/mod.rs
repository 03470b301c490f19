//! Local city cache with a one-time network bootstrap.
//!
//! This module provides:
//! - A store contract for persisted, queryable city records
//! - SQLite and in-memory store implementations
//! - Storage-independent prefix/favorite filtering and ordering
//! - `CityCache`, which fetches from the network once and then serves every
//!   search locally, publishing results and load progress to observers

mod filter;
mod layer;
mod storage;
mod traits;

pub use layer::CityCache;
pub use storage::{MemoryStore, SqliteStore};
pub use traits::{CacheSnapshot, CityQuery, CityStore, LoadState};
