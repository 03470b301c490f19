//! Storage-independent search logic.
//!
//! Both the SQLite and in-memory stores must agree with these functions, so
//! every query path goes through the same predicate and ordering.

use std::cmp::Ordering;

use super::traits::CityQuery;
use crate::city::City;

/// A city matches when its name starts with `term` (empty matches all) and,
/// if `favorites_only` is set, it is a favorite.
///
/// `term` is expected lower-cased; names are lower-cased at ingestion.
pub fn matches(city: &City, term: &str, favorites_only: bool) -> bool {
  (term.is_empty() || city.name.starts_with(term)) && (!favorites_only || city.is_favorite)
}

/// Ordering used for every result set: name, then country.
pub fn compare(a: &City, b: &City) -> Ordering {
  a.name
    .cmp(&b.name)
    .then_with(|| a.country.cmp(&b.country))
}

/// Sort by `(name, country)` and keep at most `limit` entries.
pub fn sort_and_limit(mut cities: Vec<City>, limit: usize) -> Vec<City> {
  cities.sort_by(compare);
  cities.truncate(limit);
  cities
}

/// Apply a full query to an in-memory collection.
pub fn apply<'a, I>(cities: I, query: &CityQuery) -> Vec<City>
where
  I: IntoIterator<Item = &'a City>,
{
  let matching: Vec<City> = cities
    .into_iter()
    .filter(|c| query.matches(c))
    .cloned()
    .collect();
  sort_and_limit(matching, query.limit)
}
