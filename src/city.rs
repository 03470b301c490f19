//! City domain type.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use crate::source::api_types::CityRecord;

/// Geographic coordinates of a city
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
  pub lat: f64,
  pub lon: f64,
}

/// A cached city.
///
/// Identity is the `id` from the source data: two cities with the same id are
/// equal regardless of their other fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct City {
  pub id: i64,
  /// Lower-cased at ingestion
  pub name: String,
  /// Short country code
  pub country: String,
  pub coord: Coord,
  #[serde(default)]
  pub is_favorite: bool,
}

impl City {
  #[cfg(test)]
  pub fn new(id: i64, name: &str, country: &str, coord: Coord) -> Self {
    Self {
      id,
      name: name.to_lowercase(),
      country: country.to_string(),
      coord,
      is_favorite: false,
    }
  }

  /// Label shown in lists, e.g. "New York, US"
  pub fn display_title(&self) -> String {
    format!("{}, {}", capitalize_words(&self.name), self.country.to_uppercase())
  }

  pub fn coordinates_label(&self) -> String {
    format!("{:.4}, {:.4}", self.coord.lat, self.coord.lon)
  }
}

impl From<CityRecord> for City {
  fn from(record: CityRecord) -> Self {
    Self {
      id: record.id,
      name: record.name.to_lowercase(),
      country: record.country,
      coord: Coord {
        lat: record.coord.lat,
        lon: record.coord.lon,
      },
      is_favorite: false,
    }
  }
}

impl PartialEq for City {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

impl Eq for City {}

impl Hash for City {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.id.hash(state);
  }
}

/// Upper-case the first letter of every whitespace or hyphen separated word.
fn capitalize_words(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  let mut at_word_start = true;
  for c in s.chars() {
    if at_word_start {
      out.extend(c.to_uppercase());
    } else {
      out.extend(c.to_lowercase());
    }
    at_word_start = c.is_whitespace() || c == '-';
  }
  out
}
